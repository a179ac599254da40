//! Remote object-storage gateway.
//!
//! # Responsibility
//! - Upload, download and probe one JSON object in a public bucket.
//!
//! # Invariants
//! - Exactly one HTTP attempt per call; retries belong to the caller.
//! - Configuration is validated before any network I/O.
//! - 404 on download is `DownloadOutcome::NoBackup`, not an error.
//! - Any probe failure reads as `exists = false`.
//! - Payload bytes and object URLs are never logged.
//! - Downloads read the full body with no size cap.

use super::config::{ConfigError, SyncConfig};
use super::{SyncError, SyncResult};
use chrono::Utc;
use log::{debug, info, warn};
use std::io::Read;
use std::time::{Duration, Instant};
use ureq::{Agent, AgentBuilder, Response};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const IO_TIMEOUT: Duration = Duration::from_secs(60);
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Result of a download attempt that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Found {
        payload: String,
        /// Raw `Last-Modified` header, when the server sent one.
        last_modified: Option<String>,
    },
    /// The object does not exist yet.
    NoBackup,
}

/// Result of a metadata probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupMetadata {
    pub exists: bool,
    pub last_modified: Option<String>,
    pub size: Option<u64>,
}

/// Remote backup object operations.
pub trait RemoteBackup {
    /// Replaces the remote object with `payload`.
    fn upload(&self, payload: &str) -> SyncResult<()>;
    /// Fetches the remote object, bypassing caches.
    fn download(&self) -> SyncResult<DownloadOutcome>;
    /// Probes the remote object; never fails.
    fn check_backup_metadata(&self) -> BackupMetadata;
}

/// `RemoteBackup` over plain HTTP PUT/GET/HEAD.
pub struct HttpRemoteBackup {
    agent: Agent,
    object_url: String,
}

impl HttpRemoteBackup {
    /// Builds a gateway for the configured object.
    ///
    /// # Errors
    /// - `ConfigError` when the base URL is blank or not http(s).
    pub fn from_config(config: &SyncConfig) -> Result<Self, ConfigError> {
        let object_url = config.object_url()?;
        let agent = AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(IO_TIMEOUT)
            .timeout_write(IO_TIMEOUT)
            .build();
        Ok(Self { agent, object_url })
    }

    pub fn object_url(&self) -> &str {
        &self.object_url
    }

    fn cache_busted_url(&self) -> String {
        format!("{}?t={}", self.object_url, Utc::now().timestamp_millis())
    }
}

impl RemoteBackup for HttpRemoteBackup {
    fn upload(&self, payload: &str) -> SyncResult<()> {
        let started_at = Instant::now();
        let result = self
            .agent
            .put(&self.object_url)
            .set("Content-Type", JSON_CONTENT_TYPE)
            .send_string(payload);

        match result {
            Ok(response) => {
                info!(
                    "event=remote_upload module=sync status=ok http_status={} bytes={} duration_ms={}",
                    response.status(),
                    payload.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!(
                    "event=remote_upload module=sync status=error http_status={code} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(SyncError::Transport {
                    operation: "upload",
                    status: Some(code),
                    detail: body,
                })
            }
            Err(ureq::Error::Transport(err)) => {
                warn!(
                    "event=remote_upload module=sync status=error error_code=transport duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Err(SyncError::Transport {
                    operation: "upload",
                    status: None,
                    detail: err.to_string(),
                })
            }
        }
    }

    fn download(&self) -> SyncResult<DownloadOutcome> {
        let started_at = Instant::now();
        match self.agent.get(&self.cache_busted_url()).call() {
            Ok(response) => {
                let last_modified = header_value(&response, "Last-Modified");
                let payload = read_body(response).map_err(|err| SyncError::Transport {
                    operation: "download",
                    status: None,
                    detail: err.to_string(),
                })?;
                info!(
                    "event=remote_download module=sync status=ok bytes={} duration_ms={}",
                    payload.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(DownloadOutcome::Found {
                    payload,
                    last_modified,
                })
            }
            Err(ureq::Error::Status(404, _)) => {
                info!("event=remote_download module=sync status=no_backup");
                Ok(DownloadOutcome::NoBackup)
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                warn!("event=remote_download module=sync status=error http_status={code}");
                Err(SyncError::Transport {
                    operation: "download",
                    status: Some(code),
                    detail: body,
                })
            }
            Err(ureq::Error::Transport(err)) => {
                warn!("event=remote_download module=sync status=error error_code=transport");
                Err(SyncError::Transport {
                    operation: "download",
                    status: None,
                    detail: err.to_string(),
                })
            }
        }
    }

    fn check_backup_metadata(&self) -> BackupMetadata {
        match self.agent.head(&self.cache_busted_url()).call() {
            Ok(response) => BackupMetadata {
                exists: true,
                last_modified: header_value(&response, "Last-Modified"),
                size: parse_content_length(response.header("Content-Length")),
            },
            Err(err) => {
                debug!(
                    "event=remote_probe module=sync status=absent error_kind={}",
                    probe_error_kind(&err)
                );
                BackupMetadata::default()
            }
        }
    }
}

/// Reads the whole body; `Response::into_string` stops at 10 MB.
fn read_body(response: Response) -> std::io::Result<String> {
    let mut body = String::new();
    response.into_reader().read_to_string(&mut body)?;
    Ok(body)
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .header(name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_content_length(value: Option<&str>) -> Option<u64> {
    value.and_then(|raw| raw.trim().parse::<u64>().ok())
}

fn probe_error_kind(err: &ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, _) => code.to_string(),
        ureq::Error::Transport(_) => "transport".to_string(),
    }
}
