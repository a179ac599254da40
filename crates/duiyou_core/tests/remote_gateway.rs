use duiyou_core::{
    BackupMetadata, DownloadOutcome, HttpRemoteBackup, RemoteBackup, SyncConfig, SyncError,
};
use wiremock::matchers::{body_string, header, method, path, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OBJECT_PATH: &str = "/bucket/duiyou-backup.json";

fn gateway_for(server: &MockServer) -> HttpRemoteBackup {
    let config = SyncConfig {
        remote_base_url: format!("{}/bucket/", server.uri()),
        remote_file_name: "duiyou-backup.json".to_string(),
    };
    HttpRemoteBackup::from_config(&config).unwrap()
}

/// Runs a blocking gateway call off the async test runtime.
async fn blocking<T, F>(call: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(call).await.unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_puts_json_without_cache_buster() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(OBJECT_PATH))
        .and(query_param_is_missing("t"))
        .and(header("content-type", "application/json; charset=utf-8"))
        .and(body_string(r#"{"people":[]}"#))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    assert_eq!(gateway.object_url(), format!("{}{OBJECT_PATH}", server.uri()));
    blocking(move || gateway.upload(r#"{"people":[]}"#))
        .await
        .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_upload_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("AccessDenied"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let err = blocking(move || gateway.upload("{}")).await.unwrap_err();

    match err {
        SyncError::Transport {
            operation,
            status,
            detail,
        } => {
            assert_eq!(operation, "upload");
            assert_eq!(status, Some(403));
            assert_eq!(detail, "AccessDenied");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn download_returns_payload_and_last_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Last-Modified", "Wed, 01 May 2024 10:00:00 GMT")
                .set_body_string(r#"{"people":[],"tags":["朋友"]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let outcome = blocking(move || gateway.download()).await.unwrap();

    assert_eq!(
        outcome,
        DownloadOutcome::Found {
            payload: r#"{"people":[],"tags":["朋友"]}"#.to_string(),
            last_modified: Some("Wed, 01 May 2024 10:00:00 GMT".to_string()),
        }
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].url.query().unwrap_or("").starts_with("t="));
}

#[tokio::test(flavor = "multi_thread")]
async fn download_reads_bodies_larger_than_ten_megabytes() {
    let server = MockServer::start().await;
    let avatar = "a".repeat(11 * 1024 * 1024);
    let body = format!(r#"{{"people":[{{"id":"p1","name":"big","avatar":"{avatar}"}}]}}"#);
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let outcome = blocking(move || gateway.download()).await.unwrap();

    match outcome {
        DownloadOutcome::Found { payload, .. } => {
            assert_eq!(payload.len(), body.len());
            assert!(payload.ends_with(r#""}]}"#));
        }
        DownloadOutcome::NoBackup => panic!("large object should be found"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_object_downloads_as_no_backup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let outcome = blocking(move || gateway.download()).await.unwrap();

    assert_eq!(outcome, DownloadOutcome::NoBackup);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_on_download_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let err = blocking(move || gateway.download()).await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Transport {
            operation: "download",
            status: Some(500),
            ..
        }
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn probe_reports_existing_object() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(OBJECT_PATH))
        .respond_with(
            ResponseTemplate::new(200).insert_header("Last-Modified", "Thu, 02 May 2024 11:00:00 GMT"),
        )
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let metadata = blocking(move || gateway.check_backup_metadata()).await;

    assert!(metadata.exists);
    assert_eq!(
        metadata.last_modified.as_deref(),
        Some("Thu, 02 May 2024 11:00:00 GMT")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn probe_failure_reads_as_absent() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path(OBJECT_PATH))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let gateway = gateway_for(&server);
    let metadata = blocking(move || gateway.check_backup_metadata()).await;

    assert_eq!(metadata, BackupMetadata::default());
}

#[test]
fn unreachable_host_is_transport_error() {
    let config = SyncConfig {
        remote_base_url: "http://127.0.0.1:9".to_string(),
        remote_file_name: String::new(),
    };
    let gateway = HttpRemoteBackup::from_config(&config).unwrap();

    let err = gateway.download().unwrap_err();

    assert!(matches!(
        err,
        SyncError::Transport {
            operation: "download",
            status: None,
            ..
        }
    ));
    assert!(!gateway.check_backup_metadata().exists);
}
