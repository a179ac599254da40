//! Record id and timestamp generation.
//!
//! # Invariants
//! - Ids have the shape `{prefix}_{epochMillis}_{suffix}` where `suffix` is
//!   nine base36 characters.
//! - The millisecond component is strictly increasing within one process,
//!   so two ids generated by this process never collide.

use chrono::{SecondsFormat, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Current UTC time as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generates a fresh record id with the given prefix.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}_{}", next_millis(), random_suffix())
}

fn next_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_ID_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(if now > last { now } else { last + 1 })
        })
        .unwrap_or(now);
    if now > previous {
        now
    } else {
        previous + 1
    }
}

fn random_suffix() -> String {
    let mut value = Uuid::new_v4().as_u128();
    let mut suffix = String::with_capacity(SUFFIX_LEN);
    for _ in 0..SUFFIX_LEN {
        suffix.push(char::from(BASE36[(value % 36) as usize]));
        value /= 36;
    }
    suffix
}
