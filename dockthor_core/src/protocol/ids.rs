/**
 * Random identifiers and timestamps.
 *
 * Ids are lowercase hex strings drawn from the thread-local CSPRNG. Their
 * lengths are fixed by the ingestion protocol: 32 chars for trace and event
 * ids, 16 chars for span ids.
 */
use chrono::{SecondsFormat, Utc};
use rand::RngCore;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// 16 random bytes, hex-encoded. Used by all event kinds.
pub fn event_id() -> String {
    random_hex(16)
}

/// 16 random bytes, hex-encoded.
pub fn trace_id() -> String {
    random_hex(16)
}

/// 8 random bytes, hex-encoded.
pub fn span_id() -> String {
    random_hex(8)
}

/// Current UTC time as fractional seconds since the Unix epoch.
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Current UTC time as ISO-8601 with a `Z` suffix.
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
