/**
 * Flush-on-drop guard returned by `init()`.
 *
 * ```ignore
 * fn main() {
 *     let _guard = dockthor_core::init(("token", "private-key")).unwrap();
 *     // ... application code ...
 * }   // detached deliveries are drained here (up to 2 s)
 * ```
 *
 * The guard does not own the client, which lives in a `static OnceLock`;
 * it only triggers the flush when it goes out of scope.
 */
use crate::client::{self, FLUSH_TIMEOUT};

pub struct Guard {
    _private: (),
}

impl Guard {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }
}

impl Drop for Guard {
    fn drop(&mut self) {
        if let Some(client) = client::get_client() {
            if !client.flush(FLUSH_TIMEOUT) {
                tracing::warn!("flush timed out, some events may not have been sent");
            }
        }
    }
}
