/**
 * Process-wide host metadata attached to every event.
 *
 * Hostname, OS release, compiler version and working directory are
 * collected once on first use and cached in a `OnceLock` for the life of
 * the process, so the message capture path never repeats the syscalls.
 * Any value that cannot be read is replaced by `"unknown"`.
 */
use std::sync::OnceLock;

use super::constants::UNKNOWN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMetadata {
    pub hostname: String,
    pub os_name: String,
    pub os_release: String,
    pub rust_version: String,
    pub cwd: String,
}

static HOST: OnceLock<HostMetadata> = OnceLock::new();

/// Returns the cached metadata, collecting it on the first call.
pub fn host() -> &'static HostMetadata {
    HOST.get_or_init(HostMetadata::collect)
}

impl HostMetadata {
    fn collect() -> Self {
        let (hostname, os_release) = uname().unwrap_or_else(fallback_uname);

        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| UNKNOWN.to_string());

        Self {
            hostname: non_empty(hostname),
            os_name: std::env::consts::OS.to_string(),
            os_release: non_empty(os_release),
            rust_version: env!("DOCKTHOR_RUSTC_VERSION").to_string(),
            cwd,
        }
    }
}

fn non_empty(value: String) -> String {
    if value.trim().is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

#[cfg(unix)]
fn uname() -> Option<(String, String)> {
    use std::ffi::CStr;

    // SAFETY: `utsname` is plain C data; an all-zero value is valid and
    // `uname` fills it in place.
    let mut buf: libc::utsname = unsafe { std::mem::zeroed() };
    if unsafe { libc::uname(&mut buf) } != 0 {
        return None;
    }

    // SAFETY: on success every field is a NUL-terminated string.
    let field = |raw: &[libc::c_char]| {
        unsafe { CStr::from_ptr(raw.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    };

    Some((field(&buf.nodename), field(&buf.release)))
}

#[cfg(not(unix))]
fn uname() -> Option<(String, String)> {
    None
}

fn fallback_uname() -> (String, String) {
    let hostname = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| UNKNOWN.to_string());
    (hostname, UNKNOWN.to_string())
}
