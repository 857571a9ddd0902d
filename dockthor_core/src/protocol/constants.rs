/**
 * SDK-wide constants.
 *
 * These values are baked into every payload and identify the SDK,
 * the platform, and the default ingestion endpoint to the backend.
 */

/// SDK name reported in the `sdk` block of every payload.
pub const SDK_NAME: &str = "dockthor.rust";

/// SDK version reported in the `sdk` block (current schema).
/// Derived at compile time from the `dockthor_core` package version.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// SDK version string the legacy schema always reported.
pub const LEGACY_SDK_VERSION: &str = "1.0.0";

/// Platform identifier attached to every event.
pub const PLATFORM: &str = "rust";

/// Default ingestion scheme, host and path prefix.
pub const DEFAULT_SCHEME: &str = "https";
pub const DEFAULT_HOST: &str = "pab.creativa.studio";
pub const DEFAULT_PATH: &str = "/api/v1";

/// Environment name used when the host application does not set one.
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Initial processing status the backend expects on freshly sent events.
pub const INITIAL_STATUS: &str = "Pending";

/// Tag key under which span statuses are mirrored into the event.
pub const HTTP_STATUS_TAG: &str = "http.status_code";

/// Placeholder used when a piece of host metadata cannot be collected.
pub const UNKNOWN: &str = "unknown";
