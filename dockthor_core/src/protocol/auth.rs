/**
 * Ingestion endpoint resolution.
 *
 * A project is addressed by its public `token`, which is embedded in the
 * URL path. The `private_key` never appears in a URL; the transport sends
 * it as a bearer token.
 *
 * ```text
 * {scheme}://{host}{path}/{token}/project/       single events
 * {scheme}://{host}{path}/{token}/transaction/   transactions
 * ```
 *
 * Every function here is a pure string build. Tokens are passed through
 * verbatim; URL validity is the caller's concern.
 */
use super::constants::{DEFAULT_HOST, DEFAULT_PATH, DEFAULT_SCHEME};

/**
 * Credentials plus the endpoint template they are resolved against.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthData {
    pub token: String,
    pub private_key: String,
    pub scheme: String,
    pub host: String,
    pub path: String,
}

impl AuthData {
    /**
     * Builds `AuthData` for the default ingestion host.
     */
    pub fn new(token: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            private_key: private_key.into(),
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Overrides the endpoint scheme (e.g. `"http"` for a local collector).
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Overrides the endpoint host, optionally including a port.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Overrides the path prefix placed before the token.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// `{scheme}://{host}{path}/{token}`
    pub fn base_url(&self) -> String {
        format!("{}://{}{}/{}", self.scheme, self.host, self.path, self.token)
    }

    /// Endpoint for plain (exception / message) events.
    pub fn project_url(&self) -> String {
        format!("{}/project/", self.base_url())
    }

    /// Endpoint for transactions.
    pub fn transaction_url(&self) -> String {
        format!("{}/transaction/", self.base_url())
    }

    /// Value of the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.private_key)
    }
}
