//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard CCOA configuration.
///
/// Config: 30s connect timeout, 120s request timeout, rustls TLS,
/// `ccoa/{version}` user-agent, redirect limit 10. Falls back to a plain
/// client if the builder rejects the configuration.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("ccoa/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("failed to build configured HTTP client: {e}");
            reqwest::Client::new()
        })
}

/// Strip trailing slashes so `format!("{base}/path")` never doubles them.
pub(crate) fn trim_base_url(mut base_url: String) -> String {
    while base_url.ends_with('/') {
        base_url.pop();
    }
    base_url
}
