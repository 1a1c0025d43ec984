//! Runtime configuration.

/// Application configuration, resolved from CLI flags and environment
/// variables before the server starts.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Upstream base url proxied requests are appended to, without a
    /// trailing slash (e.g. `http://origin.internal:8080`).
    pub base_url: String,
    /// Socket address the proxy listens on.
    pub bind_addr: String,
}

impl AppConfig {
    pub fn new(base_url: String, bind_addr: String) -> anyhow::Result<Self> {
        let parsed = reqwest::Url::parse(&base_url)
            .map_err(|e| anyhow::anyhow!("invalid base url {base_url:?}: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("base url must be http or https, got {base_url:?}");
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            bind_addr,
        })
    }
}
