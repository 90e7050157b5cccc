use std::env;

use crate::constant::DEFAULT_HOST;

/// Client configuration. Build with the `with_*` methods or pull from the
/// environment (`NAI_TOKEN`, `NAI_HOST`, `NAI_OPUS`).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Opus subscription tier; affects cost estimation logging only.
    pub opus: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            token: None,
            timeout_secs: 120,
            opus: false,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let host = env::var("NAI_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let token = env::var("NAI_TOKEN").ok();
        let opus = env::var("NAI_OPUS").ok().map_or(false, |val| val == "true");

        ClientConfig {
            host,
            token,
            opus,
            ..Default::default()
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_opus(mut self, opus: bool) -> Self {
        self.opus = opus;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_the_image_host() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "https://image.novelai.net");
        assert!(config.token.is_none());
        assert_eq!(config.timeout_secs, 120);
        assert!(!config.opus);
    }

    #[test]
    fn builders_chain() {
        let config = ClientConfig::new()
            .with_host("https://example.test")
            .with_token("pst-abc")
            .with_timeout(30)
            .with_opus(true);
        assert_eq!(config.host, "https://example.test");
        assert_eq!(config.token.as_deref(), Some("pst-abc"));
        assert_eq!(config.timeout_secs, 30);
        assert!(config.opus);
    }
}
