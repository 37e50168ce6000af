/// Builder for [`BackendConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BackendConfigBuilder {
    base_url: Option<String>,
}

impl BackendConfigBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom base URL for the API.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> BackendConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| "http://localhost:8000/api".to_string());
        BackendConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Configuration for the HTTP backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    pub(crate) base_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_url() {
        let config = BackendConfigBuilder::new().build();
        assert_eq!(config.base_url, "http://localhost:8000/api");
    }

    #[test]
    fn test_trailing_slashes_are_trimmed() {
        let config = BackendConfigBuilder::new()
            .with_base_url("https://example.com/api/")
            .build();
        assert_eq!(config.base_url, "https://example.com/api");
    }
}
