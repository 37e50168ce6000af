use parley_core::{Session, SessionBuilder, SessionState};
use parley_http_backend::{BackendConfigBuilder, HttpBackend};
use parley_model::{ApiKeys, StreamEvent};

/// A builder for a ready-to-use session against an HTTP deliberation
/// backend.
///
/// This is a thin wrapper around [`parley_core::SessionBuilder`] wired
/// to the HTTP transport.
///
/// See [`parley_core::Session`].
#[derive(Default)]
pub struct ClientBuilder {
    base_url: Option<String>,
    api_keys: ApiKeys,
    max_rounds: Option<u32>,
    show_reasoning: Option<bool>,
    on_event: Option<Box<dyn Fn(&StreamEvent, &SessionState) + Send + Sync>>,
}

impl ClientBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom base URL for the backend API.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the provider credentials forwarded when a deliberation
    /// starts.
    #[inline]
    pub fn with_api_keys(mut self, api_keys: ApiKeys) -> Self {
        self.api_keys = api_keys;
        self
    }

    /// Sets the deliberation depth.
    #[inline]
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    /// Sets the initial reasoning-visibility toggle.
    #[inline]
    pub fn with_show_reasoning(mut self, show: bool) -> Self {
        self.show_reasoning = Some(show);
        self
    }

    /// Attaches a callback to be invoked after every applied stream
    /// event.
    #[inline]
    pub fn on_event(
        mut self,
        on_event: impl Fn(&StreamEvent, &SessionState) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Some(Box::new(on_event));
        self
    }

    /// Builds the session.
    pub fn build(self) -> Session<HttpBackend> {
        let mut config = BackendConfigBuilder::new();
        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }
        let backend = HttpBackend::new(config.build());

        let mut builder = SessionBuilder::with_backend(backend)
            .with_api_keys(self.api_keys);
        if let Some(max_rounds) = self.max_rounds {
            builder = builder.with_max_rounds(max_rounds);
        }
        if let Some(show) = self.show_reasoning {
            builder = builder.with_show_reasoning(show);
        }
        if let Some(on_event) = self.on_event {
            builder = builder.on_event(on_event);
        }
        builder.build()
    }
}
