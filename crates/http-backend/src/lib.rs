//! A deliberation backend served over HTTP with a server-sent event
//! stream.

#[macro_use]
extern crate tracing;

mod config;
mod sse;
mod stream;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use mime::Mime;
use parley_model::{
    BackendError, ConversationId, DeliberationBackend, ErrorKind,
    HistoryMessage, StartRequest,
};
use reqwest::{Client, Response, header};
use serde::Deserialize;

pub use config::{BackendConfig, BackendConfigBuilder};
use sse::{ByteSource, Sse};
pub use stream::SseEventStream;

/// Error type for [`HttpBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_status() {
            ErrorKind::Rejected
        } else if err.is_connect() || err.is_timeout() {
            ErrorKind::Transport
        } else if err.is_decode() {
            ErrorKind::Protocol
        } else {
            ErrorKind::Other
        };
        Self::new(format!("{err}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[derive(Deserialize)]
struct StartResponse {
    conversation_id: ConversationId,
}

/// HTTP transport for the deliberation backend.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<BackendConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    #[inline]
    pub fn new(config: BackendConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl DeliberationBackend for HttpBackend {
    type Error = Error;
    type Stream = SseEventStream;

    fn start(
        &self,
        req: &StartRequest,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .post(format!(
                "{}/conversation/start/",
                self.config.base_url
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .json(req)
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;
            let resp: StartResponse =
                resp.json().await.map_err(Error::from_reqwest)?;
            Ok(resp.conversation_id)
        }
    }

    fn history(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .get(format!(
                "{}/conversation/{id}/history/",
                self.config.base_url
            ))
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;
            let messages: Vec<HistoryMessage> =
                resp.json().await.map_err(Error::from_reqwest)?;
            Ok(messages)
        }
    }

    fn open_stream(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let resp_fut = self
            .client
            .get(format!(
                "{}/conversation/{id}/stream/",
                self.config.base_url
            ))
            .header(header::ACCEPT, "text/event-stream")
            .send();

        async move {
            let resp = resp_fut
                .await
                .and_then(Response::error_for_status)
                .map_err(Error::from_reqwest)?;

            let content_type = resp
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            let is_event_stream = content_type
                .and_then(|v| v.parse().ok())
                .map(|m: Mime| {
                    m.type_() == mime::TEXT
                        && m.subtype() == mime::EVENT_STREAM
                })
                .unwrap_or(false);
            if !is_event_stream {
                return Err(Error::new(
                    format!("unexpected content type: {content_type:?}"),
                    ErrorKind::Protocol,
                ));
            }

            // Here we got a live event stream.
            let source = ByteSource::from_response(resp);
            Ok(SseEventStream::from_sse(Sse::new(source)))
        }
    }
}
