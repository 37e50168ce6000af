//! A scripted in-process backend for testing purpose.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use parley_model::{
    BackendError, ConversationId, DeliberationBackend, ErrorKind,
    EventStream, HistoryMessage, StartRequest, StreamEvent,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
pub struct Error {
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
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

#[derive(Debug, Default)]
struct CallCounters {
    start: AtomicUsize,
    history: AtomicUsize,
    stream: AtomicUsize,
}

/// A scripted deliberation backend for tests.
///
/// Configure the stream events, the authoritative history, and the
/// failures before handing the backend to a session. Clones share the
/// same call counters, so tests can keep a clone around to assert how
/// the session talked to the backend.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestBackend {
    events: Vec<StreamEvent>,
    fault_after_events: bool,
    history: Vec<HistoryMessage>,
    fail_start: bool,
    fail_history: bool,
    delay: Option<Duration>,
    calls: Arc<CallCounters>,
}

impl TestBackend {
    /// Creates a backend with an empty script.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the events the live stream delivers, in order. After the last
    /// one the stream ends gracefully unless a fault is scripted.
    #[inline]
    pub fn with_events(
        mut self,
        events: impl Into<Vec<StreamEvent>>,
    ) -> Self {
        self.events = events.into();
        self
    }

    /// Ends the stream with a transport fault instead of a graceful end.
    #[inline]
    pub fn with_stream_fault(mut self) -> Self {
        self.fault_after_events = true;
        self
    }

    /// Sets the authoritative history served for the conversation.
    #[inline]
    pub fn with_history(
        mut self,
        history: impl Into<Vec<HistoryMessage>>,
    ) -> Self {
        self.history = history.into();
        self
    }

    /// Makes the start call fail.
    #[inline]
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Makes every history fetch fail.
    #[inline]
    pub fn with_history_failure(mut self) -> Self {
        self.fail_history = true;
        self
    }

    /// Delays each stream event by `duration`.
    #[inline]
    pub fn with_event_delay(mut self, duration: Duration) -> Self {
        self.delay = Some(duration);
        self
    }

    /// Number of start calls the backend has observed.
    #[inline]
    pub fn start_calls(&self) -> usize {
        self.calls.start.load(Ordering::Relaxed)
    }

    /// Number of history fetches the backend has observed.
    #[inline]
    pub fn history_calls(&self) -> usize {
        self.calls.history.load(Ordering::Relaxed)
    }

    /// Number of stream opens the backend has observed.
    #[inline]
    pub fn stream_calls(&self) -> usize {
        self.calls.stream.load(Ordering::Relaxed)
    }
}

impl Debug for TestBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestBackend")
            .field("events", &self.events.len())
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

impl DeliberationBackend for TestBackend {
    type Error = Error;
    type Stream = TestEventStream;

    fn start(
        &self,
        req: &StartRequest,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static
    {
        let _ = req;
        self.calls.start.fetch_add(1, Ordering::Relaxed);
        let result = if self.fail_start {
            Err(Error {
                message: "scripted start failure",
                kind: ErrorKind::Rejected,
            })
        } else {
            Ok(ConversationId::new("test-conversation"))
        };
        ready(result)
    }

    fn history(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Self::Error>> + Send + 'static
    {
        let _ = id;
        self.calls.history.fetch_add(1, Ordering::Relaxed);
        let result = if self.fail_history {
            Err(Error {
                message: "scripted history failure",
                kind: ErrorKind::Transport,
            })
        } else {
            Ok(self.history.clone())
        };
        ready(result)
    }

    fn open_stream(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let _ = id;
        self.calls.stream.fetch_add(1, Ordering::Relaxed);
        ready(Ok(TestEventStream {
            events: self.events.clone().into(),
            fault: self.fault_after_events,
            delay: self.delay,
            sleep: None,
        }))
    }
}

/// The scripted live stream produced by [`TestBackend::open_stream`].
pub struct TestEventStream {
    events: VecDeque<StreamEvent>,
    fault: bool,
    delay: Option<Duration>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl EventStream for TestEventStream {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<StreamEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(match this.events.pop_front() {
                Some(event) => Ok(Some(event)),
                None if this.fault => {
                    // Fault once, then behave like an ended stream in case
                    // the caller keeps polling.
                    this.fault = false;
                    Err(Error {
                        message: "scripted stream fault",
                        kind: ErrorKind::Transport,
                    })
                }
                None => Ok(None),
            });
        }
        this.sleep = Some(Box::pin(sleep(
            this.delay.unwrap_or(Duration::from_millis(1)),
        )));
        Pin::new(this).poll_next_event(cx)
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    fn token(content: &str) -> StreamEvent {
        StreamEvent::Token {
            agent: "Gemini".to_owned(),
            content: content.to_owned(),
            round: 1,
        }
    }

    #[tokio::test]
    async fn test_scripted_stream() {
        let backend = TestBackend::new()
            .with_events([token("Hel"), token("lo")]);
        let id = ConversationId::new("test-conversation");
        let stream = backend.open_stream(&id).await.unwrap();
        let mut stream = pin!(stream);

        let mut content = String::new();
        while let Some(event) =
            poll_fn(|cx| stream.as_mut().poll_next_event(cx))
                .await
                .unwrap()
        {
            if let StreamEvent::Token { content: chunk, .. } = event {
                content.push_str(&chunk);
            }
        }
        assert_eq!(content, "Hello");
        assert_eq!(backend.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_scripted_fault_fires_after_events() {
        let backend = TestBackend::new()
            .with_events([token("Hi")])
            .with_stream_fault();
        let id = ConversationId::new("test-conversation");
        let stream = backend.open_stream(&id).await.unwrap();
        let mut stream = pin!(stream);

        let first = poll_fn(|cx| stream.as_mut().poll_next_event(cx)).await;
        assert!(matches!(first, Ok(Some(StreamEvent::Token { .. }))));
        let second = poll_fn(|cx| stream.as_mut().poll_next_event(cx)).await;
        assert!(second.is_err());
        let third = poll_fn(|cx| stream.as_mut().poll_next_event(cx)).await;
        assert!(matches!(third, Ok(None)));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let backend = TestBackend::new()
            .with_start_failure()
            .with_history_failure();
        let req = StartRequest {
            question: "Hi".to_owned(),
            api_keys: Default::default(),
            max_rounds: 1,
        };
        assert!(backend.start(&req).await.is_err());
        let id = ConversationId::new("test-conversation");
        assert!(backend.history(&id).await.is_err());
        assert_eq!(backend.start_calls(), 1);
        assert_eq!(backend.history_calls(), 1);
    }
}
