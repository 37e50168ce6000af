use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::{poll_fn, ready};
use std::pin::{Pin, pin};
use std::task::{self, Poll, ready};
use std::time::Duration;

use parley_model::{
    ConversationId, DeliberationBackend, ErrorKind, EventStream,
    HistoryMessage, StartRequest, StreamEvent,
};
use tokio::time::{Sleep, sleep};

#[derive(Debug)]
struct FakeBackendError(ErrorKind);

impl Display for FakeBackendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for FakeBackendError {}

impl parley_model::BackendError for FakeBackendError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

#[derive(Debug)]
struct FakeEventStream {
    fake_events: VecDeque<StreamEvent>,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl FakeEventStream {
    fn new(question: &str) -> Self {
        // One agent answers the question word by word, then the backend
        // signals completion.
        let mut fake_events: VecDeque<StreamEvent> =
            format!("You asked {question}")
                .split(' ')
                .map(|word| StreamEvent::Token {
                    agent: "Echo".to_owned(),
                    content: format!("{word} "),
                    round: 1,
                })
                .collect();
        fake_events.push_back(StreamEvent::Final { result: None });
        Self {
            fake_events,
            sleep: None,
        }
    }
}

impl EventStream for FakeEventStream {
    type Error = FakeBackendError;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<StreamEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(sleep) = &mut this.sleep {
            ready!(sleep.as_mut().poll(cx));
            this.sleep = None;
            return Poll::Ready(Ok(this.fake_events.pop_front()));
        }
        this.sleep = Some(Box::pin(sleep(Duration::from_millis(1))));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Clone)]
struct FakeBackend;

impl DeliberationBackend for FakeBackend {
    type Error = FakeBackendError;
    type Stream = FakeEventStream;

    fn start(
        &self,
        req: &StartRequest,
    ) -> impl Future<Output = Result<ConversationId, Self::Error>> + Send + 'static
    {
        ready(Ok(ConversationId::new(format!(
            "conversation:{}",
            req.question.len()
        ))))
    }

    fn history(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Vec<HistoryMessage>, Self::Error>> + Send + 'static
    {
        let _ = id;
        ready(Ok(vec![]))
    }

    fn open_stream(
        &self,
        id: &ConversationId,
    ) -> impl Future<Output = Result<Self::Stream, Self::Error>> + Send + 'static
    {
        let question = id.as_str().to_owned();
        ready(Ok(FakeEventStream::new(&question)))
    }
}

#[tokio::test]
async fn test_fake_backend() {
    let backend = FakeBackend;
    let id = backend
        .start(&StartRequest {
            question: "why?".to_owned(),
            api_keys: Default::default(),
            max_rounds: 1,
        })
        .await
        .unwrap();
    assert_eq!(id.as_str(), "conversation:4");

    let stream = backend.open_stream(&id).await.unwrap();
    let mut stream = pin!(stream);
    let mut content = String::new();
    let mut saw_final = false;
    while let Some(event) =
        poll_fn(|cx| stream.as_mut().poll_next_event(cx))
            .await
            .unwrap()
    {
        match event {
            StreamEvent::Token { content: chunk, .. } => {
                content.push_str(&chunk);
            }
            StreamEvent::Final { .. } => saw_final = true,
            event => panic!("unexpected event: {event:?}"),
        }
    }
    assert_eq!(content, "You asked conversation:4 ");
    assert!(saw_final);
}
