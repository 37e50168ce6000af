use std::pin::Pin;
use std::task::{Context, Poll, ready};

use parley_model::{ErrorKind, EventStream, StreamEvent};
use pin_project_lite::pin_project;

use crate::Error;
use crate::sse::{self, Sse};

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<StreamEvent>, Sse), Error>;

pin_project! {
    /// The live event stream of one conversation, decoded from
    /// server-sent events.
    pub struct SseEventStream {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl SseEventStream {
    #[inline]
    pub(crate) fn from_sse(sse: Sse) -> Self {
        Self {
            next_event_fut: Some(Box::pin(next_event(sse))),
        }
    }
}

impl EventStream for SseEventStream {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<StreamEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            // The stream has been exhausted.
            return Poll::Ready(Ok(None));
        };
        match ready!(next_event_fut.as_mut().poll(cx)) {
            Ok((Some(event), sse)) => {
                // The stream may still have more data to pull, create a
                // new future for the next event.
                *this.next_event_fut = Some(Box::pin(next_event(sse)));
                Poll::Ready(Ok(Some(event)))
            }
            Ok((None, _)) => {
                *this.next_event_fut = None;
                Poll::Ready(Ok(None))
            }
            Err(err) => {
                *this.next_event_fut = None;
                Poll::Ready(Err(err))
            }
        }
    }
}

/// Reads blocks until one carries a usable event.
///
/// Keep-alive pings and payloads that fail to parse are skipped; a
/// malformed payload never aborts the stream.
async fn next_event(mut sse: Sse) -> NextEvent {
    loop {
        let block = match sse.next_block().await {
            Ok(Some(block)) => block,
            Ok(None) => return Ok((None, sse)),
            Err(sse::Error::Connection) => {
                return Err(Error::new(
                    "the event stream connection failed",
                    ErrorKind::Transport,
                ));
            }
            Err(sse::Error::InvalidUtf8) => {
                return Err(Error::new(
                    "the event stream sent invalid UTF-8",
                    ErrorKind::Protocol,
                ));
            }
        };

        if block.event.as_deref() == Some("ping") {
            trace!("keep-alive ping");
            continue;
        }
        match StreamEvent::from_json(&block.data) {
            Ok(event) => {
                trace!("got stream event: {event:?}");
                return Ok((Some(event), sse));
            }
            Err(err) => {
                warn!("skipping malformed stream payload: {err}");
                continue;
            }
        }
    }
}
