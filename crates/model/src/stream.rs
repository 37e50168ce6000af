use std::pin::Pin;
use std::task::{self, Poll};

use crate::backend::BackendError;
use crate::event::StreamEvent;

/// The live event stream of one conversation.
///
/// This is the abstract subscription interface: any concrete transport (a
/// long-lived HTTP stream, a socket, polling) can implement it, and the
/// session layer stays transport-agnostic. Cancellation is expressed by
/// dropping the stream.
pub trait EventStream: Sized + Send + 'static {
    /// The error type that may be returned by the stream.
    type Error: BackendError;

    /// Attempts to pull out the next event from the stream.
    ///
    /// # Return value
    ///
    /// There are several possible return values, each indicating a
    /// distinct stream state:
    ///
    /// - `Poll::Pending` means that the stream is still waiting for the
    ///   next event. Implementations will ensure that the current task
    ///   will be notified when the next event may be ready.
    /// - `Poll::Ready(Ok(Some(event)))` means the stream has an event to
    ///   deliver, and may produce further events on subsequent
    ///   `poll_next_event` calls.
    /// - `Poll::Ready(Ok(None))` means the stream has ended.
    /// - `Poll::Ready(Err(error))` means a transport-level failure
    ///   occurred; no further events will be delivered.
    ///
    /// Calling this method after completion should always return `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<StreamEvent>, Self::Error>>;
}
