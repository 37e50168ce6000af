//! Session control and transcript reconciliation for deliberation
//! conversations.
//!
//! The session owns one end-to-end deliberation: it submits the question,
//! consumes the live event stream, folds every event into the transcript,
//! and falls back to the backend's authoritative history at terminal
//! points.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod session;
pub mod transcript;

pub use session::{
    CloseHandle, Session, SessionBuilder, SessionError, SessionState,
};
