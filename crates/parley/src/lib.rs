//! An out-of-the-box client for multi-agent deliberation backends.
//!
//! The crate includes a CLI tool for running deliberations in the
//! terminal. And you can also use it as a library to bring the client
//! into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod client;

pub use client::ClientBuilder;

/// Re-exports of [`parley_core`] crate.
pub mod core {
    pub use parley_core::*;
}

/// Re-exports of [`parley_model`] crate.
pub mod model {
    pub use parley_model::*;
}
