//! HTTP mirror of the mission store.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod client;
mod error;

pub use client::Client;
pub use client::MUTATION_TIMEOUT;
pub use client::PULL_TIMEOUT;
pub use error::BackendError;
