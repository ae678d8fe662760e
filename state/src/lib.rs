//! Mission state: an in-memory map of missions persisted as a single JSON
//! snapshot and mirrored, best effort, to a remote backend.

#![deny(clippy::print_stdout, clippy::print_stderr)]

mod error;
mod mirror;
mod snapshot;
mod store;

pub use error::StateError;
pub use mirror::MissionMirror;
pub use snapshot::load_snapshot;
pub use snapshot::write_snapshot;
/// Preferred entrypoint: owns the missions and their persistence.
pub use store::MissionStore;
pub use store::DEFAULT_HISTORY_LIMIT;
