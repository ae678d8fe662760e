// Aggregates the engine integration tests as modules.
#[cfg(unix)]
mod approvals;
#[cfg(unix)]
mod exec_engine;
#[cfg(unix)]
mod permissions;

pub(crate) mod support;
