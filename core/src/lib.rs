//! Policy-gated shell command execution.
//!
//! [`ExecutionEngine`] takes an [`warden_protocol::ExecutionRequest`] through
//! the permission check, shell resolution and approval gate, then hands it to
//! the process supervisor in [`exec`], streaming output through an
//! [`ExecEventSink`] as it arrives.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod approval;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod exec;
pub mod exec_env;
pub mod output;
pub mod registry;
pub mod shell;

pub use approval::ApprovalProvider;
pub use approval::FixedApproval;
pub use config::Config;
pub use config::ConfigOverrides;
pub use engine::EngineConfig;
pub use engine::ExecutionEngine;
pub use error::ExecError;
pub use error::ShellResolutionError;
pub use events::ExecEventSink;
pub use shell::AvailableShells;
pub use shell::detect_available;
pub use shell::resolve;
