use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use warden_execpolicy::DenyReason;
use warden_protocol::ExecutionStatus;
use warden_protocol::ShellType;

pub type Result<T> = std::result::Result<T, ExecError>;

/// Why a request ended without a successful run. A non-zero exit is not an
/// error: it is a `Failed` result carrying the exit code.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("empty command")]
    EmptyCommand,

    #[error("permission denied: {0}")]
    PermissionDenied(DenyReason),

    #[error(transparent)]
    ShellResolution(#[from] ShellResolutionError),

    #[error("command rejected")]
    Rejected,

    #[error("failed to spawn command: {0}")]
    Spawn(#[source] io::Error),

    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("command cancelled")]
    Cancelled,
}

impl ExecError {
    /// Terminal status reported for a request that ended with this error.
    pub fn status(&self) -> ExecutionStatus {
        match self {
            ExecError::EmptyCommand | ExecError::ShellResolution(_) | ExecError::Spawn(_) => {
                ExecutionStatus::Failed
            }
            ExecError::PermissionDenied(_) => ExecutionStatus::PermissionDenied,
            ExecError::Rejected => ExecutionStatus::Rejected,
            ExecError::Timeout(_) => ExecutionStatus::Timeout,
            ExecError::Cancelled => ExecutionStatus::Cancelled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellResolutionError {
    #[error("shell {requested} is not available (available: {})", join_shells(.available))]
    NotAvailable {
        requested: ShellType,
        available: Vec<ShellType>,
    },
    #[error("no shell available")]
    NoShellAvailable,
}

fn join_shells(shells: &[ShellType]) -> String {
    shells
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to locate warden home: {0}")]
    Home(#[source] io::Error),
}
