//! Wire and data types shared by every warden crate.
//!
//! Nothing in here performs I/O: the types describe what flows between the
//! transport, the execution engine and the mission store.

pub mod approvals;
pub mod exec;
pub mod message;
pub mod mission;
pub mod permissions;

pub use exec::ExecEvent;
pub use exec::ExecOutputStream;
pub use exec::ExecutionMode;
pub use exec::ExecutionRequest;
pub use exec::ExecutionResult;
pub use exec::ExecutionStatus;
pub use exec::ShellType;
pub use permissions::PermissionSet;
pub use message::InboundMessage;
pub use message::OutboundMessage;
pub use mission::CommandRecord;
pub use mission::Mission;
pub use mission::MissionStats;
pub use mission::MissionStatus;
