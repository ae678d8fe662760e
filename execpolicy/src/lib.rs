#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod decision;
pub mod policy;
pub mod whitelist;

pub use decision::AllowReason;
pub use decision::Decision;
pub use decision::DenyReason;
pub use policy::PermissionPolicy;
pub use whitelist::DEFAULT_WHITELIST;
pub use whitelist::default_whitelist;
pub use whitelist::find_match;
pub use whitelist::matches;
