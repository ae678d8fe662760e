pub mod pipe;
pub mod process_group;

/// Spawn a non-interactive child with piped stdout/stderr and a closed stdin.
pub use pipe::spawn_piped_process;
/// Child handles returned by [`spawn_piped_process`].
pub use pipe::SpawnedChild;

/// Exit codes reported for signal-terminated children are `128 + signal`.
pub const EXIT_CODE_SIGNAL_BASE: i32 = 128;

/// Map an [`std::process::ExitStatus`] to a shell-style exit code.
pub fn exit_code(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return EXIT_CODE_SIGNAL_BASE + signal;
        }
    }
    -1
}
