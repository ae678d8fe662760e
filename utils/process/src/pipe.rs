use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Child;
use tokio::process::ChildStderr;
use tokio::process::ChildStdout;
use tokio::process::Command;
use tracing::debug;

/// A spawned child whose output pipes have been taken for the caller to drain.
#[derive(Debug)]
pub struct SpawnedChild {
    pub child: Child,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
    pub pid: u32,
}

impl SpawnedChild {
    /// Forcefully terminate the child. On Unix the whole process group is
    /// killed; elsewhere only the tracked process.
    pub fn kill(&mut self) -> io::Result<()> {
        #[cfg(unix)]
        {
            // The child leads its own group, so its pid is the group id.
            crate::process_group::kill_process_group(self.pid)?;
            // Reaps nothing on its own; `wait` still has to be awaited.
            let _ = self.child.start_kill();
            Ok(())
        }

        #[cfg(not(unix))]
        {
            match self.child.start_kill() {
                Err(err) if err.kind() != io::ErrorKind::InvalidInput => Err(err),
                _ => Ok(()),
            }
        }
    }
}

/// Spawn `program args..` with piped stdout/stderr and stdin closed.
///
/// The environment is replaced wholesale by `env`. On Unix the child starts a
/// new session so [`SpawnedChild::kill`] reaches every descendant, and on Linux
/// it is sent SIGTERM if this process dies first.
pub fn spawn_piped_process(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    env: &HashMap<String, String>,
) -> io::Result<SpawnedChild> {
    if program.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "missing program for pipe spawn",
        ));
    }

    let mut command = Command::new(program);
    #[cfg(target_os = "linux")]
    let parent_pid = unsafe { libc::getpid() };
    #[cfg(unix)]
    unsafe {
        command.pre_exec(move || {
            crate::process_group::detach_from_tty()?;
            #[cfg(target_os = "linux")]
            crate::process_group::set_parent_death_signal(parent_pid)?;
            Ok(())
        });
    }
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    command.env_clear();
    command.envs(env);
    command.args(args);
    command.stdin(Stdio::null());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);

    let mut child = command.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("missing child pid"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout pipe was unexpectedly not available"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr pipe was unexpectedly not available"))?;
    debug!(program, pid, "spawned child process");

    Ok(SpawnedChild {
        child,
        stdout,
        stderr,
        pid,
    })
}
