//! Supervised execution of a single child process: concurrent draining of
//! stdout/stderr with live emission, raced against the timeout and external
//! cancellation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;
use warden_protocol::ExecEvent;
use warden_protocol::ExecOutputStream;
use warden_protocol::ExecutionStatus;
use warden_utils_process::exit_code;
use warden_utils_process::spawn_piped_process;

use crate::error::ExecError;
use crate::events::ExecEventSink;
use crate::output::OutputCapture;
use crate::output::Utf8ChunkDecoder;

/// Size of a single read from a child pipe.
pub const READ_CHUNK_BYTES: usize = 4096;

/// How long to keep draining pipes after a forced kill. Descendants that
/// escaped the kill can hold a pipe open indefinitely.
const POST_KILL_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct ExecParams {
    pub request_id: String,
    /// Full argv: the shell prefix followed by the command text.
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Why a child was killed before it finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Timeout,
    Cancelled,
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: OutputCapture,
    pub stderr: OutputCapture,
    pub duration: Duration,
    pub termination: Option<Termination>,
}

impl ProcessOutput {
    /// The error describing a forced termination, if any.
    pub fn termination_error(&self, timeout: Duration) -> Option<ExecError> {
        self.termination.map(|termination| match termination {
            Termination::Timeout => ExecError::Timeout(timeout),
            Termination::Cancelled => ExecError::Cancelled,
        })
    }
}

struct StreamState {
    stream: ExecOutputStream,
    capture: OutputCapture,
    decoder: Utf8ChunkDecoder,
}

impl StreamState {
    fn new(stream: ExecOutputStream, max_output_bytes: usize) -> Self {
        Self {
            stream,
            capture: OutputCapture::new(max_output_bytes),
            decoder: Utf8ChunkDecoder::new(),
        }
    }
}

/// Spawns `params.argv` and supervises it to completion, timeout or
/// cancellation. `running` is emitted once the child exists; only a spawn
/// failure is returned as an error.
pub async fn run_supervised(
    params: ExecParams,
    events: &dyn ExecEventSink,
    cancel: &CancellationToken,
) -> Result<ProcessOutput, ExecError> {
    let ExecParams {
        request_id,
        argv,
        cwd,
        env,
        timeout,
        max_output_bytes,
    } = params;

    let start = Instant::now();
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ExecError::Spawn(std::io::Error::other("missing program")))?;
    let mut spawned = spawn_piped_process(program, args, cwd.as_deref(), &env)
        .map_err(ExecError::Spawn)?;
    events
        .send_event(ExecEvent::status(&request_id, ExecutionStatus::Running))
        .await;

    let mut stdout = StreamState::new(ExecOutputStream::Stdout, max_output_bytes);
    let mut stderr = StreamState::new(ExecOutputStream::Stderr, max_output_bytes);

    let termination = {
        let run = async {
            tokio::join!(
                read_output_stream(&mut spawned.stdout, &mut stdout, &request_id, events),
                read_output_stream(&mut spawned.stderr, &mut stderr, &request_id, events),
                spawned.child.wait(),
            )
        };
        tokio::select! {
            (_, _, status) = run => {
                let code = match status {
                    Ok(status) => Some(exit_code(status)),
                    Err(err) => {
                        warn!(request_id = %request_id, "failed to wait for child: {err}");
                        None
                    }
                };
                return Ok(finish(code, stdout, stderr, start, None, events, &request_id).await);
            }
            _ = tokio::time::sleep(timeout) => Termination::Timeout,
            _ = cancel.cancelled() => Termination::Cancelled,
        }
    };

    match termination {
        Termination::Timeout => {
            warn!(
                request_id = %request_id,
                timeout_secs = timeout.as_secs(),
                "command timed out; killing process group"
            );
        }
        Termination::Cancelled => {
            warn!(request_id = %request_id, "command cancelled; killing process group");
        }
    }
    if let Err(err) = spawned.kill() {
        warn!(request_id = %request_id, "failed to kill child: {err}");
    }
    let code = match spawned.child.wait().await {
        Ok(status) => Some(exit_code(status)),
        Err(err) => {
            warn!(request_id = %request_id, "failed to wait for killed child: {err}");
            None
        }
    };

    let drain = async {
        tokio::join!(
            read_output_stream(&mut spawned.stdout, &mut stdout, &request_id, events),
            read_output_stream(&mut spawned.stderr, &mut stderr, &request_id, events),
        )
    };
    if tokio::time::timeout(POST_KILL_DRAIN_GRACE, drain).await.is_err() {
        debug!(
            request_id = %request_id,
            "pipes still open after kill; abandoning remaining output"
        );
    }

    Ok(finish(code, stdout, stderr, start, Some(termination), events, &request_id).await)
}

async fn finish(
    exit_code: Option<i32>,
    mut stdout: StreamState,
    mut stderr: StreamState,
    start: Instant,
    termination: Option<Termination>,
    events: &dyn ExecEventSink,
    request_id: &str,
) -> ProcessOutput {
    for state in [&mut stdout, &mut stderr] {
        let tail = state.decoder.finish();
        if !tail.is_empty() {
            events
                .send_event(ExecEvent::output(request_id, state.stream, tail))
                .await;
        }
    }
    ProcessOutput {
        exit_code,
        stdout: stdout.capture,
        stderr: stderr.capture,
        duration: start.elapsed(),
        termination,
    }
}

async fn read_output_stream<R>(
    reader: &mut R,
    state: &mut StreamState,
    request_id: &str,
    events: &dyn ExecEventSink,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buf[..n];
                if state.capture.push(chunk) {
                    warn!(
                        request_id,
                        stream = %state.stream,
                        max_output_bytes = state.capture.retained_bytes(),
                        "output exceeded the capture limit; further bytes are streamed but not retained"
                    );
                }
                let text = state.decoder.push(chunk);
                if !text.is_empty() {
                    events
                        .send_event(ExecEvent::output(request_id, state.stream, text))
                        .await;
                }
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!(request_id = %request_id, stream = %state.stream, "stopped reading output: {err}");
                break;
            }
        }
    }
}
