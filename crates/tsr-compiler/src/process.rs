//! The supervisor process and the shutdown handshake
//!
//! ```text
//! Running --close queue--> OrchestratorExiting --stdin flushed + EOF-->
//!     SupervisorDraining --ack read + child exited--> SupervisorExited
//! ```
//!
//! The orchestrator must not exit before `SupervisorExited`; every envelope
//! sent before the shutdown started has then been written, read and
//! acknowledged.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::protocol::{Ack, EnvelopeReceiver, EnvelopeSender};

/// Environment variable overriding the status program location
pub const STATUS_BIN_ENV: &str = "TSR_STATUS_BIN";
const STATUS_BIN_NAME: &str = "tsr-status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    OrchestratorExiting,
    SupervisorDraining,
    SupervisorExited,
}

/// Outcome of a completed shutdown handshake
#[derive(Debug, Clone, Copy)]
pub struct Shutdown {
    pub ack: Ack,
    pub written: u64,
    pub status: ExitStatus,
}

/// A running status process fed from an [`EnvelopeReceiver`]
pub struct SupervisorProcess {
    child: Child,
    stdout: BufReader<ChildStdout>,
    writer: JoinHandle<std::io::Result<u64>>,
    state: ShutdownState,
}

impl SupervisorProcess {
    /// Where to find the status program: `$TSR_STATUS_BIN`, else next to the
    /// current executable
    pub fn locate() -> Result<PathBuf, SupervisorError> {
        if let Some(path) = std::env::var_os(STATUS_BIN_ENV) {
            return Ok(PathBuf::from(path));
        }
        let exe = std::env::current_exe()?;
        let mut name = OsString::from(STATUS_BIN_NAME);
        name.push(std::env::consts::EXE_SUFFIX);
        Ok(exe.with_file_name(name))
    }

    /// Spawn the status program and start pumping envelopes into it
    pub fn spawn(
        program: impl AsRef<Path>,
        args: &[&str],
        receiver: EnvelopeReceiver,
    ) -> Result<Self, SupervisorError> {
        let program = program.as_ref();
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                program: program.to_path_buf(),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SupervisorError::Protocol("status process has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SupervisorError::Protocol("status process has no stdout".into()))?;

        info!(program = %program.display(), pid = ?child.id(), "status process started");
        let writer = tokio::spawn(pump(receiver, stdin));

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            writer,
            state: ShutdownState::Running,
        })
    }

    pub fn state(&self) -> ShutdownState {
        self.state
    }

    /// Run the shutdown handshake and wait for the status process to exit
    ///
    /// Closes `sender` (and so every clone of it held by bus subscribers).
    pub async fn shutdown(mut self, sender: &EnvelopeSender) -> Result<Shutdown, SupervisorError> {
        self.transition(ShutdownState::OrchestratorExiting);
        sender.close();

        let written = match (&mut self.writer).await {
            Ok(result) => result?,
            Err(e) => return Err(SupervisorError::Protocol(format!("envelope writer failed: {}", e))),
        };
        self.transition(ShutdownState::SupervisorDraining);

        let mut line = String::new();
        self.stdout.read_line(&mut line).await?;
        if line.trim().is_empty() {
            return Err(SupervisorError::Protocol(
                "status process exited without acknowledging".into(),
            ));
        }
        let ack: Ack = serde_json::from_str(line.trim())
            .map_err(|e| SupervisorError::Protocol(format!("bad acknowledgment {:?}: {}", line.trim(), e)))?;
        if ack.drained != written {
            warn!(written, drained = ack.drained, "status process drained a different number of envelopes");
        }

        let status = self.child.wait().await?;
        self.transition(ShutdownState::SupervisorExited);

        Ok(Shutdown { ack, written, status })
    }

    fn transition(&mut self, next: ShutdownState) {
        debug!(from = ?self.state, to = ?next, "shutdown");
        self.state = next;
    }
}

/// Write envelopes to the child's stdin in order until the queue closes,
/// then flush and close stdin so the child sees end-of-input
async fn pump(mut receiver: EnvelopeReceiver, mut stdin: ChildStdin) -> std::io::Result<u64> {
    let mut written = 0;
    while let Some(envelope) = receiver.recv().await {
        let mut line = envelope.to_line()?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        written += 1;
    }
    stdin.flush().await?;
    drop(stdin);
    Ok(written)
}
