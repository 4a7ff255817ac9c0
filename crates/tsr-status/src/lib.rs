/// tsr status reporter
///
/// The supervisor side of a tsr run. Reads envelopes, one JSON object per
/// line, renders them for the operator and, once its input ends,
/// acknowledges how many lines it drained.

use std::io::{self, Write};
use std::time::Instant;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};
use tsr_compiler::{Ack, Envelope, EventKind};

/// Renders envelopes as human readable status lines
pub struct StatusReporter<W: Write> {
    out: W,
    received: u64,
    errors: u64,
    started: Option<Instant>,
}

impl<W: Write> StatusReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            received: 0,
            errors: 0,
            started: None,
        }
    }

    /// Envelopes rendered so far
    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn render(&mut self, envelope: &Envelope) -> io::Result<()> {
        self.received += 1;
        let payload = &envelope.payload;

        match envelope.message {
            EventKind::Start => {
                self.started = Some(Instant::now());
                match payload.as_array() {
                    Some(files) => writeln!(self.out, "tsr: processing {} file(s)", files.len())?,
                    None => writeln!(self.out, "tsr: starting")?,
                }
            }
            EventKind::Transform => {
                writeln!(self.out, "Transforming {}", names(payload))?;
            }
            EventKind::Diagnostics => {
                for line in payload.as_array().into_iter().flatten().filter_map(Value::as_str) {
                    writeln!(self.out, "{}", line)?;
                }
            }
            EventKind::Cleanup => {
                if payload["removed"].as_bool() == Some(true) {
                    if let Some(folder) = payload["tempFolder"].as_str() {
                        writeln!(self.out, "Removed {}", folder)?;
                    }
                }
            }
            EventKind::Stop => {}
            EventKind::End => {
                let elapsed = payload["elapsedMs"]
                    .as_u64()
                    .or_else(|| self.started.map(|t| t.elapsed().as_millis() as u64))
                    .unwrap_or(0);
                if payload["success"].as_bool() == Some(false) || self.errors > 0 {
                    writeln!(self.out, "Failed after {}ms", elapsed)?;
                } else {
                    writeln!(self.out, "Done in {}ms", elapsed)?;
                }
            }
            EventKind::Error => {
                self.errors += 1;
                let message = payload["message"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| payload.to_string());
                writeln!(self.out, "Error: {}", message)?;
            }
        }
        self.out.flush()
    }
}

/// `["a.ts","b.ts"]` as `a.ts, b.ts`
fn names(payload: &Value) -> String {
    match payload.as_array() {
        Some(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).unwrap_or_else(|| item.to_string()))
            .collect::<Vec<_>>()
            .join(", "),
        None => payload.to_string(),
    }
}

/// Render every envelope line from `input` until end of input, then write
/// the [`Ack`] line to `ack_out`
///
/// Every non-empty line counts towards the acknowledgment, including lines
/// that are not valid envelopes.
pub async fn serve<R, O, W>(input: R, mut ack_out: O, reporter: &mut StatusReporter<W>) -> io::Result<Ack>
where
    R: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut drained = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        drained += 1;
        match Envelope::from_line(&line) {
            Ok(envelope) => {
                debug!(message = %envelope.message, "received");
                reporter.render(&envelope)?;
            }
            Err(e) => warn!(error = %e, "ignoring malformed envelope"),
        }
    }

    let ack = Ack { drained };
    let mut line = serde_json::to_string(&ack).map_err(io::Error::other)?;
    line.push('\n');
    ack_out.write_all(line.as_bytes()).await?;
    ack_out.flush().await?;
    debug!(drained, "acknowledged");
    Ok(ack)
}
