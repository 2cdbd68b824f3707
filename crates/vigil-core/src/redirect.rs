//! Log redirection from the engine's diagnostic pipe to the system log.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::severity::LogLine;
use crate::sink::SystemLog;

/// Longest chunk forwarded as one entry. Longer lines arrive as several.
pub const MAX_LINE: usize = 4096;

/// Why the redirector stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamEnd {
    /// Every writer closed the pipe.
    #[default]
    EndOfStream,
    /// Cancelled before the stream ended.
    Cancelled,
}

/// Summary returned by a finished redirector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RedirectStats {
    /// Lines forwarded to the system log.
    pub lines: u64,
    /// How the loop ended.
    pub end: StreamEnd,
}

/// Spawns redirector tasks.
pub struct LogRedirector;

impl LogRedirector {
    /// Starts forwarding lines from `reader` to `sink` on a tokio task.
    ///
    /// Each line is classified, written to `sink`, and echoed to stdout.
    /// The task ends at end of stream or when the returned handle is
    /// cancelled.
    pub fn spawn<R>(reader: R, sink: Arc<dyn SystemLog>) -> RedirectorHandle
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let token = CancellationToken::new();
        let task = tokio::spawn(pump(reader, sink, token.clone()));
        RedirectorHandle { task, token }
    }
}

/// Handle to a running redirector task.
#[derive(Debug)]
pub struct RedirectorHandle {
    task: JoinHandle<RedirectStats>,
    token: CancellationToken,
}

impl RedirectorHandle {
    /// Returns true once the task has returned.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Asks the task to stop at its next read.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the task and returns its summary.
    pub async fn join(self) -> RedirectStats {
        match self.task.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(error = %e, "log redirector task failed");
                RedirectStats {
                    lines: 0,
                    end: StreamEnd::Cancelled,
                }
            }
        }
    }
}

async fn pump<R>(reader: R, sink: Arc<dyn SystemLog>, token: CancellationToken) -> RedirectStats
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut stdout = Some(tokio::io::stdout());
    let mut lines = 0;

    loop {
        buf.clear();
        let mut limited = (&mut reader).take(MAX_LINE as u64);
        let read = tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(lines, "log redirector cancelled");
                return RedirectStats { lines, end: StreamEnd::Cancelled };
            }
            read = limited.read_until(b'\n', &mut buf) => read,
        };

        match read {
            Ok(0) => break,
            Ok(_) => {
                let line = LogLine::from_bytes(&buf);
                sink.write(line.severity, &line.text);
                echo(&mut stdout, &line.text).await;
                lines += 1;
            }
            Err(e) => {
                tracing::warn!(error = %e, "diagnostic pipe read failed");
                break;
            }
        }
    }

    tracing::debug!(lines, "engine diagnostic stream closed");
    RedirectStats {
        lines,
        end: StreamEnd::EndOfStream,
    }
}

/// Copies `text` to stdout; the echo is switched off after the first failure.
async fn echo(stdout: &mut Option<tokio::io::Stdout>, text: &str) {
    let Some(out) = stdout.as_mut() else {
        return;
    };
    let mut line = String::with_capacity(text.len() + 1);
    line.push_str(text);
    line.push('\n');
    if let Err(e) = out.write_all(line.as_bytes()).await {
        tracing::debug!(error = %e, "stdout echo disabled");
        *stdout = None;
    }
}
