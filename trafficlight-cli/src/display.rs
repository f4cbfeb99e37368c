use std::io::{self, Write};
use std::thread::JoinHandle;

use tokio::sync::mpsc;
use tracing::warn;
use trafficlight::{StatusCode, StatusDisplay};

/// Human readable name of a status code.
pub fn label(status: StatusCode) -> &'static str {
    match status.value() {
        0 => "available",
        1 => "busy",
        2 => "do not disturb",
        _ => "unknown",
    }
}

fn write_status(out: &mut impl Write, status: StatusCode) -> io::Result<()> {
    writeln!(out, "status: {} ({})", label(status), status)?;
    out.flush()
}

/// Prints one line per status update.
///
/// `show` runs inside the stream's listener, so it only queues the status.
/// Printing happens on a dedicated thread; a slow or closed stdout can
/// neither block the listener nor bring the process down.
#[derive(Debug)]
pub struct ConsoleDisplay {
    tx: mpsc::UnboundedSender<StatusCode>,
}

impl ConsoleDisplay {
    pub fn stdout() -> Self {
        let (display, _writer) = Self::with_writer(io::stdout());
        display
    }

    /// Print to `out`. The writer thread exits once the display is dropped
    /// or `out` reports a broken pipe.
    pub fn with_writer<W>(mut out: W) -> (Self, JoinHandle<()>)
    where
        W: Write + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let writer = std::thread::spawn(move || {
            while let Some(status) = rx.blocking_recv() {
                match write_status(&mut out, status) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        warn!("Output closed, no longer printing statuses");
                        break;
                    }
                    Err(e) => warn!(error = %e, %status, "Failed to print status"),
                }
            }
        });
        (Self { tx }, writer)
    }
}

impl StatusDisplay for ConsoleDisplay {
    fn show(&self, status: StatusCode) {
        // Receiver gone means the output was closed.
        let _ = self.tx.send(status);
    }
}
