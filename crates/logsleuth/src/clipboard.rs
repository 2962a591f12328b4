//! System clipboard sink.

use std::io::Write;
use std::process::{Child, Command, Stdio};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("no clipboard command available (tried pbcopy, wl-copy, xclip, xsel)")]
    Unavailable,

    #[error("clipboard command {command} failed: {reason}")]
    Failed { command: &'static str, reason: String },
}

/// Somewhere search output can be copied to.
pub trait ClipboardSink {
    fn write(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Pipes text into the first clipboard utility found on the system.
pub struct SystemClipboard;

const CANDIDATES: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

impl ClipboardSink for SystemClipboard {
    fn write(&self, text: &str) -> Result<(), ClipboardError> {
        for (command, args) in CANDIDATES {
            let child = Command::new(command)
                .args(*args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn();

            let child = match child {
                Ok(child) => child,
                Err(e) => {
                    debug!(command, error = %e, "Clipboard command unavailable");
                    continue;
                }
            };

            feed(command, child, text)?;
            debug!(command, bytes = text.len(), "Copied results to clipboard");
            return Ok(());
        }

        Err(ClipboardError::Unavailable)
    }
}

/// Write `text` to the child's stdin and reap it, killing it if the write fails.
fn feed(command: &'static str, mut child: Child, text: &str) -> Result<(), ClipboardError> {
    let failed = |reason: String| ClipboardError::Failed { command, reason };

    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(text.as_bytes()) {
            drop(stdin);
            let _ = child.kill();
            let _ = child.wait();
            return Err(failed(e.to_string()));
        }
    }

    let status = child.wait().map_err(|e| failed(e.to_string()))?;
    if !status.success() {
        return Err(failed(format!("exited with {}", status)));
    }
    Ok(())
}
