//! Run-state shared between the engine thread, the stdin listener and the
//! signal handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Flags the engine polls at the top of every cycle.
#[derive(Debug)]
pub struct ControlState {
    recognition_enabled: AtomicBool,
    shutdown: AtomicBool,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    /// Recognition starts enabled.
    pub fn new() -> Self {
        Self {
            recognition_enabled: AtomicBool::new(true),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn recognition_enabled(&self) -> bool {
        self.recognition_enabled.load(Ordering::SeqCst)
    }

    pub fn set_recognition(&self, enabled: bool) {
        self.recognition_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// A line received on the control input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Exit,
}

impl ControlCommand {
    /// Trimmed and case-insensitive. `None` for anything unrecognized.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "start" => Some(ControlCommand::Start),
            "stop" => Some(ControlCommand::Stop),
            "exit" => Some(ControlCommand::Exit),
            _ => None,
        }
    }
}

/// Apply control lines from `reader` until `exit`, end of input, or a line
/// that is not a command. The last two pause recognition but leave the
/// daemon running.
pub async fn listen<R>(reader: R, state: &ControlState)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("control input closed; pausing recognition");
                state.set_recognition(false);
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read control input; pausing recognition");
                state.set_recognition(false);
                return;
            }
        };

        match ControlCommand::parse(&line) {
            Some(ControlCommand::Start) => {
                tracing::debug!("control: start");
                state.set_recognition(true);
            }
            Some(ControlCommand::Stop) => {
                tracing::debug!("control: stop");
                state.set_recognition(false);
            }
            Some(ControlCommand::Exit) => {
                tracing::info!("control: exit requested");
                state.set_recognition(false);
                state.request_shutdown();
                return;
            }
            None => {
                tracing::warn!(line = %line.trim(), "unrecognized control input; pausing recognition");
                state.set_recognition(false);
                return;
            }
        }
    }
}
