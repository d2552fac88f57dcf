//! Daemon error types

use thiserror::Error;

/// Errors surfaced by the enablement daemon
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The control channel slot is empty (lost to a failed reconnect).
    #[error("control channel not open")]
    ChannelUnavailable,

    /// The device accepted fewer bytes than the actuation command holds.
    #[error("short actuation write: wrote {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("failed to reconnect control channel after {0} attempts")]
    ReconnectFailed(u32),

    /// Read-failure/reconnect cycles exhausted; the daemon gives up.
    #[error("control channel unrecoverable after {0} consecutive reconnect cycles")]
    ChannelExhausted(u32),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
