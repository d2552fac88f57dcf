//! Control channel: the device handle, the actuation write, and recovery
//!
//! At most one valid handle exists at a time. It lives in a [`ChannelSlot`]
//! so that invalidation (close) and re-open are atomic with respect to
//! actuation writers: the foreground loop reads through the slot lock, the
//! coordinator writes through it, and recovery swaps the handle under it.
//! Device reads return promptly (a zero-length read means "no data yet"),
//! so writers are never starved by a reader holding the lock.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{error, info};

use crate::error::DaemonError;
use crate::protocol;
use crate::state::SharedState;

/// Maximum open attempts per recovery cycle
pub const RECONNECT_ATTEMPTS: u32 = 5;

/// Inter-attempt backoff: 1s, 2s, then capped at 4s.
pub fn backoff_delay(failed_attempts: u32) -> Duration {
    Duration::from_secs((1u64 << failed_attempts.min(2)).min(4))
}

/// Byte-level endpoint for the control device. The seam exists so tests can
/// substitute an in-memory device for the real character device.
pub trait ControlEndpoint: Send {
    /// Read one notification frame. A return of 0 means no data is
    /// currently available, not end-of-stream.
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write the 3-byte actuation command. Anything other than a complete
    /// write is a failure.
    fn write_enable(&mut self, enable: bool) -> Result<(), DaemonError>;
}

/// Owned handle to the control character device
pub struct ControlChannel {
    dev: File,
    path: PathBuf,
}

impl ControlChannel {
    pub fn open(path: &Path) -> Result<Self, DaemonError> {
        let dev = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            dev,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlEndpoint for ControlChannel {
    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.dev.read(buf)
    }

    fn write_enable(&mut self, enable: bool) -> Result<(), DaemonError> {
        let frame = protocol::actuation_frame(enable);
        let written = self.dev.write(&frame)?;
        if written != frame.len() {
            return Err(DaemonError::ShortWrite {
                written,
                expected: frame.len(),
            });
        }
        Ok(())
    }
}

/// Lock-guarded slot holding the single valid channel handle (or nothing,
/// while recovery is pending).
pub struct ChannelSlot {
    slot: Mutex<Option<Box<dyn ControlEndpoint>>>,
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSlot {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    pub fn install(&self, endpoint: Box<dyn ControlEndpoint>) {
        *self.slot.lock() = Some(endpoint);
    }

    /// Drop the current handle, closing the device.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    pub fn read_frame(&self, buf: &mut [u8]) -> Result<usize, DaemonError> {
        match self.slot.lock().as_mut() {
            Some(endpoint) => Ok(endpoint.read_frame(buf)?),
            None => Err(DaemonError::ChannelUnavailable),
        }
    }

    pub fn write_enable(&self, enable: bool) -> Result<(), DaemonError> {
        match self.slot.lock().as_mut() {
            Some(endpoint) => endpoint.write_enable(enable),
            None => Err(DaemonError::ChannelUnavailable),
        }
    }
}

/// Generic bounded-retry engine behind [`reconnect`]; split out so the
/// backoff schedule is testable with an injected opener and sleeper.
fn retry_open<T, O, S>(
    attempts: u32,
    cancelled: impl Fn() -> bool,
    mut open: O,
    mut sleep: S,
) -> Result<T, DaemonError>
where
    O: FnMut() -> Result<T, DaemonError>,
    S: FnMut(Duration) -> bool,
{
    for attempt in 0..attempts {
        if cancelled() {
            info!("reconnect aborted by shutdown request");
            return Err(DaemonError::ReconnectFailed(attempt));
        }

        info!("reconnect attempt {}/{}", attempt + 1, attempts);
        match open() {
            Ok(endpoint) => {
                info!("control channel reopened");
                return Ok(endpoint);
            }
            Err(e) => error!("reconnect attempt failed: {}", e),
        }

        if attempt + 1 < attempts && !sleep(backoff_delay(attempt)) {
            info!("reconnect aborted by shutdown request");
            return Err(DaemonError::ReconnectFailed(attempt + 1));
        }
    }

    error!("failed to reconnect after {} attempts", attempts);
    Err(DaemonError::ReconnectFailed(attempts))
}

/// Reopen the control channel with bounded exponential backoff, aborting
/// early if shutdown has been requested.
pub fn reconnect(path: &Path, shared: &SharedState) -> Result<ControlChannel, DaemonError> {
    retry_open(
        RECONNECT_ATTEMPTS,
        || shared.shutdown_requested(),
        || ControlChannel::open(path),
        |delay| shared.sleep_sliced(delay),
    )
}
