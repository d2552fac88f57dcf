//! Pad accelerometer reader worker
//!
//! Consumes raw evdev `input_event` records from the pad-side accelerometer,
//! accumulates the three axes, and latches a gravity-normalized vector into
//! the shared angle sample on each sync report. The device is opened
//! non-blocking with a short poll sleep so shutdown is observed promptly.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Read};
use std::mem;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::angle::Vector3;
use crate::state::SharedState;

// input-event-codes.h
const EV_SYN: u16 = 0x00;
const EV_ABS: u16 = 0x03;
const ABS_X: u16 = 0x00;
const ABS_Y: u16 = 0x01;
const ABS_Z: u16 = 0x02;

/// Idle poll sleep when no events are pending
const POLL_SLEEP: Duration = Duration::from_millis(200);

/// Back-off after a read error before retrying
const ERROR_SLEEP: Duration = Duration::from_secs(1);

/// Extract (type, code, value) from one raw `input_event` record.
fn decode_event(chunk: &[u8]) -> (u16, u16, i32) {
    // The chunk is exactly one kernel input_event as read from the device;
    // read_unaligned avoids any alignment assumption about the buffer.
    let ev = unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const libc::input_event) };
    (ev.type_, ev.code, ev.value)
}

pub fn run(shared: Arc<SharedState>, device_path: PathBuf) {
    let device = match OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(&device_path)
    {
        Ok(f) => f,
        Err(e) => {
            warn!(
                "pad accelerometer unavailable at {}: {}",
                device_path.display(),
                e
            );
            return;
        }
    };

    info!("pad accelerometer reader started for {}", device_path.display());

    let event_size = mem::size_of::<libc::input_event>();
    let mut buf = vec![0u8; event_size * 16];
    let mut pending = Vector3::default();

    while !shared.shutdown_requested() {
        match (&device).read(&mut buf) {
            Ok(n) if n >= event_size => {
                for chunk in buf[..n].chunks_exact(event_size) {
                    match decode_event(chunk) {
                        (EV_ABS, ABS_X, value) => pending.x = f64::from(value),
                        (EV_ABS, ABS_Y, value) => pending.y = f64::from(value),
                        (EV_ABS, ABS_Z, value) => pending.z = f64::from(value),
                        (EV_SYN, _, _) => {
                            shared.angle.lock().pad = pending.renormalized();
                        }
                        _ => {}
                    }
                }
            }
            Ok(_) => {
                if !shared.sleep_sliced(POLL_SLEEP) {
                    break;
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                if !shared.sleep_sliced(POLL_SLEEP) {
                    break;
                }
            }
            Err(e) => {
                warn!("pad accelerometer read error: {}", e);
                if !shared.sleep_sliced(ERROR_SLEEP) {
                    break;
                }
            }
        }
    }

    info!("pad accelerometer reader exiting");
}
