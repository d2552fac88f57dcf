//! Shared daemon state
//!
//! Three independently-locked groups, split by producer cadence so sensor
//! updates never block actuation decisions:
//!
//! - `EnablementState` under the coordination lock: every read feeding an
//!   actuation decision and every write to its fields happens while holding
//!   it.
//! - `AngleSample` under its own lock; consumers copy the vectors out and
//!   compute the angle outside the lock.
//! - `FeatureFlags` under its own lock; the preference loader takes it only
//!   for the duration of a single assignment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::angle::Vector3;

/// Shutdown-check granularity for all worker sleeps
pub const SLEEP_SLICE: Duration = Duration::from_millis(200);

/// Enablement flags, guarded by the coordination lock
#[derive(Debug)]
pub struct EnablementState {
    /// Last value successfully written to the actuator. Stale only while an
    /// actuation write is failing; the next differing decision retries.
    pub actuated: bool,
    /// Device reported sleep; the connection monitor must not actuate
    pub paused: bool,
    /// Screen locked; desired state is forced off
    pub locked: bool,
    /// Keyboard folded away per the latest angle evaluation
    pub folded: bool,
    /// Last completed non-paused monitor decision cycle
    pub last_liveness: Instant,
}

impl EnablementState {
    fn new() -> Self {
        Self {
            actuated: false,
            paused: false,
            locked: false,
            folded: false,
            last_liveness: Instant::now(),
        }
    }
}

/// Latest gravity vectors from the two accelerometers
#[derive(Debug, Default)]
pub struct AngleSample {
    /// Base/pad side, written by the sensor reader
    pub pad: Vector3,
    /// Keyboard side, written from movement frames
    pub keyboard: Vector3,
}

/// Periodically refreshed feature toggles
#[derive(Debug)]
pub struct FeatureFlags {
    pub angle_detection_enabled: bool,
}

/// All state shared between the foreground loop and the workers.
pub struct SharedState {
    pub enablement: Mutex<EnablementState>,
    /// Signaled on wake and on shutdown to release a parked monitor
    pub pause_cond: Condvar,
    pub angle: Mutex<AngleSample>,
    pub flags: Mutex<FeatureFlags>,
    shutdown: AtomicBool,
}

impl SharedState {
    pub fn new(angle_detection_default: bool) -> Arc<Self> {
        Arc::new(Self {
            enablement: Mutex::new(EnablementState::new()),
            pause_cond: Condvar::new(),
            angle: Mutex::new(AngleSample::default()),
            flags: Mutex::new(FeatureFlags {
                angle_detection_enabled: angle_detection_default,
            }),
            shutdown: AtomicBool::new(false),
        })
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Set the shutdown flag and release any worker parked on the pause
    /// condition.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _guard = self.enablement.lock();
        self.pause_cond.notify_all();
    }

    /// Sleep in short slices, checking the shutdown flag between slices.
    /// Returns false once shutdown has been requested.
    pub fn sleep_sliced(&self, total: Duration) -> bool {
        let mut remaining = total;
        while remaining > Duration::ZERO {
            if self.shutdown_requested() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
        }
        !self.shutdown_requested()
    }
}
