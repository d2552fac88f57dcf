//! Enablement coordinator
//!
//! Owns the single actuation decision: `desired = connected && !locked &&
//! !folded` (the fold candidate only counts while angle detection is
//! enabled). Every handler mutates the enablement flags and takes the
//! consequent decision inside one critical section, so no other decision
//! source can observe a half-updated flag pair; across sources the most
//! recent signal to acquire the lock governs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::angle::{self, FoldTracker};
use crate::channel::{ChannelSlot, ControlChannel, ControlEndpoint};
use crate::protocol::{AccelSample, Event};
use crate::state::{EnablementState, SharedState};

pub struct Coordinator {
    shared: Arc<SharedState>,
    channel: Arc<ChannelSlot>,
    /// Keyboard presence indicator, probed at decision time
    presence_path: PathBuf,
    /// Control device path, for the unlock-path reopen
    device_path: PathBuf,
    fold: Mutex<FoldTracker>,
}

impl Coordinator {
    pub fn new(
        shared: Arc<SharedState>,
        channel: Arc<ChannelSlot>,
        presence_path: PathBuf,
        device_path: PathBuf,
    ) -> Self {
        Self {
            shared,
            channel,
            presence_path,
            device_path,
            fold: Mutex::new(FoldTracker::new()),
        }
    }

    /// Probe the physical connection indicator.
    pub fn probe_connected(&self) -> bool {
        self.presence_path.exists()
    }

    /// Compute desired state from the current flag snapshot and write the
    /// actuator if it differs. `actuated` is only updated on a successful
    /// write; on failure it keeps the actuator's true last-known state and
    /// the next differing decision retries.
    fn decide(&self, st: &mut MutexGuard<'_, EnablementState>, connected: bool) {
        let angle_on = self.shared.flags.lock().angle_detection_enabled;
        let desired = connected && !st.locked && !(angle_on && st.folded);
        if desired == st.actuated {
            return;
        }

        info!(
            "setting keyboard state to {} (connected={}, locked={}, folded={})",
            desired, connected, st.locked, st.folded
        );
        match self.channel.write_enable(desired) {
            Ok(()) => st.actuated = desired,
            Err(e) => warn!("actuation write failed, keeping previous state: {}", e),
        }
    }

    /// One-time startup sync: force a write matching the current probe so
    /// the actuator agrees with reality regardless of its power-on state.
    pub fn initial_sync(&self) {
        let connected = self.probe_connected();
        let mut st = self.shared.enablement.lock();
        let angle_on = self.shared.flags.lock().angle_detection_enabled;
        let desired = connected && !st.locked && !(angle_on && st.folded);
        info!(
            "keyboard input device {}, starting {}",
            if connected { "found" } else { "not found" },
            if desired { "enabled" } else { "disabled" }
        );
        match self.channel.write_enable(desired) {
            Ok(()) => st.actuated = desired,
            Err(e) => error!("initial actuation write failed: {}", e),
        }
    }

    /// Debounced transition from the connection monitor. Refreshes liveness
    /// and decides, unless monitoring is paused.
    pub fn apply_connection(&self, connected: bool) {
        let mut st = self.shared.enablement.lock();
        if st.paused {
            return;
        }
        st.last_liveness = Instant::now();
        self.decide(&mut st, connected);
    }

    pub fn handle_event(&self, event: Event) {
        match event {
            Event::Sleep => self.handle_sleep(),
            Event::Wake => self.handle_wake(),
            Event::Lock => self.handle_lock(),
            Event::Unlock => self.handle_unlock(),
            Event::Movement(sample) => self.handle_movement(sample),
        }
    }

    fn handle_sleep(&self) {
        info!("sleep event - pausing keyboard monitoring");
        self.shared.enablement.lock().paused = true;
    }

    fn handle_wake(&self) {
        info!("wake event - resuming keyboard monitoring");
        let connected = self.probe_connected();
        let mut st = self.shared.enablement.lock();
        st.paused = false;
        st.last_liveness = Instant::now();
        self.shared.pause_cond.notify_all();
        self.decide(&mut st, connected);
    }

    fn handle_lock(&self) {
        info!("device locked - disabling keyboard");
        let connected = self.probe_connected();
        let mut st = self.shared.enablement.lock();
        st.locked = true;
        self.decide(&mut st, connected);
    }

    fn handle_unlock(&self) {
        info!("device unlocked - re-evaluating keyboard state");
        // The channel may have been lost to a failed recovery; try one
        // reopen before deciding so the decision can actually actuate.
        if self.channel.is_empty() {
            match ControlChannel::open(&self.device_path) {
                Ok(ch) => self.channel.install(Box::new(ch) as Box<dyn ControlEndpoint>),
                Err(e) => warn!("control channel reopen on unlock failed: {}", e),
            }
        }
        let connected = self.probe_connected();
        let mut st = self.shared.enablement.lock();
        st.locked = false;
        self.decide(&mut st, connected);
    }

    fn handle_movement(&self, sample: AccelSample) {
        let keyboard = angle::vector_from_sample(sample);

        // Copy both vectors out under the sensor lock; the trig runs outside
        // any lock.
        let pad = {
            let mut vectors = self.shared.angle.lock();
            vectors.keyboard = keyboard;
            vectors.pad
        };

        if !self.shared.flags.lock().angle_detection_enabled {
            debug!("movement frame ignored, angle detection disabled");
            return;
        }

        let Some(folded) = self.fold.lock().update(keyboard, pad) else {
            return;
        };

        let connected = self.probe_connected();
        let mut st = self.shared.enablement.lock();
        if st.folded != folded {
            info!(
                "keyboard {} per hinge angle",
                if folded { "folded away" } else { "unfolded" }
            );
        }
        st.folded = folded;
        self.decide(&mut st, connected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelSlot;
    use crate::error::DaemonError;
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records actuation writes; optionally fails them.
    struct RecordingEndpoint {
        writes: Arc<Mutex<Vec<[u8; 3]>>>,
        fail: Arc<AtomicBool>,
    }

    impl ControlEndpoint for RecordingEndpoint {
        fn read_frame(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn write_enable(&mut self, enable: bool) -> Result<(), DaemonError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DaemonError::ShortWrite {
                    written: 0,
                    expected: 3,
                });
            }
            self.writes
                .lock()
                .push(crate::protocol::actuation_frame(enable));
            Ok(())
        }
    }

    struct Fixture {
        shared: Arc<SharedState>,
        coordinator: Coordinator,
        writes: Arc<Mutex<Vec<[u8; 3]>>>,
        fail: Arc<AtomicBool>,
        presence: PathBuf,
    }

    impl Fixture {
        fn new(tag: &str, connected: bool, angle_detection: bool) -> Self {
            let presence = std::env::temp_dir().join(format!(
                "kbattachd-coord-{}-{}",
                std::process::id(),
                tag
            ));
            let _ = fs::remove_file(&presence);
            if connected {
                fs::write(&presence, b"").unwrap();
            }

            let writes = Arc::new(Mutex::new(Vec::new()));
            let fail = Arc::new(AtomicBool::new(false));
            let channel = Arc::new(ChannelSlot::new());
            channel.install(Box::new(RecordingEndpoint {
                writes: Arc::clone(&writes),
                fail: Arc::clone(&fail),
            }));

            let shared = SharedState::new(angle_detection);
            let coordinator = Coordinator::new(
                Arc::clone(&shared),
                channel,
                presence.clone(),
                Path::new("/nonexistent/control-device").to_path_buf(),
            );
            Self {
                shared,
                coordinator,
                writes,
                fail,
                presence,
            }
        }

        fn taken_writes(&self) -> Vec<[u8; 3]> {
            std::mem::take(&mut *self.writes.lock())
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.presence);
        }
    }

    #[test]
    fn test_connected_unlocked_enables_once() {
        let fx = Fixture::new("enable", true, false);
        fx.coordinator.apply_connection(true);
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 1]]);
        assert!(fx.shared.enablement.lock().actuated);

        // Same decision again: no further write
        fx.coordinator.apply_connection(true);
        assert!(fx.taken_writes().is_empty());
    }

    #[test]
    fn test_lock_forces_disable() {
        let fx = Fixture::new("lock", true, false);
        fx.coordinator.apply_connection(true);
        fx.taken_writes();

        fx.coordinator.handle_event(Event::Lock);
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 0]]);
        let st = fx.shared.enablement.lock();
        assert!(st.locked);
        assert!(!st.actuated);
    }

    #[test]
    fn test_locked_wins_over_connection_and_angle() {
        let fx = Fixture::new("lockwins", true, true);
        fx.coordinator.handle_event(Event::Lock);
        fx.taken_writes();

        // Connected and unfolded, but still locked: stays disabled
        fx.coordinator.apply_connection(true);
        assert!(fx.taken_writes().is_empty());

        fx.coordinator.handle_event(Event::Unlock);
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 1]]);
        assert!(!fx.shared.enablement.lock().locked);
    }

    #[test]
    fn test_no_monitor_actuation_while_paused() {
        let fx = Fixture::new("paused", true, false);
        fx.coordinator.handle_event(Event::Sleep);
        assert!(fx.shared.enablement.lock().paused);

        let liveness_before = fx.shared.enablement.lock().last_liveness;
        fx.coordinator.apply_connection(true);
        assert!(fx.taken_writes().is_empty());
        assert_eq!(fx.shared.enablement.lock().last_liveness, liveness_before);
    }

    #[test]
    fn test_wake_reevaluates_from_probe() {
        let fx = Fixture::new("wake", true, false);
        fx.coordinator.handle_event(Event::Sleep);
        fx.coordinator.handle_event(Event::Wake);
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 1]]);
        let st = fx.shared.enablement.lock();
        assert!(!st.paused);
        assert!(st.actuated);
    }

    #[test]
    fn test_failed_write_keeps_state_and_retries() {
        let fx = Fixture::new("retry", true, false);
        fx.fail.store(true, Ordering::SeqCst);
        fx.coordinator.apply_connection(true);
        // Write failed: actuated still reflects the last known-good state
        assert!(!fx.shared.enablement.lock().actuated);
        assert!(fx.taken_writes().is_empty());

        fx.fail.store(false, Ordering::SeqCst);
        fx.coordinator.apply_connection(true);
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 1]]);
        assert!(fx.shared.enablement.lock().actuated);
    }

    #[test]
    fn test_fold_disables_and_unfold_restores() {
        let fx = Fixture::new("fold", true, true);
        fx.shared.angle.lock().pad = angle::Vector3::new(0.0, 0.0, angle::GRAVITY);
        fx.coordinator.apply_connection(true);
        fx.taken_writes();

        // Sample z = 256 maps (after inversion + renormalization) to a
        // vector opposite the pad: 180 degrees, folded.
        fx.coordinator
            .handle_event(Event::Movement(AccelSample { x: 0, y: 0, z: 256 }));
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 0]]);
        assert!(fx.shared.enablement.lock().folded);

        // Opposite sample: 0 degrees, unfolded again
        fx.coordinator
            .handle_event(Event::Movement(AccelSample { x: 0, y: 0, z: -256 }));
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 1]]);
        assert!(!fx.shared.enablement.lock().folded);
    }

    #[test]
    fn test_movement_ignored_when_angle_detection_disabled() {
        let fx = Fixture::new("nofold", true, false);
        fx.shared.angle.lock().pad = angle::Vector3::new(0.0, 0.0, angle::GRAVITY);
        fx.coordinator.apply_connection(true);
        fx.taken_writes();

        fx.coordinator
            .handle_event(Event::Movement(AccelSample { x: 0, y: 0, z: 256 }));
        assert!(fx.taken_writes().is_empty());
        assert!(!fx.shared.enablement.lock().folded);
    }

    #[test]
    fn test_initial_sync_writes_probe_state() {
        let fx = Fixture::new("initsync", false, false);
        fx.coordinator.initial_sync();
        assert_eq!(fx.taken_writes(), vec![[0x32, 0xFF, 0]]);
        assert!(!fx.shared.enablement.lock().actuated);
    }
}
