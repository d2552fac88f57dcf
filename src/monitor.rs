//! Connection monitor worker
//!
//! Polls the keyboard presence indicator once per cycle, debounces the
//! observed state so a bouncing connector cannot flap the actuator, and
//! hands accepted transitions to the coordinator. Parks on the pause
//! condition while the device sleeps. The cycle is composed of short sleeps
//! so shutdown is noticed promptly.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::coordinator::Coordinator;
use crate::state::SharedState;

/// Consecutive identical observations required to accept a transition
pub const DEBOUNCE_CYCLES: u8 = 3;

/// Nominal cycle period (slept in shutdown-aware slices)
pub const CYCLE_PERIOD: Duration = Duration::from_secs(1);

/// Debounce counter: a transition is real only after it has been observed
/// for [`DEBOUNCE_CYCLES`] consecutive cycles; any reversion resets the
/// count.
#[derive(Debug)]
pub(crate) struct Debouncer {
    accepted: bool,
    streak: u8,
}

impl Debouncer {
    pub(crate) fn new(initial: bool) -> Self {
        Self {
            accepted: initial,
            streak: 0,
        }
    }

    /// Feed one observation; returns the newly accepted state once the
    /// debounce count is reached.
    pub(crate) fn observe(&mut self, current: bool) -> Option<bool> {
        if current != self.accepted {
            self.streak += 1;
            debug!(
                "potential keyboard connection change ({}/{})",
                self.streak, DEBOUNCE_CYCLES
            );
        } else {
            self.streak = 0;
        }

        if self.streak >= DEBOUNCE_CYCLES {
            self.accepted = current;
            self.streak = 0;
            Some(current)
        } else {
            None
        }
    }
}

pub fn run(shared: Arc<SharedState>, coordinator: Arc<Coordinator>, presence_path: PathBuf) {
    info!("connection monitor started for {}", presence_path.display());
    let mut debouncer = Debouncer::new(presence_path.exists());

    while !shared.shutdown_requested() {
        // Park while the device sleeps; the coordinator (on wake), the
        // watchdog, and shutdown all signal this condition.
        {
            let mut st = shared.enablement.lock();
            while st.paused && !shared.shutdown_requested() {
                shared.pause_cond.wait(&mut st);
            }
        }
        if shared.shutdown_requested() {
            break;
        }

        let connected = presence_path.exists();
        match debouncer.observe(connected) {
            Some(accepted) => {
                info!(
                    "keyboard {}",
                    if accepted { "connected" } else { "disconnected" }
                );
                coordinator.apply_connection(accepted);
            }
            None => {
                // Cycle completed without a transition; still counts as
                // liveness when not paused.
                let mut st = shared.enablement.lock();
                if !st.paused {
                    st.last_liveness = Instant::now();
                }
            }
        }

        if !shared.sleep_sliced(CYCLE_PERIOD) {
            break;
        }
    }

    info!("connection monitor exiting");
}
