//! Liveness watchdog worker
//!
//! Detects a connection monitor that has stopped completing cycles and
//! nudges it by signaling the pause condition. This is a narrow self-healing
//! measure for a thread legitimately parked on the condition; it is not a
//! supervisor and cannot unblock a thread stuck elsewhere.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::state::SharedState;

/// Interval between liveness checks
pub const CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Liveness gap beyond which the monitor counts as stalled
pub const STALL_THRESHOLD: Duration = Duration::from_secs(30);

pub fn run(shared: Arc<SharedState>) {
    info!("watchdog started");

    while shared.sleep_sliced(CHECK_INTERVAL) {
        let (paused, last_liveness) = {
            let st = shared.enablement.lock();
            (st.paused, st.last_liveness)
        };

        if paused {
            continue;
        }

        let gap = Instant::now().duration_since(last_liveness);
        if gap > STALL_THRESHOLD {
            warn!(
                "monitor appears stuck for {}s, signaling pause condition",
                gap.as_secs()
            );
            let _guard = shared.enablement.lock();
            shared.pause_cond.notify_all();
        }
    }

    info!("watchdog exiting");
}
