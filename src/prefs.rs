//! Preference loader worker
//!
//! Re-reads the persisted angle-detection flag: a single-character file
//! whose first byte `'1'` means enabled. An absent or unreadable file keeps
//! the previous value; it is not an error.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::state::SharedState;

/// Re-read cadence
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub fn run(shared: Arc<SharedState>, pref_path: PathBuf) {
    info!("preference loader started for {}", pref_path.display());

    loop {
        match fs::read(&pref_path) {
            Ok(bytes) if !bytes.is_empty() => {
                let enabled = bytes[0] == b'1';
                let mut flags = shared.flags.lock();
                if flags.angle_detection_enabled != enabled {
                    info!(
                        "angle detection {}",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
                flags.angle_detection_enabled = enabled;
            }
            Ok(_) => debug!("preference file empty, keeping previous value"),
            Err(e) => debug!("preference file unavailable ({}), keeping previous value", e),
        }

        if !shared.sleep_sliced(POLL_INTERVAL) {
            break;
        }
    }

    info!("preference loader exiting");
}
