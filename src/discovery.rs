//! Input-device discovery
//!
//! The keyboard presence indicator and the pad accelerometer are both input
//! event nodes whose numbering is not stable; they are located by scanning
//! the input-device registry for a name match against a small whitelist of
//! substrings (case-insensitive), with a fixed default when nothing matches.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Name substrings identifying the keyboard input device
pub const KEYBOARD_NAME_HINTS: &[&str] = &["xiaomi", "keyboard", "pipa", "xkbd"];

/// Name substrings identifying the pad-side accelerometer
pub const ACCEL_NAME_HINTS: &[&str] = &["accel", "gravity"];

const SYS_INPUT_ROOT: &str = "/sys/class/input";
const DEV_INPUT_ROOT: &str = "/dev/input";

/// Scan `sys_root` for `event*` entries whose `device/name` matches one of
/// `hints`, returning the corresponding node under `dev_root`.
fn scan_registry(sys_root: &Path, dev_root: &Path, hints: &[&str]) -> Option<PathBuf> {
    let entries = match fs::read_dir(sys_root) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("failed to open input registry {}: {}", sys_root.display(), e);
            return None;
        }
    };

    for entry in entries.flatten() {
        let node = entry.file_name();
        let node = node.to_string_lossy();
        if !node.starts_with("event") {
            continue;
        }

        let label_path = entry.path().join("device/name");
        let Ok(label) = fs::read_to_string(&label_path) else {
            continue;
        };
        let label = label.trim().to_ascii_lowercase();

        if hints.iter().any(|hint| label.contains(hint)) {
            let path = dev_root.join(&*node);
            info!("found input device at {} ({})", path.display(), label);
            return Some(path);
        }
        debug!("skipping input device {} ({})", node, label);
    }

    None
}

/// Locate the keyboard input node used as the presence indicator, falling
/// back to `fallback` when the scan finds nothing.
pub fn find_keyboard_input_path(fallback: &Path) -> PathBuf {
    find_keyboard_input_path_in(
        Path::new(SYS_INPUT_ROOT),
        Path::new(DEV_INPUT_ROOT),
        fallback,
    )
}

fn find_keyboard_input_path_in(sys_root: &Path, dev_root: &Path, fallback: &Path) -> PathBuf {
    scan_registry(sys_root, dev_root, KEYBOARD_NAME_HINTS).unwrap_or_else(|| {
        warn!(
            "could not find keyboard input device, using default {}",
            fallback.display()
        );
        fallback.to_path_buf()
    })
}

/// Locate the pad accelerometer event node, if one exists.
pub fn find_pad_accelerometer_path() -> Option<PathBuf> {
    scan_registry(
        Path::new(SYS_INPUT_ROOT),
        Path::new(DEV_INPUT_ROOT),
        ACCEL_NAME_HINTS,
    )
}
