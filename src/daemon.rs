//! Daemon entry: worker lifecycle and the foreground read loop
//!
//! The foreground loop owns the control-channel reads: read a frame, decode
//! it, hand the event to the coordinator. A zero-length read means no data
//! yet (back off briefly); a read error invalidates the handle and invokes
//! channel recovery. Three consecutive read-failure/failed-reconnect cycles
//! are fatal rather than looping forever on a broken channel.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::channel::{self, ChannelSlot, ControlChannel, ControlEndpoint};
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::DaemonError;
use crate::state::SharedState;
use crate::{discovery, monitor, prefs, protocol, sensor, watchdog};

/// Read buffer for inbound notification frames
const FRAME_BUF_LEN: usize = 1024;

/// Back-off after a zero-length read
const IDLE_READ_SLEEP: Duration = Duration::from_millis(100);

/// Failed reconnect cycles tolerated before giving up
const MAX_FAILED_CYCLES: u32 = 3;

pub fn run(config: Config) -> Result<(), DaemonError> {
    let started = Instant::now();
    info!("keyboard attach daemon starting");

    let shared = SharedState::new(config.angle_detection_default);
    {
        let shared = Arc::clone(&shared);
        ctrlc::set_handler(move || {
            info!("termination signal received");
            shared.request_shutdown();
        })?;
    }

    let presence_path = discovery::find_keyboard_input_path(&config.fallback_input_path);
    info!("using keyboard input path {}", presence_path.display());

    let channel = Arc::new(ChannelSlot::new());
    channel.install(Box::new(ControlChannel::open(&config.device_path)?));

    let coordinator = Arc::new(Coordinator::new(
        Arc::clone(&shared),
        Arc::clone(&channel),
        presence_path.clone(),
        config.device_path.clone(),
    ));
    coordinator.initial_sync();

    let mut workers: Vec<JoinHandle<()>> = Vec::new();

    workers.push(spawn_worker("kb-monitor", {
        let shared = Arc::clone(&shared);
        let coordinator = Arc::clone(&coordinator);
        let presence_path = presence_path.clone();
        move || monitor::run(shared, coordinator, presence_path)
    })?);

    if config.watchdog_enabled {
        workers.push(spawn_worker("kb-watchdog", {
            let shared = Arc::clone(&shared);
            move || watchdog::run(shared)
        })?);
    } else {
        info!("watchdog disabled by configuration");
    }

    workers.push(spawn_worker("kb-prefs", {
        let shared = Arc::clone(&shared);
        let pref_path = config.pref_path.clone();
        move || prefs::run(shared, pref_path)
    })?);

    match discovery::find_pad_accelerometer_path() {
        Some(accel_path) => {
            workers.push(spawn_worker("kb-pad-accel", {
                let shared = Arc::clone(&shared);
                move || sensor::run(shared, accel_path)
            })?);
        }
        None => info!("pad accelerometer not found, angle detection will stay inert"),
    }

    info!("main loop starting, ready to receive keyboard events");
    let result = read_loop(&shared, &coordinator, &channel, || {
        channel::reconnect(&config.device_path, &shared)
            .map(|ch| Box::new(ch) as Box<dyn ControlEndpoint>)
    });

    info!("performing cleanup");
    shared.request_shutdown();
    for worker in workers {
        let _ = worker.join();
    }
    channel.clear();

    info!(
        "daemon exiting after running for {:.1} seconds",
        started.elapsed().as_secs_f64()
    );
    result
}

fn spawn_worker<F>(name: &str, body: F) -> Result<JoinHandle<()>, DaemonError>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new().name(name.into()).spawn(body)?)
}

/// Foreground read/dispatch loop. `reconnect` is injected so recovery
/// behavior is testable without a device or real backoff sleeps.
fn read_loop<R>(
    shared: &SharedState,
    coordinator: &Coordinator,
    channel: &ChannelSlot,
    mut reconnect: R,
) -> Result<(), DaemonError>
where
    R: FnMut() -> Result<Box<dyn ControlEndpoint>, DaemonError>,
{
    let mut buf = [0u8; FRAME_BUF_LEN];
    let mut failed_cycles = 0u32;

    while !shared.shutdown_requested() {
        match channel.read_frame(&mut buf) {
            Ok(0) => {
                if !shared.sleep_sliced(IDLE_READ_SLEEP) {
                    break;
                }
            }
            Ok(n) => {
                failed_cycles = 0;
                debug!("received {} byte frame", n);
                if let Some(event) = protocol::decode(&buf[..n]) {
                    coordinator.handle_event(event);
                }
            }
            Err(e) => {
                error!("error reading control channel: {}", e);
                channel.clear();

                if failed_cycles >= MAX_FAILED_CYCLES {
                    error!(
                        "could not recover control channel after {} cycles, exiting",
                        failed_cycles
                    );
                    return Err(DaemonError::ChannelExhausted(failed_cycles));
                }

                match reconnect() {
                    Ok(endpoint) => {
                        channel.install(endpoint);
                        failed_cycles = 0;
                    }
                    Err(e) => {
                        failed_cycles += 1;
                        warn!(
                            "reconnect cycle failed ({}/{}): {}",
                            failed_cycles, MAX_FAILED_CYCLES, e
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
