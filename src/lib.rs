//! Enablement daemon for detachable tablet keyboards
//!
//! Arbitrates a single actuator bit (keyboard electrically enabled or not)
//! across several concurrent signal sources: physical attach/detach of the
//! keyboard, sleep/wake and lock/unlock notifications from the keyboard MCU,
//! and a hinge-fold angle estimated from two accelerometers. Notifications
//! arrive as fixed-format frames on a character device; the same device
//! accepts the 3-byte actuation command.

pub mod angle;
pub mod channel;
pub mod config;
pub mod coordinator;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod monitor;
pub mod prefs;
pub mod protocol;
pub mod sensor;
pub mod state;
pub mod watchdog;

pub use channel::{ChannelSlot, ControlChannel, ControlEndpoint};
pub use config::Config;
pub use coordinator::Coordinator;
pub use error::DaemonError;
pub use protocol::{decode, AccelSample, Event};
pub use state::SharedState;
