//! Control-channel protocol: notification decoding and the actuation command
//!
//! The keyboard MCU pushes fixed-format frames on the control device. A frame
//! is at least 7 bytes: a class prefix, a two-byte magic pair, a reserved
//! byte, a type code, a validity flag, and a payload. Frames that are too
//! short, carry the wrong magic, or an unrecognized type are expected noise
//! and decode to `None`, never to an error.

use tracing::debug;

/// Notification frame constants.
///
/// **Note:** power frames (types 37/40) are decoded by their payload byte,
/// not the type code — the MCU emits both type codes for either direction
/// and the payload byte carries the actual wake/sleep bit.
pub mod msg {
    /// Accepted class prefixes (byte 0); anything else is discarded
    pub const PREFIXES: [u8; 4] = [34, 35, 36, 38];
    /// Magic pair (bytes 1-2)
    pub const MAGIC_1: u8 = 0x31;
    pub const MAGIC_2: u8 = 0x38;

    /// Power notification, sleep-class type code
    pub const TYPE_SLEEP: u8 = 37;
    /// Power notification, wake-class type code
    pub const TYPE_WAKE: u8 = 40;
    /// Screen locked (acts unconditionally, validity flag ignored)
    pub const TYPE_LOCK: u8 = 41;
    /// Screen unlocked (acts unconditionally, validity flag ignored)
    pub const TYPE_UNLOCK: u8 = 42;
    /// Keyboard-side accelerometer sample, packed in bytes 6-11
    pub const TYPE_MOVEMENT: u8 = 43;

    /// Minimum decodable frame length
    pub const MIN_LEN: usize = 7;
    /// Movement frames carry a 6-byte packed sample after the flags
    pub const MOVEMENT_LEN: usize = 12;
}

/// Actuation command bytes
pub mod cmd {
    /// Keyboard enable/disable command
    pub const SET_ENABLE: u8 = 0x32;
    /// Fixed argument byte for SET_ENABLE
    pub const SET_ENABLE_ARG: u8 = 0xFF;
}

/// Raw 12-bit signed accelerometer triplet from a movement frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccelSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Typed notification events
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Device is going to sleep; monitoring pauses
    Sleep,
    /// Device woke up; monitoring resumes and re-evaluates
    Wake,
    /// Screen locked; keyboard is force-disabled
    Lock,
    /// Screen unlocked; re-evaluate from the current connection state
    Unlock,
    /// Keyboard-side accelerometer sample for hinge-angle estimation
    Movement(AccelSample),
}

/// Build the outbound 3-byte actuation command.
pub fn actuation_frame(enable: bool) -> [u8; 3] {
    [cmd::SET_ENABLE, cmd::SET_ENABLE_ARG, enable as u8]
}

/// Sign-extend a 12-bit raw value (bit 11 is the sign bit).
pub fn sign_extend_12(raw: u16) -> i16 {
    if raw >= 2048 {
        raw as i16 - 4096
    } else {
        raw as i16
    }
}

/// Unpack a 12-bit triplet: per axis, the low nibble of the first byte
/// holds bits 11-8 and the next byte bits 7-0.
fn unpack_accel(bytes: &[u8]) -> AccelSample {
    let axis = |i: usize| {
        let raw = u16::from(bytes[2 * i] & 0x0F) << 8 | u16::from(bytes[2 * i + 1]);
        sign_extend_12(raw)
    };
    AccelSample {
        x: axis(0),
        y: axis(1),
        z: axis(2),
    }
}

/// Decode one notification frame into a typed event.
///
/// Pure function; returns `None` for anything that is not a recognized,
/// valid frame.
pub fn decode(frame: &[u8]) -> Option<Event> {
    if frame.len() < msg::MIN_LEN {
        debug!("frame too short: {} bytes", frame.len());
        return None;
    }

    if !msg::PREFIXES.contains(&frame[0]) {
        debug!("invalid frame prefix: {:02x}", frame[0]);
        return None;
    }

    if frame[1] != msg::MAGIC_1 || frame[2] != msg::MAGIC_2 {
        debug!("invalid frame magic: {:02x},{:02x}", frame[1], frame[2]);
        return None;
    }

    let msg_type = frame[4];
    let valid = frame[5] == 1;

    match msg_type {
        msg::TYPE_SLEEP | msg::TYPE_WAKE if valid => {
            // Payload byte governs the direction; the two type codes are
            // interchangeable on the wire.
            if frame[6] == 1 {
                Some(Event::Wake)
            } else {
                Some(Event::Sleep)
            }
        }
        msg::TYPE_LOCK => Some(Event::Lock),
        msg::TYPE_UNLOCK => Some(Event::Unlock),
        msg::TYPE_MOVEMENT if valid && frame.len() >= msg::MOVEMENT_LEN => {
            Some(Event::Movement(unpack_accel(&frame[6..12])))
        }
        _ => {
            debug!("unhandled frame type: {} (0x{:02x})", msg_type, msg_type);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(msg_type: u8, valid: u8, payload: u8) -> Vec<u8> {
        vec![34, msg::MAGIC_1, msg::MAGIC_2, 0, msg_type, valid, payload]
    }

    #[test]
    fn test_actuation_frame() {
        assert_eq!(actuation_frame(true), [0x32, 0xFF, 1]);
        assert_eq!(actuation_frame(false), [0x32, 0xFF, 0]);
    }

    #[test]
    fn test_short_frame_discarded() {
        assert_eq!(decode(&[34, 0x31, 0x38, 0, 37, 1]), None);
        assert_eq!(decode(&[]), None);
    }

    #[test]
    fn test_bad_prefix_discarded() {
        let mut f = frame(msg::TYPE_WAKE, 1, 1);
        f[0] = 0x05;
        assert_eq!(decode(&f), None);
    }

    #[test]
    fn test_bad_magic_discarded() {
        let mut f = frame(msg::TYPE_WAKE, 1, 1);
        f[1] = 0x30;
        assert_eq!(decode(&f), None);
    }

    #[test]
    fn test_power_payload_governs_direction() {
        // The payload byte decides sleep vs wake regardless of which power
        // type code arrived.
        assert_eq!(decode(&frame(msg::TYPE_SLEEP, 1, 0)), Some(Event::Sleep));
        assert_eq!(decode(&frame(msg::TYPE_SLEEP, 1, 1)), Some(Event::Wake));
        assert_eq!(decode(&frame(msg::TYPE_WAKE, 1, 1)), Some(Event::Wake));
        assert_eq!(decode(&frame(msg::TYPE_WAKE, 1, 0)), Some(Event::Sleep));
    }

    #[test]
    fn test_power_requires_validity_flag() {
        assert_eq!(decode(&frame(msg::TYPE_SLEEP, 0, 0)), None);
        assert_eq!(decode(&frame(msg::TYPE_WAKE, 0, 1)), None);
    }

    #[test]
    fn test_lock_unlock_unconditional() {
        // The framework writer sets the validity flag, but lock state must
        // apply either way.
        assert_eq!(decode(&frame(msg::TYPE_LOCK, 0, 0)), Some(Event::Lock));
        assert_eq!(decode(&frame(msg::TYPE_LOCK, 1, 1)), Some(Event::Lock));
        assert_eq!(decode(&frame(msg::TYPE_UNLOCK, 0, 0)), Some(Event::Unlock));
    }

    #[test]
    fn test_unknown_type_discarded() {
        assert_eq!(decode(&frame(99, 1, 1)), None);
    }

    #[test]
    fn test_movement_decode() {
        // x = 100, y = -4 (raw 4092), z = 2047
        let f = vec![
            38,
            msg::MAGIC_1,
            msg::MAGIC_2,
            0,
            msg::TYPE_MOVEMENT,
            1,
            0x00,
            0x64,
            0x0F,
            0xFC,
            0x07,
            0xFF,
        ];
        assert_eq!(
            decode(&f),
            Some(Event::Movement(AccelSample {
                x: 100,
                y: -4,
                z: 2047
            }))
        );
    }

    #[test]
    fn test_movement_requires_full_sample() {
        let mut f = frame(msg::TYPE_MOVEMENT, 1, 0);
        f.extend_from_slice(&[0, 0, 0, 0]); // 11 bytes, one short
        assert_eq!(decode(&f), None);
    }

    #[test]
    fn test_sign_extend_round_trip() {
        // v < 2048 maps to v, otherwise to v - 4096
        for v in [0u16, 1, 5, 100, 2047, 2048, 3000, 4092, 4095] {
            let expected = if v < 2048 {
                v as i16
            } else {
                v as i16 - 4096
            };
            assert_eq!(sign_extend_12(v), expected);
        }
        assert_eq!(sign_extend_12(2048), -2048);
        assert_eq!(sign_extend_12(4095), -1);
    }
}
