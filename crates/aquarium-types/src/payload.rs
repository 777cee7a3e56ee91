//! Revision B per-characteristic payload codecs.
//!
//! Each control point has its own layout:
//!
//! | Control point | Layout |
//! |---------------|--------|
//! | light, filter, heater, feeder | 1 byte, nonzero = on |
//! | temperature, target temperature | f32 little-endian |
//! | servo | 1 byte percentage |
//! | quiet mode | UTF-8 minutes, `"0"` = off |
//! | time sync | UTF-8 `YYYY-MM-DD HH:MM:SS` |
//! | light/filter schedule | UTF-8 `HH:MM,HH:MM` |
//! | feeder schedule | UTF-8 `HH:MM` |
//! | feed now | `[0x01]` |

use bytes::{Buf, BufMut};
use time::PrimitiveDateTime;

use crate::error::{ParseError, ParseResult};
use crate::schedule::{OnOffSchedule, TimeOfDay};
use crate::types::{ControlPoint, ServoPosition, StatusPatch};

/// Payload written to the feed-now characteristic.
pub const FEED_TRIGGER: [u8; 1] = [0x01];

/// Size of a float payload.
pub const FLOAT_BYTES: usize = 4;

pub fn encode_bool(on: bool) -> Vec<u8> {
    vec![u8::from(on)]
}

/// Decode a switch byte. Extra bytes are ignored.
pub fn decode_bool(data: &[u8]) -> ParseResult<bool> {
    match data.first() {
        Some(&b) => Ok(b != 0),
        None => Err(ParseError::InsufficientBytes {
            expected: 1,
            actual: 0,
        }),
    }
}

pub fn encode_float(value: f32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FLOAT_BYTES);
    buf.put_f32_le(value);
    buf
}

/// Decode a little-endian f32.
///
/// # Errors
///
/// Returns [`ParseError::InsufficientBytes`] for payloads shorter than four
/// bytes and [`ParseError::InvalidValue`] for NaN or infinities.
pub fn decode_float(data: &[u8]) -> ParseResult<f32> {
    if data.len() < FLOAT_BYTES {
        return Err(ParseError::InsufficientBytes {
            expected: FLOAT_BYTES,
            actual: data.len(),
        });
    }
    let mut buf = data;
    let value = buf.get_f32_le();
    if !value.is_finite() {
        return Err(ParseError::invalid_value(format!(
            "temperature {value} is not finite"
        )));
    }
    Ok(value)
}

pub fn encode_servo(position: ServoPosition) -> Vec<u8> {
    vec![position.percent()]
}

pub fn decode_servo(data: &[u8]) -> ParseResult<ServoPosition> {
    let percent = *data.first().ok_or(ParseError::InsufficientBytes {
        expected: 1,
        actual: 0,
    })?;
    ServoPosition::new(percent)
}

/// Encode a quiet-mode duration; zero turns quiet mode off.
pub fn encode_quiet_minutes(minutes: u16) -> Vec<u8> {
    minutes.to_string().into_bytes()
}

/// Decode quiet mode: `"0"` is off, any other number of minutes is on.
pub fn decode_quiet(data: &[u8]) -> ParseResult<bool> {
    let minutes = utf8(data)?
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .parse::<u32>()
        .map_err(|_| ParseError::invalid_value("quiet mode is not a number of minutes"))?;
    Ok(minutes != 0)
}

/// Encode the controller clock as `YYYY-MM-DD HH:MM:SS`.
pub fn encode_time(at: PrimitiveDateTime) -> Vec<u8> {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
    .into_bytes()
}

/// Encode a light or filter schedule as `HH:MM,HH:MM`.
///
/// ```
/// use aquarium_types::{payload, OnOffSchedule, TimeOfDay};
///
/// let schedule = OnOffSchedule::new(
///     TimeOfDay::new(8, 0).unwrap(),
///     TimeOfDay::new(20, 0).unwrap(),
/// );
/// assert_eq!(payload::encode_on_off_schedule(&schedule), b"08:00,20:00");
/// ```
pub fn encode_on_off_schedule(schedule: &OnOffSchedule) -> Vec<u8> {
    schedule.to_string().into_bytes()
}

/// Encode the feeder trigger as `HH:MM`.
pub fn encode_feeder_schedule(at: TimeOfDay) -> Vec<u8> {
    at.to_string().into_bytes()
}

fn utf8(data: &[u8]) -> ParseResult<&str> {
    core::str::from_utf8(data).map_err(|_| ParseError::InvalidUtf8)
}

/// Decode a notification or read value from `point` into a status patch.
///
/// Control points that never carry status (time sync, schedules, feed now)
/// decode to an empty patch.
pub fn decode(point: ControlPoint, data: &[u8]) -> ParseResult<StatusPatch> {
    let patch = StatusPatch::new();
    Ok(match point {
        ControlPoint::Temperature => patch.with_temperature(decode_float(data)?),
        ControlPoint::TargetTemperature => patch.with_target_temperature(decode_float(data)?),
        ControlPoint::Light => patch.with_light(decode_bool(data)?),
        ControlPoint::Filter => patch.with_pump(decode_bool(data)?),
        ControlPoint::Heater => patch.with_heater(decode_bool(data)?),
        ControlPoint::Feeder => patch.with_feeder(decode_bool(data)?),
        ControlPoint::Servo => patch.with_servo(decode_servo(data)?),
        ControlPoint::QuietMode => patch.with_quiet_mode(decode_quiet(data)?),
        ControlPoint::Command => return crate::frame::decode(data),
        ControlPoint::TimeSync
        | ControlPoint::LightSchedule
        | ControlPoint::FilterSchedule
        | ControlPoint::FeederSchedule
        | ControlPoint::FeedNow => patch,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn switch_point() -> impl Strategy<Value = ControlPoint> {
        prop_oneof![
            Just(ControlPoint::Light),
            Just(ControlPoint::Filter),
            Just(ControlPoint::Heater),
            Just(ControlPoint::Feeder),
        ]
    }

    proptest! {
        #[test]
        fn bool_roundtrip(on: bool, point in switch_point()) {
            let patch = decode(point, &encode_bool(on)).unwrap();
            let decoded = patch.light_on.or(patch.pump_on).or(patch.heater_on).or(patch.feeder_on);
            prop_assert_eq!(decoded, Some(on));
        }

        #[test]
        fn temperature_roundtrip(t in 0.0f32..=40.0) {
            let back = decode_float(&encode_float(t)).unwrap();
            prop_assert!((back - t).abs() <= f32::EPSILON);
            let patch = decode(ControlPoint::TargetTemperature, &encode_float(t)).unwrap();
            prop_assert_eq!(patch.target_temperature, Some(back));
        }

        #[test]
        fn servo_percent_roundtrip(p in 0u8..=100) {
            let position = ServoPosition::new(p).unwrap();
            let patch = decode(ControlPoint::Servo, &encode_servo(position)).unwrap();
            prop_assert_eq!(patch.servo_position, Some(position));
            let via_degrees = ServoPosition::from_degrees(position.to_degrees()).unwrap();
            prop_assert!(via_degrees.percent().abs_diff(p) <= 1);
        }

        #[test]
        fn servo_degrees_roundtrip(d in 0u8..=90) {
            let position = ServoPosition::from_degrees(d).unwrap();
            let decoded = decode_servo(&encode_servo(position)).unwrap();
            prop_assert_eq!(decoded.to_degrees(), d);
        }

        #[test]
        fn quiet_minutes_roundtrip(minutes: u16) {
            prop_assert_eq!(decode_quiet(&encode_quiet_minutes(minutes)).unwrap(), minutes != 0);
        }

        #[test]
        fn schedule_payload_matches_format(h1 in 0u8..24, m1 in 0u8..60, h2 in 0u8..24, m2 in 0u8..60) {
            let schedule = OnOffSchedule::new(
                TimeOfDay::new(h1, m1).unwrap(),
                TimeOfDay::new(h2, m2).unwrap(),
            );
            let expected = format!("{h1:02}:{m1:02},{h2:02}:{m2:02}");
            prop_assert_eq!(encode_on_off_schedule(&schedule), expected.into_bytes());
        }
    }
}
