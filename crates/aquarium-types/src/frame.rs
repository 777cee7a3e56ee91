//! Revision A text framing.
//!
//! Every command is a short UTF-8 frame written to the single command
//! characteristic, and the controller answers on the same characteristic
//! with `TEMP:<float>` or a compact `STATUS:` frame.

use core::fmt;

use time::PrimitiveDateTime;

use crate::error::{ParseError, ParseResult};
use crate::schedule::ScheduleEntry;
use crate::types::{ServoPosition, StatusPatch};

/// Largest servo angle the Revision A firmware accepts or reports.
pub const SERVO_MAX_WIRE_DEGREES: u8 = 180;

/// An outbound Revision A command.
///
/// Servo positions go out as whole degrees of the 0-90° travel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Light(bool),
    Pump(bool),
    Heater(bool),
    Feeder(bool),
    Servo(ServoPosition),
    Quiet(bool),
    Feed,
    Time(PrimitiveDateTime),
    GetStatus,
    Schedule(ScheduleEntry),
    DeleteSchedule(u32),
}

impl Command {
    /// Encode the command as the bytes written to the characteristic.
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

fn bit(on: bool) -> u8 {
    u8::from(on)
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Light(on) => write!(f, "LIGHT:{}", bit(*on)),
            Command::Pump(on) => write!(f, "PUMP:{}", bit(*on)),
            Command::Heater(on) => write!(f, "HEATER:{}", bit(*on)),
            Command::Feeder(on) => write!(f, "FEEDER:{}", bit(*on)),
            Command::Servo(position) => write!(f, "SERVO:{}", position.to_degrees()),
            Command::Quiet(on) => write!(f, "QUIET:{}", bit(*on)),
            Command::Feed => f.write_str("FEED"),
            Command::Time(dt) => write!(
                f,
                "TIME:{},{},{},{},{},{}",
                dt.year(),
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            ),
            Command::GetStatus => f.write_str("GET_STATUS"),
            Command::Schedule(entry) => write!(
                f,
                "SCHEDULE:{},{},{},{},{},{}",
                entry.id,
                entry.at.hour(),
                entry.at.minute(),
                bit(entry.light_on),
                bit(entry.pump_on),
                bit(entry.heater_on)
            ),
            Command::DeleteSchedule(id) => write!(f, "DEL_SCHEDULE:{id}"),
        }
    }
}

/// Decode an inbound Revision A notification into a status patch.
///
/// # Errors
///
/// Returns [`ParseError::InvalidUtf8`] for non-text payloads,
/// [`ParseError::UnknownFrame`] for unrecognised prefixes, and
/// [`ParseError::InvalidValue`] for malformed fields.
///
/// ```
/// use aquarium_types::frame;
///
/// let patch = frame::decode(b"TEMP:24.5").unwrap();
/// assert_eq!(patch.temperature, Some(24.5));
/// ```
pub fn decode(data: &[u8]) -> ParseResult<StatusPatch> {
    let text = core::str::from_utf8(data).map_err(|_| ParseError::InvalidUtf8)?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if let Some(value) = text.strip_prefix("TEMP:") {
        return decode_temperature(value);
    }
    if let Some(body) = text.strip_prefix("STATUS:") {
        return decode_status(body);
    }
    Err(ParseError::UnknownFrame(text.to_string()))
}

fn decode_temperature(value: &str) -> ParseResult<StatusPatch> {
    let celsius: f32 = value
        .trim()
        .parse()
        .map_err(|_| ParseError::invalid_value(format!("temperature '{value}' is not a number")))?;
    if !celsius.is_finite() {
        return Err(ParseError::invalid_value(format!(
            "temperature '{value}' is not finite"
        )));
    }
    Ok(StatusPatch::new().with_temperature(celsius))
}

/// Cursor over a `STATUS:` body such as `L1P0H1F0S45Q0`.
struct StatusFields<'a> {
    body: &'a str,
    rest: &'a str,
}

impl<'a> StatusFields<'a> {
    fn new(body: &'a str) -> Self {
        Self { body, rest: body }
    }

    fn tag(&mut self, tag: char) -> ParseResult<()> {
        self.rest = self.rest.strip_prefix(tag).ok_or_else(|| {
            ParseError::invalid_value(format!("status frame '{}' missing '{tag}' field", self.body))
        })?;
        Ok(())
    }

    fn flag(&mut self, tag: char) -> ParseResult<bool> {
        self.tag(tag)?;
        let mut chars = self.rest.chars();
        let on = match chars.next() {
            Some('1') => true,
            Some('0') => false,
            _ => {
                return Err(ParseError::invalid_value(format!(
                    "status frame '{}' has a non-binary '{tag}' flag",
                    self.body
                )));
            }
        };
        self.rest = chars.as_str();
        Ok(on)
    }

    fn number(&mut self, tag: char) -> ParseResult<u8> {
        self.tag(tag)?;
        let end = self
            .rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(self.rest.len());
        let (digits, rest) = self.rest.split_at(end);
        let value = digits.parse::<u8>().map_err(|_| {
            ParseError::invalid_value(format!(
                "status frame '{}' has an invalid '{tag}' value",
                self.body
            ))
        })?;
        self.rest = rest;
        Ok(value)
    }
}

/// The firmware reports angles up to 180°; the actuator stops at 90°.
fn decode_servo_degrees(degrees: u8) -> ParseResult<ServoPosition> {
    if degrees > SERVO_MAX_WIRE_DEGREES {
        return Err(ParseError::invalid_value(format!(
            "servo angle {degrees}° exceeds maximum of {SERVO_MAX_WIRE_DEGREES}°"
        )));
    }
    Ok(ServoPosition::saturating_from_degrees(degrees))
}

fn decode_status(body: &str) -> ParseResult<StatusPatch> {
    let mut fields = StatusFields::new(body);
    let light = fields.flag('L')?;
    let pump = fields.flag('P')?;
    let heater = fields.flag('H')?;
    let feeder = fields.flag('F')?;
    let servo = decode_servo_degrees(fields.number('S')?)?;
    let quiet = fields.flag('Q')?;

    Ok(StatusPatch::new()
        .with_light(light)
        .with_pump(pump)
        .with_heater(heater)
        .with_feeder(feeder)
        .with_servo(servo)
        .with_quiet_mode(quiet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeOfDay;
    use time::macros::datetime;

    #[test]
    fn test_switch_commands() {
        assert_eq!(Command::Light(true).to_string(), "LIGHT:1");
        assert_eq!(Command::Pump(false).to_string(), "PUMP:0");
        assert_eq!(Command::Heater(true).to_string(), "HEATER:1");
        assert_eq!(Command::Feeder(false).to_string(), "FEEDER:0");
        assert_eq!(Command::Quiet(true).to_string(), "QUIET:1");
        assert_eq!(Command::Feed.encode(), b"FEED");
        assert_eq!(Command::GetStatus.encode(), b"GET_STATUS");
    }

    #[test]
    fn test_servo_command_carries_degrees() {
        let cmd = Command::Servo(ServoPosition::new(75).unwrap());
        assert_eq!(cmd.to_string(), "SERVO:68");
        assert_eq!(Command::Servo(ServoPosition::OPEN).to_string(), "SERVO:90");
        assert_eq!(Command::Servo(ServoPosition::CLOSED).to_string(), "SERVO:0");
    }

    #[test]
    fn test_time_command_is_unpadded() {
        let cmd = Command::Time(datetime!(2024-03-05 08:07:09));
        assert_eq!(cmd.to_string(), "TIME:2024,3,5,8,7,9");
    }

    #[test]
    fn test_schedule_commands() {
        let entry = ScheduleEntry::new(2, TimeOfDay::new(7, 30).unwrap())
            .light(true)
            .heater(true);
        assert_eq!(
            Command::Schedule(entry).to_string(),
            "SCHEDULE:2,7,30,1,0,1"
        );
        assert_eq!(Command::DeleteSchedule(2).to_string(), "DEL_SCHEDULE:2");
    }

    #[test]
    fn test_decode_status_frame() {
        let patch = decode(b"STATUS:L1P0H1F0S45Q0").unwrap();
        assert_eq!(patch.light_on, Some(true));
        assert_eq!(patch.pump_on, Some(false));
        assert_eq!(patch.heater_on, Some(true));
        assert_eq!(patch.feeder_on, Some(false));
        let servo = patch.servo_position.unwrap();
        assert_eq!(servo.to_degrees(), 45);
        assert_eq!(servo.percent(), 50);
        assert_eq!(patch.quiet_mode, Some(false));
        assert_eq!(patch.temperature, None);
    }

    #[test]
    fn test_decode_status_variable_servo_width() {
        let patch = decode(b"STATUS:L0P1H0F1S90Q1").unwrap();
        assert_eq!(patch.servo_position, Some(ServoPosition::OPEN));
        assert_eq!(patch.quiet_mode, Some(true));

        let patch = decode(b"STATUS:L0P0H0F0S5Q0").unwrap();
        assert_eq!(patch.servo_position.map(|s| s.to_degrees()), Some(5));
    }

    #[test]
    fn test_decode_servo_beyond_travel_clamps() {
        for degrees in [91, 135, 180] {
            let frame = format!("STATUS:L0P0H0F0S{degrees}Q0");
            let patch = decode(frame.as_bytes()).unwrap();
            assert_eq!(patch.servo_position, Some(ServoPosition::OPEN));
        }
    }

    #[test]
    fn test_decode_trims_padding() {
        let patch = decode(b"TEMP:25.25\r\n\0").unwrap();
        assert_eq!(patch.temperature, Some(25.25));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(
            decode(b"HELLO"),
            Err(ParseError::UnknownFrame(_))
        ));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(ParseError::InvalidUtf8)));
        assert!(decode(b"TEMP:warm").is_err());
        assert!(decode(b"TEMP:NaN").is_err());
        assert!(decode(b"STATUS:L2P0H1F0S45Q0").is_err());
        assert!(decode(b"STATUS:L1P0H1F0Q0").is_err());
        assert!(decode(b"STATUS:L1P0H1F0S181Q0").is_err());
        assert!(decode(b"STATUS:L1P0H1F0S999Q0").is_err());
        assert!(decode(b"STATUS:L1P0").is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn status_flags_roundtrip(
            light: bool, pump: bool, heater: bool, feeder: bool, quiet: bool,
            servo in 0u8..=90,
        ) {
            let frame = format!(
                "STATUS:L{}P{}H{}F{}S{:02}Q{}",
                u8::from(light), u8::from(pump), u8::from(heater),
                u8::from(feeder), servo, u8::from(quiet)
            );
            let patch = decode(frame.as_bytes()).unwrap();
            prop_assert_eq!(patch.light_on, Some(light));
            prop_assert_eq!(patch.pump_on, Some(pump));
            prop_assert_eq!(patch.heater_on, Some(heater));
            prop_assert_eq!(patch.feeder_on, Some(feeder));
            prop_assert_eq!(patch.quiet_mode, Some(quiet));
            prop_assert_eq!(patch.servo_position.map(|s| s.to_degrees()), Some(servo));
        }

        #[test]
        fn servo_command_decodes_in_status(percent in 0u8..=100) {
            let position = ServoPosition::new(percent).unwrap();
            let sent = Command::Servo(position).to_string();
            let value = sent.strip_prefix("SERVO:").unwrap();
            let patch = decode(format!("STATUS:L0P0H0F0S{value}Q0").as_bytes()).unwrap();
            let reported = patch.servo_position.unwrap();
            prop_assert_eq!(reported.to_degrees(), position.to_degrees());
            prop_assert_eq!(reported, position.snapped_to_degrees());
            prop_assert_eq!(Command::Servo(reported).to_string(), sent);
        }

        #[test]
        fn servo_reports_past_travel_are_fully_open(degrees in 91u8..=180) {
            let patch = decode(format!("STATUS:L0P0H0F0S{degrees}Q0").as_bytes()).unwrap();
            prop_assert_eq!(patch.servo_position, Some(ServoPosition::OPEN));
        }

        #[test]
        fn temperature_frames_decode(t in 0.0f32..40.0) {
            let patch = decode(format!("TEMP:{t}").as_bytes()).unwrap();
            prop_assert_eq!(patch.temperature, Some(t));
        }

        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..40)) {
            let _ = decode(&data);
        }
    }
}
