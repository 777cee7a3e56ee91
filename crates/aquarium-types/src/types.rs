//! Core types for aquarium controller state.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseError;

/// Wire protocol revision spoken by the controller firmware.
///
/// The two revisions are incompatible; a client picks one for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProtocolRevision {
    /// Revision A: one characteristic, UTF-8 text frames in both directions.
    SingleCharacteristic,
    /// Revision B: one characteristic per function, mixed binary/text payloads.
    #[default]
    MultiCharacteristic,
}

impl ProtocolRevision {
    /// Primary service the revision is advertised under.
    #[must_use]
    pub fn service_uuid(&self) -> Uuid {
        crate::uuid::AQUARIUM_SERVICE
    }

    /// Every control point the revision defines, required or not.
    #[must_use]
    pub fn control_points(&self) -> &'static [ControlPoint] {
        match self {
            ProtocolRevision::SingleCharacteristic => &[ControlPoint::Command],
            ProtocolRevision::MultiCharacteristic => &MULTI_CHARACTERISTIC_POINTS,
        }
    }

    /// Short name used in configuration files and on the command line.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtocolRevision::SingleCharacteristic => "single",
            ProtocolRevision::MultiCharacteristic => "multi",
        }
    }
}

impl fmt::Display for ProtocolRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolRevision::SingleCharacteristic => write!(f, "single-characteristic (A)"),
            ProtocolRevision::MultiCharacteristic => write!(f, "multi-characteristic (B)"),
        }
    }
}

impl FromStr for ProtocolRevision {
    type Err = ParseError;

    /// Parse a revision name.
    ///
    /// ```
    /// use aquarium_types::ProtocolRevision;
    ///
    /// assert_eq!("single".parse(), Ok(ProtocolRevision::SingleCharacteristic));
    /// assert_eq!("B".parse(), Ok(ProtocolRevision::MultiCharacteristic));
    /// assert!("c".parse::<ProtocolRevision>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "single" | "single_characteristic" | "single-characteristic" => {
                Ok(ProtocolRevision::SingleCharacteristic)
            }
            "b" | "multi" | "multi_characteristic" | "multi-characteristic" => {
                Ok(ProtocolRevision::MultiCharacteristic)
            }
            other => Err(ParseError::invalid_value(format!(
                "unknown protocol revision '{other}' (expected 'single' or 'multi')"
            ))),
        }
    }
}

const MULTI_CHARACTERISTIC_POINTS: [ControlPoint; 13] = [
    ControlPoint::Temperature,
    ControlPoint::Light,
    ControlPoint::Filter,
    ControlPoint::Heater,
    ControlPoint::Feeder,
    ControlPoint::Servo,
    ControlPoint::QuietMode,
    ControlPoint::TimeSync,
    ControlPoint::LightSchedule,
    ControlPoint::FilterSchedule,
    ControlPoint::FeederSchedule,
    ControlPoint::FeedNow,
    ControlPoint::TargetTemperature,
];

/// Logical name of an addressable endpoint on the controller service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ControlPoint {
    /// Revision A text command/notification channel.
    Command,
    Temperature,
    Light,
    /// Filter pump; reported as `pump_on` in status.
    Filter,
    Heater,
    Feeder,
    Servo,
    QuietMode,
    TimeSync,
    LightSchedule,
    FilterSchedule,
    FeederSchedule,
    FeedNow,
    /// Only present on the latest Revision B firmware.
    TargetTemperature,
}

impl ControlPoint {
    /// Characteristic UUID backing this control point.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        use crate::uuid;
        match self {
            ControlPoint::Command => uuid::COMMAND,
            ControlPoint::Temperature => uuid::TEMPERATURE,
            ControlPoint::Light => uuid::LIGHT,
            ControlPoint::Filter => uuid::FILTER,
            ControlPoint::Heater => uuid::HEATER,
            ControlPoint::Feeder => uuid::FEEDER,
            ControlPoint::Servo => uuid::SERVO,
            ControlPoint::QuietMode => uuid::QUIET_MODE,
            ControlPoint::TimeSync => uuid::TIME_SYNC,
            ControlPoint::LightSchedule => uuid::SCHEDULE_LIGHT,
            ControlPoint::FilterSchedule => uuid::SCHEDULE_FILTER,
            ControlPoint::FeederSchedule => uuid::SCHEDULE_FEEDER,
            ControlPoint::FeedNow => uuid::FEED_NOW,
            ControlPoint::TargetTemperature => uuid::TARGET_TEMPERATURE,
        }
    }

    /// Whether connecting must fail when the peripheral lacks this control point.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !matches!(self, ControlPoint::TargetTemperature)
    }

    /// Whether values on this control point decode into a [`StatusPatch`].
    #[must_use]
    pub fn carries_status(&self) -> bool {
        matches!(
            self,
            ControlPoint::Command
                | ControlPoint::Temperature
                | ControlPoint::Light
                | ControlPoint::Filter
                | ControlPoint::Heater
                | ControlPoint::Feeder
                | ControlPoint::Servo
                | ControlPoint::QuietMode
                | ControlPoint::TargetTemperature
        )
    }

    /// Human-readable name for logs and error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ControlPoint::Command => "command",
            ControlPoint::Temperature => "temperature",
            ControlPoint::Light => "light",
            ControlPoint::Filter => "filter",
            ControlPoint::Heater => "heater",
            ControlPoint::Feeder => "feeder",
            ControlPoint::Servo => "servo",
            ControlPoint::QuietMode => "quiet-mode",
            ControlPoint::TimeSync => "time-sync",
            ControlPoint::LightSchedule => "schedule-light",
            ControlPoint::FilterSchedule => "schedule-filter",
            ControlPoint::FeederSchedule => "schedule-feeder",
            ControlPoint::FeedNow => "feed-now",
            ControlPoint::TargetTemperature => "target-temperature",
        }
    }
}

impl fmt::Display for ControlPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Air pump servo position as a percentage (0-100).
///
/// The actuator's physical travel is 0-90°, exposed through
/// [`to_degrees`](Self::to_degrees) and [`from_degrees`](Self::from_degrees).
/// Revision B carries the percentage on the wire. Revision A carries whole
/// degrees, so a position sent there comes back as
/// [`snapped_to_degrees`](Self::snapped_to_degrees).
///
/// ```
/// use aquarium_types::ServoPosition;
///
/// let half = ServoPosition::new(50).unwrap();
/// assert_eq!(half.to_degrees(), 45);
/// assert_eq!(ServoPosition::from_degrees(45).unwrap(), half);
/// assert!(ServoPosition::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct ServoPosition(u8);

impl ServoPosition {
    /// Largest accepted percentage.
    pub const MAX_PERCENT: u8 = 100;

    /// Physical travel of the actuator in degrees.
    pub const MAX_DEGREES: u8 = 90;

    /// Fully closed.
    pub const CLOSED: ServoPosition = ServoPosition(0);

    /// Fully open.
    pub const OPEN: ServoPosition = ServoPosition(Self::MAX_PERCENT);

    /// Create a position from a percentage.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if `percent` exceeds 100.
    pub fn new(percent: u8) -> Result<Self, ParseError> {
        if percent > Self::MAX_PERCENT {
            return Err(ParseError::invalid_value(format!(
                "servo position {percent}% exceeds maximum of 100%"
            )));
        }
        Ok(Self(percent))
    }

    /// Create a position, clamping to 100%.
    #[must_use]
    pub fn saturating(percent: u8) -> Self {
        Self(percent.min(Self::MAX_PERCENT))
    }

    /// Convert a physical angle (0-90°) into a percentage, rounding to nearest.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if `degrees` exceeds 90.
    pub fn from_degrees(degrees: u8) -> Result<Self, ParseError> {
        if degrees > Self::MAX_DEGREES {
            return Err(ParseError::invalid_value(format!(
                "servo angle {degrees}° exceeds maximum of 90°"
            )));
        }
        Ok(Self::saturating_from_degrees(degrees))
    }

    /// Convert an angle into a percentage, clamping to 90°.
    #[must_use]
    pub fn saturating_from_degrees(degrees: u8) -> Self {
        let degrees = degrees.min(Self::MAX_DEGREES);
        let percent = (u16::from(degrees) * 100 + 45) / 90;
        Self(percent as u8)
    }

    /// The nearest position that a whole number of degrees can express.
    #[must_use]
    pub fn snapped_to_degrees(&self) -> Self {
        Self::saturating_from_degrees(self.to_degrees())
    }

    /// The percentage (0-100).
    #[must_use]
    pub fn percent(&self) -> u8 {
        self.0
    }

    /// The physical angle (0-90°), rounding to nearest.
    #[must_use]
    pub fn to_degrees(&self) -> u8 {
        ((u16::from(self.0) * 90 + 50) / 100) as u8
    }
}

impl Default for ServoPosition {
    fn default() -> Self {
        Self(50)
    }
}

impl TryFrom<u8> for ServoPosition {
    type Error = ParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServoPosition> for u8 {
    fn from(value: ServoPosition) -> Self {
        value.0
    }
}

impl fmt::Display for ServoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Partial update to [`DeviceStatus`].
///
/// The device link only ever emits patches; fields that a notification did
/// not carry stay `None`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatusPatch {
    /// Water temperature in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub temperature: Option<f32>,
    /// Heater set point in degrees Celsius.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub target_temperature: Option<f32>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub light_on: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub pump_on: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub heater_on: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub feeder_on: Option<bool>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub servo_position: Option<ServoPosition>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub quiet_mode: Option<bool>,
    /// Controller clock as reported, display only.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub date_time: Option<String>,
}

impl StatusPatch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the patch carries no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Overlay `other` on top of `self`; fields present in `other` win.
    pub fn merge(&mut self, other: StatusPatch) {
        let StatusPatch {
            temperature,
            target_temperature,
            light_on,
            pump_on,
            heater_on,
            feeder_on,
            servo_position,
            quiet_mode,
            date_time,
        } = other;

        self.temperature = temperature.or(self.temperature);
        self.target_temperature = target_temperature.or(self.target_temperature);
        self.light_on = light_on.or(self.light_on);
        self.pump_on = pump_on.or(self.pump_on);
        self.heater_on = heater_on.or(self.heater_on);
        self.feeder_on = feeder_on.or(self.feeder_on);
        self.servo_position = servo_position.or(self.servo_position);
        self.quiet_mode = quiet_mode.or(self.quiet_mode);
        if date_time.is_some() {
            self.date_time = date_time;
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, celsius: f32) -> Self {
        self.temperature = Some(celsius);
        self
    }

    #[must_use]
    pub fn with_target_temperature(mut self, celsius: f32) -> Self {
        self.target_temperature = Some(celsius);
        self
    }

    #[must_use]
    pub fn with_light(mut self, on: bool) -> Self {
        self.light_on = Some(on);
        self
    }

    #[must_use]
    pub fn with_pump(mut self, on: bool) -> Self {
        self.pump_on = Some(on);
        self
    }

    #[must_use]
    pub fn with_heater(mut self, on: bool) -> Self {
        self.heater_on = Some(on);
        self
    }

    #[must_use]
    pub fn with_feeder(mut self, on: bool) -> Self {
        self.feeder_on = Some(on);
        self
    }

    #[must_use]
    pub fn with_servo(mut self, position: ServoPosition) -> Self {
        self.servo_position = Some(position);
        self
    }

    #[must_use]
    pub fn with_quiet_mode(mut self, on: bool) -> Self {
        self.quiet_mode = Some(on);
        self
    }

    #[must_use]
    pub fn with_date_time(mut self, date_time: impl Into<String>) -> Self {
        self.date_time = Some(date_time.into());
        self
    }
}

/// Full status snapshot, owned by whoever consumes the patches.
///
/// Patches are applied in the order they arrive, so an optimistic echo and
/// a later notification resolve last-write-wins.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceStatus {
    pub temperature: f32,
    pub target_temperature: Option<f32>,
    pub light_on: bool,
    pub pump_on: bool,
    pub heater_on: bool,
    pub feeder_on: bool,
    pub servo_position: ServoPosition,
    pub quiet_mode: bool,
    pub date_time: String,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            target_temperature: None,
            light_on: false,
            pump_on: false,
            heater_on: false,
            feeder_on: false,
            servo_position: ServoPosition::default(),
            quiet_mode: false,
            date_time: String::new(),
        }
    }
}

impl DeviceStatus {
    /// Apply a patch in place.
    pub fn apply(&mut self, patch: &StatusPatch) {
        if let Some(t) = patch.temperature {
            self.temperature = t;
        }
        if let Some(t) = patch.target_temperature {
            self.target_temperature = Some(t);
        }
        if let Some(on) = patch.light_on {
            self.light_on = on;
        }
        if let Some(on) = patch.pump_on {
            self.pump_on = on;
        }
        if let Some(on) = patch.heater_on {
            self.heater_on = on;
        }
        if let Some(on) = patch.feeder_on {
            self.feeder_on = on;
        }
        if let Some(position) = patch.servo_position {
            self.servo_position = position;
        }
        if let Some(on) = patch.quiet_mode {
            self.quiet_mode = on;
        }
        if let Some(ref date_time) = patch.date_time {
            self.date_time.clone_from(date_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_servo_bounds() {
        assert!(ServoPosition::new(0).is_ok());
        assert!(ServoPosition::new(100).is_ok());
        assert!(ServoPosition::new(101).is_err());
        assert_eq!(ServoPosition::saturating(250), ServoPosition::OPEN);
        assert!(ServoPosition::from_degrees(91).is_err());
    }

    #[test]
    fn test_servo_degree_endpoints() {
        assert_eq!(ServoPosition::CLOSED.to_degrees(), 0);
        assert_eq!(ServoPosition::OPEN.to_degrees(), 90);
        assert_eq!(ServoPosition::from_degrees(90).unwrap(), ServoPosition::OPEN);
        assert_eq!(ServoPosition::from_degrees(0).unwrap(), ServoPosition::CLOSED);
    }

    #[test]
    fn test_servo_degrees_survive_percent_conversion() {
        for degrees in 0..=ServoPosition::MAX_DEGREES {
            let position = ServoPosition::from_degrees(degrees).unwrap();
            assert_eq!(position.to_degrees(), degrees, "degrees {degrees}");
        }
    }

    #[test]
    fn test_servo_percent_through_degrees_within_one() {
        for percent in 0..=ServoPosition::MAX_PERCENT {
            let position = ServoPosition::new(percent).unwrap();
            let back = ServoPosition::from_degrees(position.to_degrees()).unwrap();
            assert!(
                back.percent().abs_diff(percent) <= 1,
                "{percent}% came back as {back}"
            );
        }
    }

    #[test]
    fn test_servo_saturating_degrees_and_snap() {
        assert_eq!(ServoPosition::saturating_from_degrees(180), ServoPosition::OPEN);
        assert_eq!(ServoPosition::saturating_from_degrees(45).percent(), 50);
        let snapped = ServoPosition::new(5).unwrap().snapped_to_degrees();
        assert_eq!(snapped.percent(), 6);
        assert_eq!(snapped.snapped_to_degrees(), snapped);
    }

    #[test]
    fn test_revision_parse_and_display() {
        assert_eq!(
            "multi".parse::<ProtocolRevision>().unwrap(),
            ProtocolRevision::MultiCharacteristic
        );
        assert_eq!(
            "Single-Characteristic".parse::<ProtocolRevision>().unwrap(),
            ProtocolRevision::SingleCharacteristic
        );
        assert_eq!(ProtocolRevision::default().as_str(), "multi");
        assert!(ProtocolRevision::SingleCharacteristic
            .to_string()
            .contains("(A)"));
    }

    #[test]
    fn test_revision_control_points() {
        assert_eq!(
            ProtocolRevision::SingleCharacteristic.control_points(),
            &[ControlPoint::Command]
        );
        let multi = ProtocolRevision::MultiCharacteristic.control_points();
        assert_eq!(multi.len(), 13);
        let optional: Vec<_> = multi.iter().filter(|cp| !cp.is_required()).collect();
        assert_eq!(optional, vec![&ControlPoint::TargetTemperature]);
    }

    #[test]
    fn test_control_point_status_flags() {
        assert!(ControlPoint::Temperature.carries_status());
        assert!(ControlPoint::Filter.carries_status());
        assert!(!ControlPoint::TimeSync.carries_status());
        assert!(!ControlPoint::FeedNow.carries_status());
        assert_eq!(ControlPoint::QuietMode.to_string(), "quiet-mode");
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(StatusPatch::new().is_empty());
        assert!(!StatusPatch::new().with_light(false).is_empty());
    }

    #[test]
    fn test_patch_merge_later_wins() {
        let mut patch = StatusPatch::new().with_light(true).with_temperature(24.0);
        patch.merge(StatusPatch::new().with_light(false).with_heater(true));

        assert_eq!(patch.light_on, Some(false));
        assert_eq!(patch.heater_on, Some(true));
        assert_eq!(patch.temperature, Some(24.0));
        assert_eq!(patch.pump_on, None);
    }

    #[test]
    fn test_status_apply_last_write_wins() {
        let mut status = DeviceStatus::default();
        status.apply(&StatusPatch::new().with_light(true));
        status.apply(&StatusPatch::new().with_light(false).with_temperature(25.5));

        assert!(!status.light_on);
        assert!((status.temperature - 25.5).abs() < f32::EPSILON);
        assert_eq!(status.servo_position, ServoPosition::default());
    }

    #[test]
    fn test_status_apply_leaves_unset_fields() {
        let mut status = DeviceStatus {
            pump_on: true,
            target_temperature: Some(26.0),
            ..DeviceStatus::default()
        };
        status.apply(&StatusPatch::new().with_quiet_mode(true));

        assert!(status.pump_on);
        assert!(status.quiet_mode);
        assert_eq!(status.target_temperature, Some(26.0));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = StatusPatch::new()
            .with_light(true)
            .with_servo(ServoPosition::new(30).unwrap());
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"light_on":true,"servo_position":30}"#);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_servo_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<ServoPosition>("120").is_err());
    }
}
