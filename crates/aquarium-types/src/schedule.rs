//! Schedule types and the client-side schedule mirror.
//!
//! Schedules live on the controller. Revision B accepts on/off pairs and a
//! feeder trigger time; Revision A accepts numbered entries that can be
//! added and deleted but never enumerated. [`ScheduleMirror`] keeps the
//! entries a client has sent so they can be shown, nothing more.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A wall-clock time of day with minute resolution.
///
/// ```
/// use aquarium_types::TimeOfDay;
///
/// let t: TimeOfDay = "8:05".parse().unwrap();
/// assert_eq!(t.to_string(), "08:05");
/// assert!(TimeOfDay::new(24, 0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidValue`] if `hour > 23` or `minute > 59`.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ParseError> {
        if hour > 23 {
            return Err(ParseError::invalid_value(format!(
                "hour {hour} out of range 0-23"
            )));
        }
        if minute > 59 {
            return Err(ParseError::invalid_value(format!(
                "minute {minute} out of range 0-59"
            )));
        }
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub fn hour(&self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| ParseError::invalid_value(format!("expected HH:MM, got '{s}'")))?;
        let hour = hour
            .parse::<u8>()
            .map_err(|_| ParseError::invalid_value(format!("invalid hour in '{s}'")))?;
        let minute = minute
            .parse::<u8>()
            .map_err(|_| ParseError::invalid_value(format!("invalid minute in '{s}'")))?;
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

/// Daily on/off window for the light or the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OnOffSchedule {
    pub on: TimeOfDay,
    pub off: TimeOfDay,
}

impl OnOffSchedule {
    pub fn new(on: TimeOfDay, off: TimeOfDay) -> Self {
        Self { on, off }
    }
}

impl fmt::Display for OnOffSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.on, self.off)
    }
}

/// A numbered schedule entry (Revision A).
///
/// At `at`, the controller sets the three relays to the given states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScheduleEntry {
    pub id: u32,
    pub at: TimeOfDay,
    pub light_on: bool,
    pub pump_on: bool,
    pub heater_on: bool,
}

impl ScheduleEntry {
    pub fn new(id: u32, at: TimeOfDay) -> Self {
        Self {
            id,
            at,
            light_on: false,
            pump_on: false,
            heater_on: false,
        }
    }

    #[must_use]
    pub fn light(mut self, on: bool) -> Self {
        self.light_on = on;
        self
    }

    #[must_use]
    pub fn pump(mut self, on: bool) -> Self {
        self.pump_on = on;
        self
    }

    #[must_use]
    pub fn heater(mut self, on: bool) -> Self {
        self.heater_on = on;
        self
    }
}

impl fmt::Display for ScheduleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |on: bool| if on { "on" } else { "off" };
        write!(
            f,
            "#{} {} light={} pump={} heater={}",
            self.id,
            self.at,
            flag(self.light_on),
            flag(self.pump_on),
            flag(self.heater_on)
        )
    }
}

/// Display-only list of schedule entries a client has sent.
///
/// Never read back from the controller and not authoritative.
#[derive(Debug, Clone, Default)]
pub struct ScheduleMirror {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier to use for the next entry: one past the largest seen.
    #[must_use]
    pub fn next_id(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.id)
            .max()
            .map_or(0, |id| id.saturating_add(1))
    }

    /// Record an entry, replacing any entry with the same id.
    pub fn add(&mut self, entry: ScheduleEntry) {
        match self.entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self.entries.sort_by_key(|e| (e.at, e.id));
    }

    /// Remove an entry by id, returning it if present.
    pub fn remove(&mut self, id: u32) -> Option<ScheduleEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Entries ordered by time of day.
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
