//! Platform-agnostic types for the aquarium controller.
//!
//! This crate holds everything that does not touch Bluetooth: status and
//! schedule types, the characteristic UUID table, and the wire codecs for
//! both protocol revisions.
//!
//! # Example
//!
//! ```
//! use aquarium_types::{frame, DeviceStatus};
//!
//! let mut status = DeviceStatus::default();
//! status.apply(&frame::decode(b"STATUS:L1P0H1F0S45Q0").unwrap());
//! assert!(status.light_on);
//! assert_eq!(status.servo_position.to_degrees(), 45);
//! ```

pub mod error;
pub mod frame;
pub mod payload;
pub mod schedule;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use frame::Command;
pub use schedule::{OnOffSchedule, ScheduleEntry, ScheduleMirror, TimeOfDay};
pub use types::{ControlPoint, DeviceStatus, ProtocolRevision, ServoPosition, StatusPatch};
pub use uuid as uuids;
