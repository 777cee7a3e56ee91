//! Bluetooth UUIDs for the aquarium controller.
//!
//! Both protocol revisions advertise the same primary service. Revision A
//! exposes one command characteristic that carries text frames in both
//! directions; Revision B exposes one characteristic per function.

use uuid::{Uuid, uuid};

/// Local name the controller advertises. Peripheral selection filters on it.
pub const DEVICE_NAME: &str = "AquariumController";

// --- Service UUIDs ---

/// Primary controller service.
pub const AQUARIUM_SERVICE: Uuid = uuid!("4fafc201-1fb5-459e-8fcc-c5c9c331914b");

// --- Revision A ---

/// Single command/notification characteristic (text frames).
pub const COMMAND: Uuid = uuid!("beb5483e-36e1-4688-b7f5-ea07361b26a8");

// --- Revision B ---

/// Water temperature (f32 LE, read/notify).
pub const TEMPERATURE: Uuid = uuid!("beb54801-36e1-4688-b7f5-ea07361b26a8");

/// Light relay (1 byte, read/write/notify).
pub const LIGHT: Uuid = uuid!("beb54802-36e1-4688-b7f5-ea07361b26a8");

/// Filter pump relay (1 byte, read/write/notify).
pub const FILTER: Uuid = uuid!("beb54803-36e1-4688-b7f5-ea07361b26a8");

/// Heater relay (1 byte, read/write/notify).
pub const HEATER: Uuid = uuid!("beb54804-36e1-4688-b7f5-ea07361b26a8");

/// Feeder motor (1 byte, read/write/notify).
pub const FEEDER: Uuid = uuid!("beb54805-36e1-4688-b7f5-ea07361b26a8");

/// Air pump servo (1 byte percentage, read/write/notify).
pub const SERVO: Uuid = uuid!("beb54806-36e1-4688-b7f5-ea07361b26a8");

/// Quiet mode (UTF-8 minutes, read/write/notify).
pub const QUIET_MODE: Uuid = uuid!("beb54807-36e1-4688-b7f5-ea07361b26a8");

/// Clock synchronisation (UTF-8 `YYYY-MM-DD HH:MM:SS`, write).
pub const TIME_SYNC: Uuid = uuid!("beb54808-36e1-4688-b7f5-ea07361b26a8");

/// Light on/off schedule (UTF-8 `HH:MM,HH:MM`, write).
pub const SCHEDULE_LIGHT: Uuid = uuid!("beb54809-36e1-4688-b7f5-ea07361b26a8");

/// Filter on/off schedule (UTF-8 `HH:MM,HH:MM`, write).
pub const SCHEDULE_FILTER: Uuid = uuid!("beb5480a-36e1-4688-b7f5-ea07361b26a8");

/// Feeder trigger time (UTF-8 `HH:MM`, write).
pub const SCHEDULE_FEEDER: Uuid = uuid!("beb5480b-36e1-4688-b7f5-ea07361b26a8");

/// Immediate feed trigger (any single byte, write).
pub const FEED_NOW: Uuid = uuid!("beb5480c-36e1-4688-b7f5-ea07361b26a8");

/// Heater target temperature (f32 LE, read/write/notify). Newer firmware only.
pub const TARGET_TEMPERATURE: Uuid = uuid!("beb5480d-36e1-4688-b7f5-ea07361b26a8");
