//! Output formatting for text and JSON output.

use anyhow::Result;
use aquarium_core::{DeviceStatus, LinkInfo, ScheduleMirror, StatusPatch};
use owo_colors::OwoColorize;

/// Formatting options for output.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    /// Disable colored output.
    pub no_color: bool,
    /// Print JSON instead of text.
    pub json: bool,
    /// Use compact JSON output (no pretty-printing).
    pub compact: bool,
}

impl FormatOptions {
    pub fn new(no_color: bool, json: bool, compact: bool) -> Self {
        Self {
            no_color,
            json,
            compact,
        }
    }

    /// Serialize value to JSON string, respecting compact option.
    pub fn as_json<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        Ok(json + "\n")
    }

    #[must_use]
    pub fn format_temp(&self, celsius: f32) -> String {
        let text = format!("{:.1}°C", celsius);
        if self.no_color {
            text
        } else {
            text.cyan().to_string()
        }
    }

    /// `ON`/`OFF` label for a switch.
    #[must_use]
    pub fn format_switch(&self, on: bool) -> String {
        let label = if on { "ON" } else { "OFF" };
        if self.no_color {
            label.to_string()
        } else if on {
            label.green().to_string()
        } else {
            label.dimmed().to_string()
        }
    }

    /// Field label padded to a fixed column.
    fn label(&self, text: &str) -> String {
        let padded = format!("{:<12}", text);
        if self.no_color {
            padded
        } else {
            padded.bold().to_string()
        }
    }
}

// ============================================================================
// Status formatting
// ============================================================================

/// Multi-line status block.
#[must_use]
pub fn format_status_text(status: &DeviceStatus, opts: &FormatOptions) -> String {
    let mut lines = vec![
        format!(
            "{} {}",
            opts.label("Temperature"),
            opts.format_temp(status.temperature)
        ),
    ];
    if let Some(target) = status.target_temperature {
        lines.push(format!(
            "{} {}",
            opts.label("Target"),
            opts.format_temp(target)
        ));
    }
    for (name, on) in [
        ("Light", status.light_on),
        ("Pump", status.pump_on),
        ("Heater", status.heater_on),
        ("Feeder", status.feeder_on),
        ("Quiet", status.quiet_mode),
    ] {
        lines.push(format!("{} {}", opts.label(name), opts.format_switch(on)));
    }
    lines.push(format!(
        "{} {} ({}°)",
        opts.label("Servo"),
        status.servo_position,
        status.servo_position.to_degrees()
    ));
    if !status.date_time.is_empty() {
        lines.push(format!("{} {}", opts.label("Clock"), status.date_time));
    }
    lines.join("\n") + "\n"
}

/// One-line summary of the fields a patch carries, for watch output.
#[must_use]
pub fn format_patch_line(patch: &StatusPatch, opts: &FormatOptions) -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    let ts = format!(
        "{:02}:{:02}:{:02}",
        now.hour(),
        now.minute(),
        now.second()
    );

    let mut parts = vec![if opts.no_color {
        ts
    } else {
        ts.dimmed().to_string()
    }];
    if let Some(t) = patch.temperature {
        parts.push(format!("temp {}", opts.format_temp(t)));
    }
    if let Some(t) = patch.target_temperature {
        parts.push(format!("target {}", opts.format_temp(t)));
    }
    for (name, value) in [
        ("light", patch.light_on),
        ("pump", patch.pump_on),
        ("heater", patch.heater_on),
        ("feeder", patch.feeder_on),
        ("quiet", patch.quiet_mode),
    ] {
        if let Some(on) = value {
            parts.push(format!("{} {}", name, opts.format_switch(on)));
        }
    }
    if let Some(servo) = patch.servo_position {
        parts.push(format!("servo {}", servo));
    }
    if let Some(clock) = &patch.date_time {
        parts.push(format!("clock {}", clock));
    }
    parts.join("  ") + "\n"
}

/// Status or patch, as JSON or text per `opts`.
pub fn format_patch(patch: &StatusPatch, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        opts.as_json(patch)
    } else {
        Ok(format_patch_line(patch, opts))
    }
}

pub fn format_status(status: &DeviceStatus, opts: &FormatOptions) -> Result<String> {
    if opts.json {
        opts.as_json(status)
    } else {
        Ok(format_status_text(status, opts))
    }
}

// ============================================================================
// Link and schedule formatting
// ============================================================================

#[must_use]
pub fn format_link_info(info: &LinkInfo, opts: &FormatOptions) -> String {
    let name = if opts.no_color {
        info.name.clone()
    } else {
        info.name.green().to_string()
    };
    let identifier = if opts.no_color {
        info.identifier.clone()
    } else {
        info.identifier.cyan().to_string()
    };
    format!(
        "Connected: {} ({}) using {} protocol",
        name, identifier, info.revision
    )
}

/// Schedule entries known to this session.
#[must_use]
pub fn format_schedule_list(mirror: &ScheduleMirror) -> String {
    if mirror.is_empty() {
        return "No schedule entries set in this session.\n".to_string();
    }
    let mut out = String::new();
    for entry in mirror.entries() {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquarium_core::{ScheduleEntry, ServoPosition, TimeOfDay};

    fn plain() -> FormatOptions {
        FormatOptions::new(true, false, false)
    }

    #[test]
    fn test_status_text_plain() {
        let status = DeviceStatus {
            temperature: 25.5,
            light_on: true,
            servo_position: ServoPosition::new(50).unwrap(),
            ..Default::default()
        };
        let text = format_status_text(&status, &plain());
        assert!(text.contains("Temperature  25.5°C"));
        assert!(text.contains("Light        ON"));
        assert!(text.contains("Pump         OFF"));
        assert!(text.contains("Servo        50% (45°)"));
        assert!(!text.contains("Target"));
        assert!(!text.contains("Clock"));
    }

    #[test]
    fn test_patch_line_only_carried_fields() {
        let patch = StatusPatch::new().with_light(false).with_temperature(24.0);
        let line = format_patch_line(&patch, &plain());
        assert!(line.contains("temp 24.0°C"));
        assert!(line.contains("light OFF"));
        assert!(!line.contains("pump"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_patch_json_skips_missing_fields() {
        let opts = FormatOptions::new(true, true, true);
        let json = format_patch(&StatusPatch::new().with_heater(true), &opts).unwrap();
        assert_eq!(json, "{\"heater_on\":true}\n");
    }

    #[test]
    fn test_schedule_list() {
        let mut mirror = ScheduleMirror::new();
        assert!(format_schedule_list(&mirror).contains("No schedule entries"));

        mirror.add(ScheduleEntry::new(1, TimeOfDay::new(20, 0).unwrap()));
        mirror.add(ScheduleEntry::new(0, TimeOfDay::new(8, 0).unwrap()).light(true));
        let text = format_schedule_list(&mirror);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("#0 08:00"));
        assert!(lines[1].starts_with("#1 20:00"));
    }
}
