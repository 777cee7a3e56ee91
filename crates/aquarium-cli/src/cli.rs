//! CLI argument definitions using clap.

use aquarium_types::{ProtocolRevision, TimeOfDay};
use clap::{Args, Parser, Subcommand};

/// Reusable controller connection arguments
#[derive(Debug, Clone, Default, Args)]
pub struct LinkArgs {
    /// Advertised controller name, or use AQUARIUM_DEVICE env var
    #[arg(short, long, env = "AQUARIUM_DEVICE")]
    pub device: Option<String>,

    /// Protocol revision: a/single or b/multi
    #[arg(short, long, env = "AQUARIUM_REVISION")]
    pub revision: Option<ProtocolRevision>,

    /// Scan timeout in seconds
    #[arg(short = 'T', long)]
    pub timeout: Option<u64>,
}

#[derive(Parser)]
#[command(name = "aquarium")]
#[command(author, version, about = "CLI for the BLE aquarium controller", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Output compact JSON (no pretty-printing)
    #[arg(long, global = true)]
    pub compact: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Connect, print the current status and disconnect
    Status {
        #[command(flatten)]
        link: LinkArgs,

        /// Seconds to wait for the controller to report
        #[arg(short, long, default_value = "3")]
        wait: u64,
    },

    /// Stream status updates until Ctrl+C or the link drops
    Watch {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Switch an output or change a setting
    Set {
        #[command(flatten)]
        link: LinkArgs,

        #[command(subcommand)]
        setting: Setting,
    },

    /// Trigger one feeding now
    Feed {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Set the controller clock to this host's local time
    SyncTime {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Program controller schedules
    Schedule {
        #[command(flatten)]
        link: LinkArgs,

        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Interactive session over one persistent link
    Shell {
        #[command(flatten)]
        link: LinkArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Settings that can be changed with `set`
#[derive(Debug, Clone, Subcommand)]
pub enum Setting {
    /// Switch the light
    Light {
        #[arg(value_parser = parse_bool_arg, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Switch the filter pump
    Pump {
        #[arg(value_parser = parse_bool_arg, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Switch the heater
    Heater {
        #[arg(value_parser = parse_bool_arg, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Switch the feeder motor
    Feeder {
        #[arg(value_parser = parse_bool_arg, action = clap::ArgAction::Set)]
        on: bool,
    },

    /// Switch quiet mode
    Quiet {
        #[arg(value_parser = parse_bool_arg, action = clap::ArgAction::Set)]
        on: bool,

        /// Quiet duration in minutes (multi-characteristic firmware only)
        #[arg(short, long)]
        minutes: Option<u16>,
    },

    /// Move the air pump servo
    Servo {
        /// Position in percent (0-100), or degrees with --degrees
        value: u8,

        /// Interpret the value as degrees (0-90)
        #[arg(long)]
        degrees: bool,
    },

    /// Set the heater target temperature in °C
    Target {
        #[arg(allow_negative_numbers = true)]
        celsius: f32,
    },
}

/// Schedule subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ScheduleAction {
    /// Daily light window (multi-characteristic firmware)
    Light { on: TimeOfDay, off: TimeOfDay },

    /// Daily filter window (multi-characteristic firmware)
    Filter { on: TimeOfDay, off: TimeOfDay },

    /// Daily feeding time (multi-characteristic firmware)
    Feeder { at: TimeOfDay },

    /// Store a numbered entry (single-characteristic firmware)
    Add {
        /// Entry number
        id: u32,

        /// Time of day (HH:MM)
        at: TimeOfDay,

        /// Light on at this time
        #[arg(long)]
        light: bool,

        /// Pump on at this time
        #[arg(long)]
        pump: bool,

        /// Heater on at this time
        #[arg(long)]
        heater: bool,
    },

    /// Delete a numbered entry (single-characteristic firmware)
    #[command(alias = "rm")]
    Remove { id: u32 },
}

/// Configuration subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse boolean argument with flexible input
pub fn parse_bool_arg(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enable" | "enabled" => Ok(true),
        "false" | "no" | "off" | "0" | "disable" | "disabled" => Ok(false),
        _ => Err(format!(
            "Invalid boolean value '{}'. Use: on/off, true/false, yes/no, 1/0",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_bool_arg() {
        assert_eq!(parse_bool_arg("on"), Ok(true));
        assert_eq!(parse_bool_arg("YES"), Ok(true));
        assert_eq!(parse_bool_arg("0"), Ok(false));
        assert!(parse_bool_arg("maybe").is_err());
    }

    #[test]
    fn test_set_light() {
        let cli = Cli::try_parse_from(["aquarium", "set", "light", "on"]).unwrap();
        match cli.command {
            Commands::Set {
                setting: Setting::Light { on },
                ..
            } => assert!(on),
            _ => panic!("expected set light"),
        }
    }

    #[test]
    fn test_link_args() {
        let cli =
            Cli::try_parse_from(["aquarium", "feed", "--revision", "single", "-d", "Tank2"])
                .unwrap();
        match cli.command {
            Commands::Feed { link } => {
                assert_eq!(link.revision, Some(ProtocolRevision::SingleCharacteristic));
                assert_eq!(link.device.as_deref(), Some("Tank2"));
            }
            _ => panic!("expected feed"),
        }
    }

    #[test]
    fn test_schedule_light_parses_times() {
        let cli =
            Cli::try_parse_from(["aquarium", "schedule", "light", "08:00", "20:30"]).unwrap();
        match cli.command {
            Commands::Schedule {
                action: ScheduleAction::Light { on, off },
                ..
            } => {
                assert_eq!(on, TimeOfDay::new(8, 0).unwrap());
                assert_eq!(off, TimeOfDay::new(20, 30).unwrap());
            }
            _ => panic!("expected schedule light"),
        }
    }

    #[test]
    fn test_schedule_rejects_bad_time() {
        assert!(Cli::try_parse_from(["aquarium", "schedule", "feeder", "25:00"]).is_err());
    }

    #[test]
    fn test_negative_target() {
        let cli = Cli::try_parse_from(["aquarium", "set", "target", "-1.5"]).unwrap();
        match cli.command {
            Commands::Set {
                setting: Setting::Target { celsius },
                ..
            } => assert_eq!(celsius, -1.5),
            _ => panic!("expected set target"),
        }
    }
}
