//! Command implementations for the CLI.

mod config;
mod feed;
mod schedule;
mod set;
mod shell;
mod status;
mod watch;

pub use config::cmd_config;
pub use feed::{cmd_feed, cmd_sync_time};
pub use schedule::{apply_schedule, cmd_schedule};
pub use set::{apply_setting, cmd_set};
pub use shell::cmd_shell;
pub use status::cmd_status;
pub use watch::cmd_watch;
