//! Interactive shell over one persistent link.
//!
//! Lines are parsed with clap in multicall mode, so the shell accepts the
//! same setting names as `aquarium set`. Status patches are printed as they
//! arrive. Numbered schedule entries added in the session are kept in a
//! [`ScheduleMirror`] for `schedule list`.

use anyhow::Result;
use aquarium_core::{
    AquariumClient, DisconnectReason, LinkEvent, ScheduleMirror, TimeOfDay, TransportProvider,
};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::{ScheduleAction, Setting};
use crate::commands::{apply_schedule, apply_setting};
use crate::format::{FormatOptions, format_link_info, format_patch, format_schedule_list};
use crate::util::{close_session, open_session};

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Debug, Subcommand)]
enum ShellCommand {
    #[command(flatten)]
    Set(Setting),

    /// Trigger one feeding now
    Feed,

    /// Set the controller clock to local time
    Time,

    /// Ask the controller for fresh status
    Status,

    /// Program or list schedules
    Schedule {
        #[command(subcommand)]
        action: ShellSchedule,
    },

    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Subcommand)]
enum ShellSchedule {
    /// Daily light window (multi-characteristic firmware)
    Light { on: TimeOfDay, off: TimeOfDay },

    /// Daily filter window (multi-characteristic firmware)
    Filter { on: TimeOfDay, off: TimeOfDay },

    /// Daily feeding time (multi-characteristic firmware)
    Feeder { at: TimeOfDay },

    /// Add an entry with the next free number (single-characteristic firmware)
    Add {
        at: TimeOfDay,
        #[arg(long)]
        light: bool,
        #[arg(long)]
        pump: bool,
        #[arg(long)]
        heater: bool,
    },

    /// Delete a numbered entry (single-characteristic firmware)
    #[command(alias = "rm")]
    Remove { id: u32 },

    /// Entries added in this session
    #[command(alias = "ls")]
    List,
}

/// Outcome of one shell line.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
fn parse_line(line: &str) -> Option<Result<ShellCommand, clap::Error>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    Some(ShellLine::try_parse_from(words).map(|parsed| parsed.command))
}

async fn execute<P: TransportProvider>(
    client: &AquariumClient<P>,
    command: ShellCommand,
    mirror: &mut ScheduleMirror,
) -> Result<(Flow, Option<String>)> {
    let message = match command {
        ShellCommand::Set(setting) => Some(apply_setting(client, &setting).await?),
        ShellCommand::Feed => {
            client.feed_now().await?;
            Some("Feeding triggered".to_string())
        }
        ShellCommand::Time => {
            client.sync_time().await?;
            Some("Clock set".to_string())
        }
        ShellCommand::Status => {
            client.request_status().await?;
            None
        }
        ShellCommand::Schedule { action } => {
            let action = match action {
                ShellSchedule::List => {
                    return Ok((Flow::Continue, Some(format_schedule_list(mirror))));
                }
                ShellSchedule::Light { on, off } => ScheduleAction::Light { on, off },
                ShellSchedule::Filter { on, off } => ScheduleAction::Filter { on, off },
                ShellSchedule::Feeder { at } => ScheduleAction::Feeder { at },
                ShellSchedule::Add {
                    at,
                    light,
                    pump,
                    heater,
                } => ScheduleAction::Add {
                    id: mirror.next_id(),
                    at,
                    light,
                    pump,
                    heater,
                },
                ShellSchedule::Remove { id } => ScheduleAction::Remove { id },
            };
            Some(apply_schedule(client, &action, mirror).await?)
        }
        ShellCommand::Quit => return Ok((Flow::Quit, None)),
    };
    Ok((Flow::Continue, message))
}

pub async fn cmd_shell<P: TransportProvider>(
    client: &AquariumClient<P>,
    opts: &FormatOptions,
) -> Result<()> {
    let patch_opts = *opts;
    client.on_status_update(move |patch| {
        if let Ok(text) = format_patch(&patch, &patch_opts) {
            print!("{}", text);
        }
    });
    let mut events = client.events();
    let info = open_session(client).await?;
    eprintln!("{}", format_link_info(&info, opts));
    eprintln!("Type 'help' for commands, 'quit' to leave.");

    let mut mirror = ScheduleMirror::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(LinkEvent::Disconnected { reason: DisconnectReason::LinkLost }) => {
                    eprintln!("Connection lost.");
                    return Ok(());
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let command = match parse_line(&line) {
                    None => continue,
                    Some(Ok(command)) => command,
                    Some(Err(e)) => {
                        // Help output and usage errors render the same way.
                        eprint!("{}", e);
                        continue;
                    }
                };
                match execute(client, command, &mut mirror).await {
                    Ok((Flow::Quit, _)) => break,
                    Ok((Flow::Continue, Some(message))) => println!("{}", message.trim_end()),
                    Ok((Flow::Continue, None)) => {}
                    Err(e) => eprintln!("Error: {:#}", e),
                }
            }
        }
    }

    close_session(client).await;
    Ok(())
}
