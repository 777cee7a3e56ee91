//! Watch command implementation.
//!
//! Holds one link open and prints every status patch as it arrives. Ends on
//! Ctrl+C or when the controller drops the link.

use anyhow::Result;
use aquarium_core::{AquariumClient, DisconnectReason, LinkEvent, TransportProvider};
use tokio::sync::broadcast::error::RecvError;

use crate::format::{FormatOptions, format_link_info, format_patch};
use crate::util::{close_session, open_session, patch_channel};

pub async fn cmd_watch<P: TransportProvider>(
    client: &AquariumClient<P>,
    opts: &FormatOptions,
    quiet: bool,
) -> Result<()> {
    let mut patches = patch_channel(client);
    let mut events = client.events();
    let info = open_session(client).await?;

    if !quiet {
        eprintln!("{}", format_link_info(&info, opts));
        eprintln!("Press Ctrl+C to stop");
        eprintln!("{}", "-".repeat(50));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down...");
                break;
            }
            Some(patch) = patches.recv() => {
                print!("{}", format_patch(&patch, opts)?);
            }
            event = events.recv() => match event {
                Ok(LinkEvent::Disconnected { reason: DisconnectReason::LinkLost }) => {
                    eprintln!("Connection lost.");
                    return Ok(());
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    close_session(client).await;
    Ok(())
}
