//! Status command implementation.

use std::time::Duration;

use anyhow::Result;
use aquarium_core::{AquariumClient, TransportProvider};

use crate::format::{FormatOptions, format_link_info, format_status};
use crate::util::{close_session, collect_snapshot, open_session, patch_channel};

pub async fn cmd_status<P: TransportProvider>(
    client: &AquariumClient<P>,
    wait: Duration,
    opts: &FormatOptions,
    quiet: bool,
) -> Result<()> {
    let mut rx = patch_channel(client);
    let info = open_session(client).await?;
    if !quiet && !opts.json {
        eprintln!("{}", format_link_info(&info, opts));
    }

    let snapshot = collect_snapshot(&mut rx, wait).await;
    close_session(client).await;

    if !snapshot.is_complete() {
        eprintln!(
            "Warning: controller did not report full status within {}s",
            wait.as_secs()
        );
    }
    print!("{}", format_status(&snapshot.status, opts)?);
    Ok(())
}
