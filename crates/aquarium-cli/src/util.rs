//! Connection helpers shared by the commands.

use std::time::Duration;

use anyhow::{Context, Result};
use aquarium_core::{
    AquariumClient, BleClient, DeviceStatus, LinkInfo, StatusPatch, TransportProvider,
};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{info, warn};

use crate::cli::LinkArgs;
use crate::config::Config;

/// Build a btleplug client from config and flags.
pub fn build_client(config: &Config, link: &LinkArgs) -> Result<BleClient> {
    let options = config.client_options(link)?;
    Ok(AquariumClient::with_ble(options, config.ble_options(link)))
}

/// Route status patches into a channel the command can await.
pub fn patch_channel<P: TransportProvider>(
    client: &AquariumClient<P>,
) -> mpsc::UnboundedReceiver<StatusPatch> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on_status_update(move |patch| {
        // The receiver is gone once the command has what it needs.
        let _ = tx.send(patch);
    });
    rx
}

/// Connect, then set the clock and ask for fresh status.
pub async fn open_session<P: TransportProvider>(client: &AquariumClient<P>) -> Result<LinkInfo> {
    let options = client.options();
    info!(
        "Connecting to {} ({} protocol)",
        options.device_name, options.revision
    );
    let info = client.connect().await.with_context(|| {
        format!(
            "Failed to connect to '{}'. Is the controller powered on and in range?",
            options.device_name
        )
    })?;
    client
        .sync_time()
        .await
        .context("Failed to set the controller clock")?;
    client
        .request_status()
        .await
        .context("Failed to request status")?;
    Ok(info)
}

/// Disconnect at the end of a one-shot command.
pub async fn close_session<P: TransportProvider>(client: &AquariumClient<P>) {
    if let Err(e) = client.disconnect().await {
        warn!("Disconnect failed: {}", e);
    }
}

/// Status assembled from the patches received so far.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub status: DeviceStatus,
    has_temperature: bool,
    has_switches: bool,
}

impl Snapshot {
    pub fn apply(&mut self, patch: &StatusPatch) {
        self.has_temperature |= patch.temperature.is_some();
        self.has_switches |= patch.light_on.is_some();
        self.status.apply(patch);
    }

    /// Whether both the temperature and the output states have been seen.
    pub fn is_complete(&self) -> bool {
        self.has_temperature && self.has_switches
    }
}

/// Apply patches until the snapshot is complete or `wait` elapses.
pub async fn collect_snapshot(
    rx: &mut mpsc::UnboundedReceiver<StatusPatch>,
    wait: Duration,
) -> Snapshot {
    let deadline = Instant::now() + wait;
    let mut snapshot = Snapshot::default();
    while !snapshot.is_complete() {
        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(patch)) => snapshot.apply(&patch),
            Ok(None) | Err(_) => break,
        }
    }
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquarium_core::{ClientOptions, MockProvider, ProtocolRevision};
    use aquarium_core::uuids;

    fn mock_client(revision: ProtocolRevision) -> AquariumClient<MockProvider> {
        AquariumClient::new(
            MockProvider::for_revision(revision),
            ClientOptions::new().revision(revision),
        )
    }

    #[test]
    fn test_snapshot_completion() {
        let mut snapshot = Snapshot::default();
        snapshot.apply(&StatusPatch::new().with_temperature(24.0));
        assert!(!snapshot.is_complete());
        snapshot.apply(&StatusPatch::new().with_light(true));
        assert!(snapshot.is_complete());
        assert!(snapshot.status.light_on);
    }

    #[tokio::test]
    async fn test_open_session_syncs_clock_and_requests_status() {
        let client = mock_client(ProtocolRevision::SingleCharacteristic);
        open_session(&client).await.unwrap();

        let frames = client.provider().peripheral().frames_to(uuids::COMMAND).await;
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with("TIME:"));
        assert_eq!(frames[1], "GET_STATUS");
        close_session(&client).await;
        assert!(!client.is_connected().await);
    }

    #[tokio::test]
    async fn test_open_session_failure_has_context() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        client.provider().set_cancel_selection(true);
        let err = open_session(&client).await.unwrap_err();
        assert!(err.to_string().contains("Failed to connect"));
    }

    #[tokio::test]
    async fn test_collect_snapshot_from_initial_read() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        let mut rx = patch_channel(&client);
        open_session(&client).await.unwrap();

        let snapshot = collect_snapshot(&mut rx, Duration::from_secs(1)).await;
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.status.temperature, 25.0);
        assert!(snapshot.status.light_on);
    }

    #[tokio::test]
    async fn test_collect_snapshot_times_out() {
        let (_tx, mut rx) = mpsc::unbounded_channel();
        let snapshot = collect_snapshot(&mut rx, Duration::from_millis(20)).await;
        assert!(!snapshot.is_complete());
    }
}
