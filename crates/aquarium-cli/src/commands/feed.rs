//! Feed and clock commands.

use anyhow::{Context, Result};
use aquarium_core::{AquariumClient, TransportProvider};

use crate::util::{close_session, open_session};

pub async fn cmd_feed<P: TransportProvider>(client: &AquariumClient<P>, quiet: bool) -> Result<()> {
    open_session(client).await?;
    let result = client.feed_now().await.context("Failed to trigger feeding");
    close_session(client).await;
    result?;
    if !quiet {
        println!("Feeding triggered");
    }
    Ok(())
}

/// Set the controller clock. Opening the session performs the sync.
pub async fn cmd_sync_time<P: TransportProvider>(
    client: &AquariumClient<P>,
    quiet: bool,
) -> Result<()> {
    open_session(client).await?;
    close_session(client).await;
    if !quiet {
        println!("Controller clock set to local time");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquarium_core::uuids;
    use aquarium_core::{ClientOptions, MockProvider, ProtocolRevision};

    #[tokio::test]
    async fn test_feed_writes_trigger_and_disconnects() {
        let client = AquariumClient::new(
            MockProvider::for_revision(ProtocolRevision::MultiCharacteristic),
            ClientOptions::default(),
        );
        cmd_feed(&client, true).await.unwrap();

        let mock = client.provider().peripheral();
        assert_eq!(mock.writes_to(uuids::FEED_NOW).await, vec![vec![0x01]]);
        assert_eq!(mock.writes_to(uuids::TIME_SYNC).await.len(), 1);
        assert!(!mock.is_connected_sync());
    }

    #[tokio::test]
    async fn test_feed_failure_still_disconnects() {
        let client = AquariumClient::new(
            MockProvider::for_revision(ProtocolRevision::MultiCharacteristic),
            ClientOptions::default(),
        );
        client.provider().peripheral().remove_characteristic(uuids::FEED_NOW).await;
        // FeedNow is required, so the failure surfaces at connect.
        assert!(cmd_feed(&client, true).await.is_err());
        assert!(!client.provider().peripheral().is_connected_sync());
    }
}
