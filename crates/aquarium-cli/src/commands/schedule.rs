//! Schedule command implementation.

use anyhow::{Context, Result};
use aquarium_core::{AquariumClient, ScheduleEntry, ScheduleMirror, TransportProvider};

use crate::cli::ScheduleAction;
use crate::util::{close_session, open_session};

/// Program one schedule over an open link.
///
/// Numbered entries that the controller accepted are recorded in `mirror`.
pub async fn apply_schedule<P: TransportProvider>(
    client: &AquariumClient<P>,
    action: &ScheduleAction,
    mirror: &mut ScheduleMirror,
) -> Result<String> {
    let message = match *action {
        ScheduleAction::Light { on, off } => {
            client.set_light_schedule(on, off).await?;
            format!("Light schedule set: on {} off {}", on, off)
        }
        ScheduleAction::Filter { on, off } => {
            client.set_filter_schedule(on, off).await?;
            format!("Filter schedule set: on {} off {}", on, off)
        }
        ScheduleAction::Feeder { at } => {
            client.set_feeder_schedule(at).await?;
            format!("Feeder schedule set: {}", at)
        }
        ScheduleAction::Add {
            id,
            at,
            light,
            pump,
            heater,
        } => {
            let entry = ScheduleEntry::new(id, at)
                .light(light)
                .pump(pump)
                .heater(heater);
            client.set_schedule(&entry).await?;
            mirror.add(entry);
            format!("Stored {}", entry)
        }
        ScheduleAction::Remove { id } => {
            client.delete_schedule(id).await?;
            mirror.remove(id);
            format!("Deleted schedule #{}", id)
        }
    };
    Ok(message)
}

pub async fn cmd_schedule<P: TransportProvider>(
    client: &AquariumClient<P>,
    action: ScheduleAction,
    quiet: bool,
) -> Result<()> {
    open_session(client).await?;
    let mut mirror = ScheduleMirror::new();
    let result = apply_schedule(client, &action, &mut mirror).await;
    close_session(client).await;

    let message = result.context("Failed to program schedule")?;
    if !quiet {
        println!("{}", message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquarium_core::uuids;
    use aquarium_core::{ClientOptions, Error, MockProvider, ProtocolRevision, TimeOfDay};

    fn mock_client(revision: ProtocolRevision) -> AquariumClient<MockProvider> {
        AquariumClient::new(
            MockProvider::for_revision(revision),
            ClientOptions::new().revision(revision),
        )
    }

    #[tokio::test]
    async fn test_add_and_remove_update_mirror() {
        let client = mock_client(ProtocolRevision::SingleCharacteristic);
        client.connect().await.unwrap();
        let mut mirror = ScheduleMirror::new();

        let add = ScheduleAction::Add {
            id: 3,
            at: TimeOfDay::new(9, 15).unwrap(),
            light: true,
            pump: false,
            heater: false,
        };
        let message = apply_schedule(&client, &add, &mut mirror).await.unwrap();
        assert!(message.contains("#3 09:15"));
        assert_eq!(mirror.len(), 1);

        apply_schedule(&client, &ScheduleAction::Remove { id: 3 }, &mut mirror)
            .await
            .unwrap();
        assert!(mirror.is_empty());

        assert_eq!(
            client.provider().peripheral().frames_to(uuids::COMMAND).await,
            vec!["SCHEDULE:3,9,15,1,0,0", "DEL_SCHEDULE:3"]
        );
    }

    #[tokio::test]
    async fn test_rejected_entry_not_mirrored() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        client.connect().await.unwrap();
        let mut mirror = ScheduleMirror::new();

        let add = ScheduleAction::Add {
            id: 0,
            at: TimeOfDay::new(7, 0).unwrap(),
            light: true,
            pump: true,
            heater: true,
        };
        let err = apply_schedule(&client, &add, &mut mirror).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Unsupported { .. })
        ));
        assert!(mirror.is_empty());
    }

    #[tokio::test]
    async fn test_cmd_schedule_light_window() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        let action = ScheduleAction::Light {
            on: TimeOfDay::new(8, 0).unwrap(),
            off: TimeOfDay::new(20, 0).unwrap(),
        };
        cmd_schedule(&client, action, true).await.unwrap();
        assert_eq!(
            client
                .provider()
                .peripheral()
                .frames_to(uuids::SCHEDULE_LIGHT)
                .await,
            vec!["08:00,20:00"]
        );
    }
}
