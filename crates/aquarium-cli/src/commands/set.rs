//! Set command implementation.

use anyhow::{Context, Result};
use aquarium_core::{AquariumClient, ServoPosition, TransportProvider};

use crate::cli::Setting;
use crate::util::{close_session, open_session};

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

/// Send `setting` over an open link and describe what changed.
pub async fn apply_setting<P: TransportProvider>(
    client: &AquariumClient<P>,
    setting: &Setting,
) -> Result<String> {
    let message = match *setting {
        Setting::Light { on } => {
            client.set_light(on).await?;
            format!("Light {}", on_off(on))
        }
        Setting::Pump { on } => {
            client.set_pump(on).await?;
            format!("Pump {}", on_off(on))
        }
        Setting::Heater { on } => {
            client.set_heater(on).await?;
            format!("Heater {}", on_off(on))
        }
        Setting::Feeder { on } => {
            client.set_feeder(on).await?;
            format!("Feeder {}", on_off(on))
        }
        Setting::Quiet { on, minutes } => match (on, minutes) {
            (true, Some(minutes)) => {
                client.set_quiet_minutes(minutes.max(1)).await?;
                format!("Quiet mode on for {} minutes", minutes.max(1))
            }
            _ => {
                client.set_quiet_mode(on).await?;
                format!("Quiet mode {}", on_off(on))
            }
        },
        Setting::Servo { value, degrees } => {
            let position = if degrees {
                ServoPosition::from_degrees(value)
            } else {
                ServoPosition::new(value)
            }
            .context("Invalid servo position")?;
            client.set_servo(position).await?;
            format!("Servo at {} ({}°)", position, position.to_degrees())
        }
        Setting::Target { celsius } => {
            client.set_target_temperature(celsius).await?;
            format!("Target temperature {:.1}°C", celsius)
        }
    };
    Ok(message)
}

pub async fn cmd_set<P: TransportProvider>(
    client: &AquariumClient<P>,
    setting: Setting,
    quiet: bool,
) -> Result<()> {
    open_session(client).await?;
    let result = apply_setting(client, &setting).await;
    close_session(client).await;

    let message = result.context("Failed to apply setting")?;
    if !quiet {
        println!("{}", message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquarium_core::uuids;
    use aquarium_core::{ClientOptions, Error, MockProvider, ProtocolRevision};

    fn mock_client(revision: ProtocolRevision) -> AquariumClient<MockProvider> {
        AquariumClient::new(
            MockProvider::for_revision(revision),
            ClientOptions::new().revision(revision),
        )
    }

    #[tokio::test]
    async fn test_servo_degrees() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        client.connect().await.unwrap();
        let message = apply_setting(
            &client,
            &Setting::Servo {
                value: 45,
                degrees: true,
            },
        )
        .await
        .unwrap();
        assert_eq!(message, "Servo at 50% (45°)");
        assert_eq!(
            client.provider().peripheral().writes_to(uuids::SERVO).await,
            vec![vec![50]]
        );
    }

    #[tokio::test]
    async fn test_servo_out_of_range() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        client.connect().await.unwrap();
        let setting = Setting::Servo {
            value: 101,
            degrees: false,
        };
        assert!(apply_setting(&client, &setting).await.is_err());
        assert!(client.provider().peripheral().writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_quiet_minutes_override() {
        let client = mock_client(ProtocolRevision::MultiCharacteristic);
        client.connect().await.unwrap();
        let setting = Setting::Quiet {
            on: true,
            minutes: Some(15),
        };
        apply_setting(&client, &setting).await.unwrap();
        assert_eq!(
            client.provider().peripheral().frames_to(uuids::QUIET_MODE).await,
            vec!["15"]
        );
    }

    #[tokio::test]
    async fn test_target_unsupported_on_single() {
        let client = mock_client(ProtocolRevision::SingleCharacteristic);
        client.connect().await.unwrap();
        let err = apply_setting(&client, &Setting::Target { celsius: 25.0 })
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_cmd_set_sends_frame() {
        let client = mock_client(ProtocolRevision::SingleCharacteristic);
        cmd_set(&client, Setting::Heater { on: true }, true)
            .await
            .unwrap();
        let frames = client.provider().peripheral().frames_to(uuids::COMMAND).await;
        assert_eq!(frames.last().map(String::as_str), Some("HEATER:1"));
        assert!(!client.is_connected().await);
    }
}
