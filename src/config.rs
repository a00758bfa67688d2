//! Board profile: where the LED and button features live in the GATT
//! table and how bytes map to physical parts. Persisted as JSON so the
//! layout can be corrected against real hardware without a rebuild.

use anyhow::Result;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::ble::constants::{
    BUTTON_CHARACTERISTIC_INDEX, BUTTON_MAPPING, BUTTON_PAYLOAD_LEN, BUTTON_SERVICE_INDEX,
    LED_CHARACTERISTIC_INDEX, LED_COUNT, LED_ON_CODES, LED_SERVICE_INDEX,
};
use crate::utils::ensure_directory_exists;

pub const PROFILE_FILE_NAME: &str = "board_profile.json";

/// Location of one characteristic in the board's GATT table.
///
/// The UUID is the preferred key; the positional index is the fallback
/// for firmware that only publishes generic UUIDs. Positional lookup is
/// fragile across firmware revisions, which is exactly why both can be
/// set here instead of being hardcoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacteristicSpot {
    pub service_uuid: Option<Uuid>,
    pub service_index: usize,
    pub characteristic_uuid: Option<Uuid>,
    pub characteristic_index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardProfile {
    /// Advertised-name fragment used when picking a board
    /// automatically; `None` accepts the first named device.
    pub device_name: Option<String>,

    /// Where the LED-control characteristic lives.
    pub led: CharacteristicSpot,

    /// Where the button-notification characteristic lives.
    pub buttons: CharacteristicSpot,

    /// Wire codes that switch each LED on. Off is always `0x00`.
    pub led_on_codes: [u8; LED_COUNT],

    /// Physical button label for each notification payload byte.
    pub button_mapping: [u8; BUTTON_PAYLOAD_LEN],
}

impl Default for BoardProfile {
    fn default() -> Self {
        BoardProfile {
            device_name: None,
            led: CharacteristicSpot {
                service_uuid: None,
                service_index: LED_SERVICE_INDEX,
                characteristic_uuid: None,
                characteristic_index: LED_CHARACTERISTIC_INDEX,
            },
            buttons: CharacteristicSpot {
                service_uuid: None,
                service_index: BUTTON_SERVICE_INDEX,
                characteristic_uuid: None,
                characteristic_index: BUTTON_CHARACTERISTIC_INDEX,
            },
            led_on_codes: LED_ON_CODES,
            button_mapping: BUTTON_MAPPING,
        }
    }
}

impl BoardProfile {
    /// Loads the profile from a JSON file, falling back to the default
    /// layout when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Profile file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let profile_json = fs::read_to_string(path).await?;
        let profile: Self = serde_json::from_str(&profile_json)?;

        info!("Board profile loaded from {:?}", path);
        Ok(profile)
    }

    /// Saves the current profile as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent).await?;
        }

        let profile_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize board profile to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, profile_json).await?;

        info!("Board profile saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_matches_the_board_layout() {
        let profile = BoardProfile::default();
        assert_eq!(profile.led.service_index, 2);
        assert_eq!(profile.led.characteristic_index, 0);
        assert_eq!(profile.buttons.service_index, 3);
        assert_eq!(profile.buttons.characteristic_index, 0);
        assert_eq!(profile.led_on_codes, [0x01, 0x02, 0x03]);
        assert_eq!(profile.button_mapping, [1, 3]);
        assert!(profile.led.service_uuid.is_none());
    }

    #[test]
    fn profile_round_trips_through_json() {
        let mut profile = BoardProfile::default();
        profile.device_name = Some("SmartDevice".to_string());
        profile.led.service_uuid =
            Some(Uuid::from_u128(0x0000feed_0000_1000_8000_00805f9b34fb));

        let json = serde_json::to_string(&profile).unwrap();
        let restored: BoardProfile = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.device_name.as_deref(), Some("SmartDevice"));
        assert_eq!(restored.led.service_uuid, profile.led.service_uuid);
        assert_eq!(restored.led_on_codes, profile.led_on_codes);
    }

    #[tokio::test]
    async fn load_of_a_missing_file_yields_the_default() {
        let profile = BoardProfile::load(Path::new("/nonexistent/board_profile.json"))
            .await
            .unwrap();
        assert_eq!(profile.led_on_codes, LED_ON_CODES);
        assert!(profile.device_name.is_none());
    }
}
