//! Board manager: the main entry point for bluetooth operations.
//! Ties the adapter, the scanner's discovered set and the session
//! client together behind one owner.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bluest::{Adapter, Device};
use log::info;

use crate::ble::constants::LED_COUNT;
use crate::ble::events::EventSender;
use crate::ble::scanner::BoardScanner;
use crate::ble::session::SessionClient;
use crate::ble::types::SessionState;
use crate::config::BoardProfile;
use crate::error::{Error, Result};

/// Manages Bluetooth operations against one SmartDevice board.
pub struct BoardManager {
    /// Map of platform device ids to device handles, filled by the scanner.
    devices: Arc<Mutex<HashMap<String, Device>>>,
    scanner: BoardScanner,
    session: SessionClient,
    events: EventSender,
}

impl BoardManager {
    /// Creates a new manager. Fails when no adapter exists or Bluetooth
    /// access is not authorized, before any scan or connect is issued.
    pub async fn new(profile: BoardProfile, events: EventSender) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or(Error::AdapterUnavailable)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        let devices = Arc::new(Mutex::new(HashMap::new()));
        let scanner = BoardScanner::new(adapter.clone(), devices.clone());
        let session = SessionClient::new(adapter, profile, events.clone());

        Ok(Self {
            devices,
            scanner,
            session,
            events,
        })
    }

    pub async fn start_scan(&mut self) -> Result<()> {
        self.scanner.start_scan(self.events.clone()).await
    }

    pub async fn stop_scan(&mut self) -> Result<()> {
        self.scanner.stop_scan(self.events.clone()).await
    }

    /// Connects the session to a device previously reported by the
    /// scanner.
    pub async fn connect_device(&mut self, device_id: &str) -> Result<()> {
        let device = {
            let devices = self.devices.lock().unwrap();
            devices
                .get(device_id)
                .cloned()
                .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))?
        };
        self.session.connect(device).await
    }

    /// Disconnects from the currently connected board. Idempotent.
    pub async fn disconnect(&mut self) -> Result<()> {
        self.session.disconnect().await
    }

    pub async fn set_led(&self, index: usize, on: bool) -> Result<()> {
        self.session.write_led(index, on).await
    }

    pub async fn toggle_led(&self, index: usize) -> Result<()> {
        self.session.toggle_led(index).await
    }

    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    pub fn led_states(&self) -> [bool; LED_COUNT] {
        self.session.led_states()
    }

    pub fn button_counts(&self) -> Vec<(u8, u64)> {
        self.session.button_counts()
    }
}
