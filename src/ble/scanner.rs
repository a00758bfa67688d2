use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use regex::Regex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::ble::events::{BoardEvent, EventSender};
use crate::ble::types::DiscoveredDevice;

/// Admission policy for discovered advertisements: each address is
/// admitted at most once per scan, unnamed devices never.
#[derive(Debug, Default)]
pub struct DiscoveredSet {
    seen: HashSet<String>,
}

impl DiscoveredSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the advertisement should be reported to the
    /// caller. Repeated addresses and missing or empty names are
    /// silently dropped.
    pub fn admit(&mut self, address: &str, name: Option<&str>) -> bool {
        match name {
            Some(name) if !name.is_empty() => self.seen.insert(address.to_string()),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Passive advertisement scanner. Owns no long-lived resource beyond
/// the running scan task, which is cancelled on [`stop_scan`] or drop.
///
/// [`stop_scan`]: BoardScanner::stop_scan
pub struct BoardScanner {
    adapter: Adapter,
    devices: Arc<Mutex<HashMap<String, Device>>>,
    cancel_token: Arc<CancellationToken>,
    scan_task_handle: Option<JoinHandle<Result<()>>>,
}

impl BoardScanner {
    pub fn new(adapter: Adapter, devices: Arc<Mutex<HashMap<String, Device>>>) -> Self {
        Self {
            adapter,
            devices,
            cancel_token: Arc::new(CancellationToken::new()),
            scan_task_handle: None,
        }
    }

    pub async fn start_scan(&mut self, events: EventSender) -> crate::error::Result<()> {
        // Clear existing devices
        self.devices.lock().unwrap().clear();
        if self.scan_task_handle.is_some() {
            self.stop_scan(events.clone()).await?;
        }

        self.cancel_token = Arc::new(CancellationToken::new());
        let cancel_token_for_task = self.cancel_token.clone();

        let adapter_for_task = self.adapter.clone();
        let devices_for_task = self.devices.clone();
        let events_for_task = events.clone();

        let handle = tokio::spawn(async move {
            Self::internal_scan_task(
                adapter_for_task,
                devices_for_task,
                events_for_task,
                cancel_token_for_task,
            )
            .await
        });

        self.scan_task_handle = Some(handle);

        events.emit(BoardEvent::ScanStarted);
        info!("Device scan task started.");
        Ok(())
    }

    /// Scans for BLE advertisements, reporting each named address once.
    async fn internal_scan_task(
        adapter: Adapter,
        devices: Arc<Mutex<HashMap<String, Device>>>,
        events: EventSender,
        cancel_token: Arc<CancellationToken>,
    ) -> Result<()> {
        info!("Starting bluetooth scan");
        let mut scan_stream = match adapter.scan(&[]).await {
            Ok(stream) => stream,
            Err(e) => {
                // Reported once per attempt; no automatic retry.
                let err = crate::error::Error::from(e);
                error!("Failed to start scan: {}", err);
                events.emit(BoardEvent::Error {
                    message: err.to_string(),
                });
                return Err(err.into());
            }
        };

        let mut discovered = DiscoveredSet::new();

        loop {
            tokio::select! {
                result = scan_stream.next() => {
                    match result {
                        Some(advertisement) => {
                            let device = advertisement.device;
                            let rssi = advertisement.rssi;
                            debug!("Advertisement - Device: {:?}, RSSI: {:?}", device, rssi);

                            let name = advertisement
                                .adv_data
                                .local_name
                                .clone()
                                .or_else(|| device.name().ok());
                            let id = device.id().to_string();
                            let address = Self::extract_mac_address(&id);
                            // Deduplicate by hardware address, falling back
                            // to the platform id where no address is exposed.
                            let key = address.clone().unwrap_or_else(|| id.clone());

                            if discovered.admit(&key, name.as_deref()) {
                                Self::report_device_found(
                                    &devices,
                                    &events,
                                    device,
                                    id,
                                    name.unwrap_or_default(),
                                    address,
                                    rssi,
                                );
                            }
                        }
                        None => {
                            info!("Bluetooth scan stream has ended.");
                            break;
                        }
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }

        Ok(())
    }

    pub async fn stop_scan(&mut self, events: EventSender) -> crate::error::Result<()> {
        info!("Stopping Bluetooth scan.");
        self.cancel_token.cancel();

        if let Some(handle) = self.scan_task_handle.take() {
            info!("Waiting for scan task to finish...");
            match handle.await {
                Ok(task_result) => match task_result {
                    Ok(_) => info!("Scan task finished after cancellation."),
                    Err(e) => error!("Scan task finished with an error: {:?}", e),
                },
                Err(e) => {
                    if e.is_cancelled() {
                        info!("Scan task was cancelled.");
                    } else {
                        error!("Scan task finished with an unexpected join error: {:?}", e);
                    }
                }
            }
        } else {
            info!("No active scan task handle found to wait for.");
        }

        events.emit(BoardEvent::ScanStopped);
        Ok(())
    }

    /// Retains the device handle for later connection and emits a
    /// device-found event.
    fn report_device_found(
        devices: &Arc<Mutex<HashMap<String, Device>>>,
        events: &EventSender,
        device: Device,
        id: String,
        name: String,
        address: Option<String>,
        rssi: Option<i16>,
    ) {
        let address = address.unwrap_or_else(|| "N/A".to_string());
        info!(
            "Found device: Name: {:?}, Address: {}, ID: {}, RSSI: {:?}",
            name, address, id, rssi
        );

        devices.lock().unwrap().insert(id.clone(), device);

        events.emit(BoardEvent::DeviceFound(DiscoveredDevice::new(
            id, name, address, rssi,
        )));
    }

    fn extract_mac_address(device_id_str: &str) -> Option<String> {
        let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").unwrap();
        re.find_iter(device_id_str)
            .last()
            .map(|m| m.as_str().to_string().to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_addresses_are_admitted_once() {
        let mut set = DiscoveredSet::new();
        assert!(set.admit("AA:BB:CC:DD:EE:FF", Some("X")));
        assert!(!set.admit("AA:BB:CC:DD:EE:FF", Some("X")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unnamed_devices_are_never_admitted() {
        let mut set = DiscoveredSet::new();
        assert!(!set.admit("AA:BB:CC:DD:EE:01", None));
        assert!(!set.admit("AA:BB:CC:DD:EE:02", Some("")));
        assert!(set.is_empty());
    }

    #[test]
    fn named_duplicates_and_unnamed_neighbour_yield_one_entry() {
        // A ("X"), A again, B (unnamed) -> exposed set = {A}
        let mut set = DiscoveredSet::new();
        assert!(set.admit("AA:AA:AA:AA:AA:AA", Some("X")));
        assert!(!set.admit("AA:AA:AA:AA:AA:AA", Some("X")));
        assert!(!set.admit("BB:BB:BB:BB:BB:BB", None));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn mac_address_is_extracted_from_platform_ids() {
        assert_eq!(
            BoardScanner::extract_mac_address("hci0/dev_a4_c1_38_0d_12_ef"),
            None
        );
        assert_eq!(
            BoardScanner::extract_mac_address("A4:C1:38:0D:12:EF"),
            Some("A4:C1:38:0D:12:EF".to_string())
        );
        assert_eq!(
            BoardScanner::extract_mac_address("dev-a4:c1:38:0d:12:ef"),
            Some("A4:C1:38:0D:12:EF".to_string())
        );
    }
}
