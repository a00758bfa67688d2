//! Defines shared data structures for the Bluetooth module.

use bluest::{Characteristic, Device};
use serde::Serialize;

/// A peripheral admitted by the scanner.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredDevice {
    /// Platform-specific unique identifier; the key used to connect.
    pub id: String,
    /// Advertised name. The scanner never admits unnamed devices.
    pub name: String,
    /// Hardware address (may be unavailable on macOS).
    pub address: String,
    /// Signal strength at discovery time, if reported.
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    pub fn new(id: String, name: String, address: String, rssi: Option<i16>) -> Self {
        Self {
            id,
            name,
            address,
            rssi,
        }
    }
}

/// Lifecycle of the single board connection.
///
/// Any transport-level disconnect collapses the session straight back
/// to `Disconnected`, discarding the discovered handles; a reconnect
/// always runs full rediscovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    ServicesDiscovered,
    Ready,
}

/// Represents the state of a successfully connected board.
/// This struct holds the active handles needed for interaction.
#[derive(Clone)]
pub struct ConnectedBoard {
    /// The device handle, used for checking connection status or disconnecting.
    pub device: Device,
    /// LED-control characteristic, if present at the expected location.
    /// Absent means LED writes are silently skipped.
    pub led_characteristic: Option<Characteristic>,
    /// Button-notification characteristic, if present at the expected
    /// location. Absent means no subscription was made.
    pub button_characteristic: Option<Characteristic>,
}
