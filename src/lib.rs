//! SmartDevice BLE client library.
//! Host-side GATT central for the SmartDevice demo board: scan for
//! boards, connect, drive the three LEDs and count button presses.

// Module declarations
pub mod ble;
pub mod board;
pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used types
pub use ble::{
    BoardEvent, BoardManager, BoardScanner, DiscoveredDevice, EventSender, SessionClient,
    SessionState,
};
pub use board::{ButtonClick, ButtonCounters, LedBank};
pub use config::BoardProfile;
pub use error::Error;
