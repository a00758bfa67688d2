//! Bluetooth functionality for the SmartDevice client.
//! This module handles all bluetooth operations including scanning,
//! connecting, and exchanging LED and button data with the board.

mod commands;
pub mod constants;
mod events;
mod manager;
mod notification;
mod scanner;
mod session;
mod types;

// Re-export types that should be publicly accessible
pub use commands::{BluestLedChannel, LedChannel, LedDriver};
pub use events::{BoardEvent, EventSender};
pub use manager::BoardManager;
pub use notification::NotificationHandler;
pub use scanner::{BoardScanner, DiscoveredSet};
pub use session::SessionClient;
pub use types::{ConnectedBoard, DiscoveredDevice, SessionState};
