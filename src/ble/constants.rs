//! Constants used throughout the crate: the GATT layout of the
//! SmartDevice board, wire encodings and scan defaults.
//!
//! The board firmware publishes its LED and button features at fixed
//! positions in the service table rather than under stable custom
//! UUIDs, so the defaults here are positional. A [`crate::config::BoardProfile`]
//! can override every value once the real layout has been read off the
//! hardware.

/// Number of LEDs on the board.
pub const LED_COUNT: usize = 3;

/// Wire byte that switches any LED off.
pub const LED_OFF: u8 = 0x00;

/// Wire bytes that switch each LED on, by LED index.
pub const LED_ON_CODES: [u8; LED_COUNT] = [0x01, 0x02, 0x03];

/// Position of the LED-control service in the discovered service table.
pub const LED_SERVICE_INDEX: usize = 2;

/// Position of the LED-control characteristic within its service.
pub const LED_CHARACTERISTIC_INDEX: usize = 0;

/// Position of the button-notification service in the service table.
pub const BUTTON_SERVICE_INDEX: usize = 3;

/// Position of the button characteristic within its service.
pub const BUTTON_CHARACTERISTIC_INDEX: usize = 0;

/// Length of a button notification payload, one byte per tracked button.
pub const BUTTON_PAYLOAD_LEN: usize = 2;

/// Physical button label carried by each payload byte position.
pub const BUTTON_MAPPING: [u8; BUTTON_PAYLOAD_LEN] = [1, 3];

/// Default scan duration in seconds for one-shot scans.
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;
