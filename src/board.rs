//! Client-side board state: LED mirror and button click counters.
//! This module handles the byte-level encoding and counting rules for
//! the SmartDevice board, kept free of transport types so the logic is
//! testable without a radio.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::ble::constants::{BUTTON_PAYLOAD_LEN, LED_COUNT, LED_OFF};

/// Mirror of the board's three LEDs.
///
/// State is applied optimistically when a write is issued; the board
/// sends no acknowledgment, so this can drift from the hardware if a
/// write is lost on the air.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedBank {
    states: [bool; LED_COUNT],
    on_codes: [u8; LED_COUNT],
}

impl LedBank {
    pub fn new(on_codes: [u8; LED_COUNT]) -> Self {
        Self {
            states: [false; LED_COUNT],
            on_codes,
        }
    }

    pub fn states(&self) -> [bool; LED_COUNT] {
        self.states
    }

    pub fn is_on(&self, index: usize) -> bool {
        self.states.get(index).copied().unwrap_or(false)
    }

    /// Wire byte that drives LED `index` to `on`. Off is always `0x00`;
    /// on uses the per-LED code. `None` for an out-of-range index.
    pub fn encode(&self, index: usize, on: bool) -> Option<u8> {
        if index >= LED_COUNT {
            return None;
        }
        Some(if on { self.on_codes[index] } else { LED_OFF })
    }

    /// Applies the new state locally and returns the byte to write.
    pub fn set(&mut self, index: usize, on: bool) -> Option<u8> {
        let byte = self.encode(index, on)?;
        self.states[index] = on;
        Some(byte)
    }

    /// Flips LED `index` and returns the byte for its new state.
    pub fn toggle(&mut self, index: usize) -> Option<u8> {
        let next = !self.is_on(index);
        self.set(index, next)
    }
}

/// A single click attributed to a physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ButtonClick {
    /// Physical button label as printed on the board.
    pub button: u8,
    /// Total clicks seen for that button since process start.
    pub count: u64,
}

/// Click counters driven exclusively by inbound notifications.
/// Counters only ever increase; a process restart is the only reset.
#[derive(Debug, Clone, Serialize)]
pub struct ButtonCounters {
    /// Physical button label for each payload byte position.
    mapping: [u8; BUTTON_PAYLOAD_LEN],
    counts: [u64; BUTTON_PAYLOAD_LEN],
    last_payload: Option<[u8; BUTTON_PAYLOAD_LEN]>,
}

impl ButtonCounters {
    pub fn new(mapping: [u8; BUTTON_PAYLOAD_LEN]) -> Self {
        Self {
            mapping,
            counts: [0; BUTTON_PAYLOAD_LEN],
            last_payload: None,
        }
    }

    /// Interprets a notification payload positionally: a byte that
    /// changed since the previous notification counts one click for the
    /// button at that position. The first notification counts nonzero
    /// bytes. Payloads shorter than expected are dropped.
    pub fn apply(&mut self, payload: &[u8]) -> Vec<ButtonClick> {
        if payload.len() < BUTTON_PAYLOAD_LEN {
            debug!("Dropping short button payload: {:?}", payload);
            return Vec::new();
        }

        let mut clicks = Vec::new();
        let mut bytes = [0u8; BUTTON_PAYLOAD_LEN];
        bytes.copy_from_slice(&payload[..BUTTON_PAYLOAD_LEN]);

        for position in 0..BUTTON_PAYLOAD_LEN {
            let clicked = match self.last_payload {
                Some(previous) => bytes[position] != previous[position],
                None => bytes[position] != 0,
            };
            if clicked {
                self.counts[position] += 1;
                clicks.push(ButtonClick {
                    button: self.mapping[position],
                    count: self.counts[position],
                });
            }
        }

        self.last_payload = Some(bytes);
        clicks
    }

    /// Snapshot of (button label, total clicks) pairs.
    pub fn counts(&self) -> Vec<(u8, u64)> {
        self.mapping
            .iter()
            .zip(self.counts.iter())
            .map(|(&button, &count)| (button, count))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::constants::LED_ON_CODES;

    #[test]
    fn led_off_is_always_zero() {
        let bank = LedBank::new(LED_ON_CODES);
        for index in 0..LED_COUNT {
            assert_eq!(bank.encode(index, false), Some(0x00));
        }
    }

    #[test]
    fn led_on_uses_per_led_codes() {
        let bank = LedBank::new(LED_ON_CODES);
        assert_eq!(bank.encode(0, true), Some(0x01));
        assert_eq!(bank.encode(1, true), Some(0x02));
        assert_eq!(bank.encode(2, true), Some(0x03));
    }

    #[test]
    fn led_out_of_range_encodes_nothing() {
        let mut bank = LedBank::new(LED_ON_CODES);
        assert_eq!(bank.encode(3, true), None);
        assert_eq!(bank.set(7, true), None);
        assert_eq!(bank.states(), [false, false, false]);
    }

    #[test]
    fn toggle_flips_state_and_encodes_both_directions() {
        let mut bank = LedBank::new(LED_ON_CODES);
        assert_eq!(bank.toggle(0), Some(0x01));
        assert_eq!(bank.states(), [true, false, false]);
        assert_eq!(bank.toggle(0), Some(0x00));
        assert_eq!(bank.states(), [false, false, false]);
    }

    #[test]
    fn first_notification_counts_nonzero_bytes() {
        let mut counters = ButtonCounters::new([1, 3]);
        let clicks = counters.apply(&[0x01, 0x00]);
        assert_eq!(clicks, vec![ButtonClick { button: 1, count: 1 }]);
    }

    #[test]
    fn changed_bytes_count_one_click_each() {
        let mut counters = ButtonCounters::new([1, 3]);
        counters.apply(&[0x00, 0x00]);
        let clicks = counters.apply(&[0x01, 0x02]);
        assert_eq!(
            clicks,
            vec![
                ButtonClick { button: 1, count: 1 },
                ButtonClick { button: 3, count: 1 },
            ]
        );
        // Unchanged payload adds nothing.
        assert!(counters.apply(&[0x01, 0x02]).is_empty());
    }

    #[test]
    fn counters_are_monotone() {
        let mut counters = ButtonCounters::new([1, 3]);
        counters.apply(&[0x01, 0x00]);
        counters.apply(&[0x02, 0x00]);
        counters.apply(&[0x03, 0x00]);
        assert_eq!(counters.counts(), vec![(1, 3), (3, 0)]);
    }

    #[test]
    fn short_payload_is_dropped() {
        let mut counters = ButtonCounters::new([1, 3]);
        assert!(counters.apply(&[0x01]).is_empty());
        assert!(counters.apply(&[]).is_empty());
        assert_eq!(counters.counts(), vec![(1, 0), (3, 0)]);
    }
}
