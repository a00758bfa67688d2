//! Event boundary between the BLE layer and its consumer.
//! Scanner and session outcomes are delivered through a bounded channel
//! so that nothing on the transport path ever blocks on the consumer.

use log::warn;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::ble::constants::LED_COUNT;
use crate::ble::types::DiscoveredDevice;

/// Events emitted by the scanner and the session client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum BoardEvent {
    ScanStarted,
    DeviceFound(DiscoveredDevice),
    ScanStopped,
    Connected { id: String, name: String },
    Disconnected,
    LedsChanged { leds: [bool; LED_COUNT] },
    ButtonClicked { button: u8, count: u64 },
    Error { message: String },
}

/// Clonable sending half handed to the scanner and session tasks.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<BoardEvent>,
}

impl EventSender {
    /// Creates the event channel; the receiving half goes to the consumer.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<BoardEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Emits an event without blocking. A full or closed channel drops
    /// the event; a lagging consumer must not stall the transport path.
    pub fn emit(&self, event: BoardEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Dropping event, consumer not keeping up: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_the_consumer_in_order() {
        let (events, mut rx) = EventSender::channel(8);
        events.emit(BoardEvent::ScanStarted);
        events.emit(BoardEvent::ScanStopped);
        assert!(matches!(rx.recv().await, Some(BoardEvent::ScanStarted)));
        assert!(matches!(rx.recv().await, Some(BoardEvent::ScanStopped)));
    }

    #[tokio::test]
    async fn emit_never_blocks_on_a_full_channel() {
        let (events, _rx) = EventSender::channel(1);
        events.emit(BoardEvent::ScanStarted);
        // Channel is full; this drops instead of blocking.
        events.emit(BoardEvent::ScanStopped);
    }
}
