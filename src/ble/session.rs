//! Session client for the single board connection.
//! Holds the state machine `Disconnected -> Connecting ->
//! ServicesDiscovered -> Ready`; any transport drop collapses it back
//! to `Disconnected` and discards the discovered handles.

use std::sync::{Arc, Mutex};

use bluest::{Adapter, Characteristic, Device, Service};
use log::{debug, info, warn};

use crate::ble::commands::{BluestLedChannel, LedDriver};
use crate::ble::constants::LED_COUNT;
use crate::ble::events::{BoardEvent, EventSender};
use crate::ble::notification::NotificationHandler;
use crate::ble::types::{ConnectedBoard, SessionState};
use crate::board::{ButtonCounters, LedBank};
use crate::config::{BoardProfile, CharacteristicSpot};
use crate::error::{Error, Result};

/// Shared cells of the session: the state flag and the live handles.
///
/// The session client is the single writer; the notification task holds
/// a clone and may only collapse the session when its stream ends.
/// Locks are never held across an await.
#[derive(Clone)]
pub(crate) struct SharedSession {
    state: Arc<Mutex<SessionState>>,
    connected: Arc<Mutex<Option<ConnectedBoard>>>,
}

impl SharedSession {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Disconnected)),
            connected: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    fn set_state(&self, next: SessionState) {
        *self.state.lock().unwrap() = next;
    }

    /// `Disconnected -> Connecting`; any other starting state is an
    /// invalid call.
    fn begin_connect(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::Disconnected {
            return Err(Error::InvalidState {
                expected: SessionState::Disconnected,
                actual: *state,
            });
        }
        *state = SessionState::Connecting;
        Ok(())
    }

    /// Rolls a failed connect back without emitting a disconnect event;
    /// the error itself is surfaced to the caller.
    fn abort_connect(&self) {
        self.set_state(SessionState::Disconnected);
    }

    /// Advances `from -> to`, failing when something else moved the
    /// state in the meantime (a concurrent disconnect or a transport
    /// drop collapsing the session).
    fn advance(&self, from: SessionState, to: SessionState) -> bool {
        let mut state = self.state.lock().unwrap();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Installs the board and enters `Ready`, but only while the
    /// connect attempt is still live. A collapse that landed during
    /// discovery hands the board back so the caller can release the
    /// late connection instead of resurrecting the session.
    fn store(&self, board: ConnectedBoard) -> std::result::Result<(), ConnectedBoard> {
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::ServicesDiscovered {
            return Err(board);
        }
        *self.connected.lock().unwrap() = Some(board);
        *state = SessionState::Ready;
        Ok(())
    }

    /// Tears the session down to `Disconnected`, handing back the live
    /// handles (if any) for transport-level cleanup. Idempotent; the
    /// disconnect event fires only on an actual transition.
    pub(crate) fn collapse(&self, events: &EventSender) -> Option<ConnectedBoard> {
        let previous = {
            let mut state = self.state.lock().unwrap();
            std::mem::replace(&mut *state, SessionState::Disconnected)
        };
        let board = self.connected.lock().unwrap().take();
        if previous != SessionState::Disconnected {
            info!("Session collapsed to Disconnected, handles discarded.");
            events.emit(BoardEvent::Disconnected);
        }
        board
    }

    /// The LED characteristic, but only while the session is `Ready`
    /// and the characteristic was found during discovery.
    fn ready_led_characteristic(&self) -> Option<Characteristic> {
        if self.state() != SessionState::Ready {
            return None;
        }
        self.connected
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|board| board.led_characteristic.clone())
    }
}

/// Owns the one connection handle the process is allowed to hold.
pub struct SessionClient {
    adapter: Adapter,
    profile: BoardProfile,
    shared: SharedSession,
    leds: Arc<Mutex<LedBank>>,
    counters: Arc<Mutex<ButtonCounters>>,
    notification_handler: NotificationHandler,
    events: EventSender,
}

impl SessionClient {
    pub fn new(adapter: Adapter, profile: BoardProfile, events: EventSender) -> Self {
        let leds = Arc::new(Mutex::new(LedBank::new(profile.led_on_codes)));
        let counters = Arc::new(Mutex::new(ButtonCounters::new(profile.button_mapping)));
        let notification_handler = NotificationHandler::new(counters.clone());
        Self {
            adapter,
            profile,
            shared: SharedSession::new(),
            leds,
            counters,
            notification_handler,
            events,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn led_states(&self) -> [bool; LED_COUNT] {
        self.leds.lock().unwrap().states()
    }

    pub fn button_counts(&self) -> Vec<(u8, u64)> {
        self.counters.lock().unwrap().counts()
    }

    /// Connects the transport, discovers services, locates the LED and
    /// button characteristics and subscribes to button notifications.
    ///
    /// Valid only from `Disconnected`. A failure at any step rolls back
    /// to `Disconnected` and is surfaced to the caller; there is no
    /// automatic retry.
    pub async fn connect(&self, device: Device) -> Result<()> {
        self.shared.begin_connect()?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let id = device.id().to_string();
        info!("Device details - ID: {}, Name: {:?}", id, name);

        match self.establish(&device).await {
            Ok(board) => {
                if let Err(board) = self.shared.store(board) {
                    // A disconnect raced the connect; release the late
                    // connection instead of resurrecting the session.
                    info!(
                        "Connect attempt was cancelled, releasing the connection to {}.",
                        board.device.id()
                    );
                    if board.device.is_connected().await {
                        if let Err(e) = self.adapter.disconnect_device(&board.device).await {
                            warn!("Failed to release the cancelled connection: {}", e);
                        }
                    }
                    return Err(Error::ConnectCancelled);
                }
                info!("Device successfully connected and session is ready.");
                self.events.emit(BoardEvent::Connected { id, name });
                Ok(())
            }
            Err(e) => {
                // A cancelled attempt must not touch the state again; a
                // fresh connect may already be underway.
                if !matches!(e, Error::ConnectCancelled) {
                    self.shared.abort_connect();
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, device: &Device) -> Result<ConnectedBoard> {
        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter.connect_device(device).await?;
        }

        info!("Connection successful, discovering services...");
        let services = device.services().await?;
        if !self
            .shared
            .advance(SessionState::Connecting, SessionState::ServicesDiscovered)
        {
            return Err(Error::ConnectCancelled);
        }

        let led_characteristic =
            Self::locate_characteristic(&services, &self.profile.led, "LED").await?;
        if led_characteristic.is_none() {
            self.report_missing("LED");
        }
        let button_characteristic =
            Self::locate_characteristic(&services, &self.profile.buttons, "button").await?;

        if let Some(button_char) = button_characteristic.clone() {
            info!("Setting up button notifications...");
            if let Err(e) = self
                .notification_handler
                .setup_notifications(button_char, self.events.clone(), self.shared.clone())
                .await
            {
                // A failed subscription degrades to an LED-only session.
                warn!("Button subscription failed: {}", e);
                self.events.emit(BoardEvent::Error {
                    message: e.to_string(),
                });
            }
        } else {
            self.report_missing("button");
        }

        Ok(ConnectedBoard {
            device: device.clone(),
            led_characteristic,
            button_characteristic,
        })
    }

    /// Locates a characteristic by UUID when the profile names one,
    /// falling back to the positional index the board firmware is known
    /// to use. A missing service or characteristic degrades the feature
    /// instead of failing the whole session.
    async fn locate_characteristic(
        services: &[Service],
        spot: &CharacteristicSpot,
        label: &str,
    ) -> Result<Option<Characteristic>> {
        let service = spot
            .service_uuid
            .and_then(|uuid| services.iter().find(|s| s.uuid() == uuid))
            .or_else(|| services.get(spot.service_index));
        let Some(service) = service else {
            debug!("No {} service at the expected location", label);
            return Ok(None);
        };

        let characteristics = service.characteristics().await?;
        let characteristic = spot
            .characteristic_uuid
            .and_then(|uuid| characteristics.iter().find(|c| c.uuid() == uuid))
            .or_else(|| characteristics.get(spot.characteristic_index));
        match characteristic {
            Some(characteristic) => {
                info!("Found {} characteristic: {}", label, characteristic.uuid());
                Ok(Some(characteristic.clone()))
            }
            None => {
                debug!("No {} characteristic at the expected location", label);
                Ok(None)
            }
        }
    }

    /// Surfaces a protocol-shape mismatch: the feature is skipped for
    /// this session rather than failing it, but the condition is
    /// reported to the consumer.
    fn report_missing(&self, feature: &'static str) {
        let err = Error::CharacteristicMissing(feature);
        warn!("{}", err);
        self.events.emit(BoardEvent::Error {
            message: err.to_string(),
        });
    }

    /// Drives LED `index` to `on`. Issued while the session is not
    /// `Ready`, or when no LED characteristic was found, this is a
    /// guarded no-op: nothing is written and local state is unchanged.
    pub async fn write_led(&self, index: usize, on: bool) -> Result<()> {
        let Some(characteristic) = self.shared.ready_led_characteristic() else {
            debug!("Ignoring LED write, session not ready");
            return Ok(());
        };
        let driver = LedDriver::new(BluestLedChannel::new(characteristic), self.leds.clone());
        driver.set(index, on).await?;
        self.events.emit(BoardEvent::LedsChanged {
            leds: self.led_states(),
        });
        Ok(())
    }

    /// Flips LED `index` from its current local state. Same guard as
    /// [`write_led`](Self::write_led).
    pub async fn toggle_led(&self, index: usize) -> Result<()> {
        let Some(characteristic) = self.shared.ready_led_characteristic() else {
            debug!("Ignoring LED toggle, session not ready");
            return Ok(());
        };
        let driver = LedDriver::new(BluestLedChannel::new(characteristic), self.leds.clone());
        driver.toggle(index).await?;
        self.events.emit(BoardEvent::LedsChanged {
            leds: self.led_states(),
        });
        Ok(())
    }

    /// Releases the connection handle. Safe to call from any state,
    /// including when already disconnected; discovered handles are
    /// discarded so any late response is ignored.
    pub async fn disconnect(&self) -> Result<()> {
        let Some(board) = self.shared.collapse(&self.events) else {
            debug!("Disconnect requested while already disconnected");
            return Ok(());
        };

        if board.device.is_connected().await {
            info!("Disconnecting from device {}", board.device.id());
            self.adapter.disconnect_device(&board.device).await?;
            info!("Successfully disconnected");
        } else {
            info!("Device {} not connected", board.device.id());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_is_only_valid_from_disconnected() {
        let shared = SharedSession::new();
        shared.begin_connect().unwrap();
        let err = shared.begin_connect().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                expected: SessionState::Disconnected,
                actual: SessionState::Connecting,
            }
        ));
    }

    #[test]
    fn failed_connect_rolls_back_to_disconnected() {
        let shared = SharedSession::new();
        shared.begin_connect().unwrap();
        shared.abort_connect();
        assert_eq!(shared.state(), SessionState::Disconnected);
        // A new attempt is allowed again.
        shared.begin_connect().unwrap();
    }

    #[tokio::test]
    async fn collapse_is_idempotent_and_emits_once() {
        let (events, mut rx) = EventSender::channel(8);
        let shared = SharedSession::new();
        shared.begin_connect().unwrap();

        assert!(shared.collapse(&events).is_none());
        assert_eq!(shared.state(), SessionState::Disconnected);
        // Second collapse: no state change, no second event.
        assert!(shared.collapse(&events).is_none());
        assert_eq!(shared.state(), SessionState::Disconnected);

        assert!(matches!(rx.recv().await, Some(BoardEvent::Disconnected)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_during_connect_cancels_the_attempt() {
        let (events, mut rx) = EventSender::channel(8);
        let shared = SharedSession::new();
        shared.begin_connect().unwrap();

        // The user disconnected (or the transport dropped) while the
        // connect was still in flight.
        shared.collapse(&events);
        assert!(matches!(rx.recv().await, Some(BoardEvent::Disconnected)));

        // The in-flight attempt can no longer advance, so it cannot
        // install handles or re-enter Ready.
        assert!(!shared.advance(SessionState::Connecting, SessionState::ServicesDiscovered));
        assert_eq!(shared.state(), SessionState::Disconnected);
    }

    #[test]
    fn advance_requires_the_expected_state() {
        let shared = SharedSession::new();
        assert!(!shared.advance(SessionState::Connecting, SessionState::ServicesDiscovered));

        shared.begin_connect().unwrap();
        assert!(shared.advance(SessionState::Connecting, SessionState::ServicesDiscovered));
        // Repeating the same transition fails, the state already moved.
        assert!(!shared.advance(SessionState::Connecting, SessionState::ServicesDiscovered));
    }

    #[test]
    fn led_writes_are_guarded_outside_ready() {
        let shared = SharedSession::new();
        assert!(shared.ready_led_characteristic().is_none());
        shared.begin_connect().unwrap();
        assert!(shared.ready_led_characteristic().is_none());
        shared.set_state(SessionState::ServicesDiscovered);
        assert!(shared.ready_led_characteristic().is_none());
    }
}
