//! Button notification handling: subscribes to the button
//! characteristic and turns payload changes into click events.

use std::sync::{Arc, Mutex};

use bluest::Characteristic;
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::oneshot;

use crate::ble::events::{BoardEvent, EventSender};
use crate::ble::session::SharedSession;
use crate::board::ButtonCounters;
use crate::error::Result;

/// Notification handler for button data.
#[derive(Clone)]
pub struct NotificationHandler {
    counters: Arc<Mutex<ButtonCounters>>,
}

impl NotificationHandler {
    pub fn new(counters: Arc<Mutex<ButtonCounters>>) -> Self {
        Self { counters }
    }

    /// Subscribes to button notifications and waits for the
    /// subscription to be confirmed before returning. The platform
    /// layer writes the CCCD enable value as part of the subscription,
    /// so this must only be called after service discovery has
    /// completed.
    pub(crate) async fn setup_notifications(
        &self,
        button_characteristic: Characteristic,
        events: EventSender,
        session: SharedSession,
    ) -> Result<()> {
        info!("Subscribing to button notifications...");
        let counters = self.counters.clone();
        let (subscribed_tx, subscribed_rx) = oneshot::channel();

        tokio::spawn(async move {
            Self::process_notifications(
                button_characteristic,
                counters,
                events,
                session,
                subscribed_tx,
            )
            .await;
        });

        match subscribed_rx.await {
            Ok(Ok(())) => {
                info!("Button subscription confirmed.");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                error!("Notification task ended before confirming the subscription");
                Ok(())
            }
        }
    }

    async fn process_notifications(
        characteristic: Characteristic,
        counters: Arc<Mutex<ButtonCounters>>,
        events: EventSender,
        session: SharedSession,
        subscribed: oneshot::Sender<Result<()>>,
    ) {
        info!("Listening for button notifications...");

        match characteristic.notify().await {
            Ok(mut notification_stream) => {
                let _ = subscribed.send(Ok(()));
                while let Some(result) = notification_stream.next().await {
                    match result {
                        Ok(value) => {
                            debug!("Received button payload: {:?}", value);
                            let clicks = {
                                let mut counters = counters.lock().unwrap();
                                counters.apply(&value)
                            };
                            for click in clicks {
                                events.emit(BoardEvent::ButtonClicked {
                                    button: click.button,
                                    count: click.count,
                                });
                            }
                        }
                        Err(e) => {
                            error!("Error in notification stream: {}", e);
                            break;
                        }
                    }
                }

                info!("Notification stream ended");
                // The stream only ends when the transport drops; collapse
                // the session so stale handles cannot be used again.
                session.collapse(&events);
            }
            Err(e) => {
                // Subscription failed: the session client decides how
                // to degrade, it only needs to hear about it.
                let _ = subscribed.send(Err(e.into()));
            }
        }
    }
}
