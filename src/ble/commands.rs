//! LED write path: the single-byte wire commands and the seam through
//! which they reach the board.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, info, warn};

use crate::ble::constants::LED_COUNT;
use crate::board::LedBank;
use crate::error::Result;

/// Sink for single-byte LED writes. The transport implementation writes
/// to the LED characteristic; tests substitute a recorder.
#[async_trait]
pub trait LedChannel {
    async fn write_led_byte(&self, byte: u8) -> Result<()>;
}

/// Writes LED bytes through a bluest characteristic.
#[derive(Clone)]
pub struct BluestLedChannel {
    characteristic: bluest::Characteristic,
}

impl BluestLedChannel {
    pub fn new(characteristic: bluest::Characteristic) -> Self {
        Self { characteristic }
    }
}

#[async_trait]
impl LedChannel for BluestLedChannel {
    async fn write_led_byte(&self, byte: u8) -> Result<()> {
        debug!("Writing LED byte 0x{:02x}", byte);
        self.characteristic.write(&[byte]).await?;
        Ok(())
    }
}

/// Drives the LED bank over a channel: encodes the requested change,
/// applies it to the local mirror, then issues exactly one write.
///
/// Local state is updated before the write completes; the board sends
/// no acknowledgment worth waiting on, and a failed write leaves the
/// optimistic state in place.
pub struct LedDriver<C: LedChannel> {
    channel: C,
    bank: Arc<Mutex<LedBank>>,
}

impl<C: LedChannel> LedDriver<C> {
    pub fn new(channel: C, bank: Arc<Mutex<LedBank>>) -> Self {
        Self { channel, bank }
    }

    pub fn states(&self) -> [bool; LED_COUNT] {
        self.bank.lock().unwrap().states()
    }

    /// Drives LED `index` to `on`. Out-of-range indexes are ignored.
    pub async fn set(&self, index: usize, on: bool) -> Result<()> {
        let byte = self.bank.lock().unwrap().set(index, on);
        let Some(byte) = byte else {
            warn!("Ignoring write for out-of-range LED index {}", index);
            return Ok(());
        };
        info!("LED {} -> {}, writing 0x{:02x}", index, on, byte);
        self.channel.write_led_byte(byte).await
    }

    /// Flips LED `index` from its current local state.
    pub async fn toggle(&self, index: usize) -> Result<()> {
        let byte = self.bank.lock().unwrap().toggle(index);
        let Some(byte) = byte else {
            warn!("Ignoring toggle for out-of-range LED index {}", index);
            return Ok(());
        };
        info!("Toggling LED {}, writing 0x{:02x}", index, byte);
        self.channel.write_led_byte(byte).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::constants::LED_ON_CODES;

    #[derive(Clone, Default)]
    struct RecordingChannel {
        writes: Arc<Mutex<Vec<u8>>>,
    }

    #[async_trait]
    impl LedChannel for RecordingChannel {
        async fn write_led_byte(&self, byte: u8) -> Result<()> {
            self.writes.lock().unwrap().push(byte);
            Ok(())
        }
    }

    fn driver() -> (LedDriver<RecordingChannel>, Arc<Mutex<Vec<u8>>>) {
        let channel = RecordingChannel::default();
        let writes = channel.writes.clone();
        let bank = Arc::new(Mutex::new(LedBank::new(LED_ON_CODES)));
        (LedDriver::new(channel, bank), writes)
    }

    #[tokio::test]
    async fn toggle_from_off_writes_the_on_code_once() {
        let (driver, writes) = driver();
        driver.toggle(0).await.unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![0x01]);
        assert_eq!(driver.states(), [true, false, false]);
    }

    #[tokio::test]
    async fn toggle_back_writes_zero() {
        let (driver, writes) = driver();
        driver.toggle(1).await.unwrap();
        driver.toggle(1).await.unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![0x02, 0x00]);
        assert_eq!(driver.states(), [false, false, false]);
    }

    #[tokio::test]
    async fn set_is_one_write_per_call() {
        let (driver, writes) = driver();
        driver.set(2, true).await.unwrap();
        driver.set(2, true).await.unwrap();
        assert_eq!(*writes.lock().unwrap(), vec![0x03, 0x03]);
    }

    #[tokio::test]
    async fn out_of_range_index_writes_nothing() {
        let (driver, writes) = driver();
        driver.set(5, true).await.unwrap();
        driver.toggle(9).await.unwrap();
        assert!(writes.lock().unwrap().is_empty());
        assert_eq!(driver.states(), [false, false, false]);
    }
}
