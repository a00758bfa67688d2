//! Error taxonomy for the SmartDevice client.
//! Transport failures, protocol-shape mismatches and missing OS
//! authorization are kept apart so the caller can react differently
//! to each (authorization gets a user-facing message, a missing
//! characteristic just degrades the session).

use thiserror::Error;

use crate::ble::SessionState;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no Bluetooth adapter available")]
    AdapterUnavailable,

    #[error("Bluetooth access is not authorized by the OS")]
    NotAuthorized,

    #[error("operation requires session state {expected:?}, current state is {actual:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },

    #[error("connect attempt was cancelled by a disconnect")]
    ConnectCancelled,

    #[error("device not found in the discovered set: {0}")]
    DeviceNotFound(String),

    #[error("expected {0} characteristic is missing on the peripheral")]
    CharacteristicMissing(&'static str),

    #[error("transport error: {0}")]
    Transport(bluest::Error),
}

impl From<bluest::Error> for Error {
    fn from(err: bluest::Error) -> Self {
        // Authorization failures get their own variant so the caller can
        // show a permission prompt instead of a generic transport error.
        match err.kind() {
            bluest::error::ErrorKind::NotAuthorized => Error::NotAuthorized,
            _ => Error::Transport(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_characteristic_names_the_feature() {
        let err = Error::CharacteristicMissing("LED");
        assert_eq!(
            err.to_string(),
            "expected LED characteristic is missing on the peripheral"
        );
    }

    #[test]
    fn cancelled_connect_has_a_user_facing_message() {
        assert_eq!(
            Error::ConnectCancelled.to_string(),
            "connect attempt was cancelled by a disconnect"
        );
    }
}
