//! Error types for aquarium-core.
//!
//! Every failure the device link can produce is an [`Error`]. Callers that
//! only care about the broad category can use [`Error::kind`]:
//!
//! | Kind | Variants | Typical cause |
//! |------|----------|---------------|
//! | [`ErrorKind::DeviceNotFound`] | [`Error::DeviceNotFound`] | Selection cancelled, controller off or out of range |
//! | [`ErrorKind::ConnectionFailed`] | [`Error::ConnectionFailed`] | Link could not be opened |
//! | [`ErrorKind::ControlPointMissing`] | [`Error::ServiceNotFound`], [`Error::CharacteristicNotFound`] | Wrong firmware or wrong protocol revision |
//! | [`ErrorKind::NotConnected`] | [`Error::NotConnected`] | Command issued before `connect()` or after the link dropped |
//! | [`ErrorKind::TransferFailed`] | [`Error::ReadFailed`], [`Error::WriteFailed`], [`Error::SubscribeFailed`], [`Error::Bluetooth`] | The transport rejected an operation |
//! | [`ErrorKind::Unsupported`] | [`Error::Unsupported`] | Command not available in the selected revision |
//! | [`ErrorKind::InvalidInput`] | [`Error::InvalidInput`] | Caller passed an out-of-range value |
//! | [`ErrorKind::InvalidData`] | [`Error::InvalidData`] | Controller sent something undecodable |
//!
//! The client never retries. A failed command is reported once and the
//! caller decides what to do next.

use thiserror::Error;

use aquarium_types::{ParseError, ProtocolRevision};

/// Errors that can occur when talking to the aquarium controller.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// No matching peripheral was selected.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// The transport link could not be established.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Identifier of the peripheral that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// The controller service is not advertised by the peripheral.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The service UUID that was looked up.
        uuid: String,
    },

    /// A required characteristic is missing from the controller service.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Operation attempted while not connected to the controller.
    #[error("Not connected to device")]
    NotConnected,

    /// Read operation failed.
    #[error("Read failed from characteristic {uuid}: {reason}")]
    ReadFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Write operation failed.
    #[error("Write failed to characteristic {uuid}: {reason}")]
    WriteFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// Enabling notifications failed.
    #[error("Subscribe failed for characteristic {uuid}: {reason}")]
    SubscribeFailed {
        /// The characteristic UUID.
        uuid: String,
        /// The reason for the failure.
        reason: String,
    },

    /// The command does not exist in the selected protocol revision.
    #[error("'{operation}' is not supported by the {revision} protocol")]
    Unsupported {
        /// The client operation that was called.
        operation: &'static str,
        /// The revision the client was built for.
        revision: ProtocolRevision,
    },

    /// An argument was outside its accepted range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Failed to parse data received from the controller.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Broad error categories, one per failure mode of the device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DeviceNotFound,
    ConnectionFailed,
    ControlPointMissing,
    NotConnected,
    TransferFailed,
    Unsupported,
    InvalidInput,
    InvalidData,
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Connection attempt timed out.
    Timeout,
    /// The peripheral refused the connection.
    Rejected,
    /// Generic BLE error.
    BleError(String),
    /// Other/unknown error.
    Other(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "connection timed out"),
            Self::Rejected => write!(f, "connection rejected by device"),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// Reason why no peripheral was selected.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// The selection was cancelled before a peripheral was chosen.
    SelectionCancelled,
    /// No peripheral matched the name filter.
    NotFound { identifier: String },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelectionCancelled => write!(f, "device selection cancelled"),
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific name.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }

    pub fn read_failed(uuid: impl ToString, reason: impl ToString) -> Self {
        Self::ReadFailed {
            uuid: uuid.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn write_failed(uuid: impl ToString, reason: impl ToString) -> Self {
        Self::WriteFailed {
            uuid: uuid.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn subscribe_failed(uuid: impl ToString, reason: impl ToString) -> Self {
        Self::SubscribeFailed {
            uuid: uuid.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceNotFound(_) => ErrorKind::DeviceNotFound,
            Error::ConnectionFailed { .. } => ErrorKind::ConnectionFailed,
            Error::ServiceNotFound { .. } | Error::CharacteristicNotFound { .. } => {
                ErrorKind::ControlPointMissing
            }
            Error::NotConnected => ErrorKind::NotConnected,
            Error::Bluetooth(_)
            | Error::ReadFailed { .. }
            | Error::WriteFailed { .. }
            | Error::SubscribeFailed { .. } => ErrorKind::TransferFailed,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::InvalidData(_) => ErrorKind::InvalidData,
        }
    }

    /// Whether the error concerns the link itself rather than a bad argument
    /// or an unsupported command.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DeviceNotFound
                | ErrorKind::ConnectionFailed
                | ErrorKind::ControlPointMissing
                | ErrorKind::NotConnected
                | ErrorKind::TransferFailed
        )
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::InvalidValue(msg) => Error::InvalidData(msg),
            other => Error::InvalidData(other.to_string()),
        }
    }
}

/// Result type alias using aquarium-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::device_not_found("AquariumController");
        assert!(err.to_string().contains("AquariumController"));

        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::characteristic_not_found("beb54802", 1);
        assert!(err.to_string().contains("beb54802"));
        assert!(err.to_string().contains("1 services"));

        let err = Error::write_failed("beb5483e", "GATT error");
        assert_eq!(
            err.to_string(),
            "Write failed to characteristic beb5483e: GATT error"
        );
    }

    #[test]
    fn test_unsupported_display() {
        let err = Error::Unsupported {
            operation: "delete_schedule",
            revision: ProtocolRevision::MultiCharacteristic,
        };
        let message = err.to_string();
        assert!(message.contains("delete_schedule"));
        assert!(message.contains("multi-characteristic"));
    }

    #[test]
    fn test_device_not_found_reasons() {
        let err = Error::DeviceNotFound(DeviceNotFoundReason::SelectionCancelled);
        assert!(err.to_string().contains("cancelled"));

        let err = Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter);
        assert!(err.to_string().contains("no Bluetooth adapter"));
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            Error::DeviceNotFound(DeviceNotFoundReason::SelectionCancelled).kind(),
            ErrorKind::DeviceNotFound
        );
        assert_eq!(
            Error::connection_failed(None, ConnectionFailureReason::Timeout).kind(),
            ErrorKind::ConnectionFailed
        );
        assert_eq!(
            Error::ServiceNotFound {
                uuid: "x".to_string()
            }
            .kind(),
            ErrorKind::ControlPointMissing
        );
        assert_eq!(
            Error::characteristic_not_found("x", 0).kind(),
            ErrorKind::ControlPointMissing
        );
        assert_eq!(Error::NotConnected.kind(), ErrorKind::NotConnected);
        assert_eq!(
            Error::read_failed("x", "y").kind(),
            ErrorKind::TransferFailed
        );
        assert_eq!(
            Error::subscribe_failed("x", "y").kind(),
            ErrorKind::TransferFailed
        );
        assert_eq!(
            Error::invalid_input("bad").kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_connection_errors() {
        assert!(Error::NotConnected.is_connection_error());
        assert!(Error::write_failed("x", "y").is_connection_error());
        assert!(!Error::invalid_input("bad").is_connection_error());
        assert!(
            !Error::Unsupported {
                operation: "feed_now",
                revision: ProtocolRevision::SingleCharacteristic
            }
            .is_connection_error()
        );
    }

    #[test]
    fn test_parse_error_conversion() {
        let err: Error = ParseError::invalid_value("servo 120").into();
        assert!(matches!(err, Error::InvalidData(ref m) if m == "servo 120"));

        let err: Error = ParseError::InsufficientBytes {
            expected: 4,
            actual: 2,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
        assert!(err.to_string().contains("requires 4 bytes"));
    }

    #[test]
    fn test_btleplug_error_conversion() {
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
