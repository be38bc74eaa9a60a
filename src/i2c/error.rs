// Licensed under the Apache-2.0 license

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// The transfer-level failure behind an [`Error::Io`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    Nack,
    BusError,
    Timeout,
    InvalidArgument,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Target declined an address or data byte.
    Nack,
    /// Arbitration loss or a line-level fault flagged by the controller.
    BusError,
    /// A polling budget ran out.
    Timeout,
    /// The requested bus speed needs a divider outside 10..=511.
    FrequencyOutOfRange,
    /// Only standard mode (up to 100 kHz) is supported.
    UnsupportedSpeed,
    /// The clock provider failed or reported 0 Hz.
    ClockUnavailable,
    InvalidArgument,
    /// An exchange takes one or two messages.
    UnsupportedMessageCount,
    /// An exchange failed. Carries the first failure observed.
    Io(Fault),
}

impl Error {
    /// `Timeout` and `BusError` may clear up on retry, possibly after bus
    /// recovery. Everything else will fail the same way again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout
                | Error::BusError
                | Error::Io(Fault::Timeout)
                | Error::Io(Fault::BusError)
        )
    }

    /// Collapse a transfer error into the fault an exchange reports.
    pub(crate) fn fault(self) -> Fault {
        match self {
            Error::Nack | Error::Io(Fault::Nack) => Fault::Nack,
            Error::BusError | Error::Io(Fault::BusError) => Fault::BusError,
            Error::Timeout | Error::Io(Fault::Timeout) => Fault::Timeout,
            _ => Fault::InvalidArgument,
        }
    }
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Nack => Error::Nack,
            Fault::BusError => Error::BusError,
            Fault::Timeout => Error::Timeout,
            Fault::InvalidArgument => Error::InvalidArgument,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Error::from(*self), f)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Nack => f.write_str("NACK"),
            Error::BusError => f.write_str("bus error"),
            Error::Timeout => f.write_str("timeout"),
            Error::FrequencyOutOfRange => f.write_str("bus frequency out of range"),
            Error::UnsupportedSpeed => f.write_str("standard mode only"),
            Error::ClockUnavailable => f.write_str("input clock unavailable"),
            Error::InvalidArgument => f.write_str("invalid argument"),
            Error::UnsupportedMessageCount => f.write_str("1 or 2 messages per transfer"),
            Error::Io(fault) => write!(f, "transfer failed: {fault}"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Nack | Error::Io(Fault::Nack) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Error::BusError | Error::Io(Fault::BusError) => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn retryable_kinds() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::Io(Fault::BusError).is_retryable());
        assert!(!Error::Nack.is_retryable());
        assert!(!Error::FrequencyOutOfRange.is_retryable());
        assert!(!Error::Io(Fault::InvalidArgument).is_retryable());
    }

    #[test]
    fn maps_to_embedded_hal_kinds() {
        assert_eq!(
            Error::Io(Fault::Nack).kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        );
        assert_eq!(Error::BusError.kind(), ErrorKind::Bus);
        assert_eq!(Error::UnsupportedMessageCount.kind(), ErrorKind::Other);
    }

    #[test]
    fn display_names_the_fault() {
        assert_eq!(
            Error::Io(Fault::Timeout).to_string(),
            "transfer failed: timeout"
        );
    }
}
