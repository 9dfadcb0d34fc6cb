//! Error types for iqrf-core
//!
//! This module provides a no_std compatible error type that is returned by
//! the transport and the programming engine.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Transport errors
    /// Module is busy or not in the mode the operation requires
    NotReady,
    /// Payload length outside 1..=64 bytes
    BadSize,
    /// Packet was rejected on every attempt of the retry budget
    WriteFailed,

    // Programming errors
    /// Malformed file record, checksum mismatch, overlong or truncated line
    FileFormatError,
    /// Data destined outside every known memory region, or overflowing one
    AddressOutOfRange,
    /// Programming-mode entry or an in-flight exchange exceeded its timeout
    HardwareTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "TR module not ready"),
            Self::BadSize => write!(f, "wrong data size (must be 1 to 64 bytes)"),
            Self::WriteFailed => write!(f, "TR module write failed"),
            Self::FileFormatError => write!(f, "programming file format error"),
            Self::AddressOutOfRange => write!(f, "address out of range"),
            Self::HardwareTimeout => write!(f, "TR module timed out"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
