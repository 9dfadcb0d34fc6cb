//! Programming engine
//!
//! Uploads firmware (Intel HEX), plugins (`.iqrf`) and TR configuration
//! (`.trcnfg`) to a module in programming mode, and writes the access
//! password or user key.
//!
//! All state machines are non-blocking: each call performs at most one unit
//! of work and returns [`PgmStatus::InProgress`] with a percentage until the
//! operation finishes. The driver must be ticked between calls.

pub mod block;
mod config;
mod engine;
pub mod hex;
pub mod plugin;
mod secret;
mod session;

pub use block::{BlockKind, MemoryBlock, Prepared, Region};
pub use config::ConfigAssembler;
pub use engine::Programmer;
pub use secret::{SecretKind, SecretWriter, SECRET_LEN};
pub use session::{FileKind, ProgrammingSession, SessionReader};

/// Progress of a programming operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PgmStatus {
    /// Still running, with the share of the file consumed in percent
    InProgress(u8),
    /// Finished successfully
    Success,
}

/// Decode two ASCII hex digits (either case)
pub(crate) fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi << 4 | lo) as u8)
}
