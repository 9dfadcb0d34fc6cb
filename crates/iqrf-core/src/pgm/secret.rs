//! Access password and user key programming

use super::engine::{drained, programming_idle, timed_out, ModeEntry};
use super::PgmStatus;
use crate::error::{Error, Result};
use crate::port::BusPort;
use crate::spi::{opcodes, QueueStatus};
use crate::transport::Driver;

/// Length of the password and of the user key
pub const SECRET_LEN: usize = 16;

/// Which secret to store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// Access password
    Password,
    /// User key
    UserKey,
}

impl SecretKind {
    /// Internal EEPROM selector of the secret
    pub fn selector(self) -> u8 {
        match self {
            Self::Password => 0xD0,
            Self::UserKey => 0xD1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    EnterProgMode,
    WaitProgMode,
    WaitProgEnd,
    ProgEnd,
}

/// Writes the access password or the user key
///
/// Poll [`write_key_or_password`](SecretWriter::write_key_or_password)
/// with the same arguments between driver ticks until it returns
/// [`PgmStatus::Success`] or an error.
#[derive(Debug)]
pub struct SecretWriter {
    phase: Phase,
    entry: ModeEntry,
    packet: [u8; SECRET_LEN + 2],
    since: u32,
    outcome: Result<()>,
}

impl Default for SecretWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretWriter {
    /// Create an idle writer
    pub fn new() -> Self {
        Self {
            phase: Phase::Init,
            entry: ModeEntry::new(),
            packet: [0; SECRET_LEN + 2],
            since: 0,
            outcome: Ok(()),
        }
    }

    /// Advance the write of `secret`
    pub fn write_key_or_password<P: BusPort, H: FnMut(&[u8])>(
        &mut self,
        driver: &mut Driver<P, H>,
        kind: SecretKind,
        secret: &[u8; SECRET_LEN],
    ) -> Result<PgmStatus> {
        match self.phase {
            Phase::Init => {
                self.packet[0] = kind.selector();
                self.packet[1] = SECRET_LEN as u8;
                self.packet[2..].copy_from_slice(secret);
                self.entry = ModeEntry::new();
                self.outcome = Ok(());
                driver.take_write_error();
                self.phase = Phase::EnterProgMode;
            }
            Phase::EnterProgMode => {
                self.entry.enter(driver);
                self.phase = Phase::WaitProgMode;
            }
            Phase::WaitProgMode => {
                let ready =
                    programming_idle(driver) && driver.queue_status() == QueueStatus::Free;
                match self.entry.wait(driver, ready) {
                    Ok(true) => {
                        if let Err(e) = driver.submit_packet(opcodes::SPI_EEPROM_PGM, &self.packet) {
                            self.outcome = Err(e);
                        }
                        self.since = driver.now_ms();
                        self.phase = Phase::WaitProgEnd;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        self.outcome = Err(e);
                        self.phase = Phase::ProgEnd;
                    }
                }
            }
            Phase::WaitProgEnd => {
                if let Some(e) = driver.take_write_error() {
                    log::error!("{:?} rejected by TR module", kind);
                    self.outcome = self.outcome.and(Err(e));
                }
                if programming_idle(driver) && driver.queue_status() == QueueStatus::Free {
                    driver.end_programming_mode();
                    self.phase = Phase::ProgEnd;
                } else if timed_out(driver, self.since) {
                    log::warn!("Secret not confirmed, resetting TR module");
                    self.outcome = self.outcome.and(Err(Error::HardwareTimeout));
                    driver.end_programming_mode();
                    self.phase = Phase::ProgEnd;
                }
            }
            Phase::ProgEnd => {
                if drained(driver) {
                    self.phase = Phase::Init;
                    self.packet.fill(0);
                    return self.outcome.map(|()| {
                        log::info!("{:?} written", kind);
                        PgmStatus::Success
                    });
                }
            }
        }
        Ok(PgmStatus::InProgress(0))
    }
}
