//! Start-up identification task

use super::ModuleIdentity;
use crate::port::BusPort;
use crate::spi::{opcodes, LinkStatus, QueueStatus, TransportStatus};
use crate::transport::Driver;

/// Length of the basic identification request (a write)
const BASIC_REQUEST_LEN: usize = 1;
/// Length of the extended identification request (a read)
const EXTENDED_REQUEST_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    EnterProgMode,
    SendRequest,
    WaitInfo,
    Done,
}

/// Which block is expected next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Basic,
    ExtendedPending,
    Extended,
    Finished,
}

/// Reads the module identification in programming mode
///
/// Poll it between driver ticks; it returns the identity once done. A
/// module that does not enter programming mode after one retry is reported
/// with an unknown identity.
#[derive(Debug)]
pub struct IdentifyTask {
    state: State,
    stage: Stage,
    attempts: u8,
    started: u32,
    identity: ModuleIdentity,
}

impl Default for IdentifyTask {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentifyTask {
    /// Create a task in its initial state
    pub fn new() -> Self {
        Self {
            state: State::Init,
            stage: Stage::Basic,
            attempts: 0,
            started: 0,
            identity: ModuleIdentity::default(),
        }
    }

    /// Advance the task by one step
    pub fn poll<P: BusPort, H: FnMut(&[u8])>(
        &mut self,
        driver: &mut Driver<P, H>,
    ) -> Option<ModuleIdentity> {
        if let Some(reply) = driver.take_module_info() {
            self.process_reply(&reply);
        }
        let timeout = driver.config().mode_timeout_ms;
        let elapsed = driver.now_ms().wrapping_sub(self.started);

        match self.state {
            State::Init => {
                self.attempts = 1;
                self.stage = Stage::Basic;
                self.identity = ModuleIdentity::default();
                self.state = State::EnterProgMode;
            }
            State::EnterProgMode => {
                driver.enter_programming_mode();
                self.started = driver.now_ms();
                self.state = State::SendRequest;
            }
            State::SendRequest => {
                if driver.transport_status() == TransportStatus::ProgrammingMode
                    && driver.link_status() == LinkStatus::Ready
                {
                    let request = [0u8; EXTENDED_REQUEST_LEN];
                    let len = if self.stage == Stage::Basic {
                        BASIC_REQUEST_LEN
                    } else {
                        EXTENDED_REQUEST_LEN
                    };
                    if driver
                        .submit_packet(opcodes::SPI_MODULE_INFO, &request[..len])
                        .is_ok()
                    {
                        self.started = driver.now_ms();
                        self.state = State::WaitInfo;
                    }
                } else if elapsed >= timeout {
                    if self.attempts > 0 {
                        self.attempts -= 1;
                        log::warn!("TR module not in programming mode, retrying");
                        self.state = State::EnterProgMode;
                    } else {
                        log::warn!("TR module does not respond");
                        self.state = State::Done;
                    }
                }
            }
            State::WaitInfo => match self.stage {
                Stage::ExtendedPending => {
                    self.stage = Stage::Extended;
                    self.started = driver.now_ms();
                    self.state = State::SendRequest;
                }
                Stage::Finished => {
                    driver.end_programming_mode();
                    self.state = State::Done;
                }
                Stage::Basic | Stage::Extended if elapsed >= timeout => {
                    log::warn!("Identification reply timed out");
                    driver.end_programming_mode();
                    self.state = State::Done;
                }
                _ => {}
            },
            State::Done => {
                if driver.queue_status() == QueueStatus::Free
                    && driver.link_status() == LinkStatus::Ready
                {
                    self.state = State::Init;
                    return Some(self.identity.clone());
                }
            }
        }
        None
    }

    fn process_reply(&mut self, data: &[u8]) {
        match self.stage {
            Stage::Basic => match ModuleIdentity::from_basic_info(data) {
                Some(identity) => {
                    log::debug!("Basic identification: {:02X?}", identity.raw);
                    self.stage = if identity.has_extended_info() {
                        Stage::ExtendedPending
                    } else {
                        Stage::Finished
                    };
                    self.identity = identity;
                }
                None => {
                    log::warn!("Identification block too short ({} bytes)", data.len());
                    self.stage = Stage::Finished;
                }
            },
            Stage::Extended => {
                self.identity.merge_extended_info(data);
                self.stage = Stage::Finished;
            }
            Stage::ExtendedPending | Stage::Finished => {
                log::debug!("Ignoring unexpected {} byte packet", data.len());
            }
        }
    }
}
