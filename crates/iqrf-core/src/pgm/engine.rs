//! Check and write state machines for programming files

use super::block::{BlockKind, MemoryBlock, Prepared, IMAGE_SIZE};
use super::config::{ConfigAssembler, CONFIG_FILE_LEN};
use super::session::{FileKind, ProgrammingSession};
use super::{hex, plugin, PgmStatus};
use crate::error::{Error, Result};
use crate::port::{BusPort, FileSource};
use crate::spi::{opcodes, LinkStatus, QueueStatus, TransportStatus};
use crate::transport::Driver;

/// Consecutive write stalls before the module is reset
const MAX_STALLS: u8 = 2;

/// Programming-mode entry with a single retry
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModeEntry {
    retries: u8,
    since: u32,
}

impl ModeEntry {
    pub(crate) const fn new() -> Self {
        Self {
            retries: 1,
            since: 0,
        }
    }

    pub(crate) fn enter<P: BusPort, H: FnMut(&[u8])>(&mut self, driver: &mut Driver<P, H>) {
        driver.enter_programming_mode();
        self.since = driver.now_ms();
    }

    /// `Ok(true)` once `ready` holds, an error after the retry is spent
    pub(crate) fn wait<P: BusPort, H: FnMut(&[u8])>(
        &mut self,
        driver: &mut Driver<P, H>,
        ready: bool,
    ) -> Result<bool> {
        if ready {
            return Ok(true);
        }
        if !timed_out(driver, self.since) {
            return Ok(false);
        }
        if self.retries > 0 {
            self.retries -= 1;
            log::warn!("No programming mode, trying again");
            self.enter(driver);
            return Ok(false);
        }
        log::error!("TR module did not enter programming mode");
        Err(Error::HardwareTimeout)
    }
}

pub(crate) fn timed_out<P: BusPort, H: FnMut(&[u8])>(driver: &Driver<P, H>, since: u32) -> bool {
    driver.now_ms().wrapping_sub(since) >= driver.config().mode_timeout_ms
}

/// Module in programming mode with no exchange in flight
pub(crate) fn programming_idle<P: BusPort, H: FnMut(&[u8])>(driver: &Driver<P, H>) -> bool {
    driver.transport_status() == TransportStatus::ProgrammingMode
        && driver.link_status() == LinkStatus::Ready
}

/// A packet can be queued right now
pub(crate) fn can_submit<P: BusPort, H: FnMut(&[u8])>(driver: &Driver<P, H>) -> bool {
    driver.queue_status() == QueueStatus::Free && programming_idle(driver)
}

/// Last packet delivered and nothing left in the mailbox
pub(crate) fn drained<P: BusPort, H: FnMut(&[u8])>(driver: &Driver<P, H>) -> bool {
    driver.queue_status() == QueueStatus::Free && driver.link_status() == LinkStatus::Ready
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CheckPhase {
    Init,
    Plugin,
    Blocks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Init,
    EnterProgMode,
    WaitProgMode,
    WritePlugin,
    WriteBlocks,
    WaitProgEnd,
    ProgEnd,
}

/// Checks and uploads one programming file
///
/// [`check_file`](Self::check_file) validates the file without touching the
/// module; [`write_file`](Self::write_file) programs it. Both must be called
/// repeatedly until they return [`PgmStatus::Success`] or an error, with
/// the file source positioned at its start for the first call.
#[derive(Debug)]
pub struct Programmer {
    session: ProgrammingSession,
    block: MemoryBlock,
    config: ConfigAssembler,
    check: CheckPhase,
    phase: Phase,
    entry: ModeEntry,
    current: BlockKind,
    since: u32,
    stalls: u8,
    outcome: Result<()>,
}

impl Programmer {
    /// Create a programmer for a file of `total` bytes
    pub fn new(kind: FileKind, total: u32) -> Self {
        Self {
            session: ProgrammingSession::new(kind, total),
            block: MemoryBlock::new(),
            config: ConfigAssembler::new(),
            check: CheckPhase::Init,
            phase: Phase::Init,
            entry: ModeEntry::new(),
            current: BlockKind::Flash,
            since: 0,
            stalls: 0,
            outcome: Ok(()),
        }
    }

    /// The file being processed
    pub fn session(&self) -> &ProgrammingSession {
        &self.session
    }

    fn progress(&self) -> PgmStatus {
        PgmStatus::InProgress(self.session.progress())
    }

    fn restart_file(&mut self) {
        self.session.consumed = 0;
        self.block.reset();
        self.config.reset();
    }

    /// Validate the next part of the file
    pub fn check_file<F: FileSource + ?Sized>(&mut self, file: &mut F) -> Result<PgmStatus> {
        match self.check {
            CheckPhase::Init => {
                self.restart_file();
                self.check = match self.session.kind {
                    FileKind::Plugin => CheckPhase::Plugin,
                    FileKind::Hex => CheckPhase::Blocks,
                    FileKind::Config => {
                        if self.session.total < CONFIG_FILE_LEN {
                            log::error!(
                                "Configuration file has {} bytes, expected {}",
                                self.session.total,
                                CONFIG_FILE_LEN
                            );
                            return Err(Error::FileFormatError);
                        }
                        CheckPhase::Blocks
                    }
                };
            }
            CheckPhase::Plugin => {
                let line = plugin::read_line(&mut self.session.reader(file));
                match line {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        self.check = CheckPhase::Init;
                        return Ok(PgmStatus::Success);
                    }
                    Err(e) => {
                        self.check = CheckPhase::Init;
                        return Err(e);
                    }
                }
            }
            CheckPhase::Blocks => {
                let prepared =
                    next_block(&mut self.session, &mut self.block, &mut self.config, file);
                match prepared {
                    Ok(Prepared::Ready(_)) => self.block.set_pending(0),
                    Ok(Prepared::Finished) => {
                        self.check = CheckPhase::Init;
                        return Ok(PgmStatus::Success);
                    }
                    Err(e) => {
                        self.check = CheckPhase::Init;
                        return Err(e);
                    }
                }
            }
        }
        Ok(self.progress())
    }

    /// Program the next part of the file into the module
    ///
    /// The driver must be ticked between calls. The module is left in
    /// communication mode when the call returns a final result.
    pub fn write_file<P, H, F>(&mut self, driver: &mut Driver<P, H>, file: &mut F) -> Result<PgmStatus>
    where
        P: BusPort,
        H: FnMut(&[u8]),
        F: FileSource + ?Sized,
    {
        match self.phase {
            Phase::Init => {
                self.restart_file();
                driver.take_write_error();
                self.entry = ModeEntry::new();
                self.stalls = 0;
                self.outcome = Ok(());
                self.phase = Phase::EnterProgMode;
            }
            Phase::EnterProgMode => {
                self.entry.enter(driver);
                self.phase = Phase::WaitProgMode;
            }
            Phase::WaitProgMode => match self.entry.wait(driver, programming_idle(driver)) {
                Ok(true) => {
                    log::info!("Programming mode entered");
                    self.since = driver.now_ms();
                    self.phase = match self.session.kind {
                        FileKind::Plugin => Phase::WritePlugin,
                        FileKind::Hex | FileKind::Config => Phase::WriteBlocks,
                    };
                }
                Ok(false) => {}
                Err(e) => self.abort(e),
            },
            Phase::WritePlugin | Phase::WriteBlocks => {
                if let Some(e) = driver.take_write_error() {
                    self.finish_writing(driver, Err(e));
                } else if can_submit(driver) {
                    match self.phase {
                        Phase::WritePlugin => self.write_plugin_line(driver, file),
                        _ => self.write_block(driver, file),
                    }
                } else {
                    self.check_stall(driver);
                }
            }
            Phase::WaitProgEnd => {
                if let Some(e) = driver.take_write_error() {
                    log::error!("Last packet rejected by TR module");
                    self.outcome = self.outcome.and(Err(e));
                }
                if programming_idle(driver) {
                    driver.end_programming_mode();
                    self.phase = Phase::ProgEnd;
                } else if timed_out(driver, self.since) {
                    log::warn!("Last packet not confirmed, resetting TR module");
                    if self.outcome.is_ok() {
                        self.outcome = Err(Error::HardwareTimeout);
                    }
                    driver.end_programming_mode();
                    self.phase = Phase::ProgEnd;
                }
            }
            Phase::ProgEnd => {
                if drained(driver) {
                    self.phase = Phase::Init;
                    return match self.outcome {
                        Ok(()) => {
                            log::info!("Programming finished");
                            Ok(PgmStatus::Success)
                        }
                        Err(e) => {
                            log::error!("Programming failed: {}", e);
                            Err(e)
                        }
                    };
                }
            }
        }
        Ok(self.progress())
    }

    fn write_plugin_line<P: BusPort, H: FnMut(&[u8]), F: FileSource + ?Sized>(
        &mut self,
        driver: &mut Driver<P, H>,
        file: &mut F,
    ) {
        let session = &mut self.session;
        let line = driver.suspended(|_| plugin::read_line(&mut session.reader(file)));
        match line {
            Ok(Some(line)) => {
                self.submit(driver, opcodes::SPI_PLUGIN_PGM, &line);
            }
            Ok(None) => self.finish_writing(driver, Ok(())),
            Err(e) => self.finish_writing(driver, Err(e)),
        }
    }

    fn write_block<P: BusPort, H: FnMut(&[u8]), F: FileSource + ?Sized>(
        &mut self,
        driver: &mut Driver<P, H>,
        file: &mut F,
    ) {
        if self.block.pending() == 0 {
            let (session, block, config) = (&mut self.session, &mut self.block, &mut self.config);
            match driver.suspended(|_| next_block(session, block, config, file)) {
                Ok(Prepared::Ready(kind)) => self.current = kind,
                Ok(Prepared::Finished) => self.finish_writing(driver, Ok(())),
                Err(e) => self.finish_writing(driver, Err(e)),
            }
            return;
        }

        let mut packet = [0u8; IMAGE_SIZE];
        let (cmd, len) = match self.current {
            BlockKind::Flash => {
                let data = self.block.flash_packet();
                packet[..data.len()].copy_from_slice(data);
                (opcodes::SPI_FLASH_PGM, data.len())
            }
            BlockKind::Eeprom => {
                let data = self.block.eeprom_packet();
                packet[..data.len()].copy_from_slice(data);
                (opcodes::SPI_EEPROM_PGM, data.len())
            }
        };
        if self.submit(driver, cmd, &packet[..len]) {
            self.block.mark_sent();
        }
    }

    fn submit<P: BusPort, H: FnMut(&[u8])>(
        &mut self,
        driver: &mut Driver<P, H>,
        cmd: u8,
        data: &[u8],
    ) -> bool {
        match driver.submit_packet(cmd, data) {
            Ok(()) => {
                self.since = driver.now_ms();
                self.stalls = 0;
                true
            }
            Err(e) => {
                self.finish_writing(driver, Err(e));
                false
            }
        }
    }

    fn finish_writing<P: BusPort, H: FnMut(&[u8])>(&mut self, driver: &Driver<P, H>, outcome: Result<()>) {
        if let Err(e) = outcome {
            log::error!("Programming file rejected: {}", e);
        }
        self.outcome = outcome;
        self.since = driver.now_ms();
        self.phase = Phase::WaitProgEnd;
    }

    fn check_stall<P: BusPort, H: FnMut(&[u8])>(&mut self, driver: &mut Driver<P, H>) {
        if !timed_out(driver, self.since) {
            return;
        }
        self.stalls += 1;
        if self.stalls < MAX_STALLS {
            log::warn!("TR module not responding, waiting once more");
            self.since = driver.now_ms();
            return;
        }
        log::error!("TR module stalled, resetting");
        driver.reset_module();
        self.abort(Error::HardwareTimeout);
    }

    fn abort(&mut self, e: Error) {
        self.outcome = Err(e);
        self.phase = Phase::ProgEnd;
    }
}

/// Assemble the next block of a HEX or configuration file
fn next_block<F: FileSource + ?Sized>(
    session: &mut ProgrammingSession,
    block: &mut MemoryBlock,
    config: &mut ConfigAssembler,
    file: &mut F,
) -> Result<Prepared> {
    let kind = session.kind;
    let mut reader = session.reader(file);
    match kind {
        FileKind::Config => config.prepare(block, &mut reader),
        FileKind::Hex | FileKind::Plugin => block.prepare(|| hex::read_line(&mut reader)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgm::hex::tests::encode;
    use crate::pgm::hex::{RECORD_DATA, RECORD_EOF};
    use crate::port::SliceSource;

    fn run_check(pgm: &mut Programmer, file: &[u8]) -> (Result<PgmStatus>, u8) {
        let mut src = SliceSource::new(file);
        let mut last = 0;
        for _ in 0..100 {
            match pgm.check_file(&mut src) {
                Ok(PgmStatus::InProgress(p)) => last = p,
                other => return (other, last),
            }
        }
        panic!("check did not finish");
    }

    fn hex_image() -> heapless::Vec<u8, 256> {
        let mut file = heapless::Vec::new();
        let data: [u8; 16] = core::array::from_fn(|i| i as u8);
        file.extend_from_slice(encode(0x7400, RECORD_DATA, &data).as_bytes()).unwrap();
        file.extend_from_slice(encode(0, RECORD_EOF, &[]).as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_check_hex_reaches_100() {
        let file = hex_image();
        let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file), (Ok(PgmStatus::Success), 100));
    }

    #[test]
    fn test_check_hex_bad_checksum() {
        let mut file = hex_image();
        // checksum of the data line
        file[41] = if file[41] == b'0' { b'1' } else { b'0' };
        let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file).0, Err(Error::FileFormatError));
    }

    #[test]
    fn test_check_config_too_short() {
        let file = [0u8; 32];
        let mut pgm = Programmer::new(FileKind::Config, file.len() as u32);
        let mut src = SliceSource::new(&file);
        assert_eq!(pgm.check_file(&mut src), Err(Error::FileFormatError));
    }

    #[test]
    fn test_check_config() {
        let file = [0x11u8; 33];
        let mut pgm = Programmer::new(FileKind::Config, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file), (Ok(PgmStatus::Success), 100));
    }

    #[test]
    fn test_check_plugin() {
        let line = b"000102030405060708090A0B0C0D0E0F10111213\n";
        let mut file = heapless::Vec::<u8, 256>::new();
        file.extend_from_slice(b"#comment\n").unwrap();
        file.extend_from_slice(line).unwrap();
        file.extend_from_slice(line).unwrap();
        let mut pgm = Programmer::new(FileKind::Plugin, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file), (Ok(PgmStatus::Success), 100));

        file.truncate(file.len() - 6);
        let mut pgm = Programmer::new(FileKind::Plugin, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file).0, Err(Error::FileFormatError));
    }

    #[test]
    fn test_check_restarts_after_result() {
        let file = hex_image();
        let mut pgm = Programmer::new(FileKind::Hex, file.len() as u32);
        assert_eq!(run_check(&mut pgm, &file).0, Ok(PgmStatus::Success));
        assert_eq!(run_check(&mut pgm, &file).0, Ok(PgmStatus::Success));
    }
}
