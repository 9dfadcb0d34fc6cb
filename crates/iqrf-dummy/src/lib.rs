//! iqrf-dummy - Emulated TR module for testing
//!
//! This crate provides a bus port that behaves like a TR module on the other
//! end of the SPI link. It answers status polls, accepts and checks frames,
//! serves the identification block in programming mode and records every
//! packet written to it. Faults can be injected to exercise the retry and
//! timeout paths of the driver without real hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use iqrf_core::port::BusPort;
use iqrf_core::spi::{check_master, crc_slave, opcodes, MAX_PAYLOAD, PACKET_SIZE, PTYPE_WRITE};

#[cfg(test)]
mod scenarios;

/// Length of the identification block served by `MODULE_INFO`
pub const INFO_BLOCK_LEN: usize = 32;
/// Length of the basic identification reply
pub const BASIC_INFO_LEN: usize = 16;
/// Duration of the programming-mode entry handshake
const HANDSHAKE_MS: u64 = 500;

/// Configuration for the emulated module
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// First 8 bytes of the identification block
    pub identity: [u8; 8],
    /// Individual bonding key returned in the extended block
    pub ibk: [u8; 16],
    /// Echo every packet written in communication mode back to the host
    pub echo: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            // id 81001234, OS 4.03, TR-72D with PIC16LF1938, build 0x08B8
            identity: [0x81, 0x00, 0x12, 0x34, 0x43, 0x24, 0xB8, 0x08],
            ibk: core::array::from_fn(|i| 0xA0 + i as u8),
            echo: true,
        }
    }
}

/// Operating mode of the emulated module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Supply switched off
    Off,
    /// Normal operation
    Communication,
    /// Upload mode entered through the handshake
    Programming,
}

/// Packet accepted by the emulated module
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// SPI command
    pub cmd: u8,
    /// Data bytes
    pub data: Vec<u8>,
}

/// Emulated TR module
///
/// Time is virtual: it only advances through the delay functions, so tests
/// run as fast as the host allows.
#[cfg(feature = "alloc")]
pub struct DummyModule {
    config: DummyConfig,
    mode: Mode,
    clock_us: u64,
    frame: [u8; PACKET_SIZE],
    pos: usize,
    dlen: usize,
    reply: [u8; MAX_PAYLOAD],
    outbox: Option<Vec<u8>>,
    packets: Vec<Packet>,
    rejects: u32,
    stall_after: Option<usize>,
    programmed: usize,
    stalled: bool,
    dead: bool,
    selects: u32,
}

#[cfg(feature = "alloc")]
impl DummyModule {
    /// Create a module with the given configuration, powered off
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            mode: Mode::Off,
            clock_us: 0,
            frame: [0; PACKET_SIZE],
            pos: 0,
            dlen: 0,
            reply: [0; MAX_PAYLOAD],
            outbox: None,
            packets: Vec::new(),
            rejects: 0,
            stall_after: None,
            programmed: 0,
            stalled: false,
            dead: false,
            selects: 0,
        }
    }

    /// Create a module with the default configuration (TR-72D, OS 4.03)
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Every packet accepted so far, in order
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Accepted packets carrying the given command
    pub fn packets_with(&self, cmd: u8) -> impl Iterator<Item = &Packet> + '_ {
        self.packets.iter().filter(move |p| p.cmd == cmd)
    }

    /// Forget the recorded packets
    pub fn clear_packets(&mut self) {
        self.packets.clear();
    }

    /// Answer the next `count` frames with a master checksum error
    pub fn reject_frames(&mut self, count: u32) {
        self.rejects = count;
    }

    /// Stop answering after `count` programming packets
    ///
    /// The module reports a transfer in progress until it is power-cycled.
    pub fn stall_after(&mut self, count: usize) {
        self.stall_after = Some(count);
    }

    /// Move the virtual clock to `ms`
    ///
    /// [`now_ms`](BusPort::now_ms) wraps at `u32::MAX` like a hardware
    /// millisecond counter.
    pub fn set_clock_ms(&mut self, ms: u32) {
        self.clock_us = u64::from(ms) * 1000;
    }

    /// Make the bus read back `0xFF` as if no module were fitted
    pub fn set_dead(&mut self, dead: bool) {
        self.dead = dead;
    }

    /// Queue data the module pushes to the host
    pub fn push_to_host(&mut self, data: &[u8]) {
        self.outbox = Some(data[..data.len().min(MAX_PAYLOAD)].to_vec());
    }

    /// Number of times chip select was asserted
    pub fn selects(&self) -> u32 {
        self.selects
    }

    /// The full identification block
    pub fn info_block(&self) -> [u8; INFO_BLOCK_LEN] {
        let mut block = [0u8; INFO_BLOCK_LEN];
        block[..8].copy_from_slice(&self.config.identity);
        block[16..].copy_from_slice(&self.config.ibk);
        block
    }

    fn status(&self) -> u8 {
        if self.stalled {
            return opcodes::SPI_DATA_TRANSFER;
        }
        if let Some(data) = &self.outbox {
            return if data.len() >= MAX_PAYLOAD {
                opcodes::DATA_READY
            } else {
                opcodes::DATA_READY | data.len() as u8
            };
        }
        match self.mode {
            Mode::Off => opcodes::NO_MODULE,
            Mode::Communication => opcodes::COMMUNICATION_MODE,
            Mode::Programming => opcodes::PROGRAMMING_MODE,
        }
    }

    /// Prepare the data bytes clocked out during the current frame
    fn load_reply(&mut self) {
        self.reply.fill(0);
        if self.frame[1] & PTYPE_WRITE != 0 {
            return;
        }
        let dlen = self.dlen;
        match self.frame[0] {
            opcodes::SPI_WR_RD => {
                if let Some(data) = &self.outbox {
                    let n = data.len().min(dlen);
                    self.reply[..n].copy_from_slice(&data[..n]);
                }
            }
            opcodes::SPI_MODULE_INFO if self.mode == Mode::Programming => {
                let block = self.info_block();
                let n = block.len().min(dlen);
                self.reply[..n].copy_from_slice(&block[..n]);
            }
            _ => {}
        }
    }

    fn accept_frame(&mut self) -> bool {
        if !check_master(&self.frame, self.dlen) {
            log::debug!("Dummy: bad master checksum");
            return false;
        }
        if self.rejects > 0 {
            self.rejects -= 1;
            log::debug!("Dummy: rejecting frame {:#04x}", self.frame[0]);
            return false;
        }
        true
    }

    fn process_frame(&mut self) {
        let cmd = self.frame[0];
        let write = self.frame[1] & PTYPE_WRITE != 0;
        let data = &self.frame[2..self.dlen + 2];

        if !write {
            if cmd == opcodes::SPI_WR_RD {
                self.outbox = None;
            }
            return;
        }

        log::trace!("Dummy: packet {:#04x}, {} bytes", cmd, data.len());
        self.packets.push(Packet {
            cmd,
            data: data.to_vec(),
        });

        match (cmd, self.mode) {
            (opcodes::SPI_WR_RD, Mode::Communication) if self.config.echo => {
                self.outbox = Some(data.to_vec());
            }
            (opcodes::SPI_MODULE_INFO, Mode::Programming) => {
                self.outbox = Some(self.info_block()[..BASIC_INFO_LEN].to_vec());
            }
            (
                opcodes::SPI_FLASH_PGM | opcodes::SPI_EEPROM_PGM | opcodes::SPI_PLUGIN_PGM,
                Mode::Programming,
            ) => {
                self.programmed += 1;
                if self.stall_after.is_some_and(|n| self.programmed >= n) {
                    log::debug!("Dummy: stalling after {} packets", self.programmed);
                    self.stalled = true;
                }
            }
            _ => {}
        }
    }

    fn restart(&mut self, mode: Mode) {
        self.mode = mode;
        self.pos = 0;
        self.outbox = None;
        self.stalled = false;
        self.programmed = 0;
    }
}

#[cfg(feature = "alloc")]
impl BusPort for DummyModule {
    fn transfer_byte(&mut self, tx: u8) -> u8 {
        if self.dead || self.mode == Mode::Off {
            return opcodes::NO_MODULE;
        }

        let pos = self.pos;
        if pos == 0 {
            let status = self.status();
            if tx != opcodes::SPI_CHECK {
                self.frame[0] = tx;
                self.pos = 1;
            }
            return status;
        }

        self.frame[pos] = tx;
        self.pos += 1;
        if pos == 1 {
            self.dlen = usize::from(tx & !PTYPE_WRITE).min(MAX_PAYLOAD);
            self.load_reply();
            return self.status();
        }

        let dlen = self.dlen;
        if pos < dlen + 2 {
            self.reply[pos - 2]
        } else if pos == dlen + 2 {
            crc_slave(self.frame[1], &self.reply[..dlen])
        } else {
            self.pos = 0;
            if self.accept_frame() {
                self.process_frame();
                opcodes::SPI_CRCM_OK
            } else {
                opcodes::SPI_CRCM_ERR
            }
        }
    }

    fn select(&mut self) {
        self.selects += 1;
    }

    fn deselect(&mut self) {}

    fn power_on(&mut self) {
        if self.mode == Mode::Off {
            self.restart(Mode::Communication);
        }
    }

    fn power_off(&mut self) {
        self.restart(Mode::Off);
    }

    fn enter_programming_mode(&mut self) {
        self.clock_us += HANDSHAKE_MS * 1000;
        self.restart(Mode::Programming);
    }

    fn now_ms(&self) -> u32 {
        (self.clock_us / 1000) as u32
    }

    fn delay_ms(&mut self, ms: u32) {
        self.clock_us += u64::from(ms) * 1000;
    }

    fn delay_us(&mut self, us: u32) {
        self.clock_us += u64::from(us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iqrf_core::spi::{crc_master, Frame};

    fn clock_frame(module: &mut DummyModule, frame: &mut Frame) {
        while !frame.is_complete() {
            let rx = module.transfer_byte(frame.next_tx());
            frame.push_rx(rx);
        }
    }

    #[test]
    fn test_status_by_mode() {
        let mut module = DummyModule::new_default();
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::NO_MODULE);
        module.power_on();
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::COMMUNICATION_MODE);
        module.enter_programming_mode();
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::PROGRAMMING_MODE);
        module.set_dead(true);
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::NO_MODULE);
    }

    #[test]
    fn test_write_frame_accepted_and_echoed() {
        let mut module = DummyModule::new_default();
        module.power_on();
        let mut frame = Frame::new(opcodes::SPI_WR_RD, 0x83, &[1, 2, 3], 3);
        clock_frame(&mut module, &mut frame);
        assert!(frame.is_valid());
        assert_eq!(module.packets().len(), 1);
        assert_eq!(module.packets()[0].data, [1, 2, 3]);
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), 0x43);

        let mut read = Frame::read(3, 1);
        clock_frame(&mut module, &mut read);
        assert!(read.is_valid());
        assert_eq!(read.rx_payload(), &[1, 2, 3]);
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::COMMUNICATION_MODE);
    }

    #[test]
    fn test_corrupted_frame_rejected() {
        let mut module = DummyModule::new_default();
        module.power_on();
        let data = [0x10, 0x20];
        let bad_crc = crc_master(&[opcodes::SPI_WR_RD, 0x82, 0x10, 0x20]) ^ 1;
        let bytes = [opcodes::SPI_WR_RD, 0x82, 0x10, 0x20, bad_crc, 0];
        let mut last = 0;
        for b in bytes {
            last = module.transfer_byte(b);
        }
        assert_eq!(last, opcodes::SPI_CRCM_ERR);
        assert!(module.packets().is_empty());

        module.reject_frames(1);
        let mut frame = Frame::new(opcodes::SPI_WR_RD, 0x82, &data, 3);
        clock_frame(&mut module, &mut frame);
        assert!(!frame.is_valid());
        assert!(frame.retry());
        clock_frame(&mut module, &mut frame);
        assert!(frame.is_valid());
        assert_eq!(module.packets().len(), 1);
    }

    #[test]
    fn test_full_packet_status() {
        let mut module = DummyModule::new_default();
        module.power_on();
        module.push_to_host(&[0x55; 64]);
        assert_eq!(module.transfer_byte(opcodes::SPI_CHECK), opcodes::DATA_READY);
    }
}
