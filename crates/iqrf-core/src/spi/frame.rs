//! SPI packet framing and checksums
//!
//! Every packet exchange has the layout
//!
//! ```text
//! master -> module:  CMD  PTYPE  DATA[0..DLEN]  CRCM  0x00
//! module -> master:  ---  STAT   DATA[0..DLEN]  CRCS  RESULT
//! ```
//!
//! `CRCM` is `0x5F` XORed with `CMD`, `PTYPE` and the data bytes. `CRCS` is
//! `0x5F ^ PTYPE` XORed with the data bytes returned by the module, and
//! `RESULT` is [`SPI_CRCM_OK`](super::opcodes::SPI_CRCM_OK) when the module
//! accepted the master checksum.

use super::opcodes::{PTYPE_WRITE, SPI_CRCM_OK, SPI_WR_RD};

/// Size of the largest frame (64 data bytes + CMD, PTYPE, CRCM, 0)
pub const PACKET_SIZE: usize = 68;

/// Maximum data bytes carried by one frame
pub const MAX_PAYLOAD: usize = 64;

/// Seed of both frame checksums
pub const CRC_SEED: u8 = 0x5F;

/// Master checksum over `CMD`, `PTYPE` and the data bytes
pub fn crc_master(header_and_data: &[u8]) -> u8 {
    header_and_data.iter().fold(CRC_SEED, |crc, &b| crc ^ b)
}

/// Module checksum over the returned data bytes
pub fn crc_slave(ptype: u8, data: &[u8]) -> u8 {
    data.iter().fold(CRC_SEED ^ ptype, |crc, &b| crc ^ b)
}

/// Check a frame as received by the master
///
/// `rx` must hold at least `dlen + 4` bytes. Returns true when the module
/// checksum matches and the module reported a good master checksum.
pub fn check_slave(ptype: u8, rx: &[u8], dlen: usize) -> bool {
    if rx.len() < dlen + 4 {
        return false;
    }
    rx[dlen + 3] == SPI_CRCM_OK && rx[dlen + 2] == crc_slave(ptype, &rx[2..dlen + 2])
}

/// Check a frame as received by the module
///
/// `tx` must hold at least `dlen + 3` bytes: `CMD`, `PTYPE`, data, `CRCM`.
pub fn check_master(tx: &[u8], dlen: usize) -> bool {
    if tx.len() < dlen + 3 {
        return false;
    }
    tx[dlen + 2] == crc_master(&tx[..dlen + 2])
}

/// One frame being clocked through the bus, byte by byte
#[derive(Debug, Clone)]
pub struct Frame {
    tx: [u8; PACKET_SIZE],
    rx: [u8; PACKET_SIZE],
    len: usize,
    cnt: usize,
    dlen: usize,
    attempts: u8,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            tx: [0; PACKET_SIZE],
            rx: [0; PACKET_SIZE],
            len: 0,
            cnt: 0,
            dlen: 0,
            attempts: 0,
        }
    }
}

impl Frame {
    /// Build a frame carrying `data` with the given command and type byte
    ///
    /// `data` longer than [`MAX_PAYLOAD`] is cut to 64 bytes.
    pub fn new(cmd: u8, ptype: u8, data: &[u8], attempts: u8) -> Self {
        let dlen = data.len().min(MAX_PAYLOAD);
        let mut frame = Self {
            dlen,
            len: dlen + 4,
            attempts,
            ..Self::default()
        };
        frame.tx[0] = cmd;
        frame.tx[1] = ptype;
        frame.tx[2..dlen + 2].copy_from_slice(&data[..dlen]);
        frame.tx[dlen + 2] = crc_master(&frame.tx[..dlen + 2]);
        frame
    }

    /// Build the read frame fetching `dlen` bytes announced by the module
    pub fn read(dlen: u8, attempts: u8) -> Self {
        let zeros = [0u8; MAX_PAYLOAD];
        let dlen = (dlen as usize).min(MAX_PAYLOAD);
        Self::new(SPI_WR_RD, dlen as u8, &zeros[..dlen], attempts)
    }

    /// Type byte sent in this frame
    pub fn ptype(&self) -> u8 {
        self.tx[1]
    }

    /// True when the frame writes data to the module
    pub fn is_write(&self) -> bool {
        self.ptype() & PTYPE_WRITE != 0
    }

    /// Data length of the frame
    pub fn dlen(&self) -> usize {
        self.dlen
    }

    /// Total bytes on the wire
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an unused frame
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes already exchanged
    pub fn position(&self) -> usize {
        self.cnt
    }

    /// Next byte the master has to clock out
    pub fn next_tx(&self) -> u8 {
        self.tx[self.cnt.min(PACKET_SIZE - 1)]
    }

    /// Store the byte clocked in and advance; returns true when the frame is complete
    pub fn push_rx(&mut self, byte: u8) -> bool {
        if self.cnt < PACKET_SIZE {
            self.rx[self.cnt] = byte;
            self.cnt += 1;
        }
        self.is_complete()
    }

    /// True once every byte of the frame was exchanged
    pub fn is_complete(&self) -> bool {
        self.cnt == self.len || self.cnt == PACKET_SIZE
    }

    /// Validate the received bytes of a complete frame
    pub fn is_valid(&self) -> bool {
        check_slave(self.ptype(), &self.rx, self.dlen)
    }

    /// Data bytes returned by the module
    pub fn rx_payload(&self) -> &[u8] {
        &self.rx[2..self.dlen + 2]
    }

    /// Bytes sent by the master
    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx[..self.len]
    }

    /// Consume one attempt after a rejected exchange
    ///
    /// Returns true and rewinds the frame when another attempt is left.
    pub fn retry(&mut self) -> bool {
        self.attempts = self.attempts.saturating_sub(1);
        if self.attempts > 0 {
            self.cnt = 0;
            true
        } else {
            false
        }
    }
}
