//! Intel HEX line parser

use super::hex_pair;
use crate::error::{Error, Result};
use crate::port::FileSource;

/// Capacity of the decoded line buffer; a line reaching it is rejected
pub const LINE_CAPACITY: usize = 32;

/// Record type of a data line
pub const RECORD_DATA: u8 = 0x00;
/// Record type of the end-of-file line
pub const RECORD_EOF: u8 = 0x01;
/// Record type carrying the upper 16 bits of a 32-bit address
pub const RECORD_EXTENDED_LINEAR_ADDRESS: u8 = 0x04;

/// One decoded HEX record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexRecord {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl HexRecord {
    /// Number of data bytes
    pub fn byte_count(&self) -> u8 {
        self.buf[0]
    }

    /// 16-bit load offset
    pub fn address(&self) -> u16 {
        u16::from_be_bytes([self.buf[1], self.buf[2]])
    }

    /// Record type
    pub fn record_type(&self) -> u8 {
        self.buf[3]
    }

    /// Data bytes
    pub fn data(&self) -> &[u8] {
        &self.buf[4..4 + self.byte_count() as usize]
    }

    /// Trailing checksum byte
    pub fn checksum(&self) -> u8 {
        self.buf[self.len - 1]
    }
}

/// Read the next record from a HEX file
///
/// Skips everything up to the next `:`. Returns `Ok(None)` when the stream
/// ends before one is found. A record ends at CR, LF or the end of the
/// stream; a bad checksum, a non-hex character, a byte count that does not
/// match the line or a line of [`LINE_CAPACITY`] bytes or more is a
/// [`Error::FileFormatError`].
pub fn read_line<F: FileSource + ?Sized>(file: &mut F) -> Result<Option<HexRecord>> {
    loop {
        match file.next_byte() {
            None => return Ok(None),
            Some(b':') => break,
            Some(_) => {}
        }
    }

    let mut record = HexRecord {
        buf: [0; LINE_CAPACITY],
        len: 0,
    };
    let mut sum = 0u8;
    loop {
        let hi = match file.next_byte() {
            None | Some(b'\r') | Some(b'\n') => break,
            Some(c) => c,
        };
        let lo = file.next_byte().ok_or(Error::FileFormatError)?;
        let byte = hex_pair(hi, lo).ok_or(Error::FileFormatError)?;
        sum = sum.wrapping_add(byte);
        record.buf[record.len] = byte;
        record.len += 1;
        if record.len >= LINE_CAPACITY {
            log::error!("HEX line too long");
            return Err(Error::FileFormatError);
        }
    }

    if sum != 0 {
        log::error!("HEX line checksum mismatch");
        return Err(Error::FileFormatError);
    }
    if record.len < 5 || record.byte_count() as usize + 5 != record.len {
        log::error!("HEX line length does not match its byte count");
        return Err(Error::FileFormatError);
    }
    Ok(Some(record))
}
