//! Memory block assembler
//!
//! HEX records arrive in arbitrary order and size. The assembler collects
//! them into the 68-byte image of one memory page and reports when that
//! image is ready to be written:
//!
//! ```text
//! image[0..2]    address (or block index) of the first half
//! image[2..34]   first 32 data bytes
//! image[34..36]  address (or block index) of the second half
//! image[36..68]  second 32 data bytes
//! ```
//!
//! A flash page is written as two `FLASH_PGM` packets (`image[0..34]` then
//! `image[34..68]`). A serial EEPROM block uses only the second half; data
//! spilling past it wraps into the first half and is moved into place for
//! the following block. Internal EEPROM records are sent as one
//! `EEPROM_PGM` packet `[address, length, data..]`.
//!
//! Addresses are word addresses: the HEX byte address divided by two.

use super::hex::{HexRecord, RECORD_DATA, RECORD_EXTENDED_LINEAR_ADDRESS};
use crate::error::{Error, Result};

/// Size of a page image
pub const IMAGE_SIZE: usize = 68;
/// Size of one half of the image, header included
pub const HALF_SIZE: usize = 34;
/// Words per memory page
pub const PAGE_WORDS: u32 = 32;

/// First word of the external serial EEPROM
pub const SERIAL_EEPROM_MIN: u32 = 0x0200;
/// Last word of the external serial EEPROM
pub const SERIAL_EEPROM_MAX: u32 = 0x09FF;
/// First word of the licensed flash area
pub const LICENSED_FLASH_MIN: u32 = 0x2C00;
/// Last word of the licensed flash area
pub const LICENSED_FLASH_MAX: u32 = 0x37FF;
/// First word of the main flash area
pub const MAIN_FLASH_MIN: u32 = 0x3A00;
/// Last word of the main flash area
pub const MAIN_FLASH_MAX: u32 = 0x3FFF;
/// First byte of the internal EEPROM
pub const INTERNAL_EEPROM_MIN: u32 = 0xF000;
/// Last byte of the internal EEPROM
pub const INTERNAL_EEPROM_MAX: u32 = 0xF0FF;

/// Largest internal EEPROM record
const EEPROM_MAX_RECORD: u8 = 32;

/// Erased PIC flash word, little endian
const ERASED_WORD: [u8; 2] = [0xFF, 0x3F];

/// Target memory of a data record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// External serial EEPROM
    SerialEeprom,
    /// Main application flash
    MainFlash,
    /// Licensed flash
    LicensedFlash,
    /// MCU internal EEPROM
    InternalEeprom,
}

struct RegionSpan {
    region: Region,
    min: u32,
    max: u32,
}

/// Regions in the order they are matched
const REGIONS: [RegionSpan; 4] = [
    RegionSpan {
        region: Region::SerialEeprom,
        min: SERIAL_EEPROM_MIN,
        max: SERIAL_EEPROM_MAX,
    },
    RegionSpan {
        region: Region::MainFlash,
        min: MAIN_FLASH_MIN,
        max: MAIN_FLASH_MAX,
    },
    RegionSpan {
        region: Region::LicensedFlash,
        min: LICENSED_FLASH_MIN,
        max: LICENSED_FLASH_MAX,
    },
    RegionSpan {
        region: Region::InternalEeprom,
        min: INTERNAL_EEPROM_MIN,
        max: INTERNAL_EEPROM_MAX,
    },
];

impl Region {
    /// Region containing a word address
    pub fn classify(address: u32) -> Option<Self> {
        REGIONS
            .iter()
            .find(|span| (span.min..=span.max).contains(&address))
            .map(|span| span.region)
    }

    /// Last valid address of the region
    pub fn max_address(self) -> u32 {
        REGIONS
            .iter()
            .find(|span| span.region == self)
            .map_or(0, |span| span.max)
    }
}

/// How a ready image has to be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// One or two `FLASH_PGM` packets
    Flash,
    /// One `EEPROM_PGM` packet
    Eeprom,
}

/// Result of one preparation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prepared {
    /// The image holds a block to write
    Ready(BlockKind),
    /// The file is fully processed
    Finished,
}

/// Page image under construction
#[derive(Debug, Clone)]
pub struct MemoryBlock {
    image: [u8; IMAGE_SIZE],
    hi_address: u32,
    block_number: u32,
    pending: u8,
    overflow: bool,
    line: Option<HexRecord>,
}

impl Default for MemoryBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlock {
    /// Create an empty assembler
    pub fn new() -> Self {
        Self {
            image: [0; IMAGE_SIZE],
            hi_address: 0,
            block_number: 0,
            pending: 0,
            overflow: false,
            line: None,
        }
    }

    /// Forget all state before a new file
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The current page image
    pub fn image(&self) -> &[u8; IMAGE_SIZE] {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut [u8; IMAGE_SIZE] {
        &mut self.image
    }

    /// Packets left before the next block may be prepared
    pub fn pending(&self) -> u8 {
        self.pending
    }

    pub(crate) fn set_pending(&mut self, pending: u8) {
        self.pending = pending;
    }

    /// Record that one packet of the image was queued
    pub fn mark_sent(&mut self) {
        self.pending = self.pending.saturating_sub(1);
    }

    /// Payload of the next `FLASH_PGM` packet
    pub fn flash_packet(&self) -> &[u8] {
        if self.pending == 2 {
            &self.image[..HALF_SIZE]
        } else {
            &self.image[HALF_SIZE..]
        }
    }

    /// Payload of the `EEPROM_PGM` packet
    pub fn eeprom_packet(&self) -> &[u8] {
        let len = (self.image[1] as usize + 2).min(IMAGE_SIZE);
        &self.image[..len]
    }

    /// Assemble the next block from HEX records
    ///
    /// `read_line` yields the next record or `None` at the end of the file.
    /// A record that belongs to another page is kept and starts the next
    /// call.
    pub fn prepare<R>(&mut self, mut read_line: R) -> Result<Prepared>
    where
        R: FnMut() -> Result<Option<HexRecord>>,
    {
        if !self.overflow {
            for word in self.image.chunks_exact_mut(2) {
                word.copy_from_slice(&ERASED_WORD);
            }
        }
        self.block_number = 0;

        loop {
            let record = match self.line {
                Some(record) => record,
                None => match read_line()? {
                    Some(record) => {
                        self.line = Some(record);
                        record
                    }
                    None => return Ok(self.finish()),
                },
            };

            match record.record_type() {
                RECORD_DATA => {
                    if let Some(ready) = self.place(&record)? {
                        return Ok(ready);
                    }
                }
                RECORD_EXTENDED_LINEAR_ADDRESS => {
                    if let [hi, lo, ..] = *record.data() {
                        self.hi_address = u32::from(hi) << 24 | u32::from(lo) << 16;
                    }
                }
                _ => {}
            }
            self.line = None;
        }
    }

    fn finish(&mut self) -> Prepared {
        if self.block_number != 0 {
            Prepared::Ready(BlockKind::Flash)
        } else if self.overflow {
            self.move_overflow();
            Prepared::Ready(BlockKind::Flash)
        } else {
            Prepared::Finished
        }
    }

    /// Buffer one data record; `Some` means the image must be written first
    fn place(&mut self, record: &HexRecord) -> Result<Option<Prepared>> {
        let address = (self.hi_address + u32::from(record.address())) / 2;
        if self.overflow {
            self.move_overflow();
        }

        match Region::classify(address) {
            Some(Region::SerialEeprom) => Ok(self.place_serial(address, record)),
            Some(region @ (Region::MainFlash | Region::LicensedFlash)) => {
                self.place_flash(address, region.max_address(), record)
            }
            Some(Region::InternalEeprom) => self.place_eeprom(address, record),
            None => {
                log::error!("Data for address {:#06x} outside all memories", address);
                Err(Error::AddressOutOfRange)
            }
        }
    }

    fn place_serial(&mut self, address: u32, record: &HexRecord) -> Option<Prepared> {
        if self.block_number == 0 {
            let index = ((address - SERIAL_EEPROM_MIN) / PAGE_WORDS) as u16;
            self.image = [0; IMAGE_SIZE];
            self.image[HALF_SIZE..HALF_SIZE + 2].copy_from_slice(&index.to_le_bytes());
            self.image[..2].copy_from_slice(&index.wrapping_add(1).to_le_bytes());
            self.block_number = address / PAGE_WORDS;
            self.pending = 1;
        }
        if address / PAGE_WORDS != self.block_number {
            return Some(Prepared::Ready(BlockKind::Flash));
        }

        // only the low byte of each word is stored
        let count = usize::from(record.byte_count() / 2);
        let mut dest = (address % PAGE_WORDS) as usize + HALF_SIZE + 2;
        if dest + count > IMAGE_SIZE {
            self.overflow = true;
        }
        for &byte in record.data().iter().step_by(2).take(count) {
            self.image[dest] = byte;
            dest += 1;
            if dest == IMAGE_SIZE {
                dest = 2;
            }
        }

        if self.overflow {
            self.line = None;
            return Some(Prepared::Ready(BlockKind::Flash));
        }
        None
    }

    fn place_flash(
        &mut self,
        address: u32,
        max: u32,
        record: &HexRecord,
    ) -> Result<Option<Prepared>> {
        let page = address / PAGE_WORDS;
        let mut count = usize::from(record.byte_count());
        // The top word of each flash region is never programmed
        if address + count as u32 / 2 > max {
            count = (max - address) as usize * 2;
            log::warn!("Data from {:#06x} on dropped", max);
        }

        let start = (address % PAGE_WORDS) as usize * 2;
        if start + count > 2 * PAGE_WORDS as usize {
            log::error!("Record at {:#06x} crosses its flash page", address);
            return Err(Error::AddressOutOfRange);
        }
        if self.block_number != 0 && self.block_number != page {
            return Ok(Some(Prepared::Ready(BlockKind::Flash)));
        }

        self.block_number = page;
        self.pending = 2;
        let base = (page * PAGE_WORDS) as u16;
        self.image[..2].copy_from_slice(&base.to_le_bytes());
        self.image[HALF_SIZE..HALF_SIZE + 2].copy_from_slice(&(base + 0x10).to_le_bytes());
        for (offset, &byte) in record.data()[..count].iter().enumerate() {
            let pos = start + offset;
            let index = if pos < 32 { pos + 2 } else { pos + 4 };
            self.image[index] = byte;
        }
        Ok(None)
    }

    fn place_eeprom(&mut self, address: u32, record: &HexRecord) -> Result<Option<Prepared>> {
        if self.block_number != 0 {
            return Ok(Some(Prepared::Ready(BlockKind::Flash)));
        }

        let count = record.byte_count() / 2;
        if address + u32::from(count) > INTERNAL_EEPROM_MAX + 1 || count > EEPROM_MAX_RECORD {
            log::error!("EEPROM record at {:#06x} out of range", address);
            return Err(Error::AddressOutOfRange);
        }
        self.image[0] = address as u8;
        self.image[1] = count;
        for (i, &byte) in record.data().iter().step_by(2).take(count as usize).enumerate() {
            self.image[2 + i] = byte;
        }
        self.line = None;
        self.pending = 1;
        Ok(Some(Prepared::Ready(BlockKind::Eeprom)))
    }

    /// Move data that spilled into the first half to the second half
    fn move_overflow(&mut self) {
        let (head, tail) = self.image.split_at_mut(HALF_SIZE);
        tail.copy_from_slice(head);
        head.fill(0);
        let index = u16::from_le_bytes([self.image[HALF_SIZE], self.image[HALF_SIZE + 1]]);
        self.block_number = u32::from(index) + SERIAL_EEPROM_MIN / PAGE_WORDS;
        self.image[..2].copy_from_slice(&index.wrapping_add(1).to_le_bytes());
        self.overflow = false;
        self.pending = 1;
    }
}
