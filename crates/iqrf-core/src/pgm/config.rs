//! TR configuration (`.trcnfg`) assembler
//!
//! A configuration file holds 32 bytes of the configuration flash block
//! followed by the RFPGM byte. The block is written as one flash page at
//! [`CONFIG_FLASH_LO`]/[`CONFIG_FLASH_HI`], each byte stored as a `RETLW`
//! instruction word, then the RFPGM byte goes to internal EEPROM.

use super::block::{BlockKind, MemoryBlock, Prepared, HALF_SIZE};
use crate::error::{Error, Result};
use crate::port::FileSource;

/// Flash address of the first half of the configuration block
pub const CONFIG_FLASH_LO: u16 = 0x37C0;
/// Flash address of the second half of the configuration block
pub const CONFIG_FLASH_HI: u16 = 0x37D0;
/// Internal EEPROM address of the RFPGM configuration byte
pub const RFPGM_CFG_ADDR: u8 = 0xC1;
/// Bytes in a configuration file
pub const CONFIG_FILE_LEN: u32 = 33;

/// High byte of a `RETLW k` instruction
const RETLW: u8 = 0x34;
const CONFIG_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Load,
    Control,
    Finish,
}

/// Three-step configuration image builder
#[derive(Debug, Clone)]
pub struct ConfigAssembler {
    stage: Stage,
    rfpgm: u8,
}

impl Default for ConfigAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigAssembler {
    /// Create an assembler at its first step
    pub fn new() -> Self {
        Self {
            stage: Stage::Load,
            rfpgm: 0,
        }
    }

    /// Restart at the first step
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Build the next image into `block`
    pub fn prepare<F: FileSource + ?Sized>(
        &mut self,
        block: &mut MemoryBlock,
        file: &mut F,
    ) -> Result<Prepared> {
        match self.stage {
            Stage::Load => {
                let image = block.image_mut();
                image[..2].copy_from_slice(&CONFIG_FLASH_LO.to_le_bytes());
                image[HALF_SIZE..HALF_SIZE + 2].copy_from_slice(&CONFIG_FLASH_HI.to_le_bytes());
                for i in 0..CONFIG_BYTES {
                    let byte = file.next_byte().ok_or(Error::FileFormatError)?;
                    let pos = if i < CONFIG_BYTES / 2 { 2 * i + 2 } else { 2 * i + 4 };
                    image[pos] = byte;
                    image[pos + 1] = RETLW;
                }
                self.rfpgm = file.next_byte().ok_or(Error::FileFormatError)?;
                block.set_pending(2);
                self.stage = Stage::Control;
                Ok(Prepared::Ready(BlockKind::Flash))
            }
            Stage::Control => {
                let image = block.image_mut();
                image[0] = RFPGM_CFG_ADDR;
                image[1] = 1;
                image[2] = self.rfpgm;
                block.set_pending(1);
                self.stage = Stage::Finish;
                Ok(Prepared::Ready(BlockKind::Eeprom))
            }
            Stage::Finish => {
                self.stage = Stage::Load;
                Ok(Prepared::Finished)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::SliceSource;

    fn config_file() -> [u8; 33] {
        core::array::from_fn(|i| i as u8 + 0x10)
    }

    #[test]
    fn test_config_sequence() {
        let data = config_file();
        let mut src = SliceSource::new(&data);
        let mut block = MemoryBlock::new();
        let mut cfg = ConfigAssembler::new();

        assert_eq!(cfg.prepare(&mut block, &mut src), Ok(Prepared::Ready(BlockKind::Flash)));
        assert_eq!(block.pending(), 2);
        let first = block.flash_packet();
        assert_eq!(&first[..4], &[0xC0, 0x37, 0x10, 0x34]);
        assert_eq!(&first[32..34], &[0x1F, 0x34]);
        block.mark_sent();
        let second = block.flash_packet();
        assert_eq!(&second[..4], &[0xD0, 0x37, 0x20, 0x34]);
        assert_eq!(&second[32..34], &[0x2F, 0x34]);
        block.mark_sent();

        assert_eq!(cfg.prepare(&mut block, &mut src), Ok(Prepared::Ready(BlockKind::Eeprom)));
        assert_eq!(block.eeprom_packet(), &[RFPGM_CFG_ADDR, 1, 0x30]);
        assert_eq!(cfg.prepare(&mut block, &mut src), Ok(Prepared::Finished));
    }

    #[test]
    fn test_truncated_config() {
        let data = config_file();
        let mut src = SliceSource::new(&data[..32]);
        let mut block = MemoryBlock::new();
        let mut cfg = ConfigAssembler::new();
        assert_eq!(cfg.prepare(&mut block, &mut src), Err(Error::FileFormatError));
    }
}
