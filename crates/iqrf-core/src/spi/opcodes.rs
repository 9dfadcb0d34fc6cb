//! IQRF SPI commands and status codes
//!
//! Byte values exchanged with a TR module on the SPI link, as defined by the
//! IQRF SPI user manual.

// ============================================================================
// SPI commands (first byte of every frame)
// ============================================================================

/// Master checks the SPI status of the TR module (single byte, no frame)
pub const SPI_CHECK: u8 = 0x00;
/// Master reads/writes a data packet from/to the TR module
pub const SPI_WR_RD: u8 = 0xF0;
/// Master reads data from RAM in debug mode
pub const SPI_RAM_READ: u8 = 0xF1;
/// Master reads data from EEPROM in debug mode
pub const SPI_EEPROM_READ: u8 = 0xF2;
/// Master writes data to EEPROM in programming mode
pub const SPI_EEPROM_PGM: u8 = 0xF3;
/// Master reads module identification from the TR module
pub const SPI_MODULE_INFO: u8 = 0xF5;
/// Master writes data to flash in programming mode
pub const SPI_FLASH_PGM: u8 = 0xF6;
/// Master writes plugin data to flash in programming mode
pub const SPI_PLUGIN_PGM: u8 = 0xF9;

// ============================================================================
// SPI status byte values (reply to SPI_CHECK)
// ============================================================================

/// SPI not working (hardware error, no module)
pub const NO_MODULE: u8 = 0xFF;
/// SPI data transfer in progress
pub const SPI_DATA_TRANSFER: u8 = 0xFD;
/// SPI not working (disabled)
pub const SPI_DISABLED: u8 = 0x00;
/// SPI not ready, buffer full, last CRCM ok
///
/// Also the value the module returns as the last byte of a frame whose
/// master checksum was accepted.
pub const SPI_CRCM_OK: u8 = 0x3F;
/// SPI not ready, buffer full, last CRCM error
pub const SPI_CRCM_ERR: u8 = 0x3E;
/// SPI ready, communication mode
pub const COMMUNICATION_MODE: u8 = 0x80;
/// SPI ready, programming mode
pub const PROGRAMMING_MODE: u8 = 0x81;
/// SPI ready, debugging mode
pub const DEBUG_MODE: u8 = 0x82;
/// SPI not working in background
pub const SPI_SLOW_MODE: u8 = 0x83;
/// State after the module application stopped SPI
pub const SPI_USER_STOP: u8 = 0x07;

/// Mask selecting the data-ready marker bits of a status byte
pub const DATA_READY_MASK: u8 = 0xC0;
/// Marker value of a data-ready status (`0x40 | len`, `0x40` meaning 64)
pub const DATA_READY: u8 = 0x40;
/// Mask selecting the pending length of a data-ready status
pub const DATA_READY_LEN_MASK: u8 = 0x3F;

// ============================================================================
// Packet type byte
// ============================================================================

/// PTYPE bit set when the master writes data to the module
pub const PTYPE_WRITE: u8 = 0x80;
