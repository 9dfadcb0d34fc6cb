//! IQRF SPI protocol definitions
//!
//! This module contains the command and status bytes of the IQRF SPI link,
//! the status types exposed by the transport and the frame codec.

mod frame;
mod status;

pub use frame::{
    check_master, check_slave, crc_master, crc_slave, Frame, CRC_SEED, MAX_PAYLOAD, PACKET_SIZE,
};
pub use status::{LinkStatus, QueueStatus, TransportStatus};

pub mod opcodes;
pub use opcodes::*;
