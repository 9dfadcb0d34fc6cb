//! Transport-visible status of the TR module and of the driver itself

use super::opcodes;

/// SPI status of the TR module as last observed by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    /// SPI disabled (also reported while the driver is suspended)
    #[default]
    Disabled,
    /// No module answers on the bus
    NoModule,
    /// A frame exchange is in progress
    DataTransferInProgress,
    /// Module SPI does not run in background
    SlowMode,
    /// Module is ready in communication mode
    CommunicationMode,
    /// Module is ready in programming mode
    ProgrammingMode,
    /// Module is ready in debug mode
    DebugMode,
    /// Any other raw status byte (data ready, buffer full, user stop)
    StatusByte(u8),
}

impl TransportStatus {
    /// Decode a raw status byte returned by `SPI_CHECK`
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            opcodes::SPI_DISABLED => Self::Disabled,
            opcodes::NO_MODULE => Self::NoModule,
            opcodes::SPI_DATA_TRANSFER => Self::DataTransferInProgress,
            opcodes::SPI_SLOW_MODE => Self::SlowMode,
            opcodes::COMMUNICATION_MODE => Self::CommunicationMode,
            opcodes::PROGRAMMING_MODE => Self::ProgrammingMode,
            opcodes::DEBUG_MODE => Self::DebugMode,
            other => Self::StatusByte(other),
        }
    }

    /// Raw status byte
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Disabled => opcodes::SPI_DISABLED,
            Self::NoModule => opcodes::NO_MODULE,
            Self::DataTransferInProgress => opcodes::SPI_DATA_TRANSFER,
            Self::SlowMode => opcodes::SPI_SLOW_MODE,
            Self::CommunicationMode => opcodes::COMMUNICATION_MODE,
            Self::ProgrammingMode => opcodes::PROGRAMMING_MODE,
            Self::DebugMode => opcodes::DEBUG_MODE,
            Self::StatusByte(b) => b,
        }
    }

    /// Number of bytes the module has ready for the master, if any
    ///
    /// `0x40` announces a full 64-byte packet, `0x41..=0x7F` announce
    /// 1 to 63 bytes.
    pub fn data_ready_len(self) -> Option<u8> {
        let byte = self.to_byte();
        if byte & opcodes::DATA_READY_MASK != opcodes::DATA_READY {
            return None;
        }
        if byte == opcodes::DATA_READY {
            Some(64)
        } else {
            Some(byte & opcodes::DATA_READY_LEN_MASK)
        }
    }
}

/// What the driver is doing on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkStatus {
    /// No exchange in flight
    #[default]
    Ready,
    /// Reading a packet from the module
    Reading,
    /// Writing a packet to the module
    Writing,
}

impl LinkStatus {
    /// True while a frame exchange is in flight
    pub fn is_busy(self) -> bool {
        self != Self::Ready
    }
}

/// State of the single-slot outbound mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueueStatus {
    /// Slot is free for a new request
    #[default]
    Free,
    /// A request is waiting to be picked up by the transport
    Busy,
}
