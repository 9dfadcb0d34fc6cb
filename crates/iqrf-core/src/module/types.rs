//! Identification data types

use core::fmt;

/// Bytes of the basic identification block kept verbatim
pub const RAW_INFO_LEN: usize = 8;

/// Length of the individual bonding key in the extended block
pub const IBK_LEN: usize = 16;

/// Oldest OS version (major, minor) that provides the extended block
const EXTENDED_INFO_OS: (u8, u8) = (4, 3);

/// Microcontroller of the TR module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum McuType {
    /// Not identified
    #[default]
    Unknown,
    /// TR-xxx-11A (not supported)
    Pic16lf819,
    /// TR-xxx-21A
    Pic16lf88,
    /// TR-31B, TR-52B, TR-53B
    Pic16f886,
    /// TR-52D, TR-54D and later
    Pic16lf1938,
    /// Code not known to this crate
    Other(u8),
}

impl McuType {
    /// Decode the 3-bit MCU code
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::Pic16lf819,
            2 => Self::Pic16lf88,
            3 => Self::Pic16f886,
            4 => Self::Pic16lf1938,
            other => Self::Other(other),
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Pic16lf819 => "PIC16LF819",
            Self::Pic16lf88 => "PIC16LF88",
            Self::Pic16f886 => "PIC16F886",
            Self::Pic16lf1938 => "PIC16LF1938",
            Self::Other(_) => "unknown",
        }
    }
}

/// TR module series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleType {
    /// TR-52D
    #[default]
    Tr52d,
    /// TR-58D-RJ
    Tr58dRj,
    /// TR-72D
    Tr72d,
    /// TR-53D
    Tr53d,
    /// TR-54D
    Tr54d,
    /// TR-55D
    Tr55d,
    /// TR-56D
    Tr56d,
    /// TR-76D
    Tr76d,
    /// Code not known to this crate
    Other(u8),
}

impl ModuleType {
    /// Decode the 4-bit module type code
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::Tr52d,
            1 => Self::Tr58dRj,
            2 => Self::Tr72d,
            3 => Self::Tr53d,
            8 => Self::Tr54d,
            9 => Self::Tr55d,
            10 => Self::Tr56d,
            11 => Self::Tr76d,
            other => Self::Other(other),
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tr52d => "TR-52D",
            Self::Tr58dRj => "TR-58D-RJ",
            Self::Tr72d => "TR-72D",
            Self::Tr53d => "TR-53D",
            Self::Tr54d => "TR-54D",
            Self::Tr55d => "TR-55D",
            Self::Tr56d => "TR-56D",
            Self::Tr76d => "TR-76D",
            Self::Other(_) => "TR-???",
        }
    }

    /// Module keeps up with whole frames clocked without deselect
    pub fn supports_fast_spi(&self) -> bool {
        matches!(self, Self::Tr72d | Self::Tr76d)
    }
}

/// Identification of the connected TR module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleIdentity {
    /// Unique module serial number
    pub module_id: u32,
    /// OS version, major in the high byte and minor in the low byte
    pub os_version: u16,
    /// OS build number
    pub os_build: u16,
    /// Microcontroller
    pub mcu_type: McuType,
    /// FCC certified module
    pub fcc: bool,
    /// Module series
    pub module_type: ModuleType,
    /// First bytes of the identification block as received
    pub raw: [u8; RAW_INFO_LEN],
    /// Individual bonding key, present for OS 4.03 and newer
    pub ibk: Option<[u8; IBK_LEN]>,
}

impl ModuleIdentity {
    /// Decode the basic identification block
    ///
    /// Returns `None` when fewer than [`RAW_INFO_LEN`] bytes were received.
    pub fn from_basic_info(data: &[u8]) -> Option<Self> {
        let raw: [u8; RAW_INFO_LEN] = data.get(..RAW_INFO_LEN)?.try_into().ok()?;
        Some(Self {
            module_id: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            os_version: u16::from(raw[4] / 16) << 8 | u16::from(raw[4] % 16),
            os_build: u16::from_le_bytes([raw[6], raw[7]]),
            mcu_type: McuType::from_code(raw[5] & 0x07),
            fcc: raw[5] & 0x08 != 0,
            module_type: ModuleType::from_code(raw[5] >> 4),
            raw,
            ibk: None,
        })
    }

    /// Merge the extended identification block
    ///
    /// The bonding key sits at bytes 16..32; shorter blocks are ignored.
    pub fn merge_extended_info(&mut self, data: &[u8]) {
        if let Some(ibk) = data.get(16..16 + IBK_LEN) {
            let mut key = [0u8; IBK_LEN];
            key.copy_from_slice(ibk);
            self.ibk = Some(key);
        }
    }

    /// True once a module answered the identification request
    pub fn is_known(&self) -> bool {
        self.mcu_type != McuType::Unknown
    }

    /// OS major version
    pub fn os_major(&self) -> u8 {
        (self.os_version >> 8) as u8
    }

    /// OS minor version
    pub fn os_minor(&self) -> u8 {
        self.os_version as u8
    }

    /// The OS provides the extended identification block
    pub fn has_extended_info(&self) -> bool {
        (self.os_major(), self.os_minor()) >= EXTENDED_INFO_OS
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}), id {:08X}, OS {}.{:02} build {:04X}",
            self.module_type.name(),
            self.mcu_type.name(),
            self.module_id,
            self.os_major(),
            self.os_minor(),
            self.os_build
        )?;
        if self.fcc {
            write!(f, ", FCC certified")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_basic_info() {
        let info = [0x81, 0x0A, 0x2B, 0x3C, 0x43, 0x2C, 0xB8, 0x08, 0, 0, 0, 0, 0, 0, 0, 0];
        let id = ModuleIdentity::from_basic_info(&info).unwrap();
        assert_eq!(id.module_id, 0x810A_2B3C);
        assert_eq!(id.os_version, 0x0403);
        assert_eq!((id.os_major(), id.os_minor()), (4, 3));
        assert_eq!(id.os_build, 0x08B8);
        assert_eq!(id.mcu_type, McuType::Pic16lf1938);
        assert!(id.fcc);
        assert_eq!(id.module_type, ModuleType::Tr72d);
        assert!(id.module_type.supports_fast_spi());
        assert_eq!(id.raw, info[..8]);
        assert!(id.has_extended_info());
        assert!(id.is_known());
    }

    #[test]
    fn test_extended_threshold() {
        let mut info = [0u8; 8];
        info[5] = 0x04;
        info[4] = 0x42;
        assert!(!ModuleIdentity::from_basic_info(&info).unwrap().has_extended_info());
        info[4] = 0x50;
        assert!(ModuleIdentity::from_basic_info(&info).unwrap().has_extended_info());
        info[4] = 0x38;
        assert!(!ModuleIdentity::from_basic_info(&info).unwrap().has_extended_info());
    }

    #[test]
    fn test_short_info_rejected() {
        assert!(ModuleIdentity::from_basic_info(&[1, 2, 3]).is_none());
    }

    #[test]
    fn test_merge_ibk() {
        let mut id = ModuleIdentity::default();
        let mut ext = [0u8; 32];
        for (i, b) in ext[16..].iter_mut().enumerate() {
            *b = i as u8;
        }
        id.merge_extended_info(&ext[..20]);
        assert!(id.ibk.is_none());
        id.merge_extended_info(&ext);
        assert_eq!(id.ibk.unwrap()[15], 15);
    }

    #[test]
    fn test_unknown_codes() {
        assert_eq!(ModuleType::from_code(5), ModuleType::Other(5));
        assert_eq!(McuType::from_code(7), McuType::Other(7));
        assert!(!ModuleIdentity::default().is_known());
    }
}
