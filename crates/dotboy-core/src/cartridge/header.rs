//! Cartridge header parsing (fields at 0x0100..0x014F).

/// Mapper families the core can instantiate. The type byte at 0x0147 also
/// encodes RAM/battery presence; that is kept alongside the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    RomOnly,
    Mbc1,
    Mbc3,
    Mbc5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomSize {
    Banks2,
    Banks4,
    Banks8,
    Banks16,
    Banks32,
    Banks64,
    Banks128,
    Banks256,
    Banks512,
}

impl RomSize {
    pub fn bank_count(self) -> usize {
        match self {
            RomSize::Banks2 => 2,
            RomSize::Banks4 => 4,
            RomSize::Banks8 => 8,
            RomSize::Banks16 => 16,
            RomSize::Banks32 => 32,
            RomSize::Banks64 => 64,
            RomSize::Banks128 => 128,
            RomSize::Banks256 => 256,
            RomSize::Banks512 => 512,
        }
    }

    pub fn byte_len(self) -> usize {
        self.bank_count() * 0x4000
    }

    fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        match byte {
            0x00 => Ok(RomSize::Banks2),
            0x01 => Ok(RomSize::Banks4),
            0x02 => Ok(RomSize::Banks8),
            0x03 => Ok(RomSize::Banks16),
            0x04 => Ok(RomSize::Banks32),
            0x05 => Ok(RomSize::Banks64),
            0x06 => Ok(RomSize::Banks128),
            0x07 => Ok(RomSize::Banks256),
            0x08 => Ok(RomSize::Banks512),
            _ => Err(HeaderError::UnsupportedRomSize(byte)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamSize {
    None,
    Kib8,
    Kib32,
    Kib64,
    Kib128,
}

impl RamSize {
    pub fn byte_len(self) -> usize {
        match self {
            RamSize::None => 0,
            RamSize::Kib8 => 0x2000,
            RamSize::Kib32 => 0x8000,
            RamSize::Kib64 => 0x10000,
            RamSize::Kib128 => 0x20000,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        match byte {
            0x00 | 0x01 => Ok(RamSize::None),
            0x02 => Ok(RamSize::Kib8),
            0x03 => Ok(RamSize::Kib32),
            0x04 => Ok(RamSize::Kib128),
            0x05 => Ok(RamSize::Kib64),
            _ => Err(HeaderError::UnsupportedRamSize(byte)),
        }
    }
}

/// CGB flag at 0x0143: bit 7 marks a color-capable ROM, bits 7+6 one that
/// refuses to run on a DMG at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgbSupport {
    DmgOnly,
    CgbCompatible,
    CgbOnly,
}

impl CgbSupport {
    fn from_byte(byte: u8) -> Self {
        if byte & 0xC0 == 0xC0 {
            Self::CgbOnly
        } else if byte & 0x80 != 0 {
            Self::CgbCompatible
        } else {
            Self::DmgOnly
        }
    }

    pub fn is_cgb(self) -> bool {
        !matches!(self, Self::DmgOnly)
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub mapper: MapperKind,
    pub type_code: u8,
    pub rom_size: RomSize,
    pub ram_size: RamSize,
    pub cgb_support: CgbSupport,
    pub has_battery: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    RomTooSmall(usize),
    UnsupportedCartridgeType(u8),
    UnsupportedRomSize(u8),
    UnsupportedRamSize(u8),
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RomTooSmall(len) => write!(f, "ROM image too small for a header ({len} bytes)"),
            Self::UnsupportedCartridgeType(code) => {
                write!(f, "unsupported cartridge type code {code:#04x}")
            }
            Self::UnsupportedRomSize(code) => write!(f, "unsupported ROM size code {code:#04x}"),
            Self::UnsupportedRamSize(code) => write!(f, "unsupported RAM size code {code:#04x}"),
        }
    }
}

const TITLE_OFFSET: usize = 0x0134;
const TITLE_LEN: usize = 15;
const CGB_FLAG_OFFSET: usize = 0x0143;
const TYPE_OFFSET: usize = 0x0147;
const ROM_SIZE_OFFSET: usize = 0x0148;
const RAM_SIZE_OFFSET: usize = 0x0149;

impl Header {
    pub fn parse(rom: &[u8]) -> Result<Self, HeaderError> {
        if rom.len() <= RAM_SIZE_OFFSET {
            return Err(HeaderError::RomTooSmall(rom.len()));
        }

        let type_code = rom[TYPE_OFFSET];
        let (mapper, has_battery) = match type_code {
            0x00 => (MapperKind::RomOnly, false),
            0x01 | 0x02 => (MapperKind::Mbc1, false),
            0x03 => (MapperKind::Mbc1, true),
            0x11 | 0x12 => (MapperKind::Mbc3, false),
            0x0F | 0x10 | 0x13 => (MapperKind::Mbc3, true),
            0x19 | 0x1A | 0x1C | 0x1D => (MapperKind::Mbc5, false),
            0x1B | 0x1E => (MapperKind::Mbc5, true),
            other => return Err(HeaderError::UnsupportedCartridgeType(other)),
        };

        let title = rom[TITLE_OFFSET..TITLE_OFFSET + TITLE_LEN]
            .iter()
            .take_while(|&&b| b != 0)
            .map(|&b| b as char)
            .collect();

        Ok(Header {
            title,
            mapper,
            type_code,
            rom_size: RomSize::from_byte(rom[ROM_SIZE_OFFSET])?,
            ram_size: RamSize::from_byte(rom[RAM_SIZE_OFFSET])?,
            cgb_support: CgbSupport::from_byte(rom[CGB_FLAG_OFFSET]),
            has_battery,
        })
    }
}
