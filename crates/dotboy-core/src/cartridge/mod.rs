pub mod header;
pub mod mbc;
pub mod mbc0;
pub mod mbc1;
pub mod mbc3;
pub mod mbc5;

use std::path::Path;

use log::{debug, info};

use self::header::{Header, HeaderError, MapperKind};
use self::mbc::{Mbc, MbcKind};

#[derive(Debug, Clone)]
pub enum CartridgeError {
    /// File open / short read.
    LoadFailed(String),
    /// Type byte names a mapper the core does not implement.
    UnsupportedCartridge(u8),
    InvalidHeader(HeaderError),
}

impl std::fmt::Display for CartridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadFailed(why) => write!(f, "failed to load ROM: {why}"),
            Self::UnsupportedCartridge(code) => {
                write!(f, "unsupported cartridge type {code:#04x}")
            }
            Self::InvalidHeader(err) => write!(f, "invalid cartridge header: {err}"),
        }
    }
}

impl From<HeaderError> for CartridgeError {
    fn from(err: HeaderError) -> Self {
        match err {
            HeaderError::UnsupportedCartridgeType(code) => Self::UnsupportedCartridge(code),
            other => Self::InvalidHeader(other),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SaveError {
    Io(String),
    NotBatteryBacked,
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(why) => write!(f, "save file I/O: {why}"),
            Self::NotBatteryBacked => write!(f, "cartridge has no battery-backed RAM"),
        }
    }
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A loaded ROM image plus its external RAM and bank-switching state.
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub header: Header,
    pub mbc: MbcKind,
}

impl Cartridge {
    pub fn from_rom(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&rom)?;
        let ram = vec![0; header.ram_size.byte_len()];
        let mbc = Self::mapper_for(header.mapper);

        info!(
            "loaded cartridge '{}' ({:?}, {} ROM banks, {} bytes RAM)",
            header.title,
            header.mapper,
            header.rom_size.bank_count(),
            ram.len()
        );

        Ok(Self {
            rom,
            ram,
            header,
            mbc,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, CartridgeError> {
        let rom = std::fs::read(path).map_err(|e| CartridgeError::LoadFailed(e.to_string()))?;
        Self::from_rom(rom)
    }

    fn mapper_for(kind: MapperKind) -> MbcKind {
        match kind {
            MapperKind::RomOnly => MbcKind::Mbc0(mbc0::Mbc0),
            MapperKind::Mbc1 => MbcKind::Mbc1(mbc1::Mbc1::new()),
            MapperKind::Mbc3 => MbcKind::Mbc3(mbc3::Mbc3::new()),
            MapperKind::Mbc5 => MbcKind::Mbc5(mbc5::Mbc5::new()),
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.mbc.read_rom(&self.rom, addr),
            0xA000..=0xBFFF => self.mbc.read_ram(&self.ram, addr),
            _ => {
                debug!("cartridge read outside its windows: {addr:#06x}");
                0xFF
            }
        }
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF => self.mbc.write_rom(addr, value),
            0xA000..=0xBFFF => self.mbc.write_ram(&mut self.ram, addr, value),
            _ => debug!("cartridge write outside its windows: {addr:#06x}"),
        }
    }

    pub fn has_battery(&self) -> bool {
        self.header.has_battery
    }

    /// Re-initialise bank-switching latches. External RAM is deliberately
    /// left alone: it survives a console reset.
    pub fn reset_mapper(&mut self) {
        self.mbc = Self::mapper_for(self.header.mapper);
    }

    /// Persist external RAM as a raw byte file. Not a save state; only the
    /// battery-backed RAM contents.
    pub fn save_ram_to_path(&self, path: &Path) -> Result<(), SaveError> {
        if !self.has_battery() {
            return Err(SaveError::NotBatteryBacked);
        }
        std::fs::write(path, &self.ram)?;
        Ok(())
    }

    pub fn load_ram_from_path(&mut self, path: &Path) -> Result<(), SaveError> {
        if !self.has_battery() {
            return Err(SaveError::NotBatteryBacked);
        }
        if !path.exists() {
            return Ok(());
        }
        let data = std::fs::read(path)?;
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
        Ok(())
    }
}
