use super::mbc::{read_banked_ram, write_banked_ram, Mbc};

/// ROM-only cartridge: 32 KiB flat, optional unbanked RAM.
#[derive(Default)]
pub struct Mbc0;

impl Mbc for Mbc0 {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        rom.get(addr as usize).copied().unwrap_or(0xFF)
    }

    fn write_rom(&mut self, _addr: u16, _value: u8) {}

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        read_banked_ram(ram, 0, addr)
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, value: u8) {
        write_banked_ram(ram, 0, addr, value);
    }
}
