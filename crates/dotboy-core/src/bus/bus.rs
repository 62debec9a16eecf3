use log::debug;

use crate::apu::Apu;
use crate::bootrom::BootRom;
use crate::cartridge::header::CgbSupport;
use crate::cartridge::Cartridge;
use crate::dma::{Hdma, OamDma};
use crate::input::{Button, Joypad};
use crate::ppu::{Mode, Ppu};
use crate::serial::Serial;
use crate::timer::Timer;
use crate::LCD_HEIGHT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulationMode {
    Dmg,
    Cgb,
}

/// The memory-mapped bus: every RAM arena, every subsystem, one uniform
/// 16-bit read/write pair. Interrupt requests meet in `iflag` here.
pub struct Bus {
    pub cart: Cartridge,
    pub mode: EmulationMode,
    pub ppu: Ppu,
    pub apu: Apu,
    pub timer: Timer,
    pub input: Joypad,
    pub serial: Serial,
    pub bootrom: BootRom,

    /// 8 banks of 4 KiB; bank 0 fixed, bank N switchable via SVBK.
    pub wram: [u8; 0x8000],
    /// 2 banks of 8 KiB, selected by VBK (CGB).
    pub vram: [u8; 0x4000],
    pub oam: [u8; 0xA0],
    pub io: [u8; 0x80],
    pub hram: [u8; 0x7F],
    pub ie: u8,
    pub iflag: u8,

    pub oam_dma: OamDma,
    pub hdma: Hdma,

    vram_bank: u8,
    wram_bank: u8,
    double_speed: bool,
    speed_switch_prepare: bool,
}

const SB: usize = 0x01;
const SC: usize = 0x02;
const STAT: usize = 0x41;
const DMA: usize = 0x46;

impl Bus {
    pub fn new(cart: Cartridge) -> Self {
        Self::build(cart, BootRom::absent())
    }

    pub fn with_boot_rom(cart: Cartridge, image: Vec<u8>) -> Self {
        Self::build(cart, BootRom::new(Some(image)))
    }

    fn build(cart: Cartridge, bootrom: BootRom) -> Self {
        let mode = match cart.header.cgb_support {
            CgbSupport::DmgOnly => EmulationMode::Dmg,
            CgbSupport::CgbCompatible | CgbSupport::CgbOnly => EmulationMode::Cgb,
        };

        let mut bus = Self {
            cart,
            mode,
            ppu: Ppu::new(),
            apu: Apu::new(),
            timer: Timer::new(),
            input: Joypad::new(),
            serial: Serial::new(),
            bootrom,
            wram: [0; 0x8000],
            vram: [0; 0x4000],
            oam: [0; 0xA0],
            io: [0; 0x80],
            hram: [0; 0x7F],
            ie: 0,
            iflag: 0,
            oam_dma: OamDma::default(),
            hdma: Hdma::default(),
            vram_bank: 0,
            wram_bank: 1,
            double_speed: false,
            speed_switch_prepare: false,
        };
        if !bus.bootrom.installed() {
            bus.seed_post_boot_io();
        }
        bus
    }

    /// I/O state the boot ROM would have left behind.
    fn seed_post_boot_io(&mut self) {
        self.io[0x40] = 0x91; // LCDC: panel + background on
        self.io[0x41] = 0x85;
        self.io[0x47] = 0xFC; // BGP
        self.iflag = 0x01;
    }

    /// Re-initialise everything except the cartridge's external RAM.
    pub fn reset(&mut self) {
        self.cart.reset_mapper();
        self.ppu = Ppu::new();
        self.apu = Apu::new();
        self.timer = Timer::new();
        self.input = Joypad::new();
        self.serial = Serial::new();
        self.bootrom.relock();
        self.wram.fill(0);
        self.vram.fill(0);
        self.oam.fill(0);
        self.io.fill(0);
        self.hram.fill(0);
        self.ie = 0;
        self.iflag = 0;
        self.oam_dma = OamDma::default();
        self.hdma = Hdma::default();
        self.vram_bank = 0;
        self.wram_bank = 1;
        self.double_speed = false;
        self.speed_switch_prepare = false;
        if !self.bootrom.installed() {
            self.seed_post_boot_io();
        }
    }

    #[inline]
    pub fn is_cgb(&self) -> bool {
        self.mode == EmulationMode::Cgb
    }

    #[inline]
    pub fn double_speed(&self) -> bool {
        self.double_speed
    }

    /// Dots per machine cycle: 4 at base speed, 2 in CGB double speed.
    #[inline]
    pub fn machine_cycle_scaler(&self) -> u16 {
        if self.double_speed {
            2
        } else {
            4
        }
    }

    /// KEY1 handshake half: STOP calls this and clears the divider when it
    /// reports a switch happened.
    pub fn try_cgb_speed_switch(&mut self) -> bool {
        if !self.is_cgb() || !self.speed_switch_prepare {
            return false;
        }
        self.speed_switch_prepare = false;
        self.double_speed = !self.double_speed;
        true
    }

    pub fn clear_divider(&mut self) {
        self.timer.write_div();
    }

    pub fn set_joypad_button(&mut self, button: Button, pressed: bool) {
        self.input.set_button(button, pressed, &mut self.iflag);
    }

    fn lcd_enabled(&self) -> bool {
        self.io[0x40] & 0x80 != 0
    }

    /// VRAM locks against the CPU during Drawing; OAM during OAM scan and
    /// Drawing. Only while the panel is on.
    fn ppu_blocks_cpu(&self, addr: u16) -> bool {
        if !self.lcd_enabled() {
            return false;
        }
        match addr {
            0x8000..=0x9FFF => self.ppu.mode() == Mode::Drawing,
            0xFE00..=0xFE9F => matches!(self.ppu.mode(), Mode::OamScan | Mode::Drawing),
            _ => false,
        }
    }

    pub fn read8(&mut self, addr: u16) -> u8 {
        if self.oam_dma.blocks_cpu_addr(addr) {
            return 0xFF;
        }
        if self.ppu_blocks_cpu(addr) {
            return 0xFF;
        }
        self.read8_direct(addr)
    }

    pub fn write8(&mut self, addr: u16, value: u8) {
        if self.oam_dma.blocks_cpu_addr(addr) {
            return;
        }
        if self.ppu_blocks_cpu(addr) {
            return;
        }
        self.write8_direct(addr, value);
    }

    #[inline]
    fn wram_index(&self, addr: u16) -> usize {
        // Echo RAM folds down onto 0xC000..0xDDFF.
        let addr = if addr >= 0xE000 { addr - 0x2000 } else { addr };
        match addr {
            0xC000..=0xCFFF => (addr - 0xC000) as usize,
            _ => self.selected_wram_bank() * 0x1000 + (addr - 0xD000) as usize,
        }
    }

    fn selected_wram_bank(&self) -> usize {
        if self.is_cgb() {
            self.wram_bank as usize
        } else {
            1
        }
    }

    fn selected_vram_bank(&self) -> usize {
        if self.is_cgb() {
            self.vram_bank as usize
        } else {
            0
        }
    }

    pub(crate) fn read8_direct(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => {
                if self.bootrom.maps(addr) {
                    self.bootrom.read(addr)
                } else {
                    self.cart.read(addr)
                }
            }
            0x8000..=0x9FFF => {
                self.vram[self.selected_vram_bank() * 0x2000 + (addr - 0x8000) as usize]
            }
            0xA000..=0xBFFF => self.cart.read(addr),
            0xC000..=0xFDFF => self.wram[self.wram_index(addr)],
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => {
                debug!("read from unusable region {addr:#06x}");
                0xFF
            }
            0xFF00..=0xFF7F => self.io_read(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie,
        }
    }

    pub(crate) fn write8_direct(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7FFF | 0xA000..=0xBFFF => self.cart.write(addr, value),
            0x8000..=0x9FFF => {
                let index = self.selected_vram_bank() * 0x2000 + (addr - 0x8000) as usize;
                self.vram[index] = value;
            }
            0xC000..=0xFDFF => {
                let index = self.wram_index(addr);
                self.wram[index] = value;
            }
            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = value,
            0xFEA0..=0xFEFF => debug!("write to unusable region {addr:#06x}"),
            0xFF00..=0xFF7F => self.io_write(addr, value),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = value,
            0xFFFF => self.ie = value,
        }
    }

    fn io_read(&mut self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.input.read_joyp(),
            0xFF04 => self.timer.read_div(),
            0xFF05 => self.timer.read_tima(),
            0xFF06 => self.timer.read_tma(),
            0xFF07 => self.timer.read_tac(),
            0xFF0F => self.iflag | 0xE0,
            0xFF10..=0xFF3F => self.apu.read_register(addr),
            0xFF4D => self.read_key1(),
            0xFF4F => self.read_vbk(),
            0xFF50 => self.bootrom.read_latch(),
            0xFF51 => self.cgb_or_ff(|bus| (bus.hdma.src >> 8) as u8),
            0xFF52 => self.cgb_or_ff(|bus| bus.hdma.src as u8),
            0xFF53 => self.cgb_or_ff(|bus| ((bus.hdma.dst >> 8) & 0x1F) as u8),
            0xFF54 => self.cgb_or_ff(|bus| bus.hdma.dst as u8),
            0xFF55 => self.cgb_or_ff(|bus| bus.hdma.read_status()),
            0xFF68 => self.cgb_or_ff(|bus| bus.ppu.read_bcps()),
            0xFF69 => self.cgb_or_ff(|bus| bus.ppu.read_bcpd()),
            0xFF6A => self.cgb_or_ff(|bus| bus.ppu.read_ocps()),
            0xFF6B => self.cgb_or_ff(|bus| bus.ppu.read_ocpd()),
            0xFF70 => self.read_svbk(),
            _ => self.io[(addr - 0xFF00) as usize],
        }
    }

    fn io_write(&mut self, addr: u16, value: u8) {
        let index = (addr - 0xFF00) as usize;
        match addr {
            0xFF00 => self.input.write_joyp(value),
            0xFF02 => {
                self.io[index] = value;
                // Test-ROM convention: SB then SC with bit 7 set clocks the
                // byte out.
                if value & 0x80 != 0 {
                    self.serial.start_transfer(self.io[SB]);
                } else {
                    self.serial.cancel_transfer();
                }
            }
            0xFF04 => self.timer.write_div(),
            0xFF05 => self.timer.write_tima(value),
            0xFF06 => self.timer.write_tma(value),
            0xFF07 => self.timer.write_tac(value),
            0xFF0F => self.iflag = value & 0x1F,
            0xFF10..=0xFF3F => self.apu.write_register(addr, value),
            // STAT: only the interrupt-source enables are writable.
            0xFF41 => self.io[index] = (self.io[index] & 0x87) | (value & 0x78),
            0xFF44 => debug!("ignored write to LY"),
            0xFF46 => {
                self.io[index] = value;
                self.oam_dma.start(value);
            }
            0xFF4D => {
                if self.is_cgb() {
                    self.speed_switch_prepare = value & 0x01 != 0;
                }
            }
            0xFF4F => {
                if self.is_cgb() {
                    self.vram_bank = value & 0x01;
                }
            }
            0xFF50 => self.bootrom.write_latch(value),
            0xFF51 => self.cgb_hdma_write(|hdma| hdma.write_src_high(value)),
            0xFF52 => self.cgb_hdma_write(|hdma| hdma.write_src_low(value)),
            0xFF53 => self.cgb_hdma_write(|hdma| hdma.write_dst_high(value)),
            0xFF54 => self.cgb_hdma_write(|hdma| hdma.write_dst_low(value)),
            0xFF55 => self.start_hdma(value),
            0xFF68 => {
                if self.is_cgb() {
                    self.ppu.write_bcps(value);
                }
            }
            0xFF69 => {
                if self.is_cgb() {
                    self.ppu.write_bcpd(value);
                }
            }
            0xFF6A => {
                if self.is_cgb() {
                    self.ppu.write_ocps(value);
                }
            }
            0xFF6B => {
                if self.is_cgb() {
                    self.ppu.write_ocpd(value);
                }
            }
            0xFF70 => {
                if self.is_cgb() {
                    let bank = value & 0x07;
                    self.wram_bank = if bank == 0 { 1 } else { bank };
                }
            }
            _ => self.io[index] = value,
        }
    }

    fn cgb_or_ff(&mut self, read: impl FnOnce(&mut Self) -> u8) -> u8 {
        if self.is_cgb() {
            read(self)
        } else {
            0xFF
        }
    }

    fn cgb_hdma_write(&mut self, write: impl FnOnce(&mut Hdma)) {
        if self.is_cgb() {
            write(&mut self.hdma);
        }
    }

    fn read_key1(&self) -> u8 {
        if !self.is_cgb() {
            return 0xFF;
        }
        ((self.double_speed as u8) << 7) | 0x7E | self.speed_switch_prepare as u8
    }

    fn read_vbk(&self) -> u8 {
        if !self.is_cgb() {
            return 0xFF;
        }
        0xFE | self.vram_bank
    }

    fn read_svbk(&self) -> u8 {
        if !self.is_cgb() {
            return 0xFF;
        }
        0xF8 | self.wram_bank
    }

    /// FF55: general-purpose transfers run to completion here; HBlank
    /// transfers arm and drain one block per HBlank. Writing bit7=0 while
    /// an HBlank transfer runs pauses it.
    fn start_hdma(&mut self, control: u8) {
        if !self.is_cgb() {
            return;
        }

        if self.hdma.hblank_active && control & 0x80 == 0 {
            self.hdma.hblank_active = false;
            self.hdma.served_ly = None;
            return;
        }

        self.hdma.blocks_remaining = (control & 0x7F) + 1;
        self.hdma.served_ly = None;

        if control & 0x80 == 0 {
            self.hdma.hblank_active = false;
            while self.hdma.blocks_remaining > 0 {
                self.hdma_block();
            }
        } else {
            self.hdma.hblank_active = true;
        }
    }

    fn hdma_block(&mut self) {
        if self.hdma.blocks_remaining == 0 {
            return;
        }

        let src = self.hdma.src;
        let dst = self.hdma.dst;
        for i in 0..0x10u16 {
            let value = self.read8_direct(src.wrapping_add(i));
            self.write8_direct(dst.wrapping_add(i), value);
        }

        self.hdma.src = src.wrapping_add(0x10);
        self.hdma.dst = 0x8000 | ((dst - 0x8000).wrapping_add(0x10) & 0x1FF0);
        self.hdma.blocks_remaining -= 1;
        if self.hdma.blocks_remaining == 0 {
            self.hdma.hblank_active = false;
            self.hdma.served_ly = None;
        }
    }

    /// One 0x10-byte block per HBlank entry on visible lines.
    pub(crate) fn step_hblank_hdma(&mut self) {
        if !self.is_cgb() || !self.hdma.hblank_active {
            return;
        }

        if !self.lcd_enabled() {
            // No HBlanks will come; drain the transfer.
            while self.hdma.blocks_remaining > 0 {
                self.hdma_block();
            }
            return;
        }

        let ly = self.ppu.ly();
        if self.ppu.mode() == Mode::HBlank && (ly as usize) < LCD_HEIGHT {
            if self.hdma.served_ly != Some(ly) {
                self.hdma_block();
                self.hdma.served_ly = Some(ly);
            }
        } else {
            self.hdma.served_ly = None;
        }
    }

    /// Copy one OAM DMA byte; called once per machine cycle.
    pub(crate) fn step_oam_dma(&mut self) {
        if let Some((src, dst)) = self.oam_dma.next_transfer() {
            let value = self.read8_direct(src);
            self.oam[dst] = value;
        }
    }

    /// Advance the PPU one dot.
    pub(crate) fn ppu_dot(&mut self) {
        let cgb = self.is_cgb();
        let Self {
            ppu,
            vram,
            oam,
            io,
            iflag,
            ..
        } = self;
        ppu.dot(vram, oam, io, iflag, cgb);
    }

    pub(crate) fn timer_overflow_countdown(&mut self) {
        let Self { timer, iflag, .. } = self;
        timer.overflow_countdown(iflag);
    }

    pub(crate) fn serial_dot(&mut self) {
        let Self {
            serial, io, iflag, ..
        } = self;
        let (low, high) = io.split_at_mut(SC);
        serial.dot(&mut low[SB], &mut high[0], iflag);
    }

    /// STAT as last composed by the PPU; handy for drivers and tests.
    pub fn stat(&self) -> u8 {
        self.io[STAT]
    }

    /// The page last written to FF46.
    pub fn dma_register(&self) -> u8 {
        self.io[DMA]
    }
}
