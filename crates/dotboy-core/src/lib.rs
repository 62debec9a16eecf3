pub mod apu;
pub mod bootrom;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod dma;
pub mod gb;
pub mod input;
pub mod interrupt;
pub mod ppu;
pub mod serial;
pub mod sync;
pub mod timer;

pub use bus::{Bus, EmulationMode};
pub use cartridge::{Cartridge, CartridgeError};
pub use gb::GameBoy;
pub use input::Button;
pub use ppu::{FRAMEBUFFER_LEN, LCD_HEIGHT, LCD_WIDTH};

/// Dots per frame: 154 scanlines of 456 dots each.
pub const DOTS_PER_FRAME: u32 = 70_224;

/// Dots per scanline.
pub const DOTS_PER_LINE: u32 = 456;

/// Base system clock, in Hz. One tick advances one dot.
pub const BASE_CLOCK_HZ: u32 = 4_194_304;
