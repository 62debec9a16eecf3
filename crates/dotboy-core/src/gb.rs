use std::path::Path;

use crate::bus::{Bus, EmulationMode};
use crate::cartridge::{Cartridge, CartridgeError};
use crate::cpu::Cpu;
use crate::input::Button;
use crate::ppu::Framebuffer;

/// The owning container: every subsystem hangs off the bus, and `tick`
/// drives them all in lockstep, one dot at a time.
pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl GameBoy {
    /// Boot straight into the post-boot register state.
    pub fn new(cart: Cartridge) -> Self {
        let bus = Bus::new(cart);
        let cpu = match bus.mode {
            EmulationMode::Dmg => Cpu::post_boot_dmg(),
            EmulationMode::Cgb => Cpu::post_boot_cgb(),
        };
        Self { cpu, bus }
    }

    /// Boot through a caller-provided boot ROM image; execution starts at
    /// 0x0000 with cleared registers and the post-boot state must arise
    /// from running the image.
    pub fn with_boot_rom(cart: Cartridge, image: Vec<u8>) -> Self {
        Self {
            cpu: Cpu::new(),
            bus: Bus::with_boot_rom(cart, image),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, CartridgeError> {
        Ok(Self::new(Cartridge::from_path(path)?))
    }

    /// Advance one dot. Within the dot the order of side effects is
    /// fixed: PPU, HBlank HDMA, then on a machine-cycle boundary one OAM
    /// DMA byte and one CPU micro-step, then the TIMA overflow countdown,
    /// the SYS increment with its falling-edge check, and the serial bit
    /// clock.
    ///
    /// Returns true on the dot that enters VBlank: the framebuffer is
    /// complete and stable until the next frame starts drawing.
    pub fn tick(&mut self) -> bool {
        self.bus.ppu_dot();
        self.bus.step_hblank_hdma();

        if self.bus.timer.sys() % self.bus.machine_cycle_scaler() == 0 {
            self.bus.step_oam_dma();
            self.cpu.mcycle(&mut self.bus);
        }

        self.bus.timer_overflow_countdown();
        self.bus.timer.sys_tick();
        self.bus.serial_dot();

        self.bus.ppu.take_frame_ready()
    }

    /// Tick until the next frame is complete. With the panel switched off
    /// no VBlank ever comes, so this gives up after a frame's worth of
    /// dots rather than spinning.
    pub fn run_frame(&mut self) {
        for _ in 0..2 * crate::DOTS_PER_FRAME {
            if self.tick() {
                break;
            }
        }
    }

    /// Run until the CPU finishes one instruction (or idles one machine
    /// cycle while halted/stopped). Instruction-granular driver for tests
    /// and tracing.
    pub fn step(&mut self) {
        let start = self.cpu.retired();
        loop {
            let at_boundary = self.bus.timer.sys() % self.bus.machine_cycle_scaler() == 0;
            self.tick();
            if self.cpu.retired() > start {
                break;
            }
            if at_boundary && (self.cpu.halted || self.cpu.stopped) {
                break;
            }
        }
    }

    /// The composed frame; valid until the next VBlank.
    #[inline]
    pub fn framebuffer(&self) -> &Framebuffer {
        self.bus.ppu.framebuffer()
    }

    pub fn set_button(&mut self, button: Button, pressed: bool) {
        self.bus.set_joypad_button(button, pressed);
    }

    /// Bytes the guest has clocked out over serial so far.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.bus.serial.take_output()
    }

    /// Re-initialise CPU, bus arenas, PPU and timer. Cartridge external
    /// RAM survives, matching a battery-backed cartridge across a console
    /// reset.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu = if self.bus.bootrom.installed() {
            Cpu::new()
        } else {
            match self.bus.mode {
                EmulationMode::Dmg => Cpu::post_boot_dmg(),
                EmulationMode::Cgb => Cpu::post_boot_cgb(),
            }
        };
    }
}
