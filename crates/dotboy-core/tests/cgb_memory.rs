use dotboy_core::{Cartridge, EmulationMode, GameBoy};

fn make_cgb_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0143] = 0x80; // CGB-capable
    rom[0x0147] = 0x00;
    rom[0x0148] = 0x00;
    rom[0x0149] = 0x00;
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

fn setup(program: &[u8]) -> GameBoy {
    let mut gb = GameBoy::new(Cartridge::from_rom(make_cgb_rom(program)).unwrap());
    gb.bus.write8(0xFF40, 0x00); // LCD off: VRAM/OAM open for the tests
    gb
}

#[test]
fn cgb_flag_selects_color_mode() {
    let gb = setup(&[]);
    assert_eq!(gb.bus.mode, EmulationMode::Cgb);
    assert_eq!(gb.cpu.a, 0x11, "CGB post-boot accumulator");
}

#[test]
fn vbk_switches_the_vram_bank() {
    let mut gb = setup(&[]);

    gb.bus.write8(0x8000, 0x11); // bank 0
    gb.bus.write8(0xFF4F, 0x01);
    assert_eq!(gb.bus.read8(0xFF4F), 0xFF, "only bit 0 is meaningful");
    gb.bus.write8(0x8000, 0x22); // bank 1

    assert_eq!(gb.bus.vram[0x0000], 0x11);
    assert_eq!(gb.bus.vram[0x2000], 0x22);

    gb.bus.write8(0xFF4F, 0x00);
    assert_eq!(gb.bus.read8(0x8000), 0x11);
    assert_eq!(gb.bus.read8(0xFF4F), 0xFE);
}

#[test]
fn svbk_switches_wram_with_zero_coerced_to_one() {
    let mut gb = setup(&[]);

    gb.bus.write8(0xFF70, 0x03);
    gb.bus.write8(0xD000, 0x33);
    assert_eq!(gb.bus.wram[0x3000], 0x33);
    assert_eq!(gb.bus.read8(0xFF70), 0xFB);

    gb.bus.write8(0xFF70, 0x00);
    assert_eq!(gb.bus.read8(0xFF70), 0xF9, "bank 0 reads back as 1");
    gb.bus.write8(0xD000, 0x11);
    assert_eq!(gb.bus.wram[0x1000], 0x11);

    // Bank 0 at 0xC000 is always the same storage.
    gb.bus.write8(0xC000, 0x77);
    assert_eq!(gb.bus.wram[0x0000], 0x77);
}

#[test]
fn key1_stop_handshake_toggles_double_speed_and_clears_sys() {
    let mut gb = setup(&[0x10, 0x00, 0x00]); // STOP
    gb.bus.write8(0xFF0F, 0x00);
    assert_eq!(gb.bus.read8(0xFF4D), 0x7E);

    gb.bus.write8(0xFF4D, 0x01);
    assert_eq!(gb.bus.read8(0xFF4D), 0x7F);

    gb.step(); // STOP performs the switch

    assert!(gb.bus.double_speed());
    assert!(!gb.cpu.stopped);
    assert_eq!(gb.bus.read8(0xFF4D), 0xFE, "speed bit set, prepare clear");
    assert_eq!(gb.bus.read8(0xFF04), 0x00, "divider cleared by the switch");
    assert_eq!(gb.bus.machine_cycle_scaler(), 2);
}

#[test]
fn double_speed_halves_the_dots_per_machine_cycle() {
    let mut gb = setup(&[0x10, 0x00, 0x00, 0x00, 0x00]); // STOP ; NOPs
    gb.bus.write8(0xFF0F, 0x00);
    gb.bus.write8(0xFF4D, 0x01);
    gb.step();
    assert!(gb.bus.double_speed());

    // A NOP now retires every 2 dots.
    let start = gb.cpu.retired();
    let mut dots = 0;
    while gb.cpu.retired() == start {
        gb.tick();
        dots += 1;
    }
    let start = gb.cpu.retired();
    let mut second = 0;
    while gb.cpu.retired() == start {
        gb.tick();
        second += 1;
    }
    assert!(dots <= 2);
    assert_eq!(second, 2);
}

#[test]
fn general_purpose_hdma_copies_immediately() {
    let mut gb = setup(&[]);
    for i in 0..0x20u16 {
        gb.bus.write8(0xC000 + i, i as u8 + 1);
    }

    gb.bus.write8(0xFF51, 0xC0); // source high
    gb.bus.write8(0xFF52, 0x00); // source low
    gb.bus.write8(0xFF53, 0x00); // destination high (VRAM offset)
    gb.bus.write8(0xFF54, 0x40); // destination low
    gb.bus.write8(0xFF55, 0x01); // 2 blocks, general purpose

    for i in 0..0x20usize {
        assert_eq!(gb.bus.vram[0x40 + i], i as u8 + 1);
    }
    assert_eq!(gb.bus.read8(0xFF55), 0xFF, "transfer complete");
}

#[test]
fn hblank_hdma_moves_one_block_per_hblank() {
    let mut gb = setup(&[]);
    for i in 0..0x20u16 {
        gb.bus.write8(0xC000 + i, 0xA0 + i as u8);
    }
    gb.bus.write8(0xFF40, 0x91); // LCD back on: HBlanks will pace it

    gb.bus.write8(0xFF51, 0xC0);
    gb.bus.write8(0xFF52, 0x00);
    gb.bus.write8(0xFF53, 0x00);
    gb.bus.write8(0xFF54, 0x00);
    gb.bus.write8(0xFF55, 0x81); // 2 blocks, HBlank paced

    assert_eq!(gb.bus.read8(0xFF55), 0x01, "armed, nothing copied yet");
    assert_eq!(gb.bus.vram[0], 0x00);

    // Into line 0's HBlank: first block only.
    for _ in 0..400 {
        gb.tick();
    }
    assert_eq!(gb.bus.vram[0x00], 0xA0);
    assert_eq!(gb.bus.vram[0x10], 0x00);
    assert_eq!(gb.bus.read8(0xFF55), 0x00, "one block left");

    // Line 1's HBlank finishes it.
    for _ in 0..456 {
        gb.tick();
    }
    assert_eq!(gb.bus.vram[0x10], 0xB0);
    assert_eq!(gb.bus.read8(0xFF55), 0xFF);
}

#[test]
fn hblank_hdma_can_be_cancelled_midway() {
    let mut gb = setup(&[]);
    gb.bus.write8(0xFF40, 0x91);
    gb.bus.write8(0xFF51, 0xC0);
    gb.bus.write8(0xFF52, 0x00);
    gb.bus.write8(0xFF53, 0x00);
    gb.bus.write8(0xFF54, 0x00);
    gb.bus.write8(0xFF55, 0x83); // 4 blocks, HBlank paced

    for _ in 0..400 {
        gb.tick();
    }
    gb.bus.write8(0xFF55, 0x00); // bit 7 clear: pause

    let status = gb.bus.read8(0xFF55);
    assert_eq!(status & 0x80, 0x80, "paused flag");
    assert_eq!(status & 0x7F, 0x02, "three blocks minus one remain");
}

#[test]
fn palette_ram_ports_auto_increment() {
    let mut gb = setup(&[]);

    gb.bus.write8(0xFF68, 0x80); // BCPS: index 0, auto-increment
    gb.bus.write8(0xFF69, 0x1F); // palette 0 color 0 = red, low byte
    gb.bus.write8(0xFF69, 0x00); // high byte
    assert_eq!(gb.bus.read8(0xFF68), 0x82);

    gb.bus.write8(0xFF68, 0x00);
    assert_eq!(gb.bus.read8(0xFF69), 0x1F);
    gb.bus.write8(0xFF68, 0x01);
    assert_eq!(gb.bus.read8(0xFF69), 0x00);

    // Reads do not advance the index.
    assert_eq!(gb.bus.read8(0xFF68), 0x01);

    gb.bus.write8(0xFF6A, 0xBF); // OCPS: index 0x3F, auto-increment
    gb.bus.write8(0xFF6B, 0x55);
    assert_eq!(gb.bus.read8(0xFF6A), 0x80, "index wraps inside the RAM");
}

#[test]
fn cgb_background_pixel_decodes_rgb555_red_in_low_bits() {
    let mut gb = setup(&[]);

    // Palette 0 color 0 = pure red.
    gb.bus.write8(0xFF68, 0x80);
    gb.bus.write8(0xFF69, 0x1F);
    gb.bus.write8(0xFF69, 0x00);

    gb.bus.write8(0xFF40, 0x91);
    for _ in 0..456 {
        gb.tick();
    }

    assert_eq!(gb.framebuffer()[0], 0xFFFF_0000);
}
