use dotboy_core::{Cartridge, GameBoy};

fn make_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x00;
    rom[0x0148] = 0x00;
    rom[0x0149] = 0x00;
    rom[0x0100..0x0100 + program.len()].copy_from_slice(program);
    rom
}

fn setup(program: &[u8]) -> GameBoy {
    GameBoy::new(Cartridge::from_rom(make_rom(program)).unwrap())
}

fn instruction_dots(gb: &mut GameBoy) -> u32 {
    let start = gb.cpu.retired();
    let mut dots = 0;
    while gb.cpu.retired() == start {
        gb.tick();
        dots += 1;
        assert!(dots < 100_000, "no progress");
    }
    dots
}

#[test]
fn lowest_bit_wins_when_everything_is_pending() {
    let mut gb = setup(&[0x00]);
    gb.cpu.ime = true;
    gb.bus.ie = 0x1F;
    gb.bus.iflag = 0x1F;

    gb.step();

    assert_eq!(gb.cpu.pc, 0x0040, "VBlank outranks the rest");
    assert_eq!(gb.bus.iflag & 0x01, 0, "serviced bit acknowledged");
    assert_eq!(gb.bus.iflag & 0x1E, 0x1E, "other requests survive");
    assert!(!gb.cpu.ime);
}

#[test]
fn dispatch_pushes_pc_and_takes_five_machine_cycles() {
    let mut gb = setup(&[0x00, 0x00]);
    gb.step(); // align on a retirement boundary

    gb.cpu.ime = true;
    gb.bus.ie = 0x04;
    gb.bus.iflag = 0x04;

    let dots = instruction_dots(&mut gb);
    assert_eq!(dots, 20);
    assert_eq!(gb.cpu.pc, 0x0050);
    assert_eq!(gb.cpu.sp, 0xFFFC);
    assert_eq!(gb.bus.read8(0xFFFD), 0x01);
    assert_eq!(gb.bus.read8(0xFFFC), 0x01);
}

#[test]
fn no_dispatch_without_ime_or_enable() {
    let mut gb = setup(&[0x00, 0x00, 0x00]);
    gb.cpu.ime = false;
    gb.bus.ie = 0x01;
    gb.bus.iflag = 0x01;
    gb.step();
    assert_eq!(gb.cpu.pc, 0x0101);

    let mut gb = setup(&[0x00, 0x00, 0x00]);
    gb.cpu.ime = true;
    gb.bus.ie = 0x00;
    gb.bus.iflag = 0x01;
    gb.step();
    assert_eq!(gb.cpu.pc, 0x0101);
}

#[test]
fn pending_interrupt_after_ei_is_serviced_after_one_instruction() {
    let mut gb = setup(&[0xFB, 0x00, 0x00]); // EI ; NOP ; NOP
    gb.bus.ie = 0x01;
    gb.bus.iflag = 0x01;

    gb.step(); // EI
    assert!(!gb.cpu.ime);
    gb.step(); // NOP, after which IME turns on
    assert!(gb.cpu.ime);
    gb.step(); // dispatch
    assert_eq!(gb.cpu.pc, 0x0040);
    assert_eq!(gb.bus.read8(0xFFFD), 0x01);
    assert_eq!(gb.bus.read8(0xFFFC), 0x02);
}

#[test]
fn halted_cpu_with_ime_dispatches_on_wake() {
    let mut gb = setup(&[0x76, 0x00]); // HALT
    gb.bus.iflag = 0;
    gb.cpu.ime = true;
    gb.bus.ie = 0x02;

    gb.step();
    assert!(gb.cpu.halted);

    gb.bus.iflag = 0x02;
    gb.step();
    assert!(!gb.cpu.halted);
    assert_eq!(gb.cpu.pc, 0x0048);
    assert_eq!(gb.bus.iflag & 0x02, 0);
}

#[test]
fn reti_restores_ime_immediately() {
    // Vector 0x40 holds RETI; main program is NOPs.
    let mut rom = make_rom(&[0x00, 0x00, 0x00, 0x00]);
    rom[0x0040] = 0xD9;
    let mut gb = GameBoy::new(Cartridge::from_rom(rom).unwrap());

    gb.cpu.ime = true;
    gb.bus.ie = 0x01;
    gb.bus.iflag = 0x01;

    gb.step(); // dispatch to 0x40
    assert_eq!(gb.cpu.pc, 0x0040);
    assert!(!gb.cpu.ime);

    gb.step(); // RETI
    assert!(gb.cpu.ime);
    assert_eq!(gb.cpu.pc, 0x0100);
    assert_eq!(gb.cpu.sp, 0xFFFE);
}

#[test]
fn if_register_reads_with_high_bits_set() {
    let mut gb = setup(&[0x00]);
    gb.bus.write8(0xFF0F, 0x05);
    assert_eq!(gb.bus.read8(0xFF0F), 0xE5);
    gb.bus.write8(0xFF0F, 0xFF);
    assert_eq!(gb.bus.read8(0xFF0F), 0xFF);
    assert_eq!(gb.bus.iflag, 0x1F, "only five request bits stored");
}

#[test]
fn serial_transfer_completes_and_interrupts() {
    let mut gb = setup(&[0x00]);
    gb.bus.iflag = 0;
    gb.bus.write8(0xFF01, b'P');
    gb.bus.write8(0xFF02, 0x81);

    for _ in 0..512 {
        gb.tick();
    }

    assert_ne!(gb.bus.iflag & 0x08, 0, "serial interrupt requested");
    assert_eq!(gb.bus.read8(0xFF02) & 0x80, 0, "transfer bit cleared");
    assert_eq!(gb.bus.read8(0xFF01), 0xFF, "no link partner");
    assert_eq!(gb.take_serial_output(), vec![b'P']);
}
