use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use dotboy_core::sync::FrameChannel;
use dotboy_core::{Cartridge, GameBoy, FRAMEBUFFER_LEN};
use log::info;

/// One frame of 70224 dots at 4.194304 MHz.
const FRAME_PERIOD: Duration = Duration::from_nanos(16_742_706);

#[derive(Debug)]
struct RunArgs {
    rom_path: PathBuf,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    headless: bool,
    trace_cpu: bool,
    log_serial: bool,
    print_serial: bool,
}

fn print_usage() {
    eprintln!(
        "Usage:\n\
  dotboy-cli <rom.gb> [--frames N] [--cycles N] [--headless]\n\
        [--trace-cpu] [--log-serial] [--print-serial]\n\
  dotboy-cli run <rom.gb> [...]\n\
\n\
Options:\n\
  --frames N      Stop after N frames.\n\
  --cycles N      Stop after N dots.\n\
  --headless      Run as fast as possible, no frame pacing.\n\
  --trace-cpu     Print a per-instruction trace to stderr (implies --headless).\n\
  --log-serial    Stream serial output to stdout as it is produced.\n\
  --print-serial  Print captured serial output on exit.\n\
\n\
Serial capture follows the common test-ROM convention: a byte written to\n\
SB (0xFF01) is clocked out when SC (0xFF02) is written with bit 7 set.\n"
    );
}

fn parse_args() -> Result<RunArgs, String> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("run") {
        args.remove(0);
    }
    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_usage();
        std::process::exit(0);
    }

    let mut rom_path: Option<PathBuf> = None;
    let mut parsed = RunArgs {
        rom_path: PathBuf::new(),
        max_frames: None,
        max_cycles: None,
        headless: false,
        trace_cpu: false,
        log_serial: false,
        print_serial: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--frames" => {
                let v = iter.next().ok_or("--frames needs a value")?;
                parsed.max_frames = Some(v.parse().map_err(|_| format!("bad --frames: {v}"))?);
            }
            "--cycles" => {
                let v = iter.next().ok_or("--cycles needs a value")?;
                parsed.max_cycles = Some(v.parse().map_err(|_| format!("bad --cycles: {v}"))?);
            }
            "--headless" => parsed.headless = true,
            "--trace-cpu" => parsed.trace_cpu = true,
            "--log-serial" => parsed.log_serial = true,
            "--print-serial" => parsed.print_serial = true,
            other if other.starts_with('-') => return Err(format!("unknown flag: {other}")),
            other => {
                if rom_path.replace(PathBuf::from(other)).is_some() {
                    return Err("more than one ROM path given".to_string());
                }
            }
        }
    }

    parsed.rom_path = rom_path.ok_or("missing ROM path")?;
    Ok(parsed)
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("dotboy-cli: {message}\n");
            print_usage();
            return ExitCode::from(1);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("dotboy-cli: {message}");
            ExitCode::from(2)
        }
    }
}

fn run(args: RunArgs) -> Result<(), String> {
    let cart = Cartridge::from_path(&args.rom_path).map_err(|e| e.to_string())?;
    let mut gb = Box::new(GameBoy::new(cart));

    let serial = if args.headless || args.trace_cpu {
        run_headless(&mut gb, &args)
    } else {
        run_paced(gb, &args)?
    };

    if args.print_serial && !serial.is_empty() {
        println!("{}", String::from_utf8_lossy(&serial));
    }
    Ok(())
}

/// Inline loop, no pacing: the mode for test ROMs and tracing.
fn run_headless(gb: &mut GameBoy, args: &RunArgs) -> Vec<u8> {
    let mut serial = Vec::new();
    let mut frames: u64 = 0;
    let mut dots: u64 = 0;
    let mut last_traced = u64::MAX;

    loop {
        if args.trace_cpu && gb.cpu.retired() != last_traced {
            last_traced = gb.cpu.retired();
            trace_instruction(gb);
        }

        if gb.tick() {
            frames += 1;
        }
        dots += 1;

        if args.log_serial {
            let chunk = gb.take_serial_output();
            if !chunk.is_empty() {
                print!("{}", String::from_utf8_lossy(&chunk));
                serial.extend_from_slice(&chunk);
            }
        }

        let frames_done = args.max_frames.is_some_and(|limit| frames >= limit);
        let dots_done = args.max_cycles.is_some_and(|limit| dots >= limit);
        if frames_done || dots_done {
            break;
        }
    }

    info!("ran {frames} frames / {dots} dots");
    serial.extend(gb.take_serial_output());
    serial
}

/// Real-time mode: the core runs on its own thread and hands frames over
/// the single-slot channel; this thread consumes and paces them.
fn run_paced(mut gb: Box<GameBoy>, args: &RunArgs) -> Result<Vec<u8>, String> {
    let channel = Arc::new(FrameChannel::new());
    let core_channel = Arc::clone(&channel);
    let max_frames = args.max_frames;

    let core = thread::spawn(move || {
        let mut frames: u64 = 0;
        while core_channel.is_running() {
            gb.run_frame();
            if !core_channel.publish(gb.framebuffer()) {
                break;
            }
            frames += 1;
            if max_frames.is_some_and(|limit| frames >= limit) {
                core_channel.stop();
                break;
            }
        }
        gb
    });

    let mut frame = [0u32; FRAMEBUFFER_LEN];
    let mut next_deadline = Instant::now() + FRAME_PERIOD;
    while channel.consume(&mut frame) {
        let now = Instant::now();
        if now < next_deadline {
            thread::sleep(next_deadline - now);
        }
        next_deadline += FRAME_PERIOD;
    }

    let mut gb = core.join().map_err(|_| "emulator thread panicked")?;
    Ok(gb.take_serial_output())
}

fn trace_instruction(gb: &mut GameBoy) {
    let pc = gb.cpu.pc;
    let opcode = gb.bus.read8(pc);
    eprintln!(
        "{:016} PC={pc:04X} OP={opcode:02X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} SP={:04X} IME={}",
        gb.cpu.retired(),
        gb.cpu.af(),
        gb.cpu.bc(),
        gb.cpu.de(),
        gb.cpu.hl(),
        gb.cpu.sp,
        gb.cpu.ime as u8,
    );
}
