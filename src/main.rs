// 16 8-bit data registers named V0 to VF
// I -> address register
//
// Delay timer & Sound timer: count down at 60 times / s until 0
//
// Display res: 64 width, 32 height
//
// 35 opcodes, each are 2 bytes (big-endian)
//      NNN: address
//      NN: 8-bit constant
//      N: 4-bit constant
//      X and Y: 4-bit register identifier

use std::{
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;

use emulator::Emulator;
use screen::Screen;
use timer::{InstructionBudget, TickClock};

mod decode;
mod display;
mod emulator;
mod keyboard;
mod memory;
mod registers;
mod screen;
mod timer;

const DEFAULT_INSTRUCTIONS_PER_SECOND: u32 = 700;
const DEFAULT_SCALE: u8 = 16;
const IDLE: Duration = Duration::from_millis(2);

#[derive(Parser, Debug)]
#[command(version, about = "A CHIP-8 virtual machine", long_about = None)]
struct Args {
    /// Path to the ROM file to run
    rom: PathBuf,

    /// Instructions per second, 0 for uncapped
    #[arg(short, long, default_value_t = DEFAULT_INSTRUCTIONS_PER_SECOND)]
    ips: u32,

    /// Window scale: 1, 2, 4, 8, 16 or 32
    #[arg(short, long, default_value_t = DEFAULT_SCALE)]
    scale: u8,

    /// Seed for the CXNN random source
    #[arg(long)]
    seed: Option<u64>,
}

struct Settings {
    rom: PathBuf,
    instructions_per_second: u32,
    scale: minifb::Scale,
    seed: Option<u64>,
}

impl TryFrom<Args> for Settings {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        let scale = screen::scale_from_factor(args.scale)
            .ok_or_else(|| anyhow!("unsupported window scale {}", args.scale))?;
        Ok(Self {
            rom: args.rom,
            instructions_per_second: args.ips,
            scale,
            seed: args.seed,
        })
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::try_from(Args::parse())?;
    run(settings)
}

fn run(settings: Settings) -> anyhow::Result<()> {
    let mut emu = match settings.seed {
        Some(seed) => Emulator::with_seed(seed),
        None => Emulator::new(),
    };
    emu.load_rom_by_file(&settings.rom)?;

    let mut screen = Screen::new(settings.scale).context("failed to open window")?;
    screen.present(&emu.fb)?;
    info!(
        "running {} at {} instructions/s",
        settings.rom.display(),
        settings.instructions_per_second
    );

    let mut clock = TickClock::new();
    let mut budget = InstructionBudget::new(settings.instructions_per_second);
    let mut last = Instant::now();

    while screen.is_open() {
        let now = Instant::now();
        let elapsed = now - last;
        last = now;

        if clock.advance(elapsed) {
            emu.sync_timers();
        }

        let held = screen.held_keys();
        let mut drawn = false;
        for _ in 0..budget.steps(elapsed) {
            emu.keypad.update_from_host(&held);
            drawn |= emu.step();
        }

        if drawn {
            screen.present(&emu.fb)?;
        } else {
            screen.refresh();
        }
        thread::sleep(IDLE);
    }

    info!("window closed, exiting");
    Ok(())
}
