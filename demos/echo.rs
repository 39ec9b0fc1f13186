use color_eyre::eyre::Result;

use emu::processor::Step;
use emu::{Emulator, StdConsole};
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .init()
        .unwrap(); // logging

    let mut emulator = Emulator::new(0)?;
    emulator.load_source_file("demos/programs/echo.asm")?;

    let mut console = StdConsole;
    let mut steps = 0usize;
    while emulator.step(&mut console) == Step::Continue {
        steps += 1;
    }

    log::warn!("{:?} after {} steps", emulator.exception(), steps);

    Ok(())
}
