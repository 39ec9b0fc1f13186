use color_eyre::eyre::Result;

use emu::{Emulator, StdConsole};
use log::LevelFilter;
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap(); // logging

    let mut emulator: Emulator = include_str!("programs/hello.asm").parse()?;
    emulator.memory.dump();

    emulator.run(&mut StdConsole);

    Ok(())
}
