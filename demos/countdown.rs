use color_eyre::eyre::Result;

use emu::{BufferConsole, Emulator};
use simple_logger::SimpleLogger;

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    SimpleLogger::new().init().unwrap(); // logging

    let mut emulator = Emulator::new(256)?;
    emulator.load_source_file("demos/programs/countdown.asm")?;

    let mut console = BufferConsole::default();
    emulator.run(&mut console);

    log::info!("{}", String::from_utf8_lossy(&console.output));

    Ok(())
}
