use std::path::PathBuf;
use std::process;

use clap::Parser;
use color_eyre::eyre::Result;
use emu::memory::DEFAULT_MEMORY;
use emu::processor::Step;
use emu::{Emulator, Exception, StdConsole};
use log::LevelFilter;
use simple_logger::SimpleLogger;

/// Assembles a source file and runs it until BREAK or an exception
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Assembly source file
    source: PathBuf,

    /// Memory size in words
    #[arg(long, default_value_t = DEFAULT_MEMORY)]
    memory: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// Log the assembled program before running it
    #[arg(long)]
    dump: bool,
}

fn main() -> Result<()> {
    color_eyre::install()?; // rust error handling
    let args = Args::parse();
    SimpleLogger::new().with_level(args.log_level).init()?; // logging

    let mut emulator = match Emulator::new(args.memory) {
        Ok(emulator) => emulator,
        Err(err) => {
            log::error!("{}", err);
            println!("Failed to initialize the emulation engine.");
            process::exit(1);
        }
    };

    if let Err(err) = emulator.load_source_file(&args.source) {
        println!(
            "Failed to load the input file '{}'. Error {:#010x}.",
            args.source.display(),
            u32::from(err.kind())
        );
        process::exit(1);
    }

    if args.dump {
        emulator.memory.dump();
    }

    let mut console = StdConsole;
    while emulator.step(&mut console) == Step::Continue {}

    match emulator.exception() {
        Some(Exception::None) | None => {
            log::info!("Program finished at {:#010x}", emulator.pc());
        }
        Some(exception) => println!(
            "Exception {:#010x} occured at address {:#010x}. Program terminated.",
            u32::from(exception),
            emulator.pc()
        ),
    }

    Ok(())
}
