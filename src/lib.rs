//! A small word-addressed virtual machine with its own assembly language.
//!
//! Source text is assembled into the low addresses of a [`memory::Memory`],
//! directives place data above it, and a [`processor::Processor`] executes the
//! instructions one step at a time.

pub mod console;
pub mod emulator;
pub mod fault;
pub mod instruction;
pub mod memory;
pub mod processor;

pub use console::{BufferConsole, Console, StdConsole};
pub use emulator::Emulator;
pub use fault::Exception;
