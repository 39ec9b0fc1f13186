use std::collections::VecDeque;
use std::io::{self, IsTerminal, Read, Write};

use crossterm::terminal;
use log::*;

use crate::memory::Byte;

/// Byte I/O used by `WRITE` and `READ`
pub trait Console {
    /// Emits one byte
    fn emit(&mut self, byte: Byte);

    /// Blocks until one byte is available and returns it
    fn receive(&mut self) -> Byte;
}

/// Console backed by the standard streams of the process.
///
/// Output is flushed after every byte. When stdin is a terminal, input is read
/// in raw mode, so a byte is delivered without waiting for a newline and is
/// not echoed. A failed or exhausted input reads as 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdConsole;

impl StdConsole {
    fn read_byte(stdin: &mut io::StdinLock<'_>) -> Byte {
        let mut buffer = [0; 1];
        match stdin.read(&mut buffer) {
            Ok(1) => buffer[0],
            Ok(_) => {
                warn!("stdin is exhausted");
                0
            }
            Err(err) => {
                warn!("failed to read from stdin: {}", err);
                0
            }
        }
    }
}

impl Console for StdConsole {
    fn emit(&mut self, byte: Byte) {
        let mut stdout = io::stdout().lock();
        if let Err(err) = stdout.write_all(&[byte]).and_then(|_| stdout.flush()) {
            warn!("failed to write to stdout: {}", err);
        }
    }

    fn receive(&mut self) -> Byte {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Self::read_byte(&mut stdin.lock());
        }

        let _raw = match RawMode::enable() {
            Ok(raw) => Some(raw),
            Err(err) => {
                warn!("failed to enable raw mode: {}", err);
                None
            }
        };

        Self::read_byte(&mut stdin.lock())
    }
}

/// Keeps the terminal in raw mode until dropped
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            warn!("failed to restore the terminal mode: {}", err);
        }
    }
}

/// In-memory console: input is served from a queue and output collected.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferConsole {
    pub input: VecDeque<Byte>,
    pub output: Vec<Byte>,
}

impl BufferConsole {
    pub fn new<I: AsRef<[Byte]>>(input: I) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
        }
    }
}

impl Console for BufferConsole {
    fn emit(&mut self, byte: Byte) {
        self.output.push(byte);
    }

    /// Reads 0 once the input is drained
    fn receive(&mut self) -> Byte {
        self.input.pop_front().unwrap_or(0)
    }
}
