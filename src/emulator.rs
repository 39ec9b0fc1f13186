use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::console::Console;
use crate::fault::{Exception, FaultCell};
use crate::memory::parse::{ParseError, ParseErrorKind, Parser};
use crate::memory::{Memory, Word, DEFAULT_MEMORY};
use crate::processor::{Processor, Step};

/// A memory, a processor and the load fault of the current program
#[derive(Debug, Clone)]
pub struct Emulator {
    pub memory: Memory,
    pub processor: Processor,
    error: FaultCell<ParseErrorKind>,
}

impl Emulator {
    /// Creates an emulator with `capacity` words of memory, or
    /// [`DEFAULT_MEMORY`] words if `capacity` is 0
    pub fn new(capacity: usize) -> Result<Self, ParseError> {
        let capacity = if capacity == 0 {
            DEFAULT_MEMORY
        } else {
            capacity
        };

        let memory = Memory::new(capacity).map_err(|err| {
            ParseError::new(ParseErrorKind::NoMemory, err.to_string(), 0)
        })?;

        Ok(Self {
            memory,
            processor: Processor::new(),
            error: FaultCell::default(),
        })
    }

    /// Assembles the source file at `path`
    pub fn load_source_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ParseError> {
        let path = path.as_ref();
        log::debug!("Loading {}", path.display());

        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(err) => {
                let err = ParseError::new(
                    ParseErrorKind::FileOpen,
                    format!("{}: {}", path.display(), err),
                    0,
                );
                log::error!("{}", err);
                self.error.set(err.kind());
                return Err(err);
            }
        };

        self.load_source(&source)
    }

    /// Assembles `source`. After an error the emulator must not be run.
    pub fn load_source(&mut self, source: &str) -> Result<(), ParseError> {
        Parser::new(source, &mut self.memory)
            .parse()
            .map_err(|err| {
                self.error.set(err.kind());
                err
            })
    }

    /// Executes the instruction at the program counter
    pub fn step<C: Console>(&mut self, console: &mut C) -> Step {
        self.processor.execute(&mut self.memory, console)
    }

    /// Steps until the program stops and returns the reason
    pub fn run<C: Console>(&mut self, console: &mut C) -> Exception {
        self.processor.execute_until_stop(&mut self.memory, console)
    }

    /// Fault that aborted loading, if any
    pub fn error(&self) -> Option<ParseErrorKind> {
        self.error.get()
    }

    pub fn exception(&self) -> Option<Exception> {
        self.processor.exception()
    }

    pub fn pc(&self) -> Word {
        self.processor.pc()
    }
}

impl FromStr for Emulator {
    type Err = ParseError;

    /// Assembles `s` into an emulator with the default memory size
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut emulator = Self::new(DEFAULT_MEMORY)?;
        emulator.load_source(s)?;
        Ok(emulator)
    }
}

#[cfg(test)]
mod tests {
    use crate::console::BufferConsole;
    use crate::processor::{PC, SP};

    use super::*;
    use color_eyre::eyre::Result;

    fn run(source: &str) -> Result<(Emulator, BufferConsole)> {
        let mut emulator: Emulator = source.parse()?;
        let mut console = BufferConsole::default();
        emulator.run(&mut console);
        Ok((emulator, console))
    }

    #[test]
    fn test_default_capacity() -> Result<()> {
        let emulator = Emulator::new(0)?;
        assert_eq!(emulator.memory.capacity(), DEFAULT_MEMORY);
        assert_eq!(emulator.error(), None);
        assert_eq!(emulator.exception(), None);

        Ok(())
    }

    #[test]
    fn test_instruction_count() -> Result<()> {
        let emulator: Emulator = r#"
            ; counts only instructions
            MOVE r0 #1
            DW 7000 #3
            DS 7100 "xy"

            WRITE r0
            BREAK
            DW 7001 #4
        "#
        .parse()?;

        assert_eq!(emulator.memory.instructions(), 3);
        assert_eq!(emulator.memory.read_word(7000), Ok(3));
        assert_eq!(emulator.memory.read_word(7101), Ok(b'y' as Word));

        Ok(())
    }

    #[test]
    fn test_define_word_round_trip() -> Result<()> {
        let mut emulator = Emulator::new(10_000)?;
        emulator.load_source("LOAD r0 #9000\nBREAK\nDW 9000 #42")?;
        emulator.run(&mut BufferConsole::default());

        assert_eq!(emulator.memory.read_word(9000), Ok(42));
        assert_eq!(emulator.processor.registers[0], 42);

        Ok(())
    }

    #[test]
    fn test_arithmetic() -> Result<()> {
        let (emulator, _) = run("MOVE r0 #5\nADD r1 r0 #3\nSUB r2 r0 #3\nSUB r3 r4 #1\nBREAK")?;

        assert_eq!(emulator.exception(), Some(Exception::None));
        assert_eq!(emulator.processor.registers[1], 8);
        assert_eq!(emulator.processor.registers[2], 2);
        assert_eq!(emulator.processor.registers[3], Word::MAX);

        Ok(())
    }

    #[test]
    fn test_add_overflow_wraps() -> Result<()> {
        let (emulator, _) = run("MOVE r0 #4294967295\nADD r1 r0 #2\nBREAK")?;

        assert_eq!(emulator.exception(), Some(Exception::None));
        assert_eq!(emulator.processor.registers[1], 1);

        Ok(())
    }

    #[test]
    fn test_program_larger_than_memory() -> Result<()> {
        let mut emulator = Emulator::new(2)?;
        let err = emulator
            .load_source("MOVE r0 #1\nMOVE r1 #2\nMOVE r2 #3\nMOVE r3 #4\nBREAK")
            .unwrap_err();

        assert_eq!(err.kind(), ParseErrorKind::NoMemory);
        assert_eq!(emulator.error(), Some(ParseErrorKind::NoMemory));
        assert_eq!(emulator.memory.instructions(), 2);

        Ok(())
    }

    #[test]
    fn test_jump_checked_at_runtime() -> Result<()> {
        let mut emulator: Emulator = "JUMP 2\nBREAK".parse()?;
        assert_eq!(emulator.error(), None);

        assert_eq!(emulator.run(&mut BufferConsole::default()), Exception::InvalidInstruction);
        assert_eq!(emulator.pc(), 0);

        Ok(())
    }

    #[test]
    fn test_cond() -> Result<()> {
        let program = "READ r0\nCOND r0\nWRITE 'a'\nWRITE 'b'\nBREAK";

        let mut emulator: Emulator = program.parse()?;
        let mut console = BufferConsole::new([1u8]);
        emulator.run(&mut console);
        assert_eq!(console.output, b"b");

        let mut emulator: Emulator = program.parse()?;
        let mut console = BufferConsole::new([0u8]);
        emulator.run(&mut console);
        assert_eq!(console.output, b"ab");

        Ok(())
    }

    #[test]
    fn test_push_pop() -> Result<()> {
        let (emulator, _) = run("MOVE sp #4000\nPUSH #7\nPOP r0\nBREAK")?;

        assert_eq!(emulator.exception(), Some(Exception::None));
        assert_eq!(emulator.processor.registers[0], 7);
        assert_eq!(emulator.processor.registers[SP], 4000);

        Ok(())
    }

    #[test]
    fn test_break_only() -> Result<()> {
        let mut emulator: Emulator = "BREAK".parse()?;

        assert_eq!(emulator.step(&mut BufferConsole::default()), Step::Stop);
        assert_eq!(emulator.exception(), Some(Exception::None));
        assert_eq!(emulator.pc(), 0);

        Ok(())
    }

    #[test]
    fn test_data_instructions_cannot_touch_code() -> Result<()> {
        for program in &[
            "LOAD r0 #0\nBREAK",
            "STORE #1 #5\nBREAK",
            "MOVE 0 #5\nBREAK",
            "MOVE r0 1\nBREAK",
            "ADD r0 0 #1\nBREAK",
            "PUSH #1\nBREAK",
            "MOVE sp #2\nPOP r0\nBREAK",
        ] {
            let (emulator, _) = run(program)?;
            assert_eq!(
                emulator.exception(),
                Some(Exception::AccessViolation),
                "{}",
                program
            );
        }

        Ok(())
    }

    #[test]
    fn test_hello_world() -> Result<()> {
        let (emulator, console) = run(r#"
            ; prints the string at 100 up to its terminator
            MOVE r1 #100
            LOAD r0 r1
            COND r0
            BREAK
            WRITE r0
            ADD r1 r1 #1
            JUMP 1

            DS 100 "Hello, world!\n\0"
        "#)?;

        assert_eq!(emulator.exception(), Some(Exception::None));
        assert_eq!(console.output, b"Hello, world!\n");
        assert_eq!(emulator.processor.registers[PC], 3);

        Ok(())
    }

    #[test]
    fn test_deterministic() -> Result<()> {
        let program = "READ r0\nADD r1 r0 #1\nPUSH r1\nWRITE r1\nBREAK";

        let mut first: Emulator = program.parse()?;
        first.processor.registers[SP] = 200;
        let mut first_console = BufferConsole::new(b"a");
        first.run(&mut first_console);

        let mut second: Emulator = program.parse()?;
        second.processor.registers[SP] = 200;
        let mut second_console = BufferConsole::new(b"a");
        second.run(&mut second_console);

        assert_eq!(first.processor, second.processor);
        assert_eq!(first.memory, second.memory);
        assert_eq!(first_console.output, b"b");
        assert_eq!(first_console, second_console);

        Ok(())
    }

    #[test]
    fn test_load_errors() {
        let mut emulator = Emulator::new(0).unwrap();
        let err = emulator.load_source("BREAK\nHALT").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnknownInstruction);
        assert_eq!(emulator.error(), Some(ParseErrorKind::UnknownInstruction));

        let mut emulator = Emulator::new(0).unwrap();
        let err = emulator
            .load_source_file("does/not/exist.asm")
            .unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::FileOpen);
        assert_eq!(emulator.error(), Some(ParseErrorKind::FileOpen));
    }
}
