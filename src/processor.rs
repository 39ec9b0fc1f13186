use log::*;

use crate::console::Console;
use crate::fault::{Exception, FaultCell};
use crate::instruction::{Instruction, Operand, Register};
use crate::memory::{Memory, Word};

/// Number of registers
pub const REGISTERS: usize = 16;
/// Index of the program counter
pub const PC: usize = REGISTERS - 1;
/// Index of the stack pointer
pub const SP: usize = REGISTERS - 2;

const _: () = assert!(REGISTERS >= 2);

type Result<T = ()> = std::result::Result<T, Exception>;

/// Outcome of a single execution step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// The next instruction may be executed
    Continue,
    /// The program stopped, see [`Processor::exception`]
    Stop,
}

/// Emulates the register bank and runs instructions against a [`Memory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Processor {
    pub registers: [Word; REGISTERS],
    exception: FaultCell<Exception>,
}

impl Processor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program counter
    pub fn pc(&self) -> Word {
        self.registers[PC]
    }

    /// Stack pointer
    pub fn sp(&self) -> Word {
        self.registers[SP]
    }

    pub fn register(&self, register: Register) -> Word {
        self.registers[register.index()]
    }

    pub fn set_register(&mut self, register: Register, value: Word) {
        self.registers[register.index()] = value;
    }

    /// Exception that stopped the program, if any
    pub fn exception(&self) -> Option<Exception> {
        self.exception.get()
    }

    /// Runs one execution step
    ///
    /// # Panics
    ///
    /// Panics when called again after a step returned [`Step::Stop`].
    pub fn execute<C: Console>(&mut self, memory: &mut Memory, console: &mut C) -> Step {
        match self.fetch(memory) {
            Ok(instruction) => match self.execute_instruction(instruction, memory, console) {
                Ok(()) => Step::Continue,
                Err(exception) => self.raise(exception),
            },
            Err(exception) => self.raise(exception),
        }
    }

    /// Run program until it stops and return the reason
    pub fn execute_until_stop<C: Console>(
        &mut self,
        memory: &mut Memory,
        console: &mut C,
    ) -> Exception {
        while self.execute(memory, console) == Step::Continue {}

        let exception = self.exception().unwrap_or(Exception::None);
        info!("Program stopped at 0x{:08x}: {}", self.pc(), exception);

        exception
    }

    fn raise(&mut self, exception: Exception) -> Step {
        if exception != Exception::None {
            debug!("{} at 0x{:08x}", exception, self.pc());
        }

        self.exception.set(exception);
        Step::Stop
    }

    fn fetch(&self, memory: &Memory) -> Result<Instruction> {
        let pc = self.pc();
        if !memory.is_valid_execute(pc) {
            return Err(Exception::InvalidInstruction);
        }

        memory
            .instruction(pc)
            .copied()
            .ok_or(Exception::NoInstruction)
    }

    /// Executes a single instruction
    pub fn execute_instruction<C: Console>(
        &mut self,
        instruction: Instruction,
        memory: &mut Memory,
        console: &mut C,
    ) -> Result {
        match instruction {
            Instruction::Jump(target) => {
                let address = match target {
                    Operand::Register(register) => self.register(register),
                    Operand::Address(address) => address,
                    _ => return Err(Exception::InvalidInstruction),
                };

                if !memory.is_valid_execute(address) {
                    return Err(Exception::InvalidInstruction);
                }

                // the jump target is executed next, no increment
                self.registers[PC] = address;

                debug!("JUMP {}", address);
                return Ok(());
            }
            Instruction::Cond(condition) => {
                let value = self.value(condition, memory)?;
                if value != 0 {
                    self.advance();
                }

                debug!("COND {}: {}", condition, value);
            }
            Instruction::Move { dest, src } => {
                let value = match dest {
                    Operand::Register(register) => {
                        let value = self.value(src, memory)?;
                        self.set_register(register, value);
                        value
                    }
                    Operand::Address(address) => {
                        if !memory.is_valid_write(address, 1) {
                            return Err(Exception::AccessViolation);
                        }

                        let value = self.value(src, memory)?;
                        memory.write_word(address, value)?;
                        value
                    }
                    Operand::Constant(_) | Operand::Character(_) => {
                        return Err(Exception::InvalidInstruction)
                    }
                };

                debug!("MOVE {} {}: {}", dest, src, value);
            }
            Instruction::Add { dest, a, b } => {
                let a = self.value(a, memory)?;
                let b = self.value(b, memory)?;
                let result = a.wrapping_add(b);
                self.set_register(dest, result);

                debug!("ADD {} {}: {}", a, b, result);
            }
            Instruction::Sub { dest, a, b } => {
                let a = self.value(a, memory)?;
                let b = self.value(b, memory)?;
                let result = a.wrapping_sub(b);
                self.set_register(dest, result);

                debug!("SUB {} {}: {}", a, b, result);
            }
            Instruction::Write(value) => {
                let byte = match value {
                    Operand::Character(byte) => byte,
                    Operand::Constant(value) => value as u8,
                    Operand::Register(register) => self.register(register) as u8,
                    Operand::Address(_) => return Err(Exception::InvalidInstruction),
                };
                console.emit(byte);

                debug!("WRITE 0x{:02x}", byte);
            }
            Instruction::Read(register) => {
                let byte = console.receive();
                self.set_register(register, byte as Word);

                debug!("READ {}: 0x{:02x}", register, byte);
            }
            Instruction::Load { dest, address } => {
                let address = self.indirect(address)?;
                let value = memory.read_word(address)?;
                self.set_register(dest, value);

                debug!("LOAD {}: {}", address, value);
            }
            Instruction::Store { address, value } => {
                let address = self.indirect(address)?;
                let value = self.indirect(value)?;
                memory.write_word(address, value)?;

                debug!("STORE {}: {}", address, value);
            }
            Instruction::Push(value) => {
                let sp = self.sp();
                if !memory.is_valid_write(sp, 1) {
                    return Err(Exception::AccessViolation);
                }

                let value = self.indirect(value)?;
                memory.write_word(sp, value)?;
                self.registers[SP] = sp.wrapping_add(1);

                debug!("PUSH {}: {}", sp, value);
            }
            Instruction::Pop(register) => {
                let top = self.sp().wrapping_sub(1);
                let value = memory.read_word(top)?;
                self.set_register(register, value);
                // the decrement applies after the write, so `POP sp` lowers the popped value
                self.registers[SP] = self.sp().wrapping_sub(1);

                debug!("POP {}: {}", top, value);
            }
            Instruction::Break => {
                debug!("BREAK");
                return Err(Exception::None);
            }
        }

        self.advance();
        Ok(())
    }

    fn advance(&mut self) {
        self.registers[PC] = self.registers[PC].wrapping_add(1);
    }

    /// Value of a register, a data cell or a constant
    fn value(&self, operand: Operand, memory: &Memory) -> Result<Word> {
        match operand {
            Operand::Register(register) => Ok(self.register(register)),
            Operand::Address(address) => memory.read_word(address),
            Operand::Constant(value) => Ok(value),
            Operand::Character(_) => Err(Exception::InvalidInstruction),
        }
    }

    /// Value of a register or a constant
    fn indirect(&self, operand: Operand) -> Result<Word> {
        match operand {
            Operand::Register(register) => Ok(self.register(register)),
            Operand::Constant(value) => Ok(value),
            Operand::Address(_) | Operand::Character(_) => Err(Exception::InvalidInstruction),
        }
    }
}
