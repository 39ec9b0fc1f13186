//! Instruction model and the command registry.
//!
//! Every statement of the assembly language starts with a mnemonic. A
//! mnemonic either names an [`Opcode`], which assembles into an
//! [`Instruction`] placed in the code region, or a [`Directive`], which writes
//! into the data region while the program is loaded and leaves no trace in the
//! code region.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::memory::{Byte, Word};
use crate::processor::{PC, REGISTERS, SP};

macro_rules! mnemonics {
    (
        $( #[doc = $enum_doc:expr] )+
        $enum:ident {
            $( $( #[doc = $doc:expr] )+ $name:ident = $repr:literal => $mnemonic:literal , )+
        }
    ) => {
        $( #[doc = $enum_doc] )+
        #[repr(u8)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[derive(TryFromPrimitive, IntoPrimitive)]
        pub enum $enum {
            $(
                $( #[doc = $doc] )+
                $name = $repr,
            )+
        }

        impl $enum {
            pub const ALL: &'static [Self] = &[
                $( Self::$name , )+
            ];

            /// The mnemonic as written in the registry
            pub fn name(&self) -> &'static str {
                match self {
                    $( Self::$name => $mnemonic , )+
                }
            }
        }

        impl fmt::Display for $enum {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    }
}

mnemonics! {
    /// Opcodes of the executable instructions
    Opcode {
        /// Continue execution at an address of the code region
        Jump = 1 => "JUMP",
        /// Skip the next instruction if the operand is not zero
        Cond = 2 => "COND",
        /// Copy a value into a register or a data cell
        Move = 3 => "MOVE",
        /// Wrapping addition into a register
        Add = 4 => "ADD",
        /// Wrapping subtraction into a register
        Sub = 5 => "SUB",
        /// Emit one byte to the console
        Write = 6 => "WRITE",
        /// Receive one byte from the console
        Read = 7 => "READ",
        /// Copy a data cell into a register
        Load = 8 => "LOAD",
        /// Copy a value into a data cell
        Store = 9 => "STORE",
        /// Store a value at the stack pointer and increment it
        Push = 10 => "PUSH",
        /// Decrement the stack pointer and load the value below it
        Pop = 11 => "POP",
        /// Stop the program
        Break = 12 => "BREAK",
    }
}

mnemonics! {
    /// Load time directives
    Directive {
        /// Define a word: `DW <address> #<word>`
        DefineWord = 1 => "DW",
        /// Define a string: `DS <address> "<text>"`
        DefineString = 2 => "DS",
    }
}

/// An entry of the command registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Instruction(Opcode),
    Directive(Directive),
}

impl Command {
    /// Looks up a mnemonic, ignoring ASCII case. Instructions are searched
    /// before directives.
    pub fn find(mnemonic: &str) -> Option<Self> {
        Opcode::ALL
            .iter()
            .find(|opcode| opcode.name().eq_ignore_ascii_case(mnemonic))
            .map(|opcode| Command::Instruction(*opcode))
            .or_else(|| {
                Directive::ALL
                    .iter()
                    .find(|directive| directive.name().eq_ignore_ascii_case(mnemonic))
                    .map(|directive| Command::Directive(*directive))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Instruction(opcode) => opcode.name(),
            Command::Directive(directive) => directive.name(),
        }
    }
}

/// Index into the register bank, always below [`REGISTERS`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Register(usize);

impl Register {
    pub const PC: Self = Self(PC);
    pub const SP: Self = Self(SP);

    pub fn new(index: usize) -> Option<Self> {
        if index < REGISTERS {
            Some(Self(index))
        } else {
            None
        }
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PC => f.write_str("pc"),
            Self::SP => f.write_str("sp"),
            Self(index) => write!(f, "r{}", index),
        }
    }
}

/// A typed instruction operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// `pc`, `sp` or `r<n>`
    Register(Register),
    /// A plain decimal literal
    Address(Word),
    /// `#<n>`
    Constant(Word),
    /// `'<c>'`
    Character(Byte),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(register) => write!(f, "{}", register),
            Operand::Address(address) => write!(f, "{}", address),
            Operand::Constant(value) => write!(f, "#{}", value),
            // Bytes that cannot form a token are written as the equivalent constant
            Operand::Character(byte) if byte.is_ascii_graphic() => {
                write!(f, "'{}'", *byte as char)
            }
            Operand::Character(byte) => write!(f, "#{}", byte),
        }
    }
}

/// An assembled instruction. Operand positions that only accept registers
/// hold a [`Register`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Jump(Operand),
    Cond(Operand),
    Move { dest: Operand, src: Operand },
    Add { dest: Register, a: Operand, b: Operand },
    Sub { dest: Register, a: Operand, b: Operand },
    Write(Operand),
    Read(Register),
    Load { dest: Register, address: Operand },
    Store { address: Operand, value: Operand },
    Push(Operand),
    Pop(Register),
    Break,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Jump(_) => Opcode::Jump,
            Instruction::Cond(_) => Opcode::Cond,
            Instruction::Move { .. } => Opcode::Move,
            Instruction::Add { .. } => Opcode::Add,
            Instruction::Sub { .. } => Opcode::Sub,
            Instruction::Write(_) => Opcode::Write,
            Instruction::Read(_) => Opcode::Read,
            Instruction::Load { .. } => Opcode::Load,
            Instruction::Store { .. } => Opcode::Store,
            Instruction::Push(_) => Opcode::Push,
            Instruction::Pop(_) => Opcode::Pop,
            Instruction::Break => Opcode::Break,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opcode = self.opcode();

        match self {
            Instruction::Jump(operand)
            | Instruction::Cond(operand)
            | Instruction::Write(operand)
            | Instruction::Push(operand) => write!(f, "{} {}", opcode, operand),
            Instruction::Read(register) | Instruction::Pop(register) => {
                write!(f, "{} {}", opcode, register)
            }
            Instruction::Move { dest, src } => write!(f, "{} {} {}", opcode, dest, src),
            Instruction::Add { dest, a, b } | Instruction::Sub { dest, a, b } => {
                write!(f, "{} {} {} {}", opcode, dest, a, b)
            }
            Instruction::Load { dest, address } => write!(f, "{} {} {}", opcode, dest, address),
            Instruction::Store { address, value } => write!(f, "{} {} {}", opcode, address, value),
            Instruction::Break => write!(f, "{}", opcode),
        }
    }
}
