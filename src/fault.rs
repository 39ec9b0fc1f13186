use std::fmt;

use num_enum::IntoPrimitive;

/// Runtime exceptions raised by the execution engine
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
pub enum Exception {
    /// Deliberate termination through `BREAK`
    None = 0,
    /// Bad operand kind for the context or a jump outside the code region
    InvalidInstruction = 1,
    /// Address outside the region the access is allowed in
    AccessViolation = 2,
    /// The code cell at the program counter holds no instruction
    NoInstruction = 3,
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exception::None => f.write_str("no exception"),
            Exception::InvalidInstruction => f.write_str("invalid instruction"),
            Exception::AccessViolation => f.write_str("access violation"),
            Exception::NoInstruction => f.write_str("no instruction"),
        }
    }
}

impl std::error::Error for Exception {}

/// A slot that can be filled exactly once.
///
/// Filling an already filled slot means the emulator reported two faults for
/// one run, which is a bug in the emulator itself and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultCell<T>(Option<T>);

impl<T> Default for FaultCell<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Copy + fmt::Debug> FaultCell<T> {
    /// Records `fault`
    ///
    /// # Panics
    ///
    /// Panics if the cell already holds a fault.
    pub fn set(&mut self, fault: T) {
        if let Some(previous) = self.0 {
            panic!(
                "fault {:?} raised while {:?} is already recorded",
                fault, previous
            );
        }

        self.0 = Some(fault);
    }

    pub fn get(&self) -> Option<T> {
        self.0
    }
}
