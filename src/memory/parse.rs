//! ```text
//! ; prints "hi" and stops
//!     WRITE 'h'
//!     WRITE #105
//!     BREAK
//! ```

use std::borrow::Cow;
use std::error;
use std::{fmt, str::Lines};

use num_enum::IntoPrimitive;

use crate::instruction::{Command, Directive, Instruction, Opcode, Operand, Register};
use crate::processor::{PC, SP};

use super::{Byte, Memory, Word};

/// Load faults, with the codes reported by the program loader
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive)]
pub enum ParseErrorKind {
    InvalidInstruction = 1,
    UnknownInstruction = 2,
    NoMemory = 3,
    FileOpen = 4,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::InvalidInstruction => f.write_str("invalid instruction"),
            ParseErrorKind::UnknownInstruction => f.write_str("unknown instruction"),
            ParseErrorKind::NoMemory => f.write_str("out of memory"),
            ParseErrorKind::FileOpen => f.write_str("failed to open source file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    kind: ParseErrorKind,
    context: Option<Cow<'static, str>>,
    line_nr: usize,
}

impl ParseError {
    pub(crate) fn new<C, S>(kind: ParseErrorKind, context: C, line_nr: usize) -> Self
    where
        C: Into<Option<S>>,
        S: Into<Cow<'static, str>>,
    {
        Self {
            kind,
            context: context.into().map(|inner| inner.into()),
            line_nr,
        }
    }

    pub fn kind(&self) -> ParseErrorKind {
        self.kind
    }

    /// Source line the error was found on, 0 if it concerns no line
    pub fn line_nr(&self) -> usize {
        self.line_nr
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(
                f,
                "error [ln: {}]: {} - {}",
                self.line_nr, self.kind, context
            )
        } else {
            write!(f, "error [ln: {}]: {}", self.line_nr, self.kind)
        }
    }
}

impl error::Error for ParseErrorKind {}

impl error::Error for ParseError {}

pub type Result<T, E = ParseError> = std::result::Result<T, E>;

/// The operand recognizers, tried in the order an operand position lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    Register,
    Address,
    Constant,
    Character,
}

const JUMP_TARGET: &[OperandKind] = &[OperandKind::Register, OperandKind::Address];
const VALUE: &[OperandKind] = &[
    OperandKind::Register,
    OperandKind::Constant,
    OperandKind::Address,
];
const OUTPUT: &[OperandKind] = &[
    OperandKind::Character,
    OperandKind::Constant,
    OperandKind::Register,
];
const INDIRECT: &[OperandKind] = &[OperandKind::Register, OperandKind::Constant];

/// Parses the decimal digits `text` starts with. Anything after them is
/// ignored.
fn parse_decimal(text: &str) -> Option<Word> {
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or_else(|| text.len());

    if end == 0 {
        return None;
    }

    text[..end].parse().ok()
}

/// `pc`, `sp` or `r<n>`
fn parse_register(text: &str) -> Option<Register> {
    let index = if text.eq_ignore_ascii_case("pc") {
        PC
    } else if text.eq_ignore_ascii_case("sp") {
        SP
    } else {
        parse_decimal(text.strip_prefix('r')?)? as usize
    };

    Register::new(index)
}

/// `<n>`
fn parse_address(text: &str) -> Option<Word> {
    parse_decimal(text)
}

/// `#<n>`
fn parse_constant(text: &str) -> Option<Word> {
    parse_decimal(text.strip_prefix('#')?)
}

/// `'<c>'`
fn parse_character(text: &str) -> Option<Byte> {
    match text.as_bytes() {
        [b'\'', byte, b'\'', ..] => Some(*byte),
        _ => None,
    }
}

/// Tries each recognizer of `kinds` in order and keeps the first match
fn parse_operand(text: &str, kinds: &[OperandKind]) -> Option<Operand> {
    kinds.iter().find_map(|kind| match kind {
        OperandKind::Register => parse_register(text).map(Operand::Register),
        OperandKind::Address => parse_address(text).map(Operand::Address),
        OperandKind::Constant => parse_constant(text).map(Operand::Constant),
        OperandKind::Character => parse_character(text).map(Operand::Character),
    })
}

/// Decodes a double quoted string literal. Only whitespace may follow the
/// closing quote.
fn parse_string(text: &str) -> Result<Vec<Byte>, &'static str> {
    let mut bytes = text
        .strip_prefix('"')
        .ok_or("a string needs to start with `\"`")?
        .as_bytes()
        .iter();
    let mut decoded = Vec::new();

    loop {
        let byte = match bytes.next() {
            Some(b'"') => break,
            Some(b'\\') => match bytes.next() {
                Some(b'\\') => b'\\',
                Some(b'a') => 0x07,
                Some(b'b') => 0x08,
                Some(b'f') => 0x0c,
                Some(b'n') => b'\n',
                Some(b'r') => b'\r',
                Some(b't') => b'\t',
                Some(b'v') => 0x0b,
                Some(b'"') => b'"',
                Some(b'0') => 0,
                _ => return Err("invalid escape sequence"),
            },
            Some(byte) => *byte,
            None => return Err("unterminated string"),
        };

        decoded.push(byte);
    }

    if !bytes.as_slice().iter().all(u8::is_ascii_whitespace) {
        return Err("unexpected characters after the string");
    }

    if decoded.is_empty() {
        return Err("a string needs at least one character");
    }

    Ok(decoded)
}

/// Splits the first whitespace delimited token off `text`
fn split_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }

    let end = text
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or_else(|| text.len());
    Some((&text[..end], &text[end..]))
}

/// Assembles source text into a [`Memory`].
///
/// Instructions are appended to the code region. Directives write into the
/// data region, checked against the code boundary as it stands when the
/// directive is reached.
#[derive(Debug)]
pub struct Parser<'a, 'm> {
    lines: Lines<'a>,
    line_nr: usize,
    memory: &'m mut Memory,
}

impl<'a, 'm> Parser<'a, 'm> {
    /// Creates a new parser for `data` which will populate `memory`.
    pub fn new(data: &'a str, memory: &'m mut Memory) -> Self {
        Self {
            lines: data.lines(),
            line_nr: 0,
            memory,
        }
    }

    /// Consumes `self` and parses all lines into memory.
    ///
    /// # Errors
    ///
    /// Stops at the first faulty line. Whatever was written to memory before
    /// is left in place and must not be executed.
    pub fn parse(mut self) -> Result<()> {
        while let Some(res) = self.parse_next_line() {
            if let Err(err) = res {
                log::error!("{}", err);
                return Err(err);
            }
        }

        Ok(())
    }

    /// Tries to parse the next line. Each statement is located on its own
    /// line.
    fn parse_next_line(&mut self) -> Option<Result<()>> {
        let line = self.lines.next()?.trim();
        self.line_nr += 1;

        if line.is_empty() || line.starts_with(';') {
            // Comment or empty line; skip
            return Some(Ok(()));
        }

        Some(self.parse_statement(line))
    }

    fn parse_statement(&mut self, line: &str) -> Result<()> {
        // `line` is trimmed and not empty
        let (mnemonic, rest) = split_token(line).unwrap_or((line, ""));

        let command = Command::find(mnemonic).ok_or_else(|| {
            self.error(
                ParseErrorKind::UnknownInstruction,
                format!("no instruction matching `{}` was found", mnemonic),
            )
        })?;

        match command {
            Command::Instruction(opcode) => {
                let operands: Vec<&str> = rest.split_ascii_whitespace().collect();
                let instruction = self.parse_instruction(opcode, &operands)?;

                log::debug!("[{}] Found instruction {}", self.line_nr, instruction);

                let capacity = self.memory.capacity();
                self.memory.push_instruction(instruction).map_err(|kind| {
                    self.error(
                        kind,
                        format!("no room for more than {} instruction(s)", capacity),
                    )
                })
            }
            Command::Directive(Directive::DefineWord) => self.parse_define_word(rest),
            Command::Directive(Directive::DefineString) => self.parse_define_string(rest),
        }
    }

    /// Builds the instruction for `opcode` out of its operand tokens.
    ///
    /// # Examples
    ///
    /// - `JUMP r3`
    /// - `ADD r1 r0 #3`
    fn parse_instruction(&self, opcode: Opcode, operands: &[&str]) -> Result<Instruction> {
        let instruction = match (opcode, operands) {
            (Opcode::Jump, [target]) => Instruction::Jump(self.operand(target, JUMP_TARGET)?),
            (Opcode::Cond, [condition]) => Instruction::Cond(self.operand(condition, VALUE)?),
            (Opcode::Move, [dest, src]) => Instruction::Move {
                dest: self.operand(dest, VALUE)?,
                src: self.operand(src, VALUE)?,
            },
            (Opcode::Add, [dest, a, b]) => Instruction::Add {
                dest: self.register(dest)?,
                a: self.operand(a, VALUE)?,
                b: self.operand(b, VALUE)?,
            },
            (Opcode::Sub, [dest, a, b]) => Instruction::Sub {
                dest: self.register(dest)?,
                a: self.operand(a, VALUE)?,
                b: self.operand(b, VALUE)?,
            },
            (Opcode::Write, [value]) => Instruction::Write(self.operand(value, OUTPUT)?),
            (Opcode::Read, [dest]) => Instruction::Read(self.register(dest)?),
            (Opcode::Load, [dest, address]) => Instruction::Load {
                dest: self.register(dest)?,
                address: self.operand(address, INDIRECT)?,
            },
            (Opcode::Store, [address, value]) => Instruction::Store {
                address: self.operand(address, INDIRECT)?,
                value: self.operand(value, INDIRECT)?,
            },
            (Opcode::Push, [value]) => Instruction::Push(self.operand(value, INDIRECT)?),
            (Opcode::Pop, [dest]) => Instruction::Pop(self.register(dest)?),
            (Opcode::Break, []) => Instruction::Break,
            (opcode, operands) => {
                return Err(self.error(
                    ParseErrorKind::InvalidInstruction,
                    format!(
                        "`{}` does not take {} operand(s)",
                        opcode,
                        operands.len()
                    ),
                ))
            }
        };

        Ok(instruction)
    }

    /// Tries to parse line as a word definition.
    ///
    /// # Examples
    ///
    /// - `DW 9000 #42`
    fn parse_define_word(&mut self, rest: &str) -> Result<()> {
        let operands: Vec<&str> = rest.split_ascii_whitespace().collect();
        let (address, word) = match operands[..] {
            [address, word] => (address, word),
            _ => {
                return Err(self.error(
                    ParseErrorKind::InvalidInstruction,
                    format!("`DW` does not take {} operand(s)", operands.len()),
                ))
            }
        };

        let address = parse_address(address).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                format!("`{}` is not an address", address),
            )
        })?;
        let word = parse_constant(word).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                format!("`{}` is not a constant", word),
            )
        })?;

        log::debug!("[{}] Found word 0x{:x} at {}", self.line_nr, word, address);

        self.memory
            .write_word(address, word)
            .map_err(|_| self.outside_data_region(address))
    }

    /// Tries to parse line as a string definition. The string is not
    /// terminated.
    ///
    /// # Examples
    ///
    /// - `DS 100 "Hello, world!\n"`
    fn parse_define_string(&mut self, rest: &str) -> Result<()> {
        let (address, string) = split_token(rest).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                "`DS` needs an address and a string",
            )
        })?;

        let address = parse_address(address).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                format!("`{}` is not an address", address),
            )
        })?;
        let bytes = parse_string(string.trim_start())
            .map_err(|reason| self.error(ParseErrorKind::InvalidInstruction, reason))?;

        log::debug!(
            "[{}] Found string of {} byte(s) at {}",
            self.line_nr,
            bytes.len(),
            address
        );

        self.memory
            .write_bytes(address, &bytes)
            .map_err(|_| self.outside_data_region(address))
    }

    fn operand(&self, text: &str, kinds: &[OperandKind]) -> Result<Operand> {
        parse_operand(text, kinds).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                format!("`{}` is not a valid operand here", text),
            )
        })
    }

    fn register(&self, text: &str) -> Result<Register> {
        parse_register(text).ok_or_else(|| {
            self.error(
                ParseErrorKind::InvalidInstruction,
                format!("`{}` is not a register", text),
            )
        })
    }

    fn outside_data_region(&self, address: Word) -> ParseError {
        self.error(
            ParseErrorKind::InvalidInstruction,
            format!("address {} is outside the data region", address),
        )
    }

    fn error<S: Into<Cow<'static, str>>>(&self, kind: ParseErrorKind, context: S) -> ParseError {
        ParseError {
            kind,
            context: Some(context.into()),
            line_nr: self.line_nr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use color_eyre::Result;

    fn assemble(data: &str) -> std::result::Result<Memory, ParseError> {
        let mut mem = Memory::default();
        Parser::new(data, &mut mem).parse()?;
        Ok(mem)
    }

    fn r(index: usize) -> Register {
        Register::new(index).unwrap()
    }

    #[test]
    fn parse_program() -> Result<()> {
        let data = r#"
            ; adds two numbers

            MOVE r0 #5
              add r1 r0 #3
            BREAK
        "#;

        let mem = assemble(data)?;

        assert_eq!(mem.instructions(), 3);
        assert_eq!(
            mem.instruction(0),
            Some(&Instruction::Move {
                dest: Operand::Register(r(0)),
                src: Operand::Constant(5),
            })
        );
        assert_eq!(
            mem.instruction(1),
            Some(&Instruction::Add {
                dest: r(1),
                a: Operand::Register(r(0)),
                b: Operand::Constant(3),
            })
        );
        assert_eq!(mem.instruction(2), Some(&Instruction::Break));

        Ok(())
    }

    #[test]
    fn parse_recognizers() {
        assert_eq!(parse_register("pc"), Some(Register::PC));
        assert_eq!(parse_register("SP"), Some(Register::SP));
        assert_eq!(parse_register("r15"), Some(r(15)));
        assert_eq!(parse_register("r16"), None);
        assert_eq!(parse_register("R1"), None);
        assert_eq!(parse_register("r"), None);

        assert_eq!(parse_address("42"), Some(42));
        assert_eq!(parse_address("#42"), None);
        assert_eq!(parse_address("4294967296"), None);

        assert_eq!(parse_constant("#7"), Some(7));
        assert_eq!(parse_constant("#"), None);
        assert_eq!(parse_constant("7"), None);

        assert_eq!(parse_character("'a'"), Some(b'a'));
        assert_eq!(parse_character("'a"), None);
        assert_eq!(parse_character("a"), None);
    }

    #[test]
    fn parse_try_order() {
        // a register-or-constant-or-address position
        assert_eq!(
            parse_operand("r3", VALUE),
            Some(Operand::Register(r(3)))
        );
        assert_eq!(parse_operand("#3", VALUE), Some(Operand::Constant(3)));
        assert_eq!(parse_operand("3", VALUE), Some(Operand::Address(3)));

        // output position prefers characters and constants
        assert_eq!(parse_operand("'r'", OUTPUT), Some(Operand::Character(b'r')));
        assert_eq!(parse_operand("#65", OUTPUT), Some(Operand::Constant(65)));
        assert_eq!(parse_operand("65", OUTPUT), None);

        assert_eq!(parse_operand("3", INDIRECT), None);
        assert_eq!(parse_operand("3", JUMP_TARGET), Some(Operand::Address(3)));
    }

    #[test]
    fn parse_move_to_constant_is_accepted() -> Result<()> {
        let mem = assemble("MOVE #1 r0")?;
        assert_eq!(
            mem.instruction(0),
            Some(&Instruction::Move {
                dest: Operand::Constant(1),
                src: Operand::Register(r(0)),
            })
        );

        Ok(())
    }

    #[test]
    fn parse_rejects_illegal_operand_kinds() {
        for source in &[
            "ADD #1 r0 r0",
            "READ #1",
            "POP 12",
            "LOAD r0 12",
            "STORE 12 r0",
            "PUSH 'a'",
            "JUMP #1",
            "WRITE 65",
            "COND 'a'",
        ] {
            let err = assemble(source).unwrap_err();
            assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction, "{}", source);
        }
    }

    #[test]
    fn parse_operand_count() {
        for source in &["BREAK r0", "JUMP", "MOVE r0", "ADD r0 r1", "POP r0 r1"] {
            let err = assemble(source).unwrap_err();
            assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction, "{}", source);
        }
    }

    #[test]
    fn parse_unknown_instruction() {
        let err = assemble("BREAK\nNOP\n").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::UnknownInstruction);
        assert_eq!(err.line_nr(), 2);
    }

    #[test]
    fn parse_fails_fast() {
        let mut mem = Memory::default();
        let err = Parser::new("BREAK\nJUMP\nBREAK\n", &mut mem)
            .parse()
            .unwrap_err();

        assert_eq!(err.line_nr(), 2);
        assert_eq!(mem.instructions(), 1);
    }

    #[test]
    fn parse_code_region_overflow() -> Result<()> {
        let mut mem = Memory::new(2)?;
        let err = Parser::new("MOVE r0 #1\nMOVE r1 #2\nMOVE r2 #3\nBREAK", &mut mem)
            .parse()
            .unwrap_err();

        assert_eq!(err.kind(), ParseErrorKind::NoMemory);
        assert_eq!(err.line_nr(), 3);
        assert_eq!(mem.instructions(), 2);

        Ok(())
    }

    #[test]
    fn parse_define_word() -> Result<()> {
        let mut mem = Memory::new(10_000)?;
        Parser::new("BREAK\nDW 9000 #42", &mut mem).parse()?;

        assert_eq!(mem.instructions(), 1);
        assert_eq!(mem.read_word(9000), Ok(42));

        Ok(())
    }

    #[test]
    fn parse_define_word_checks_region() {
        // the boundary is 1 when the directive is parsed
        let err = assemble("BREAK\nDW 0 #1").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction);

        let err = assemble("DW 8191 #1").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction);

        let err = assemble("DW 100 42").unwrap_err();
        assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction);
    }

    #[test]
    fn parse_directive_uses_current_boundary() -> Result<()> {
        // accepted while the code region is still empty, the instruction
        // assembled afterwards claims the cell
        let mem = assemble("DW 0 #7\nBREAK")?;
        assert_eq!(mem.instructions(), 1);
        assert_eq!(mem.instruction(0), Some(&Instruction::Break));

        Ok(())
    }

    #[test]
    fn parse_define_string() -> Result<()> {
        let mem = assemble(r#"DS 100 "AB\n""#)?;

        assert_eq!(mem.instructions(), 0);
        assert_eq!(mem.read_word(100), Ok(0x41));
        assert_eq!(mem.read_word(101), Ok(0x42));
        assert_eq!(mem.read_word(102), Ok(0x0a));
        assert_eq!(mem.read_word(103), Ok(0));

        Ok(())
    }

    #[test]
    fn parse_define_string_escapes() -> Result<()> {
        let mem = assemble(r#"ds 10 "a b\t\"\\\0\v""#)?;

        let expected = [b'a', b' ', b'b', b'\t', b'"', b'\\', 0, 0x0b];
        for (offset, byte) in expected.iter().enumerate() {
            assert_eq!(mem.read_word(10 + offset as Word), Ok(*byte as Word));
        }

        Ok(())
    }

    #[test]
    fn parse_define_string_errors() {
        for source in &[
            r#"DS 10 "bad \q escape""#,
            r#"DS 10 "unterminated"#,
            r#"DS 10 """#,
            r#"DS 10 "trailing" x"#,
            r#"DS 10 plain"#,
            r#"DS "no address""#,
            r#"DS 8190 "ab""#,
        ] {
            let err = assemble(source).unwrap_err();
            assert_eq!(err.kind(), ParseErrorKind::InvalidInstruction, "{}", source);
        }
    }

    #[test]
    fn parse_listing_reassembles() -> Result<()> {
        let data = "JUMP r2\nCOND 40\nMOVE 50 pc\nSUB r1 #1 sp\nWRITE '!'\nREAD r3\n\
                    LOAD r0 #60\nSTORE r1 #2\nPUSH #9\nPOP r4\nBREAK";
        let mem = assemble(data)?;

        let listing: Vec<String> = (0..mem.instructions())
            .filter_map(|address| mem.instruction(address))
            .map(|instruction| instruction.to_string())
            .collect();
        assert_eq!(listing.join("\n"), data);
        assert_eq!(assemble(&listing.join("\n"))?, mem);

        Ok(())
    }

    #[test]
    fn parse_display() {
        let err = ParseError::new(ParseErrorKind::UnknownInstruction, "no `NOP`", 3);
        assert_eq!(err.to_string(), "error [ln: 3]: unknown instruction - no `NOP`");
        assert_eq!(u32::from(err.kind()), 2);
    }
}
