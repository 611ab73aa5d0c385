use crate::error::DecodeError;

/// Widest instruction in the table: an opcode word plus three parameters.
pub const MAX_PARAMS: usize = 3;

/// How a parameter's raw value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// The value is an absolute address.
    Position,
    /// The value is the operand itself.
    Immediate,
    /// The value is an offset from the relative base.
    Relative,
}

/// Whether a parameter is dereferenced as an input or names a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Read,
    Write,
}

use Role::{Read, Write};

/// The fixed Intcode opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Mul,
    Input,
    Output,
    JumpIfTrue,
    JumpIfFalse,
    LessThan,
    Equals,
    AdjustRelativeBase,
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 10] = [
        Opcode::Add,
        Opcode::Mul,
        Opcode::Input,
        Opcode::Output,
        Opcode::JumpIfTrue,
        Opcode::JumpIfFalse,
        Opcode::LessThan,
        Opcode::Equals,
        Opcode::AdjustRelativeBase,
        Opcode::Halt,
    ];

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustRelativeBase,
            99 => Opcode::Halt,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Mul => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::JumpIfTrue => 5,
            Opcode::JumpIfFalse => 6,
            Opcode::LessThan => 7,
            Opcode::Equals => 8,
            Opcode::AdjustRelativeBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Role of each parameter, in order. The length is the arity.
    pub fn roles(self) -> &'static [Role] {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => &[Read, Read, Write],
            Opcode::Input => &[Write],
            Opcode::Output | Opcode::AdjustRelativeBase => &[Read],
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => &[Read, Read],
            Opcode::Halt => &[],
        }
    }

    pub fn arity(self) -> usize {
        self.roles().len()
    }

    /// Number of tape cells the instruction occupies.
    pub fn width(self) -> usize {
        self.arity() + 1
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Input => "IN",
            Opcode::Output => "OUT",
            Opcode::JumpIfTrue => "JNZ",
            Opcode::JumpIfFalse => "JZ",
            Opcode::LessThan => "LT",
            Opcode::Equals => "EQ",
            Opcode::AdjustRelativeBase => "ARB",
            Opcode::Halt => "HALT",
        }
    }
}

/// A decoded instruction word. Only the first `opcode.arity()` modes are
/// meaningful; the rest are `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [Mode; MAX_PARAMS],
}

impl Instruction {
    pub fn params(&self) -> impl Iterator<Item = (Role, Mode)> + '_ {
        self.opcode.roles().iter().copied().zip(self.modes)
    }
}

/// Decode an instruction word.
///
/// The low two decimal digits select the opcode; the remaining digits,
/// least significant first, give one mode per parameter. Missing digits
/// default to position mode and digits beyond the opcode's arity are
/// ignored. With `relative` unset, opcode 9 and mode 2 are rejected.
pub fn decode(word: i64, relative: bool) -> Result<Instruction, DecodeError> {
    if word < 0 {
        return Err(DecodeError::UnknownOpcode(word));
    }
    let opcode = match Opcode::from_code(word % 100) {
        Some(Opcode::AdjustRelativeBase) if !relative => {
            return Err(DecodeError::UnknownOpcode(word));
        }
        Some(op) => op,
        None => return Err(DecodeError::UnknownOpcode(word)),
    };

    let mut modes = [Mode::Position; MAX_PARAMS];
    let mut digits = word / 100;
    for (param, &role) in opcode.roles().iter().enumerate() {
        let digit = digits % 10;
        digits /= 10;
        modes[param] = match digit {
            0 => Mode::Position,
            1 if role == Write => return Err(DecodeError::ImmediateWrite { word, param }),
            1 => Mode::Immediate,
            2 if relative => Mode::Relative,
            _ => return Err(DecodeError::InvalidMode { word, digit }),
        };
    }

    Ok(Instruction { opcode, modes })
}
