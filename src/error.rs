use thiserror::Error;

/// Errors raised while parsing program text into a [`Program`](crate::program::Program).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The text contained no values at all.
    #[error("program text is empty")]
    Empty,

    /// A comma-separated field was not a signed base-10 integer.
    #[error("value {index} is not an integer: {text:?}")]
    InvalidValue { index: usize, text: String },
}

/// Reasons an instruction word cannot be decoded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown opcode in word {0}")]
    UnknownOpcode(i64),

    #[error("invalid mode digit {digit} in word {word}")]
    InvalidMode { word: i64, digit: i64 },

    /// Write-role parameters must name an address.
    #[error("parameter {param} of word {word} is a write target in immediate mode")]
    ImmediateWrite { word: i64, param: usize },
}

/// Fatal faults of a single [`Computer`](crate::computer::Computer).
///
/// A fault halts the instance, and every later `run` or `step` returns the
/// same fault until a reset. Drivers propagate it and never retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("decode fault at ip {ip}: {source}")]
    Decode {
        ip: usize,
        #[source]
        source: DecodeError,
    },

    #[error("instance has halted")]
    Halted,

    /// Input was requested on an empty queue with blocking disabled.
    #[error("input exhausted at ip {ip}")]
    InputExhausted { ip: usize },

    #[error("negative address {address} at ip {ip}")]
    NegativeAddress { ip: usize, address: i64 },

    /// The tape would grow past its limit, or the allocator refused.
    #[error("address {address} beyond memory limit at ip {ip}")]
    MemoryLimit { ip: usize, address: i64 },

    #[error("arithmetic overflow at ip {ip}")]
    Overflow { ip: usize },

    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded { limit: usize },
}

impl Fault {
    /// Short stable name for the fault class, used for tallies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Fault::Decode {
                source: DecodeError::UnknownOpcode(_),
                ..
            } => "unknown-opcode",
            Fault::Decode {
                source: DecodeError::InvalidMode { .. },
                ..
            } => "invalid-mode",
            Fault::Decode {
                source: DecodeError::ImmediateWrite { .. },
                ..
            } => "immediate-write",
            Fault::Halted => "halted",
            Fault::InputExhausted { .. } => "input-exhausted",
            Fault::NegativeAddress { .. } => "negative-address",
            Fault::MemoryLimit { .. } => "memory-limit",
            Fault::Overflow { .. } => "overflow",
            Fault::StepLimitExceeded { .. } => "step-limit",
        }
    }
}
