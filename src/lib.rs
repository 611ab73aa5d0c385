pub mod error;
pub mod program;
pub mod memory;
pub mod decode;
pub mod computer;
pub mod ascii;
pub mod disasm;
pub mod pipeline;
pub mod network;
pub mod sweep;
pub mod fuzz;

pub use computer::{Computer, ComputerConfig, State};
pub use error::{DecodeError, Fault, LoadError};
pub use program::Program;
