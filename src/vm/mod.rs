//! Target VM instructions and the writer producing the output artifact.
//!
//! - `instruction`: segments, arithmetic commands and the instruction enum
//! - `writer`: immediate/deferred output channels and instruction holes

pub mod instruction;
pub mod writer;

pub use instruction::{ArithmeticOp, Segment, VmCommand};
pub use writer::{BufferedLine, VmWriter};
