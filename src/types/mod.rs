//! Type representation shared by the symbol table and the compiler.

pub mod type_repr;

pub use type_repr::{Type, ARRAY_CLASS};
