//! Single-pass compiler from class source to VM instructions.
//!
//! The engine parses by recursive descent, checks each construct as it is
//! recognised and emits code for it in the same step.

mod engine;
mod engine_calls;
mod engine_classes;
mod engine_exprs;
mod engine_stmts;

#[cfg(test)]
mod tests;

pub use engine::{CompilationEngine, CompileResult, CompiledClass, SubroutineContext};
