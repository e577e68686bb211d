//! Instruction definitions for the target stack machine.

use std::fmt;

use crate::symbols::SymbolKind;

/// Named storage regions of the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Constant,
    Argument,
    Local,
    Static,
    This,
    That,
    Pointer,
    Temp,
}

impl Segment {
    /// Segment holding variables of `kind`; `None` for non-variable kinds.
    pub fn for_kind(kind: SymbolKind) -> Option<Segment> {
        match kind {
            SymbolKind::Static => Some(Segment::Static),
            SymbolKind::Field => Some(Segment::This),
            SymbolKind::Argument => Some(Segment::Argument),
            SymbolKind::Local => Some(Segment::Local),
            SymbolKind::Class
            | SymbolKind::Function
            | SymbolKind::Method
            | SymbolKind::Constructor => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Constant => "constant",
            Segment::Argument => "argument",
            Segment::Local => "local",
            Segment::Static => "static",
            Segment::This => "this",
            Segment::That => "that",
            Segment::Pointer => "pointer",
            Segment::Temp => "temp",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stack arithmetic and logic commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Neg,
    Eq,
    Lt,
    Gt,
    And,
    Or,
    Not,
}

impl ArithmeticOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "add",
            ArithmeticOp::Sub => "sub",
            ArithmeticOp::Neg => "neg",
            ArithmeticOp::Eq => "eq",
            ArithmeticOp::Lt => "lt",
            ArithmeticOp::Gt => "gt",
            ArithmeticOp::And => "and",
            ArithmeticOp::Or => "or",
            ArithmeticOp::Not => "not",
        }
    }
}

/// One VM instruction. `Display` renders the textual form written to the
/// output artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmCommand {
    Push(Segment, usize),
    Pop(Segment, usize),
    Arithmetic(ArithmeticOp),
    Label(String),
    Goto(String),
    IfGoto(String),
    /// `call <name> <argument count>`
    Call(String, usize),
    /// `function <name> <local count>`
    Function(String, usize),
    Return,
}

impl fmt::Display for VmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmCommand::Push(segment, index) => write!(f, "push {} {}", segment, index),
            VmCommand::Pop(segment, index) => write!(f, "pop {} {}", segment, index),
            VmCommand::Arithmetic(op) => f.write_str(op.as_str()),
            VmCommand::Label(label) => write!(f, "label {}", label),
            VmCommand::Goto(label) => write!(f, "goto {}", label),
            VmCommand::IfGoto(label) => write!(f, "if-goto {}", label),
            VmCommand::Call(name, args) => write!(f, "call {} {}", name, args),
            VmCommand::Function(name, locals) => write!(f, "function {} {}", name, locals),
            VmCommand::Return => f.write_str("return"),
        }
    }
}
