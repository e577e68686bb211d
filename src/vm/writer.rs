//! Two-channel instruction writer.
//!
//! A subroutine's header carries its final local count, which is only known
//! once the whole body has been parsed. Body instructions therefore go to a
//! deferred buffer; the header is written straight to the output and the
//! buffer is flushed right after it with [`VmWriter::write_now`].
//!
//! The buffer may also hold holes: instructions that depend on declarations
//! later in the class. A body with holes is taken out with
//! [`VmWriter::take_buffer`] and emitted again once they are filled.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::vm::instruction::{ArithmeticOp, Segment, VmCommand};

/// One entry of the deferred buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedLine {
    Command(VmCommand),
    /// Placeholder for zero or more instructions, identified by the caller.
    Hole(usize),
}

pub struct VmWriter<W: Write> {
    out: W,
    buffer: Vec<BufferedLine>,
    artifact: Option<PathBuf>,
    written: usize,
}

impl VmWriter<BufWriter<File>> {
    /// Create the output artifact at `path`, truncating any previous one.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = Self::new(BufWriter::new(file));
        writer.artifact = Some(path.to_path_buf());
        Ok(writer)
    }
}

impl<W: Write> VmWriter<W> {
    /// Write into an arbitrary sink. No artifact is removed on discard.
    pub fn new(out: W) -> Self {
        Self {
            out,
            buffer: Vec::new(),
            artifact: None,
            written: 0,
        }
    }

    /// Path of the output artifact, if writing to a file.
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Lines written to the output so far.
    pub fn lines_written(&self) -> usize {
        self.written
    }

    /// Lines waiting in the deferred buffer.
    pub fn buffered(&self) -> &[BufferedLine] {
        &self.buffer
    }

    /// Move the deferred buffer out, leaving it empty.
    pub fn take_buffer(&mut self) -> Vec<BufferedLine> {
        std::mem::take(&mut self.buffer)
    }

    // ===== Deferred channel =====

    pub fn emit(&mut self, command: VmCommand) {
        self.buffer.push(BufferedLine::Command(command));
    }

    pub fn write_hole(&mut self, id: usize) {
        self.buffer.push(BufferedLine::Hole(id));
    }

    pub fn write_push(&mut self, segment: Segment, index: usize) {
        self.emit(VmCommand::Push(segment, index));
    }

    pub fn write_pop(&mut self, segment: Segment, index: usize) {
        self.emit(VmCommand::Pop(segment, index));
    }

    pub fn write_arithmetic(&mut self, op: ArithmeticOp) {
        self.emit(VmCommand::Arithmetic(op));
    }

    pub fn write_label(&mut self, label: impl Into<String>) {
        self.emit(VmCommand::Label(label.into()));
    }

    pub fn write_goto(&mut self, label: impl Into<String>) {
        self.emit(VmCommand::Goto(label.into()));
    }

    pub fn write_if(&mut self, label: impl Into<String>) {
        self.emit(VmCommand::IfGoto(label.into()));
    }

    pub fn write_call(&mut self, name: impl Into<String>, args: usize) {
        self.emit(VmCommand::Call(name.into(), args));
    }

    pub fn write_return(&mut self) {
        self.emit(VmCommand::Return);
    }

    // ===== Immediate channel =====

    /// Write a function header directly to the output, ahead of the buffer.
    pub fn write_function(&mut self, name: &str, locals: usize) -> io::Result<()> {
        self.write_immediate(&VmCommand::Function(name.to_string(), locals))
    }

    /// Append every buffered instruction to the output and clear the buffer.
    ///
    /// Fails on a hole that was never filled.
    pub fn write_now(&mut self) -> io::Result<()> {
        for line in std::mem::take(&mut self.buffer) {
            match line {
                BufferedLine::Command(command) => self.write_immediate(&command)?,
                BufferedLine::Hole(id) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("unfilled instruction hole #{}", id),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Flush the output and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        self.write_now()?;
        self.out.flush()?;
        Ok(self.out)
    }

    /// Delete the output artifact. The writer is consumed so nothing can be
    /// written after the discard.
    pub fn discard_output(self) -> io::Result<()> {
        let Self { out, artifact, .. } = self;
        drop(out);
        if let Some(path) = artifact {
            tracing::debug!(path = %path.display(), "discarding output");
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Write one instruction straight to the output, bypassing the buffer.
    pub fn write_immediate(&mut self, command: &VmCommand) -> io::Result<()> {
        writeln!(self.out, "{}", command)?;
        self.written += 1;
        Ok(())
    }
}
