//! jackc: a single-pass compiler from a small class-based language to
//! stack-machine VM code.
//!
//! Each source file declares one class and compiles to one sibling `.vm`
//! file. Parsing, semantic analysis and code generation happen in one pass
//! over the token stream; see [`compiler::CompilationEngine`].

#![allow(clippy::result_large_err)]

pub mod compiler;
pub mod error;
pub mod lexer;
pub mod symbols;
pub mod types;
pub mod vm;

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use compiler::{CompilationEngine, CompiledClass};
use error::CompileError;
use vm::VmWriter;

/// Extension of source files.
pub const SOURCE_EXTENSION: &str = "jack";

/// Extension of the generated instruction files.
pub const OUTPUT_EXTENSION: &str = "vm";

/// Options for the file driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Render each compiled class's symbol table and unresolved identifiers.
    pub dump_symbols: bool,
}

/// Outcome of compiling one source file.
#[derive(Debug)]
pub struct FileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub result: Result<CompiledClass, CompileError>,
    /// Present when requested and the file compiled.
    pub symbol_dump: Option<String>,
}

impl FileReport {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Compile source text in memory and return the generated instructions.
pub fn compile_source(source: &str) -> Result<(CompiledClass, String), CompileError> {
    let engine = CompilationEngine::new(source, VmWriter::new(Vec::new()));
    let (class, out) = engine.compile()?;
    Ok((class, String::from_utf8_lossy(&out).into_owned()))
}

/// Path of the instruction file generated for `source`.
pub fn output_path(source: &Path) -> PathBuf {
    source.with_extension(OUTPUT_EXTENSION)
}

pub fn is_source_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SOURCE_EXTENSION)
}

/// Compile one source file into its sibling `.vm` file.
///
/// The output file is removed again when compilation fails.
pub fn compile_file(path: &Path) -> Result<CompiledClass, CompileError> {
    let _span = tracing::debug_span!("compile", file = %path.display()).entered();

    let source = fs::read_to_string(path).map_err(|e| CompileError::io(path, e))?;
    let output = output_path(path);
    let writer = VmWriter::create(&output).map_err(|e| CompileError::io(&output, e))?;

    let (class, _) = CompilationEngine::new(&source, writer).compile()?;
    tracing::debug!(class = %class.class_name, lines = class.lines, "compiled");
    Ok(class)
}

/// Source files directly inside `dir`, sorted by name.
pub fn discover_sources(dir: &Path) -> Result<Vec<PathBuf>, CompileError> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| CompileError::io(dir, e.into()))?;
        if entry.file_type().is_file() && is_source_file(entry.path()) {
            sources.push(entry.into_path());
        }
    }
    Ok(sources)
}

/// Compile a single file, or every source file in a directory.
///
/// Files are compiled independently: one failing file does not stop the
/// others. The outer error is only returned when the directory itself
/// cannot be read.
pub fn compile_path(
    path: &Path,
    options: &CompileOptions,
) -> Result<Vec<FileReport>, CompileError> {
    let sources = if path.is_dir() {
        discover_sources(path)?
    } else {
        vec![path.to_path_buf()]
    };
    tracing::debug!(count = sources.len(), "compiling sources");

    Ok(sources
        .into_iter()
        .map(|source| {
            let result = compile_file(&source);
            let symbol_dump = match &result {
                Ok(class) if options.dump_symbols => Some(dump_symbols(class)),
                _ => None,
            };
            FileReport {
                output: output_path(&source),
                source,
                result,
                symbol_dump,
            }
        })
        .collect())
}

/// The symbol table tree followed by the identifiers left for linking.
pub fn dump_symbols(class: &CompiledClass) -> String {
    let mut out = class.symbols.to_string();
    if class.unresolved.is_empty() {
        out.push_str("Unresolved identifiers: none\n");
        return out;
    }

    out.push_str("Unresolved identifiers:\n");
    for reference in &class.unresolved {
        let _ = writeln!(
            out,
            "  {} (class {}, line {})",
            reference, reference.class_name, reference.line
        );
    }
    out
}
