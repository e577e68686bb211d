//! jackc CLI: compile a source file or a directory of source files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use jackc::error::CompileError;
use jackc::{compile_path, is_source_file, CompileOptions, FileReport, SOURCE_EXTENSION};

/// Exit status for unusable command lines, matching clap's own.
const USAGE_ERROR: u8 = 2;

/// jackc - compile classes to stack-machine VM code
#[derive(Parser, Debug)]
#[command(name = "jackc", version)]
#[command(about = "Compile .jack classes to .vm files", long_about = None)]
struct Args {
    /// A .jack file, or a directory whose .jack files are compiled
    path: PathBuf,

    /// Print each class's symbol table and unresolved identifiers
    #[arg(long)]
    dump_symbols: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    if args.no_color {
        colored::control::set_override(false);
    }

    if !args.path.exists() {
        eprintln!(
            "{} '{}' does not exist",
            "error:".red().bold(),
            args.path.display()
        );
        return ExitCode::from(USAGE_ERROR);
    }
    if args.path.is_file() && !is_source_file(&args.path) {
        eprintln!(
            "{} '{}' is not a .{} file",
            "error:".red().bold(),
            args.path.display(),
            SOURCE_EXTENSION
        );
        return ExitCode::from(USAGE_ERROR);
    }

    let options = CompileOptions {
        dump_symbols: args.dump_symbols,
    };
    let reports = match compile_path(&args.path, &options) {
        Ok(reports) => reports,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            return ExitCode::FAILURE;
        }
    };

    if reports.is_empty() {
        eprintln!(
            "{} no .{} files in '{}'",
            "error:".red().bold(),
            SOURCE_EXTENSION,
            args.path.display()
        );
        return ExitCode::FAILURE;
    }

    let mut failed = 0;
    for report in &reports {
        print_report(report);
        if !report.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Logging is off unless `JACKC_LOG` holds a filter such as `debug`.
fn init_logging() {
    let Ok(filter) = EnvFilter::try_from_env("JACKC_LOG") else {
        return;
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_report(report: &FileReport) {
    match &report.result {
        Ok(class) => {
            println!(
                "{} {} -> {} ({} instructions)",
                "Compiled".green().bold(),
                report.source.display(),
                report.output.display(),
                class.lines
            );
            if let Some(dump) = &report.symbol_dump {
                println!("{}", dump);
            }
        }
        Err(CompileError::Semantic(errors)) => {
            for error in errors {
                eprintln!("{}", error.to_string().red());
            }
            eprintln!(
                "{} {}: {} semantic error(s), no output written",
                "Failed".red().bold(),
                report.source.display(),
                errors.len()
            );
        }
        Err(err) => {
            eprintln!("{}", err.to_string().red());
            eprintln!(
                "{} {}: no output written",
                "Failed".red().bold(),
                report.source.display()
            );
        }
    }
}
