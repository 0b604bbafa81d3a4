use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser as ClapParser;
use colored::Colorize;

use mica::{
    error::CompileError,
    frontend::{SourceFile, SourceFileOrigin},
};

#[derive(Debug, ClapParser)]
#[command(version, about = "Compiler for the mica language", long_about = None)]
struct Args {
    /// Source file to compile
    source_file: PathBuf,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return ExitCode::FAILURE;
        }
    };

    let Ok(contents) = fs::read_to_string(&args.source_file) else {
        return ExitCode::FAILURE;
    };

    let source = SourceFile {
        contents,
        origin: SourceFileOrigin::File(args.source_file),
    };

    let unit = match mica::parse(&source) {
        Ok(unit) => unit,
        Err(errors) => {
            report(&source, &errors, &[]);
            return ExitCode::FAILURE;
        }
    };

    // The AST dump is written as soon as parsing succeeds
    if fs::write("a.txt", mica::print_ast(&unit)).is_err() {
        return ExitCode::FAILURE;
    }

    let ir_text = match mica::lower(&source, &unit) {
        Ok(ir_text) => ir_text,
        Err(failure) => {
            report(&source, &failure.errors, &failure.internal);
            return ExitCode::FAILURE;
        }
    };

    if fs::write("a.ll", ir_text).is_err() {
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn report(source: &SourceFile, errors: &[CompileError], internal: &[String]) {
    for error in errors {
        eprintln!("{}", error.render(&source.origin));
    }
    for site in internal {
        eprintln!("{}", format!("internal error at {site}").red());
    }
}
