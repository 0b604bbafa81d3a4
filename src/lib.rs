//! Ahead-of-time compiler for the mica language: a hand-written scanner and
//! recursive-descent parser produce an untyped AST, a single semantic pass
//! type-checks it while emitting IR through the backend builder, and the
//! module serialises to textual IR.

pub mod backend;
pub mod error;
pub mod frontend;
pub mod index;
pub mod middle;

use backend::builder::Builder;
use error::CompileError;
use frontend::{ast::CompileUnit, parser::Parser, SourceFile, SourceFileOrigin};
use middle::context::Context;

#[derive(Debug)]
pub struct CompileOutput {
    pub ast_dump: String,
    pub ir_text: String,
}

#[derive(Debug)]
pub struct CompileFailure {
    pub errors: Vec<CompileError>,
    /// Internal diagnostic sites; empty on any normal failure
    pub internal: Vec<String>,
}

pub fn parse(source: &SourceFile) -> Result<CompileUnit, Vec<CompileError>> {
    Parser::parse_unit(source)
}

pub fn print_ast(unit: &CompileUnit) -> String {
    frontend::print::print_unit(unit)
}

/// Runs the semantic pass over a parsed unit and serialises the resulting
/// module.
pub fn lower(source: &SourceFile, unit: &CompileUnit) -> Result<String, CompileFailure> {
    let module_name = match &source.origin {
        SourceFileOrigin::File(path) => path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        SourceFileOrigin::Memory => "<memory>".to_string(),
    };

    let mut ctx = Context::new();
    let mut builder = Builder::new(&module_name);

    match middle::lower::lower_unit(unit, &mut ctx, &mut builder) {
        Ok(()) => Ok(backend::print::print_module(builder.module())),
        Err(()) => {
            let (errors, internal) = ctx.into_diagnostics();
            Err(CompileFailure { errors, internal })
        }
    }
}

/// The full pipeline for one source file.
pub fn compile(source: &SourceFile) -> Result<CompileOutput, CompileFailure> {
    let unit = parse(source).map_err(|errors| CompileFailure {
        errors,
        internal: Vec::new(),
    })?;

    let ast_dump = print_ast(&unit);
    let ir_text = lower(source, &unit)?;

    Ok(CompileOutput { ast_dump, ir_text })
}
