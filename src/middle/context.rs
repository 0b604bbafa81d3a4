//! Per-compilation state shared by the whole analysis pass: nested symbol
//! scopes, the item tables, the loop-exit stack, block bookkeeping flags and
//! the error list.

use crate::{
    backend::ir::{BlockId, FunctionId, StructId, ValueId},
    error::{CompileError, ErrorKind},
    frontend::lexer::Token,
    middle::ty::ValueType,
};

#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: ValueType,
    pub value: ValueId,
}

#[derive(Debug)]
pub struct FunctionInfo {
    pub name: String,
    pub params: Vec<ValueType>,
    pub is_variadic: bool,
    pub return_type: ValueType,
    pub ir_function: FunctionId,
}

#[derive(Debug)]
pub struct StructInfo {
    pub name: String,
    pub members: Vec<(String, ValueType)>,
    pub ir_type: StructId,
}

#[derive(Debug, Default)]
pub struct Context {
    scopes: Vec<Vec<Symbol>>,
    functions: Vec<FunctionInfo>,
    structs: Vec<StructInfo>,
    loop_exits: Vec<BlockId>,
    last_block: Option<BlockId>,
    breaked: bool,
    returned: bool,
    errors: Vec<CompileError>,
    internal: Vec<String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /* Symbol scopes */

    pub fn push_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    #[track_caller]
    pub fn pop_scope(&mut self) -> Result<(), ()> {
        if self.scopes.pop().is_none() {
            self.internal_error();
            return Err(());
        }
        Ok(())
    }

    /// Appends to the innermost scope. Shadowing an outer (or an earlier
    /// same-scope) name is allowed.
    #[track_caller]
    pub fn declare(&mut self, name: &str, ty: ValueType, value: ValueId) -> Result<(), ()> {
        let Some(scope) = self.scopes.last_mut() else {
            self.internal_error();
            return Err(());
        };

        scope.push(Symbol {
            name: name.to_string(),
            ty,
            value,
        });
        Ok(())
    }

    /// Searches scopes innermost-out; within a scope most recent first.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.iter().rev().find(|symbol| symbol.name == name))
    }

    /* Item tables. Struct and function names share no namespace with locals. */

    pub fn add_function(&mut self, info: FunctionInfo) {
        self.functions.push(info);
    }

    /// Linear scan in declaration order; the first match wins.
    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn add_struct(&mut self, info: StructInfo) {
        self.structs.push(info);
    }

    pub fn find_struct(&self, name: &str) -> Option<&StructInfo> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn find_struct_mut(&mut self, name: &str) -> Option<&mut StructInfo> {
        self.structs.iter_mut().find(|s| s.name == name)
    }

    /* Loop exits */

    pub fn push_loop_exit(&mut self, block: BlockId) {
        self.loop_exits.push(block);
    }

    #[track_caller]
    pub fn pop_loop_exit(&mut self) {
        if self.loop_exits.pop().is_none() {
            self.internal_error();
        }
    }

    pub fn current_loop_exit(&self) -> Option<BlockId> {
        self.loop_exits.last().copied()
    }

    /* Block bookkeeping */

    pub fn set_last_block(&mut self, block: Option<BlockId>) {
        self.last_block = block;
    }

    pub fn last_block(&self) -> Option<BlockId> {
        self.last_block
    }

    pub fn set_breaked(&mut self, flag: bool) {
        self.breaked = flag;
    }

    pub fn is_breaked(&self) -> bool {
        self.breaked
    }

    pub fn set_returned(&mut self, flag: bool) {
        self.returned = flag;
    }

    pub fn is_returned(&self) -> bool {
        self.returned
    }

    /* Diagnostics */

    pub fn report(&mut self, token: Token, kind: ErrorKind) {
        self.errors.push(CompileError::new(token, kind));
    }

    pub fn errors(&self) -> &[CompileError] {
        &self.errors
    }

    /// Records an internal invariant violation with the compiler source
    /// location that noticed it. These never fire on a valid program; the
    /// driver prints them for developer diagnosis.
    #[track_caller]
    pub fn internal_error(&mut self) {
        let location = std::panic::Location::caller();
        self.internal
            .push(format!("{}:{}", location.file(), location.line()));
    }

    pub fn into_diagnostics(self) -> (Vec<CompileError>, Vec<String>) {
        (self.errors, self.internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{index::Index, middle::ty::Basic};

    fn value(n: usize) -> ValueId {
        ValueId::new(n)
    }

    #[test]
    fn lookup_is_innermost_out_and_most_recent_first() {
        let mut ctx = Context::new();
        ctx.push_scope();
        ctx.declare("x", ValueType::scalar(Basic::I32), value(0)).unwrap();

        ctx.push_scope();
        ctx.declare("x", ValueType::scalar(Basic::I64), value(1)).unwrap();
        ctx.declare("x", ValueType::scalar(Basic::Bool), value(2)).unwrap();

        assert_eq!(ctx.lookup("x").unwrap().value, value(2));

        ctx.pop_scope().unwrap();
        assert_eq!(ctx.lookup("x").unwrap().value, value(0));

        ctx.pop_scope().unwrap();
        assert!(ctx.lookup("x").is_none());
    }

    #[test]
    fn popping_an_empty_scope_stack_fails() {
        let mut ctx = Context::new();
        assert!(ctx.pop_scope().is_err());
    }

    #[test]
    fn loop_exit_stack() {
        let mut ctx = Context::new();
        assert!(ctx.current_loop_exit().is_none());

        ctx.push_loop_exit(BlockId::new(1));
        ctx.push_loop_exit(BlockId::new(2));
        assert_eq!(ctx.current_loop_exit(), Some(BlockId::new(2)));

        ctx.pop_loop_exit();
        assert_eq!(ctx.current_loop_exit(), Some(BlockId::new(1)));
    }
}
