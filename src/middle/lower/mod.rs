//! The semantic core: a single bottom-up pass over the AST that type-checks
//! and emits IR side by side. Items are processed in two passes each (struct
//! types before bodies, function signatures before definitions) so forward
//! references resolve.

mod expr;
mod stmt;

pub use expr::{Folded, Lowered};

use crate::{
    backend::{builder::Builder, ir::BlockId},
    error::ErrorKind,
    frontend::ast,
    middle::{
        context::{Context, FunctionInfo, StructInfo},
        ty::{Basic, LiteralKind, ValueType},
    },
};

pub type LowerResult<T> = Result<T, ()>;

pub fn lower_unit(
    unit: &ast::CompileUnit,
    ctx: &mut Context,
    builder: &mut Builder,
) -> LowerResult<()> {
    let mut lowering = Lowering {
        ctx,
        builder,
        current_function: None,
        return_type: ValueType::scalar(Basic::Void),
        const_only: false,
    };
    lowering.unit(unit)
}

pub(super) struct Lowering<'a> {
    pub ctx: &'a mut Context,
    pub builder: &'a mut Builder,
    current_function: Option<crate::backend::ir::FunctionId>,
    pub(super) return_type: ValueType,
    /// Set while resolving array-size expressions, where nothing may emit
    /// instructions
    pub(super) const_only: bool,
}

impl<'a> Lowering<'a> {
    fn unit(&mut self, unit: &ast::CompileUnit) -> LowerResult<()> {
        for item in &unit.structs {
            self.declare_struct(item);
        }
        for item in &unit.structs {
            self.fill_struct(item)?;
        }

        for function in &unit.functions {
            self.declare_function(function)?;
        }
        for function in &unit.functions {
            self.define_function(function)?;
        }

        Ok(())
    }

    /* Structs */

    fn declare_struct(&mut self, item: &ast::StructItem) {
        let ir_type = self.builder.create_struct_type(&item.name.lexeme);
        self.ctx.add_struct(StructInfo {
            name: item.name.lexeme.clone(),
            members: Vec::new(),
            ir_type,
        });
    }

    fn fill_struct(&mut self, item: &ast::StructItem) -> LowerResult<()> {
        let mut members = Vec::new();
        let mut body = vec![self.builder.size_type(), self.builder.type_id_type()];

        for member in &item.members {
            let ty = self.resolve_type(&member.ty)?;

            let Some(ir_ty) = ty.ir_type(self.builder) else {
                self.ctx.internal_error();
                return Err(());
            };

            body.push(ir_ty);
            members.push((member.name.lexeme.clone(), ty));
        }

        let Some(info) = self.ctx.find_struct_mut(&item.name.lexeme) else {
            self.ctx.internal_error();
            return Err(());
        };
        let ir_type = info.ir_type;
        info.members = members;

        self.builder.set_struct_body(ir_type, body);
        Ok(())
    }

    /* Functions */

    fn declare_function(&mut self, function: &ast::Function) -> LowerResult<()> {
        let return_type = self.resolve_type(&function.return_type)?;

        let mut params = Vec::new();
        let mut param_ir = Vec::new();

        for parameter in &function.parameters {
            let mut ty = self.resolve_type(&parameter.ty)?;
            ty.is_argument = true;

            let Some(ir_ty) = ty.ir_type(self.builder) else {
                self.ctx.internal_error();
                return Err(());
            };

            param_ir.push(ir_ty);
            params.push(ty);
        }

        let Some(return_ir) = return_type.ir_type(self.builder) else {
            self.ctx.internal_error();
            return Err(());
        };

        let ir_function = self.builder.declare_function(
            &function.name.lexeme,
            param_ir,
            return_ir,
            function.is_variadic,
        );

        self.ctx.add_function(FunctionInfo {
            name: function.name.lexeme.clone(),
            params,
            is_variadic: function.is_variadic,
            return_type,
            ir_function,
        });

        Ok(())
    }

    fn define_function(&mut self, function: &ast::Function) -> LowerResult<()> {
        let Some(body) = &function.body else {
            return Ok(());
        };

        let Some(info) = self.ctx.find_function(&function.name.lexeme) else {
            self.ctx.internal_error();
            return Err(());
        };
        let ir_function = info.ir_function;
        let params = info.params.clone();
        let return_type = info.return_type.clone();

        let entry = self.builder.append_block(ir_function);
        self.builder.set_insert_point(ir_function, entry);
        self.current_function = Some(ir_function);

        // Parameters are bound to their SSA values directly; they have no
        // stack storage and are read-only in source.
        self.ctx.push_scope();
        for (index, (parameter, ty)) in function.parameters.iter().zip(params).enumerate() {
            let Some(value) = self.builder.argument(index) else {
                self.ctx.internal_error();
                return Err(());
            };
            self.ctx.declare(&parameter.name.lexeme, ty, value)?;
        }

        self.return_type = return_type.clone();

        self.block_statements(body, entry, None)?;

        self.ctx.pop_scope()?;

        if !self.ctx.is_returned() {
            let falls_through_void = return_type.basic == Basic::Void
                && return_type.pointer_depth == 0
                && !return_type.is_reference;

            if falls_through_void {
                let block = self.ctx.last_block().unwrap_or(entry);
                self.builder.set_insert_point(ir_function, block);
                self.builder.ret_void();
            } else {
                self.ctx
                    .report(body.close_brace.clone(), ErrorKind::MissingReturn);
                return Err(());
            }
        }

        self.ctx.set_returned(false);
        self.ctx.set_last_block(None);
        Ok(())
    }

    /* Types */

    pub(super) fn resolve_type(&mut self, node: &ast::TypeNode) -> LowerResult<ValueType> {
        let basic = match &node.name {
            ast::TypeNameKind::Builtin(name) => Basic::from(*name),
            ast::TypeNameKind::Struct(name) => {
                if self.ctx.find_struct(name).is_none() {
                    self.ctx
                        .report(node.token.clone(), ErrorKind::UndefinedSymbol);
                    return Err(());
                }
                Basic::Struct(name.clone())
            }
        };

        if node.is_reference && basic == Basic::Void {
            self.ctx
                .report(node.token.clone(), ErrorKind::InvalidReferenceType);
            return Err(());
        }

        let previous = std::mem::replace(&mut self.const_only, true);
        let array_sizes = self.resolve_array_sizes(node);
        self.const_only = previous;

        Ok(ValueType {
            basic,
            pointer_depth: node.pointer_depth,
            is_reference: node.is_reference,
            is_argument: false,
            array_sizes: array_sizes?,
        })
    }

    fn resolve_array_sizes(&mut self, node: &ast::TypeNode) -> LowerResult<Vec<u64>> {
        let mut sizes = Vec::new();

        for size in &node.array_sizes {
            let lowered = self.expression(size)?;

            let is_constant_integer = lowered.ty.basic == Basic::Literal(LiteralKind::Integer)
                && lowered.ty.array_sizes.is_empty();
            let folded = match (is_constant_integer, &lowered.folded) {
                (true, Some(Folded::Int(value))) => *value,
                _ => {
                    self.ctx
                        .report(size.token.clone(), ErrorKind::ArraySizeMustBeConstantInteger);
                    return Err(());
                }
            };

            if folded <= 0 {
                self.ctx
                    .report(size.token.clone(), ErrorKind::ArraySizeMustBeConstantInteger);
                return Err(());
            }

            sizes.push(folded as u64);
        }

        Ok(sizes)
    }

    /* Blocks */

    /// Emits a block's statements into `bb`. Statements after a `break` or
    /// `return` in the same block are unreachable and rejected. If the block
    /// falls through and a successor was provided, control branches to it.
    pub(super) fn block_statements(
        &mut self,
        block: &ast::Block,
        bb: BlockId,
        successor: Option<BlockId>,
    ) -> LowerResult<()> {
        let Some(function) = self.current_function else {
            self.ctx.internal_error();
            return Err(());
        };

        let previous = self.builder.current_block();
        self.builder.set_insert_point(function, bb);

        self.ctx.push_scope();
        for statement in &block.statements {
            if self.ctx.is_breaked() || self.ctx.is_returned() {
                self.ctx.report(
                    statement.token.clone(),
                    ErrorKind::CanNotGiveInstructionAfterBreakOrReturn,
                );
                return Err(());
            }

            self.statement(statement)?;
        }
        self.ctx.pop_scope()?;

        if let Some(successor) = successor {
            if !self.ctx.is_breaked() && !self.ctx.is_returned() {
                self.builder.branch(successor);
            }
        }
        self.ctx.set_breaked(false);

        if let Some(previous) = previous {
            self.builder.set_insert_point(function, previous);
        }

        Ok(())
    }

    pub(super) fn require_function(&mut self) -> LowerResult<crate::backend::ir::FunctionId> {
        match self.current_function {
            Some(function) => Ok(function),
            None => {
                self.ctx.internal_error();
                Err(())
            }
        }
    }
}
