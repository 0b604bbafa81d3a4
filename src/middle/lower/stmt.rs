//! Statement and control-flow lowering. Blocks own one IR basic block each;
//! `if`/`while` thread their successor blocks through the Context so `break`
//! and fall-through edges land in the right place.

use crate::{
    backend::ir::{self, CastOp},
    error::ErrorKind,
    frontend::{ast, lexer::Token},
    middle::{
        lower::{Folded, LowerResult, Lowered, Lowering},
        ty::{Basic, LiteralKind, ValueType},
    },
};

impl<'a> Lowering<'a> {
    pub(super) fn statement(&mut self, statement: &ast::Statement) -> LowerResult<()> {
        match &statement.kind {
            ast::StatementKind::Let(let_stmt) => self.let_statement(statement, let_stmt),
            ast::StatementKind::Assign { dest, value } => self.assign(statement, dest, value),
            ast::StatementKind::Call(call) => {
                self.call(&statement.token, call)?;
                Ok(())
            }
            ast::StatementKind::If(if_stmt) => self.if_statement(if_stmt),
            ast::StatementKind::While(while_stmt) => self.while_statement(while_stmt),
            ast::StatementKind::Return(value) => self.return_statement(statement, value.as_ref()),
            ast::StatementKind::Break => self.break_statement(statement),
        }
    }

    /* let */

    fn let_statement(&mut self, statement: &ast::Statement, let_stmt: &ast::Let) -> LowerResult<()> {
        let mut initial: Option<(Lowered, &Token)> = None;
        if let Some(value) = &let_stmt.value {
            initial = Some((self.expression(value)?, &value.token));
        }

        let ty = match &let_stmt.ty {
            Some(node) => self.resolve_type(node)?,
            None => {
                // The parser guarantees an initializer when the type is absent
                let Some((lowered, _)) = &initial else {
                    self.ctx.internal_error();
                    return Err(());
                };
                self.infer_let_type(&let_stmt.name, lowered)?
            }
        };

        let Some(ir_ty) = ty.ir_type(self.builder) else {
            self.ctx.internal_error();
            return Err(());
        };

        // Stack storage lives in the entry block regardless of where the
        // `let` appears
        let ptr = self.builder.alloca_in_entry(ir_ty.clone());

        if let_stmt.is_heap {
            let ir::Type::Ptr(boxed) = ir_ty.clone() else {
                self.ctx.internal_error();
                return Err(());
            };

            let raw = self.builder.call_malloc((*boxed).clone());
            let object = self.builder.cast(CastOp::Bitcast, raw, ir_ty);
            self.builder.store(object, ptr);

            let mut payload = None;
            if let Some((lowered, value_token)) = &initial {
                if !ty.is_compatible_with(&lowered.ty) {
                    self.ctx.report(
                        statement.token.clone(),
                        ErrorKind::TypeMismatch {
                            expected: ty,
                            actual: lowered.ty.clone(),
                        },
                    );
                    return Err(());
                }
                payload = Some(self.coerce_constant(lowered, value_token, &ty)?);
            }

            if self.builder.initialize_object(object, payload).is_none() {
                self.ctx.internal_error();
                return Err(());
            }
        } else {
            let value = match &initial {
                Some((lowered, value_token)) => {
                    if !ty.is_compatible_with(&lowered.ty) {
                        self.ctx.report(
                            statement.token.clone(),
                            ErrorKind::TypeMismatch {
                                expected: ty,
                                actual: lowered.ty.clone(),
                            },
                        );
                        return Err(());
                    }
                    self.coerce_constant(lowered, value_token, &ty)?
                }
                None => self.builder.const_zero(ir_ty),
            };

            self.builder.store(value, ptr);
        }

        self.ctx.declare(&let_stmt.name.lexeme, ty, ptr)?;
        Ok(())
    }

    /// Infers the binding type from the initializer when no explicit type is
    /// given: const-bool → bool, const-int → i32 (range checked),
    /// const-float → f64, const-string → i8*, with i32 the default element
    /// for integer aggregates.
    fn infer_let_type(&mut self, name: &Token, initial: &Lowered) -> LowerResult<ValueType> {
        let mut ty = initial.ty.clone();
        ty.is_argument = false;

        match ty.basic {
            Basic::Literal(LiteralKind::Bool) => ty.basic = Basic::Bool,
            Basic::Literal(LiteralKind::Integer) => {
                if ty.array_sizes.is_empty() {
                    let Some(Folded::Int(value)) = &initial.folded else {
                        self.ctx.internal_error();
                        return Err(());
                    };
                    let value = *value;
                    if value < i64::from(i32::MIN) || i64::from(i32::MAX) < value {
                        self.ctx.report(name.clone(), ErrorKind::ConstantTooLarge);
                        return Err(());
                    }
                } else {
                    // Probe-materialise at i32; an out-of-range element
                    // rejects the default
                    let Some(folded) = initial.folded.clone() else {
                        self.ctx.internal_error();
                        return Err(());
                    };
                    let scalar = ValueType::scalar(Basic::I32);
                    let sizes = ty.array_sizes.clone();
                    if self.materialize_array(&folded, &scalar, &sizes).is_none() {
                        self.ctx.report(name.clone(), ErrorKind::ConstantTooLarge);
                        return Err(());
                    }
                }
                ty.basic = Basic::I32;
            }
            Basic::Literal(LiteralKind::Float) => ty.basic = Basic::F64,
            Basic::Literal(LiteralKind::String) => {
                ty.basic = Basic::I8;
                ty.pointer_depth = 1;
            }
            _ => {}
        }

        Ok(ty)
    }

    /* assignment */

    fn assign(
        &mut self,
        statement: &ast::Statement,
        dest: &ast::Path,
        value_expr: &ast::Expression,
    ) -> LowerResult<()> {
        let place = self.path_place(dest, true)?;

        if place.ty.is_argument {
            self.ctx.report(
                statement.token.clone(),
                ErrorKind::CanNotOverwriteArgument,
            );
            return Err(());
        }

        let value = self.expression(value_expr)?;

        if !value.ty.is_compatible_with(&place.ty) {
            self.ctx.report(
                statement.token.clone(),
                ErrorKind::TypeMismatch {
                    expected: place.ty,
                    actual: value.ty,
                },
            );
            return Err(());
        }

        let coerced = self.coerce_constant(&value, &value_expr.token, &place.ty)?;

        let Some(ptr) = place.ptr else {
            self.ctx.internal_error();
            return Err(());
        };
        self.builder.store(coerced, ptr);

        Ok(())
    }

    /* control flow */

    fn condition_value(&mut self, condition: &ast::Expression) -> LowerResult<ir::ValueId> {
        let lowered = self.expression(condition)?;

        let bool_ty = ValueType::scalar(Basic::Bool);
        if !lowered.ty.is_compatible_with(&bool_ty) {
            self.ctx.report(
                condition.token.clone(),
                ErrorKind::TypeMismatch {
                    expected: bool_ty,
                    actual: lowered.ty,
                },
            );
            return Err(());
        }

        self.value_of(&lowered)
    }

    fn if_statement(&mut self, if_stmt: &ast::If) -> LowerResult<()> {
        let condition = self.condition_value(&if_stmt.condition)?;

        let function = self.require_function()?;
        let successor = self.builder.append_block(function);
        self.ctx.set_last_block(Some(successor));

        let then_block = self.builder.append_block(function);
        self.block_statements(&if_stmt.then_block, then_block, Some(successor))?;
        let then_returned = self.ctx.is_returned();
        self.ctx.set_returned(false);
        self.ctx.set_last_block(Some(successor));

        let mut else_target = successor;
        let mut else_returned = false;
        if let Some(else_block) = &if_stmt.else_block {
            let block = self.builder.append_block(function);
            self.block_statements(else_block, block, Some(successor))?;
            else_returned = self.ctx.is_returned();
            self.ctx.set_returned(false);
            self.ctx.set_last_block(Some(successor));
            else_target = block;
        }

        self.builder.cond_branch(condition, then_block, else_target);
        self.builder.set_insert_point(function, successor);

        // The tail is unreachable only when both arms returned on every path;
        // the join block still needs its one terminator
        let returned = then_returned && else_returned;
        if returned {
            self.builder.unreachable();
        }
        self.ctx.set_returned(returned);

        Ok(())
    }

    fn while_statement(&mut self, while_stmt: &ast::While) -> LowerResult<()> {
        let function = self.require_function()?;

        let condition_block = self.builder.append_block(function);
        self.builder.branch(condition_block);
        self.builder.set_insert_point(function, condition_block);

        let condition = self.condition_value(&while_stmt.condition)?;

        let successor = self.builder.append_block(function);
        self.ctx.set_last_block(Some(successor));
        self.ctx.push_loop_exit(successor);

        let body_block = self.builder.append_block(function);
        self.builder.cond_branch(condition, body_block, successor);

        self.block_statements(&while_stmt.block, body_block, Some(condition_block))?;

        self.ctx.pop_loop_exit();
        self.ctx.set_last_block(Some(successor));

        self.builder.set_insert_point(function, successor);
        // The loop may never run, so a return inside it proves nothing
        self.ctx.set_returned(false);

        Ok(())
    }

    fn return_statement(
        &mut self,
        statement: &ast::Statement,
        value: Option<&ast::Expression>,
    ) -> LowerResult<()> {
        match value {
            Some(value_expr) => {
                let lowered = self.expression(value_expr)?;
                let return_type = self.return_type.clone();

                if !lowered.ty.is_compatible_with(&return_type) {
                    self.ctx.report(
                        statement.token.clone(),
                        ErrorKind::TypeMismatch {
                            expected: return_type,
                            actual: lowered.ty,
                        },
                    );
                    return Err(());
                }

                let coerced = self.coerce_constant(&lowered, &value_expr.token, &return_type)?;
                self.builder.ret(coerced);
            }
            None => {
                let return_type = self.return_type.clone();
                let is_void = return_type.basic == Basic::Void
                    && return_type.pointer_depth == 0
                    && !return_type.is_reference;
                if !is_void {
                    self.ctx.report(
                        statement.token.clone(),
                        ErrorKind::TypeMismatch {
                            expected: return_type,
                            actual: ValueType::scalar(Basic::Void),
                        },
                    );
                    return Err(());
                }

                self.builder.ret_void();
            }
        }

        self.ctx.set_breaked(true);
        self.ctx.set_returned(true);

        Ok(())
    }

    fn break_statement(&mut self, statement: &ast::Statement) -> LowerResult<()> {
        let Some(exit) = self.ctx.current_loop_exit() else {
            self.ctx
                .report(statement.token.clone(), ErrorKind::InvalidBreak);
            return Err(());
        };

        self.builder.branch(exit);
        self.ctx.set_breaked(true);

        Ok(())
    }
}
