//! Expression analysis and emission. Every helper returns a [`Lowered`]
//! carrying the resolved type, the emitted IR value, and the folded constant
//! when the expression is compile-time evaluable. Aggregate constants carry
//! only their folded elements; the IR array constant is materialised at the
//! consumer site once the concrete element type is known.

use crate::{
    backend::ir::{self, BinaryOp, CastOp, FloatPredicate, IntPredicate, ValueId},
    error::ErrorKind,
    frontend::{
        ast,
        lexer::{Token, TokenKind},
    },
    middle::{
        lower::{LowerResult, Lowering},
        ty::{Basic, LiteralKind, ValueType},
    },
};

#[derive(Debug, Clone)]
pub struct Lowered {
    pub ty: ValueType,
    /// The emitted IR value. Absent only for aggregate constants, whose
    /// materialisation is deferred to the consumer.
    pub value: Option<ValueId>,
    pub folded: Option<Folded>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Folded {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Folded>),
}

/// A resolved variable path: the final type plus either the storage pointer
/// (for assignment) or the loaded value (for reads).
pub(super) struct Place {
    pub ty: ValueType,
    pub ptr: Option<ValueId>,
    pub value: Option<ValueId>,
}

#[derive(Clone, Copy)]
enum Base {
    /// A pointer to the storage slot holding the current value
    Storage(ValueId),
    /// The SSA value itself (function parameters have no storage)
    Ssa(ValueId),
}

impl<'a> Lowering<'a> {
    pub(super) fn expression(&mut self, expr: &ast::Expression) -> LowerResult<Lowered> {
        match &expr.kind {
            ast::ExpressionKind::Constant(kind) => self.constant(expr, *kind),
            ast::ExpressionKind::Aggregate(values) => self.aggregate(expr, values),
            ast::ExpressionKind::Path(path) => {
                let place = self.path_place(path, false)?;
                Ok(Lowered {
                    ty: place.ty,
                    value: place.value,
                    folded: None,
                })
            }
            ast::ExpressionKind::Call(call) => self.call(&expr.token, call),
            ast::ExpressionKind::Unary { operator, operand } => self.unary(operator, operand),
            ast::ExpressionKind::Binary { operator, lhs, rhs } => self.binary(operator, lhs, rhs),
            ast::ExpressionKind::Cast { ty, operand } => self.cast_expression(expr, ty, operand),
        }
    }

    #[track_caller]
    pub(super) fn value_of(&mut self, lowered: &Lowered) -> LowerResult<ValueId> {
        match lowered.value {
            Some(value) => Ok(value),
            None => {
                self.ctx.internal_error();
                Err(())
            }
        }
    }

    /* Constants */

    fn constant(&mut self, expr: &ast::Expression, kind: ast::ConstantKind) -> LowerResult<Lowered> {
        let lexeme = &expr.token.lexeme;

        match kind {
            ast::ConstantKind::Bool => {
                let parsed = lexeme == "true";
                let value = self.builder.const_bool(parsed);
                Ok(Lowered {
                    ty: ValueType::literal(LiteralKind::Bool),
                    value: Some(value),
                    folded: Some(Folded::Bool(parsed)),
                })
            }
            ast::ConstantKind::Integer => {
                let Some(parsed) = parse_integer(lexeme) else {
                    self.ctx
                        .report(expr.token.clone(), ErrorKind::ConstantTooLarge);
                    return Err(());
                };
                let value = self.builder.const_int(ir::Type::I64, parsed);
                Ok(Lowered {
                    ty: ValueType::literal(LiteralKind::Integer),
                    value: Some(value),
                    folded: Some(Folded::Int(parsed)),
                })
            }
            ast::ConstantKind::Float => {
                let Ok(parsed) = lexeme.parse::<f64>() else {
                    self.ctx
                        .report(expr.token.clone(), ErrorKind::ConstantTooLarge);
                    return Err(());
                };
                let value = self.builder.const_float(ir::Type::F64, parsed);
                Ok(Lowered {
                    ty: ValueType::literal(LiteralKind::Float),
                    value: Some(value),
                    folded: Some(Folded::Float(parsed)),
                })
            }
            ast::ConstantKind::String => {
                let value = self.builder.global_string(lexeme);
                Ok(Lowered {
                    ty: ValueType::literal(LiteralKind::String),
                    value: Some(value),
                    folded: Some(Folded::Str(lexeme.clone())),
                })
            }
        }
    }

    fn aggregate(
        &mut self,
        expr: &ast::Expression,
        values: &[ast::Expression],
    ) -> LowerResult<Lowered> {
        let mut elements = Vec::new();
        for value in values {
            elements.push(self.expression(value)?);
        }

        let Some(first) = elements.first() else {
            self.ctx
                .report(expr.token.clone(), ErrorKind::EachElementMustHaveIdenticallyType);
            return Err(());
        };

        let element_ty = first.ty.clone();
        if !element_ty.is_constant()
            || elements
                .iter()
                .any(|element| !element.ty.is_constant() || element.ty != element_ty)
        {
            self.ctx
                .report(expr.token.clone(), ErrorKind::EachElementMustHaveIdenticallyType);
            return Err(());
        }

        let mut folded_elements = Vec::new();
        for element in &elements {
            let Some(folded) = element.folded.clone() else {
                self.ctx.internal_error();
                return Err(());
            };
            folded_elements.push(folded);
        }

        let mut ty = element_ty;
        ty.is_argument = false;
        ty.array_sizes.insert(0, elements.len() as u64);

        Ok(Lowered {
            ty,
            value: None,
            folded: Some(Folded::Array(folded_elements)),
        })
    }

    /* Operators */

    fn unary(&mut self, operator: &Token, operand_expr: &ast::Expression) -> LowerResult<Lowered> {
        let operand = self.expression(operand_expr)?;

        if !operand.ty.is_arithmetic() {
            self.ctx.report(
                operator.clone(),
                ErrorKind::NotArithmeticType {
                    actual: operand.ty.clone(),
                },
            );
            return Err(());
        }

        if operator.kind != TokenKind::Minus {
            self.ctx.internal_error();
            return Err(());
        }

        let folded = match (&operand.ty.basic, &operand.folded) {
            (Basic::Literal(LiteralKind::Integer), Some(Folded::Int(value))) => {
                if *value == i64::MIN {
                    self.ctx
                        .report(operator.clone(), ErrorKind::ConstantTooLarge);
                    return Err(());
                }
                Some(Folded::Int(-value))
            }
            (Basic::Literal(LiteralKind::Float), Some(Folded::Float(value))) => {
                Some(Folded::Float(-value))
            }
            _ => None,
        };

        let operand_value = self.value_of(&operand)?;
        let value = if operand.ty.is_float_like() {
            self.builder.fneg(operand_value)
        } else {
            self.builder.neg(operand_value)
        };

        Ok(Lowered {
            ty: operand.ty,
            value: Some(value),
            folded,
        })
    }

    fn binary(
        &mut self,
        operator: &Token,
        lhs_expr: &ast::Expression,
        rhs_expr: &ast::Expression,
    ) -> LowerResult<Lowered> {
        let lhs = self.expression(lhs_expr)?;
        let rhs = self.expression(rhs_expr)?;

        if !lhs.ty.is_compatible_with(&rhs.ty) {
            self.ctx.report(
                operator.clone(),
                ErrorKind::TypeMismatch {
                    expected: rhs.ty.clone(),
                    actual: lhs.ty.clone(),
                },
            );
            return Err(());
        }

        self.check_operand(operator, &lhs, &lhs_expr.token)?;

        let both_constant = lhs.ty.is_constant() && rhs.ty.is_constant();
        let folded = if both_constant {
            self.fold_binary(operator, &lhs, &rhs)?
        } else {
            None
        };

        // Balance the operand pair: the constant side re-materialises at the
        // concrete side's width.
        let (target, lhs_value, rhs_value);
        if lhs.ty.is_constant() {
            lhs_value = self.coerce_constant(&lhs, &lhs_expr.token, &rhs.ty)?;
            rhs_value = self.value_of(&rhs)?;
            target = rhs.ty.clone();
        } else {
            rhs_value = self.coerce_constant(&rhs, &rhs_expr.token, &lhs.ty)?;
            lhs_value = self.value_of(&lhs)?;
            target = lhs.ty.clone();
        }

        let float = target.is_float_like();
        let signed = target.basic.is_signed_integer()
            || target.basic == Basic::Literal(LiteralKind::Integer);

        let value = match operator.kind {
            TokenKind::Plus => {
                let op = if float { BinaryOp::FAdd } else { BinaryOp::Add };
                self.builder.binary(op, lhs_value, rhs_value)
            }
            TokenKind::Minus => {
                let op = if float { BinaryOp::FSub } else { BinaryOp::Sub };
                self.builder.binary(op, lhs_value, rhs_value)
            }
            TokenKind::Asterisk => {
                let op = if float { BinaryOp::FMul } else { BinaryOp::Mul };
                self.builder.binary(op, lhs_value, rhs_value)
            }
            TokenKind::Slash => {
                let op = if float {
                    BinaryOp::FDiv
                } else if signed {
                    BinaryOp::SDiv
                } else {
                    BinaryOp::UDiv
                };
                self.builder.binary(op, lhs_value, rhs_value)
            }
            TokenKind::Percent => {
                let op = if float {
                    BinaryOp::FRem
                } else if signed {
                    BinaryOp::SRem
                } else {
                    BinaryOp::URem
                };
                self.builder.binary(op, lhs_value, rhs_value)
            }
            TokenKind::LessThan => self.compare(
                float,
                signed,
                FloatPredicate::Olt,
                IntPredicate::Slt,
                IntPredicate::Ult,
                lhs_value,
                rhs_value,
            ),
            TokenKind::LessThanOrEqual => self.compare(
                float,
                signed,
                FloatPredicate::Ole,
                IntPredicate::Sle,
                IntPredicate::Ule,
                lhs_value,
                rhs_value,
            ),
            TokenKind::GreaterThan => self.compare(
                float,
                signed,
                FloatPredicate::Ogt,
                IntPredicate::Sgt,
                IntPredicate::Ugt,
                lhs_value,
                rhs_value,
            ),
            TokenKind::GreaterThanOrEqual => self.compare(
                float,
                signed,
                FloatPredicate::Oge,
                IntPredicate::Sge,
                IntPredicate::Uge,
                lhs_value,
                rhs_value,
            ),
            TokenKind::EqualEqual => self.compare(
                float,
                signed,
                FloatPredicate::Oeq,
                IntPredicate::Eq,
                IntPredicate::Eq,
                lhs_value,
                rhs_value,
            ),
            TokenKind::NotEqual => self.compare(
                float,
                signed,
                FloatPredicate::One,
                IntPredicate::Ne,
                IntPredicate::Ne,
                lhs_value,
                rhs_value,
            ),
            TokenKind::LogicalAnd => self.builder.binary(BinaryOp::And, lhs_value, rhs_value),
            TokenKind::LogicalOr => self.builder.binary(BinaryOp::Or, lhs_value, rhs_value),
            _ => {
                self.ctx.internal_error();
                return Err(());
            }
        };

        let produces_bool = matches!(
            operator.kind,
            TokenKind::LessThan
                | TokenKind::LessThanOrEqual
                | TokenKind::GreaterThan
                | TokenKind::GreaterThanOrEqual
                | TokenKind::EqualEqual
                | TokenKind::NotEqual
                | TokenKind::LogicalAnd
                | TokenKind::LogicalOr
        );

        let ty = if produces_bool {
            if both_constant {
                ValueType::literal(LiteralKind::Bool)
            } else {
                ValueType::scalar(Basic::Bool)
            }
        } else {
            let mut ty = target;
            ty.is_argument = false;
            ty
        };

        Ok(Lowered {
            ty,
            value: Some(value),
            folded,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn compare(
        &mut self,
        float: bool,
        signed: bool,
        float_predicate: FloatPredicate,
        signed_predicate: IntPredicate,
        unsigned_predicate: IntPredicate,
        lhs: ValueId,
        rhs: ValueId,
    ) -> ValueId {
        if float {
            self.builder.fcmp(float_predicate, lhs, rhs)
        } else if signed {
            self.builder.icmp(signed_predicate, lhs, rhs)
        } else {
            self.builder.icmp(unsigned_predicate, lhs, rhs)
        }
    }

    fn check_operand(
        &mut self,
        operator: &Token,
        operand: &Lowered,
        operand_token: &Token,
    ) -> LowerResult<()> {
        match operator.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Slash
            | TokenKind::Percent => {
                if !operand.ty.is_arithmetic() {
                    self.ctx.report(
                        operand_token.clone(),
                        ErrorKind::NotArithmeticType {
                            actual: operand.ty.clone(),
                        },
                    );
                    return Err(());
                }
            }
            TokenKind::LessThan
            | TokenKind::LessThanOrEqual
            | TokenKind::GreaterThan
            | TokenKind::GreaterThanOrEqual => {
                if !operand.ty.is_comparable() {
                    self.ctx.report(
                        operand_token.clone(),
                        ErrorKind::NotComparableType {
                            actual: operand.ty.clone(),
                        },
                    );
                    return Err(());
                }
            }
            TokenKind::EqualEqual | TokenKind::NotEqual => {
                if !operand.ty.is_equatable() {
                    self.ctx.report(
                        operand_token.clone(),
                        ErrorKind::NotBeAbleToEqualType {
                            actual: operand.ty.clone(),
                        },
                    );
                    return Err(());
                }
            }
            TokenKind::LogicalAnd | TokenKind::LogicalOr => {
                if !operand.ty.is_bool() {
                    self.ctx.report(
                        operand_token.clone(),
                        ErrorKind::TypeMismatch {
                            expected: ValueType::scalar(Basic::Bool),
                            actual: operand.ty.clone(),
                        },
                    );
                    return Err(());
                }
            }
            _ => {
                self.ctx.internal_error();
                return Err(());
            }
        }

        Ok(())
    }

    /// Folds a binary operation over two constants. Overflow wraps on
    /// `+ - *`; an unfoldable division or remainder (zero divisor) is a
    /// constant-evaluation failure.
    fn fold_binary(
        &mut self,
        operator: &Token,
        lhs: &Lowered,
        rhs: &Lowered,
    ) -> LowerResult<Option<Folded>> {
        let (Some(a), Some(b)) = (&lhs.folded, &rhs.folded) else {
            self.ctx.internal_error();
            return Err(());
        };

        let folded = match (a, b) {
            (Folded::Int(a), Folded::Int(b)) => {
                let (a, b) = (*a, *b);
                match operator.kind {
                    TokenKind::Plus => Folded::Int(a.wrapping_add(b)),
                    TokenKind::Minus => Folded::Int(a.wrapping_sub(b)),
                    TokenKind::Asterisk => Folded::Int(a.wrapping_mul(b)),
                    TokenKind::Slash => match a.checked_div(b) {
                        Some(value) => Folded::Int(value),
                        None => {
                            self.ctx
                                .report(operator.clone(), ErrorKind::ConstantTooLarge);
                            return Err(());
                        }
                    },
                    TokenKind::Percent => match a.checked_rem(b) {
                        Some(value) => Folded::Int(value),
                        None => {
                            self.ctx
                                .report(operator.clone(), ErrorKind::ConstantTooLarge);
                            return Err(());
                        }
                    },
                    TokenKind::LessThan => Folded::Bool(a < b),
                    TokenKind::LessThanOrEqual => Folded::Bool(a <= b),
                    TokenKind::GreaterThan => Folded::Bool(a > b),
                    TokenKind::GreaterThanOrEqual => Folded::Bool(a >= b),
                    TokenKind::EqualEqual => Folded::Bool(a == b),
                    TokenKind::NotEqual => Folded::Bool(a != b),
                    _ => return Ok(None),
                }
            }
            (Folded::Float(a), Folded::Float(b)) => {
                let (a, b) = (*a, *b);
                match operator.kind {
                    TokenKind::Plus => Folded::Float(a + b),
                    TokenKind::Minus => Folded::Float(a - b),
                    TokenKind::Asterisk => Folded::Float(a * b),
                    TokenKind::Slash => Folded::Float(a / b),
                    TokenKind::Percent => Folded::Float(a % b),
                    TokenKind::LessThan => Folded::Bool(a < b),
                    TokenKind::LessThanOrEqual => Folded::Bool(a <= b),
                    TokenKind::GreaterThan => Folded::Bool(a > b),
                    TokenKind::GreaterThanOrEqual => Folded::Bool(a >= b),
                    TokenKind::EqualEqual => Folded::Bool(a == b),
                    TokenKind::NotEqual => Folded::Bool(a != b),
                    _ => return Ok(None),
                }
            }
            (Folded::Bool(a), Folded::Bool(b)) => match operator.kind {
                TokenKind::LogicalAnd => Folded::Bool(*a && *b),
                TokenKind::LogicalOr => Folded::Bool(*a || *b),
                TokenKind::EqualEqual => Folded::Bool(a == b),
                TokenKind::NotEqual => Folded::Bool(a != b),
                _ => return Ok(None),
            },
            _ => return Ok(None),
        };

        Ok(Some(folded))
    }

    /* Calls */

    pub(super) fn call(&mut self, call_token: &Token, call: &ast::Call) -> LowerResult<Lowered> {
        let Some(info) = self.ctx.find_function(&call.callee.lexeme) else {
            self.ctx
                .report(call.callee.clone(), ErrorKind::UndefinedSymbol);
            return Err(());
        };
        let params = info.params.clone();
        let is_variadic = info.is_variadic;
        let return_type = info.return_type.clone();
        let ir_function = info.ir_function;

        if self.const_only {
            self.ctx
                .report(call_token.clone(), ErrorKind::ArraySizeMustBeConstantInteger);
            return Err(());
        }

        let mut arguments = Vec::new();
        for (index, argument) in call.arguments.iter().enumerate() {
            let lowered = self.expression(argument)?;

            match params.get(index) {
                Some(param) => {
                    if !lowered.ty.is_compatible_with(param) {
                        self.ctx.report(
                            argument.token.clone(),
                            ErrorKind::TypeMismatch {
                                expected: param.clone(),
                                actual: lowered.ty.clone(),
                            },
                        );
                        return Err(());
                    }
                    arguments.push(self.coerce_constant(&lowered, &argument.token, param)?);
                }
                None => {
                    if !is_variadic {
                        self.ctx.report(
                            call_token.clone(),
                            ErrorKind::InvalidCallArgumentLength,
                        );
                        return Err(());
                    }
                    // Variadic extras pass through in whatever concrete type
                    // they analyzed to
                    arguments.push(self.value_of(&lowered)?);
                }
            }
        }

        if call.arguments.len() < params.len() {
            self.ctx
                .report(call_token.clone(), ErrorKind::InvalidCallArgumentLength);
            return Err(());
        }

        let value = self.builder.call(ir_function, arguments);

        let mut ty = return_type;
        ty.is_argument = false;

        Ok(Lowered {
            ty,
            value,
            folded: None,
        })
    }

    /* Variable paths */

    pub(super) fn path_place(&mut self, path: &ast::Path, lvalue: bool) -> LowerResult<Place> {
        let Some(symbol) = self.ctx.lookup(&path.name.lexeme) else {
            self.ctx
                .report(path.name.clone(), ErrorKind::UndefinedSymbol);
            return Err(());
        };
        let symbol_ty = symbol.ty.clone();
        let handle = symbol.value;

        // A bare parameter reference is the SSA value directly, no load
        if symbol_ty.is_argument && path.index.is_none() && path.member.is_none() {
            return Ok(Place {
                ty: symbol_ty,
                ptr: None,
                value: Some(handle),
            });
        }

        let mut ty = symbol_ty.clone();
        let mut base = if symbol_ty.is_argument {
            Base::Ssa(handle)
        } else {
            Base::Storage(handle)
        };

        let mut segment = path;
        loop {
            if let Some(index_expr) = &segment.index {
                self.index_segment(segment, index_expr, &mut ty, &mut base)?;
            }

            match &segment.member {
                Some(member) => {
                    self.member_segment(segment, member, &mut ty, &mut base)?;
                    segment = &**member;
                }
                None => break,
            }
        }

        if lvalue {
            let ptr = match base {
                Base::Storage(ptr) => Some(ptr),
                Base::Ssa(_) => None,
            };
            Ok(Place {
                ty,
                ptr,
                value: None,
            })
        } else {
            let value = match base {
                Base::Storage(ptr) => self.builder.load(ptr),
                Base::Ssa(value) => value,
            };
            Ok(Place {
                ty,
                ptr: None,
                value: Some(value),
            })
        }
    }

    /// Array indexing strips the outermost dimension and steps the storage
    /// pointer with a gep.
    fn index_segment(
        &mut self,
        segment: &ast::Path,
        index_expr: &ast::Expression,
        ty: &mut ValueType,
        base: &mut Base,
    ) -> LowerResult<()> {
        if ty.array_sizes.is_empty() {
            self.ctx.report(
                segment.name.clone(),
                ErrorKind::TypeMismatch {
                    expected: ty.clone(),
                    actual: ty.clone(),
                },
            );
            return Err(());
        }

        let Base::Storage(ptr) = *base else {
            // A parameter of array type is an SSA aggregate with no address
            self.ctx.report(
                segment.name.clone(),
                ErrorKind::TypeMismatch {
                    expected: ty.clone(),
                    actual: ty.clone(),
                },
            );
            return Err(());
        };

        let index = self.expression(index_expr)?;
        let index_is_integer = index.ty.pointer_depth == 0
            && index.ty.array_sizes.is_empty()
            && (index.ty.basic.is_integer()
                || index.ty.basic == Basic::Literal(LiteralKind::Integer));
        if !index_is_integer {
            self.ctx.report(
                index_expr.token.clone(),
                ErrorKind::TypeMismatch {
                    expected: ValueType::scalar(Basic::I64),
                    actual: index.ty.clone(),
                },
            );
            return Err(());
        }
        let index_value = self.value_of(&index)?;

        let Some(base_ir) = ty.ir_type(self.builder) else {
            self.ctx.internal_error();
            return Err(());
        };
        let Some(element_ptr) = self.builder.gep_element(base_ir, ptr, index_value) else {
            self.ctx.internal_error();
            return Err(());
        };

        ty.array_sizes.remove(0);
        ty.is_argument = false;
        *base = Base::Storage(element_ptr);
        Ok(())
    }

    /// Member access requires a struct reference; the payload members sit
    /// behind the two-word header.
    fn member_segment(
        &mut self,
        segment: &ast::Path,
        member: &ast::Path,
        ty: &mut ValueType,
        base: &mut Base,
    ) -> LowerResult<()> {
        let struct_name = match &ty.basic {
            Basic::Struct(name)
                if ty.is_reference && ty.pointer_depth == 0 && ty.array_sizes.is_empty() =>
            {
                name.clone()
            }
            _ => {
                self.ctx.report(
                    segment.name.clone(),
                    ErrorKind::TypeMismatch {
                        expected: ty.clone(),
                        actual: ty.clone(),
                    },
                );
                return Err(());
            }
        };

        let Some(info) = self.ctx.find_struct(&struct_name) else {
            self.ctx.internal_error();
            return Err(());
        };
        let struct_ir = info.ir_type;

        let member_lookup = info
            .members
            .iter()
            .enumerate()
            .find(|(_, (name, _))| *name == member.name.lexeme)
            .map(|(position, (_, ty))| (position, ty.clone()));
        let Some((position, mut member_ty)) = member_lookup else {
            self.ctx
                .report(member.name.clone(), ErrorKind::UndefinedSymbol);
            return Err(());
        };
        member_ty.is_argument = false;

        // The object pointer: loaded from storage, or the parameter's SSA
        // value which already is the reference
        let object = match *base {
            Base::Storage(ptr) => self.builder.load(ptr),
            Base::Ssa(value) => value,
        };

        let member_index = self
            .builder
            .const_int(ir::Type::I32, (2 + position) as i64);
        let Some(member_ptr) =
            self.builder
                .gep_element(ir::Type::Struct(struct_ir), object, member_index)
        else {
            self.ctx.internal_error();
            return Err(());
        };

        *ty = member_ty;
        *base = Base::Storage(member_ptr);
        Ok(())
    }

    /* Casts */

    fn cast_expression(
        &mut self,
        expr: &ast::Expression,
        ty_node: &ast::TypeNode,
        operand_expr: &ast::Expression,
    ) -> LowerResult<Lowered> {
        let operand = self.expression(operand_expr)?;
        let target = self.resolve_type(ty_node)?;

        // Pointer and reference casts are not supported; neither are arrays
        let unsupported = operand.ty.is_reference
            || operand.ty.pointer_depth != 0
            || !operand.ty.array_sizes.is_empty()
            || target.is_reference
            || target.pointer_depth != 0
            || !target.array_sizes.is_empty();
        if unsupported {
            self.ctx.report(
                expr.token.clone(),
                ErrorKind::TypeMismatch {
                    expected: target.clone(),
                    actual: operand.ty.clone(),
                },
            );
            return Err(());
        }

        let operand_value = self.value_of(&operand)?;
        let value = self.emit_cast(&operand.ty.basic, operand_value, &target.basic)?;

        Ok(Lowered {
            ty: target,
            value: Some(value),
            folded: None,
        })
    }

    fn emit_cast(&mut self, src: &Basic, value: ValueId, dest: &Basic) -> LowerResult<ValueId> {
        if src == dest {
            return Ok(value);
        }

        let Some(dest_ir) = ValueType::scalar(dest.clone()).ir_type(self.builder) else {
            self.ctx.internal_error();
            return Err(());
        };

        let result = match src {
            Basic::F32 => {
                if *dest == Basic::F64 {
                    self.builder.cast(CastOp::FpExt, value, dest_ir)
                } else if dest.is_signed_integer() {
                    self.builder.cast(CastOp::FpToSi, value, dest_ir)
                } else {
                    self.builder.cast(CastOp::FpToUi, value, dest_ir)
                }
            }
            Basic::F64 | Basic::Literal(LiteralKind::Float) => {
                if *dest == Basic::F64 {
                    value
                } else if *dest == Basic::F32 {
                    self.builder.cast(CastOp::FpTrunc, value, dest_ir)
                } else if dest.is_signed_integer() {
                    self.builder.cast(CastOp::FpToSi, value, dest_ir)
                } else {
                    self.builder.cast(CastOp::FpToUi, value, dest_ir)
                }
            }
            basic if basic.is_signed_integer() || *basic == Basic::Literal(LiteralKind::Integer) => {
                if dest.is_float() {
                    self.builder.cast(CastOp::SiToFp, value, dest_ir)
                } else {
                    self.builder.trunc_or_extend(value, dest_ir)
                }
            }
            basic
                if basic.is_unsigned_integer()
                    || *basic == Basic::Bool
                    || *basic == Basic::Literal(LiteralKind::Bool) =>
            {
                if dest.is_float() {
                    self.builder.cast(CastOp::UiToFp, value, dest_ir)
                } else {
                    self.builder.trunc_or_extend(value, dest_ir)
                }
            }
            _ => {
                self.ctx.internal_error();
                return Err(());
            }
        };

        Ok(result)
    }

    /* Constant-to-concrete coercion */

    /// The central coercion helper used by assignment, argument passing,
    /// return, and binary-operand balancing. Compatibility has already been
    /// checked; concrete values pass through untouched.
    pub(super) fn coerce_constant(
        &mut self,
        src: &Lowered,
        src_token: &Token,
        target: &ValueType,
    ) -> LowerResult<ValueId> {
        if !src.ty.is_constant() || src.ty.pointer_depth != 0 {
            return self.value_of(src);
        }

        if src.ty.array_sizes.is_empty() {
            let value = self.value_of(src)?;

            match src.ty.basic {
                Basic::Literal(LiteralKind::Integer) if target.basic.is_integer() => {
                    if let Some(Folded::Int(folded)) = &src.folded {
                        if !integer_fits(*folded, &target.basic) {
                            self.ctx.report(
                                src_token.clone(),
                                ErrorKind::TypeMismatch {
                                    expected: target.clone(),
                                    actual: src.ty.clone(),
                                },
                            );
                            return Err(());
                        }
                    }

                    let Some(target_ir) =
                        ValueType::scalar(target.basic.clone()).ir_type(self.builder)
                    else {
                        self.ctx.internal_error();
                        return Err(());
                    };
                    Ok(self.builder.trunc_or_extend(value, target_ir))
                }
                Basic::Literal(LiteralKind::Integer) if target.basic.is_float() => {
                    let Some(target_ir) =
                        ValueType::scalar(target.basic.clone()).ir_type(self.builder)
                    else {
                        self.ctx.internal_error();
                        return Err(());
                    };
                    Ok(self.builder.cast(CastOp::SiToFp, value, target_ir))
                }
                Basic::Literal(LiteralKind::Float) if target.basic == Basic::F32 => {
                    Ok(self.builder.cast(CastOp::FpTrunc, value, ir::Type::F32))
                }
                _ => Ok(value),
            }
        } else {
            let Some(folded) = &src.folded else {
                self.ctx.internal_error();
                return Err(());
            };
            let folded = folded.clone();

            let scalar_target = ValueType {
                array_sizes: Vec::new(),
                ..target.clone()
            };

            match self.materialize_array(&folded, &scalar_target, &src.ty.array_sizes) {
                Some(value) => Ok(value),
                None => {
                    self.ctx.report(
                        src_token.clone(),
                        ErrorKind::TypeMismatch {
                            expected: target.clone(),
                            actual: src.ty.clone(),
                        },
                    );
                    Err(())
                }
            }
        }
    }

    /// Builds the IR array constant for an aggregate at a concrete element
    /// type. `None` when any element is out of range for the target.
    pub(super) fn materialize_array(
        &mut self,
        folded: &Folded,
        scalar_target: &ValueType,
        dims: &[u64],
    ) -> Option<ValueId> {
        let Folded::Array(elements) = folded else {
            return None;
        };

        let element_dims = &dims[1..];
        let mut ir_elements = Vec::new();

        for element in elements {
            let value = if element_dims.is_empty() {
                self.materialize_scalar(element, scalar_target)?
            } else {
                self.materialize_array(element, scalar_target, element_dims)?
            };
            ir_elements.push(value);
        }

        let mut element_ty = scalar_target.ir_type(self.builder)?;
        for dim in element_dims.iter().rev() {
            element_ty = ir::Type::Array(*dim, Box::new(element_ty));
        }

        Some(self.builder.const_array(element_ty, ir_elements))
    }

    fn materialize_scalar(&mut self, folded: &Folded, target: &ValueType) -> Option<ValueId> {
        match folded {
            Folded::Bool(value)
                if target.basic == Basic::Bool && target.pointer_depth == 0 =>
            {
                Some(self.builder.const_bool(*value))
            }
            Folded::Int(value) if target.pointer_depth == 0 && target.basic.is_integer() => {
                let value = *value;
                if !integer_fits(value, &target.basic) {
                    return None;
                }

                let ty = ValueType::scalar(target.basic.clone()).ir_type(self.builder)?;
                Some(self.builder.const_int(ty, value))
            }
            Folded::Float(value) if target.basic == Basic::F32 && target.pointer_depth == 0 => {
                Some(self.builder.const_float(ir::Type::F32, *value as f32 as f64))
            }
            Folded::Float(value) if target.basic == Basic::F64 && target.pointer_depth == 0 => {
                Some(self.builder.const_float(ir::Type::F64, *value))
            }
            Folded::Str(text) if target.is_string() => Some(self.builder.global_string(text)),
            _ => None,
        }
    }
}

/// Range check for narrowing an integer literal to a sized type. `i64` and
/// `u64` take any literal bit pattern.
fn integer_fits(value: i64, target: &Basic) -> bool {
    match target {
        Basic::I8 => i64::from(i8::MIN) <= value && value <= i64::from(i8::MAX),
        Basic::I16 => i64::from(i16::MIN) <= value && value <= i64::from(i16::MAX),
        Basic::I32 => i64::from(i32::MIN) <= value && value <= i64::from(i32::MAX),
        Basic::U8 => 0 <= value && value <= i64::from(u8::MAX),
        Basic::U16 => 0 <= value && value <= i64::from(u16::MAX),
        Basic::U32 => 0 <= value && value <= i64::from(u32::MAX),
        Basic::I64 | Basic::U64 => true,
        _ => false,
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if text.len() > 1 && text.starts_with('0') {
        i64::from_str_radix(text, 8).ok()
    } else {
        text.parse().ok()
    }
}
