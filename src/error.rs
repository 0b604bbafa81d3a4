use strum::IntoStaticStr;
use thiserror::Error;

use crate::{
    frontend::{lexer::Token, SourceFileOrigin},
    middle::ty::ValueType,
};

/// A structured compile error anchored to the source token it was reported
/// against.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub token: Token,
    pub kind: ErrorKind,
}

impl CompileError {
    pub fn new(token: Token, kind: ErrorKind) -> Self {
        Self { token, kind }
    }

    /// The stable error name used on the machine-readable stderr surface.
    pub fn name(&self) -> &'static str {
        (&self.kind).into()
    }

    /// One line per error on stderr, tab separated:
    /// `filepath \t line \t column \t ErrorName`
    pub fn render(&self, origin: &SourceFileOrigin) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            origin,
            self.token.line,
            self.token.column,
            self.name()
        )
    }
}

#[derive(Debug, Clone, Error, IntoStaticStr)]
pub enum ErrorKind {
    /* Lexical */
    #[error("illegal file format")]
    IllegalFileFormat,
    #[error("unexpected end of file")]
    UnexpectedEof,
    #[error("unexpected character {0:?}")]
    UnexpectedCharactor(char),

    /* Syntactic */
    #[error("unexpected token, expected {expected}")]
    UnexpectedToken { expected: &'static str },
    #[error("only \"C\" is supported as an extern ABI")]
    InvalidExternType,

    /* Type / semantic */
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        expected: ValueType,
        actual: ValueType,
    },
    #[error("operand types {lhs} and {rhs} do not agree")]
    OperandTypeMismatch { lhs: ValueType, rhs: ValueType },
    #[error("{actual} is not an arithmetic type")]
    NotArithmeticType { actual: ValueType },
    #[error("{actual} is not a comparable type")]
    NotComparableType { actual: ValueType },
    #[error("{actual} cannot be tested for equality")]
    NotBeAbleToEqualType { actual: ValueType },
    #[error("undefined symbol")]
    UndefinedSymbol,
    #[error("constant too large for its type")]
    ConstantTooLarge,
    #[error("wrong number of call arguments")]
    InvalidCallArgumentLength,
    #[error("function arguments are read-only")]
    CanNotOverwriteArgument,
    #[error("a let binding needs a type or an initializer")]
    TypeOrInitializerMustBeSpecified,
    #[error("invalid reference type")]
    InvalidReferenceType,
    #[error("function arguments cannot have type void")]
    ArgumentCanNotBeVoidType,
    #[error("array sizes must be positive integer constants")]
    ArraySizeMustBeConstantInteger,
    #[error("array elements must all have the same type")]
    EachElementMustHaveIdenticallyType,

    /* Control flow */
    #[error("break outside of a loop")]
    InvalidBreak,
    #[error("not all control paths return a value")]
    MissingReturn,
    #[error("unreachable statement after break or return")]
    CanNotGiveInstructionAfterBreakOrReturn,
}
