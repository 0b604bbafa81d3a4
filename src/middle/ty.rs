//! The value-type model. Every expression that survives analysis carries one
//! of these; the four literal kinds describe compile-time constants whose
//! concrete sized type is supplied by their usage context.

use crate::{
    backend::{builder::Builder, ir},
    frontend::lexer::TypeName,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Bool,
    Integer,
    Float,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Basic {
    Void,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Struct(String),
    /// An untyped literal kind, not spellable in source
    Literal(LiteralKind),
}

impl Basic {
    pub fn is_signed_integer(&self) -> bool {
        matches!(self, Basic::I8 | Basic::I16 | Basic::I32 | Basic::I64)
    }

    pub fn is_unsigned_integer(&self) -> bool {
        matches!(self, Basic::U8 | Basic::U16 | Basic::U32 | Basic::U64)
    }

    pub fn is_integer(&self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Basic::F32 | Basic::F64)
    }
}

impl From<TypeName> for Basic {
    fn from(name: TypeName) -> Self {
        match name {
            TypeName::Void => Basic::Void,
            TypeName::Bool => Basic::Bool,
            TypeName::I8 => Basic::I8,
            TypeName::I16 => Basic::I16,
            TypeName::I32 => Basic::I32,
            TypeName::I64 => Basic::I64,
            TypeName::U8 => Basic::U8,
            TypeName::U16 => Basic::U16,
            TypeName::U32 => Basic::U32,
            TypeName::U64 => Basic::U64,
            TypeName::F32 => Basic::F32,
            TypeName::F64 => Basic::F64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueType {
    pub basic: Basic,
    pub pointer_depth: usize,
    pub is_reference: bool,
    /// True when the value originates as a function parameter. Ignored by
    /// equality; arguments are read-only in source.
    pub is_argument: bool,
    /// Array dimensions, outermost first. Empty means scalar.
    pub array_sizes: Vec<u64>,
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.basic == other.basic
            && self.pointer_depth == other.pointer_depth
            && self.is_reference == other.is_reference
            && self.array_sizes == other.array_sizes
    }
}

impl Eq for ValueType {}

impl ValueType {
    pub fn scalar(basic: Basic) -> Self {
        Self {
            basic,
            pointer_depth: 0,
            is_reference: false,
            is_argument: false,
            array_sizes: Vec::new(),
        }
    }

    pub fn pointer(basic: Basic, pointer_depth: usize) -> Self {
        Self {
            pointer_depth,
            ..Self::scalar(basic)
        }
    }

    pub fn literal(kind: LiteralKind) -> Self {
        Self::scalar(Basic::Literal(kind))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.basic, Basic::Literal(_))
    }

    pub fn is_arithmetic(&self) -> bool {
        if self.pointer_depth != 0 || !self.array_sizes.is_empty() {
            return false;
        }

        self.basic.is_integer()
            || self.basic.is_float()
            || matches!(
                self.basic,
                Basic::Literal(LiteralKind::Integer) | Basic::Literal(LiteralKind::Float)
            )
    }

    pub fn is_comparable(&self) -> bool {
        self.is_arithmetic()
    }

    pub fn is_equatable(&self) -> bool {
        self.is_arithmetic() || self.is_bool()
    }

    pub fn is_bool(&self) -> bool {
        if self.pointer_depth != 0 || !self.array_sizes.is_empty() {
            return false;
        }

        matches!(self.basic, Basic::Bool | Basic::Literal(LiteralKind::Bool))
    }

    pub fn is_string(&self) -> bool {
        self.basic == Basic::I8 && self.pointer_depth == 1
    }

    pub fn is_float_like(&self) -> bool {
        self.basic.is_float() || self.basic == Basic::Literal(LiteralKind::Float)
    }

    /// The pairwise coercion predicate. Symmetric, not transitive: a literal
    /// kind matches every member of its sized family, but two different sized
    /// types never match each other.
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        if self == other {
            return true;
        }

        if self.array_sizes != other.array_sizes {
            return false;
        }

        self.literal_matches(other) || other.literal_matches(self)
    }

    // `self` is the literal side
    fn literal_matches(&self, other: &Self) -> bool {
        if self.pointer_depth != 0 || self.is_reference {
            return false;
        }

        match self.basic {
            // An integer literal also reaches float targets (`let y f64 = 2`)
            Basic::Literal(LiteralKind::Integer) => {
                other.pointer_depth == 0 && (other.basic.is_integer() || other.basic.is_float())
            }
            Basic::Literal(LiteralKind::Float) => {
                other.pointer_depth == 0 && other.basic.is_float()
            }
            Basic::Literal(LiteralKind::Bool) => {
                other.pointer_depth == 0 && other.basic == Basic::Bool
            }
            Basic::Literal(LiteralKind::String) => other.is_string(),
            _ => false,
        }
    }

    /// Translates this type to its backend representation. Scalars map to IR
    /// primitives, references box their payload behind a pointer to the
    /// two-word header struct, `pointer_depth` wraps in pointers and the
    /// array dimensions wrap the result outermost first. `void*` is
    /// represented as `i8*` since the backend has no `void` element type.
    pub fn ir_type(&self, builder: &Builder) -> Option<ir::Type> {
        let mut result = if self.is_reference {
            let boxed = match &self.basic {
                Basic::Struct(name) => builder.find_struct(name)?,
                basic => builder.find_boxed(Self::boxed_name(basic)?)?,
            };
            ir::Type::Struct(boxed).pointer_to()
        } else if self.basic == Basic::Void && self.pointer_depth != 0 {
            ir::Type::I8
        } else {
            self.basic_ir_type(builder)?
        };

        for _ in 0..self.pointer_depth {
            result = result.pointer_to();
        }

        for size in self.array_sizes.iter().rev() {
            if *size == 0 {
                return None;
            }
            result = ir::Type::Array(*size, Box::new(result));
        }

        Some(result)
    }

    fn boxed_name(basic: &Basic) -> Option<&'static str> {
        Some(match basic {
            Basic::Bool => ".bool",
            Basic::I8 => ".i8",
            Basic::I16 => ".i16",
            Basic::I32 => ".i32",
            Basic::I64 => ".i64",
            Basic::U8 => ".u8",
            Basic::U16 => ".u16",
            Basic::U32 => ".u32",
            Basic::U64 => ".u64",
            Basic::F32 => ".f32",
            Basic::F64 => ".f64",
            _ => return None,
        })
    }

    fn basic_ir_type(&self, builder: &Builder) -> Option<ir::Type> {
        Some(match &self.basic {
            Basic::Void => ir::Type::Void,
            Basic::Bool | Basic::Literal(LiteralKind::Bool) => ir::Type::I1,
            Basic::I8 | Basic::U8 => ir::Type::I8,
            Basic::I16 | Basic::U16 => ir::Type::I16,
            Basic::I32 | Basic::U32 => ir::Type::I32,
            Basic::I64 | Basic::U64 | Basic::Literal(LiteralKind::Integer) => ir::Type::I64,
            Basic::F32 => ir::Type::F32,
            Basic::F64 | Basic::Literal(LiteralKind::Float) => ir::Type::F64,
            Basic::Literal(LiteralKind::String) => ir::Type::I8.pointer_to(),
            Basic::Struct(name) => ir::Type::Struct(builder.find_struct(name)?),
        })
    }
}

impl core::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for size in &self.array_sizes {
            write!(f, "[{size}]")?;
        }

        match &self.basic {
            Basic::Void => write!(f, "void")?,
            Basic::Bool => write!(f, "bool")?,
            Basic::I8 => write!(f, "i8")?,
            Basic::I16 => write!(f, "i16")?,
            Basic::I32 => write!(f, "i32")?,
            Basic::I64 => write!(f, "i64")?,
            Basic::U8 => write!(f, "u8")?,
            Basic::U16 => write!(f, "u16")?,
            Basic::U32 => write!(f, "u32")?,
            Basic::U64 => write!(f, "u64")?,
            Basic::F32 => write!(f, "f32")?,
            Basic::F64 => write!(f, "f64")?,
            Basic::Struct(name) => write!(f, "{name}")?,
            Basic::Literal(LiteralKind::Bool) => write!(f, "{{bool literal}}")?,
            Basic::Literal(LiteralKind::Integer) => write!(f, "{{integer literal}}")?,
            Basic::Literal(LiteralKind::Float) => write!(f, "{{float literal}}")?,
            Basic::Literal(LiteralKind::String) => write!(f, "{{string literal}}")?,
        }

        if self.is_reference {
            write!(f, "&")?;
        }

        for _ in 0..self.pointer_depth {
            write!(f, "*")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(kind: LiteralKind) -> ValueType {
        ValueType::literal(kind)
    }

    #[test]
    fn equality_ignores_is_argument() {
        let mut a = ValueType::scalar(Basic::I32);
        let b = ValueType::scalar(Basic::I32);
        a.is_argument = true;
        assert_eq!(a, b);
    }

    #[test]
    fn compatibility_is_symmetric() {
        let types = [
            ValueType::scalar(Basic::Bool),
            ValueType::scalar(Basic::I8),
            ValueType::scalar(Basic::I32),
            ValueType::scalar(Basic::I64),
            ValueType::scalar(Basic::U8),
            ValueType::scalar(Basic::U64),
            ValueType::scalar(Basic::F32),
            ValueType::scalar(Basic::F64),
            ValueType::pointer(Basic::I8, 1),
            ValueType::pointer(Basic::I32, 2),
            literal(LiteralKind::Bool),
            literal(LiteralKind::Integer),
            literal(LiteralKind::Float),
            literal(LiteralKind::String),
            ValueType {
                array_sizes: vec![3],
                ..ValueType::scalar(Basic::I32)
            },
            ValueType {
                array_sizes: vec![3],
                ..ValueType::literal(LiteralKind::Integer)
            },
        ];

        for a in &types {
            for b in &types {
                assert_eq!(
                    a.is_compatible_with(b),
                    b.is_compatible_with(a),
                    "compatibility must be symmetric for {a} and {b}"
                );
            }
        }
    }

    #[test]
    fn literal_families() {
        let int = literal(LiteralKind::Integer);
        assert!(int.is_compatible_with(&ValueType::scalar(Basic::I8)));
        assert!(int.is_compatible_with(&ValueType::scalar(Basic::U64)));
        assert!(int.is_compatible_with(&ValueType::scalar(Basic::F64)));
        assert!(!int.is_compatible_with(&ValueType::scalar(Basic::Bool)));

        let float = literal(LiteralKind::Float);
        assert!(float.is_compatible_with(&ValueType::scalar(Basic::F32)));
        assert!(!float.is_compatible_with(&ValueType::scalar(Basic::I32)));

        let string = literal(LiteralKind::String);
        assert!(string.is_compatible_with(&ValueType::pointer(Basic::I8, 1)));
        assert!(!string.is_compatible_with(&ValueType::pointer(Basic::I16, 1)));
        assert!(!string.is_compatible_with(&ValueType::scalar(Basic::I8)));
    }

    #[test]
    fn sized_types_do_not_cross_coerce() {
        assert!(!ValueType::scalar(Basic::I32).is_compatible_with(&ValueType::scalar(Basic::I64)));
        assert!(!ValueType::scalar(Basic::I32).is_compatible_with(&ValueType::scalar(Basic::U32)));
        assert!(!ValueType::scalar(Basic::F32).is_compatible_with(&ValueType::scalar(Basic::F64)));
    }

    #[test]
    fn array_sizes_must_agree() {
        let a = ValueType {
            array_sizes: vec![3],
            ..ValueType::literal(LiteralKind::Integer)
        };
        let b = ValueType {
            array_sizes: vec![3],
            ..ValueType::scalar(Basic::I32)
        };
        let c = ValueType {
            array_sizes: vec![4],
            ..ValueType::scalar(Basic::I32)
        };

        assert!(a.is_compatible_with(&b));
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn arithmetic_predicates() {
        assert!(ValueType::scalar(Basic::I32).is_arithmetic());
        assert!(ValueType::scalar(Basic::F64).is_arithmetic());
        assert!(literal(LiteralKind::Integer).is_arithmetic());
        assert!(!ValueType::scalar(Basic::Bool).is_arithmetic());
        assert!(!ValueType::pointer(Basic::I32, 1).is_arithmetic());

        assert!(ValueType::scalar(Basic::Bool).is_equatable());
        assert!(literal(LiteralKind::Bool).is_bool());
        assert!(ValueType::pointer(Basic::I8, 1).is_string());
    }
}
