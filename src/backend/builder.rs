//! The builder drives IR construction through an insertion point, mirroring
//! the instruction vocabulary the semantic pass needs. Constant operands of
//! casts, negation, arithmetic and comparisons are folded into new constants
//! instead of emitting instructions.

use hashbrown::HashMap;

use crate::{
    backend::ir::{
        BinaryOp, Block, BlockId, CastOp, Constant, FloatPredicate, Function, FunctionId, Global,
        Instruction, IntPredicate, Module, StructId, StructType, Type, UnaryOp, Value, ValueId,
        ValueKind,
    },
    index::{Index, IndexVec},
};

/// Boxed layouts created for the built-in types at module init. Every boxed
/// layout is `{ refcount, type id, payload }`.
const BOXED_BUILTINS: &[(&str, Type)] = &[
    (".bool", Type::I1),
    (".i8", Type::I8),
    (".i16", Type::I16),
    (".i32", Type::I32),
    (".i64", Type::I64),
    (".u8", Type::I8),
    (".u16", Type::I16),
    (".u32", Type::I32),
    (".u64", Type::I64),
    (".f32", Type::F32),
    (".f64", Type::F64),
];

#[derive(Debug, Clone, Copy)]
struct Position {
    function: FunctionId,
    block: BlockId,
}

#[derive(Debug)]
pub struct Builder {
    module: Module,
    position: Option<Position>,
    struct_names: HashMap<String, StructId>,
    boxed_names: HashMap<&'static str, StructId>,
    malloc: FunctionId,
    next_string: usize,
}

impl Builder {
    pub fn new(module_name: &str) -> Self {
        let mut builder = Self {
            module: Module::new(module_name),
            position: None,
            struct_names: HashMap::new(),
            boxed_names: HashMap::new(),
            malloc: FunctionId::new(0),
            next_string: 0,
        };

        let size_type = builder.size_type();
        let type_id_type = builder.type_id_type();

        for (name, payload) in BOXED_BUILTINS {
            let id = builder.module.struct_types.push(StructType {
                name: name.to_string(),
                body: Some(vec![size_type.clone(), type_id_type.clone(), payload.clone()]),
            });
            builder.boxed_names.insert(*name, id);
        }

        builder.malloc =
            builder.declare_function("malloc", vec![size_type], Type::I8.pointer_to(), false);

        builder
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn size_type(&self) -> Type {
        Type::I64
    }

    pub fn type_id_type(&self) -> Type {
        Type::I32
    }

    pub fn value_type(&self, value: ValueId) -> &Type {
        &self.module.values[value].ty
    }

    fn constant_of(&self, value: ValueId) -> Option<&Constant> {
        match &self.module.values[value].kind {
            ValueKind::Constant(constant) => Some(constant),
            _ => None,
        }
    }

    fn new_value(&mut self, ty: Type, kind: ValueKind) -> ValueId {
        self.module.values.push(Value { ty, kind })
    }

    fn new_constant(&mut self, ty: Type, constant: Constant) -> ValueId {
        self.new_value(ty, ValueKind::Constant(constant))
    }

    /* Constants */

    pub fn const_bool(&mut self, value: bool) -> ValueId {
        self.new_constant(Type::I1, Constant::Bool(value))
    }

    pub fn const_int(&mut self, ty: Type, value: i64) -> ValueId {
        self.new_constant(ty.clone(), Constant::Int { ty, value })
    }

    pub fn const_float(&mut self, ty: Type, value: f64) -> ValueId {
        self.new_constant(ty.clone(), Constant::Float { ty, value })
    }

    pub fn const_null(&mut self, ty: Type) -> ValueId {
        self.new_constant(ty.clone(), Constant::Null(ty))
    }

    pub fn const_zero(&mut self, ty: Type) -> ValueId {
        match ty {
            Type::I1 => self.const_bool(false),
            Type::I8 | Type::I16 | Type::I32 | Type::I64 => self.const_int(ty, 0),
            Type::F32 | Type::F64 => self.const_float(ty, 0.0),
            Type::Ptr(_) => self.const_null(ty),
            other => self.new_constant(other.clone(), Constant::Zero(other)),
        }
    }

    /// A private null-terminated byte array; the value is its address.
    pub fn global_string(&mut self, text: &str) -> ValueId {
        let name = format!("str.{}", self.next_string);
        self.next_string += 1;

        let id = self.module.globals.push(Global {
            name,
            bytes: text.as_bytes().to_vec(),
        });

        self.new_constant(Type::I8.pointer_to(), Constant::GlobalRef(id))
    }

    pub fn const_array(&mut self, element_ty: Type, elements: Vec<ValueId>) -> ValueId {
        let ty = Type::Array(elements.len() as u64, Box::new(element_ty));
        self.new_constant(ty, Constant::Array { elements })
    }

    /* Types */

    pub fn create_struct_type(&mut self, name: &str) -> StructId {
        let id = self.module.struct_types.push(StructType {
            name: name.to_string(),
            body: None,
        });
        self.struct_names.insert(name.to_string(), id);
        id
    }

    pub fn set_struct_body(&mut self, id: StructId, body: Vec<Type>) {
        self.module.struct_types[id].body = Some(body);
    }

    pub fn find_struct(&self, name: &str) -> Option<StructId> {
        self.struct_names.get(name).copied()
    }

    pub fn find_boxed(&self, name: &str) -> Option<StructId> {
        self.boxed_names.get(name).copied()
    }

    pub fn struct_body(&self, id: StructId) -> Option<&[Type]> {
        self.module.struct_types[id].body.as_deref()
    }

    /* Functions and blocks */

    pub fn declare_function(
        &mut self,
        name: &str,
        params: Vec<Type>,
        ret: Type,
        is_variadic: bool,
    ) -> FunctionId {
        let function = self.module.functions.next_index();

        let arg_values = params
            .iter()
            .enumerate()
            .map(|(index, ty)| {
                self.module.values.push(Value {
                    ty: ty.clone(),
                    kind: ValueKind::Argument { function, index },
                })
            })
            .collect();

        self.module.functions.push(Function {
            name: name.to_string(),
            params,
            ret,
            is_variadic,
            arg_values,
            blocks: IndexVec::new(),
        })
    }

    pub fn append_block(&mut self, function: FunctionId) -> BlockId {
        self.module.functions[function].blocks.push(Block::default())
    }

    pub fn set_insert_point(&mut self, function: FunctionId, block: BlockId) {
        self.position = Some(Position { function, block });
    }

    pub fn current_block(&self) -> Option<BlockId> {
        self.position.map(|position| position.block)
    }

    /// The SSA value of the current function's n-th parameter.
    pub fn argument(&self, index: usize) -> Option<ValueId> {
        let position = self.position?;
        self.module.functions[position.function]
            .arg_values
            .get(index)
            .copied()
    }

    fn push(&mut self, instruction: Instruction) {
        let position = self.position.expect("no insertion point set");
        self.module.functions[position.function].blocks[position.block]
            .instructions
            .push(instruction);
    }

    /* Memory */

    /// Allocates stack storage in the current function's entry block,
    /// regardless of where the insertion point currently is. Allocas stay
    /// grouped at the top of the entry block in creation order.
    pub fn alloca_in_entry(&mut self, ty: Type) -> ValueId {
        let position = self.position.expect("no insertion point set");
        let result = self.new_value(ty.clone().pointer_to(), ValueKind::Instruction);

        let entry = &mut self.module.functions[position.function].blocks[BlockId::ENTRY];
        let at = entry
            .instructions
            .iter()
            .take_while(|i| matches!(i, Instruction::Alloca { .. }))
            .count();
        entry.instructions.insert(at, Instruction::Alloca { result, ty });

        result
    }

    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let Type::Ptr(pointee) = self.value_type(ptr) else {
            panic!("load from a non-pointer value");
        };

        let result = self.new_value((**pointee).clone(), ValueKind::Instruction);
        self.push(Instruction::Load { result, ptr });
        result
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        self.push(Instruction::Store { value, ptr });
    }

    pub fn gep(&mut self, base_ty: Type, ptr: ValueId, indices: Vec<ValueId>) -> Option<ValueId> {
        let result_ty = self.gep_result_type(&base_ty, &indices)?;
        let result = self.new_value(result_ty, ValueKind::Instruction);
        self.push(Instruction::GetElementPtr {
            result,
            base_ty,
            ptr,
            indices,
        });
        Some(result)
    }

    fn gep_result_type(&self, base_ty: &Type, indices: &[ValueId]) -> Option<Type> {
        let mut ty = base_ty.clone();

        for index in indices.iter().skip(1) {
            ty = match ty {
                Type::Array(_, element) => *element,
                Type::Struct(id) => {
                    let Some(Constant::Int { value, .. }) = self.constant_of(*index) else {
                        return None;
                    };
                    self.struct_body(id)?.get(*value as usize)?.clone()
                }
                _ => return None,
            };
        }

        Some(ty.pointer_to())
    }

    /// GEP to element `0, index` of an aggregate, the shape every array and
    /// struct-member access lowers to.
    pub fn gep_element(
        &mut self,
        base_ty: Type,
        ptr: ValueId,
        index: ValueId,
    ) -> Option<ValueId> {
        let zero = self.const_int(Type::I32, 0);
        self.gep(base_ty, ptr, vec![zero, index])
    }

    /* Arithmetic */

    pub fn neg(&mut self, operand: ValueId) -> ValueId {
        if let Some(Constant::Int { ty, value }) = self.constant_of(operand).cloned() {
            return self.const_int(ty, value.wrapping_neg());
        }

        let ty = self.value_type(operand).clone();
        let result = self.new_value(ty, ValueKind::Instruction);
        self.push(Instruction::Unary {
            result,
            op: UnaryOp::Neg,
            operand,
        });
        result
    }

    pub fn fneg(&mut self, operand: ValueId) -> ValueId {
        if let Some(Constant::Float { ty, value }) = self.constant_of(operand).cloned() {
            return self.const_float(ty, -value);
        }

        let ty = self.value_type(operand).clone();
        let result = self.new_value(ty, ValueKind::Instruction);
        self.push(Instruction::Unary {
            result,
            op: UnaryOp::FNeg,
            operand,
        });
        result
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let Some(folded) = self.fold_binary(op, lhs, rhs) {
            return folded;
        }

        let ty = self.value_type(lhs).clone();
        let result = self.new_value(ty, ValueKind::Instruction);
        self.push(Instruction::Binary {
            result,
            op,
            lhs,
            rhs,
        });
        result
    }

    fn fold_binary(&mut self, op: BinaryOp, lhs: ValueId, rhs: ValueId) -> Option<ValueId> {
        let lhs_const = self.constant_of(lhs).cloned()?;
        let rhs_const = self.constant_of(rhs).cloned()?;

        match (lhs_const, rhs_const) {
            (Constant::Int { ty, value: a }, Constant::Int { value: b, .. }) => {
                let value = match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::SDiv => a.checked_div(b)?,
                    BinaryOp::SRem => a.checked_rem(b)?,
                    BinaryOp::UDiv => {
                        if b == 0 {
                            return None;
                        }
                        ((a as u64) / (b as u64)) as i64
                    }
                    BinaryOp::URem => {
                        if b == 0 {
                            return None;
                        }
                        ((a as u64) % (b as u64)) as i64
                    }
                    _ => return None,
                };
                Some(self.const_int(ty, value))
            }
            (Constant::Float { ty, value: a }, Constant::Float { value: b, .. }) => {
                let value = match op {
                    BinaryOp::FAdd => a + b,
                    BinaryOp::FSub => a - b,
                    BinaryOp::FMul => a * b,
                    BinaryOp::FDiv => a / b,
                    BinaryOp::FRem => a % b,
                    _ => return None,
                };
                Some(self.const_float(ty, value))
            }
            (Constant::Bool(a), Constant::Bool(b)) => {
                let value = match op {
                    BinaryOp::And => a && b,
                    BinaryOp::Or => a || b,
                    _ => return None,
                };
                Some(self.const_bool(value))
            }
            _ => None,
        }
    }

    pub fn icmp(&mut self, cond: IntPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let (Some(a), Some(b)) = (self.constant_of(lhs).cloned(), self.constant_of(rhs).cloned())
        {
            if let Some(folded) = Self::fold_icmp(cond, &a, &b) {
                return self.const_bool(folded);
            }
        }

        let result = self.new_value(Type::I1, ValueKind::Instruction);
        self.push(Instruction::ICmp {
            result,
            cond,
            lhs,
            rhs,
        });
        result
    }

    fn fold_icmp(cond: IntPredicate, lhs: &Constant, rhs: &Constant) -> Option<bool> {
        match (lhs, rhs) {
            (Constant::Int { value: a, .. }, Constant::Int { value: b, .. }) => {
                let (a, b) = (*a, *b);
                let (ua, ub) = (a as u64, b as u64);
                Some(match cond {
                    IntPredicate::Eq => a == b,
                    IntPredicate::Ne => a != b,
                    IntPredicate::Slt => a < b,
                    IntPredicate::Sle => a <= b,
                    IntPredicate::Sgt => a > b,
                    IntPredicate::Sge => a >= b,
                    IntPredicate::Ult => ua < ub,
                    IntPredicate::Ule => ua <= ub,
                    IntPredicate::Ugt => ua > ub,
                    IntPredicate::Uge => ua >= ub,
                })
            }
            (Constant::Bool(a), Constant::Bool(b)) => Some(match cond {
                IntPredicate::Eq => a == b,
                IntPredicate::Ne => a != b,
                _ => return None,
            }),
            _ => None,
        }
    }

    pub fn fcmp(&mut self, cond: FloatPredicate, lhs: ValueId, rhs: ValueId) -> ValueId {
        if let (Some(a), Some(b)) = (self.constant_of(lhs).cloned(), self.constant_of(rhs).cloned())
        {
            if let Some(folded) = Self::fold_fcmp(cond, &a, &b) {
                return self.const_bool(folded);
            }
        }

        let result = self.new_value(Type::I1, ValueKind::Instruction);
        self.push(Instruction::FCmp {
            result,
            cond,
            lhs,
            rhs,
        });
        result
    }

    fn fold_fcmp(cond: FloatPredicate, lhs: &Constant, rhs: &Constant) -> Option<bool> {
        let (Constant::Float { value: a, .. }, Constant::Float { value: b, .. }) = (lhs, rhs)
        else {
            return None;
        };
        let (a, b) = (*a, *b);

        Some(match cond {
            FloatPredicate::Oeq => a == b,
            FloatPredicate::One => a != b && !a.is_nan() && !b.is_nan(),
            FloatPredicate::Olt => a < b,
            FloatPredicate::Ole => a <= b,
            FloatPredicate::Ogt => a > b,
            FloatPredicate::Oge => a >= b,
        })
    }

    /* Conversions */

    pub fn cast(&mut self, op: CastOp, operand: ValueId, to: Type) -> ValueId {
        if let Some(folded) = self.fold_cast(op, operand, &to) {
            return folded;
        }

        let result = self.new_value(to.clone(), ValueKind::Instruction);
        self.push(Instruction::Cast {
            result,
            op,
            operand,
            to,
        });
        result
    }

    fn fold_cast(&mut self, op: CastOp, operand: ValueId, to: &Type) -> Option<ValueId> {
        let constant = self.constant_of(operand).cloned()?;

        match (op, constant) {
            (CastOp::Trunc, Constant::Int { value, .. }) => {
                let width = to.int_bit_width()?;
                let shift = 64 - width;
                Some(self.const_int(to.clone(), (value << shift) >> shift))
            }
            (CastOp::Zext, Constant::Int { value, .. }) => {
                Some(self.const_int(to.clone(), value))
            }
            (CastOp::Zext, Constant::Bool(b)) => Some(self.const_int(to.clone(), b as i64)),
            (CastOp::Sext, Constant::Int { value, .. }) => {
                Some(self.const_int(to.clone(), value))
            }
            (CastOp::FpTrunc, Constant::Float { value, .. }) => {
                Some(self.const_float(to.clone(), value as f32 as f64))
            }
            (CastOp::FpExt, Constant::Float { value, .. }) => {
                Some(self.const_float(to.clone(), value))
            }
            (CastOp::SiToFp, Constant::Int { value, .. }) => {
                Some(self.const_float(to.clone(), value as f64))
            }
            (CastOp::UiToFp, Constant::Int { value, .. }) => {
                Some(self.const_float(to.clone(), value as u64 as f64))
            }
            (CastOp::FpToSi, Constant::Float { value, .. }) => {
                Some(self.const_int(to.clone(), value as i64))
            }
            (CastOp::FpToUi, Constant::Float { value, .. }) => {
                Some(self.const_int(to.clone(), value as u64 as i64))
            }
            _ => None,
        }
    }

    /// Truncate, zero-extend, or pass through by comparing integer widths.
    pub fn trunc_or_extend(&mut self, operand: ValueId, to: Type) -> ValueId {
        let from_width = self
            .value_type(operand)
            .int_bit_width()
            .expect("integer conversion on a non-integer value");
        let to_width = to.int_bit_width().expect("integer conversion to a non-integer type");

        if to_width < from_width {
            self.cast(CastOp::Trunc, operand, to)
        } else if from_width < to_width {
            self.cast(CastOp::Zext, operand, to)
        } else {
            operand
        }
    }

    /* Control flow */

    pub fn branch(&mut self, dest: BlockId) {
        self.push(Instruction::Branch { dest });
    }

    pub fn cond_branch(&mut self, condition: ValueId, then_block: BlockId, else_block: BlockId) {
        self.push(Instruction::CondBranch {
            condition,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: ValueId) {
        self.push(Instruction::Return { value: Some(value) });
    }

    pub fn ret_void(&mut self) {
        self.push(Instruction::Return { value: None });
    }

    pub fn unreachable(&mut self) {
        self.push(Instruction::Unreachable);
    }

    /* Calls and heap objects */

    pub fn call(&mut self, callee: FunctionId, arguments: Vec<ValueId>) -> Option<ValueId> {
        let ret = self.module.functions[callee].ret.clone();

        let result = if ret == Type::Void {
            None
        } else {
            Some(self.new_value(ret, ValueKind::Instruction))
        };

        self.push(Instruction::Call {
            result,
            callee,
            arguments,
        });

        result
    }

    /// The size of a type as a `size_t` value, computed with the
    /// gep-from-null idiom so the backend needs no target data layout.
    pub fn size_of(&mut self, ty: Type) -> ValueId {
        let null = self.const_null(ty.clone().pointer_to());
        let one = self.const_int(Type::I32, 1);
        let end = self
            .gep(ty, null, vec![one])
            .expect("sizeof gep cannot fail");
        self.cast(CastOp::PtrToInt, end, self.size_type())
    }

    /// `malloc(sizeof ty)`; the result is a raw `i8*`.
    pub fn call_malloc(&mut self, ty: Type) -> ValueId {
        let size = self.size_of(ty);
        self.call(self.malloc, vec![size])
            .expect("malloc returns a pointer")
    }

    /// Writes a freshly allocated object's header: refcount 1, type id 0,
    /// then the initializer (or zero) into the payload members.
    pub fn initialize_object(
        &mut self,
        object: ValueId,
        initializer: Option<ValueId>,
    ) -> Option<()> {
        let Type::Ptr(pointee) = self.value_type(object).clone() else {
            return None;
        };
        let Type::Struct(struct_id) = *pointee else {
            return None;
        };
        let body = self.struct_body(struct_id)?.to_vec();

        let refcount_index = self.const_int(Type::I32, 0);
        let refcount_ptr = self.gep_element(Type::Struct(struct_id), object, refcount_index)?;
        let one = self.const_int(self.size_type(), 1);
        self.store(one, refcount_ptr);

        let type_id_index = self.const_int(Type::I32, 1);
        let type_id_ptr = self.gep_element(Type::Struct(struct_id), object, type_id_index)?;
        let zero = self.const_int(self.type_id_type(), 0);
        self.store(zero, type_id_ptr);

        match initializer {
            Some(value) => {
                let payload_index = self.const_int(Type::I32, 2);
                let payload_ptr =
                    self.gep_element(Type::Struct(struct_id), object, payload_index)?;
                self.store(value, payload_ptr);
            }
            None => {
                for (index, member_ty) in body.iter().enumerate().skip(2) {
                    let member_index = self.const_int(Type::I32, index as i64);
                    let member_ptr =
                        self.gep_element(Type::Struct(struct_id), object, member_index)?;
                    let zero = self.const_zero(member_ty.clone());
                    self.store(zero, member_ptr);
                }
            }
        }

        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_of_constants_fold() {
        let mut builder = Builder::new("test");
        let big = builder.const_int(Type::I64, 300);
        let truncated = builder.cast(CastOp::Trunc, big, Type::I8);

        assert!(matches!(
            builder.constant_of(truncated),
            Some(Constant::Int { value: 44, .. })
        ));
    }

    #[test]
    fn arithmetic_on_constants_folds() {
        let mut builder = Builder::new("test");
        let a = builder.const_int(Type::I64, 40);
        let b = builder.const_int(Type::I64, 2);

        let sum = builder.binary(BinaryOp::Add, a, b);
        assert!(matches!(
            builder.constant_of(sum),
            Some(Constant::Int { value: 42, .. })
        ));

        let cmp = builder.icmp(IntPredicate::Slt, a, b);
        assert!(matches!(builder.constant_of(cmp), Some(Constant::Bool(false))));
    }

    #[test]
    fn division_by_zero_is_not_folded() {
        let mut builder = Builder::new("test");
        let f = builder.declare_function("f", vec![], Type::I64, false);
        let entry = builder.append_block(f);
        builder.set_insert_point(f, entry);

        let a = builder.const_int(Type::I64, 1);
        let zero = builder.const_int(Type::I64, 0);
        let div = builder.binary(BinaryOp::SDiv, a, zero);

        assert!(builder.constant_of(div).is_none());
    }

    #[test]
    fn allocas_stay_at_the_top_of_the_entry_block() {
        let mut builder = Builder::new("test");
        let f = builder.declare_function("f", vec![], Type::Void, false);
        let entry = builder.append_block(f);
        builder.set_insert_point(f, entry);

        let first = builder.alloca_in_entry(Type::I32);
        let value = builder.const_int(Type::I32, 7);
        builder.store(value, first);
        let _second = builder.alloca_in_entry(Type::I64);

        let instructions = &builder.module().functions[f].blocks[BlockId::ENTRY].instructions;
        assert!(matches!(instructions[0], Instruction::Alloca { .. }));
        assert!(matches!(instructions[1], Instruction::Alloca { .. }));
        assert!(matches!(instructions[2], Instruction::Store { .. }));
    }

    #[test]
    fn boxed_builtins_have_header_layouts() {
        let builder = Builder::new("test");
        let boxed = builder.find_boxed(".i32").unwrap();
        let body = builder.struct_body(boxed).unwrap();

        assert_eq!(body, &[Type::I64, Type::I32, Type::I32]);
    }
}
