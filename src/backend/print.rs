//! Serialises a module to textual IR, written to `a.ll` by the driver. Type
//! definitions come first, then string globals, declarations, and function
//! bodies with every block labelled.

use hashbrown::HashMap;

use crate::{
    backend::ir::{
        BinaryOp, CastOp, Constant, FloatPredicate, Function, Instruction, IntPredicate, Module,
        Type, UnaryOp, ValueId, ValueKind,
    },
    index::Index,
};

pub fn print_module(module: &Module) -> String {
    Printer { module }.print()
}

struct Printer<'m> {
    module: &'m Module,
}

impl<'m> Printer<'m> {
    fn print(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("; ModuleID = '{}'\n", self.module.name));

        if !self.module.struct_types.is_empty() {
            out.push('\n');
            for ty in self.module.struct_types.iter() {
                match &ty.body {
                    Some(body) => {
                        let members: Vec<String> =
                            body.iter().map(|t| self.type_name(t)).collect();
                        out.push_str(&format!(
                            "%{} = type {{ {} }}\n",
                            ty.name,
                            members.join(", ")
                        ));
                    }
                    None => out.push_str(&format!("%{} = type opaque\n", ty.name)),
                }
            }
        }

        if !self.module.globals.is_empty() {
            out.push('\n');
            for global in self.module.globals.iter() {
                out.push_str(&format!(
                    "@{} = private unnamed_addr constant [{} x i8] c\"{}\\00\"\n",
                    global.name,
                    global.bytes.len() + 1,
                    escape_bytes(&global.bytes)
                ));
            }
        }

        for function in self.module.functions.iter() {
            if function.is_declaration() {
                out.push_str(&format!(
                    "\ndeclare {} @{}({})\n",
                    self.type_name(&function.ret),
                    function.name,
                    self.param_list(function)
                ));
            }
        }

        for function in self.module.functions.iter() {
            if !function.is_declaration() {
                out.push('\n');
                self.print_function(function, &mut out);
            }
        }

        out
    }

    fn param_list(&self, function: &Function) -> String {
        let mut params: Vec<String> = function
            .params
            .iter()
            .map(|ty| self.type_name(ty))
            .collect();
        if function.is_variadic {
            params.push("...".to_string());
        }
        params.join(", ")
    }

    fn print_function(&self, function: &Function, out: &mut String) {
        // Local value names are assigned per function: arguments first, then
        // instruction results in block order.
        let mut names: HashMap<ValueId, String> = HashMap::new();

        for (index, arg) in function.arg_values.iter().enumerate() {
            names.insert(*arg, format!("%a{index}"));
        }

        let mut next = 0;
        for block in function.blocks.iter() {
            for instruction in &block.instructions {
                if let Some(result) = instruction.result() {
                    names.insert(result, format!("%t{next}"));
                    next += 1;
                }
            }
        }

        let params: Vec<String> = function
            .arg_values
            .iter()
            .enumerate()
            .map(|(index, arg)| {
                format!("{} %a{index}", self.type_name(&self.module.values[*arg].ty))
            })
            .collect();
        let mut params = params;
        if function.is_variadic {
            params.push("...".to_string());
        }

        out.push_str(&format!(
            "define {} @{}({}) {{\n",
            self.type_name(&function.ret),
            function.name,
            params.join(", ")
        ));

        for (id, block) in function.blocks.enumerate() {
            out.push_str(&format!("bb{}:\n", id.index()));
            for instruction in &block.instructions {
                out.push_str("  ");
                out.push_str(&self.instruction(instruction, &names));
                out.push('\n');
            }
        }

        out.push_str("}\n");
    }

    fn instruction(&self, instruction: &Instruction, names: &HashMap<ValueId, String>) -> String {
        match instruction {
            Instruction::Alloca { result, ty } => {
                format!("{} = alloca {}", names[result], self.type_name(ty))
            }
            Instruction::Load { result, ptr } => format!(
                "{} = load {}, ptr {}",
                names[result],
                self.type_name(&self.module.values[*result].ty),
                self.operand(*ptr, names)
            ),
            Instruction::Store { value, ptr } => format!(
                "store {} {}, ptr {}",
                self.type_name(&self.module.values[*value].ty),
                self.operand(*value, names),
                self.operand(*ptr, names)
            ),
            Instruction::GetElementPtr {
                result,
                base_ty,
                ptr,
                indices,
            } => {
                let mut line = format!(
                    "{} = getelementptr {}, ptr {}",
                    names[result],
                    self.type_name(base_ty),
                    self.operand(*ptr, names)
                );
                for index in indices {
                    line.push_str(&format!(
                        ", {} {}",
                        self.type_name(&self.module.values[*index].ty),
                        self.operand(*index, names)
                    ));
                }
                line
            }
            Instruction::Unary {
                result,
                op,
                operand,
            } => {
                let ty = self.type_name(&self.module.values[*operand].ty);
                match op {
                    UnaryOp::Neg => format!(
                        "{} = sub {} 0, {}",
                        names[result],
                        ty,
                        self.operand(*operand, names)
                    ),
                    UnaryOp::FNeg => format!(
                        "{} = fneg {} {}",
                        names[result],
                        ty,
                        self.operand(*operand, names)
                    ),
                }
            }
            Instruction::Binary {
                result,
                op,
                lhs,
                rhs,
            } => format!(
                "{} = {} {} {}, {}",
                names[result],
                binary_op_name(*op),
                self.type_name(&self.module.values[*lhs].ty),
                self.operand(*lhs, names),
                self.operand(*rhs, names)
            ),
            Instruction::ICmp {
                result,
                cond,
                lhs,
                rhs,
            } => format!(
                "{} = icmp {} {} {}, {}",
                names[result],
                int_predicate_name(*cond),
                self.type_name(&self.module.values[*lhs].ty),
                self.operand(*lhs, names),
                self.operand(*rhs, names)
            ),
            Instruction::FCmp {
                result,
                cond,
                lhs,
                rhs,
            } => format!(
                "{} = fcmp {} {} {}, {}",
                names[result],
                float_predicate_name(*cond),
                self.type_name(&self.module.values[*lhs].ty),
                self.operand(*lhs, names),
                self.operand(*rhs, names)
            ),
            Instruction::Cast {
                result,
                op,
                operand,
                to,
            } => format!(
                "{} = {} {} {} to {}",
                names[result],
                cast_op_name(*op),
                self.type_name(&self.module.values[*operand].ty),
                self.operand(*operand, names),
                self.type_name(to)
            ),
            Instruction::Call {
                result,
                callee,
                arguments,
            } => {
                let function = &self.module.functions[*callee];
                let arguments: Vec<String> = arguments
                    .iter()
                    .map(|arg| {
                        format!(
                            "{} {}",
                            self.type_name(&self.module.values[*arg].ty),
                            self.operand(*arg, names)
                        )
                    })
                    .collect();

                // Variadic callees spell out the full function type
                let callee_ty = if function.is_variadic {
                    format!(
                        "{} ({})",
                        self.type_name(&function.ret),
                        self.param_list(function)
                    )
                } else {
                    self.type_name(&function.ret)
                };

                let call = format!("call {} @{}({})", callee_ty, function.name, arguments.join(", "));
                match result {
                    Some(result) => format!("{} = {}", names[result], call),
                    None => call,
                }
            }
            Instruction::Branch { dest } => format!("br label %bb{}", dest.index()),
            Instruction::CondBranch {
                condition,
                then_block,
                else_block,
            } => format!(
                "br i1 {}, label %bb{}, label %bb{}",
                self.operand(*condition, names),
                then_block.index(),
                else_block.index()
            ),
            Instruction::Return { value } => match value {
                Some(value) => format!(
                    "ret {} {}",
                    self.type_name(&self.module.values[*value].ty),
                    self.operand(*value, names)
                ),
                None => "ret void".to_string(),
            },
            Instruction::Unreachable => "unreachable".to_string(),
        }
    }

    /// An operand without its type: a local name, a global, or an inline
    /// constant.
    fn operand(&self, value: ValueId, names: &HashMap<ValueId, String>) -> String {
        if let Some(name) = names.get(&value) {
            return name.clone();
        }

        match &self.module.values[value].kind {
            ValueKind::Constant(constant) => self.constant(constant),
            // Arguments of other functions and unnamed results never appear
            // as operands of a well-formed function
            _ => "<unnamed>".to_string(),
        }
    }

    fn constant(&self, constant: &Constant) -> String {
        match constant {
            Constant::Bool(value) => value.to_string(),
            Constant::Int { ty: Type::I1, value } => (*value != 0).to_string(),
            Constant::Int { value, .. } => value.to_string(),
            Constant::Float { value, .. } => format!("{value:?}"),
            Constant::Null(_) => "null".to_string(),
            Constant::Zero(_) => "zeroinitializer".to_string(),
            Constant::Array { elements } => {
                let elements: Vec<String> = elements
                    .iter()
                    .map(|element| {
                        format!(
                            "{} {}",
                            self.type_name(&self.module.values[*element].ty),
                            self.operand(*element, &HashMap::new())
                        )
                    })
                    .collect();
                format!("[{}]", elements.join(", "))
            }
            Constant::GlobalRef(id) => format!("@{}", self.module.globals[*id].name),
        }
    }

    fn type_name(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::I1 => "i1".to_string(),
            Type::I8 => "i8".to_string(),
            Type::I16 => "i16".to_string(),
            Type::I32 => "i32".to_string(),
            Type::I64 => "i64".to_string(),
            Type::F32 => "float".to_string(),
            Type::F64 => "double".to_string(),
            Type::Ptr(_) => "ptr".to_string(),
            Type::Array(size, element) => {
                format!("[{} x {}]", size, self.type_name(element))
            }
            Type::Struct(id) => format!("%{}", self.module.struct_types[*id].name),
        }
    }
}

fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::new();
    for &byte in bytes {
        if (0x20..0x7f).contains(&byte) && byte != b'"' && byte != b'\\' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("\\{byte:02X}"));
        }
    }
    out
}

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "add",
        BinaryOp::Sub => "sub",
        BinaryOp::Mul => "mul",
        BinaryOp::FAdd => "fadd",
        BinaryOp::FSub => "fsub",
        BinaryOp::FMul => "fmul",
        BinaryOp::SDiv => "sdiv",
        BinaryOp::UDiv => "udiv",
        BinaryOp::FDiv => "fdiv",
        BinaryOp::SRem => "srem",
        BinaryOp::URem => "urem",
        BinaryOp::FRem => "frem",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

fn int_predicate_name(cond: IntPredicate) -> &'static str {
    match cond {
        IntPredicate::Eq => "eq",
        IntPredicate::Ne => "ne",
        IntPredicate::Slt => "slt",
        IntPredicate::Sle => "sle",
        IntPredicate::Sgt => "sgt",
        IntPredicate::Sge => "sge",
        IntPredicate::Ult => "ult",
        IntPredicate::Ule => "ule",
        IntPredicate::Ugt => "ugt",
        IntPredicate::Uge => "uge",
    }
}

fn float_predicate_name(cond: FloatPredicate) -> &'static str {
    match cond {
        FloatPredicate::Oeq => "oeq",
        FloatPredicate::One => "one",
        FloatPredicate::Olt => "olt",
        FloatPredicate::Ole => "ole",
        FloatPredicate::Ogt => "ogt",
        FloatPredicate::Oge => "oge",
    }
}

fn cast_op_name(op: CastOp) -> &'static str {
    match op {
        CastOp::Trunc => "trunc",
        CastOp::Zext => "zext",
        CastOp::Sext => "sext",
        CastOp::FpTrunc => "fptrunc",
        CastOp::FpExt => "fpext",
        CastOp::SiToFp => "sitofp",
        CastOp::UiToFp => "uitofp",
        CastOp::FpToSi => "fptosi",
        CastOp::FpToUi => "fptoui",
        CastOp::Bitcast => "bitcast",
        CastOp::PtrToInt => "ptrtoint",
    }
}
