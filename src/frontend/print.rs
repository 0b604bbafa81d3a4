//! Lossy pretty-printer for the parsed tree, written to `a.txt` by the
//! driver. Expressions come out fully parenthesised; array dimensions on
//! types are not reproduced.

use crate::frontend::ast::{
    Block, Call, CompileUnit, ConstantKind, Expression, ExpressionKind, Function, FunctionKind,
    Path, Statement, StatementKind, StructItem, TypeNameKind, TypeNode,
};

pub fn print_unit(unit: &CompileUnit) -> String {
    let mut printer = AstPrinter {
        out: String::new(),
        indent: 0,
    };
    printer.unit(unit);
    printer.out
}

struct AstPrinter {
    out: String,
    indent: usize,
}

impl AstPrinter {
    fn pad(&mut self) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
    }

    fn unit(&mut self, unit: &CompileUnit) {
        for item in &unit.structs {
            self.struct_item(item);
        }
        self.out.push('\n');

        self.out.push_str("extern \"C\" {\n");
        self.indent += 1;
        for function in &unit.functions {
            if function.kind == FunctionKind::ForeignC {
                self.function(function);
            }
        }
        self.indent -= 1;
        self.out.push_str("}\n\n");

        for function in &unit.functions {
            if function.kind == FunctionKind::Native {
                self.function(function);
            }
        }
    }

    fn struct_item(&mut self, item: &StructItem) {
        self.out.push_str("struct ");
        self.out.push_str(&item.name.lexeme);
        self.out.push_str(" {\n");
        self.indent += 1;
        for member in &item.members {
            self.pad();
            self.out.push_str(&member.name.lexeme);
            self.out.push(' ');
            self.type_node(&member.ty);
            self.out.push('\n');
        }
        self.indent -= 1;
        self.out.push_str("}\n");
    }

    fn function(&mut self, function: &Function) {
        self.pad();
        self.out.push_str("fn ");
        self.out.push_str(&function.name.lexeme);
        self.out.push('(');

        let mut first = true;
        for parameter in &function.parameters {
            if !first {
                self.out.push_str(", ");
            }
            self.out.push_str(&parameter.name.lexeme);
            self.out.push(' ');
            self.type_node(&parameter.ty);
            first = false;
        }
        if function.is_variadic {
            self.out.push_str(", ...");
        }

        self.out.push_str(") ");
        self.type_node(&function.return_type);

        match &function.body {
            Some(body) => {
                self.out.push_str(" {\n");
                self.indent += 1;
                self.block(body);
                self.indent -= 1;
                self.pad();
                self.out.push_str("}\n\n");
            }
            None => self.out.push_str(";\n\n"),
        }
    }

    fn type_node(&mut self, node: &TypeNode) {
        match &node.name {
            TypeNameKind::Builtin(name) => self.out.push_str(&name.to_string()),
            TypeNameKind::Struct(name) => self.out.push_str(name),
        }

        if node.is_reference {
            self.out.push('&');
        }
        for _ in 0..node.pointer_depth {
            self.out.push('*');
        }
    }

    fn block(&mut self, block: &Block) {
        for statement in &block.statements {
            self.pad();
            self.statement(statement);
            self.out.push_str(";\n");
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::Let(let_stmt) => {
                self.out.push_str("let ");
                self.out.push_str(&let_stmt.name.lexeme);
                self.out.push(' ');
                if let Some(ty) = &let_stmt.ty {
                    self.type_node(ty);
                }
                if let Some(value) = &let_stmt.value {
                    self.out.push_str(" = ");
                    self.expression(value);
                }
            }
            StatementKind::Assign { dest, value } => {
                self.path(dest);
                self.out.push_str(" = ");
                self.expression(value);
            }
            StatementKind::Call(call) => self.call(call),
            StatementKind::If(if_stmt) => {
                self.out.push_str("if ");
                self.expression(&if_stmt.condition);
                self.out.push_str(" {\n");
                self.indent += 1;
                self.block(&if_stmt.then_block);
                self.indent -= 1;
                self.pad();
                self.out.push('}');

                if let Some(else_block) = &if_stmt.else_block {
                    self.out.push('\n');
                    self.pad();
                    self.out.push_str("else {\n");
                    self.indent += 1;
                    self.block(else_block);
                    self.indent -= 1;
                    self.pad();
                    self.out.push('}');
                }
            }
            StatementKind::While(while_stmt) => {
                self.out.push_str("while ");
                self.expression(&while_stmt.condition);
                self.out.push_str(" {\n");
                self.indent += 1;
                self.block(&while_stmt.block);
                self.indent -= 1;
                self.pad();
                self.out.push('}');
            }
            StatementKind::Return(value) => {
                self.out.push_str("return ");
                if let Some(value) = value {
                    self.expression(value);
                }
            }
            StatementKind::Break => self.out.push_str("break"),
        }
    }

    fn expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::Constant(ConstantKind::String) => {
                self.out.push('"');
                for c in expression.token.lexeme.chars() {
                    match c {
                        '\r' => self.out.push_str("\\r"),
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        other => self.out.push(other),
                    }
                }
                self.out.push('"');
            }
            ExpressionKind::Constant(_) => self.out.push_str(&expression.token.lexeme),
            ExpressionKind::Aggregate(values) => {
                self.out.push('[');
                self.expression_list(values);
                self.out.push(']');
            }
            ExpressionKind::Path(path) => self.path(path),
            ExpressionKind::Call(call) => self.call(call),
            ExpressionKind::Unary { operand, .. } => {
                self.out.push_str("-(");
                self.expression(operand);
                self.out.push(')');
            }
            ExpressionKind::Binary { operator, lhs, rhs } => {
                self.out.push('(');
                self.expression(lhs);
                self.out.push_str(") ");
                self.out.push_str(&operator.lexeme);
                self.out.push_str(" (");
                self.expression(rhs);
                self.out.push(')');
            }
            ExpressionKind::Cast { ty, operand } => {
                self.type_node(ty);
                self.out.push('(');
                self.expression(operand);
                self.out.push(')');
            }
        }
    }

    fn expression_list(&mut self, values: &[Expression]) {
        let mut first = true;
        for value in values {
            if !first {
                self.out.push_str(", ");
            }
            self.expression(value);
            first = false;
        }
    }

    fn path(&mut self, path: &Path) {
        self.out.push_str(&path.name.lexeme);
        if let Some(index) = &path.index {
            self.out.push('[');
            self.expression(index);
            self.out.push(']');
        }
        if let Some(member) = &path.member {
            self.out.push('.');
            self.path(member);
        }
    }

    fn call(&mut self, call: &Call) {
        self.out.push_str(&call.callee.lexeme);
        self.out.push('(');
        self.expression_list(&call.arguments);
        self.out.push(')');
    }
}
