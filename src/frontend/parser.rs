//! Recursive-descent parser. Statements and items are parsed by dedicated
//! methods; expressions use precedence climbing over the token priorities.
//! The first failure aborts the parse with the offending error recorded.

use crate::{
    error::{CompileError, ErrorKind},
    frontend::{
        ast::{
            Block, Call, CompileUnit, ConstantKind, Expression, ExpressionKind, Function,
            FunctionKind, If, Let, Path, Statement, StatementKind, StructItem, TypeNameKind,
            TypeNode, VariableDefinition, While,
        },
        lexer::{Keyword, Lexer, Token, TokenKind, TypeName},
        SourceFile,
    },
    middle::ty::{Basic, ValueType},
};

type PResult<T> = Result<T, ()>;

#[derive(Debug)]
pub struct Parser<'source> {
    lexer: Lexer<'source>,
    current: Token,
    errors: Vec<CompileError>,
}

impl<'source> Parser<'source> {
    pub fn parse_unit(source: &'source SourceFile) -> Result<CompileUnit, Vec<CompileError>> {
        let mut parser = Self {
            lexer: Lexer::new(source),
            current: Token::undefined(),
            errors: Vec::new(),
        };

        match parser.run() {
            Ok(unit) => Ok(unit),
            Err(()) => Err(parser.errors),
        }
    }

    fn run(&mut self) -> PResult<CompileUnit> {
        self.advance()?;

        let mut unit = CompileUnit {
            structs: Vec::new(),
            functions: Vec::new(),
        };

        while self.current.kind == TokenKind::Keyword(Keyword::Struct) {
            unit.structs.push(self.parse_struct()?);
        }

        if self.current.kind == TokenKind::Keyword(Keyword::Extern) {
            self.parse_extern_block(&mut unit)?;
        }

        while self.current.kind == TokenKind::Keyword(Keyword::Fn) {
            unit.functions.push(self.parse_function()?);
        }

        self.expect(TokenKind::EndOfFile)?;

        Ok(unit)
    }

    fn advance(&mut self) -> PResult<()> {
        match self.lexer.next_token() {
            Ok(token) => {
                self.current = token;
                Ok(())
            }
            Err(error) => {
                self.errors.push(error);
                Err(())
            }
        }
    }

    fn report(&mut self, token: Token, kind: ErrorKind) {
        self.errors.push(CompileError::new(token, kind));
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.current.kind != kind {
            self.report(
                self.current.clone(),
                ErrorKind::UnexpectedToken {
                    expected: kind.describe(),
                },
            );
            return Err(());
        }

        let token = self.current.clone();
        self.advance()?;
        Ok(token)
    }

    fn expect_symbol(&mut self) -> PResult<Token> {
        self.expect(TokenKind::Symbol)
    }

    /* Items */

    // struct Name { member type … }
    fn parse_struct(&mut self) -> PResult<StructItem> {
        self.expect(TokenKind::Keyword(Keyword::Struct))?;

        let name = self.expect_symbol()?;
        self.expect(TokenKind::OpenBrace)?;

        let mut members = Vec::new();
        while self.current.kind == TokenKind::Symbol {
            let member_name = self.current.clone();
            self.advance()?;

            let ty = self.parse_type()?;
            members.push(VariableDefinition {
                name: member_name,
                ty,
            });
        }

        self.expect(TokenKind::CloseBrace)?;

        Ok(StructItem { name, members })
    }

    // extern "C" { fn … ; }
    fn parse_extern_block(&mut self, unit: &mut CompileUnit) -> PResult<()> {
        self.expect(TokenKind::Keyword(Keyword::Extern))?;

        let abi = self.expect(TokenKind::ConstantString)?;
        if abi.lexeme != "C" {
            self.report(abi, ErrorKind::InvalidExternType);
            return Err(());
        }

        self.expect(TokenKind::OpenBrace)?;

        while self.current.kind == TokenKind::Keyword(Keyword::Fn) {
            unit.functions.push(self.parse_foreign_declaration()?);
        }

        self.expect(TokenKind::CloseBrace)?;

        Ok(())
    }

    // fn name(param type, …, ...) type? ;
    fn parse_foreign_declaration(&mut self) -> PResult<Function> {
        self.expect(TokenKind::Keyword(Keyword::Fn))?;

        let name = self.expect_symbol()?;
        self.expect(TokenKind::OpenParen)?;

        let mut parameters = Vec::new();
        let mut is_variadic = false;

        while self.current.kind == TokenKind::Symbol {
            let param_name = self.current.clone();
            self.advance()?;

            let ty = self.parse_type()?;
            parameters.push(VariableDefinition {
                name: param_name,
                ty,
            });

            if self.current.kind == TokenKind::Comma {
                self.advance()?;

                if self.current.kind == TokenKind::TripleDot {
                    is_variadic = true;
                    self.advance()?;
                    break;
                }
            } else {
                break;
            }
        }

        self.expect(TokenKind::CloseParen)?;

        let return_type = if self.current.kind == TokenKind::Semicolon {
            self.void_type_node()
        } else {
            self.parse_type()?
        };

        self.expect(TokenKind::Semicolon)?;

        Ok(Function {
            name,
            parameters,
            is_variadic,
            return_type,
            body: None,
            kind: FunctionKind::ForeignC,
        })
    }

    // fn name(param type, …) type? { … }
    fn parse_function(&mut self) -> PResult<Function> {
        self.expect(TokenKind::Keyword(Keyword::Fn))?;

        let name = self.expect_symbol()?;
        self.expect(TokenKind::OpenParen)?;

        let mut parameters = Vec::new();

        while self.current.kind == TokenKind::Symbol {
            let param_name = self.current.clone();
            self.advance()?;

            let ty = self.parse_type()?;

            if ty.name == TypeNameKind::Builtin(TypeName::Void) && ty.pointer_depth == 0 {
                self.report(ty.token.clone(), ErrorKind::ArgumentCanNotBeVoidType);
                return Err(());
            }

            parameters.push(VariableDefinition {
                name: param_name,
                ty,
            });

            if self.current.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }

        self.expect(TokenKind::CloseParen)?;

        let return_type = if self.current.kind == TokenKind::OpenBrace {
            self.void_type_node()
        } else {
            self.parse_type()?
        };

        let body = self.parse_block()?;

        Ok(Function {
            name,
            parameters,
            is_variadic: false,
            return_type,
            body: Some(body),
            kind: FunctionKind::Native,
        })
    }

    fn void_type_node(&self) -> TypeNode {
        TypeNode {
            token: self.current.clone(),
            name: TypeNameKind::Builtin(TypeName::Void),
            pointer_depth: 0,
            is_reference: false,
            array_sizes: Vec::new(),
        }
    }

    /* Types */

    // type := ("[" expression "]")* basic ("&" | "*"*)
    fn parse_type(&mut self) -> PResult<TypeNode> {
        let mut array_sizes = Vec::new();

        while self.current.kind == TokenKind::OpenBracket {
            self.advance()?;
            array_sizes.push(self.parse_expression()?);
            self.expect(TokenKind::CloseBracket)?;
        }

        let token = self.current.clone();
        let name = match token.kind {
            TokenKind::Type(name) => TypeNameKind::Builtin(name),
            TokenKind::Symbol => TypeNameKind::Struct(token.lexeme.clone()),
            _ => {
                self.report(
                    token,
                    ErrorKind::UnexpectedToken {
                        expected: "type name",
                    },
                );
                return Err(());
            }
        };
        self.advance()?;

        let mut pointer_depth = 0;
        let mut is_reference = false;

        if self.current.kind == TokenKind::Ampersand {
            is_reference = true;
            self.advance()?;
        } else {
            while self.current.kind == TokenKind::Asterisk {
                pointer_depth += 1;
                self.advance()?;
            }
        }

        Ok(TypeNode {
            token,
            name,
            pointer_depth,
            is_reference,
            array_sizes,
        })
    }

    fn approximate_value_type(node: &TypeNode) -> ValueType {
        let basic = match &node.name {
            TypeNameKind::Builtin(name) => Basic::from(*name),
            TypeNameKind::Struct(name) => Basic::Struct(name.clone()),
        };

        ValueType {
            basic,
            pointer_depth: node.pointer_depth,
            is_reference: node.is_reference,
            is_argument: false,
            array_sizes: Vec::new(),
        }
    }

    /* Statements */

    fn parse_block(&mut self) -> PResult<Block> {
        self.expect(TokenKind::OpenBrace)?;

        let mut statements = Vec::new();

        loop {
            match self.current.kind {
                TokenKind::Keyword(Keyword::Let) => {
                    let token = self.current.clone();
                    let statement = self.parse_let()?;
                    statements.push(Statement {
                        token,
                        kind: statement,
                    });
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Keyword(Keyword::If) => {
                    let token = self.current.clone();
                    let statement = self.parse_if()?;
                    statements.push(Statement {
                        token,
                        kind: statement,
                    });
                }
                TokenKind::Keyword(Keyword::While) => {
                    let token = self.current.clone();
                    let statement = self.parse_while()?;
                    statements.push(Statement {
                        token,
                        kind: statement,
                    });
                }
                TokenKind::Symbol => {
                    let token = self.current.clone();
                    let statement = self.parse_assign_or_call()?;
                    statements.push(Statement {
                        token,
                        kind: statement,
                    });
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Keyword(Keyword::Return) => {
                    let token = self.current.clone();
                    self.advance()?;

                    let value = if self.current.kind != TokenKind::Semicolon {
                        Some(self.parse_expression()?)
                    } else {
                        None
                    };

                    statements.push(Statement {
                        token,
                        kind: StatementKind::Return(value),
                    });
                    self.expect(TokenKind::Semicolon)?;
                }
                TokenKind::Keyword(Keyword::Break) => {
                    let token = self.current.clone();
                    self.advance()?;
                    statements.push(Statement {
                        token,
                        kind: StatementKind::Break,
                    });
                    self.expect(TokenKind::Semicolon)?;
                }
                // Empty statement
                TokenKind::Semicolon => {
                    self.advance()?;
                }
                _ => {
                    let close_brace = self.expect(TokenKind::CloseBrace)?;
                    return Ok(Block {
                        statements,
                        close_brace,
                    });
                }
            }
        }
    }

    // let name type? ("=" ("new" type)? expression?)?
    fn parse_let(&mut self) -> PResult<StatementKind> {
        let let_token = self.current.clone();
        self.expect(TokenKind::Keyword(Keyword::Let))?;

        let name = self.expect_symbol()?;

        let mut ty = None;
        if self.current.kind.is_type()
            || self.current.kind == TokenKind::Symbol
            || self.current.kind == TokenKind::OpenBracket
        {
            ty = Some(self.parse_type()?);
        }

        if ty.is_some() {
            if self.current.kind == TokenKind::Semicolon {
                return Ok(StatementKind::Let(Let {
                    name,
                    ty,
                    is_heap: false,
                    value: None,
                }));
            }
        } else if self.current.kind != TokenKind::Equals {
            self.report(let_token, ErrorKind::TypeOrInitializerMustBeSpecified);
            return Err(());
        }

        self.expect(TokenKind::Equals)?;

        let mut is_heap = false;

        if self.current.kind == TokenKind::Keyword(Keyword::New) {
            self.advance()?;

            let mut new_type = self.parse_type()?;
            new_type.is_reference = true;
            is_heap = true;

            match &ty {
                Some(explicit) => {
                    if !explicit.same_shape(&new_type) || !explicit.is_reference {
                        let expected = Self::approximate_value_type(explicit);
                        let actual = Self::approximate_value_type(&new_type);
                        self.report(let_token, ErrorKind::TypeMismatch { expected, actual });
                        return Err(());
                    }
                }
                None => ty = Some(new_type),
            }

            if self.current.kind == TokenKind::Semicolon {
                return Ok(StatementKind::Let(Let {
                    name,
                    ty,
                    is_heap,
                    value: None,
                }));
            }
        }

        let value = self.parse_expression()?;

        Ok(StatementKind::Let(Let {
            name,
            ty,
            is_heap,
            value: Some(value),
        }))
    }

    fn parse_if(&mut self) -> PResult<StatementKind> {
        self.expect(TokenKind::Keyword(Keyword::If))?;

        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let mut else_block = None;
        if self.current.kind == TokenKind::Keyword(Keyword::Else) {
            let else_token = self.current.clone();
            self.advance()?;

            if self.current.kind == TokenKind::Keyword(Keyword::If) {
                // else-if chains nest as an if statement in a synthetic block
                let token = self.current.clone();
                let nested = self.parse_if()?;
                else_block = Some(Block {
                    statements: vec![Statement {
                        token,
                        kind: nested,
                    }],
                    close_brace: else_token,
                });
            } else {
                else_block = Some(self.parse_block()?);
            }
        }

        Ok(StatementKind::If(If {
            condition,
            then_block,
            else_block,
        }))
    }

    fn parse_while(&mut self) -> PResult<StatementKind> {
        self.expect(TokenKind::Keyword(Keyword::While))?;

        let condition = self.parse_expression()?;
        let block = self.parse_block()?;

        Ok(StatementKind::While(While { condition, block }))
    }

    fn parse_assign_or_call(&mut self) -> PResult<StatementKind> {
        let path = self.parse_path()?;

        match self.current.kind {
            TokenKind::OpenParen => {
                self.advance()?;
                let arguments = self.parse_value_list()?;
                self.expect(TokenKind::CloseParen)?;

                Ok(StatementKind::Call(Call {
                    callee: path.name,
                    arguments,
                }))
            }
            TokenKind::Equals => {
                self.advance()?;
                let value = self.parse_expression()?;

                Ok(StatementKind::Assign { dest: path, value })
            }
            _ => {
                self.report(
                    self.current.clone(),
                    ErrorKind::UnexpectedToken {
                        expected: "'=' or '('",
                    },
                );
                Err(())
            }
        }
    }

    fn parse_path(&mut self) -> PResult<Path> {
        let name = self.expect_symbol()?;

        let mut index = None;
        if self.current.kind == TokenKind::OpenBracket {
            self.advance()?;
            index = Some(Box::new(self.parse_expression()?));
            self.expect(TokenKind::CloseBracket)?;
        }

        let mut member = None;
        if self.current.kind == TokenKind::Dot {
            self.advance()?;
            member = Some(Box::new(self.parse_path()?));
        }

        Ok(Path {
            name,
            index,
            member,
        })
    }

    /* Expressions */

    fn parse_value_list(&mut self) -> PResult<Vec<Expression>> {
        let mut values = Vec::new();

        if self.current.kind != TokenKind::CloseParen
            && self.current.kind != TokenKind::CloseBracket
        {
            loop {
                values.push(self.parse_expression()?);

                if self.current.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }

        Ok(values)
    }

    pub fn parse_expression(&mut self) -> PResult<Expression> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> PResult<Expression> {
        let mut lhs = self.parse_value()?;

        loop {
            let precedence = self.current.kind.precedence();
            if precedence <= min_precedence {
                return Ok(lhs);
            }

            let operator = self.current.clone();
            self.advance()?;

            let rhs = self.parse_binary(precedence)?;

            lhs = Expression {
                token: operator.clone(),
                kind: ExpressionKind::Binary {
                    operator,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            };
        }
    }

    fn parse_value(&mut self) -> PResult<Expression> {
        match self.current.kind {
            TokenKind::OpenParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;
                Ok(inner)
            }
            TokenKind::Symbol => {
                let token = self.current.clone();
                let path = self.parse_path()?;

                if self.current.kind == TokenKind::OpenParen {
                    self.advance()?;
                    let arguments = self.parse_value_list()?;
                    self.expect(TokenKind::CloseParen)?;

                    Ok(Expression {
                        token,
                        kind: ExpressionKind::Call(Call {
                            callee: path.name,
                            arguments,
                        }),
                    })
                } else {
                    Ok(Expression {
                        token,
                        kind: ExpressionKind::Path(path),
                    })
                }
            }
            TokenKind::Minus => {
                let operator = self.current.clone();
                self.advance()?;

                let operand = self.parse_value()?;

                Ok(Expression {
                    token: operator.clone(),
                    kind: ExpressionKind::Unary {
                        operator,
                        operand: Box::new(operand),
                    },
                })
            }
            TokenKind::OpenBracket => {
                let token = self.current.clone();
                self.advance()?;

                let values = self.parse_value_list()?;
                self.expect(TokenKind::CloseBracket)?;

                Ok(Expression {
                    token,
                    kind: ExpressionKind::Aggregate(values),
                })
            }
            TokenKind::ConstantBool
            | TokenKind::ConstantInteger
            | TokenKind::ConstantFloat
            | TokenKind::ConstantString => {
                let token = self.current.clone();
                let kind = match token.kind {
                    TokenKind::ConstantBool => ConstantKind::Bool,
                    TokenKind::ConstantInteger => ConstantKind::Integer,
                    TokenKind::ConstantFloat => ConstantKind::Float,
                    _ => ConstantKind::String,
                };
                self.advance()?;

                Ok(Expression {
                    token,
                    kind: ExpressionKind::Constant(kind),
                })
            }
            TokenKind::Type(_) => {
                let token = self.current.clone();
                let ty = self.parse_type()?;

                self.expect(TokenKind::OpenParen)?;
                let operand = self.parse_expression()?;
                self.expect(TokenKind::CloseParen)?;

                Ok(Expression {
                    token,
                    kind: ExpressionKind::Cast {
                        ty,
                        operand: Box::new(operand),
                    },
                })
            }
            _ => {
                self.report(
                    self.current.clone(),
                    ErrorKind::UnexpectedToken {
                        expected: "expression",
                    },
                );
                Err(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SourceFileOrigin;

    fn parse(text: &str) -> CompileUnit {
        let source = SourceFile {
            contents: text.to_string(),
            origin: SourceFileOrigin::Memory,
        };
        Parser::parse_unit(&source).expect("parse error")
    }

    fn parse_err(text: &str) -> Vec<CompileError> {
        let source = SourceFile {
            contents: text.to_string(),
            origin: SourceFileOrigin::Memory,
        };
        Parser::parse_unit(&source).expect_err("expected a parse error")
    }

    #[test]
    fn extern_block_and_function() {
        let unit = parse(
            r#"extern "C" { fn printf(fmt i8*, ...) i32; }
               fn main() i32 { printf("hi\n"); return 0; }"#,
        );

        assert_eq!(unit.functions.len(), 2);
        assert_eq!(unit.functions[0].kind, FunctionKind::ForeignC);
        assert!(unit.functions[0].is_variadic);
        assert_eq!(unit.functions[1].kind, FunctionKind::Native);
        assert_eq!(unit.functions[1].body.as_ref().unwrap().statements.len(), 2);
    }

    #[test]
    fn precedence_shapes_the_tree() {
        let unit = parse("fn f() i32 { return 1 + 2 * 3; }");
        let body = unit.functions[0].body.as_ref().unwrap();

        let StatementKind::Return(Some(expr)) = &body.statements[0].kind else {
            panic!("expected a return statement");
        };
        let ExpressionKind::Binary { operator, rhs, .. } = &expr.kind else {
            panic!("expected a binary expression");
        };

        assert_eq!(operator.kind, TokenKind::Plus);
        assert!(matches!(rhs.kind, ExpressionKind::Binary { .. }));
    }

    #[test]
    fn array_type_sizes_come_first() {
        let unit = parse("fn f() { let xs [3]i32 = [1, 2, 3]; }");
        let body = unit.functions[0].body.as_ref().unwrap();

        let StatementKind::Let(let_stmt) = &body.statements[0].kind else {
            panic!("expected a let statement");
        };
        let ty = let_stmt.ty.as_ref().unwrap();

        assert_eq!(ty.array_sizes.len(), 1);
        assert_eq!(ty.name, TypeNameKind::Builtin(TypeName::I32));
    }

    #[test]
    fn else_if_nests() {
        let unit = parse("fn f() { if true { } else if false { } else { } }");
        let body = unit.functions[0].body.as_ref().unwrap();

        let StatementKind::If(if_stmt) = &body.statements[0].kind else {
            panic!("expected an if statement");
        };
        let nested = if_stmt.else_block.as_ref().unwrap();
        assert!(matches!(nested.statements[0].kind, StatementKind::If(_)));
    }

    #[test]
    fn invalid_extern_abi() {
        let errors = parse_err(r#"extern "D" { }"#);
        assert!(matches!(errors[0].kind, ErrorKind::InvalidExternType));
    }

    #[test]
    fn let_requires_type_or_initializer() {
        let errors = parse_err("fn f() { let x; }");
        assert!(matches!(
            errors[0].kind,
            ErrorKind::TypeOrInitializerMustBeSpecified
        ));
    }

    #[test]
    fn void_parameter_is_rejected() {
        let errors = parse_err("fn f(x void) { }");
        assert!(matches!(errors[0].kind, ErrorKind::ArgumentCanNotBeVoidType));
    }
}
