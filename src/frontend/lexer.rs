use std::{collections::BTreeMap, str::Chars};

use itertools::{peek_nth, PeekNth};
use once_cell::sync::Lazy;
use strum::EnumString;

use crate::{
    error::{CompileError, ErrorKind},
    frontend::SourceFile,
};

#[derive(Debug)]
pub struct Lexer<'source> {
    chars: PeekNth<Chars<'source>>,
    line: usize,
    column: usize,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn undefined() -> Self {
        Token {
            kind: TokenKind::Undefined,
            lexeme: String::new(),
            line: 0,
            column: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Undefined,

    /* Words */
    Keyword(Keyword), // fn
    Type(TypeName),   // i32
    Symbol,           // main

    /* Literals */
    ConstantBool,    // true
    ConstantInteger, // 1
    ConstantFloat,   // 1.0
    ConstantString,  // "hello, world"

    /* Delimiters */
    OpenParen,    // (
    CloseParen,   // )
    OpenBracket,  // [
    CloseBracket, // ]
    OpenBrace,    // {
    CloseBrace,   // }
    Semicolon,    // ;
    Comma,        // ,
    Dot,          // .
    TripleDot,    // ...
    Ampersand,    // &

    /* Unary + Binary Ops */
    Asterisk, // *
    Minus,    // -

    /* Binary Ops */
    Plus,                 // +
    Slash,                // /
    Percent,              // %
    LogicalAnd,           // &&
    LogicalOr,            // ||
    EqualEqual,           // ==
    NotEqual,             // !=
    LessThan,             // <
    LessThanOrEqual,      // <=
    GreaterThan,          // >
    GreaterThanOrEqual,   // >=

    /* Assignment */
    Equals, // =

    EndOfFile,
}

impl TokenKind {
    /// Binding power for the expression parser. Zero means "not a binary
    /// operator" and terminates precedence climbing.
    pub fn precedence(self) -> u8 {
        match self {
            Self::Asterisk | Self::Slash | Self::Percent => 9,
            Self::Plus | Self::Minus => 8,
            Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual => 6,
            Self::EqualEqual | Self::NotEqual => 5,
            Self::LogicalAnd => 2,
            Self::LogicalOr => 1,
            _ => 0,
        }
    }

    pub fn is_type(self) -> bool {
        matches!(self, Self::Type(_))
    }

    pub fn is_constant(self) -> bool {
        matches!(
            self,
            Self::ConstantBool | Self::ConstantInteger | Self::ConstantFloat | Self::ConstantString
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Undefined => "nothing",
            Self::Keyword(keyword) => keyword.describe(),
            Self::Type(_) => "type name",
            Self::Symbol => "identifier",
            Self::ConstantBool => "boolean constant",
            Self::ConstantInteger => "integer constant",
            Self::ConstantFloat => "float constant",
            Self::ConstantString => "string constant",
            Self::OpenParen => "'('",
            Self::CloseParen => "')'",
            Self::OpenBracket => "'['",
            Self::CloseBracket => "']'",
            Self::OpenBrace => "'{'",
            Self::CloseBrace => "'}'",
            Self::Semicolon => "';'",
            Self::Comma => "','",
            Self::Dot => "'.'",
            Self::TripleDot => "'...'",
            Self::Ampersand => "'&'",
            Self::Asterisk => "'*'",
            Self::Minus => "'-'",
            Self::Plus => "'+'",
            Self::Slash => "'/'",
            Self::Percent => "'%'",
            Self::LogicalAnd => "'&&'",
            Self::LogicalOr => "'||'",
            Self::EqualEqual => "'=='",
            Self::NotEqual => "'!='",
            Self::LessThan => "'<'",
            Self::LessThanOrEqual => "'<='",
            Self::GreaterThan => "'>'",
            Self::GreaterThanOrEqual => "'>='",
            Self::Equals => "'='",
            Self::EndOfFile => "end of file",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    Struct,
    Extern,
    Fn,
    Return,
    Let,
    New,
    If,
    Else,
    While,
    Break,
}

impl Keyword {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Struct => "'struct'",
            Self::Extern => "'extern'",
            Self::Fn => "'fn'",
            Self::Return => "'return'",
            Self::Let => "'let'",
            Self::New => "'new'",
            Self::If => "'if'",
            Self::Else => "'else'",
            Self::While => "'while'",
            Self::Break => "'break'",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TypeName {
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
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('[', TokenKind::OpenBracket),
        (']', TokenKind::CloseBracket),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('*', TokenKind::Asterisk),
        ('-', TokenKind::Minus),
        ('+', TokenKind::Plus),
        ('/', TokenKind::Slash),
        ('%', TokenKind::Percent),
        ('=', TokenKind::Equals),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
        ('&', TokenKind::Ampersand),
        ('.', TokenKind::Dot),
    ])
});

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        let mut chars = peek_nth(source.contents.chars());

        // A UTF-8 BOM at the start of the file is skipped transparently.
        if chars.peek() == Some(&'\u{feff}') {
            chars.next();
        }

        Self {
            chars,
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;

        match c {
            '\n' => {
                self.line += 1;
                self.column = 1;
            }
            // A lone carriage return counts as a line break; \r\n lets the
            // following \n do it.
            '\r' if self.chars.peek() != Some(&'\n') => {
                self.line += 1;
                self.column = 1;
            }
            _ => self.column += 1,
        }

        Some(c)
    }

    fn error(&self, kind: ErrorKind, lexeme: String, line: usize, column: usize) -> CompileError {
        CompileError {
            token: Token {
                kind: TokenKind::Undefined,
                lexeme,
                line,
                column,
            },
            kind,
        }
    }

    /// Produces the next token in the stream. The stream ends with an
    /// `EndOfFile` token which is returned again on every further call.
    pub fn next_token(&mut self) -> Result<Token, CompileError> {
        loop {
            let line = self.line;
            let column = self.column;

            let Some(c) = self.chars.peek().copied() else {
                return Ok(Token {
                    kind: TokenKind::EndOfFile,
                    lexeme: String::new(),
                    line,
                    column,
                });
            };

            let token = match c {
                // A byte-order mark anywhere but the file start
                '\u{feff}' => {
                    return Err(self.error(ErrorKind::IllegalFileFormat, String::new(), line, column));
                }

                // Ignore whitespace
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }

                // Ignore line comments
                '/' if self.chars.peek_nth(1) == Some(&'/') => {
                    while let Some(c) = self.chars.peek().copied() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                        self.bump();
                    }
                    continue;
                }
                // Ignore block comments
                '/' if self.chars.peek_nth(1) == Some(&'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.chars.peek().copied() {
                            None => {
                                return Err(self.error(
                                    ErrorKind::UnexpectedEof,
                                    String::new(),
                                    self.line,
                                    self.column,
                                ));
                            }
                            Some('*') if self.chars.peek_nth(1) == Some(&'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                    continue;
                }

                '"' => self.read_string(line, column)?,

                n if n.is_ascii_digit() => self.read_number(line, column),

                a if a.is_ascii_alphabetic() || a == '_' => self.read_word(line, column),

                // Two and three character operators
                '=' if self.chars.peek_nth(1) == Some(&'=') => {
                    self.read_double(TokenKind::EqualEqual, "==", line, column)
                }
                '!' => {
                    if self.chars.peek_nth(1) == Some(&'=') {
                        self.read_double(TokenKind::NotEqual, "!=", line, column)
                    } else {
                        self.bump();
                        return Err(self.error(
                            ErrorKind::UnexpectedCharactor('!'),
                            "!".to_string(),
                            line,
                            column,
                        ));
                    }
                }
                '|' => {
                    if self.chars.peek_nth(1) == Some(&'|') {
                        self.read_double(TokenKind::LogicalOr, "||", line, column)
                    } else {
                        self.bump();
                        return Err(self.error(
                            ErrorKind::UnexpectedCharactor('|'),
                            "|".to_string(),
                            line,
                            column,
                        ));
                    }
                }
                '&' if self.chars.peek_nth(1) == Some(&'&') => {
                    self.read_double(TokenKind::LogicalAnd, "&&", line, column)
                }
                '<' if self.chars.peek_nth(1) == Some(&'=') => {
                    self.read_double(TokenKind::LessThanOrEqual, "<=", line, column)
                }
                '>' if self.chars.peek_nth(1) == Some(&'=') => {
                    self.read_double(TokenKind::GreaterThanOrEqual, ">=", line, column)
                }
                '.' if self.chars.peek_nth(1) == Some(&'.') => {
                    if self.chars.peek_nth(2) == Some(&'.') {
                        self.bump();
                        self.bump();
                        self.bump();
                        Token {
                            kind: TokenKind::TripleDot,
                            lexeme: "...".to_string(),
                            line,
                            column,
                        }
                    } else {
                        self.bump();
                        self.bump();
                        return Err(self.error(
                            ErrorKind::UnexpectedCharactor('.'),
                            "..".to_string(),
                            line,
                            column,
                        ));
                    }
                }

                s if SINGLE_TOKENS.contains_key(&s) => {
                    self.bump();
                    Token {
                        kind: *SINGLE_TOKENS.get(&s).unwrap(),
                        lexeme: s.to_string(),
                        line,
                        column,
                    }
                }

                c => {
                    self.bump();
                    return Err(self.error(
                        ErrorKind::UnexpectedCharactor(c),
                        c.to_string(),
                        line,
                        column,
                    ));
                }
            };

            return Ok(token);
        }
    }

    fn read_double(&mut self, kind: TokenKind, lexeme: &str, line: usize, column: usize) -> Token {
        self.bump();
        self.bump();

        Token {
            kind,
            lexeme: lexeme.to_string(),
            line,
            column,
        }
    }

    // Keyword, type name, identifier, or boolean literal
    fn read_word(&mut self, line: usize, column: usize) -> Token {
        let mut lexeme = String::new();

        while let Some(c) = self.chars.peek().copied() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            lexeme.push(c);
            self.bump();
        }

        let kind = if let Ok(keyword) = lexeme.parse() {
            TokenKind::Keyword(keyword)
        } else if let Ok(name) = lexeme.parse() {
            TokenKind::Type(name)
        } else {
            match lexeme.as_str() {
                "true" | "false" => TokenKind::ConstantBool,
                _ => TokenKind::Symbol,
            }
        };

        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }

    // Integer or float literal. Underscore separators are dropped from the
    // lexeme; a dot directly after the integer part extends it to a float.
    fn read_number(&mut self, line: usize, column: usize) -> Token {
        let mut lexeme = String::new();
        let mut kind = TokenKind::ConstantInteger;

        // Hex literals keep their prefix for the constant parser
        if self.chars.peek() == Some(&'0')
            && matches!(self.chars.peek_nth(1), Some('x') | Some('X'))
        {
            lexeme.push(self.bump().unwrap());
            lexeme.push(self.bump().unwrap());

            while let Some(c) = self.chars.peek().copied() {
                if c.is_ascii_hexdigit() {
                    lexeme.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }

            return Token {
                kind,
                lexeme,
                line,
                column,
            };
        }

        while let Some(c) = self.chars.peek().copied() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.bump();
            } else if c == '_' {
                self.bump();
            } else {
                break;
            }
        }

        if self.chars.peek() == Some(&'.')
            && self.chars.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            kind = TokenKind::ConstantFloat;
            lexeme.push('.');
            self.bump();

            while let Some(c) = self.chars.peek().copied() {
                if c.is_ascii_digit() {
                    lexeme.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        Token {
            kind,
            lexeme,
            line,
            column,
        }
    }

    // String literal. The lexeme holds the unescaped bytes.
    fn read_string(&mut self, line: usize, column: usize) -> Result<Token, CompileError> {
        self.bump();

        let mut lexeme = String::new();

        loop {
            let Some(c) = self.chars.peek().copied() else {
                return Err(self.error(ErrorKind::UnexpectedEof, String::new(), self.line, self.column));
            };

            match c {
                '"' => {
                    self.bump();
                    break;
                }
                '\\' => {
                    self.bump();
                    let Some(escaped) = self.bump() else {
                        return Err(self.error(
                            ErrorKind::UnexpectedEof,
                            String::new(),
                            self.line,
                            self.column,
                        ));
                    };

                    match escaped {
                        'r' => lexeme.push('\r'),
                        'n' => lexeme.push('\n'),
                        't' => lexeme.push('\t'),
                        '\\' => lexeme.push('\\'),
                        '"' => lexeme.push('"'),
                        other => {
                            return Err(self.error(
                                ErrorKind::UnexpectedCharactor(other),
                                other.to_string(),
                                self.line,
                                self.column,
                            ));
                        }
                    }
                }
                _ => {
                    lexeme.push(c);
                    self.bump();
                }
            }
        }

        Ok(Token {
            kind: TokenKind::ConstantString,
            lexeme,
            line,
            column,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::SourceFileOrigin;

    fn lex(text: &str) -> Vec<Token> {
        let source = SourceFile {
            contents: text.to_string(),
            origin: SourceFileOrigin::Memory,
        };
        let mut lexer = Lexer::new(&source);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token().expect("lexer error");
            let end = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if end {
                break;
            }
        }

        tokens
    }

    #[test]
    fn keywords_types_and_symbols() {
        let tokens = lex("fn main() i32 { let x = 1; }");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword(Keyword::Fn),
                TokenKind::Symbol,
                TokenKind::OpenParen,
                TokenKind::CloseParen,
                TokenKind::Type(TypeName::I32),
                TokenKind::OpenBrace,
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Symbol,
                TokenKind::Equals,
                TokenKind::ConstantInteger,
                TokenKind::Semicolon,
                TokenKind::CloseBrace,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn comments_are_transparent() {
        let tokens = lex("1 // line\n/* block\nstill */ 2");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::ConstantInteger,
                TokenKind::ConstantInteger,
                TokenKind::EndOfFile
            ]
        );
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn underscore_separators_are_dropped() {
        let tokens = lex("1_000_000 3.14_15");
        assert_eq!(tokens[0].lexeme, "1000000");
        assert_eq!(tokens[1].kind, TokenKind::ConstantFloat);
        assert_eq!(tokens[1].lexeme, "3.1415");
    }

    #[test]
    fn string_escapes() {
        let tokens = lex(r#""a\tb\n\"c\"""#);
        assert_eq!(tokens[0].kind, TokenKind::ConstantString);
        assert_eq!(tokens[0].lexeme, "a\tb\n\"c\"");
    }

    #[test]
    fn bare_bang_is_an_error() {
        let source = SourceFile {
            contents: "!".to_string(),
            origin: SourceFileOrigin::Memory,
        };
        let mut lexer = Lexer::new(&source);
        let error = lexer.next_token().unwrap_err();
        assert!(matches!(error.kind, ErrorKind::UnexpectedCharactor('!')));
    }

    #[test]
    fn bom_is_skipped() {
        let tokens = lex("\u{feff}fn");
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Fn));
        assert_eq!(tokens[0].column, 1);
    }

    #[test]
    fn line_and_column_positions() {
        let tokens = lex("fn\n  let");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }
}
