//! Token definitions

use serde::Serialize;

use crate::parser::ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    // ---- Structure ----
    /// `---` line opening node content
    NodeStart,
    /// `===` line closing node content
    NodeEnd,
    Newline,
    Indent,
    Dedent,
    Eof,
    /// Unrecognised input; a diagnostic has been recorded
    Error,

    // ---- Text ----
    Text,
    /// `#tag`, lexeme without the hash
    Tag,
    Colon,
    /// `->` opening a choice
    Arrow,

    // ---- Regions ----
    /// `<<`
    CommandStart,
    /// `>>`
    CommandEnd,
    LeftBrace,
    RightBrace,
    StringStart,
    StringEnd,

    // ---- Atoms ----
    Identifier,
    Number,
    /// `$name`, lexeme without the dollar
    Variable,

    // ---- Punctuation ----
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,

    // ---- Operators ----
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqualEqual,
    NotEqual,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
    AndAnd,
    OrOr,
    Caret,
    Bang,

    // ---- Keywords ----
    If,
    Elif,
    Else,
    Endif,
    True,
    False,
    Null,
    Var,
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Call,
    Wait,
    Jump,
    Eq,
    Is,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
    And,
    Or,
    Not,
    Xor,
}

impl TokenKind {
    /// Keyword lookup, case-insensitive
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word.to_ascii_lowercase().as_str() {
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "endif" => TokenKind::Endif,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            "var" => TokenKind::Var,
            "set" => TokenKind::Set,
            "add" => TokenKind::Add,
            "sub" => TokenKind::Sub,
            "mul" => TokenKind::Mul,
            "div" => TokenKind::Div,
            "mod" => TokenKind::Mod,
            "call" => TokenKind::Call,
            "wait" => TokenKind::Wait,
            "jump" => TokenKind::Jump,
            "eq" => TokenKind::Eq,
            "is" => TokenKind::Is,
            "neq" => TokenKind::Neq,
            "gt" => TokenKind::Gt,
            "lt" => TokenKind::Lt,
            "gte" => TokenKind::Gte,
            "lte" => TokenKind::Lte,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "xor" => TokenKind::Xor,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::If
                | TokenKind::Elif
                | TokenKind::Else
                | TokenKind::Endif
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::Var
                | TokenKind::Set
                | TokenKind::Add
                | TokenKind::Sub
                | TokenKind::Mul
                | TokenKind::Div
                | TokenKind::Mod
                | TokenKind::Call
                | TokenKind::Wait
                | TokenKind::Jump
                | TokenKind::Eq
                | TokenKind::Is
                | TokenKind::Neq
                | TokenKind::Gt
                | TokenKind::Lt
                | TokenKind::Gte
                | TokenKind::Lte
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Xor
        )
    }
}

/// A scanned token. Lexemes hold decoded text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
            column,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lexeme.is_empty() {
            write!(f, "{:?}", self.kind)
        } else {
            write!(f, "{:?}({:?})", self.kind, self.lexeme)
        }
    }
}
