//! Abstract Syntax Tree node types
//!
//! The tree is immutable once built: every parent owns its children and
//! nothing points back up. Re-parsing always yields a fresh tree.

use serde::{Deserialize, Serialize};

/// Source position for error reporting (both 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/* ===================== Script ===================== */

/// Root of a parsed script
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub nodes: Vec<NodeDefinition>,
}

impl Script {
    /// Look up a node by exact name
    pub fn node(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Structural equality ignoring source positions
    pub fn same_structure(&self, other: &Script) -> bool {
        self.without_spans() == other.without_spans()
    }

    /// Copy of the tree with every span reset to the default
    pub fn without_spans(&self) -> Script {
        let mut copy = self.clone();
        for node in &mut copy.nodes {
            node.span = Span::default();
            strip_content(&mut node.content);
        }
        copy
    }
}

/// A named block of content between `---` and `===`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    /// Header lines in source order
    pub metadata: Vec<(String, String)>,
    pub content: Vec<Content>,
    pub span: Span,
}

impl NodeDefinition {
    /// Metadata value for a key (keys compare case-insensitively)
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/* ===================== Content ===================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    Dialogue {
        speaker: Option<String>,
        text: Vec<TextSegment>,
        tags: Vec<String>,
        children: Vec<Content>,
        span: Span,
    },
    Choice {
        text: Vec<TextSegment>,
        condition: Option<Expr>,
        tags: Vec<String>,
        children: Vec<Content>,
        span: Span,
    },
    Condition {
        cond: Expr,
        then: Vec<Content>,
        elifs: Vec<(Expr, Vec<Content>)>,
        else_branch: Option<Vec<Content>>,
        span: Span,
    },
    Command {
        command: Command,
    },
}

impl Content {
    pub fn span(&self) -> Span {
        match self {
            Content::Dialogue { span, .. }
            | Content::Choice { span, .. }
            | Content::Condition { span, .. } => *span,
            Content::Command { command } => command.span(),
        }
    }
}

/// Operation performed by a variable command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarOp {
    Declare,
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl VarOp {
    pub fn keyword(&self) -> &'static str {
        match self {
            VarOp::Declare => "var",
            VarOp::Set => "set",
            VarOp::Add => "add",
            VarOp::Sub => "sub",
            VarOp::Mul => "mul",
            VarOp::Div => "div",
            VarOp::Mod => "mod",
        }
    }

    /// Arithmetic ops read the current value before writing
    pub fn is_arithmetic(&self) -> bool {
        !matches!(self, VarOp::Declare | VarOp::Set)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    Var {
        op: VarOp,
        name: String,
        value: Expr,
        span: Span,
    },
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Wait {
        duration: Expr,
        span: Span,
    },
    Jump {
        target: String,
        span: Span,
    },
}

impl Command {
    pub fn span(&self) -> Span {
        match self {
            Command::Var { span, .. }
            | Command::Call { span, .. }
            | Command::Wait { span, .. }
            | Command::Jump { span, .. } => *span,
        }
    }
}

/// Piece of displayable text: literal or `{expr}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TextSegment {
    Literal { text: String },
    Interpolation { expr: Expr, span: Span },
}

/* ===================== Expressions ===================== */

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators, already resolved from their word aliases
/// (`eq`, `is`, `neq`, `gt`, `lt`, `gte`, `lte`, `and`, `or`, `xor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Xor,
}

/// Operator classes used for type checking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    Arithmetic,
    Relational,
    Equality,
    Logical,
}

impl BinaryOp {
    /// Resolve a word-form alias (case-insensitive)
    pub fn from_word(word: &str) -> Option<BinaryOp> {
        match word.to_ascii_lowercase().as_str() {
            "eq" | "is" => Some(BinaryOp::Eq),
            "neq" => Some(BinaryOp::Ne),
            "gt" => Some(BinaryOp::Gt),
            "lt" => Some(BinaryOp::Lt),
            "gte" => Some(BinaryOp::Gte),
            "lte" => Some(BinaryOp::Lte),
            "and" => Some(BinaryOp::And),
            "or" => Some(BinaryOp::Or),
            "xor" => Some(BinaryOp::Xor),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Xor => "^",
        }
    }

    pub fn class(&self) -> OpClass {
        match self {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                OpClass::Arithmetic
            }
            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => OpClass::Relational,
            BinaryOp::Eq | BinaryOp::Ne => OpClass::Equality,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => OpClass::Logical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expr {
    Number {
        value: f64,
        span: Span,
    },
    Boolean {
        value: bool,
        span: Span,
    },
    Null {
        span: Span,
    },
    StringInterp {
        segments: Vec<TextSegment>,
        span: Span,
    },
    /// `$name`
    Variable {
        name: String,
        span: Span,
    },
    /// Bare name: host binding or function
    Identifier {
        name: String,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Member {
        target: Box<Expr>,
        member: String,
        span: Span,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::Boolean { span, .. }
            | Expr::Null { span }
            | Expr::StringInterp { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::Member { span, .. }
            | Expr::Index { span, .. } => *span,
        }
    }

    /// Literal zero (`0`, `0.0`, `-0`)
    pub fn is_literal_zero(&self) -> bool {
        match self {
            Expr::Number { value, .. } => *value == 0.0,
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
                ..
            } => operand.is_literal_zero(),
            _ => false,
        }
    }

    /// True when the subtree contains no variable, identifier or call
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Number { .. } | Expr::Boolean { .. } | Expr::Null { .. } => true,
            Expr::StringInterp { segments, .. } => segments.iter().all(|s| match s {
                TextSegment::Literal { .. } => true,
                TextSegment::Interpolation { expr, .. } => expr.is_constant(),
            }),
            Expr::Unary { operand, .. } => operand.is_constant(),
            Expr::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
            Expr::Variable { .. }
            | Expr::Identifier { .. }
            | Expr::Call { .. }
            | Expr::Member { .. }
            | Expr::Index { .. } => false,
        }
    }
}

/* ===================== Span stripping ===================== */

fn strip_content(items: &mut [Content]) {
    for item in items {
        match item {
            Content::Dialogue {
                text, children, span, ..
            } => {
                *span = Span::default();
                strip_segments(text);
                strip_content(children);
            }
            Content::Choice {
                text,
                condition,
                children,
                span,
                ..
            } => {
                *span = Span::default();
                strip_segments(text);
                if let Some(cond) = condition {
                    strip_expr(cond);
                }
                strip_content(children);
            }
            Content::Condition {
                cond,
                then,
                elifs,
                else_branch,
                span,
            } => {
                *span = Span::default();
                strip_expr(cond);
                strip_content(then);
                for (c, branch) in elifs {
                    strip_expr(c);
                    strip_content(branch);
                }
                if let Some(branch) = else_branch {
                    strip_content(branch);
                }
            }
            Content::Command { command } => match command {
                Command::Var { value, span, .. } => {
                    *span = Span::default();
                    strip_expr(value);
                }
                Command::Call { args, span, .. } => {
                    *span = Span::default();
                    for arg in args {
                        strip_expr(arg);
                    }
                }
                Command::Wait { duration, span } => {
                    *span = Span::default();
                    strip_expr(duration);
                }
                Command::Jump { span, .. } => *span = Span::default(),
            },
        }
    }
}

fn strip_segments(segments: &mut [TextSegment]) {
    for segment in segments {
        if let TextSegment::Interpolation { expr, span } = segment {
            *span = Span::default();
            strip_expr(expr);
        }
    }
}

fn strip_expr(expr: &mut Expr) {
    match expr {
        Expr::Number { span, .. }
        | Expr::Boolean { span, .. }
        | Expr::Null { span }
        | Expr::Variable { span, .. }
        | Expr::Identifier { span, .. } => *span = Span::default(),
        Expr::StringInterp { segments, span } => {
            *span = Span::default();
            strip_segments(segments);
        }
        Expr::Unary { operand, span, .. } => {
            *span = Span::default();
            strip_expr(operand);
        }
        Expr::Binary {
            left, right, span, ..
        } => {
            *span = Span::default();
            strip_expr(left);
            strip_expr(right);
        }
        Expr::Call { callee, args, span } => {
            *span = Span::default();
            strip_expr(callee);
            for arg in args {
                strip_expr(arg);
            }
        }
        Expr::Member { target, span, .. } => {
            *span = Span::default();
            strip_expr(target);
        }
        Expr::Index {
            target,
            index,
            span,
        } => {
            *span = Span::default();
            strip_expr(target);
            strip_expr(index);
        }
    }
}
