//! Recursive-descent parser for dialogue scripts
//!
//! Consumes the lexer's token stream with one token of lookahead and builds
//! the [`ast`] tree. Expressions are handled by a precedence-climbing
//! sub-parser (see `expr.rs`). Syntax errors are collected as diagnostics;
//! a bad line is skipped and parsing resumes on the next one, and a broken
//! node never takes its neighbours down with it.

pub mod ast;
mod expr;
pub mod render;

#[cfg(test)]
mod tests;

use thiserror::Error;
use tracing::{debug, warn};

use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::lexer::{self, Token, TokenKind};
use ast::{Command, Content, NodeDefinition, Script, Span, TextSegment, VarOp};

pub use render::render_script;

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{} syntax error(s), first: {}", error_count(.diagnostics), first_error(.diagnostics))]
    Invalid { diagnostics: Vec<Diagnostic> },
}

impl ParseError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ParseError::Invalid { diagnostics } => diagnostics,
        }
    }
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

fn first_error(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .find(|d| d.is_error())
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Result of a single production; the error is the diagnostic to record
/// before resynchronising.
type PResult<T> = Result<T, Diagnostic>;

/// Deepest expression nesting (parentheses, unary chains, arguments) the
/// parser accepts before reporting an error instead of recursing further
pub const MAX_EXPRESSION_DEPTH: usize = 64;

/* ===================== Entry Points ===================== */

/// A parsed script together with every lexical and syntactic diagnostic
#[derive(Debug, Clone)]
pub struct Parsed {
    pub script: Script,
    pub diagnostics: Vec<Diagnostic>,
}

impl Parsed {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

/// Parse a token stream
pub fn parse(tokens: Vec<Token>) -> (Script, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let script = parser.parse_script();
    (script, parser.diagnostics)
}

/// Lex and parse source text, keeping all diagnostics
pub fn parse_source(source: &str) -> Parsed {
    let (tokens, mut diagnostics) = lexer::tokenize_with_diagnostics(source);
    let (script, parse_diagnostics) = parse(tokens);
    diagnostics.extend(parse_diagnostics);

    debug!(
        nodes = script.nodes.len(),
        diagnostics = diagnostics.len(),
        "parsed script"
    );
    Parsed {
        script,
        diagnostics,
    }
}

/// Lex and parse source text, failing on any error diagnostic
pub fn parse_script(source: &str) -> Result<Script, ParseError> {
    let parsed = parse_source(source);
    if parsed.has_errors() {
        return Err(ParseError::Invalid {
            diagnostics: parsed.diagnostics,
        });
    }
    Ok(parsed.script)
}

/* ===================== Parser ===================== */

/// What ends the block currently being parsed, besides a dedent or the
/// end of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockEnd {
    Node,
    /// Also stop at `<<elif>>`, `<<else>>` and `<<endif>>`
    Branch,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, "", line, column));
        }
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /* ---------- token helpers ---------- */

    fn peek(&self) -> &Token {
        let index = self.pos.min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        Err(self.unexpected(what))
    }

    fn unexpected(&self, expected: &str) -> Diagnostic {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::Eof => "end of input".to_string(),
            _ if token.lexeme.is_empty() => format!("{:?}", token.kind),
            _ => format!("'{}'", token.lexeme),
        };
        Diagnostic::error(
            DiagnosticCode::UnexpectedToken,
            token.span(),
            format!("Expected {}, found {}", expected, found),
        )
    }

    fn record(&mut self, diagnostic: Diagnostic) {
        warn!(
            code = %diagnostic.code,
            line = diagnostic.span.line,
            column = diagnostic.span.column,
            "parser: {}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }

    fn at_line_end(&self) -> bool {
        matches!(
            self.peek_kind(),
            TokenKind::Newline | TokenKind::Eof | TokenKind::NodeEnd | TokenKind::Dedent
        )
    }

    fn expect_line_end(&mut self) -> PResult<()> {
        if !self.at_line_end() {
            return Err(self.unexpected("end of line"));
        }
        if self.check(TokenKind::Newline) {
            self.advance();
        }
        Ok(())
    }

    /// Skip the rest of a damaged line
    fn synchronize(&mut self) {
        while !self.at_line_end() {
            self.advance();
        }
        if self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// `<<` followed by the given keyword
    fn at_command(&self, keyword: TokenKind) -> bool {
        self.check(TokenKind::CommandStart) && self.peek_kind_at(1) == keyword
    }

    fn at_branch_marker(&self) -> bool {
        self.at_command(TokenKind::Elif)
            || self.at_command(TokenKind::Else)
            || self.at_command(TokenKind::Endif)
    }

    /* ---------- script & nodes ---------- */

    pub fn parse_script(&mut self) -> Script {
        let mut nodes = Vec::new();
        let mut metadata: Vec<(String, String)> = Vec::new();
        let mut header_span: Option<Span> = None;

        loop {
            match self.peek_kind() {
                TokenKind::Eof => break,
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Identifier => match self.parse_metadata_line() {
                    Ok((span, key, value)) => {
                        header_span.get_or_insert(span);
                        metadata.push((key, value));
                    }
                    Err(diagnostic) => {
                        self.record(diagnostic);
                        self.synchronize();
                    }
                },
                TokenKind::NodeStart => {
                    let span = header_span.take();
                    if let Some(node) = self.parse_node(std::mem::take(&mut metadata), span) {
                        nodes.push(node);
                    }
                }
                _ => {
                    let diagnostic = self.unexpected("a node header or '---'");
                    self.record(diagnostic);
                    self.advance();
                }
            }
        }

        if !metadata.is_empty() {
            let span = header_span.unwrap_or_default();
            self.record(Diagnostic::error(
                DiagnosticCode::UnterminatedBlock,
                span,
                "Node header is not followed by '---'",
            ));
        }

        Script { nodes }
    }

    fn parse_metadata_line(&mut self) -> PResult<(Span, String, String)> {
        let key = self.advance();
        self.expect(TokenKind::Colon, "':' after metadata key")?;
        let value = if self.check(TokenKind::Text) {
            self.advance().lexeme
        } else {
            String::new()
        };
        self.expect_line_end()?;
        Ok((key.span(), key.lexeme, value))
    }

    fn parse_node(
        &mut self,
        metadata: Vec<(String, String)>,
        header_span: Option<Span>,
    ) -> Option<NodeDefinition> {
        let start = self.advance();
        let span = header_span.unwrap_or_else(|| start.span());

        let mut content = Vec::new();
        loop {
            content.extend(self.parse_block(BlockEnd::Node));
            match self.peek_kind() {
                // Unbalanced dedent left over from an indentation error
                TokenKind::Dedent => {
                    self.advance();
                }
                _ => break,
            }
        }

        if self.check(TokenKind::NodeEnd) {
            self.advance();
        } else {
            self.record(Diagnostic::error(
                DiagnosticCode::UnterminatedBlock,
                span,
                "Node is missing its '===' end marker",
            ));
        }

        let title = metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("title"))
            .map(|(_, value)| value.trim().to_string())
            .filter(|title| !title.is_empty());

        let Some(name) = title else {
            self.record(Diagnostic::error(
                DiagnosticCode::MissingNodeTitle,
                span,
                "Node has no 'title' and was skipped",
            ));
            return None;
        };

        debug!(node = %name, items = content.len(), "parsed node");
        Some(NodeDefinition {
            name,
            metadata,
            content,
            span,
        })
    }

    /* ---------- content ---------- */

    /// Parse content lines until a dedent, the end of the node, or (for
    /// branches) the next branch marker.
    fn parse_block(&mut self, end: BlockEnd) -> Vec<Content> {
        let mut items = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Eof | TokenKind::NodeEnd | TokenKind::Dedent => break,
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Indent => {
                    // Indentation without an owning line: keep the content at
                    // this level
                    self.advance();
                    items.extend(self.parse_block(end));
                    if self.check(TokenKind::Dedent) {
                        self.advance();
                    }
                }
                _ if end == BlockEnd::Branch && self.at_branch_marker() => break,
                _ => match self.parse_content() {
                    Ok(item) => items.push(item),
                    Err(diagnostic) => {
                        self.record(diagnostic);
                        self.synchronize();
                    }
                },
            }
        }

        items
    }

    fn parse_content(&mut self) -> PResult<Content> {
        match self.peek_kind() {
            TokenKind::Arrow => self.parse_choice(),
            TokenKind::CommandStart => match self.peek_kind_at(1) {
                TokenKind::If => self.parse_condition(),
                TokenKind::Elif | TokenKind::Else | TokenKind::Endif => {
                    let token = self.tokens[self.pos + 1].clone();
                    Err(Diagnostic::error(
                        DiagnosticCode::UnexpectedToken,
                        token.span(),
                        format!("'{}' without a matching 'if'", token.lexeme),
                    ))
                }
                _ => {
                    let command = self.parse_command()?;
                    self.expect_line_end()?;
                    Ok(Content::Command { command })
                }
            },
            _ => self.parse_dialogue(),
        }
    }

    fn parse_dialogue(&mut self) -> PResult<Content> {
        let span = self.peek().span();

        let speaker = if self.check(TokenKind::Text) && self.peek_kind_at(1) == TokenKind::Colon {
            let name = self.advance().lexeme.trim().to_string();
            self.advance();
            Some(name)
        } else {
            None
        };

        let (text, tags) = self.parse_line_text()?;
        if text.is_empty() && tags.is_empty() && speaker.is_none() {
            return Err(self.unexpected("dialogue text"));
        }
        self.expect_line_end()?;
        let children = self.parse_children();

        Ok(Content::Dialogue {
            speaker,
            text,
            tags,
            children,
            span,
        })
    }

    fn parse_choice(&mut self) -> PResult<Content> {
        let span = self.advance().span();
        let (text, mut tags) = self.parse_line_text()?;

        let condition = if self.check(TokenKind::CommandStart) {
            self.advance();
            self.expect(TokenKind::If, "'if' in choice condition")?;
            let cond = self.parse_expression()?;
            self.expect(TokenKind::CommandEnd, "'>>'")?;
            Some(cond)
        } else {
            None
        };

        while self.check(TokenKind::Tag) {
            tags.push(self.advance().lexeme);
        }
        self.expect_line_end()?;
        let children = self.parse_children();

        Ok(Content::Choice {
            text,
            condition,
            tags,
            children,
            span,
        })
    }

    /// Indented content under a dialogue or choice line
    fn parse_children(&mut self) -> Vec<Content> {
        if !self.check(TokenKind::Indent) {
            return Vec::new();
        }
        self.advance();
        let children = self.parse_block(BlockEnd::Node);
        if self.check(TokenKind::Dedent) {
            self.advance();
        }
        children
    }

    /// Text, interpolations and tags up to the end of the line or a command
    fn parse_line_text(&mut self) -> PResult<(Vec<TextSegment>, Vec<String>)> {
        let mut segments = Vec::new();
        let mut tags = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Text | TokenKind::Colon => {
                    let token = self.advance();
                    push_literal(&mut segments, &token.lexeme);
                }
                TokenKind::Tag => tags.push(self.advance().lexeme),
                TokenKind::LeftBrace => segments.push(self.parse_interpolation()?),
                // Already reported by the lexer
                TokenKind::Error => {
                    self.advance();
                }
                _ => break,
            }
        }

        Ok((segments, tags))
    }

    pub(crate) fn parse_interpolation(&mut self) -> PResult<TextSegment> {
        let open = self.expect(TokenKind::LeftBrace, "'{'")?;
        if self.check(TokenKind::RightBrace) {
            return Err(Diagnostic::error(
                DiagnosticCode::UnexpectedToken,
                open.span(),
                "Empty interpolation '{}'",
            ));
        }
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RightBrace, "'}'")?;
        Ok(TextSegment::Interpolation {
            expr,
            span: open.span(),
        })
    }

    fn parse_condition(&mut self) -> PResult<Content> {
        let span = self.advance().span();
        self.advance();
        let cond = self.parse_expression()?;
        self.expect(TokenKind::CommandEnd, "'>>'")?;
        self.expect_line_end()?;

        let then = self.parse_block(BlockEnd::Branch);
        let mut elifs = Vec::new();
        let mut else_branch: Option<Vec<Content>> = None;

        loop {
            if self.at_command(TokenKind::Elif) {
                let marker = self.advance();
                self.advance();
                if else_branch.is_some() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::UnexpectedToken,
                        marker.span(),
                        "'elif' after 'else'",
                    ));
                }
                let elif_cond = self.parse_expression()?;
                self.expect(TokenKind::CommandEnd, "'>>'")?;
                self.expect_line_end()?;
                elifs.push((elif_cond, self.parse_block(BlockEnd::Branch)));
            } else if self.at_command(TokenKind::Else) {
                let marker = self.advance();
                self.advance();
                if else_branch.is_some() {
                    return Err(Diagnostic::error(
                        DiagnosticCode::UnexpectedToken,
                        marker.span(),
                        "Duplicate 'else'",
                    ));
                }
                self.expect(TokenKind::CommandEnd, "'>>'")?;
                self.expect_line_end()?;
                else_branch = Some(self.parse_block(BlockEnd::Branch));
            } else if self.at_command(TokenKind::Endif) {
                self.advance();
                self.advance();
                self.expect(TokenKind::CommandEnd, "'>>'")?;
                self.expect_line_end()?;
                break;
            } else {
                // Keep what was parsed; the block simply ends here
                self.record(Diagnostic::error(
                    DiagnosticCode::UnterminatedBlock,
                    span,
                    "'if' block is missing '<<endif>>'",
                ));
                break;
            }
        }

        Ok(Content::Condition {
            cond,
            then,
            elifs,
            else_branch,
            span,
        })
    }

    fn parse_command(&mut self) -> PResult<Command> {
        let span = self.advance().span();
        let keyword = self.advance();

        let op = match keyword.kind {
            TokenKind::Var => Some(VarOp::Declare),
            TokenKind::Set => Some(VarOp::Set),
            TokenKind::Add => Some(VarOp::Add),
            TokenKind::Sub => Some(VarOp::Sub),
            TokenKind::Mul => Some(VarOp::Mul),
            TokenKind::Div => Some(VarOp::Div),
            TokenKind::Mod => Some(VarOp::Mod),
            _ => None,
        };

        let command = if let Some(op) = op {
            let name = match self.peek_kind() {
                TokenKind::Variable | TokenKind::Identifier => self.advance().lexeme,
                _ => return Err(self.unexpected("a variable name")),
            };
            if self.check(TokenKind::Assign) {
                self.advance();
            }
            let value = self.parse_expression()?;
            Command::Var {
                op,
                name,
                value,
                span,
            }
        } else {
            match keyword.kind {
                TokenKind::Call => {
                    let name = self.expect(TokenKind::Identifier, "a function name")?.lexeme;
                    self.expect(TokenKind::LeftParen, "'('")?;
                    let args = self.parse_arguments()?;
                    Command::Call { name, args, span }
                }
                TokenKind::Wait => {
                    let duration = self.parse_expression()?;
                    Command::Wait { duration, span }
                }
                TokenKind::Jump => {
                    let token = self.peek().clone();
                    if token.kind != TokenKind::Identifier && !token.kind.is_keyword() {
                        return Err(self.unexpected("a node name"));
                    }
                    self.advance();
                    Command::Jump {
                        target: token.lexeme,
                        span,
                    }
                }
                _ => {
                    let name = if keyword.lexeme.is_empty() {
                        format!("{:?}", keyword.kind)
                    } else {
                        keyword.lexeme.clone()
                    };
                    return Err(Diagnostic::error(
                        DiagnosticCode::UnknownCommand,
                        keyword.span(),
                        format!("Unknown command '{}'", name),
                    ));
                }
            }
        };

        self.expect(TokenKind::CommandEnd, "'>>'")?;
        Ok(command)
    }
}

/// Append literal text, merging with a preceding literal
pub(crate) fn push_literal(segments: &mut Vec<TextSegment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(TextSegment::Literal { text: last }) = segments.last_mut() {
        last.push_str(text);
        return;
    }
    segments.push(TextSegment::Literal {
        text: text.to_string(),
    });
}
