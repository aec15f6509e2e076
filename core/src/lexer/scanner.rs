//! Stateful scanner
//!
//! The scanner is driven one token at a time by [`Lexer::next_token`]. Its
//! behaviour depends on a small amount of state:
//!
//! - whether we are inside node content (between `---` and `===`)
//! - a stack of open regions: command (`<<...>>`), interpolation (`{...}`)
//!   and string (`"..."`); the innermost region decides the scanning rules
//! - the indentation stack (with a `0` sentinel) and queued dedents
//!
//! Malformed input never aborts the scan. A diagnostic is recorded and the
//! scanner recovers locally, usually by synthesising the missing closer.

use tracing::warn;

use super::token::{Token, TokenKind};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::parser::ast::Span;

const TAB_WIDTH: usize = 4;

/// Lines scanned ahead when checking for a header that lacks a preceding `===`
const HEADER_LOOKAHEAD: usize = 16;

/// Open region on the mode stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Command,
    Interpolation,
    Str(char),
}

/// Progress through a `key: value` header line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    LineStart,
    AfterKey,
    AfterColon,
    AfterValue,
}

pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    /// Index of the first char of the current line
    line_start: usize,

    indent_stack: Vec<usize>,
    pending_dedents: usize,
    in_node: bool,
    modes: Vec<Mode>,
    header: HeaderState,

    at_line_start: bool,
    /// The upcoming line starts the next node's header
    implicit_end: bool,
    /// Tokens emitted on the current content line, not counting layout
    line_tokens: usize,
    last_kind: Option<TokenKind>,
    finished: bool,

    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.replace("\r\n", "\n").chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            line_start: 0,
            indent_stack: vec![0],
            pending_dedents: 0,
            in_node: false,
            modes: Vec::new(),
            header: HeaderState::LineStart,
            at_line_start: true,
            implicit_end: false,
            line_tokens: 0,
            last_kind: None,
            finished: false,
            diagnostics: Vec::new(),
        }
    }

    /// Scan the whole input. The stream always ends with exactly one `Eof`.
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn in_node_content(&self) -> bool {
        self.in_node
    }

    pub fn in_command(&self) -> bool {
        self.modes.contains(&Mode::Command)
    }

    pub fn in_string(&self) -> bool {
        self.modes.iter().any(|m| matches!(m, Mode::Str(_)))
    }

    pub fn in_interpolation(&self) -> bool {
        self.modes.contains(&Mode::Interpolation)
    }

    /// Produce the next token. After `Eof` every call returns `Eof` again.
    pub fn next_token(&mut self) -> Token {
        if self.finished {
            return self.token_here(TokenKind::Eof, "");
        }

        let token = self.scan();
        match token.kind {
            TokenKind::Newline
            | TokenKind::Indent
            | TokenKind::Dedent
            | TokenKind::NodeStart
            | TokenKind::NodeEnd => {}
            TokenKind::Eof => self.finished = true,
            _ => self.line_tokens += 1,
        }
        self.last_kind = Some(token.kind);
        token
    }

    fn scan(&mut self) -> Token {
        if self.pending_dedents > 0 {
            self.pending_dedents -= 1;
            return self.token_here(TokenKind::Dedent, "");
        }

        match self.modes.last().copied() {
            Some(Mode::Str(quote)) => self.scan_string(quote),
            Some(Mode::Command) | Some(Mode::Interpolation) => self.scan_expression(),
            None if self.in_node => self.scan_content(),
            None => self.scan_header(),
        }
    }

    /* ===================== End of input ===================== */

    fn scan_end(&mut self) -> Token {
        if !self.modes.is_empty() {
            return self.close_region();
        }
        if self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            return self.token_here(TokenKind::Dedent, "");
        }
        self.in_node = false;
        self.token_here(TokenKind::Eof, "")
    }

    /// Close the innermost region at a line end or end of input.
    ///
    /// All regions are single-line; the closer is synthesised with an empty
    /// lexeme and the newline is left for the content scanner.
    fn close_region(&mut self) -> Token {
        let Some(mode) = self.modes.pop() else {
            return self.token_here(TokenKind::Error, "");
        };
        let (code, message, kind) = match mode {
            Mode::Command => (
                DiagnosticCode::UnterminatedCommand,
                "Unterminated command, expected '>>'",
                TokenKind::CommandEnd,
            ),
            Mode::Interpolation => (
                DiagnosticCode::UnterminatedInterpolation,
                "Unterminated interpolation, expected '}'",
                TokenKind::RightBrace,
            ),
            Mode::Str(_) => (
                DiagnosticCode::UnterminatedString,
                "Unterminated string literal",
                TokenKind::StringEnd,
            ),
        };
        self.report(code, Span::new(self.line, self.column), message);
        self.token_here(kind, "")
    }

    /* ===================== Header region ===================== */

    fn scan_header(&mut self) -> Token {
        loop {
            match self.header {
                HeaderState::LineStart => {
                    self.skip_inline_whitespace();
                    let Some(c) = self.peek() else {
                        return self.scan_end();
                    };

                    if c == '\n' {
                        self.advance();
                        continue;
                    }
                    if self.starts_with("//") {
                        self.skip_line();
                        continue;
                    }
                    if self.marker_here("---") {
                        let token = self.token_here(TokenKind::NodeStart, "---");
                        self.skip_line();
                        self.in_node = true;
                        self.at_line_start = true;
                        self.indent_stack = vec![0];
                        self.line_tokens = 0;
                        return token;
                    }
                    if self.marker_here("===") {
                        self.report(
                            DiagnosticCode::UnexpectedCharacter,
                            Span::new(self.line, self.column),
                            "Node end marker '===' outside of a node",
                        );
                        self.skip_line();
                        continue;
                    }

                    if is_identifier_start(c) {
                        let (line, column) = (self.line, self.column);
                        let key = self.read_while(|ch| {
                            is_identifier_char(ch) || ch == '-' || ch == '.'
                        });
                        self.skip_inline_whitespace();
                        if self.peek() == Some(':') {
                            self.header = HeaderState::AfterKey;
                            return Token::new(TokenKind::Identifier, key, line, column);
                        }
                    }

                    self.report(
                        DiagnosticCode::InvalidMetadata,
                        Span::new(self.line, self.column),
                        "Invalid metadata line, expected 'key: value'",
                    );
                    self.skip_line();
                }
                HeaderState::AfterKey => {
                    let token = self.token_here(TokenKind::Colon, ":");
                    self.advance();
                    self.header = HeaderState::AfterColon;
                    return token;
                }
                HeaderState::AfterColon => {
                    self.skip_inline_whitespace();
                    self.header = HeaderState::AfterValue;
                    let (line, column) = (self.line, self.column);
                    let value = self.read_while(|ch| ch != '\n');
                    let value = value.trim_end();
                    if !value.is_empty() {
                        return Token::new(TokenKind::Text, value, line, column);
                    }
                }
                HeaderState::AfterValue => {
                    self.header = HeaderState::LineStart;
                    let token = self.token_here(TokenKind::Newline, "");
                    if self.peek() == Some('\n') {
                        self.advance();
                    }
                    return token;
                }
            }
        }
    }

    /* ===================== Node content ===================== */

    fn scan_content(&mut self) -> Token {
        if self.at_line_start {
            if let Some(token) = self.scan_line_start() {
                return token;
            }
        }

        if self.implicit_end {
            self.implicit_end = false;
            self.report(
                DiagnosticCode::UnterminatedNode,
                Span::new(self.line, self.column),
                "Node is missing its '===' end marker",
            );
            self.in_node = false;
            self.header = HeaderState::LineStart;
            return self.token_here(TokenKind::NodeEnd, "");
        }

        // Whitespace after an interpolation belongs to the surrounding text
        if self.last_kind != Some(TokenKind::RightBrace) {
            self.skip_inline_whitespace();
        }

        loop {
            let Some(c) = self.peek() else {
                return self.scan_end();
            };

            if c == '/' && self.peek_at(1) == Some('/') && self.preceded_by_space() {
                self.skip_to_line_end();
                continue;
            }

            return match c {
                '\n' => {
                    let token = self.token_here(TokenKind::Newline, "");
                    self.advance();
                    self.at_line_start = true;
                    token
                }
                '<' if self.peek_at(1) == Some('<') => {
                    let token = self.token_here(TokenKind::CommandStart, "<<");
                    self.advance_by(2);
                    self.modes.push(Mode::Command);
                    token
                }
                '-' if self.peek_at(1) == Some('>') && self.line_tokens == 0 => {
                    let token = self.token_here(TokenKind::Arrow, "->");
                    self.advance_by(2);
                    token
                }
                '=' if self.line_tokens == 0 && self.marker_here("===") => {
                    let token = self.token_here(TokenKind::NodeEnd, "===");
                    self.skip_line();
                    self.in_node = false;
                    self.header = HeaderState::LineStart;
                    token
                }
                '#' => self.scan_tag(),
                '{' => {
                    let token = self.token_here(TokenKind::LeftBrace, "{");
                    self.advance();
                    self.modes.push(Mode::Interpolation);
                    token
                }
                ':' if self.line_tokens == 1 && self.last_kind == Some(TokenKind::Text) => {
                    let token = self.token_here(TokenKind::Colon, ":");
                    self.advance();
                    token
                }
                '}' => {
                    let token = self.token_here(TokenKind::Error, "}");
                    self.report(
                        DiagnosticCode::UnexpectedCharacter,
                        token.span(),
                        "Unmatched '}' in text; escape it as '\\}'",
                    );
                    self.advance();
                    token
                }
                _ => self.scan_text(),
            };
        }
    }

    /// Fold blank/comment lines, then compare indentation with the stack.
    ///
    /// Returns `None` when the indentation level is unchanged.
    fn scan_line_start(&mut self) -> Option<Token> {
        loop {
            let ws = self.leading_whitespace_len();
            match self.peek_at(ws) {
                None => {
                    self.advance_by(ws);
                    self.at_line_start = false;
                    return None;
                }
                Some('\n') => {
                    self.advance_by(ws + 1);
                }
                Some('/') if self.peek_at(ws + 1) == Some('/') => {
                    self.skip_line();
                }
                Some(_) => break,
            }
        }

        let (width, mixed) = self.measure_indent();
        self.skip_inline_whitespace();
        self.at_line_start = false;
        self.line_tokens = 0;

        if mixed {
            self.report(
                DiagnosticCode::MixedIndentation,
                Span::new(self.line, 1),
                "Indentation mixes tabs and spaces",
            );
        }

        self.implicit_end = width == 0 && self.header_follows();

        // The node end marker closes every open level
        let target = if self.implicit_end || self.marker_here("===") {
            0
        } else {
            width
        };
        let top = self.current_indent();

        if target > top {
            self.indent_stack.push(target);
            return Some(self.token_here(TokenKind::Indent, ""));
        }

        if target < top {
            let mut pops: usize = 0;
            while self.indent_stack.len() > 1 && self.current_indent() > target {
                self.indent_stack.pop();
                pops += 1;
            }
            if self.current_indent() != target {
                self.report(
                    DiagnosticCode::BadIndentation,
                    Span::new(self.line, 1),
                    format!(
                        "Indentation of {} does not match any enclosing level (expected {})",
                        target,
                        self.current_indent()
                    ),
                );
            }
            self.pending_dedents = pops.saturating_sub(1);
            return Some(self.token_here(TokenKind::Dedent, ""));
        }

        None
    }

    fn scan_text(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let speaker_candidate = self.line_tokens == 0;
        let mut text = String::new();

        while let Some(c) = self.peek() {
            let after_space = if text.is_empty() {
                self.preceded_by_space()
            } else {
                text.ends_with(char::is_whitespace)
            };
            match c {
                '\n' | '{' => break,
                '\\' => self.scan_escape(&mut text),
                '<' if self.peek_at(1) == Some('<') => break,
                '#' if after_space => break,
                '/' if self.peek_at(1) == Some('/') && after_space => break,
                ':' if speaker_candidate && !after_space => break,
                _ => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        // Trailing spaces before an interpolation are part of the line
        if self.peek() != Some('{') {
            let trimmed = text.trim_end().len();
            text.truncate(trimmed);
        }

        Token::new(TokenKind::Text, text, line, column)
    }

    fn scan_tag(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance();
        let name = self.read_while(|ch| !ch.is_whitespace() && ch != '#' && ch != '{' && ch != '<');
        if name.is_empty() {
            return Token::new(TokenKind::Text, "#", line, column);
        }
        Token::new(TokenKind::Tag, name, line, column)
    }

    /// Decode one escape sequence starting at a backslash
    fn scan_escape(&mut self, out: &mut String) {
        let span = Span::new(self.line, self.column);
        self.advance();

        for marker in ["---", "===", "<<", ">>", "->"] {
            if self.starts_with(marker) {
                self.advance_by(marker.chars().count());
                out.push_str(marker);
                return;
            }
        }

        match self.peek() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(
                c @ ('\\' | '{' | '}' | '#' | ':' | '"' | '\'' | '$' | '/' | '<' | '>' | '[' | ']'),
            ) => out.push(c),
            Some('\n') | None => {
                self.report(
                    DiagnosticCode::InvalidEscape,
                    span,
                    "Backslash at end of line",
                );
                out.push('\\');
                return;
            }
            Some(other) => {
                self.report(
                    DiagnosticCode::InvalidEscape,
                    span,
                    format!("Unknown escape sequence '\\{}'", other),
                );
                out.push('\\');
                out.push(other);
            }
        }
        self.advance();
    }

    /* ===================== Strings ===================== */

    fn scan_string(&mut self, quote: char) -> Token {
        let Some(c) = self.peek() else {
            return self.scan_end();
        };

        if c == quote {
            let token = self.token_here(TokenKind::StringEnd, quote.to_string());
            self.advance();
            self.modes.pop();
            return token;
        }
        if c == '\n' {
            return self.close_region();
        }
        if c == '{' {
            let token = self.token_here(TokenKind::LeftBrace, "{");
            self.advance();
            self.modes.push(Mode::Interpolation);
            return token;
        }

        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == quote || c == '{' || c == '\n' {
                break;
            }
            if c == '\\' {
                self.scan_escape(&mut text);
            } else {
                text.push(c);
                self.advance();
            }
        }
        Token::new(TokenKind::Text, text, line, column)
    }

    /* ===================== Commands & interpolations ===================== */

    fn scan_expression(&mut self) -> Token {
        self.skip_inline_whitespace();

        let Some(c) = self.peek() else {
            return self.scan_end();
        };
        if c == '\n' {
            return self.close_region();
        }

        let (line, column) = (self.line, self.column);
        let top = self.modes.last().copied();

        if c == '>' && self.peek_at(1) == Some('>') && top == Some(Mode::Command) {
            self.advance_by(2);
            self.modes.pop();
            return Token::new(TokenKind::CommandEnd, ">>", line, column);
        }
        if c == '}' && top == Some(Mode::Interpolation) {
            self.advance();
            self.modes.pop();
            return Token::new(TokenKind::RightBrace, "}", line, column);
        }
        if c == '"' || c == '\'' {
            self.advance();
            self.modes.push(Mode::Str(c));
            return Token::new(TokenKind::StringStart, c.to_string(), line, column);
        }
        if c == '$' {
            self.advance();
            let name = self.read_while(is_identifier_char);
            if name.is_empty() {
                self.report(
                    DiagnosticCode::UnexpectedCharacter,
                    Span::new(line, column),
                    "Expected a variable name after '$'",
                );
                return Token::new(TokenKind::Error, "$", line, column);
            }
            return Token::new(TokenKind::Variable, name, line, column);
        }
        if c.is_ascii_digit() {
            let mut number = self.read_while(|ch| ch.is_ascii_digit());
            if self.peek() == Some('.') && self.peek_at(1).is_some_and(|ch| ch.is_ascii_digit()) {
                self.advance();
                number.push('.');
                number.push_str(&self.read_while(|ch| ch.is_ascii_digit()));
            }
            return Token::new(TokenKind::Number, number, line, column);
        }
        if is_identifier_start(c) {
            let word = self.read_while(is_identifier_char);
            let kind = TokenKind::keyword(&word).unwrap_or(TokenKind::Identifier);
            return Token::new(kind, word, line, column);
        }

        let two = |lexer: &Self, second: char| lexer.peek_at(1) == Some(second);
        let (kind, width) = match c {
            '(' => (TokenKind::LeftParen, 1),
            ')' => (TokenKind::RightParen, 1),
            '[' => (TokenKind::LeftBracket, 1),
            ']' => (TokenKind::RightBracket, 1),
            ',' => (TokenKind::Comma, 1),
            '.' => (TokenKind::Dot, 1),
            '+' => (TokenKind::Plus, 1),
            '-' => (TokenKind::Minus, 1),
            '*' => (TokenKind::Star, 1),
            '/' => (TokenKind::Slash, 1),
            '%' => (TokenKind::Percent, 1),
            '^' => (TokenKind::Caret, 1),
            '=' if two(self, '=') => (TokenKind::EqualEqual, 2),
            '=' => (TokenKind::Assign, 1),
            '!' if two(self, '=') => (TokenKind::NotEqual, 2),
            '!' => (TokenKind::Bang, 1),
            '>' if two(self, '=') => (TokenKind::GreaterEqual, 2),
            '>' => (TokenKind::Greater, 1),
            '<' if two(self, '=') => (TokenKind::LessEqual, 2),
            '<' => (TokenKind::Less, 1),
            '&' if two(self, '&') => (TokenKind::AndAnd, 2),
            '|' if two(self, '|') => (TokenKind::OrOr, 2),
            _ => {
                self.advance();
                self.report(
                    DiagnosticCode::UnexpectedCharacter,
                    Span::new(line, column),
                    format!("Unexpected character '{}'", c),
                );
                return Token::new(TokenKind::Error, c.to_string(), line, column);
            }
        };

        let lexeme: String = self.chars[self.pos..self.pos + width].iter().collect();
        self.advance_by(width);
        Token::new(kind, lexeme, line, column)
    }

    /* ===================== Character helpers ===================== */

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
            self.line_start = self.pos;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            if self.advance().is_none() {
                break;
            }
        }
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            out.push(c);
            self.advance();
        }
        out
    }

    fn skip_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.advance();
        }
    }

    fn skip_to_line_end(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
    }

    /// Skip the rest of the line including its newline
    fn skip_line(&mut self) {
        self.skip_to_line_end();
        self.advance();
    }

    fn leading_whitespace_len(&self) -> usize {
        let mut n = 0;
        while matches!(self.peek_at(n), Some(' ' | '\t')) {
            n += 1;
        }
        n
    }

    /// Indentation width of the upcoming line and whether it mixes tabs and spaces
    fn measure_indent(&self) -> (usize, bool) {
        let (mut width, mut spaces, mut tabs) = (0, false, false);
        let mut n = 0;
        while let Some(c) = self.peek_at(n) {
            match c {
                ' ' => {
                    width += 1;
                    spaces = true;
                }
                '\t' => {
                    width += TAB_WIDTH;
                    tabs = true;
                }
                _ => break,
            }
            n += 1;
        }
        (width, spaces && tabs)
    }

    /// Whether the lines from here look like `key: value` lines followed by
    /// a `---` marker, i.e. the next node's header.
    fn header_follows(&self) -> bool {
        let mut i = self.pos;
        let mut saw_metadata = false;

        for _ in 0..HEADER_LOOKAHEAD {
            while matches!(self.chars.get(i), Some(' ' | '\t')) {
                i += 1;
            }
            let begin = i;
            while i < self.chars.len() && self.chars[i] != '\n' {
                i += 1;
            }
            let line = &self.chars[begin..i];

            if line.starts_with(&['-', '-', '-']) {
                return saw_metadata;
            }
            if is_metadata_line(line) {
                saw_metadata = true;
            } else if !line.is_empty() {
                return false;
            }
            if i >= self.chars.len() {
                return false;
            }
            i += 1;
        }
        false
    }

    fn current_indent(&self) -> usize {
        self.indent_stack.last().copied().unwrap_or(0)
    }

    /// Whether the char at `index` is escaped: an odd run of backslashes
    /// immediately before it.
    fn is_escaped(&self, index: usize) -> bool {
        let mut run = 0;
        let mut i = index;
        while i > self.line_start && self.chars[i - 1] == '\\' {
            run += 1;
            i -= 1;
        }
        run % 2 == 1
    }

    /// A structural marker as the first non-space text on the line
    fn marker_here(&self, marker: &str) -> bool {
        let line_leading = self.chars[self.line_start..self.pos]
            .iter()
            .all(|c| *c == ' ' || *c == '\t');
        line_leading && self.starts_with(marker) && !self.is_escaped(self.pos)
    }

    fn preceded_by_space(&self) -> bool {
        self.pos == self.line_start
            || self
                .chars
                .get(self.pos - 1)
                .is_some_and(|c| c.is_whitespace())
    }

    fn token_here(&self, kind: TokenKind, lexeme: impl Into<String>) -> Token {
        Token::new(kind, lexeme, self.line, self.column)
    }

    fn report(&mut self, code: DiagnosticCode, span: Span, message: impl Into<String>) {
        let diagnostic = match code {
            DiagnosticCode::MixedIndentation | DiagnosticCode::InvalidEscape => {
                Diagnostic::warning(code, span, message)
            }
            _ => Diagnostic::error(code, span, message),
        };
        warn!(
            code = %diagnostic.code,
            line = span.line,
            column = span.column,
            "lexer: {}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
    }
}

fn is_metadata_line(line: &[char]) -> bool {
    let key_len = line
        .iter()
        .take_while(|c| is_identifier_char(**c) || **c == '-' || **c == '.')
        .count();
    key_len > 0
        && is_identifier_start(line[0])
        && line[key_len..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|c| *c == ':')
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
