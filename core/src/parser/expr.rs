//! Expression parsing by precedence climbing
//!
//! Binding strength, loosest first:
//!
//! | level | operators                         |
//! |-------|-----------------------------------|
//! | 1     | `or` `\|\|`                       |
//! | 2     | `xor` `^`                         |
//! | 3     | `and` `&&`                        |
//! | 4     | `==` `!=` `eq` `is` `neq`         |
//! | 5     | `<` `<=` `>` `>=` and word forms  |
//! | 6     | `+` `-`                           |
//! | 7     | `*` `/` `%`                       |
//!
//! Unary `-`, `!` and `not` bind tighter than any binary operator; postfix
//! call, member and index bind tightest. All binary operators are left
//! associative.

use super::ast::{BinaryOp, Expr, UnaryOp};
use super::{push_literal, PResult, Parser, MAX_EXPRESSION_DEPTH};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::lexer::TokenKind;

fn binary_operator(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    let entry = match kind {
        TokenKind::OrOr | TokenKind::Or => (BinaryOp::Or, 1),
        TokenKind::Caret | TokenKind::Xor => (BinaryOp::Xor, 2),
        TokenKind::AndAnd | TokenKind::And => (BinaryOp::And, 3),
        TokenKind::EqualEqual | TokenKind::Eq | TokenKind::Is => (BinaryOp::Eq, 4),
        TokenKind::NotEqual | TokenKind::Neq => (BinaryOp::Ne, 4),
        TokenKind::Less | TokenKind::Lt => (BinaryOp::Lt, 5),
        TokenKind::LessEqual | TokenKind::Lte => (BinaryOp::Lte, 5),
        TokenKind::Greater | TokenKind::Gt => (BinaryOp::Gt, 5),
        TokenKind::GreaterEqual | TokenKind::Gte => (BinaryOp::Gte, 5),
        TokenKind::Plus => (BinaryOp::Add, 6),
        TokenKind::Minus => (BinaryOp::Sub, 6),
        TokenKind::Star => (BinaryOp::Mul, 7),
        TokenKind::Slash => (BinaryOp::Div, 7),
        TokenKind::Percent => (BinaryOp::Mod, 7),
        _ => return None,
    };
    Some(entry)
}

impl Parser {
    pub(crate) fn parse_expression(&mut self) -> PResult<Expr> {
        self.nested(|parser| parser.parse_binary(1))
    }

    /// Run a recursive production one level deeper, failing past the limit
    fn nested<T>(&mut self, production: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_EXPRESSION_DEPTH {
            return Err(Diagnostic::error(
                DiagnosticCode::UnexpectedToken,
                self.peek().span(),
                format!("Expression nested too deeply (limit {})", MAX_EXPRESSION_DEPTH),
            ));
        }
        self.depth += 1;
        let result = production(self);
        self.depth -= 1;
        result
    }

    fn parse_binary(&mut self, min_precedence: u8) -> PResult<Expr> {
        let mut left = self.parse_unary()?;

        while let Some((op, precedence)) = binary_operator(self.peek_kind()) {
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_binary(precedence + 1)?;
            let span = left.span();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let op = match self.peek_kind() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang | TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_postfix(),
        };
        let span = self.advance().span();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                TokenKind::LeftParen => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    let span = expr.span();
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenKind::Dot => {
                    self.advance();
                    let token = self.peek().clone();
                    if token.kind != TokenKind::Identifier && !token.kind.is_keyword() {
                        return Err(self.unexpected("a member name after '.'"));
                    }
                    self.advance();
                    let span = expr.span();
                    expr = Expr::Member {
                        target: Box::new(expr),
                        member: token.lexeme,
                        span,
                    };
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RightBracket, "']'")?;
                    let span = expr.span();
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        span,
                    };
                }
                _ => break,
            }
        }

        Ok(expr)
    }

    /// Comma-separated arguments after an already consumed `(`
    pub(crate) fn parse_arguments(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RightParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.check(TokenKind::Comma) {
                self.advance();
                continue;
            }
            self.expect(TokenKind::RightParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let span = token.span();

        match token.kind {
            TokenKind::Number => {
                self.advance();
                let value = token.lexeme.parse::<f64>().map_err(|_| {
                    Diagnostic::error(
                        DiagnosticCode::UnexpectedToken,
                        span,
                        format!("Invalid number '{}'", token.lexeme),
                    )
                })?;
                Ok(Expr::Number { value, span })
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(Expr::Boolean {
                    value: token.kind == TokenKind::True,
                    span,
                })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr::Null { span })
            }
            TokenKind::Variable => {
                self.advance();
                Ok(Expr::Variable {
                    name: token.lexeme,
                    span,
                })
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier {
                    name: token.lexeme,
                    span,
                })
            }
            TokenKind::StringStart => self.parse_string(),
            TokenKind::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(inner)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_string(&mut self) -> PResult<Expr> {
        let span = self.advance().span();
        let mut segments = Vec::new();

        loop {
            match self.peek_kind() {
                TokenKind::Text => {
                    let text = self.advance().lexeme;
                    push_literal(&mut segments, &text);
                }
                TokenKind::LeftBrace => segments.push(self.parse_interpolation()?),
                TokenKind::StringEnd => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("closing quote")),
            }
        }

        Ok(Expr::StringInterp { segments, span })
    }
}
