//! Text rendering
//!
//! Dialogue text degrades instead of failing: an interpolation naming an
//! unknown variable, function or member renders as its own `{...}` source
//! so the player sees something and the dialogue keeps going. Any other
//! failure (a type error, a host error, cancellation) is still an error.

use tracing::warn;

use super::Interpreter;
use crate::errors::RuntimeResult;
use crate::parser::ast::TextSegment;
use crate::parser::render::render_expr;

impl Interpreter {
    pub async fn render_text(&self, segments: &[TextSegment]) -> RuntimeResult<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                TextSegment::Literal { text } => out.push_str(text),
                TextSegment::Interpolation { expr, span } => match self.evaluate(expr).await {
                    Ok(value) => out.push_str(&value.to_string()),
                    Err(err) if err.is_unresolved() => {
                        warn!(
                            line = span.line,
                            column = span.column,
                            error = %err,
                            "Unresolved interpolation left as placeholder"
                        );
                        out.push('{');
                        out.push_str(&render_expr(expr));
                        out.push('}');
                    }
                    Err(err) => return Err(err.at(*span)),
                },
            }
        }
        Ok(out)
    }

    /// Quoted strings inside commands: every interpolation must succeed
    pub(crate) async fn render_strict(&self, segments: &[TextSegment]) -> RuntimeResult<String> {
        let mut out = String::new();
        for segment in segments {
            match segment {
                TextSegment::Literal { text } => out.push_str(text),
                TextSegment::Interpolation { expr, span } => {
                    let value = self.evaluate(expr).await.map_err(|e| e.at(*span))?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}
