//! Expressions for computed definition arguments.
//!
//! Discovery-derived definitions compute their ids, URIs and arguments from a
//! service instance (`'lb://' + serviceId`, `'/' + serviceId + '/**'`).
//!
//! # Design Decisions
//! - Expressions are Rhai expressions (no statements). Properties of the
//!   evaluation context are scope constants and its metadata is the
//!   `metadata` map constant
//! - Single-quoted literals are accepted as strings (`'it''s'` escapes a
//!   quote) and rewritten to Rhai string literals before compiling
//! - A missing metadata entry is `()`, which concatenates as nothing and
//!   compares unequal to every string

use std::collections::HashMap;
use std::sync::LazyLock;

use rhai::{Dynamic, Engine, EvalAltResult, Map, Scope, AST};
use thiserror::Error;

static ENGINE: LazyLock<Engine> = LazyLock::new(|| {
    let mut engine = Engine::new();
    engine.set_max_operations(10_000);
    engine.set_max_string_size(64 * 1024);
    engine.set_max_call_levels(16);
    engine.set_strict_variables(false);
    engine
});

/// Values an expression can read.
pub trait EvaluationContext {
    /// Named properties (`serviceId`, `host`, `port`, ...).
    fn properties(&self) -> Vec<(String, String)>;

    /// Entries readable as `metadata['key']`.
    fn metadata(&self) -> HashMap<String, String> {
        HashMap::new()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("syntax error in '{expr}': {reason}")]
    Syntax { expr: String, reason: String },

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("evaluation of '{expr}' failed: {reason}")]
    Evaluation { expr: String, reason: String },
}

/// A compiled expression, reusable across evaluation contexts.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: AST,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        let script = to_rhai(source)?;
        let ast = ENGINE
            .compile_expression(&script)
            .map_err(|e| ExpressionError::Syntax {
                expr: source.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn eval(&self, ctx: &dyn EvaluationContext) -> Result<Dynamic, ExpressionError> {
        let mut scope = Scope::new();
        for (name, value) in ctx.properties() {
            scope.push_constant(name, value);
        }
        let metadata: Map = ctx
            .metadata()
            .into_iter()
            .map(|(key, value)| (key.into(), Dynamic::from(value)))
            .collect();
        scope.push_constant("metadata", metadata);

        ENGINE
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
            .map_err(|e| match *e {
                EvalAltResult::ErrorVariableNotFound(name, _) => {
                    ExpressionError::UnknownProperty(name)
                }
                other => ExpressionError::Evaluation {
                    expr: self.source.clone(),
                    reason: other.to_string(),
                },
            })
    }

    /// Evaluate to a string. Comparisons evaluate to `"true"` / `"false"`.
    pub fn evaluate(&self, ctx: &dyn EvaluationContext) -> Result<String, ExpressionError> {
        let value = self.eval(ctx)?;
        if value.is_unit() {
            return Ok(String::new());
        }
        Ok(value.to_string())
    }

    pub fn evaluate_bool(&self, ctx: &dyn EvaluationContext) -> Result<bool, ExpressionError> {
        let value = self.eval(ctx)?;
        match value.as_bool() {
            Ok(b) => Ok(b),
            Err(_) => Ok(value.to_string().eq_ignore_ascii_case("true")),
        }
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, ctx: &dyn EvaluationContext) -> Result<String, ExpressionError> {
    Expression::parse(source)?.evaluate(ctx)
}

/// Returns the inner expression of a `#{...}` template value.
pub fn template_body(value: &str) -> Option<&str> {
    value.trim().strip_prefix("#{")?.strip_suffix('}')
}

/// Rewrite `'...'` literals as Rhai `"..."` strings; double-quoted strings
/// pass through untouched.
fn to_rhai(source: &str) -> Result<String, ExpressionError> {
    let unterminated = || ExpressionError::Syntax {
        expr: source.to_string(),
        reason: "unterminated string literal".to_string(),
    };

    let mut out = String::with_capacity(source.len() + 2);
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                out.push('"');
                loop {
                    match chars.next().ok_or_else(unterminated)? {
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            out.push('\'');
                        }
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        '\\' => out.push_str("\\\\"),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            '"' => {
                out.push('"');
                loop {
                    let next = chars.next().ok_or_else(unterminated)?;
                    out.push(next);
                    match next {
                        '\\' => out.push(chars.next().ok_or_else(unterminated)?),
                        '"' => break,
                        _ => {}
                    }
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx;

    impl EvaluationContext for Ctx {
        fn properties(&self) -> Vec<(String, String)> {
            vec![
                ("serviceId".into(), "orders".into()),
                ("port".into(), "8080".into()),
            ]
        }

        fn metadata(&self) -> HashMap<String, String> {
            HashMap::from([("edge".to_string(), "true".to_string())])
        }
    }

    #[test]
    fn concatenates_literals_and_properties() {
        assert_eq!(evaluate("'lb://'+serviceId", &Ctx).unwrap(), "lb://orders");
        assert_eq!(
            evaluate("'/' + serviceId + '/(?<remaining>.*)'", &Ctx).unwrap(),
            "/orders/(?<remaining>.*)"
        );
        assert_eq!(evaluate("'/${remaining}'", &Ctx).unwrap(), "/${remaining}");
        assert_eq!(evaluate("'/$\\{remaining}'", &Ctx).unwrap(), "/$\\{remaining}");
    }

    #[test]
    fn compares_metadata() {
        let expr = Expression::parse("metadata['edge'] == 'true'").unwrap();
        assert!(expr.evaluate_bool(&Ctx).unwrap());

        let expr = Expression::parse("metadata['missing'] == 'true'").unwrap();
        assert!(!expr.evaluate_bool(&Ctx).unwrap());
        assert_eq!(evaluate("'x' + metadata['missing']", &Ctx).unwrap(), "x");
    }

    #[test]
    fn quote_escapes() {
        assert_eq!(evaluate("'it''s'", &Ctx).unwrap(), "it's");
        assert_eq!(evaluate("'say \"hi\"'", &Ctx).unwrap(), "say \"hi\"");
        assert_eq!(evaluate("\"a\" + 'b'", &Ctx).unwrap(), "ab");
    }

    #[test]
    fn rejects_unknown_property_and_bad_syntax() {
        assert_eq!(
            evaluate("nope", &Ctx),
            Err(ExpressionError::UnknownProperty("nope".into()))
        );
        assert!(Expression::parse("'a' +").is_err());
        assert!(matches!(
            Expression::parse("'unterminated"),
            Err(ExpressionError::Syntax { .. })
        ));
    }

    #[test]
    fn template_body_strips_markers() {
        assert_eq!(template_body("#{serviceId}"), Some("serviceId"));
        assert_eq!(template_body("plain"), None);
    }
}
