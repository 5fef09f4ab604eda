//! Safe condition expressions.
//!
//! Template conditions are small boolean expressions with keyword operators,
//! such as `gewinner_prozent >= 50 and num_parties >= 2`. They are tokenized,
//! parsed into a typed [`Expr`] tree and walked by an evaluator that can only
//! read the variable mapping and call the whitelisted [`Function`]s.
//! Nothing in here can reach the filesystem, the environment or any other
//! host capability.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

use thiserror::Error;
use tracing::trace;

use crate::schema::variables::Variables;

pub use ast::{Expr, Function};
pub use parser::parse;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("unsafe expression: {0}")]
    UnsafeExpression(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("value error: {0}")]
    Value(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("{function}() {message}")]
    Arguments {
        function: &'static str,
        message: String,
    },
}

/// A parsed, whitelisted condition together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse and validate a condition. Disallowed constructs fail with
    /// [`ExprError::UnsafeExpression`].
    pub fn parse(source: &str) -> Result<Condition, ExprError> {
        Ok(Condition {
            source: source.to_string(),
            expr: parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate to a truth value, surfacing any evaluation error.
    pub fn evaluate(&self, vars: &Variables) -> Result<bool, ExprError> {
        eval::eval(&self.expr, vars).map(|v| v.truthy())
    }

    /// Fail-closed evaluation: any error counts as `false`.
    pub fn holds(&self, vars: &Variables) -> bool {
        match self.evaluate(vars) {
            Ok(result) => result,
            Err(e) => {
                trace!(condition = %self.source, error = %e, "condition failed to evaluate");
                false
            }
        }
    }
}

/// Parse and evaluate a condition string in one step.
pub fn evaluate(source: &str, vars: &Variables) -> Result<bool, ExprError> {
    Condition::parse(source)?.evaluate(vars)
}

/// True when every condition holds. An empty list is vacuously true.
pub fn check_conditions(conditions: &[Condition], vars: &Variables) -> bool {
    conditions.iter().all(|c| c.holds(vars))
}

/// Like [`check_conditions`] for raw, unparsed condition strings. A string
/// that fails to parse counts as `false`.
pub fn check_sources<S: AsRef<str>>(conditions: &[S], vars: &Variables) -> bool {
    conditions.iter().all(|source| match evaluate(source.as_ref(), vars) {
        Ok(result) => result,
        Err(e) => {
            trace!(condition = source.as_ref(), error = %e, "condition rejected");
            false
        }
    })
}
