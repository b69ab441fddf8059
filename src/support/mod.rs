//! Matching and evaluation helpers shared by predicates, filters and locators.

pub mod expression;
pub mod path_pattern;

pub use expression::{EvaluationContext, Expression, ExpressionError};
pub use path_pattern::PathPattern;
