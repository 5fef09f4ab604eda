//! Wahltext Engine: rule-based German election texts from structured results.
//!
//! Templates are selected by safe condition expressions over a flat variable
//! mapping, filled with values, and then run through scoped regex corrections
//! that fix number formatting and party articles.

pub mod core;
pub mod schema;

pub use crate::core::article::{Article, ArticleLayout};
pub use crate::core::pipeline::{PipelineError, WahltextEngine};
pub use crate::core::selector::Criterion;
pub use crate::schema::variables::Variables;
