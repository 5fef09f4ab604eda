pub mod article;
pub mod catalog;
pub mod correction;
pub mod expr;
pub mod generator;
pub mod party;
pub mod pipeline;
pub mod selector;
