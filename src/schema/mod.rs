pub mod election;
pub mod value;
pub mod variables;
