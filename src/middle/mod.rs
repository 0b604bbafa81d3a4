pub mod context;
pub mod lower;
pub mod ty;
