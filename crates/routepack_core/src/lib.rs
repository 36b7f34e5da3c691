pub mod diagnostic;
pub mod engine;
pub mod hash;
pub mod lexer;
pub mod plugin;
pub mod types;

mod macros;
