//! Lexer module for the AgentSpec DSL

pub mod scanner;
pub mod token;

pub use scanner::*;
pub use token::*;
