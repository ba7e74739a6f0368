pub mod ast;
pub mod errors;
pub mod indent;
pub mod interpolation;
pub mod lexer;
pub mod parser;
pub mod span;
pub mod token;
pub mod types;
