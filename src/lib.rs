#![allow(clippy::collapsible_if)]

pub mod config;
pub mod diagnostics;
pub mod language;
pub mod runtime;

#[cfg(test)]
mod tests;

use config::InterpreterConfig;
use language::{
    ast::Program,
    errors::{FrontendError, LexError},
    parser::Parser,
    token::Token,
};
use runtime::{value::RuntimeVal, Interpreter};

/// Result of [`interpret`]: the program's value, or the text of the runtime error that
/// stopped it.
#[derive(Clone, Debug, PartialEq)]
pub enum Interpretation {
    Value(RuntimeVal),
    Message(String),
}

impl Interpretation {
    pub fn value(&self) -> Option<&RuntimeVal> {
        match self {
            Interpretation::Value(value) => Some(value),
            Interpretation::Message(_) => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Interpretation::Value(_) => None,
            Interpretation::Message(message) => Some(message),
        }
    }
}

pub fn tokenize(file: &str, source: &str) -> Result<Vec<Token>, LexError> {
    language::lexer::tokenize(file, source)
}

pub fn parse(file: &str, source: &str) -> Result<Program, FrontendError> {
    let tokens = tokenize(file, source)?;
    Ok(Parser::new(file, tokens).produce_ast()?)
}

/// Parses and runs `source` with configuration from the environment.
pub fn interpret(file: &str, source: &str) -> Result<Interpretation, FrontendError> {
    interpret_with(file, source, InterpreterConfig::from_env())
}

pub fn interpret_with(
    file: &str,
    source: &str,
    config: InterpreterConfig,
) -> Result<Interpretation, FrontendError> {
    let program = parse(file, source)?;
    let mut interpreter = Interpreter::new(file, config);
    Ok(match interpreter.run(&program) {
        Ok(value) => Interpretation::Value(value),
        Err(err) => Interpretation::Message(format!("{err}\n")),
    })
}
