use crate::language::span::Position;
use miette::SourceSpan;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LexError {
    #[error("Unrecognized character '{character}' at {file}:{line}:{column}")]
    UnexpectedCharacter {
        character: char,
        file: String,
        line: usize,
        column: isize,
        offset: usize,
    },
    #[error(
        "IndentationError: unindent to column {width} does not match any outer indentation level at {file}:{line}:{column}"
    )]
    Indentation {
        width: usize,
        file: String,
        line: usize,
        column: isize,
        offset: usize,
    },
}

impl LexError {
    pub fn to_source_span(&self) -> SourceSpan {
        match self {
            LexError::UnexpectedCharacter { offset, .. } => (*offset, 1).into(),
            LexError::Indentation { offset, width, .. } => {
                (offset.saturating_sub(*width), *width).into()
            }
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            LexError::UnexpectedCharacter { .. } => None,
            LexError::Indentation { .. } => Some(
                "indented blocks open after a line ending in ':'; dedent back to an enclosing level"
                    .into(),
            ),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{message} ({file}:{line}:{column})", line = .position.start.line, column = .position.start.column)]
pub struct SyntaxError {
    pub message: String,
    pub file: String,
    pub position: Position,
    pub help: Option<String>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, file: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            file: file.into(),
            position,
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn to_source_span(&self) -> SourceSpan {
        self.position.to_source_span()
    }
}

/// Everything that can stop a program before it runs.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FrontendError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}
