use crate::language::errors::{FrontendError, LexError, SyntaxError};
use crate::runtime::error::RuntimeError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct LexDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl LexDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &LexError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.to_string(),
            label: "while parsing this".to_string(),
        }
    }
}

/// Renders a lexer or parser failure against the file it came from.
pub fn frontend_report(file: &str, source: &str, error: &FrontendError) -> Report {
    let src = NamedSource::new(file, source.to_string());
    match error {
        FrontendError::Lex(err) => Report::new(LexDiagnostic::from_error(src, err)),
        FrontendError::Syntax(err) => Report::new(SyntaxDiagnostic::from_error(src, err)),
    }
}

pub fn emit_frontend_error(file: &str, source: &str, error: &FrontendError) {
    eprintln!("{:?}", frontend_report(file, source, error));
}

pub fn report_runtime_error(error: &RuntimeError, trace: Option<&str>) {
    eprintln!("Runtime error: {}", error);
    if let Some(trace) = trace.filter(|trace| !trace.is_empty()) {
        eprintln!("{trace}");
    }
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::span::{Location, Position};

    #[test]
    fn syntax_diagnostic_points_at_the_token() {
        let position = Position::new(Location::new(1, 5, 4), Location::new(1, 6, 5));
        let err = SyntaxError::new("Unexpected token '=', expected a variable name", "main.sbl", position)
            .with_help("declarations need a name");
        let diagnostic = SyntaxDiagnostic::from_error(NamedSource::new("main.sbl", "let = 1".to_string()), &err);

        assert_eq!(diagnostic.span, SourceSpan::from((4, 1)));
        assert_eq!(diagnostic.help.as_deref(), Some("declarations need a name"));
        assert_eq!(
            diagnostic.to_string(),
            "Unexpected token '=', expected a variable name (main.sbl:1:5)"
        );
    }

    #[test]
    fn lex_diagnostic_keeps_the_message() {
        let err = LexError::UnexpectedCharacter {
            character: '@',
            file: "main.sbl".into(),
            line: 1,
            column: 3,
            offset: 2,
        };
        let diagnostic = LexDiagnostic::from_error(NamedSource::new("main.sbl", "a @".to_string()), &err);
        assert_eq!(diagnostic.to_string(), "Unrecognized character '@' at main.sbl:1:3");
        assert_eq!(diagnostic.span, SourceSpan::from((2, 1)));
    }
}
