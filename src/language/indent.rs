//! Indentation sub-grammar.
//!
//! A block may be written with braces or, after a line ending in `:`, with a deeper
//! indentation level. Indentation anywhere else is cosmetic and ignored.

use crate::language::{
    errors::LexError,
    span::Position,
    token::{Token, TokenKind},
};

const TAB_WIDTH: usize = 4;

#[derive(Clone, Copy, Debug)]
struct IndentLevel {
    width: usize,
    /// Cosmetic levels are remembered so dedents can land on them, but they never
    /// produce tokens.
    silent: bool,
}

pub struct IndentMaker {
    file: String,
    tokens: Vec<Token>,
}

fn indent_width(text: &str) -> usize {
    text.chars()
        .map(|ch| if ch == '\t' { TAB_WIDTH } else { 1 })
        .sum()
}

impl IndentMaker {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            tokens: Vec::new(),
        }
    }

    pub fn mark_indents(mut self, tokens: Vec<Token>) -> Result<Self, LexError> {
        let mut stack = vec![IndentLevel {
            width: 0,
            silent: false,
        }];
        let mut out = Vec::with_capacity(tokens.len());
        let mut after_eol = true;
        let mut after_colon = false;
        let mut line_width = 0usize;
        let mut colon_line_width = 0usize;
        let mut last_significant: Option<TokenKind> = None;

        let mut idx = 0;
        while idx < tokens.len() {
            let token = &tokens[idx];

            if after_eol {
                after_eol = false;
                let (width, first) = if token.kind == TokenKind::WhiteSpace {
                    (indent_width(&token.value), tokens.get(idx + 1))
                } else {
                    (0, Some(token))
                };
                let blank = match first {
                    Some(first) => matches!(
                        first.kind,
                        TokenKind::EOL | TokenKind::SingleLineComment | TokenKind::EOF
                    ),
                    None => true,
                };

                if !blank {
                    if token.kind == TokenKind::WhiteSpace {
                        out.push(token.clone());
                        idx += 1;
                    }
                    let anchor = tokens[idx].position;
                    self.apply_indent(
                        &mut stack,
                        &mut out,
                        width,
                        after_colon.then_some(colon_line_width),
                        anchor,
                    )?;
                    line_width = width;
                    after_colon = false;
                    continue;
                }
            }

            match token.kind {
                TokenKind::EOL => {
                    if let Some(kind) = last_significant.take() {
                        after_colon = kind == TokenKind::Colon;
                        if after_colon {
                            colon_line_width = line_width;
                        }
                    }
                    after_eol = true;
                }
                TokenKind::EOF => {
                    while stack.len() > 1 {
                        if let Some(level) = stack.pop() {
                            if !level.silent {
                                out.push(Token::new(TokenKind::Dedent, "", token.position));
                            }
                        }
                    }
                }
                TokenKind::WhiteSpace | TokenKind::SingleLineComment => {}
                kind => last_significant = Some(kind),
            }
            out.push(token.clone());
            idx += 1;
        }

        self.tokens = out;
        Ok(self)
    }

    fn apply_indent(
        &self,
        stack: &mut Vec<IndentLevel>,
        out: &mut Vec<Token>,
        width: usize,
        colon_line: Option<usize>,
        anchor: Position,
    ) -> Result<(), LexError> {
        let top = stack.last().map(|level| level.width).unwrap_or(0);

        if width > top {
            if let Some(colon_width) = colon_line {
                if colon_width > top && colon_width < width {
                    stack.push(IndentLevel {
                        width: colon_width,
                        silent: true,
                    });
                }
                stack.push(IndentLevel {
                    width,
                    silent: false,
                });
                out.push(Token::new(TokenKind::Indent, "", anchor));
            }
            return Ok(());
        }

        while let Some(level) = stack.last().copied() {
            if level.width <= width {
                break;
            }
            stack.pop();
            if !level.silent {
                out.push(Token::new(TokenKind::Dedent, "", anchor));
            }
        }

        let top = stack.last().map(|level| level.width).unwrap_or(0);
        if top != width {
            return Err(LexError::Indentation {
                width,
                file: self.file.clone(),
                line: anchor.start.line,
                column: anchor.start.column,
                offset: anchor.start.offset,
            });
        }
        Ok(())
    }

    /// Drops trivia and the colon that introduced an indented block.
    pub fn remove_unwanted_tokens(mut self) -> Self {
        let filtered: Vec<Token> = self
            .tokens
            .into_iter()
            .filter(|token| !token.kind.is_trivia())
            .collect();

        let mut out = Vec::with_capacity(filtered.len());
        for (idx, token) in filtered.iter().enumerate() {
            let opens_block = filtered
                .get(idx + 1)
                .is_some_and(|next| next.kind == TokenKind::Indent);
            if token.kind == TokenKind::Colon && opens_block {
                continue;
            }
            out.push(token.clone());
        }
        self.tokens = out;
        self
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}
