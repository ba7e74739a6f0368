use crate::language::span::Position;
use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
        }
    }

    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True for identifiers spelled `word`; used for contextual keywords.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.value == word
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    String,
    Identifier,

    Let,
    Mut,
    Var,
    Const,
    Final,
    Fn,
    Return,
    If,
    Else,
    For,
    While,
    In,
    Break,
    Skip,
    Type,
    Struct,
    Contract,
    Alias,
    Fulfill,
    And,
    Or,
    Not,

    Arrow,        // ->
    Power,        // **
    EqualsEquals, // ==
    NotEquals,    // !=
    LessEquals,
    GreaterEquals,
    AndAnd,
    OrOr,
    PlusEquals,
    MinusEquals,
    StarEquals,
    SlashEquals,
    Equals,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Less,
    Greater,
    Bang,
    Pipe,
    Question,
    Comma,
    Dot,
    Colon,
    Semicolon,
    OpenParen,
    CloseParen,
    OpenBrace,
    CloseBrace,
    OpenBracket,
    CloseBracket,

    WhiteSpace,
    SingleLineComment,
    EOL,
    Indent,
    Dedent,
    EOF,
}

impl TokenKind {
    /// Tokens the parser never sees.
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::WhiteSpace | TokenKind::SingleLineComment | TokenKind::EOL
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Number => "number",
            TokenKind::String => "string",
            TokenKind::Identifier => "identifier",
            TokenKind::Let => "let",
            TokenKind::Mut => "mut",
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Final => "final",
            TokenKind::Fn => "fn",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::In => "in",
            TokenKind::Break => "break",
            TokenKind::Skip => "skip",
            TokenKind::Type => "type",
            TokenKind::Struct => "struct",
            TokenKind::Contract => "contract",
            TokenKind::Alias => "alias",
            TokenKind::Fulfill => "fulfill",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::Arrow => "->",
            TokenKind::Power => "**",
            TokenKind::EqualsEquals => "==",
            TokenKind::NotEquals => "!=",
            TokenKind::LessEquals => "<=",
            TokenKind::GreaterEquals => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::PlusEquals => "+=",
            TokenKind::MinusEquals => "-=",
            TokenKind::StarEquals => "*=",
            TokenKind::SlashEquals => "/=",
            TokenKind::Equals => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Less => "<",
            TokenKind::Greater => ">",
            TokenKind::Bang => "!",
            TokenKind::Pipe => "|",
            TokenKind::Question => "?",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::OpenParen => "(",
            TokenKind::CloseParen => ")",
            TokenKind::OpenBrace => "{",
            TokenKind::CloseBrace => "}",
            TokenKind::OpenBracket => "[",
            TokenKind::CloseBracket => "]",
            TokenKind::WhiteSpace => "whitespace",
            TokenKind::SingleLineComment => "comment",
            TokenKind::EOL => "end of line",
            TokenKind::Indent => "indent",
            TokenKind::Dedent => "dedent",
            TokenKind::EOF => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}
