use crate::language::{
    errors::LexError,
    indent::IndentMaker,
    span::{Location, Position},
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while, take_while1},
    character::complete::{anychar, char as nom_char, digit1, satisfy},
    combinator::{not, opt, recognize},
    sequence::{delimited, pair, terminated},
    IResult,
};
use tracing::debug;

/// Returns the byte length of the text the rule accepts at the start of `input`.
pub type Matcher = Box<dyn Fn(&str) -> Option<usize>>;

pub struct TokenRule {
    pub kind: TokenKind,
    pub matcher: Matcher,
}

impl TokenRule {
    pub fn new(kind: TokenKind, matcher: Matcher) -> Self {
        Self { kind, matcher }
    }
}

fn matched_len(result: IResult<&str, &str>) -> Option<usize> {
    result.ok().map(|(_, matched)| matched.len())
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn keyword(word: &'static str) -> Matcher {
    Box::new(move |input: &str| {
        matched_len(terminated(tag(word), not(satisfy(is_identifier_char)))(input))
    })
}

fn symbol(text: &'static str) -> Matcher {
    Box::new(move |input: &str| matched_len(tag(text)(input)))
}

fn parser(f: fn(&str) -> IResult<&str, &str>) -> Matcher {
    Box::new(move |input: &str| matched_len(f(input)))
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while1(|ch| ch == ' ' || ch == '\t')(input)
}

fn end_of_line(input: &str) -> IResult<&str, &str> {
    alt((tag("\r\n"), tag("\n")))(input)
}

fn line_comment(input: &str) -> IResult<&str, &str> {
    recognize(pair(tag("//"), take_while(|ch| ch != '\n' && ch != '\r')))(input)
}

fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(pair(nom_char('.'), digit1))))(input)
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    recognize(delimited(
        nom_char('"'),
        opt(escaped(is_not("\\\""), '\\', anychar)),
        nom_char('"'),
    ))(input)
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(is_identifier_start),
        take_while(is_identifier_char),
    ))(input)
}

/// The rule table, in priority order. Scanning is first-match, so keywords sit
/// ahead of identifiers and multi-character operators ahead of their prefixes.
pub fn default_rules() -> Vec<TokenRule> {
    use TokenKind::*;
    vec![
        TokenRule::new(EOL, parser(end_of_line)),
        TokenRule::new(WhiteSpace, parser(whitespace)),
        TokenRule::new(SingleLineComment, parser(line_comment)),
        TokenRule::new(Number, parser(number_literal)),
        TokenRule::new(String, parser(string_literal)),
        TokenRule::new(Let, keyword("let")),
        TokenRule::new(Mut, keyword("mut")),
        TokenRule::new(Var, keyword("var")),
        TokenRule::new(Const, keyword("const")),
        TokenRule::new(Final, keyword("final")),
        TokenRule::new(Fn, keyword("fn")),
        TokenRule::new(Return, keyword("return")),
        TokenRule::new(If, keyword("if")),
        TokenRule::new(Else, keyword("else")),
        TokenRule::new(For, keyword("for")),
        TokenRule::new(While, keyword("while")),
        TokenRule::new(In, keyword("in")),
        TokenRule::new(Break, keyword("break")),
        TokenRule::new(Skip, keyword("skip")),
        TokenRule::new(Type, keyword("type")),
        TokenRule::new(Struct, keyword("struct")),
        TokenRule::new(Contract, keyword("contract")),
        TokenRule::new(Alias, keyword("alias")),
        TokenRule::new(Fulfill, keyword("fulfill")),
        TokenRule::new(And, keyword("and")),
        TokenRule::new(Or, keyword("or")),
        TokenRule::new(Not, keyword("not")),
        TokenRule::new(Identifier, parser(identifier)),
        TokenRule::new(Arrow, symbol("->")),
        TokenRule::new(Power, symbol("**")),
        TokenRule::new(EqualsEquals, symbol("==")),
        TokenRule::new(NotEquals, symbol("!=")),
        TokenRule::new(LessEquals, symbol("<=")),
        TokenRule::new(GreaterEquals, symbol(">=")),
        TokenRule::new(AndAnd, symbol("&&")),
        TokenRule::new(OrOr, symbol("||")),
        TokenRule::new(PlusEquals, symbol("+=")),
        TokenRule::new(MinusEquals, symbol("-=")),
        TokenRule::new(StarEquals, symbol("*=")),
        TokenRule::new(SlashEquals, symbol("/=")),
        TokenRule::new(Equals, symbol("=")),
        TokenRule::new(Plus, symbol("+")),
        TokenRule::new(Minus, symbol("-")),
        TokenRule::new(Star, symbol("*")),
        TokenRule::new(Slash, symbol("/")),
        TokenRule::new(Percent, symbol("%")),
        TokenRule::new(Less, symbol("<")),
        TokenRule::new(Greater, symbol(">")),
        TokenRule::new(Bang, symbol("!")),
        TokenRule::new(Pipe, symbol("|")),
        TokenRule::new(Question, symbol("?")),
        TokenRule::new(Comma, symbol(",")),
        TokenRule::new(Dot, symbol(".")),
        TokenRule::new(Colon, symbol(":")),
        TokenRule::new(Semicolon, symbol(";")),
        TokenRule::new(OpenParen, symbol("(")),
        TokenRule::new(CloseParen, symbol(")")),
        TokenRule::new(OpenBrace, symbol("{")),
        TokenRule::new(CloseBrace, symbol("}")),
        TokenRule::new(OpenBracket, symbol("[")),
        TokenRule::new(CloseBracket, symbol("]")),
    ]
}

/// Raw table-driven scanner. Produces every token, trivia included.
pub struct Tokenizer<'r> {
    rules: &'r [TokenRule],
    file: String,
}

struct Cursor<'s> {
    source: &'s str,
    offset: usize,
    line: usize,
    /// 1-indexed, in chars.
    column: usize,
}

impl<'s> Cursor<'s> {
    fn location(&self) -> Location {
        Location::new(self.line, self.column as isize, self.offset)
    }

    fn advance(&mut self, len: usize) {
        for ch in self.source[self.offset..self.offset + len].chars() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset += len;
    }
}

impl<'r> Tokenizer<'r> {
    pub fn new(rules: &'r [TokenRule], file: impl Into<String>) -> Self {
        Self {
            rules,
            file: file.into(),
        }
    }

    pub fn tokenize(&self, source: &str) -> Result<Vec<Token>, LexError> {
        let mut cursor = Cursor {
            source,
            offset: 0,
            line: 1,
            column: 1,
        };
        let mut tokens = Vec::new();

        while cursor.offset < source.len() {
            let rest = &source[cursor.offset..];
            let matched = self.rules.iter().find_map(|rule| {
                (rule.matcher)(rest)
                    .filter(|len| *len > 0)
                    .map(|len| (rule.kind, len))
            });

            let Some((kind, len)) = matched else {
                let start = cursor.location();
                return Err(LexError::UnexpectedCharacter {
                    character: rest.chars().next().unwrap_or('\0'),
                    file: self.file.clone(),
                    line: start.line,
                    column: start.column,
                    offset: start.offset,
                });
            };

            let text = &rest[..len];
            let value = match kind {
                TokenKind::String => unescape(&text[1..text.len() - 1]),
                _ => text.to_string(),
            };
            let start = cursor.location();
            cursor.advance(len);
            let end = cursor.location();
            tokens.push(Token::new(kind, value, Position::new(start, end)));
        }

        let eof = Location::new(cursor.line, -1, source.len());
        tokens.push(Token::new(TokenKind::EOF, "EndOfFile", Position::new(eof, eof)));
        Ok(tokens)
    }
}

/// Only `\"` and `\\` are unescaped; any other escape is kept as written.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some('"') | Some('\\') => {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                    continue;
                }
                _ => {}
            }
        }
        out.push(ch);
    }
    out
}

pub fn tokenize_with(
    rules: &[TokenRule],
    file: &str,
    source: &str,
) -> Result<Vec<Token>, LexError> {
    let raw = Tokenizer::new(rules, file).tokenize(source)?;
    let tokens = IndentMaker::new(file)
        .mark_indents(raw)?
        .remove_unwanted_tokens()
        .into_tokens();
    debug!(file, count = tokens.len(), "tokenized source");
    Ok(tokens)
}

/// Scans `source` with the default rules and resolves indentation.
pub fn tokenize(file: &str, source: &str) -> Result<Vec<Token>, LexError> {
    tokenize_with(&default_rules(), file, source)
}
