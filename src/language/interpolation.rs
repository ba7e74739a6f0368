use crate::language::{
    ast::{Expr, StringLiteral},
    errors::SyntaxError,
    lexer::tokenize,
    parser::Parser,
    span::Position,
};

pub fn placeholder_key(index: usize) -> String {
    format!("#expr({index})")
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Splits `$name` and `${expr}` references out of a string literal's text.
pub fn interpolate(raw: &str, file: &str, position: Position) -> Result<StringLiteral, SyntaxError> {
    let mut value = String::with_capacity(raw.len());
    let mut identifiers: Vec<String> = Vec::new();
    let mut expressions = Vec::new();
    let mut chars = raw.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '$' {
            value.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some((open, '{')) => {
                let body_start = open + 1;
                let mut depth = 1usize;
                let mut body_end = None;
                chars.next();
                for (pos, inner) in chars.by_ref() {
                    match inner {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                body_end = Some(pos);
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                let Some(body_end) = body_end else {
                    return Err(SyntaxError::new(
                        format!("Unterminated interpolation starting at '{}'", &raw[idx..]),
                        file,
                        position,
                    ));
                };
                let expr = parse_embedded(&raw[body_start..body_end], file, position)?;
                let key = placeholder_key(expressions.len());
                value.push_str(&key);
                expressions.push((key, expr));
            }
            Some((_, next)) if is_identifier_start(next) => {
                value.push('$');
                let mut name = String::new();
                while let Some((_, next)) = chars.peek().copied() {
                    if !is_identifier_char(next) {
                        break;
                    }
                    name.push(next);
                    chars.next();
                }
                value.push_str(&name);
                if !identifiers.contains(&name) {
                    identifiers.push(name);
                }
            }
            _ => value.push('$'),
        }
    }

    Ok(StringLiteral {
        value,
        identifiers,
        expressions,
        position,
    })
}

fn parse_embedded(source: &str, file: &str, position: Position) -> Result<Expr, SyntaxError> {
    if source.trim().is_empty() {
        return Err(SyntaxError::new(
            "Empty interpolation '${}' in string literal",
            file,
            position,
        ));
    }
    let tokens = tokenize(file, source)
        .map_err(|err| SyntaxError::new(err.to_string(), file, position))?;
    Parser::new(file, tokens)
        .produce_expression()
        .map_err(|err| SyntaxError::new(err.message, file, position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::ast::{BinaryOp, Expr};
    use pretty_assertions::assert_eq;

    #[test]
    fn expressions_become_numbered_placeholders() {
        let lit = interpolate("sum: ${a + b}, again ${c}", "t.sbl", Position::default())
            .expect("interpolate");
        assert_eq!(lit.value, "sum: #expr(0), again #expr(1)");
        assert_eq!(lit.expressions.len(), 2);
        assert_eq!(lit.expressions[0].0, "#expr(0)");
        assert!(matches!(
            &lit.expressions[0].1,
            Expr::Binary(binary) if binary.op == BinaryOp::Add
        ));
    }

    #[test]
    fn bare_identifiers_are_collected_once() {
        let lit = interpolate("$name and $name_2 and $name", "t.sbl", Position::default())
            .expect("interpolate");
        assert_eq!(lit.value, "$name and $name_2 and $name");
        assert_eq!(lit.identifiers, vec!["name".to_string(), "name_2".to_string()]);
        assert!(lit.expressions.is_empty());
    }

    #[test]
    fn lone_dollar_is_kept() {
        let lit = interpolate("costs 5$ or $ 6", "t.sbl", Position::default())
            .expect("interpolate");
        assert!(lit.is_plain());
        assert_eq!(lit.value, "costs 5$ or $ 6");
    }

    #[test]
    fn unterminated_interpolation_fails() {
        let err = interpolate("oops ${a + ", "t.sbl", Position::default()).unwrap_err();
        assert!(err.message.starts_with("Unterminated interpolation"));
    }
}
