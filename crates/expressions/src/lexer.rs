use crate::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

// Longest first so `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",", ".",
    "?", ":", "+", "-", "*", "/", "%", "!", "<", ">",
];

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i);
            let text = &src[start..i];
            let n = text.parse::<f64>().map_err(|_| ExprError::Lex {
                position: start,
                message: format!("invalid number `{text}`"),
            })?;
            out.push(Spanned {
                token: Token::Number(n),
                position: start,
            });
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (s, next) = scan_string(src, i)?;
            i = next;
            out.push(Spanned {
                token: Token::Str(s),
                position: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'$')
            {
                i += 1;
            }
            out.push(Spanned {
                token: Token::Ident(src[start..i].to_string()),
                position: start,
            });
            continue;
        }

        let rest = &src[i..];
        let Some(p) = PUNCTUATION.iter().find(|p| rest.starts_with(**p)) else {
            return Err(ExprError::Lex {
                position: start,
                message: format!(
                    "unexpected character `{}`",
                    rest.chars().next().unwrap_or('?')
                ),
            });
        };
        i += p.len();
        out.push(Spanned {
            token: Token::Punct(p),
            position: start,
        });
    }

    Ok(out)
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            i = j;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
    }
    i
}

fn scan_string(src: &str, start: usize) -> Result<(String, usize), ExprError> {
    let mut chars = src[start..].char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ExprError::Lex {
            position: start,
            message: "expected string".to_string(),
        });
    };
    let mut out = String::new();
    while let Some((offset, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((out, start + offset + c.len_utf8())),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, other)) => out.push(other),
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(ExprError::Lex {
        position: start,
        message: "unterminated string".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn scans_mixed_input() {
        assert_eq!(
            tokens("d.v === 10.5 ? 'a\\'b' : \"c\""),
            vec![
                Token::Ident("d".into()),
                Token::Punct("."),
                Token::Ident("v".into()),
                Token::Punct("==="),
                Token::Number(10.5),
                Token::Punct("?"),
                Token::Str("a'b".into()),
                Token::Punct(":"),
                Token::Str("c".into()),
            ]
        );
    }

    #[test]
    fn reports_position_of_bad_input() {
        let err = tokenize("1 + #").unwrap_err();
        assert_eq!(
            err,
            ExprError::Lex {
                position: 4,
                message: "unexpected character `#`".into()
            }
        );
        assert!(matches!(tokenize("'open"), Err(ExprError::Lex { position: 0, .. })));
    }
}
