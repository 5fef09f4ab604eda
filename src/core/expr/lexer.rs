//! Tokenizer for condition strings.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    // keywords
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    True,
    False,
    None,
    // operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

/// A token with the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Keywords that only make sense in statements or that would reach
/// into the host language; seeing one means the condition is not a
/// plain expression.
const FORBIDDEN_KEYWORDS: &[&str] = &[
    "import", "lambda", "def", "class", "exec", "eval", "global", "nonlocal", "del", "yield",
    "await", "async", "from", "with", "assert", "raise", "try", "except", "finally", "while",
    "for", "return", "pass", "break", "continue",
];

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut i = 0;

    let byte_at = |idx: usize| chars.get(idx).map_or(input.len(), |(b, _)| *b);
    let peek = |idx: usize| chars.get(idx).map(|(_, c)| *c);

    while i < len {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && peek(i + 1).is_some_and(|n| n.is_ascii_digit())) {
            let start = i;
            let mut is_float = false;
            while peek(i).is_some_and(|n| n.is_ascii_digit() || n == '_') {
                i += 1;
            }
            if peek(i) == Some('.') && !peek(i + 1).is_some_and(|n| n.is_alphabetic()) {
                is_float = true;
                i += 1;
                while peek(i).is_some_and(|n| n.is_ascii_digit() || n == '_') {
                    i += 1;
                }
            }
            if matches!(peek(i), Some('e') | Some('E')) {
                let mut j = i + 1;
                if matches!(peek(j), Some('+') | Some('-')) {
                    j += 1;
                }
                if peek(j).is_some_and(|n| n.is_ascii_digit()) {
                    is_float = true;
                    i = j;
                    while peek(i).is_some_and(|n| n.is_ascii_digit()) {
                        i += 1;
                    }
                }
            }
            let text: String = input[byte_at(start)..byte_at(i)]
                .chars()
                .filter(|ch| *ch != '_')
                .collect();
            let token = if is_float {
                Token::Float(text.parse().map_err(|_| syntax(pos, "invalid number"))?)
            } else {
                Token::Int(text.parse().map_err(|_| syntax(pos, "integer literal out of range"))?)
            };
            tokens.push(Spanned { token, pos });
            continue;
        }

        if c == '\'' || c == '"' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            loop {
                match peek(i) {
                    None => return Err(syntax(pos, "unterminated string literal")),
                    Some(ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        let escaped = match peek(i + 1) {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('\\') => '\\',
                            Some('\'') => '\'',
                            Some('"') => '"',
                            Some(other) => {
                                return Err(syntax(
                                    byte_at(i),
                                    &format!("unsupported escape '\\{}'", other),
                                ))
                            }
                            None => return Err(syntax(pos, "unterminated string literal")),
                        };
                        value.push(escaped);
                        i += 2;
                    }
                    Some(ch) => {
                        value.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Str(value),
                pos,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while peek(i).is_some_and(|n| n.is_alphanumeric() || n == '_') {
                i += 1;
            }
            let word = &input[byte_at(start)..byte_at(i)];
            if FORBIDDEN_KEYWORDS.contains(&word) {
                return Err(ExprError::UnsafeExpression(format!(
                    "keyword '{}' is not allowed",
                    word
                )));
            }
            if word.starts_with("__") {
                return Err(ExprError::UnsafeExpression(format!(
                    "dunder name '{}' is not allowed",
                    word
                )));
            }
            let token = match word {
                "and" => Token::And,
                "or" => Token::Or,
                "not" => Token::Not,
                "in" => Token::In,
                "is" => Token::Is,
                "if" => Token::If,
                "else" => Token::Else,
                "True" => Token::True,
                "False" => Token::False,
                "None" => Token::None,
                _ => Token::Ident(word.to_string()),
            };
            tokens.push(Spanned { token, pos });
            continue;
        }

        let next = peek(i + 1);
        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::DoubleStar, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::LtE, 2),
            ('>', Some('=')) => (Token::GtE, 2),
            (':', Some('=')) => {
                return Err(ExprError::UnsafeExpression(
                    "assignment expressions are not allowed".to_string(),
                ))
            }
            ('=', _) => {
                return Err(ExprError::UnsafeExpression(
                    "assignment is not allowed".to_string(),
                ))
            }
            (';', _) => {
                return Err(ExprError::UnsafeExpression(
                    "multiple statements are not allowed".to_string(),
                ))
            }
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            (',', _) => (Token::Comma, 1),
            ('.', _) => (Token::Dot, 1),
            _ => return Err(syntax(pos, &format!("unexpected character '{}'", c))),
        };
        tokens.push(Spanned { token, pos });
        i += width;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: input.len(),
    });
    Ok(tokens)
}

fn syntax(position: usize, message: &str) -> ExprError {
    ExprError::Syntax {
        position,
        message: message.to_string(),
    }
}
