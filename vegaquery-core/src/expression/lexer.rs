use crate::error::{Result, VegaQueryError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Identifier(String),
    Asterisk,
    CloseCurly,
    CloseParen,
    CloseSquare,
    Dot,
    DoubleEquals,
    TripleEquals,
    Exclamation,
    ExclamationEquals,
    ExclamationDoubleEquals,
    Minus,
    OpenCurly,
    OpenParen,
    OpenSquare,
    Plus,
    Slash,
    Percent,
    Comma,
    Colon,
    Question,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
    LogicalAnd,
    LogicalOr,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Null => write!(f, "null"),
            Token::Bool(v) => write!(f, "{v}"),
            Token::Number(v) => write!(f, "{v}"),
            Token::String(v) => write!(f, "{v:?}"),
            Token::Identifier(v) => write!(f, "{v}"),
            Token::Asterisk => write!(f, "*"),
            Token::CloseCurly => write!(f, "}}"),
            Token::CloseParen => write!(f, ")"),
            Token::CloseSquare => write!(f, "]"),
            Token::Dot => write!(f, "."),
            Token::DoubleEquals => write!(f, "=="),
            Token::TripleEquals => write!(f, "==="),
            Token::Exclamation => write!(f, "!"),
            Token::ExclamationEquals => write!(f, "!="),
            Token::ExclamationDoubleEquals => write!(f, "!=="),
            Token::Minus => write!(f, "-"),
            Token::OpenCurly => write!(f, "{{"),
            Token::OpenParen => write!(f, "("),
            Token::OpenSquare => write!(f, "["),
            Token::Plus => write!(f, "+"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Comma => write!(f, ","),
            Token::Colon => write!(f, ":"),
            Token::Question => write!(f, "?"),
            Token::GreaterThan => write!(f, ">"),
            Token::GreaterThanEquals => write!(f, ">="),
            Token::LessThan => write!(f, "<"),
            Token::LessThanEquals => write!(f, "<="),
            Token::LogicalAnd => write!(f, "&&"),
            Token::LogicalOr => write!(f, "||"),
        }
    }
}

/// A token together with its start and end character offsets
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            src,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, msg: &str) -> VegaQueryError {
        VegaQueryError::parse(format!(
            "{msg} at position {} in expression: {}",
            self.pos, self.src
        ))
    }

    fn next_token(&mut self) -> Result<Option<Spanned>> {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let start = self.pos;

        let token = match c {
            '"' | '\'' => self.string(c)?,
            c if c.is_ascii_digit() => self.number()?,
            '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => self.number()?,
            c if c.is_alphabetic() || c == '_' || c == '$' => self.word(),
            _ => self.operator(c)?,
        };

        Ok(Some(Spanned {
            token,
            start,
            end: self.pos,
        }))
    }

    fn operator(&mut self, c: char) -> Result<Token> {
        // Longest match first
        let three: String = self.chars[self.pos..].iter().take(3).collect();
        let two: String = self.chars[self.pos..].iter().take(2).collect();
        let (token, len) = match (three.as_str(), two.as_str(), c) {
            ("===", _, _) => (Token::TripleEquals, 3),
            ("!==", _, _) => (Token::ExclamationDoubleEquals, 3),
            (_, "==", _) => (Token::DoubleEquals, 2),
            (_, "!=", _) => (Token::ExclamationEquals, 2),
            (_, ">=", _) => (Token::GreaterThanEquals, 2),
            (_, "<=", _) => (Token::LessThanEquals, 2),
            (_, "&&", _) => (Token::LogicalAnd, 2),
            (_, "||", _) => (Token::LogicalOr, 2),
            (_, "++", _) | (_, "--", _) => {
                return Err(self.error("Increment and decrement operators are not supported"))
            }
            (_, "<<", _) | (_, ">>", _) => {
                return Err(self.error("Bitwise shift operators are not supported"))
            }
            (_, _, '=') => return Err(self.error("Assignment operator is not supported")),
            (_, _, '&') | (_, _, '|') => {
                return Err(self.error("Bitwise operators are not supported"))
            }
            (_, _, '>') => (Token::GreaterThan, 1),
            (_, _, '<') => (Token::LessThan, 1),
            (_, _, '!') => (Token::Exclamation, 1),
            (_, _, '+') => (Token::Plus, 1),
            (_, _, '-') => (Token::Minus, 1),
            (_, _, '*') => (Token::Asterisk, 1),
            (_, _, '/') => (Token::Slash, 1),
            (_, _, '%') => (Token::Percent, 1),
            (_, _, '{') => (Token::OpenCurly, 1),
            (_, _, '}') => (Token::CloseCurly, 1),
            (_, _, '(') => (Token::OpenParen, 1),
            (_, _, ')') => (Token::CloseParen, 1),
            (_, _, '[') => (Token::OpenSquare, 1),
            (_, _, ']') => (Token::CloseSquare, 1),
            (_, _, ',') => (Token::Comma, 1),
            (_, _, ':') => (Token::Colon, 1),
            (_, _, '?') => (Token::Question, 1),
            (_, _, '.') => (Token::Dot, 1),
            (_, _, other) => return Err(self.error(&format!("Invalid character {other:?}"))),
        };
        self.pos += len;
        Ok(token)
    }

    fn word(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "null" => Token::Null,
            "true" => Token::Bool(true),
            "false" => Token::Bool(false),
            _ => Token::Identifier(word),
        }
    }

    fn number(&mut self) -> Result<Token> {
        let start = self.pos;
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if c == '.' && !seen_dot && !seen_exp {
                seen_dot = true;
                self.pos += 1;
            } else if (c == 'e' || c == 'E') && !seen_exp {
                seen_exp = true;
                self.pos += 1;
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        raw.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| self.error(&format!("Invalid number literal {raw}")))
    }

    fn string(&mut self, quote: char) -> Result<Token> {
        // Skip opening quote
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error("Expression ends with unterminated string"));
            };
            self.pos += 1;
            if c == quote {
                return Ok(Token::String(value));
            }
            if c != '\\' {
                value.push(c);
                continue;
            }
            let Some(escaped) = self.peek() else {
                return Err(self.error("Expression ends with unterminated string"));
            };
            self.pos += 1;
            match escaped {
                'n' => value.push('\n'),
                'r' => value.push('\r'),
                't' => value.push('\t'),
                'b' => value.push('\u{0008}'),
                'f' => value.push('\u{000C}'),
                'v' => value.push('\u{000B}'),
                '0' => value.push('\u{0000}'),
                'u' => {
                    let hex: String = self.chars[self.pos..].iter().take(4).collect();
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 4)
                        .and_then(char::from_u32);
                    match decoded {
                        Some(ch) => {
                            value.push(ch);
                            self.pos += 4;
                        }
                        None => value.push('u'),
                    }
                }
                // Unknown escapes just drop the slash
                other => value.push(other),
            }
        }
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    let mut lexer = Lexer::new(src);
    let mut tokens = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        tokens.push(tok);
    }
    Ok(tokens)
}
