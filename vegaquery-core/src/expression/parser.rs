use crate::error::{Result, ResultWithContext, VegaQueryError};
use crate::expression::ast::{
    BinaryOperator, Expression, Literal, LogicalOperator, UnaryOperator, MEMBER_BINDING_POWER,
    TERNARY_BINDING_POWER,
};
use crate::expression::lexer::{tokenize, Spanned, Token};
use std::collections::VecDeque;

/// Parse a Vega expression string
pub fn parse(expr: &str) -> Result<Expression> {
    let mut parser = Parser {
        tokens: tokenize(expr)?.into(),
        src: expr,
    };
    let result = parser.parse_expr(0.0)?;
    if let Some(Spanned { token, start, .. }) = parser.tokens.front() {
        return Err(VegaQueryError::parse(format!(
            "Unexpected token {token} at position {start} in expression: {expr}"
        )));
    }
    Ok(result)
}

fn unary_op(token: &Token) -> Option<UnaryOperator> {
    match token {
        Token::Plus => Some(UnaryOperator::Pos),
        Token::Minus => Some(UnaryOperator::Neg),
        Token::Exclamation => Some(UnaryOperator::Not),
        _ => None,
    }
}

fn binary_op(token: &Token) -> Option<BinaryOperator> {
    Some(match token {
        Token::Plus => BinaryOperator::Plus,
        Token::Minus => BinaryOperator::Minus,
        Token::Asterisk => BinaryOperator::Mult,
        Token::Slash => BinaryOperator::Div,
        Token::Percent => BinaryOperator::Mod,
        Token::GreaterThan => BinaryOperator::GreaterThan,
        Token::GreaterThanEquals => BinaryOperator::GreaterThanEqual,
        Token::LessThan => BinaryOperator::LessThan,
        Token::LessThanEquals => BinaryOperator::LessThanEqual,
        Token::DoubleEquals => BinaryOperator::Equals,
        Token::TripleEquals => BinaryOperator::StrictEquals,
        Token::ExclamationEquals => BinaryOperator::NotEquals,
        Token::ExclamationDoubleEquals => BinaryOperator::NotStrictEquals,
        _ => return None,
    })
}

fn logical_op(token: &Token) -> Option<LogicalOperator> {
    match token {
        Token::LogicalAnd => Some(LogicalOperator::And),
        Token::LogicalOr => Some(LogicalOperator::Or),
        _ => None,
    }
}

struct Parser<'a> {
    tokens: VecDeque<Spanned>,
    src: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.front().map(|s| &s.token)
    }

    fn pop(&mut self) -> Result<Spanned> {
        let src = self.src;
        self.tokens
            .pop_front()
            .ok_or_else(|| VegaQueryError::parse(format!("Unexpected end of expression: {src}")))
    }

    fn expect(&mut self, expected: Token) -> Result<Spanned> {
        let next = self.pop().map_err(|_| {
            VegaQueryError::parse(format!("Expected {expected}, reached end of expression"))
        })?;
        if next.token != expected {
            return Err(VegaQueryError::parse(format!(
                "Expected {expected}, received {} at position {} in expression: {}",
                next.token, next.start, self.src
            )));
        }
        Ok(next)
    }

    /// Pratt loop: parse a prefix form, then fold in operators that bind tighter than `min_bp`
    fn parse_expr(&mut self, min_bp: f64) -> Result<Expression> {
        let Spanned { token, start, .. } = self.pop()?;

        let mut lhs = self.parse_prefix(token).with_context(|| {
            format!(
                "Failed to parse form starting at position {start} in expression: {}",
                self.src
            )
        })?;

        while let Some(token) = self.peek().cloned() {
            if matches!(
                token,
                Token::CloseParen
                    | Token::CloseCurly
                    | Token::CloseSquare
                    | Token::Comma
                    | Token::Colon
            ) {
                break;
            }

            if let Some(op) = binary_op(&token) {
                let (left_bp, right_bp) = op.infix_binding_power();
                if left_bp < min_bp {
                    break;
                }
                self.pop()?;
                let rhs = self.parse_expr(right_bp)?;
                lhs = Expression::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                };
            } else if let Some(op) = logical_op(&token) {
                let (left_bp, right_bp) = op.infix_binding_power();
                if left_bp < min_bp {
                    break;
                }
                self.pop()?;
                let rhs = self.parse_expr(right_bp)?;
                lhs = Expression::Logical {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                };
            } else if min_bp >= MEMBER_BINDING_POWER {
                break;
            } else if token == Token::Dot {
                self.pop()?;
                let next = self.pop()?;
                let Token::Identifier(name) = next.token else {
                    return Err(VegaQueryError::parse(format!(
                        "Expected property name after '.', received {} in expression: {}",
                        next.token, self.src
                    )));
                };
                lhs = Expression::Member {
                    object: Box::new(lhs),
                    property: Box::new(Expression::Identifier(name)),
                    computed: false,
                };
            } else if token == Token::OpenSquare {
                self.pop()?;
                let property = self.parse_expr(0.0)?;
                self.expect(Token::CloseSquare)?;
                lhs = Expression::Member {
                    object: Box::new(lhs),
                    property: Box::new(property),
                    computed: true,
                };
            } else if token == Token::OpenParen {
                let callee = lhs
                    .as_identifier()
                    .map(String::from)
                    .ok_or_else(|| VegaQueryError::parse("Only global functions are callable"))?;
                self.pop()?;
                let arguments = self.parse_list(Token::CloseParen)?;
                lhs = Expression::Call { callee, arguments };
            } else if token == Token::Question {
                let (left_bp, middle_bp, right_bp) = TERNARY_BINDING_POWER;
                if min_bp >= left_bp {
                    break;
                }
                self.pop()?;
                let consequent = self.parse_expr(middle_bp)?;
                self.expect(Token::Colon)?;
                let alternate = self.parse_expr(right_bp)?;
                lhs = Expression::Conditional {
                    test: Box::new(lhs),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                };
            } else {
                return Err(VegaQueryError::parse(format!(
                    "Unexpected token '{token}' in expression: {}",
                    self.src
                )));
            }
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self, token: Token) -> Result<Expression> {
        Ok(match token {
            Token::Null => Expression::Literal(Literal::Null),
            Token::Bool(v) => Expression::Literal(Literal::Boolean(v)),
            Token::Number(v) => Expression::Literal(Literal::Number(v)),
            Token::String(v) => Expression::Literal(Literal::String(v)),
            Token::Identifier(v) => Expression::Identifier(v),
            Token::OpenParen => {
                let inner = self.parse_expr(0.0)?;
                self.expect(Token::CloseParen)?;
                inner
            }
            Token::OpenSquare => Expression::Array(self.parse_list(Token::CloseSquare)?),
            Token::OpenCurly => self.parse_object()?,
            other => match unary_op(&other) {
                Some(op) => {
                    let argument = self.parse_expr(op.unary_binding_power())?;
                    Expression::Unary {
                        op,
                        argument: Box::new(argument),
                    }
                }
                None => {
                    return Err(VegaQueryError::parse(format!(
                        "Unexpected token: {other}"
                    )))
                }
            },
        })
    }

    /// Comma separated expressions up to and including the closing token
    fn parse_list(&mut self, close: Token) -> Result<Vec<Expression>> {
        let mut items = Vec::new();
        while self.peek().is_some_and(|t| t != &close) {
            items.push(self.parse_expr(1.0)?);
            if self.peek() == Some(&Token::Comma) {
                self.pop()?;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn parse_object(&mut self) -> Result<Expression> {
        let mut props = Vec::new();
        while self.peek().is_some_and(|t| t != &Token::CloseCurly) {
            let key = match self.pop()?.token {
                Token::String(s) | Token::Identifier(s) => s,
                Token::Number(n) => n.to_string(),
                other => {
                    return Err(VegaQueryError::parse(format!(
                        "Invalid object key: {other}"
                    )))
                }
            };
            self.expect(Token::Colon)?;
            let value = self.parse_expr(1.0)?;
            props.push((key, value));
            if self.peek() == Some(&Token::Comma) {
                self.pop()?;
            }
        }
        self.expect(Token::CloseCurly)?;
        Ok(Expression::Object(props))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("datum.b >= 2 && datum.b <= 10")]
    #[case("datum['a b'] == \"x\" || !datum.c")]
    #[case("(1 + 2) * 3")]
    #[case("datum.x > 0 ? datum.x : -datum.x")]
    #[case("vlSelectionTest(\"brush_store\", datum, \"union\")")]
    #[case("inrange(datum.v, [0, 10])")]
    fn test_parse_display_round_trip(#[case] src: &str) {
        let parsed = parse(src).unwrap();
        let reparsed = parse(&parsed.to_string()).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn test_precedence() {
        let parsed = parse("1 + 2 * 3").unwrap();
        assert_eq!(parsed.to_string(), "1 + 2 * 3");
        let Expression::Binary { op, .. } = parsed else {
            panic!("expected binary expression")
        };
        assert_eq!(op, BinaryOperator::Plus);

        let parsed = parse("a || b && c").unwrap();
        let Expression::Logical { op, .. } = parsed else {
            panic!("expected logical expression")
        };
        assert_eq!(op, LogicalOperator::Or);
    }

    #[test]
    fn test_datum_field() {
        assert_eq!(
            parse("datum.price").unwrap().as_datum_field(),
            Some("price".to_string())
        );
        assert_eq!(
            parse("datum[\"unit price\"]").unwrap().as_datum_field(),
            Some("unit price".to_string())
        );
        assert_eq!(parse("other.price").unwrap().as_datum_field(), None);
    }

    #[test]
    fn test_literal_to_json() {
        let parsed = parse(r#"[{"unit": "", "values": [1, -2.5, "a", null]}]"#).unwrap();
        assert_eq!(
            parsed.to_json_literal(),
            Some(json!([{"unit": "", "values": [1, -2.5, "a", null]}]))
        );
    }

    #[rstest]
    #[case("1 +")]
    #[case("foo(")]
    #[case("a b")]
    #[case("datum.")]
    #[case("(1 + 2")]
    fn test_parse_errors(#[case] src: &str) {
        assert!(parse(src).is_err());
    }
}
