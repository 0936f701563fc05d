use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Pos,
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Equals,
    StrictEquals,
    NotEquals,
    NotStrictEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Parsed Vega expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Member {
        object: Box<Expression>,
        property: Box<Expression>,
        computed: bool,
    },
    Unary {
        op: UnaryOperator,
        argument: Box<Expression>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Logical {
        op: LogicalOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
    },
    Call {
        callee: String,
        arguments: Vec<Expression>,
    },
    Array(Vec<Expression>),
    Object(Vec<(String, Expression)>),
}

impl UnaryOperator {
    pub fn unary_binding_power(&self) -> f64 {
        17.0
    }
}

impl BinaryOperator {
    /// Left-to-right operators have the larger number on the right
    pub fn infix_binding_power(&self) -> (f64, f64) {
        use BinaryOperator::*;
        match self {
            Plus | Minus => (14.0, 14.5),
            Mult | Div | Mod => (15.0, 15.5),
            GreaterThan | LessThan | GreaterThanEqual | LessThanEqual => (12.0, 12.5),
            Equals | StrictEquals | NotEquals | NotStrictEquals => (11.0, 11.5),
        }
    }
}

impl LogicalOperator {
    pub fn infix_binding_power(&self) -> (f64, f64) {
        match self {
            LogicalOperator::Or => (6.0, 6.5),
            LogicalOperator::And => (7.0, 7.5),
        }
    }
}

pub const TERNARY_BINDING_POWER: (f64, f64, f64) = (4.8, 4.6, 4.4);
pub const MEMBER_BINDING_POWER: f64 = 20.0;

impl Expression {
    pub fn number(value: f64) -> Self {
        Expression::Literal(Literal::Number(value))
    }

    pub fn string<S: Into<String>>(value: S) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn identifier<S: Into<String>>(value: S) -> Self {
        Expression::Identifier(value.into())
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Identifier(name) => Some(name),
            _ => None,
        }
    }

    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Expression::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Field name when the expression has the form `datum.field` or `datum["field"]`
    pub fn as_datum_field(&self) -> Option<String> {
        match self {
            Expression::Member {
                object,
                property,
                computed,
            } if object.as_identifier() == Some("datum") => match (property.as_ref(), computed) {
                (Expression::Identifier(name), false) => Some(name.clone()),
                (Expression::Literal(Literal::String(name)), true) => Some(name.clone()),
                (Expression::Literal(Literal::Number(n)), true) => Some(n.to_string()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert a literal-only expression (including nested arrays and objects) into JSON
    pub fn to_json_literal(&self) -> Option<Value> {
        match self {
            Expression::Literal(Literal::Null) => Some(Value::Null),
            Expression::Literal(Literal::Boolean(b)) => Some(Value::Bool(*b)),
            Expression::Literal(Literal::Number(n)) => Some(number_to_json(*n)),
            Expression::Literal(Literal::String(s)) => Some(Value::String(s.clone())),
            Expression::Unary {
                op: UnaryOperator::Neg,
                argument,
            } => match argument.as_ref() {
                Expression::Literal(Literal::Number(n)) => Some(number_to_json(-*n)),
                _ => None,
            },
            Expression::Array(elements) => elements
                .iter()
                .map(|e| e.to_json_literal())
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Expression::Object(props) => props
                .iter()
                .map(|(k, v)| v.to_json_literal().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            _ => None,
        }
    }

    /// Left and right binding power, used to decide where parentheses are needed
    pub fn binding_power(&self) -> (f64, f64) {
        match self {
            Expression::Literal(_)
            | Expression::Identifier(_)
            | Expression::Array(_)
            | Expression::Object(_) => (1000.0, 1000.0),
            Expression::Member { .. } | Expression::Call { .. } => {
                (MEMBER_BINDING_POWER, MEMBER_BINDING_POWER)
            }
            Expression::Unary { op, .. } => {
                let bp = op.unary_binding_power();
                (bp, bp)
            }
            Expression::Binary { op, .. } => op.infix_binding_power(),
            Expression::Logical { op, .. } => op.infix_binding_power(),
            Expression::Conditional { .. } => (TERNARY_BINDING_POWER.0, TERNARY_BINDING_POWER.2),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Number(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{}", Value::String(s.clone())),
        }
    }
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOperator::Pos => write!(f, "+"),
            UnaryOperator::Neg => write!(f, "-"),
            UnaryOperator::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOperator::Plus => "+",
            BinaryOperator::Minus => "-",
            BinaryOperator::Mult => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanEqual => ">=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanEqual => "<=",
            BinaryOperator::Equals => "==",
            BinaryOperator::StrictEquals => "===",
            BinaryOperator::NotEquals => "!=",
            BinaryOperator::NotStrictEquals => "!==",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "&&"),
            LogicalOperator::Or => write!(f, "||"),
        }
    }
}

/// Write `expr`, wrapped in parens if requested
fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expression, needs_parens: bool) -> fmt::Result {
    if needs_parens {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

fn write_list<'a, I>(f: &mut fmt::Formatter<'_>, items: I) -> fmt::Result
where
    I: Iterator<Item = &'a Expression>,
{
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{lit}"),
            Expression::Identifier(name) => write!(f, "{name}"),
            Expression::Member {
                object,
                property,
                computed,
            } => {
                write_operand(f, object, object.binding_power().1 < MEMBER_BINDING_POWER)?;
                if *computed {
                    write!(f, "[{property}]")
                } else {
                    write!(f, ".{property}")
                }
            }
            Expression::Unary { op, argument } => {
                write!(f, "{op}")?;
                write_operand(
                    f,
                    argument,
                    argument.binding_power().0 < op.unary_binding_power(),
                )
            }
            Expression::Binary { op, left, right } => {
                let (lbp, rbp) = op.infix_binding_power();
                write_operand(f, left, left.binding_power().1 < lbp)?;
                write!(f, " {op} ")?;
                write_operand(f, right, right.binding_power().0 < rbp)
            }
            Expression::Logical { op, left, right } => {
                let (lbp, rbp) = op.infix_binding_power();
                write_operand(f, left, left.binding_power().1 < lbp)?;
                write!(f, " {op} ")?;
                write_operand(f, right, right.binding_power().0 < rbp)
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                let (lbp, _, _) = TERNARY_BINDING_POWER;
                write_operand(f, test, test.binding_power().1 <= lbp)?;
                write!(f, " ? {consequent} : {alternate}")
            }
            Expression::Call { callee, arguments } => {
                write!(f, "{callee}(")?;
                write_list(f, arguments.iter())?;
                write!(f, ")")
            }
            Expression::Array(elements) => {
                write!(f, "[")?;
                write_list(f, elements.iter())?;
                write!(f, "]")
            }
            Expression::Object(props) => {
                write!(f, "{{")?;
                for (i, (key, value)) in props.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {value}", Value::String(key.clone()))?;
                }
                write!(f, "}}")
            }
        }
    }
}
