use crate::expression::ast::Expression;
use std::collections::BTreeSet;

/// Functions whose first argument names a data block
pub const DATA_REFERENCE_FNS: &[&str] = &["data", "indata", "vlSelectionTest"];

/// Identifiers that are bound by the evaluation context rather than by signals
pub const IMPLICIT_VARS: &[&str] = &["datum", "event", "item", "parent"];

pub const EXPRESSION_CONSTANTS: &[&str] = &[
    "NaN",
    "E",
    "LN2",
    "LN10",
    "LOG2E",
    "LOG10E",
    "PI",
    "SQRT1_2",
    "SQRT2",
    "MIN_VALUE",
    "MAX_VALUE",
];

pub trait ExpressionVisitor {
    fn visit_expression(&mut self, _expression: &Expression) {}
    fn visit_identifier(&mut self, _name: &str) {}
    fn visit_called_identifier(&mut self, _callee: &str, _args: &[Expression]) {}
}

impl Expression {
    /// Depth-first walk. Static member properties (`b` in `a.b`) are not visited as identifiers
    pub fn walk(&self, visitor: &mut dyn ExpressionVisitor) {
        visitor.visit_expression(self);
        match self {
            Expression::Literal(_) => {}
            Expression::Identifier(name) => visitor.visit_identifier(name),
            Expression::Member {
                object,
                property,
                computed,
            } => {
                object.walk(visitor);
                if *computed {
                    property.walk(visitor);
                }
            }
            Expression::Unary { argument, .. } => argument.walk(visitor),
            Expression::Binary { left, right, .. } | Expression::Logical { left, right, .. } => {
                left.walk(visitor);
                right.walk(visitor);
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                test.walk(visitor);
                consequent.walk(visitor);
                alternate.walk(visitor);
            }
            Expression::Call { callee, arguments } => {
                visitor.visit_called_identifier(callee, arguments);
                for arg in arguments {
                    arg.walk(visitor);
                }
            }
            Expression::Array(elements) => {
                for element in elements {
                    element.walk(visitor);
                }
            }
            Expression::Object(props) => {
                for (_, value) in props {
                    value.walk(visitor);
                }
            }
        }
    }

    pub fn input_references(&self) -> InputReferencesVisitor {
        let mut visitor = InputReferencesVisitor::default();
        self.walk(&mut visitor);
        visitor
    }
}

/// Collects the data blocks and signals an expression reads
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputReferencesVisitor {
    pub data_names: BTreeSet<String>,
    pub signal_names: BTreeSet<String>,
}

impl ExpressionVisitor for InputReferencesVisitor {
    fn visit_identifier(&mut self, name: &str) {
        if !IMPLICIT_VARS.contains(&name) && !EXPRESSION_CONSTANTS.contains(&name) {
            self.signal_names.insert(name.to_string());
        }
    }

    fn visit_called_identifier(&mut self, callee: &str, args: &[Expression]) {
        if DATA_REFERENCE_FNS.contains(&callee) {
            if let Some(name) = args.first().and_then(|a| a.as_string_literal()) {
                self.data_names.insert(name.to_string());
            }
        }
    }
}
