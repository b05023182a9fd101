//! # Expression Module
//!
//! A small symbolic scalar language in the style of the Lepton expressions used by
//! molecular-dynamics engines. Composite collective variables are written in it, and
//! the engine differentiates them symbolically to apply the chain rule.
//!
//! Text such as `"(1+x^4)/(1+x^4+x^8); x=rmsd/0.08"` parses into an [`Expression`]. The
//! trailing `name=value` definitions are substituted into the main expression, and a
//! definition may use definitions that follow it.

mod derivative;
mod parser;

use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

pub use parser::parse;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },
    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },
    #[error("Unexpected end of expression")]
    UnexpectedEnd,
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),
    #[error("Invalid definition '{0}': expected 'name=expression'")]
    InvalidDefinition(String),
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Subtract => '-',
            BinaryOp::Multiply => '*',
            BinaryOp::Divide => '/',
            BinaryOp::Power => '^',
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Subtract => lhs - rhs,
            BinaryOp::Multiply => lhs * rhs,
            BinaryOp::Divide => lhs / rhs,
            BinaryOp::Power => power(lhs, rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Tanh,
    Abs,
    Step,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sqrt" => Function::Sqrt,
            "exp" => Function::Exp,
            "log" => Function::Log,
            "sin" => Function::Sin,
            "cos" => Function::Cos,
            "tan" => Function::Tan,
            "tanh" => Function::Tanh,
            "abs" => Function::Abs,
            "step" => Function::Step,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Tanh => "tanh",
            Function::Abs => "abs",
            Function::Step => "step",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Function::Sqrt => x.sqrt(),
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Tanh => x.tanh(),
            Function::Abs => x.abs(),
            Function::Step => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Integer exponents go through `powi`, which is exact for the small powers that
/// switching functions use and accepts negative bases.
fn power(base: f64, exponent: f64) -> f64 {
    if exponent.fract() == 0.0 && exponent.abs() <= i32::MAX as f64 {
        base.powi(exponent as i32)
    } else {
        base.powf(exponent)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(f64),
    Variable(String),
    Negate(Box<Expression>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Call {
        function: Function,
        argument: Box<Expression>,
    },
}

impl Expression {
    pub fn constant(value: f64) -> Self {
        Expression::Constant(value)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(function: Function, argument: Expression) -> Self {
        Expression::Call {
            function,
            argument: Box::new(argument),
        }
    }

    /// Sum of the given terms, folded left to right. An empty sum is zero.
    pub fn sum(terms: impl IntoIterator<Item = Expression>) -> Self {
        terms
            .into_iter()
            .reduce(|acc, term| Expression::binary(BinaryOp::Add, acc, term))
            .unwrap_or(Expression::Constant(0.0))
    }

    pub fn evaluate<F>(&self, lookup: &F) -> Result<f64, ExpressionError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        Ok(match self {
            Expression::Constant(value) => *value,
            Expression::Variable(name) => {
                lookup(name).ok_or_else(|| ExpressionError::UnknownVariable(name.clone()))?
            }
            Expression::Negate(inner) => -inner.evaluate(lookup)?,
            Expression::Binary { op, lhs, rhs } => {
                op.apply(lhs.evaluate(lookup)?, rhs.evaluate(lookup)?)
            }
            Expression::Call { function, argument } => function.apply(argument.evaluate(lookup)?),
        })
    }

    /// Evaluates an expression whose only free variable is `name`.
    pub fn evaluate_at(&self, name: &str, value: f64) -> Result<f64, ExpressionError> {
        self.evaluate(&|var: &str| (var == name).then_some(value))
    }

    /// Replaces every occurrence of the variable `name` by `replacement`.
    pub fn substitute(&self, name: &str, replacement: &Expression) -> Expression {
        match self {
            Expression::Variable(var) if var == name => replacement.clone(),
            Expression::Constant(_) | Expression::Variable(_) => self.clone(),
            Expression::Negate(inner) => {
                Expression::Negate(Box::new(inner.substitute(name, replacement)))
            }
            Expression::Binary { op, lhs, rhs } => Expression::binary(
                *op,
                lhs.substitute(name, replacement),
                rhs.substitute(name, replacement),
            ),
            Expression::Call { function, argument } => {
                Expression::call(*function, argument.substitute(name, replacement))
            }
        }
    }

    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expression::Constant(_) => false,
            Expression::Variable(var) => var == name,
            Expression::Negate(inner) => inner.depends_on(name),
            Expression::Binary { lhs, rhs, .. } => lhs.depends_on(name) || rhs.depends_on(name),
            Expression::Call { argument, .. } => argument.depends_on(name),
        }
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Constant(_) => {}
            Expression::Variable(name) => {
                names.insert(name.clone());
            }
            Expression::Negate(inner) => inner.collect_variables(names),
            Expression::Binary { lhs, rhs, .. } => {
                lhs.collect_variables(names);
                rhs.collect_variables(names);
            }
            Expression::Call { argument, .. } => argument.collect_variables(names),
        }
    }
}

impl std::str::FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) if *value < 0.0 => write!(f, "({})", value),
            Expression::Constant(value) => write!(f, "{}", value),
            Expression::Variable(name) => f.write_str(name),
            Expression::Negate(inner) => write!(f, "(-{})", inner),
            Expression::Binary { op, lhs, rhs } => {
                write!(f, "({}{}{})", lhs, op.symbol(), rhs)
            }
            Expression::Call { function, argument } => {
                write!(f, "{}({})", function.name(), argument)
            }
        }
    }
}
