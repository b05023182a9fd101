use super::{BinaryOp, Expression, Function};

fn as_constant(expr: &Expression) -> Option<f64> {
    match expr {
        Expression::Constant(value) => Some(*value),
        _ => None,
    }
}

fn add(lhs: Expression, rhs: Expression) -> Expression {
    match (as_constant(&lhs), as_constant(&rhs)) {
        (Some(a), Some(b)) => Expression::Constant(a + b),
        (Some(a), _) if a == 0.0 => rhs,
        (_, Some(b)) if b == 0.0 => lhs,
        _ => Expression::binary(BinaryOp::Add, lhs, rhs),
    }
}

fn sub(lhs: Expression, rhs: Expression) -> Expression {
    match (as_constant(&lhs), as_constant(&rhs)) {
        (Some(a), Some(b)) => Expression::Constant(a - b),
        (Some(a), _) if a == 0.0 => neg(rhs),
        (_, Some(b)) if b == 0.0 => lhs,
        _ => Expression::binary(BinaryOp::Subtract, lhs, rhs),
    }
}

fn mul(lhs: Expression, rhs: Expression) -> Expression {
    match (as_constant(&lhs), as_constant(&rhs)) {
        (Some(a), Some(b)) => Expression::Constant(a * b),
        (Some(a), _) | (_, Some(a)) if a == 0.0 => Expression::Constant(0.0),
        (Some(a), _) if a == 1.0 => rhs,
        (_, Some(b)) if b == 1.0 => lhs,
        _ => Expression::binary(BinaryOp::Multiply, lhs, rhs),
    }
}

fn div(lhs: Expression, rhs: Expression) -> Expression {
    match (as_constant(&lhs), as_constant(&rhs)) {
        (Some(a), _) if a == 0.0 => Expression::Constant(0.0),
        (_, Some(b)) if b == 1.0 => lhs,
        _ => Expression::binary(BinaryOp::Divide, lhs, rhs),
    }
}

fn neg(inner: Expression) -> Expression {
    match inner {
        Expression::Constant(value) => Expression::Constant(-value),
        Expression::Negate(inner) => *inner,
        other => Expression::Negate(Box::new(other)),
    }
}

fn pow(base: Expression, exponent: Expression) -> Expression {
    match as_constant(&exponent) {
        Some(e) if e == 0.0 => Expression::Constant(1.0),
        Some(e) if e == 1.0 => base,
        _ => Expression::binary(BinaryOp::Power, base, exponent),
    }
}

fn call(function: Function, argument: Expression) -> Expression {
    Expression::call(function, argument)
}

impl Expression {
    /// Symbolic partial derivative with respect to the variable `name`.
    ///
    /// Constant subtrees are folded while the derivative is built, so the result of
    /// differentiating a switching function stays close to the size of the original.
    pub fn derivative(&self, name: &str) -> Expression {
        if !self.depends_on(name) {
            return Expression::Constant(0.0);
        }
        match self {
            Expression::Constant(_) => Expression::Constant(0.0),
            Expression::Variable(_) => Expression::Constant(1.0),
            Expression::Negate(inner) => neg(inner.derivative(name)),
            Expression::Binary { op, lhs, rhs } => {
                let (u, v) = (lhs.as_ref(), rhs.as_ref());
                let (du, dv) = (u.derivative(name), v.derivative(name));
                match op {
                    BinaryOp::Add => add(du, dv),
                    BinaryOp::Subtract => sub(du, dv),
                    BinaryOp::Multiply => add(mul(du, v.clone()), mul(u.clone(), dv)),
                    BinaryOp::Divide => div(
                        sub(mul(du, v.clone()), mul(u.clone(), dv)),
                        pow(v.clone(), Expression::Constant(2.0)),
                    ),
                    BinaryOp::Power => power_derivative(u, v, du, dv, name),
                }
            }
            Expression::Call { function, argument } => {
                let u = argument.as_ref();
                let outer = match function {
                    Function::Sqrt => div(
                        Expression::Constant(0.5),
                        call(Function::Sqrt, u.clone()),
                    ),
                    Function::Exp => call(Function::Exp, u.clone()),
                    Function::Log => div(Expression::Constant(1.0), u.clone()),
                    Function::Sin => call(Function::Cos, u.clone()),
                    Function::Cos => neg(call(Function::Sin, u.clone())),
                    Function::Tan => div(
                        Expression::Constant(1.0),
                        pow(call(Function::Cos, u.clone()), Expression::Constant(2.0)),
                    ),
                    Function::Tanh => sub(
                        Expression::Constant(1.0),
                        pow(call(Function::Tanh, u.clone()), Expression::Constant(2.0)),
                    ),
                    Function::Abs => sub(
                        mul(Expression::Constant(2.0), call(Function::Step, u.clone())),
                        Expression::Constant(1.0),
                    ),
                    Function::Step => Expression::Constant(0.0),
                };
                mul(outer, u.derivative(name))
            }
        }
    }
}

fn power_derivative(
    u: &Expression,
    v: &Expression,
    du: Expression,
    dv: Expression,
    name: &str,
) -> Expression {
    if let Some(c) = as_constant(v) {
        // d(u^c) = c * u^(c-1) * du
        return mul(
            mul(
                Expression::Constant(c),
                pow(u.clone(), Expression::Constant(c - 1.0)),
            ),
            du,
        );
    }
    let value = pow(u.clone(), v.clone());
    if !u.depends_on(name) {
        return mul(mul(value, call(Function::Log, u.clone())), dv);
    }
    // d(u^v) = u^v * (dv * log(u) + v * du / u)
    mul(
        value,
        add(
            mul(dv, call(Function::Log, u.clone())),
            div(mul(v.clone(), du), u.clone()),
        ),
    )
}
