use super::{BinaryOp, Expression, ExpressionError, Function};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Operator(char),
    LeftParen,
    RightParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(value) => value.to_string(),
            Token::Identifier(name) => name.clone(),
            Token::Operator(op) => op.to_string(),
            Token::LeftParen => "(".to_string(),
            Token::RightParen => ")".to_string(),
        }
    }
}

fn tokenize(text: &str, offset: usize) -> Result<Vec<(Token, usize)>, ExpressionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let position = offset + i;
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| ExpressionError::UnexpectedToken {
                    token: literal.clone(),
                    position,
                })?;
            tokens.push((Token::Number(value), position));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push((Token::Identifier(name), position));
        } else {
            let token = match c {
                '+' | '-' | '*' | '/' | '^' => Token::Operator(c),
                '(' => Token::LeftParen,
                ')' => Token::RightParen,
                _ => {
                    return Err(ExpressionError::UnexpectedCharacter {
                        character: c,
                        position,
                    });
                }
            };
            tokens.push((token, position));
            i += 1;
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser over a token stream.
///
/// Precedence from loosest to tightest: `+ -`, `* /`, unary `-`, `^`. Exponentiation is
/// right-associative and its exponent may itself carry a unary minus, so `-x^2` is
/// `-(x^2)` and `x^-2` is `x^(-2)`.
struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let item = self.tokens.get(self.cursor).cloned();
        if item.is_some() {
            self.cursor += 1;
        }
        item
    }

    fn unexpected(token: Token, position: usize) -> ExpressionError {
        ExpressionError::UnexpectedToken {
            token: token.describe(),
            position,
        }
    }

    fn expect_right_paren(&mut self) -> Result<(), ExpressionError> {
        match self.next() {
            Some((Token::RightParen, _)) => Ok(()),
            Some((token, position)) => Err(Self::unexpected(token, position)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn parse_sum(&mut self) -> Result<Expression, ExpressionError> {
        let mut lhs = self.parse_product()?;
        while let Some(Token::Operator(op @ ('+' | '-'))) = self.peek() {
            let op = if *op == '+' {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            self.cursor += 1;
            let rhs = self.parse_product()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_product(&mut self) -> Result<Expression, ExpressionError> {
        let mut lhs = self.parse_unary()?;
        while let Some(Token::Operator(op @ ('*' | '/'))) = self.peek() {
            let op = if *op == '*' {
                BinaryOp::Multiply
            } else {
                BinaryOp::Divide
            };
            self.cursor += 1;
            let rhs = self.parse_unary()?;
            lhs = Expression::binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expression, ExpressionError> {
        if let Some(Token::Operator('-')) = self.peek() {
            self.cursor += 1;
            let inner = self.parse_unary()?;
            return Ok(match inner {
                Expression::Constant(value) => Expression::Constant(-value),
                other => Expression::Negate(Box::new(other)),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expression, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Operator('^')) = self.peek() {
            self.cursor += 1;
            let exponent = self.parse_unary()?;
            return Ok(Expression::binary(BinaryOp::Power, base, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expression, ExpressionError> {
        match self.next() {
            Some((Token::Number(value), _)) => Ok(Expression::Constant(value)),
            Some((Token::Identifier(name), _)) => {
                if let Some(Token::LeftParen) = self.peek() {
                    let function = Function::from_name(&name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    self.cursor += 1;
                    let argument = self.parse_sum()?;
                    self.expect_right_paren()?;
                    Ok(Expression::call(function, argument))
                } else {
                    Ok(Expression::Variable(name))
                }
            }
            Some((Token::LeftParen, _)) => {
                let inner = self.parse_sum()?;
                self.expect_right_paren()?;
                Ok(inner)
            }
            Some((token, position)) => Err(Self::unexpected(token, position)),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

fn parse_single(text: &str, offset: usize) -> Result<Expression, ExpressionError> {
    let mut parser = Parser {
        tokens: tokenize(text, offset)?,
        cursor: 0,
    };
    let expression = parser.parse_sum()?;
    match parser.next() {
        None => Ok(expression),
        Some((token, position)) => Err(Parser::unexpected(token, position)),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Parses an expression with optional `;name=expression` definitions.
///
/// Definitions are resolved from last to first, so each one may use the names defined
/// after it. The result contains no defined names.
pub fn parse(text: &str) -> Result<Expression, ExpressionError> {
    let mut segments = Vec::new();
    let mut offset = 0;
    for segment in text.split(';') {
        segments.push((segment, offset));
        offset += segment.chars().count() + 1;
    }
    let (main, main_offset) = segments[0];

    let mut resolved: Vec<(String, Expression)> = Vec::new();
    for &(segment, segment_offset) in segments[1..].iter().rev() {
        let (name, body) = segment
            .split_once('=')
            .ok_or_else(|| ExpressionError::InvalidDefinition(segment.trim().to_string()))?;
        let name = name.trim();
        if !is_identifier(name) {
            return Err(ExpressionError::InvalidDefinition(segment.trim().to_string()));
        }
        let body_offset = segment_offset + segment.chars().count() - body.chars().count();
        let mut expression = parse_single(body, body_offset)?;
        for (defined, replacement) in &resolved {
            expression = expression.substitute(defined, replacement);
        }
        resolved.push((name.to_string(), expression));
    }

    let mut expression = parse_single(main, main_offset)?;
    for (defined, replacement) in &resolved {
        expression = expression.substitute(defined, replacement);
    }
    Ok(expression)
}
