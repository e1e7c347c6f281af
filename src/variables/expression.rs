//! Expressions for derived variables.
//!
//! A derived variable carries a small arithmetic expression over other variable
//! names, e.g. `"rates.k1 * 2"` or `"$scale / (1 + $ratio)"`. The leading `$`
//! is optional and stripped while parsing. Names may contain dots.
//!
//! Operators follow the usual precedence: `+ -` bind weakest and associate to
//! the left, then `* /` (left), then unary minus, then `^`/`**` (right).

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0, one_of, satisfy},
    combinator::{map, opt, recognize},
    multi::{many0_count, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use std::collections::HashMap;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression '{expression}': {message}")]
    Parse { expression: String, message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },
}

type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Number(f64),
    Variable(String),
    Unary(UnaryOp, Box<Expression>),
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
    Function(String, Vec<Expression>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Read-only source of variable values for expression evaluation.
pub trait EvaluationContext {
    /// Value of the named variable, `None` if it does not exist.
    fn value_of(&self, name: &str) -> Option<f64>;
}

impl EvaluationContext for HashMap<String, f64> {
    fn value_of(&self, name: &str) -> Option<f64> {
        self.get(name).copied()
    }
}

impl Expression {
    /// Parse an expression from a string.
    ///
    /// # Examples
    ///
    /// ```
    /// use kinfit_rs::variables::Expression;
    /// use std::collections::HashMap;
    ///
    /// let expr = Expression::parse("$rates.k1 - 1 - 2").unwrap();
    /// let mut values = HashMap::new();
    /// values.insert("rates.k1".to_string(), 10.0);
    /// assert_eq!(expr.evaluate(&values).unwrap(), 7.0);
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expression(input) {
            Ok((remainder, expr)) if remainder.trim().is_empty() => Ok(expr),
            Ok((remainder, _)) => Err(ExpressionError::Parse {
                expression: input.to_string(),
                message: format!("unexpected trailing characters '{}'", remainder.trim()),
            }),
            Err(e) => Err(ExpressionError::Parse {
                expression: input.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Evaluate the expression against a context.
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => context
                .value_of(name)
                .or_else(|| constant(name))
                .ok_or_else(|| ExpressionError::UndefinedVariable { name: name.clone() }),

            Self::Unary(UnaryOp::Neg, operand) => Ok(-operand.evaluate(context)?),

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div if rhs == 0.0 => Err(ExpressionError::DivisionByZero),
                    BinaryOp::Div => Ok(lhs / rhs),
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate(context))
                    .collect::<ExprResult<Vec<_>>>()?;
                call_function(name, &values)
            }
        }
    }

    /// Names of all variables the expression references, sorted and deduplicated.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => vars.push(name.clone()),
            Self::Unary(_, operand) => operand.collect_variables(vars),
            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }
            Self::Function(_, args) => args.iter().for_each(|arg| arg.collect_variables(vars)),
        }
    }
}

pub(crate) fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" => Some(std::f64::consts::PI),
        "inf" => Some(f64::INFINITY),
        _ => None,
    }
}

fn call_function(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary = |f: fn(f64) -> f64| -> ExprResult<f64> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(ExpressionError::InvalidOperation {
                message: format!("{}() takes 1 argument, got {}", name, args.len()),
            }),
        }
    };

    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "exp" => unary(f64::exp),
        "log" | "ln" => unary(f64::ln),
        "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "min" | "max" if args.is_empty() => Err(ExpressionError::InvalidOperation {
            message: format!("{}() takes at least 1 argument", name),
        }),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

// Parser functions using nom

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

/// Identifier with an optional `$` prefix; the prefix is not part of the name.
fn identifier(input: &str) -> IResult<&str, &str> {
    let input = input.strip_prefix('$').unwrap_or(input);
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        many0_count(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.')),
    ))
    .parse(input)
}

fn number(input: &str) -> IResult<&str, Expression> {
    double(input).map(|(rest, value)| (rest, Expression::Number(value)))
}

fn sign(input: &str) -> IResult<&str, char> {
    one_of("+-").parse(input)
}

fn variable(input: &str) -> IResult<&str, Expression> {
    map(identifier, |name: &str| Expression::Variable(name.to_string())).parse(input)
}

fn parens(input: &str) -> IResult<&str, Expression> {
    delimited(char('('), expression, preceded(ws, char(')'))).parse(input)
}

fn function_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;
    let (input, args) = delimited(
        preceded(ws, char('(')),
        separated_list0(preceded(ws, char(',')), expression),
        preceded(ws, char(')')),
    )
    .parse(input)?;
    Ok((input, Expression::Function(name.to_string(), args)))
}

/// Parentheses, function calls and variables are tried before numbers so that
/// names like `inf_rate` are not read as the float `inf`.
fn primary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = ws(input)?;
    alt((parens, function_call, variable, number)).parse(input)
}

fn power(input: &str) -> IResult<&str, Expression> {
    let (input, base) = primary(input)?;
    let (rest, op) = opt(preceded(ws, alt((tag("**"), tag("^"))))).parse(input)?;
    if op.is_none() {
        return Ok((input, base));
    }
    let (rest, exponent) = factor(rest)?;
    Ok((
        rest,
        Expression::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
    ))
}

fn factor(input: &str) -> IResult<&str, Expression> {
    let (input, _) = ws(input)?;
    let (rest, leading) = opt(sign).parse(input)?;
    match leading {
        Some('-') => {
            let (rest, operand) = factor(rest)?;
            Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(operand))))
        }
        Some(_) => factor(rest),
        None => power(input),
    }
}

fn product(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut acc) = factor(input)?;
    loop {
        let (rest, op) = opt(preceded(ws, one_of("*/"))).parse(input)?;
        let op = match op {
            Some('*') => BinaryOp::Mul,
            Some(_) => BinaryOp::Div,
            None => return Ok((input, acc)),
        };
        let (rest, rhs) = factor(rest)?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}

fn expression(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut acc) = product(input)?;
    loop {
        let (rest, op) = opt(preceded(ws, one_of("+-"))).parse(input)?;
        let op = match op {
            Some('+') => BinaryOp::Add,
            Some(_) => BinaryOp::Sub,
            None => return Ok((input, acc)),
        };
        let (rest, rhs) = product(rest)?;
        acc = Expression::Binary(op, Box::new(acc), Box::new(rhs));
        input = rest;
    }
}
