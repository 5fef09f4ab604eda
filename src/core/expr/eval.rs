//! Tree-walking evaluator over [`Expr`].
//!
//! Only the whitelisted functions in [`Function`] are callable and the
//! only state the evaluator can read is the variable mapping it is given.

use std::cmp::Ordering;

use super::ast::{BinaryOp, BoolOp, CompareOp, Expr, Function, Literal, UnaryOp};
use super::ExprError;
use crate::schema::value::Value;
use crate::schema::variables::Variables;

/// Largest `n` for which `10^n` is a finite f64.
const MAX_ROUND_DIGITS: i64 = 308;

/// A runtime value. Variables are scalars; lists only arise from list
/// displays and `sorted()`.
#[derive(Debug, Clone, PartialEq)]
pub enum Val {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Val>),
}

impl Val {
    pub fn truthy(&self) -> bool {
        match self {
            Val::None => false,
            Val::Bool(b) => *b,
            Val::Int(i) => *i != 0,
            Val::Float(f) => *f != 0.0,
            Val::Str(s) => !s.is_empty(),
            Val::List(items) => !items.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::None => "NoneType",
            Val::Bool(_) => "bool",
            Val::Int(_) => "int",
            Val::Float(_) => "float",
            Val::Str(_) => "str",
            Val::List(_) => "list",
        }
    }

    fn number(&self) -> Option<Num> {
        match self {
            Val::Bool(b) => Some(Num::Int(i64::from(*b))),
            Val::Int(i) => Some(Num::Int(*i)),
            Val::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }
}

impl From<&Value> for Val {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Val::None,
            Value::Bool(b) => Val::Bool(*b),
            Value::Int(i) => Val::Int(*i),
            Value::Float(f) => Val::Float(*f),
            Value::String(s) => Val::Str(s.clone()),
        }
    }
}

impl From<&Literal> for Val {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::None => Val::None,
            Literal::Bool(b) => Val::Bool(*b),
            Literal::Int(i) => Val::Int(*i),
            Literal::Float(f) => Val::Float(*f),
            Literal::Str(s) => Val::Str(s.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

pub fn eval(expr: &Expr, vars: &Variables) -> Result<Val, ExprError> {
    match expr {
        Expr::Literal(literal) => Ok(Val::from(literal)),
        Expr::Name(name) => vars
            .get(name)
            .map(Val::from)
            .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
        Expr::List(items) => Ok(Val::List(
            items
                .iter()
                .map(|item| eval(item, vars))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Expr::Unary { op, operand } => unary(*op, eval(operand, vars)?),
        Expr::Binary { op, lhs, rhs } => arithmetic(*op, &eval(lhs, vars)?, &eval(rhs, vars)?),
        Expr::Bool { op, lhs, rhs } => {
            let left = eval(lhs, vars)?;
            match (op, left.truthy()) {
                (BoolOp::And, false) | (BoolOp::Or, true) => Ok(left),
                _ => eval(rhs, vars),
            }
        }
        Expr::Compare { first, rest } => {
            let mut left = eval(first, vars)?;
            for (op, next) in rest {
                let right = eval(next, vars)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Val::Bool(false));
                }
                left = right;
            }
            Ok(Val::Bool(true))
        }
        Expr::IfElse {
            condition,
            then,
            otherwise,
        } => {
            if eval(condition, vars)?.truthy() {
                eval(then, vars)
            } else {
                eval(otherwise, vars)
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, vars))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, args)
        }
        Expr::Index { target, index } => subscript(eval(target, vars)?, eval(index, vars)?),
    }
}

fn type_error(message: String) -> ExprError {
    ExprError::Type(message)
}

fn unary(op: UnaryOp, value: Val) -> Result<Val, ExprError> {
    match op {
        UnaryOp::Not => Ok(Val::Bool(!value.truthy())),
        UnaryOp::Neg => match value.number() {
            Some(Num::Int(i)) => i.checked_neg().map(Val::Int).ok_or(ExprError::Overflow),
            Some(Num::Float(f)) => Ok(Val::Float(-f)),
            None => Err(type_error(format!(
                "bad operand type for unary -: '{}'",
                value.type_name()
            ))),
        },
        UnaryOp::Pos => match value.number() {
            Some(Num::Int(i)) => Ok(Val::Int(i)),
            Some(Num::Float(f)) => Ok(Val::Float(f)),
            None => Err(type_error(format!(
                "bad operand type for unary +: '{}'",
                value.type_name()
            ))),
        },
    }
}

fn arithmetic(op: BinaryOp, lhs: &Val, rhs: &Val) -> Result<Val, ExprError> {
    if op == BinaryOp::Add {
        match (lhs, rhs) {
            (Val::Str(a), Val::Str(b)) => return Ok(Val::Str(format!("{}{}", a, b))),
            (Val::List(a), Val::List(b)) => {
                return Ok(Val::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => {}
        }
    }

    let (a, b) = match (lhs.number(), rhs.number()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(type_error(format!(
                "unsupported operand types for {:?}: '{}' and '{}'",
                op,
                lhs.type_name(),
                rhs.type_name()
            )))
        }
    };

    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_arithmetic(op, x, y),
        _ => float_arithmetic(op, a.as_f64(), b.as_f64()),
    }
}

fn int_arithmetic(op: BinaryOp, x: i64, y: i64) -> Result<Val, ExprError> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y),
        BinaryOp::Sub => x.checked_sub(y),
        BinaryOp::Mul => x.checked_mul(y),
        BinaryOp::Div => return float_arithmetic(op, x as f64, y as f64),
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            x.checked_div(y).map(|q| {
                if x % y != 0 && ((x < 0) != (y < 0)) {
                    q - 1
                } else {
                    q
                }
            })
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(ExprError::DivisionByZero);
            }
            x.checked_rem(y)
                .map(|r| if r != 0 && ((r < 0) != (y < 0)) { r + y } else { r })
        }
        BinaryOp::Pow => {
            if y < 0 {
                return float_arithmetic(op, x as f64, y as f64);
            }
            u32::try_from(y).ok().and_then(|exp| x.checked_pow(exp))
        }
    };
    result.map(Val::Int).ok_or(ExprError::Overflow)
}

fn float_arithmetic(op: BinaryOp, x: f64, y: f64) -> Result<Val, ExprError> {
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            x.powf(y)
        }
    };
    Ok(Val::Float(result))
}

fn values_equal(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::None, Val::None) => true,
        (Val::Str(x), Val::Str(y)) => x == y,
        (Val::List(x), Val::List(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        _ => match (a.number(), b.number()) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => false,
        },
    }
}

/// Ordering between two values. `Ok(None)` means unordered (NaN).
fn ordering(a: &Val, b: &Val) -> Result<Option<Ordering>, ExprError> {
    match (a, b) {
        (Val::Str(x), Val::Str(y)) => Ok(Some(x.cmp(y))),
        (Val::List(x), Val::List(y)) => {
            for (l, r) in x.iter().zip(y) {
                match ordering(l, r)? {
                    Some(Ordering::Equal) => continue,
                    other => return Ok(other),
                }
            }
            Ok(Some(x.len().cmp(&y.len())))
        }
        _ => match (a.number(), b.number()) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => Ok(Some(x.cmp(&y))),
            (Some(x), Some(y)) => Ok(x.as_f64().partial_cmp(&y.as_f64())),
            _ => Err(type_error(format!(
                "'<' not supported between instances of '{}' and '{}'",
                a.type_name(),
                b.type_name()
            ))),
        },
    }
}

fn compare(op: CompareOp, left: &Val, right: &Val) -> Result<bool, ExprError> {
    Ok(match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::NotEq => !values_equal(left, right),
        CompareOp::Lt => ordering(left, right)? == Some(Ordering::Less),
        CompareOp::LtE => matches!(
            ordering(left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => ordering(left, right)? == Some(Ordering::Greater),
        CompareOp::GtE => matches!(
            ordering(left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
        CompareOp::Is => identical(left, right),
        CompareOp::IsNot => !identical(left, right),
    })
}

fn identical(a: &Val, b: &Val) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b) && values_equal(a, b)
}

fn contains(container: &Val, item: &Val) -> Result<bool, ExprError> {
    match (container, item) {
        (Val::List(items), _) => Ok(items.iter().any(|candidate| values_equal(candidate, item))),
        (Val::Str(haystack), Val::Str(needle)) => Ok(haystack.contains(needle.as_str())),
        (Val::Str(_), other) => Err(type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            other.type_name()
        ))),
        (other, _) => Err(type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn subscript(target: Val, index: Val) -> Result<Val, ExprError> {
    let Val::Int(i) = index else {
        return Err(type_error(format!(
            "indices must be integers, not {}",
            index.type_name()
        )));
    };
    let resolve = |len: usize| -> Result<usize, ExprError> {
        let len = i64::try_from(len).map_err(|_| ExprError::IndexOutOfRange)?;
        let idx = if i < 0 { len + i } else { i };
        if (0..len).contains(&idx) {
            usize::try_from(idx).map_err(|_| ExprError::IndexOutOfRange)
        } else {
            Err(ExprError::IndexOutOfRange)
        }
    };
    match target {
        Val::List(items) => {
            let idx = resolve(items.len())?;
            Ok(items[idx].clone())
        }
        Val::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let idx = resolve(chars.len())?;
            Ok(Val::Str(chars[idx].to_string()))
        }
        other => Err(type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

fn call(function: Function, mut args: Vec<Val>) -> Result<Val, ExprError> {
    let name = function.name();
    let arity = |min: usize, max: usize, args: &[Val]| -> Result<(), ExprError> {
        if args.len() < min || args.len() > max {
            return Err(ExprError::Arguments {
                function: name,
                message: format!("takes {} to {} arguments ({} given)", min, max, args.len()),
            });
        }
        Ok(())
    };

    match function {
        Function::Len => {
            arity(1, 1, &args)?;
            let len = match &args[0] {
                Val::Str(s) => s.chars().count(),
                Val::List(items) => items.len(),
                other => {
                    return Err(type_error(format!(
                        "object of type '{}' has no len()",
                        other.type_name()
                    )))
                }
            };
            i64::try_from(len).map(Val::Int).map_err(|_| ExprError::Overflow)
        }
        Function::Min | Function::Max => {
            arity(1, usize::MAX, &args)?;
            let items = if args.len() == 1 {
                match args.remove(0) {
                    Val::List(items) => items,
                    other => {
                        return Err(type_error(format!(
                            "'{}' object is not iterable",
                            other.type_name()
                        )))
                    }
                }
            } else {
                args
            };
            let wanted = if function == Function::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut iter = items.into_iter();
            let mut best = iter.next().ok_or_else(|| ExprError::Arguments {
                function: name,
                message: "arg is an empty sequence".to_string(),
            })?;
            for item in iter {
                if ordering(&item, &best)? == Some(wanted) {
                    best = item;
                }
            }
            Ok(best)
        }
        Function::Sum => {
            arity(1, 2, &args)?;
            let start = if args.len() == 2 {
                args.pop().unwrap_or(Val::Int(0))
            } else {
                Val::Int(0)
            };
            let Val::List(items) = args.remove(0) else {
                return Err(type_error("sum() expects a list".to_string()));
            };
            items.iter().try_fold(start, |acc, item| {
                if acc.number().is_none() || item.number().is_none() {
                    return Err(type_error(format!(
                        "unsupported operand types for sum: '{}' and '{}'",
                        acc.type_name(),
                        item.type_name()
                    )));
                }
                arithmetic(BinaryOp::Add, &acc, item)
            })
        }
        Function::Round => {
            arity(1, 2, &args)?;
            let digits = match args.get(1) {
                None | Some(Val::None) => None,
                Some(Val::Int(n)) => Some(*n),
                Some(other) => {
                    return Err(type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        other.type_name()
                    )))
                }
            };
            match (args[0].number(), digits) {
                (Some(Num::Int(i)), None) => Ok(Val::Int(i)),
                (Some(Num::Float(f)), None) => float_to_int(f.round_ties_even()),
                (Some(Num::Int(i)), Some(n)) if n >= 0 => Ok(Val::Int(i)),
                // 10^n leaves the f64 range past these bounds
                (Some(Num::Float(f)), Some(n)) if n > MAX_ROUND_DIGITS => Ok(Val::Float(f)),
                (Some(Num::Float(f)), Some(n)) if n < -MAX_ROUND_DIGITS => {
                    Ok(Val::Float(0f64.copysign(f)))
                }
                (Some(Num::Int(_)), Some(n)) if n < -MAX_ROUND_DIGITS => Ok(Val::Int(0)),
                (Some(num), Some(n)) => {
                    let scale = 10f64.powi(n as i32);
                    let scaled = num.as_f64() * scale;
                    if !scaled.is_finite() {
                        // only huge floats get here, and those carry no fraction
                        return Ok(Val::Float(num.as_f64()));
                    }
                    let rounded = scaled.round_ties_even() / scale;
                    match num {
                        Num::Int(_) => float_to_int(rounded),
                        Num::Float(_) if rounded.is_finite() => Ok(Val::Float(rounded)),
                        Num::Float(_) => Err(ExprError::Overflow),
                    }
                }
                (None, _) => Err(type_error(format!(
                    "type {} doesn't define __round__",
                    args[0].type_name()
                ))),
            }
        }
        Function::Abs => {
            arity(1, 1, &args)?;
            match args[0].number() {
                Some(Num::Int(i)) => i.checked_abs().map(Val::Int).ok_or(ExprError::Overflow),
                Some(Num::Float(f)) => Ok(Val::Float(f.abs())),
                None => Err(type_error(format!(
                    "bad operand type for abs(): '{}'",
                    args[0].type_name()
                ))),
            }
        }
        Function::Sorted => {
            arity(1, 1, &args)?;
            let mut items = match args.remove(0) {
                Val::List(items) => items,
                Val::Str(s) => s.chars().map(|c| Val::Str(c.to_string())).collect(),
                other => {
                    return Err(type_error(format!(
                        "'{}' object is not iterable",
                        other.type_name()
                    )))
                }
            };
            let mut failure = None;
            items.sort_by(|a, b| match ordering(a, b) {
                Ok(ord) => ord.unwrap_or(Ordering::Equal),
                Err(e) => {
                    failure.get_or_insert(e);
                    Ordering::Equal
                }
            });
            match failure {
                Some(e) => Err(e),
                None => Ok(Val::List(items)),
            }
        }
        Function::Int => {
            arity(1, 1, &args)?;
            match &args[0] {
                Val::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Val::Int).map_err(|_| {
                    ExprError::Value(format!("invalid literal for int(): '{}'", s))
                }),
                other => match other.number() {
                    Some(Num::Int(i)) => Ok(Val::Int(i)),
                    Some(Num::Float(f)) => float_to_int(f.trunc()),
                    None => Err(type_error(format!(
                        "int() argument must be a string or a number, not '{}'",
                        other.type_name()
                    ))),
                },
            }
        }
        Function::Float => {
            arity(1, 1, &args)?;
            match &args[0] {
                Val::Str(s) => s.trim().parse::<f64>().map(Val::Float).map_err(|_| {
                    ExprError::Value(format!("could not convert string to float: '{}'", s))
                }),
                other => other.number().map(|n| Val::Float(n.as_f64())).ok_or_else(|| {
                    type_error(format!(
                        "float() argument must be a string or a number, not '{}'",
                        other.type_name()
                    ))
                }),
            }
        }
    }
}

fn float_to_int(f: f64) -> Result<Val, ExprError> {
    if !f.is_finite() {
        return Err(ExprError::Value(format!("cannot convert float {} to integer", f)));
    }
    if f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(ExprError::Overflow);
    }
    Ok(Val::Int(f as i64))
}
