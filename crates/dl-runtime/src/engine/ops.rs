use std::cmp::Ordering;

use dl_core::{BinaryOp, DicelangError, ErrorKind, UnaryOp, Value};

use super::guard::Guard;
use super::RuntimeLimits;

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> DicelangError {
    DicelangError::operation(format!(
        "Cannot apply \"{}\" to {} and {}.",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn overflow(op: BinaryOp) -> DicelangError {
    DicelangError::operation(format!("Integer overflow in \"{}\".", op.symbol()))
}

fn division_by_zero() -> DicelangError {
    DicelangError::operation("Division by zero.")
}

/// Float results must stay finite; infinities and NaN cannot be stored.
fn finite(op: BinaryOp, result: f64) -> Result<Value, DicelangError> {
    if result.is_finite() {
        Ok(Value::Float(result))
    } else {
        Err(DicelangError::operation(format!(
            "\"{}\" produced a non-finite number.",
            op.symbol()
        )))
    }
}

/// Both operands as floats when both are numbers.
fn numbers(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_number()?, right.as_number()?))
}

pub(crate) fn binary(
    op: BinaryOp,
    left: Value,
    right: Value,
    limits: &RuntimeLimits,
) -> Result<Value, DicelangError> {
    match op {
        BinaryOp::Or | BinaryOp::Xor | BinaryOp::And => logical(op, &left, &right),
        BinaryOp::Eq | BinaryOp::Ne => equality(op, &left, &right),
        BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Le | BinaryOp::Lt => ordering(op, &left, &right),
        BinaryOp::Shl | BinaryOp::Shr => shift(op, &left, &right),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul => arithmetic(op, &left, &right),
        BinaryOp::Div => divide(&left, &right),
        BinaryOp::FloorDiv => floor_divide(&left, &right),
        BinaryOp::Rem => remainder(&left, &right),
        BinaryOp::Concat => concat(left, right),
        BinaryOp::Pow => {
            let mut guard = Guard::new(ErrorKind::ExponentiationTimeout, limits.max_exponent_steps);
            power(&left, &right, &mut guard)
        }
        BinaryOp::Log => {
            let mut guard = Guard::new(ErrorKind::ExponentiationTimeout, limits.max_exponent_steps);
            logarithm(&left, &right, &mut guard)
        }
    }
}

pub(crate) fn unary(op: UnaryOp, operand: Value) -> Result<Value, DicelangError> {
    match (op, operand) {
        (UnaryOp::Not, Value::Boolean(value)) => Ok(Value::Boolean(!value)),
        (UnaryOp::Neg, Value::Integer(value)) => value
            .checked_neg()
            .map(Value::Integer)
            .ok_or_else(|| DicelangError::operation("Integer overflow in \"-\".")),
        (UnaryOp::Neg, Value::Float(value)) => Ok(Value::Float(-value)),
        (UnaryOp::Identity, value) if value.is_number() => Ok(value),
        (op, value) => Err(DicelangError::operation(format!(
            "Cannot apply unary \"{}\" to {}.",
            unary_symbol(op),
            value.type_name()
        ))),
    }
}

fn unary_symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "!",
        UnaryOp::Neg => "-",
        UnaryOp::Identity => "+",
    }
}

fn logical(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, DicelangError> {
    let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) else {
        return Err(mismatch(op, left, right));
    };
    let result = match op {
        BinaryOp::Or => a || b,
        BinaryOp::Xor => a ^ b,
        _ => a && b,
    };
    Ok(Value::Boolean(result))
}

/// Loose structural equality used inside lists; mismatched kinds compare
/// unequal instead of failing.
fn same_value(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_value(x, y))
        }
        _ => match numbers(left, right) {
            Some((a, b)) => a == b,
            None => left == right,
        },
    }
}

fn equality(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, DicelangError> {
    let comparable = matches!(
        (left, right),
        (Value::String(_), Value::String(_))
            | (Value::Boolean(_), Value::Boolean(_))
            | (Value::List(_), Value::List(_))
    ) || (left.is_number() && right.is_number());
    if !comparable {
        return Err(mismatch(op, left, right));
    }
    let equal = same_value(left, right);
    Ok(Value::Boolean(if op == BinaryOp::Eq { equal } else { !equal }))
}

fn ordering(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, DicelangError> {
    let order = match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => match numbers(left, right) {
            Some((a, b)) => a.partial_cmp(&b),
            None => return Err(mismatch(op, left, right)),
        },
    };
    let Some(order) = order else {
        return Err(DicelangError::operation("Cannot order NaN."));
    };
    let result = match op {
        BinaryOp::Gt => order == Ordering::Greater,
        BinaryOp::Ge => order != Ordering::Less,
        BinaryOp::Le => order != Ordering::Greater,
        _ => order == Ordering::Less,
    };
    Ok(Value::Boolean(result))
}

fn shift(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, DicelangError> {
    let (Value::Integer(value), Value::Integer(amount)) = (left, right) else {
        return Err(mismatch(op, left, right));
    };
    if !(0..64).contains(amount) {
        return Err(DicelangError::operation(format!(
            "Shift amount must be between 0 and 63, got {}.",
            amount
        )));
    }
    if op == BinaryOp::Shr {
        return Ok(Value::Integer(value >> amount));
    }
    let widened = i128::from(*value) << amount;
    i64::try_from(widened)
        .map(Value::Integer)
        .map_err(|_| overflow(op))
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, DicelangError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let result = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            _ => a.checked_mul(*b),
        };
        return result.map(Value::Integer).ok_or_else(|| overflow(op));
    }
    let Some((a, b)) = numbers(left, right) else {
        return Err(mismatch(op, left, right));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        _ => a * b,
    };
    finite(op, result)
}

fn divide(left: &Value, right: &Value) -> Result<Value, DicelangError> {
    let Some((a, b)) = numbers(left, right) else {
        return Err(mismatch(BinaryOp::Div, left, right));
    };
    if b == 0.0 {
        return Err(division_by_zero());
    }
    finite(BinaryOp::Div, a / b)
}

fn floor_divide(left: &Value, right: &Value) -> Result<Value, DicelangError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        if *b == 0 {
            return Err(division_by_zero());
        }
        let quotient = a.checked_div(*b).ok_or_else(|| overflow(BinaryOp::FloorDiv))?;
        let adjust = a % b != 0 && ((*a < 0) != (*b < 0));
        return Ok(Value::Integer(if adjust { quotient - 1 } else { quotient }));
    }
    let Some((a, b)) = numbers(left, right) else {
        return Err(mismatch(BinaryOp::FloorDiv, left, right));
    };
    if b == 0.0 {
        return Err(division_by_zero());
    }
    finite(BinaryOp::FloorDiv, (a / b).floor())
}

/// Remainder takes the sign of the divisor.
fn remainder(left: &Value, right: &Value) -> Result<Value, DicelangError> {
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        if *b == 0 {
            return Err(division_by_zero());
        }
        let rem = a.checked_rem(*b).ok_or_else(|| overflow(BinaryOp::Rem))?;
        let adjust = rem != 0 && ((rem < 0) != (*b < 0));
        return Ok(Value::Integer(if adjust { rem + b } else { rem }));
    }
    let Some((a, b)) = numbers(left, right) else {
        return Err(mismatch(BinaryOp::Rem, left, right));
    };
    if b == 0.0 {
        return Err(division_by_zero());
    }
    let rem = a % b;
    let adjust = rem != 0.0 && ((rem < 0.0) != (b < 0.0));
    finite(BinaryOp::Rem, if adjust { rem + b } else { rem })
}

fn concat(left: Value, right: Value) -> Result<Value, DicelangError> {
    match (left, right) {
        (Value::String(mut text), other) => {
            match other {
                Value::String(tail) => text.push_str(&tail),
                other => text.push_str(&other.to_string()),
            }
            Ok(Value::String(text))
        }
        (Value::List(mut items), Value::List(tail)) => {
            items.extend(tail);
            Ok(Value::List(items))
        }
        (Value::List(mut items), other) => {
            items.push(other);
            Ok(Value::List(items))
        }
        (left, right) => Err(mismatch(BinaryOp::Concat, &left, &right)),
    }
}

fn power(base: &Value, exponent: &Value, guard: &mut Guard) -> Result<Value, DicelangError> {
    if let (Value::Integer(base), Value::Integer(exponent)) = (base, exponent) {
        if *exponent >= 0 {
            if *base == 0 && *exponent == 0 {
                return Err(DicelangError::operation("0 ** 0 is undefined."));
            }
            let mut result: i64 = 1;
            for _ in 0..*exponent {
                guard.tick()?;
                result = result
                    .checked_mul(*base)
                    .ok_or_else(|| overflow(BinaryOp::Pow))?;
            }
            return Ok(Value::Integer(result));
        }
    }
    let Some((b, e)) = numbers(base, exponent) else {
        return Err(mismatch(BinaryOp::Pow, base, exponent));
    };
    if b == 0.0 && e <= 0.0 {
        return Err(DicelangError::operation(format!(
            "0 ** {} is undefined.",
            exponent
        )));
    }
    guard.tick()?;
    finite(BinaryOp::Pow, b.powf(e))
}

/// `value log base`.
fn logarithm(value: &Value, base: &Value, guard: &mut Guard) -> Result<Value, DicelangError> {
    let Some((v, b)) = numbers(value, base) else {
        return Err(mismatch(BinaryOp::Log, value, base));
    };
    if v <= 0.0 || b <= 0.0 {
        return Err(DicelangError::operation(
            "Logarithms need positive operands.",
        ));
    }
    if b == 1.0 {
        return Err(DicelangError::operation("Logarithm base cannot be 1."));
    }
    guard.tick()?;
    finite(BinaryOp::Log, v.ln() / b.ln())
}
