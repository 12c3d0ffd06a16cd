//! Operator dispatch for the value model: binary operators, unary negation,
//! indexing and slicing. The VM funnels the corresponding opcodes through
//! these functions.

use std::rc::Rc;

use chrono::Duration;

use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;
use crate::runtime::{MAX_BYTES_LEN, MAX_STRING_LEN};
use crate::syntax::token::Token;

fn invalid_op(op: Token, lhs: &Value, rhs: &Value) -> RuntimeError {
    RuntimeError::InvalidOperation {
        op: op.to_string(),
        lhs: lhs.type_name(),
        rhs: rhs.type_name(),
    }
}

/// Applies a binary operator. Equality is not handled here; the VM has
/// dedicated `Equal`/`NotEqual` instructions over structural equality.
pub fn binary_op(lhs: &Value, op: Token, rhs: &Value) -> Result<Value, RuntimeError> {
    match (lhs, rhs) {
        (Value::Int(l), Value::Int(r)) => int_binary_op(*l, op, *r),
        (Value::Int(l), Value::Float(r)) => float_binary_op(*l as f64, op, *r),
        (Value::Float(l), Value::Int(r)) => float_binary_op(*l, op, *r as f64),
        (Value::Float(l), Value::Float(r)) => float_binary_op(*l, op, *r),
        (Value::Int(l), Value::Char(r)) => match op {
            Token::Add => char_from_i64(l.wrapping_add(*r as i64), op, lhs, rhs),
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::Char(l), Value::Int(r)) => match op {
            Token::Add => char_from_i64((*l as i64).wrapping_add(*r), op, lhs, rhs),
            Token::Sub => char_from_i64((*l as i64).wrapping_sub(*r), op, lhs, rhs),
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::Char(l), Value::Char(r)) => match op {
            Token::Sub => Ok(Value::Int(*l as i64 - *r as i64)),
            Token::Less => Ok(Value::Bool(l < r)),
            Token::Greater => Ok(Value::Bool(l > r)),
            Token::LessEq => Ok(Value::Bool(l <= r)),
            Token::GreaterEq => Ok(Value::Bool(l >= r)),
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::String(l), _) => string_binary_op(l, op, rhs).ok_or_else(|| invalid_op(op, lhs, rhs))?,
        (Value::Char(l), Value::String(r)) => match op {
            Token::Add => {
                let mut s = String::with_capacity(r.len() + 4);
                s.push(*l);
                s.push_str(r);
                checked_string(s)
            }
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::Bytes(l), Value::Bytes(r)) => match op {
            Token::Add => {
                if l.len() + r.len() > MAX_BYTES_LEN {
                    return Err(RuntimeError::BytesLimit);
                }
                let mut out = Vec::with_capacity(l.len() + r.len());
                out.extend_from_slice(l);
                out.extend_from_slice(r);
                Ok(Value::bytes(out))
            }
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::Array(_) | Value::ImmutableArray(_), Value::Array(_) | Value::ImmutableArray(_))
            if op == Token::Add =>
        {
            let mut out = array_elements(lhs);
            out.extend(array_elements(rhs));
            Ok(Value::array(out))
        }
        (Value::Time(l), Value::Int(r)) => match op {
            Token::Add => Ok(Value::Time(*l + Duration::nanoseconds(*r))),
            Token::Sub => Ok(Value::Time(*l - Duration::nanoseconds(*r))),
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        (Value::Time(l), Value::Time(r)) => match op {
            Token::Sub => Ok(Value::Int(
                (*l - *r).num_nanoseconds().unwrap_or(i64::MAX),
            )),
            Token::Less => Ok(Value::Bool(l < r)),
            Token::Greater => Ok(Value::Bool(l > r)),
            Token::LessEq => Ok(Value::Bool(l <= r)),
            Token::GreaterEq => Ok(Value::Bool(l >= r)),
            _ => Err(invalid_op(op, lhs, rhs)),
        },
        _ => Err(invalid_op(op, lhs, rhs)),
    }
}

/// 64-bit wrapping integer arithmetic; division and remainder by zero fail.
fn int_binary_op(l: i64, op: Token, r: i64) -> Result<Value, RuntimeError> {
    let v = match op {
        Token::Add => Value::Int(l.wrapping_add(r)),
        Token::Sub => Value::Int(l.wrapping_sub(r)),
        Token::Mul => Value::Int(l.wrapping_mul(r)),
        Token::Quo => {
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Int(l.wrapping_div(r))
        }
        Token::Rem => {
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            Value::Int(l.wrapping_rem(r))
        }
        Token::And => Value::Int(l & r),
        Token::Or => Value::Int(l | r),
        Token::Xor => Value::Int(l ^ r),
        Token::AndNot => Value::Int(l & !r),
        Token::Shl => {
            if r < 0 {
                return Err(RuntimeError::InvalidOperation {
                    op: op.to_string(),
                    lhs: "int",
                    rhs: "int",
                });
            }
            if r >= 64 {
                Value::Int(0)
            } else {
                Value::Int(((l as u64) << r) as i64)
            }
        }
        Token::Shr => {
            if r < 0 {
                return Err(RuntimeError::InvalidOperation {
                    op: op.to_string(),
                    lhs: "int",
                    rhs: "int",
                });
            }
            Value::Int(l >> r.min(63))
        }
        Token::Less => Value::Bool(l < r),
        Token::Greater => Value::Bool(l > r),
        Token::LessEq => Value::Bool(l <= r),
        Token::GreaterEq => Value::Bool(l >= r),
        _ => {
            return Err(RuntimeError::InvalidOperation {
                op: op.to_string(),
                lhs: "int",
                rhs: "int",
            });
        }
    };
    Ok(v)
}

fn float_binary_op(l: f64, op: Token, r: f64) -> Result<Value, RuntimeError> {
    let v = match op {
        Token::Add => Value::Float(l + r),
        Token::Sub => Value::Float(l - r),
        Token::Mul => Value::Float(l * r),
        Token::Quo => Value::Float(l / r),
        Token::Less => Value::Bool(l < r),
        Token::Greater => Value::Bool(l > r),
        Token::LessEq => Value::Bool(l <= r),
        Token::GreaterEq => Value::Bool(l >= r),
        _ => {
            return Err(RuntimeError::InvalidOperation {
                op: op.to_string(),
                lhs: "float",
                rhs: "float",
            });
        }
    };
    Ok(v)
}

fn string_binary_op(
    l: &Rc<str>,
    op: Token,
    rhs: &Value,
) -> Option<Result<Value, RuntimeError>> {
    let result = match (op, rhs) {
        (Token::Add, Value::String(r)) => {
            let mut s = String::with_capacity(l.len() + r.len());
            s.push_str(l);
            s.push_str(r);
            checked_string(s)
        }
        (Token::Add, Value::Char(r)) => {
            let mut s = String::with_capacity(l.len() + 4);
            s.push_str(l);
            s.push(*r);
            checked_string(s)
        }
        (Token::Less, Value::String(r)) => Ok(Value::Bool(l.as_ref() < r.as_ref())),
        (Token::Greater, Value::String(r)) => Ok(Value::Bool(l.as_ref() > r.as_ref())),
        (Token::LessEq, Value::String(r)) => Ok(Value::Bool(l.as_ref() <= r.as_ref())),
        (Token::GreaterEq, Value::String(r)) => Ok(Value::Bool(l.as_ref() >= r.as_ref())),
        _ => return None,
    };
    Some(result)
}

fn checked_string(s: String) -> Result<Value, RuntimeError> {
    if s.len() > MAX_STRING_LEN {
        return Err(RuntimeError::StringLimit);
    }
    Ok(Value::string(s))
}

fn char_from_i64(v: i64, op: Token, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeError> {
    u32::try_from(v)
        .ok()
        .and_then(char::from_u32)
        .map(Value::Char)
        .ok_or_else(|| invalid_op(op, lhs, rhs))
}

fn array_elements(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(items) => items.borrow().clone(),
        Value::ImmutableArray(items) => items.as_ref().clone(),
        _ => Vec::new(),
    }
}

/// Unary `-`.
pub fn unary_minus(operand: &Value) -> Result<Value, RuntimeError> {
    match operand {
        Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
        Value::Float(v) => Ok(Value::Float(-v)),
        other => Err(RuntimeError::InvalidUnaryOperation {
            op: "-".to_string(),
            operand: other.type_name(),
        }),
    }
}

/// `a[i]`. Out-of-range sequence indices and missing map keys yield
/// `undefined`; only an index of the wrong type is an error.
pub fn index_get(value: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Array(items) => seq_get(&items.borrow(), index),
        Value::ImmutableArray(items) => seq_get(items, index),
        Value::Map(entries) => map_get(&entries.borrow(), index),
        Value::ImmutableMap(entries) => map_get(entries, index),
        Value::String(s) => match index {
            Value::Int(i) => Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(Value::Char)
                .unwrap_or(Value::Undefined)),
            _ => Err(RuntimeError::InvalidIndexType),
        },
        Value::Bytes(bytes) => match index {
            Value::Int(i) => Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| bytes.get(i))
                .map(|b| Value::Int(*b as i64))
                .unwrap_or(Value::Undefined)),
            _ => Err(RuntimeError::InvalidIndexType),
        },
        Value::Error(payload) => match index {
            Value::String(key) if key.as_ref() == "value" => Ok((**payload).clone()),
            Value::String(_) => Ok(Value::Undefined),
            _ => Err(RuntimeError::InvalidIndexType),
        },
        other => Err(RuntimeError::NotIndexable(other.type_name())),
    }
}

fn seq_get(items: &[Value], index: &Value) -> Result<Value, RuntimeError> {
    match index {
        Value::Int(i) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Undefined)),
        _ => Err(RuntimeError::InvalidIndexType),
    }
}

fn map_get(
    entries: &std::collections::HashMap<String, Value>,
    index: &Value,
) -> Result<Value, RuntimeError> {
    match index {
        Value::String(key) => Ok(entries.get(key.as_ref()).cloned().unwrap_or(Value::Undefined)),
        _ => Err(RuntimeError::InvalidIndexType),
    }
}

/// `a[i] = v`. Mutates in place through the shared payload.
pub fn index_set(value: &Value, index: &Value, new_value: Value) -> Result<(), RuntimeError> {
    match value {
        Value::Array(items) => match index {
            Value::Int(i) => {
                let mut items = items.borrow_mut();
                let idx = usize::try_from(*i).map_err(|_| RuntimeError::IndexOutOfBounds)?;
                match items.get_mut(idx) {
                    Some(slot) => {
                        *slot = new_value;
                        Ok(())
                    }
                    None => Err(RuntimeError::IndexOutOfBounds),
                }
            }
            _ => Err(RuntimeError::InvalidIndexType),
        },
        Value::Map(entries) => match index {
            Value::String(key) => {
                entries.borrow_mut().insert(key.to_string(), new_value);
                Ok(())
            }
            _ => Err(RuntimeError::InvalidIndexType),
        },
        Value::ImmutableArray(_) | Value::ImmutableMap(_) => {
            Err(RuntimeError::NotIndexAssignable(value.type_name()))
        }
        other => Err(RuntimeError::NotIndexAssignable(other.type_name())),
    }
}

/// `a[lo:hi]`. Open ends arrive as `undefined`; strings slice by character,
/// bytes by byte. Slices copy: the result never aliases the source.
pub fn slice(value: &Value, low: &Value, high: &Value) -> Result<Value, RuntimeError> {
    match value {
        Value::Array(items) => {
            let items = items.borrow();
            let (lo, hi) = slice_bounds(low, high, items.len())?;
            Ok(Value::array(items[lo..hi].to_vec()))
        }
        Value::ImmutableArray(items) => {
            let (lo, hi) = slice_bounds(low, high, items.len())?;
            Ok(Value::array(items[lo..hi].to_vec()))
        }
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (lo, hi) = slice_bounds(low, high, chars.len())?;
            Ok(Value::string(chars[lo..hi].iter().collect::<String>()))
        }
        Value::Bytes(bytes) => {
            let (lo, hi) = slice_bounds(low, high, bytes.len())?;
            Ok(Value::bytes(bytes[lo..hi].to_vec()))
        }
        other => Err(RuntimeError::NotIndexable(other.type_name())),
    }
}

fn slice_bounds(low: &Value, high: &Value, len: usize) -> Result<(usize, usize), RuntimeError> {
    let lo = match low {
        Value::Undefined => 0,
        Value::Int(i) => *i,
        _ => return Err(RuntimeError::InvalidSliceIndex),
    };
    let hi = match high {
        Value::Undefined => len as i64,
        Value::Int(i) => *i,
        _ => return Err(RuntimeError::InvalidSliceIndex),
    };
    if lo < 0 || hi > len as i64 || lo > hi {
        return Err(RuntimeError::IndexOutOfBounds);
    }
    Ok((lo as usize, hi as usize))
}
