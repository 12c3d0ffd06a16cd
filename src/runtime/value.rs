use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, TimeZone, Utc};

use crate::runtime::builtin_function::{BuiltinFunction, UserFunction};
use crate::runtime::closure::Closure;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::iterator::ValueIterator;

/// Runtime value used by the VM stack, globals, constants, and closures.
///
/// Aggregates are `Rc`-shared: assigning an array to two variables aliases
/// one underlying vector, and mutation through either is visible to both.
/// The immutable variants share their payload without a `RefCell` and reject
/// in-place mutation.
///
/// `Cell` never appears in user-observable positions; it is the shared slot
/// the VM threads between a captured local and the closures that capture it.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    String(Rc<str>),
    Bytes(Rc<[u8]>),
    Error(Rc<Value>),
    Time(DateTime<Utc>),
    Array(Rc<RefCell<Vec<Value>>>),
    ImmutableArray(Rc<Vec<Value>>),
    Map(Rc<RefCell<HashMap<String, Value>>>),
    ImmutableMap(Rc<HashMap<String, Value>>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    Builtin(BuiltinFunction),
    UserFunction(Rc<UserFunction>),
    Iterator(Rc<RefCell<ValueIterator>>),
    Cell(Rc<RefCell<Value>>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Value {
        Value::String(Rc::from(s.as_ref()))
    }

    pub fn bytes(b: impl Into<Vec<u8>>) -> Value {
        Value::Bytes(Rc::from(b.into()))
    }

    pub fn array(elements: Vec<Value>) -> Value {
        Value::Array(Rc::new(RefCell::new(elements)))
    }

    pub fn map(entries: HashMap<String, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn error(payload: Value) -> Value {
        Value::Error(Rc::new(payload))
    }

    pub fn user_function(f: UserFunction) -> Value {
        Value::UserFunction(Rc::new(f))
    }

    /// The canonical type label, stable across releases; user-visible via
    /// the `type_name` builtin and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Error(_) => "error",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::ImmutableArray(_) => "immutable-array",
            Value::Map(_) => "map",
            Value::ImmutableMap(_) => "immutable-map",
            Value::Function(_) | Value::Closure(_) => "compiled-function",
            Value::Builtin(_) => "builtin-function",
            Value::UserFunction(_) => "user-function",
            Value::Iterator(it) => it.borrow().type_name(),
            Value::Cell(_) => "free-var",
        }
    }

    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Undefined => true,
            Value::Bool(v) => !v,
            Value::Int(v) => *v == 0,
            Value::Float(v) => v.is_nan(),
            Value::Char(v) => *v == '\0',
            Value::String(v) => v.is_empty(),
            Value::Bytes(v) => v.is_empty(),
            Value::Error(_) => true,
            Value::Time(v) => *v == Utc.timestamp_opt(0, 0).unwrap(),
            Value::Array(v) => v.borrow().is_empty(),
            Value::ImmutableArray(v) => v.is_empty(),
            Value::Map(v) => v.borrow().is_empty(),
            Value::ImmutableMap(v) => v.is_empty(),
            Value::Function(_)
            | Value::Closure(_)
            | Value::Builtin(_)
            | Value::UserFunction(_)
            | Value::Iterator(_) => false,
            Value::Cell(v) => v.borrow().is_falsy(),
        }
    }

    /// Plain text form: like `Display`, except strings come out unquoted.
    /// This is what `string(x)`, `format` and the REPL echo print.
    pub fn plain_string(&self) -> String {
        match self {
            Value::String(s) => s.to_string(),
            other => other.to_string(),
        }
    }

    /// Deep copy. Aggregates copy their elements recursively; the immutable
    /// variants copy into their mutable counterparts.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Array(v) => {
                Value::array(v.borrow().iter().map(Value::deep_copy).collect())
            }
            Value::ImmutableArray(v) => {
                Value::array(v.iter().map(Value::deep_copy).collect())
            }
            Value::Map(v) => Value::map(
                v.borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.deep_copy()))
                    .collect(),
            ),
            Value::ImmutableMap(v) => Value::map(
                v.iter().map(|(k, v)| (k.clone(), v.deep_copy())).collect(),
            ),
            other => other.clone(),
        }
    }

    /// Converts an aggregate into its immutable counterpart; other values
    /// pass through unchanged. The payload is shared, not copied.
    pub fn make_immutable(&self) -> Value {
        match self {
            Value::Array(v) => Value::ImmutableArray(Rc::new(v.borrow().clone())),
            Value::Map(v) => Value::ImmutableMap(Rc::new(v.borrow().clone())),
            other => other.clone(),
        }
    }

    /// Recursive count of contained value leaves, including self.
    pub fn count_objects(&self) -> usize {
        match self {
            Value::Array(v) => 1 + v.borrow().iter().map(Value::count_objects).sum::<usize>(),
            Value::ImmutableArray(v) => 1 + v.iter().map(Value::count_objects).sum::<usize>(),
            Value::Map(v) => {
                1 + v.borrow().values().map(Value::count_objects).sum::<usize>()
            }
            Value::ImmutableMap(v) => 1 + v.values().map(Value::count_objects).sum::<usize>(),
            Value::Error(v) => 1 + v.count_objects(),
            _ => 1,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Value::Function(_) | Value::Closure(_) | Value::Builtin(_) | Value::UserFunction(_)
        )
    }

    pub fn is_iterable(&self) -> bool {
        matches!(
            self,
            Value::Array(_)
                | Value::ImmutableArray(_)
                | Value::Map(_)
                | Value::ImmutableMap(_)
                | Value::String(_)
                | Value::Bytes(_)
        )
    }

    /// Numeric conversion used by the `int` builtin and time arithmetic.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Char(v) => Some(*v as i64),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn to_char(&self) -> Option<char> {
        match self {
            Value::Char(v) => Some(*v),
            Value::Int(v) => u32::try_from(*v).ok().and_then(char::from_u32),
            Value::String(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    pub fn to_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Time(v) => Some(*v),
            Value::Int(v) => Utc.timestamp_opt(*v, 0).single(),
            _ => None,
        }
    }
}

/// Structural equality per variant. Numeric kinds do not cross-compare
/// (`1 == 1.0` is false), floats follow IEEE-754 (NaN is unequal to itself),
/// and errors compare by identity, never by payload.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => Rc::ptr_eq(a, b),
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::ImmutableArray(a), Value::ImmutableArray(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => *a.borrow() == *b.borrow(),
            (Value::ImmutableMap(a), Value::ImmutableMap(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::UserFunction(a), Value::UserFunction(b)) => a == b,
            (Value::Iterator(a), Value::Iterator(b)) => Rc::ptr_eq(a, b),
            (Value::Cell(a), Value::Cell(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("<undefined>"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Value::Error(v) => write!(f, "error: {}", v),
            Value::Time(v) => write!(f, "{}", v.to_rfc3339()),
            Value::Array(v) => format_array(f, &v.borrow()),
            Value::ImmutableArray(v) => format_array(f, v),
            Value::Map(v) => format_map(f, &v.borrow()),
            Value::ImmutableMap(v) => format_map(f, v),
            Value::Function(_) | Value::Closure(_) => f.write_str("<compiled-function>"),
            Value::Builtin(_) => f.write_str("<builtin-function>"),
            Value::UserFunction(_) => f.write_str("<user-function>"),
            Value::Iterator(it) => write!(f, "<{}>", it.borrow().type_name()),
            Value::Cell(v) => write!(f, "{}", v.borrow()),
        }
    }
}

fn format_array(f: &mut fmt::Formatter<'_>, elements: &[Value]) -> fmt::Result {
    let items: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
    write!(f, "[{}]", items.join(", "))
}

fn format_map(f: &mut fmt::Formatter<'_>, entries: &HashMap<String, Value>) -> fmt::Result {
    // Sorted for a deterministic form; iteration order itself is not part
    // of the contract.
    let mut keys: Vec<&String> = entries.keys().collect();
    keys.sort();
    let items: Vec<String> = keys
        .iter()
        .map(|k| format!("{}: {}", k, entries[*k]))
        .collect();
    write!(f, "{{{}}}", items.join(", "))
}
