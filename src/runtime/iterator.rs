use std::cell::RefCell;
use std::rc::Rc;

use crate::runtime::errors::RuntimeError;
use crate::runtime::value::Value;

#[derive(Debug)]
enum IterSource {
    Array(Rc<RefCell<Vec<Value>>>),
    ImmutableArray(Rc<Vec<Value>>),
    Map(Vec<(String, Value)>),
    String(Vec<char>),
    Bytes(Rc<[u8]>),
}

/// Single-pass iterator over an iterable value.
///
/// Array iterators read through the shared vector on each step, so an array
/// mutated mid-iteration shortens or lengthens the walk but never faults.
/// Map iterators snapshot their entries at init time for the same safety.
/// Once exhausted, an iterator stays exhausted.
#[derive(Debug)]
pub struct ValueIterator {
    source: IterSource,
    index: usize,
    started: bool,
    done: bool,
}

impl ValueIterator {
    pub fn init(value: &Value) -> Result<ValueIterator, RuntimeError> {
        let source = match value {
            Value::Array(items) => IterSource::Array(items.clone()),
            Value::ImmutableArray(items) => IterSource::ImmutableArray(items.clone()),
            Value::Map(entries) => IterSource::Map(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Value::ImmutableMap(entries) => IterSource::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Value::String(s) => IterSource::String(s.chars().collect()),
            Value::Bytes(bytes) => IterSource::Bytes(bytes.clone()),
            other => return Err(RuntimeError::NotIterable(other.type_name())),
        };
        Ok(ValueIterator {
            source,
            index: 0,
            started: false,
            done: false,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self.source {
            IterSource::Array(_) | IterSource::ImmutableArray(_) => "array-iterator",
            IterSource::Map(_) => "map-iterator",
            IterSource::String(_) => "string-iterator",
            IterSource::Bytes(_) => "bytes-iterator",
        }
    }

    fn len(&self) -> usize {
        match &self.source {
            IterSource::Array(items) => items.borrow().len(),
            IterSource::ImmutableArray(items) => items.len(),
            IterSource::Map(entries) => entries.len(),
            IterSource::String(chars) => chars.len(),
            IterSource::Bytes(bytes) => bytes.len(),
        }
    }

    /// Advances the iterator; false once the source is exhausted.
    pub fn next(&mut self) -> bool {
        if self.done {
            return false;
        }
        let next = if self.started { self.index + 1 } else { 0 };
        if next >= self.len() {
            self.done = true;
            return false;
        }
        self.index = next;
        self.started = true;
        true
    }

    /// Current key: the element index for sequences, the key for maps.
    pub fn key(&self) -> Value {
        match &self.source {
            IterSource::Map(entries) => entries
                .get(self.index)
                .map(|(k, _)| Value::string(k))
                .unwrap_or(Value::Undefined),
            _ => Value::Int(self.index as i64),
        }
    }

    pub fn value(&self) -> Value {
        match &self.source {
            IterSource::Array(items) => items
                .borrow()
                .get(self.index)
                .cloned()
                .unwrap_or(Value::Undefined),
            IterSource::ImmutableArray(items) => {
                items.get(self.index).cloned().unwrap_or(Value::Undefined)
            }
            IterSource::Map(entries) => entries
                .get(self.index)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Undefined),
            IterSource::String(chars) => chars
                .get(self.index)
                .map(|c| Value::Char(*c))
                .unwrap_or(Value::Undefined),
            IterSource::Bytes(bytes) => bytes
                .get(self.index)
                .map(|b| Value::Int(*b as i64))
                .unwrap_or(Value::Undefined),
        }
    }
}
