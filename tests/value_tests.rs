use std::collections::HashMap;

use rill::runtime::value::Value;

#[test]
fn type_names_form_a_closed_set() {
    let known = [
        "undefined",
        "bool",
        "int",
        "float",
        "char",
        "string",
        "bytes",
        "error",
        "time",
        "array",
        "immutable-array",
        "map",
        "immutable-map",
        "compiled-function",
        "builtin-function",
        "user-function",
    ];
    let samples = vec![
        Value::Undefined,
        Value::Bool(true),
        Value::Int(1),
        Value::Float(1.0),
        Value::Char('a'),
        Value::string("s"),
        Value::bytes(b"b".to_vec()),
        Value::error(Value::Int(1)),
        Value::array(vec![]),
        Value::array(vec![]).make_immutable(),
        Value::map(HashMap::new()),
        Value::map(HashMap::new()).make_immutable(),
    ];
    for value in samples {
        assert!(
            known.contains(&value.type_name()),
            "unknown type name {}",
            value.type_name()
        );
    }
}

#[test]
fn falsiness_truth_table() {
    assert!(Value::Undefined.is_falsy());
    assert!(Value::Bool(false).is_falsy());
    assert!(!Value::Bool(true).is_falsy());
    assert!(Value::Int(0).is_falsy());
    assert!(!Value::Int(1).is_falsy());
    assert!(Value::Float(f64::NAN).is_falsy());
    assert!(!Value::Float(0.0).is_falsy());
    assert!(Value::Char('\0').is_falsy());
    assert!(!Value::Char('a').is_falsy());
    assert!(Value::string("").is_falsy());
    assert!(!Value::string("x").is_falsy());
    assert!(Value::bytes(Vec::new()).is_falsy());
    assert!(Value::error(Value::Int(1)).is_falsy());
    assert!(Value::array(vec![]).is_falsy());
    assert!(!Value::array(vec![Value::Int(1)]).is_falsy());
    assert!(Value::map(HashMap::new()).is_falsy());
}

#[test]
fn nan_is_not_equal_to_itself() {
    assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    assert_eq!(Value::Float(1.5), Value::Float(1.5));
}

#[test]
fn numeric_kinds_do_not_cross_compare() {
    assert_ne!(Value::Int(1), Value::Float(1.0));
    assert_ne!(Value::Int(97), Value::Char('a'));
}

#[test]
fn aggregates_compare_structurally() {
    assert_eq!(
        Value::array(vec![Value::Int(1), Value::string("x")]),
        Value::array(vec![Value::Int(1), Value::string("x")])
    );
    assert_ne!(
        Value::array(vec![Value::Int(1)]),
        Value::array(vec![Value::Int(2)])
    );
    // Mutable and immutable aggregates are distinct kinds.
    assert_ne!(
        Value::array(vec![Value::Int(1)]),
        Value::array(vec![Value::Int(1)]).make_immutable()
    );
}

#[test]
fn errors_compare_by_identity() {
    let e1 = Value::error(Value::Int(5));
    let e2 = Value::error(Value::Int(5));
    assert_eq!(e1, e1.clone());
    assert_ne!(e1, e2);
}

#[test]
fn display_forms() {
    assert_eq!(Value::Undefined.to_string(), "<undefined>");
    assert_eq!(Value::Int(42).to_string(), "42");
    assert_eq!(Value::Float(1.5).to_string(), "1.5");
    assert_eq!(Value::Bool(true).to_string(), "true");
    assert_eq!(Value::Char('a').to_string(), "'a'");
    assert_eq!(Value::string("hi").to_string(), "\"hi\"");
    assert_eq!(
        Value::array(vec![Value::Int(1), Value::string("two")]).to_string(),
        "[1, \"two\"]"
    );
    let mut entries = HashMap::new();
    entries.insert("b".to_string(), Value::Int(2));
    entries.insert("a".to_string(), Value::Int(1));
    assert_eq!(Value::map(entries).to_string(), "{a: 1, b: 2}");
    assert_eq!(Value::error(Value::Int(1)).to_string(), "error: 1");
}

#[test]
fn plain_string_leaves_strings_unquoted() {
    assert_eq!(Value::string("hi").plain_string(), "hi");
    assert_eq!(Value::Int(3).plain_string(), "3");
}

#[test]
fn deep_copy_divorces_aliases() {
    let original = Value::array(vec![Value::array(vec![Value::Int(1)])]);
    let copy = original.deep_copy();
    if let (Value::Array(a), Value::Array(b)) = (&original, &copy) {
        let a_inner = a.borrow()[0].clone();
        if let Value::Array(inner) = &a_inner {
            inner.borrow_mut()[0] = Value::Int(9);
        }
        let b_inner = b.borrow()[0].clone();
        if let Value::Array(inner) = &b_inner {
            assert_eq!(inner.borrow()[0], Value::Int(1));
        }
    } else {
        unreachable!();
    }
}

#[test]
fn immutable_copies_become_mutable_again() {
    let frozen = Value::array(vec![Value::Int(1)]).make_immutable();
    assert!(matches!(frozen.deep_copy(), Value::Array(_)));
}
