use rill::runtime::builtins::{BUILTINS, get_builtin_by_name};
use rill::runtime::errors::RuntimeError;
use rill::runtime::value::Value;

fn builtin(name: &str) -> fn(&[Value]) -> Result<Value, RuntimeError> {
    get_builtin_by_name(name)
        .unwrap_or_else(|| panic!("builtin {} not found", name))
        .func
}

fn int_array(values: &[i64]) -> Value {
    Value::array(values.iter().map(|v| Value::Int(*v)).collect())
}

#[test]
fn builtin_indices_are_stable() {
    // GetBuiltin operands bake these indices into compiled bytecode.
    assert_eq!(BUILTINS[0].name, "len");
    assert_eq!(BUILTINS[4].name, "splice");
    assert_eq!(BUILTINS[7].name, "range");
    for (i, b) in BUILTINS.iter().enumerate() {
        assert_eq!(get_builtin_by_name(b.name).unwrap().name, BUILTINS[i].name);
    }
}

#[test]
fn len_counts_elements_and_characters() {
    let len = builtin("len");
    assert_eq!(len(&[int_array(&[1, 2, 3])]).unwrap(), Value::Int(3));
    assert_eq!(len(&[Value::string("héllo")]).unwrap(), Value::Int(5));
    assert_eq!(len(&[]), Err(RuntimeError::WrongNumArguments));
    assert_eq!(
        len(&[Value::Int(1)]),
        Err(RuntimeError::InvalidArgumentType {
            name: "first",
            expected: "array/string/bytes/map",
            found: "int",
        })
    );
}

#[test]
fn delete_removes_map_keys_in_place() {
    let delete = builtin("delete");

    assert_eq!(delete(&[]), Err(RuntimeError::WrongNumArguments));
    assert_eq!(
        delete(&[Value::map(Default::default())]),
        Err(RuntimeError::WrongNumArguments)
    );
    assert_eq!(
        delete(&[Value::string(""), Value::string("")]),
        Err(RuntimeError::InvalidArgumentType {
            name: "first",
            expected: "map",
            found: "string",
        })
    );
    assert_eq!(
        delete(&[Value::map(Default::default()), Value::Int(1)]),
        Err(RuntimeError::InvalidArgumentType {
            name: "second",
            expected: "string",
            found: "int",
        })
    );

    let mut entries = std::collections::HashMap::new();
    entries.insert("key1".to_string(), Value::string("value1"));
    entries.insert("key2".to_string(), Value::Int(10));
    let map = Value::map(entries);
    assert_eq!(
        delete(&[map.clone(), Value::string("key1")]).unwrap(),
        Value::Undefined
    );
    match &map {
        Value::Map(entries) => {
            let entries = entries.borrow();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries.get("key2"), Some(&Value::Int(10)));
        }
        _ => unreachable!(),
    }

    // Deleting a missing key is a no-op.
    assert_eq!(
        delete(&[map, Value::string("nope")]).unwrap(),
        Value::Undefined
    );
}

#[test]
fn splice_removes_inserts_and_returns_the_removed_slice() {
    let splice = builtin("splice");

    assert_eq!(splice(&[]), Err(RuntimeError::WrongNumArguments));
    assert_eq!(
        splice(&[Value::map(Default::default())]),
        Err(RuntimeError::InvalidArgumentType {
            name: "first",
            expected: "array",
            found: "map",
        })
    );
    assert_eq!(
        splice(&[int_array(&[]), Value::string("")]),
        Err(RuntimeError::InvalidArgumentType {
            name: "second",
            expected: "int",
            found: "string",
        })
    );
    assert_eq!(
        splice(&[int_array(&[]), Value::Int(-1)]),
        Err(RuntimeError::IndexOutOfBounds)
    );
    assert_eq!(
        splice(&[int_array(&[0, 1, 2]), Value::Int(0), Value::Int(-1)]),
        Err(RuntimeError::IndexOutOfBounds)
    );

    // insert with zero delete count
    let arr = int_array(&[0, 1, 2]);
    let removed = splice(&[
        arr.clone(),
        Value::Int(1),
        Value::Int(0),
        Value::string("c"),
        Value::string("d"),
    ])
    .unwrap();
    assert_eq!(removed, int_array(&[]));
    assert_eq!(
        arr,
        Value::array(vec![
            Value::Int(0),
            Value::string("c"),
            Value::string("d"),
            Value::Int(1),
            Value::Int(2),
        ])
    );

    // insert with delete
    let arr = int_array(&[0, 1, 2]);
    let removed = splice(&[
        arr.clone(),
        Value::Int(1),
        Value::Int(1),
        Value::string("c"),
    ])
    .unwrap();
    assert_eq!(removed, int_array(&[1]));
    assert_eq!(
        arr,
        Value::array(vec![
            Value::Int(0),
            Value::string("c"),
            Value::Int(2),
        ])
    );

    // delete-all with an oversized count is clamped
    let arr = int_array(&[0, 1, 2]);
    let removed = splice(&[arr.clone(), Value::Int(0), Value::Int(5)]).unwrap();
    assert_eq!(removed, int_array(&[0, 1, 2]));
    assert_eq!(arr, int_array(&[]));

    // no start: removes everything
    let arr = int_array(&[0, 1, 2]);
    let removed = splice(&[arr.clone()]).unwrap();
    assert_eq!(removed, int_array(&[0, 1, 2]));
    assert_eq!(arr, int_array(&[]));

    // pop without a count
    let arr = int_array(&[0, 1, 2]);
    let removed = splice(&[arr.clone(), Value::Int(2)]).unwrap();
    assert_eq!(removed, int_array(&[2]));
    assert_eq!(arr, int_array(&[0, 1]));
}

#[test]
fn range_requires_a_positive_step() {
    let range = builtin("range");

    assert_eq!(range(&[]), Err(RuntimeError::WrongNumArguments));
    assert_eq!(
        range(&[Value::Int(0)]),
        Err(RuntimeError::WrongNumArguments)
    );
    assert_eq!(
        range(&[Value::string(""), Value::Int(0)]),
        Err(RuntimeError::InvalidArgumentType {
            name: "start",
            expected: "int",
            found: "string",
        })
    );
    assert_eq!(
        range(&[Value::Int(0), Value::Int(0), Value::Int(0)]),
        Err(RuntimeError::InvalidRangeStep)
    );
    assert_eq!(
        range(&[Value::Int(0), Value::Int(10), Value::Int(-2)]),
        Err(RuntimeError::InvalidRangeStep)
    );

    assert_eq!(range(&[Value::Int(0), Value::Int(0)]).unwrap(), int_array(&[]));
    assert_eq!(
        range(&[Value::Int(0), Value::Int(5)]).unwrap(),
        int_array(&[0, 1, 2, 3, 4])
    );
    // Direction is inferred from the bounds, never from the step.
    assert_eq!(
        range(&[Value::Int(5), Value::Int(0)]).unwrap(),
        int_array(&[5, 4, 3, 2, 1])
    );
    assert_eq!(
        range(&[Value::Int(0), Value::Int(10), Value::Int(3)]).unwrap(),
        int_array(&[0, 3, 6, 9])
    );
}

#[test]
fn append_returns_a_new_array() {
    let append = builtin("append");
    let arr = int_array(&[1]);
    let extended = append(&[arr.clone(), Value::Int(2)]).unwrap();
    assert_eq!(extended, int_array(&[1, 2]));
    assert_eq!(arr, int_array(&[1]));
}

#[test]
fn copy_is_deep() {
    let copy = builtin("copy");
    let inner = int_array(&[1]);
    let arr = Value::array(vec![inner.clone()]);
    let copied = copy(&[arr.clone()]).unwrap();

    // Mutating the copy leaves the original untouched.
    if let Value::Array(elements) = &copied {
        if let Value::Array(inner_copy) = &elements.borrow()[0] {
            inner_copy.borrow_mut()[0] = Value::Int(9);
        }
    }
    assert_eq!(inner, int_array(&[1]));
}

#[test]
fn conversions_accept_defaults() {
    let int = builtin("int");
    assert_eq!(int(&[Value::string("42")]).unwrap(), Value::Int(42));
    assert_eq!(int(&[Value::Float(1.9)]).unwrap(), Value::Int(1));
    assert_eq!(int(&[Value::Char('a')]).unwrap(), Value::Int(97));
    assert_eq!(int(&[Value::string("nope")]).unwrap(), Value::Undefined);
    assert_eq!(
        int(&[Value::string("nope"), Value::Int(-1)]).unwrap(),
        Value::Int(-1)
    );

    let float = builtin("float");
    assert_eq!(float(&[Value::Int(2)]).unwrap(), Value::Float(2.0));

    let string = builtin("string");
    assert_eq!(string(&[Value::Int(42)]).unwrap(), Value::string("42"));
    // string(undefined) falls back to the default, not "<undefined>".
    assert_eq!(string(&[Value::Undefined]).unwrap(), Value::Undefined);

    let char_fn = builtin("char");
    assert_eq!(char_fn(&[Value::Int(97)]).unwrap(), Value::Char('a'));

    let bytes = builtin("bytes");
    assert_eq!(bytes(&[Value::Int(4)]).unwrap(), Value::bytes(vec![0u8; 4]));
    assert_eq!(
        bytes(&[Value::string("ab")]).unwrap(),
        Value::bytes(b"ab".to_vec())
    );

    let bool_fn = builtin("bool");
    assert_eq!(bool_fn(&[Value::Int(0)]).unwrap(), Value::Bool(false));
    assert_eq!(bool_fn(&[Value::string("x")]).unwrap(), Value::Bool(true));
}

#[test]
fn type_predicates_match_their_variants() {
    assert_eq!(
        builtin("type_name")(&[Value::Int(1)]).unwrap(),
        Value::string("int")
    );
    assert_eq!(
        builtin("is_int")(&[Value::Int(1)]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        builtin("is_array")(&[int_array(&[])]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        builtin("is_immutable_array")(&[int_array(&[]).make_immutable()]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        builtin("is_array")(&[int_array(&[]).make_immutable()]).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        builtin("is_iterable")(&[Value::string("x")]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        builtin("is_callable")(&[Value::Builtin(BUILTINS[0])]).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        builtin("is_undefined")(&[Value::Undefined]).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn immutable_builtin_freezes_aggregates() {
    let immutable = builtin("immutable");
    let frozen = immutable(&[int_array(&[1])]).unwrap();
    assert!(matches!(frozen, Value::ImmutableArray(_)));
    // Non-aggregates pass through unchanged.
    assert_eq!(immutable(&[Value::Int(1)]).unwrap(), Value::Int(1));
}

#[test]
fn error_builtin_wraps_payloads() {
    let error = builtin("error");
    let err = error(&[Value::string("boom")]).unwrap();
    assert!(matches!(err, Value::Error(_)));
    assert_eq!(err.to_string(), "error: \"boom\"");
}

#[test]
fn format_verbs() {
    let format = builtin("format");
    assert_eq!(
        format(&[
            Value::string("%s is %d (%t)"),
            Value::string("n"),
            Value::Int(42),
            Value::Bool(true),
        ])
        .unwrap(),
        Value::string("n is 42 (true)")
    );
    assert_eq!(
        format(&[Value::string("100%%")]).unwrap(),
        Value::string("100%")
    );
    assert_eq!(
        format(&[Value::string("%v"), int_array(&[1, 2])]).unwrap(),
        Value::string("[1, 2]")
    );
    assert_eq!(
        format(&[Value::string("%x"), Value::Int(255)]).unwrap(),
        Value::string("ff")
    );
    assert_eq!(format(&[]), Err(RuntimeError::WrongNumArguments));
}
