use std::collections::HashMap;
use std::rc::Rc;

use rill::bytecode::bytecode::Bytecode;
use rill::bytecode::op_code::{Instructions, OpCode, make};
use rill::bytecode::serialization::file_set_eq;
use rill::modules::ModuleMap;
use rill::runtime::compiled_function::CompiledFunction;
use rill::runtime::value::Value;
use rill::stdlib;
use rill::syntax::source::SourceFileSet;
use rill::syntax::token::Token;

fn concat(instructions: Vec<Instructions>) -> Instructions {
    instructions.into_iter().flatten().collect()
}

fn func(num_locals: usize, num_parameters: usize, instructions: Vec<Instructions>) -> Value {
    Value::Function(Rc::new(CompiledFunction::new(
        concat(instructions),
        num_locals,
        num_parameters,
        false,
        Default::default(),
    )))
}

fn bytecode(instructions: Vec<Instructions>, constants: Vec<Value>) -> Bytecode {
    let mut file_set = SourceFileSet::new();
    file_set.add_file("test", b"a := 1\nb := 2\n");
    Bytecode {
        file_set,
        main_function: Rc::new(CompiledFunction::new(
            concat(instructions),
            0,
            0,
            false,
            Default::default(),
        )),
        constants,
    }
}

fn round_trip(bytecode: &Bytecode, modules: Option<&ModuleMap>) -> Bytecode {
    let mut encoded = Vec::new();
    bytecode.encode(&mut encoded).expect("encode");
    Bytecode::decode(&mut encoded.as_slice(), modules).expect("decode")
}

fn expect_round_trip(original: &Bytecode) {
    let decoded = round_trip(original, None);
    assert!(file_set_eq(&original.file_set, &decoded.file_set));
    assert_eq!(*original.main_function, *decoded.main_function);
    assert_eq!(original.constants, decoded.constants);
}

#[test]
fn empty_bytecode_round_trips() {
    expect_round_trip(&bytecode(vec![], vec![]));
}

#[test]
fn scalar_and_function_constants_round_trip() {
    expect_round_trip(&bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Char('y'),
            Value::Float(93.11),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[3]),
                    make(OpCode::OpSetLocal, &[0]),
                    make(OpCode::OpGetGlobal, &[0]),
                    make(OpCode::OpGetFree, &[0]),
                ],
            ),
            Value::Float(39.2),
            Value::Int(192),
            Value::string("bar"),
            Value::bytes(vec![0u8; 16]),
            Value::Bool(true),
            Value::Undefined,
        ],
    ));
}

#[test]
fn aggregate_constants_round_trip() {
    let mut inner = HashMap::new();
    inner.insert("a".to_string(), Value::Int(1));
    inner.insert("b".to_string(), Value::Undefined);
    inner.insert(
        "c".to_string(),
        Value::ImmutableArray(Rc::new(vec![
            Value::Int(1),
            Value::Bool(false),
            Value::string("x"),
        ])),
    );
    expect_round_trip(&bytecode(
        vec![make(OpCode::OpSuspend, &[])],
        vec![Value::ImmutableMap(Rc::new(inner))],
    ));
}

#[test]
fn source_maps_round_trip() {
    let mut source_map = HashMap::new();
    source_map.insert(0usize, 1usize);
    source_map.insert(3usize, 5usize);
    let mut original = bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1)],
    );
    original.main_function = Rc::new(CompiledFunction::new(
        original.main_function.instructions.clone(),
        0,
        0,
        false,
        source_map.clone(),
    ));
    let decoded = round_trip(&original, None);
    assert_eq!(decoded.main_function.source_map, source_map);
}

#[test]
fn builtin_module_constants_rebind_by_name() {
    let modules = stdlib::get_module_map(&["math"]);
    let math = modules
        .get_builtin_module("math")
        .expect("math module")
        .as_immutable_map("math");
    let original = bytecode(vec![make(OpCode::OpSuspend, &[])], vec![math]);

    let decoded = round_trip(&original, Some(&modules));
    match &decoded.constants[0] {
        Value::ImmutableMap(entries) => {
            assert!(matches!(entries.get("pi"), Some(Value::Float(_))));
            assert!(matches!(entries.get("sqrt"), Some(Value::UserFunction(_))));
        }
        other => panic!("expected immutable map, got {}", other.type_name()),
    }

    // Without a registry to rebind from, decoding must fail rather than
    // produce dead callables.
    let mut encoded = Vec::new();
    original.encode(&mut encoded).expect("encode");
    assert!(Bytecode::decode(&mut encoded.as_slice(), None).is_err());
}

#[test]
fn remove_duplicates_merges_scalars_and_rewrites_operands() {
    let mut b = bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpConstant, &[3]),
            make(OpCode::OpConstant, &[4]),
            make(OpCode::OpConstant, &[5]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(1),
            Value::Int(1),
            Value::Int(2),
            Value::Int(1),
            Value::Int(3),
            Value::Int(3),
        ],
    );
    b.remove_duplicates();
    assert_eq!(
        b.constants,
        vec![Value::Int(1), Value::Int(2), Value::Int(3)]
    );
    assert_eq!(
        b.main_function.instructions,
        concat(vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpSuspend, &[]),
        ])
    );
}

#[test]
fn remove_duplicates_is_idempotent() {
    let mut b = bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(1)],
    );
    b.remove_duplicates();
    let once = b.clone();
    b.remove_duplicates();
    assert_eq!(b.constants, once.constants);
    assert_eq!(b.main_function.instructions, once.main_function.instructions);
}

#[test]
fn function_bodies_deduplicate_recursively() {
    // Two identical function bodies referencing duplicate scalars merge
    // into one constant after their operands are rewritten.
    let body = |idx: usize| {
        vec![
            make(OpCode::OpConstant, &[idx]),
            make(OpCode::OpReturn, &[1]),
        ]
    };
    let mut b = bytecode(
        vec![
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[3]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(5),
            func(0, 0, body(0)),
            Value::Int(5),
            func(0, 0, body(2)),
        ],
    );
    b.remove_duplicates();
    assert_eq!(b.constants.len(), 2);
    assert_eq!(b.constants[0], Value::Int(5));
    assert!(matches!(b.constants[1], Value::Function(_)));
    assert_eq!(
        b.main_function.instructions,
        concat(vec![
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpSuspend, &[]),
        ])
    );
}

#[test]
fn error_constants_never_merge() {
    let mut b = bytecode(
        vec![make(OpCode::OpSuspend, &[])],
        vec![
            Value::error(Value::Int(5)),
            Value::error(Value::Int(5)),
        ],
    );
    b.remove_duplicates();
    assert_eq!(b.constants.len(), 2);
}

#[test]
fn closure_operands_are_rewritten() {
    let mut b = bytecode(
        vec![
            make(OpCode::OpGetLocalPtr, &[0]),
            make(OpCode::OpClosure, &[2, 1]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(1),
            Value::Int(1),
            func(1, 0, vec![make(OpCode::OpReturn, &[0])]),
        ],
    );
    b.remove_duplicates();
    assert_eq!(b.constants.len(), 2);
    assert_eq!(
        b.main_function.instructions,
        concat(vec![
            make(OpCode::OpGetLocalPtr, &[0]),
            make(OpCode::OpClosure, &[1, 1]),
            make(OpCode::OpSuspend, &[]),
        ])
    );
}

#[test]
fn count_objects_is_recursive() {
    assert_eq!(Value::array(vec![]).count_objects(), 1);
    assert_eq!(
        Value::array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::array(vec![Value::Int(3), Value::Int(4), Value::Int(5)]),
        ])
        .count_objects(),
        7
    );
    assert_eq!(Value::Bool(true).count_objects(), 1);
    assert_eq!(Value::bytes(b"foobar".to_vec()).count_objects(), 1);
    assert_eq!(Value::error(Value::Int(5)).count_objects(), 2);
    assert_eq!(Value::Undefined.count_objects(), 1);

    let mut entries = HashMap::new();
    entries.insert("k1".to_string(), Value::Int(1));
    entries.insert("k2".to_string(), Value::Int(2));
    entries.insert(
        "k3".to_string(),
        Value::array(vec![Value::Int(3), Value::Int(4), Value::Int(5)]),
    );
    assert_eq!(Value::map(entries).count_objects(), 7);

    let b = bytecode(
        vec![make(OpCode::OpSuspend, &[])],
        vec![Value::Int(1), Value::array(vec![Value::Int(2)])],
    );
    assert_eq!(b.count_objects(), 3);
}

#[test]
fn compile_cache_validates_the_source_digest() {
    use rill::bytecode::cache;

    let dir = tempfile::tempdir().expect("tempdir");
    let source_path = dir.path().join("prog.rill");
    let source = b"a := 1\n";
    let cache_file = cache::cache_path(&source_path);
    assert_eq!(cache_file, dir.path().join("prog.rillc"));

    let original = bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1)],
    );
    cache::write_cache(&cache_file, source, &original).expect("write cache");

    let cached = cache::load_cache(&cache_file, source, None).expect("cache hit");
    assert_eq!(*cached.main_function, *original.main_function);
    assert_eq!(cached.constants, original.constants);

    // A modified source misses rather than serving stale bytecode.
    assert!(cache::load_cache(&cache_file, b"a := 2\n", None).is_none());
    // A missing file is a miss, not an error.
    assert!(cache::load_cache(&dir.path().join("nope.rillc"), source, None).is_none());
}

#[test]
fn behaviour_is_preserved_across_serialisation() {
    use rill::runtime::vm::VM;

    let mut b = bytecode(
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpBinaryOp, &[Token::Add as usize]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(40), Value::Int(2)],
    );
    b.remove_duplicates();
    let decoded = round_trip(&b, None);

    let mut vm = VM::new(decoded, Vec::new(), -1);
    vm.run().expect("run decoded bytecode");
    let globals = vm.into_globals();
    assert_eq!(globals[0], Value::Int(42));
}
