use std::rc::Rc;

use crate::bytecode::bytecode::Bytecode;
use crate::bytecode::compiler::Compiler;
use crate::bytecode::op_code::{Instructions, OpCode, make};
use crate::bytecode::symbol_table::SymbolTable;
use crate::modules::ModuleMap;
use crate::runtime::builtins::BUILTINS;
use crate::runtime::compiled_function::CompiledFunction;
use crate::runtime::value::Value;
use crate::syntax::parser::parse_file;
use crate::syntax::source::SourceFileSet;

fn compile(src: &str) -> Result<Bytecode, String> {
    let mut file_set = SourceFileSet::new();
    let file_index = file_set.add_file("test", src.as_bytes());
    let file = parse_file(&file_set.files[file_index], src.as_bytes())
        .map_err(|e| e.to_string())?;

    let mut symbol_table = SymbolTable::new();
    for (idx, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(idx, builtin.name);
    }
    let mut compiler = Compiler::new(
        file_set,
        file_index,
        symbol_table,
        Vec::new(),
        ModuleMap::new(),
    );
    compiler.compile(&file).map_err(|e| e.to_string())?;
    let (mut bytecode, _) = compiler.finish();
    bytecode.remove_duplicates();
    Ok(bytecode)
}

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

fn expect_compile(src: &str, instructions: Vec<Instructions>, constants: Vec<Value>) {
    let bytecode = compile(src).expect("compile");
    let expected = concat(instructions);
    assert_eq!(
        bytecode.main_function.instructions,
        expected,
        "instructions mismatch for {:?}:\n got:\n{}\nwant:\n{}",
        src,
        bytecode.format_instructions().join("\n"),
        crate::bytecode::op_code::format_instructions(&expected).join("\n"),
    );
    assert_eq!(
        bytecode.constants, constants,
        "constants mismatch for {:?}",
        src
    );
}

fn expect_compile_error(src: &str, expected: &str) {
    let err = compile(src).expect_err("expected compile error");
    assert!(
        err.contains(expected),
        "expected error containing {:?}, got {:?}",
        expected,
        err
    );
}

use crate::syntax::token::Token;

#[test]
fn binary_expressions() {
    expect_compile(
        "1 + 2",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpBinaryOp, &[Token::Add as usize]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2)],
    );

    expect_compile(
        "1; 2",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2)],
    );

    expect_compile(
        "1 < 2",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpBinaryOp, &[Token::Less as usize]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2)],
    );

    expect_compile(
        "1 == 2",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpEqual, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2)],
    );
}

#[test]
fn boolean_and_unary_expressions() {
    expect_compile(
        "true",
        vec![
            make(OpCode::OpTrue, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![],
    );

    expect_compile(
        "!false",
        vec![
            make(OpCode::OpFalse, &[]),
            make(OpCode::OpLNot, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![],
    );

    expect_compile(
        "-1",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpMinus, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1)],
    );
}

#[test]
fn scalar_constants_deduplicate() {
    expect_compile(
        "[1, 2, 3][1 + 1]",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpArray, &[3]),
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpBinaryOp, &[Token::Add as usize]),
            make(OpCode::OpIndex, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2), Value::Int(3)],
    );
}

#[test]
fn array_and_map_literals() {
    expect_compile(
        "[]",
        vec![
            make(OpCode::OpArray, &[0]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![],
    );

    expect_compile(
        "{a: 2, b: 4}",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpConstant, &[3]),
            make(OpCode::OpMap, &[4]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::string("a"),
            Value::Int(2),
            Value::string("b"),
            Value::Int(4),
        ],
    );
}

#[test]
fn slice_expressions() {
    expect_compile(
        "[1, 2, 3][:]",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpArray, &[3]),
            make(OpCode::OpNull, &[]),
            make(OpCode::OpNull, &[]),
            make(OpCode::OpSliceIndex, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2), Value::Int(3)],
    );

    expect_compile(
        "[1, 2, 3][:2]",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpArray, &[3]),
            make(OpCode::OpNull, &[]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpSliceIndex, &[]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![Value::Int(1), Value::Int(2), Value::Int(3)],
    );
}

#[test]
fn functions_and_calls() {
    expect_compile(
        "func() { return 5 + 10 }",
        vec![
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(5),
            Value::Int(10),
            func(
                0,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),
                    make(OpCode::OpConstant, &[1]),
                    make(OpCode::OpBinaryOp, &[Token::Add as usize]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
        ],
    );

    expect_compile(
        "func() { 5 + 10 }",
        vec![
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(5),
            Value::Int(10),
            func(
                0,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),
                    make(OpCode::OpConstant, &[1]),
                    make(OpCode::OpBinaryOp, &[Token::Add as usize]),
                    make(OpCode::OpPop, &[]),
                    make(OpCode::OpReturn, &[0]),
                ],
            ),
        ],
    );

    expect_compile(
        "func() { }",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![func(0, 0, vec![make(OpCode::OpReturn, &[0])])],
    );

    expect_compile(
        "func() { 24 }()",
        vec![
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpCall, &[0, 0]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(24),
            func(
                0,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),
                    make(OpCode::OpPop, &[]),
                    make(OpCode::OpReturn, &[0]),
                ],
            ),
        ],
    );
}

#[test]
fn call_with_spread() {
    expect_compile(
        "f1 := func(a) { return a }; f1([1, 2]...);",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpGetGlobal, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpConstant, &[2]),
            make(OpCode::OpArray, &[2]),
            make(OpCode::OpCall, &[1, 1]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            func(
                1,
                1,
                vec![
                    make(OpCode::OpGetLocal, &[0]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
            Value::Int(1),
            Value::Int(2),
        ],
    );
}

#[test]
fn globals_and_function_capture() {
    expect_compile(
        "n := 55; func() { n };",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(55),
            func(
                0,
                0,
                vec![
                    make(OpCode::OpGetGlobal, &[0]),
                    make(OpCode::OpPop, &[]),
                    make(OpCode::OpReturn, &[0]),
                ],
            ),
        ],
    );

    expect_compile(
        "func() { n := 55; return n }",
        vec![
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(55),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),
                    make(OpCode::OpDefineLocal, &[0]),
                    make(OpCode::OpGetLocal, &[0]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
        ],
    );
}

#[test]
fn closures_capture_through_every_level() {
    expect_compile(
        "
g := 55;

func() {
	a := 66;

	return func() {
		b := 77;

		return func() {
			c := 88;

			return g + a + b + c;
		}
	}
}",
        vec![
            make(OpCode::OpConstant, &[0]),
            make(OpCode::OpSetGlobal, &[0]),
            make(OpCode::OpConstant, &[6]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(55),
            Value::Int(66),
            Value::Int(77),
            Value::Int(88),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[3]),
                    make(OpCode::OpDefineLocal, &[0]),
                    make(OpCode::OpGetGlobal, &[0]),
                    make(OpCode::OpGetFree, &[0]),
                    make(OpCode::OpBinaryOp, &[Token::Add as usize]),
                    make(OpCode::OpGetFree, &[1]),
                    make(OpCode::OpBinaryOp, &[Token::Add as usize]),
                    make(OpCode::OpGetLocal, &[0]),
                    make(OpCode::OpBinaryOp, &[Token::Add as usize]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[2]),
                    make(OpCode::OpDefineLocal, &[0]),
                    make(OpCode::OpGetFreePtr, &[0]),
                    make(OpCode::OpGetLocalPtr, &[0]),
                    make(OpCode::OpClosure, &[4, 2]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[1]),
                    make(OpCode::OpDefineLocal, &[0]),
                    make(OpCode::OpGetLocalPtr, &[0]),
                    make(OpCode::OpClosure, &[5, 1]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
        ],
    );
}

#[test]
fn three_clause_for_loop() {
    expect_compile(
        "for i:=0; i<10; i++ {}",
        vec![
            make(OpCode::OpConstant, &[0]),      // 0000
            make(OpCode::OpSetGlobal, &[0]),     // 0003
            make(OpCode::OpGetGlobal, &[0]),     // 0006
            make(OpCode::OpConstant, &[1]),      // 0009
            make(OpCode::OpBinaryOp, &[Token::Less as usize]), // 0012
            make(OpCode::OpJumpFalsy, &[31]),    // 0014
            make(OpCode::OpGetGlobal, &[0]),     // 0017
            make(OpCode::OpConstant, &[2]),      // 0020
            make(OpCode::OpBinaryOp, &[Token::Add as usize]), // 0023
            make(OpCode::OpSetGlobal, &[0]),     // 0025
            make(OpCode::OpJump, &[6]),          // 0028
            make(OpCode::OpSuspend, &[]),        // 0031
        ],
        vec![Value::Int(0), Value::Int(10), Value::Int(1)],
    );
}

#[test]
fn for_in_over_map() {
    expect_compile(
        "m := {}; for k, v in m {}",
        vec![
            make(OpCode::OpMap, &[0]),           // 0000
            make(OpCode::OpSetGlobal, &[0]),     // 0003
            make(OpCode::OpGetGlobal, &[0]),     // 0006
            make(OpCode::OpIteratorInit, &[]),   // 0009
            make(OpCode::OpSetGlobal, &[1]),     // 0010
            make(OpCode::OpGetGlobal, &[1]),     // 0013
            make(OpCode::OpIteratorNext, &[]),   // 0016
            make(OpCode::OpJumpFalsy, &[37]),    // 0017
            make(OpCode::OpGetGlobal, &[1]),     // 0020
            make(OpCode::OpIteratorKey, &[]),    // 0023
            make(OpCode::OpSetGlobal, &[2]),     // 0024
            make(OpCode::OpGetGlobal, &[1]),     // 0027
            make(OpCode::OpIteratorValue, &[]),  // 0030
            make(OpCode::OpSetGlobal, &[3]),     // 0031
            make(OpCode::OpJump, &[13]),         // 0034
            make(OpCode::OpSuspend, &[]),        // 0037
        ],
        vec![],
    );
}

#[test]
fn short_circuit_chains() {
    expect_compile(
        "a := 0; a == 0 && a != 1 || a < 1",
        vec![
            make(OpCode::OpConstant, &[0]),      // 0000
            make(OpCode::OpSetGlobal, &[0]),     // 0003
            make(OpCode::OpGetGlobal, &[0]),     // 0006
            make(OpCode::OpConstant, &[0]),      // 0009
            make(OpCode::OpEqual, &[]),          // 0012
            make(OpCode::OpAndJump, &[23]),      // 0013
            make(OpCode::OpGetGlobal, &[0]),     // 0016
            make(OpCode::OpConstant, &[1]),      // 0019
            make(OpCode::OpNotEqual, &[]),       // 0022
            make(OpCode::OpOrJump, &[34]),       // 0023
            make(OpCode::OpGetGlobal, &[0]),     // 0026
            make(OpCode::OpConstant, &[1]),      // 0029
            make(OpCode::OpBinaryOp, &[Token::Less as usize]), // 0032
            make(OpCode::OpPop, &[]),            // 0034
            make(OpCode::OpSuspend, &[]),        // 0035
        ],
        vec![Value::Int(0), Value::Int(1)],
    );
}

#[test]
fn dead_code_is_trimmed_after_return() {
    expect_compile(
        "
func() {
	a := 4
	return a

	b := 5
	c := a
	return b
}",
        vec![
            make(OpCode::OpConstant, &[1]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(4),
            func(
                1,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),
                    make(OpCode::OpDefineLocal, &[0]),
                    make(OpCode::OpGetLocal, &[0]),
                    make(OpCode::OpReturn, &[1]),
                ],
            ),
        ],
    );
}

#[test]
fn if_with_init_in_function_gives_each_block_local_its_own_slot() {
    expect_compile(
        "
func() {
	if a := 1; a {
		a = 2
		b := a
	} else {
		a = 3
		b := a
	}
}",
        vec![
            make(OpCode::OpConstant, &[3]),
            make(OpCode::OpPop, &[]),
            make(OpCode::OpSuspend, &[]),
        ],
        vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            func(
                3,
                0,
                vec![
                    make(OpCode::OpConstant, &[0]),    // 0000
                    make(OpCode::OpDefineLocal, &[0]), // 0003
                    make(OpCode::OpGetLocal, &[0]),    // 0005
                    make(OpCode::OpJumpFalsy, &[22]),  // 0007
                    make(OpCode::OpConstant, &[1]),    // 0010
                    make(OpCode::OpSetLocal, &[0]),    // 0013
                    make(OpCode::OpGetLocal, &[0]),    // 0015
                    make(OpCode::OpDefineLocal, &[1]), // 0017
                    make(OpCode::OpJump, &[31]),       // 0019
                    make(OpCode::OpConstant, &[2]),    // 0022
                    make(OpCode::OpSetLocal, &[0]),    // 0025
                    make(OpCode::OpGetLocal, &[0]),    // 0027
                    make(OpCode::OpDefineLocal, &[2]), // 0029
                    make(OpCode::OpReturn, &[0]),      // 0031
                ],
            ),
        ],
    );
}

#[test]
fn compile_errors_report_file_positions() {
    expect_compile_error(
        "import(\"user1\")",
        "Compile Error: module 'user1' not found\n\tat test:1:1",
    );
    expect_compile_error("import(\"\")", "empty module name");
    expect_compile_error("a = 1", "Compile Error: unresolved reference 'a'\n\tat test:1:1");
    expect_compile_error("a := a", "Compile Error: unresolved reference 'a'\n\tat test:1:6");
    expect_compile_error(
        "a, b := 1, 2",
        "Compile Error: tuple assignment not allowed\n\tat test:1:1",
    );
    expect_compile_error("a.b := 1", "not allowed with selector");
    expect_compile_error(
        "a:=1; a:=3",
        "Compile Error: 'a' redeclared in this block\n\tat test:1:7",
    );
    expect_compile_error(
        "return 5",
        "Compile Error: return not allowed outside function\n\tat test:1:1",
    );
    expect_compile_error(
        "func() { break }",
        "Compile Error: break not allowed outside loop\n\tat test:1:10",
    );
    expect_compile_error(
        "func() { continue }",
        "Compile Error: continue not allowed outside loop\n\tat test:1:10",
    );
    expect_compile_error(
        "func() { export 5 }",
        "Compile Error: export not allowed inside function\n\tat test:1:10",
    );
}

#[derive(Clone, Default)]
struct SharedBuf(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

impl std::io::Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn trace_writer_records_emitted_instructions() {
    let src = "1 + 2";
    let mut file_set = SourceFileSet::new();
    let file_index = file_set.add_file("test", src.as_bytes());
    let file = parse_file(&file_set.files[file_index], src.as_bytes()).expect("parse");
    let mut compiler = Compiler::new(
        file_set,
        file_index,
        SymbolTable::new(),
        Vec::new(),
        ModuleMap::new(),
    );
    let trace = SharedBuf::default();
    compiler.set_trace(Some(Box::new(trace.clone())));
    compiler.compile(&file).expect("compile");
    let listing = String::from_utf8(trace.0.borrow().clone()).expect("utf8 trace");
    assert!(listing.contains("CONST"), "got {:?}", listing);
    assert!(listing.contains("BINARYOP"), "got {:?}", listing);
    assert!(listing.contains("SUSPEND"), "got {:?}", listing);
}

#[test]
fn parse_errors_aggregate_with_summary() {
    let err = compile("@ @ @ @ @ @ @ @ @ @ @ @ @").expect_err("parse failure");
    assert!(
        err.starts_with("Parse Error: illegal character U+0040 '@'\n\tat test:1:1"),
        "got {:?}",
        err
    );
    assert!(err.ends_with("(and 10 more errors)"), "got {:?}", err);
}
