use rill::runtime::value::Value;
use rill::{Engine, Scope};

fn run(script: &str) -> Scope {
    let scope = Scope::new();
    let engine = Engine::new();
    engine
        .run_with_scope(&scope, script)
        .unwrap_or_else(|e| panic!("run failed for {:?}: {}", script, e));
    scope
}

fn run_err(script: &str) -> String {
    let engine = Engine::new();
    engine
        .run(script)
        .expect_err("expected failure")
        .to_string()
}

#[test]
fn globals_accumulate_like_a_repl() {
    let scope = run("a := 1; b := 2; a += b");
    assert_eq!(scope.get("a"), Value::Int(3));
    assert_eq!(scope.get("b"), Value::Int(2));
}

#[test]
fn scope_variables_seed_the_globals() {
    let scope = Scope::new();
    scope.set("base", Value::Int(40));
    let engine = Engine::new();
    engine
        .run_with_scope(&scope, "out := base + 2")
        .expect("run");
    assert_eq!(scope.get("out"), Value::Int(42));
}

#[test]
fn closures_capture_across_levels() {
    let scope = run("out := func(a) { return func(b) { return func(c) { return a + b + c } } }(1)(2)(3)");
    assert_eq!(scope.get("out"), Value::Int(6));
}

#[test]
fn captured_variables_share_one_cell() {
    let scope = run(
        "
out := func() {
	n := 0
	inc := func() { n += 1 }
	inc()
	inc()
	return n
}()
",
    );
    assert_eq!(scope.get("out"), Value::Int(2));
}

#[test]
fn closure_outlives_its_defining_frame() {
    let scope = run(
        "
counter := func() {
	n := 0
	return func() { n += 1; return n }
}()
a := counter()
b := counter()
",
    );
    assert_eq!(scope.get("a"), Value::Int(1));
    assert_eq!(scope.get("b"), Value::Int(2));
}

#[test]
fn dead_code_after_return_is_not_executed() {
    let scope = run("out := func() { return 5; x := never_called() }()");
    assert_eq!(scope.get("out"), Value::Int(5));
}

#[test]
fn short_circuit_skips_the_right_operand() {
    let scope = run("a := 0; out := a == 0 && a != 1 || a < 1");
    assert_eq!(scope.get("out"), Value::Bool(true));

    // The right operand of && never runs when the left is falsy.
    let scope = run("hits := 0; bump := func() { hits += 1; return true }; false && bump(); out := hits");
    assert_eq!(scope.get("out"), Value::Int(0));
}

#[test]
fn if_else_and_loops() {
    let scope = run(
        "
sum := 0
for i := 0; i < 10; i++ {
	if i % 2 == 0 {
		sum += i
	}
}
",
    );
    assert_eq!(scope.get("sum"), Value::Int(20));

    let scope = run(
        "
sum := 0
for i := 0; ; i++ {
	if i >= 5 { break }
	if i == 2 { continue }
	sum += i
}
",
    );
    assert_eq!(scope.get("sum"), Value::Int(8));
}

#[test]
fn for_in_iterates_arrays_and_maps() {
    let scope = run(
        "
total := 0
keys := 0
for i, v in [10, 20, 30] {
	total += i + v
}
for k, v in {a: 1, b: 2} {
	keys += len(k)
	total += v
}
",
    );
    assert_eq!(scope.get("total"), Value::Int(66));
    assert_eq!(scope.get("keys"), Value::Int(2));
}

#[test]
fn ternary_and_selectors() {
    let scope = run(
        "
m := {inner: {x: 1}}
m.inner.x = 5
m.list = [1, 2]
m.list[0] = 9
a := m.inner.x > 4 ? \"big\" : \"small\"
b := m.list[0]
",
    );
    assert_eq!(scope.get("a"), Value::string("big"));
    assert_eq!(scope.get("b"), Value::Int(9));
}

#[test]
fn compound_selector_assignment() {
    let scope = run("m := {n: 1}; m.n += 41; out := m.n");
    assert_eq!(scope.get("out"), Value::Int(42));
}

#[test]
fn arrays_alias_on_assignment() {
    let scope = run("a := [1, 2]; b := a; b[0] = 9; out := a[0]");
    assert_eq!(scope.get("out"), Value::Int(9));
}

#[test]
fn variadic_functions_collect_the_tail() {
    let scope = run(
        "
f := func(first, ...rest) { return [first, len(rest)] }
a := f(1)
b := f(1, 2, 3)
c := f([4, 5, 6]...)
",
    );
    assert_eq!(
        scope.get("a"),
        Value::array(vec![Value::Int(1), Value::Int(0)])
    );
    assert_eq!(
        scope.get("b"),
        Value::array(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        scope.get("c"),
        Value::array(vec![Value::Int(4), Value::Int(2)])
    );
}

#[test]
fn recursive_functions_run() {
    let scope = run(
        "
fib := func(n) {
	if n < 2 { return n }
	return fib(n-1) + fib(n-2)
}
out := fib(15)
",
    );
    assert_eq!(scope.get("out"), Value::Int(610));
}

#[test]
fn local_recursion_through_a_closure_cell() {
    let scope = run(
        "
out := func() {
	fact := func(n) {
		if n <= 1 { return 1 }
		return n * fact(n-1)
	}
	return fact(5)
}()
",
    );
    assert_eq!(scope.get("out"), Value::Int(120));
}

#[test]
fn runtime_errors_carry_positions() {
    let err = run_err("a := 1\nb := a / 0");
    assert_eq!(
        err,
        "Runtime Error: division by zero\n\tat (main):2:6"
    );
}

#[test]
fn error_values_are_catchable_data() {
    let scope = run(
        "
e := error(\"boom\")
caught := is_error(e)
payload := e.value
",
    );
    assert_eq!(scope.get("caught"), Value::Bool(true));
    assert_eq!(scope.get("payload"), Value::string("boom"));
}

#[test]
fn error_equality_is_identity_based() {
    let scope = run(
        "
a := error(1)
b := error(1)
same := a == a
different := a == b
",
    );
    assert_eq!(scope.get("same"), Value::Bool(true));
    assert_eq!(scope.get("different"), Value::Bool(false));
}

#[test]
fn deep_recursion_overflows_the_frame_stack() {
    let err = run_err("f := func() { return f() }; f()");
    assert!(err.contains("stack overflow"), "got {:?}", err);
}

#[test]
fn allocation_ceiling_is_enforced() {
    let engine = {
        let mut engine = Engine::new();
        engine.set_max_allocs(10);
        engine
    };
    let err = engine
        .run("for i := 0; i < 100; i++ { x := [i] }")
        .expect_err("limit")
        .to_string();
    assert!(err.contains("allocation limit exceeded"), "got {:?}", err);
}

#[test]
fn constant_objects_ceiling_is_enforced_at_compile_time() {
    let mut engine = Engine::new();
    engine.set_max_const_objects(2);
    let err = engine
        .run("a := [1, 2, 3, 4]")
        .expect_err("limit")
        .to_string();
    assert_eq!(err, "exceeding constant objects limit: 4");
}

#[test]
fn abort_signal_cancels_a_long_run() {
    let engine = Engine::new();
    let scope = Scope::new();
    let mut compiled = engine
        .compile(&scope, "(main)", "for {}")
        .expect("compile");
    compiled.abort_signal().trigger();
    let err = compiled.run().expect_err("aborted").to_string();
    assert!(err.contains("VM aborted"), "got {:?}", err);
}

#[test]
fn underscore_names_and_callables_stay_out_of_the_scope() {
    let scope = run("_hidden := 1; visible := 2; f := func() { return 3 }");
    assert!(!scope.contains("_hidden"));
    assert!(!scope.contains("f"));
    assert_eq!(scope.get("visible"), Value::Int(2));

    let all = scope.get_all();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0], ("visible".to_string(), Value::Int(2)));
}

#[test]
fn wrong_arity_reports_want_and_got() {
    let err = run_err("f := func(a, b) { return a }; f(1)");
    assert!(
        err.contains("wrong number of arguments: want=2, got=1"),
        "got {:?}",
        err
    );
}

#[test]
fn string_and_char_concatenation() {
    let scope = run("out := \"ca\" + 'f' + 'é'");
    assert_eq!(scope.get("out"), Value::string("café"));
}

#[test]
fn integer_ops_wrap_like_the_host() {
    let scope = run("out := 9223372036854775807 + 1");
    assert_eq!(scope.get("out"), Value::Int(i64::MIN));
}

#[test]
fn undefined_literal_and_truthiness() {
    let scope = run(
        "
a := undefined
b := is_undefined(a)
c := !a
d := bool(\"\")
",
    );
    assert_eq!(scope.get("b"), Value::Bool(true));
    assert_eq!(scope.get("c"), Value::Bool(true));
    assert_eq!(scope.get("d"), Value::Bool(false));
}
