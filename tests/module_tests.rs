use std::io::Write;

use rill::modules::{BuiltinModule, ModuleMap};
use rill::runtime::value::Value;
use rill::stdlib;
use rill::{Engine, Scope};

fn engine_with(modules: ModuleMap) -> Engine {
    let mut engine = Engine::new();
    engine.set_imports(modules);
    engine
}

#[test]
fn builtin_module_attributes_resolve_through_selectors() {
    let engine = engine_with(stdlib::get_module_map(&["math"]));
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "math := import(\"math\")\nout := math.sqrt(16.0)")
        .expect("run");
    assert_eq!(scope.get("out"), Value::Float(4.0));
}

#[test]
fn text_and_encoding_modules() {
    let engine = engine_with(stdlib::get_module_map(&["text", "base64", "hex", "json"]));
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            r#"
text := import("text")
b64 := import("base64")
hex := import("hex")
json := import("json")
upper := text.to_upper("abc")
parts := len(text.split("a,b,c", ","))
enc := b64.encode("hi")
h := hex.encode("hi")
decoded := json.decode("{\"n\": 3}")
n := decoded.n
"#,
        )
        .expect("run");
    assert_eq!(scope.get("upper"), Value::string("ABC"));
    assert_eq!(scope.get("parts"), Value::Int(3));
    assert_eq!(scope.get("enc"), Value::string("aGk="));
    assert_eq!(scope.get("h"), Value::string("6869"));
    assert_eq!(scope.get("n"), Value::Int(3));
}

#[test]
fn text_regexp_surface() {
    let engine = engine_with(stdlib::get_module_map(&["text"]));
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            r#"
text := import("text")
replaced := text.re_replace("a+", "baaac", "-")
matched := text.re_match("^b.*c$", "baaac")
parts := len(text.re_split(",", "a,b,c"))
found := text.re_find("(b)(c?)", "abc")
first := found[0][0]
whole := first.text
begin := first.begin
re := text.re_compile("o+")
compiled_hit := re.match("foo")
compiled_sub := re.replace("foo", "0")
none := is_undefined(text.re_find("z+", "abc"))
bad := is_error(text.re_compile("("))
"#,
        )
        .expect("run");
    assert_eq!(scope.get("replaced"), Value::string("b-c"));
    assert_eq!(scope.get("matched"), Value::Bool(true));
    assert_eq!(scope.get("parts"), Value::Int(3));
    assert_eq!(scope.get("whole"), Value::string("bc"));
    assert_eq!(scope.get("begin"), Value::Int(1));
    assert_eq!(scope.get("compiled_hit"), Value::Bool(true));
    assert_eq!(scope.get("compiled_sub"), Value::string("f0"));
    assert_eq!(scope.get("none"), Value::Bool(true));
    assert_eq!(scope.get("bad"), Value::Bool(true));
}

#[test]
fn text_formatting_and_parsing() {
    let engine = engine_with(stdlib::get_module_map(&["text"]));
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            r#"
text := import("text")
sub := text.substr("héllo", 1, 3)
padded := text.pad_left("7", 3, "0")
right := text.pad_right("ab", 4, ".")
hex := text.format_int(255, 16)
back := text.parse_int("ff", 16)
auto := text.parse_int("0x1f", 0)
b := text.parse_bool("true")
f := text.format_float(1.5, 2)
n := text.count("cheese", "e")
fold := text.equal_fold("Go", "GO")
last := text.last_index("go gopher", "go")
num := text.atoi("42")
s42 := text.itoa(42)
"#,
        )
        .expect("run");
    assert_eq!(scope.get("sub"), Value::string("él"));
    assert_eq!(scope.get("padded"), Value::string("007"));
    assert_eq!(scope.get("right"), Value::string("ab.."));
    assert_eq!(scope.get("hex"), Value::string("ff"));
    assert_eq!(scope.get("back"), Value::Int(255));
    assert_eq!(scope.get("auto"), Value::Int(31));
    assert_eq!(scope.get("b"), Value::Bool(true));
    assert_eq!(scope.get("f"), Value::string("1.50"));
    assert_eq!(scope.get("n"), Value::Int(3));
    assert_eq!(scope.get("fold"), Value::Bool(true));
    assert_eq!(scope.get("last"), Value::Int(3));
    assert_eq!(scope.get("num"), Value::Int(42));
    assert_eq!(scope.get("s42"), Value::string("42"));
}

#[test]
fn os_module_environment_and_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = engine_with(stdlib::get_module_map(&["os"]));
    let scope = Scope::new();
    scope.set(
        "dir",
        Value::string(dir.path().to_string_lossy().into_owned()),
    );
    engine
        .run_with_scope(
            &scope,
            r#"
os := import("os")
path := dir + "/data.txt"
os.write_file(path, "hello")
content := string(os.read_file(path))
info := os.stat(path)
size := info.size
isdir := info.directory
missing := is_error(os.read_file(dir + "/nope.txt"))
os.mkdir(dir + "/sub")
subdir := os.stat(dir + "/sub").directory
os.setenv("RILL_TEST_VAR", "xyz")
got := os.getenv("RILL_TEST_VAR")
os.unsetenv("RILL_TEST_VAR")
gone := os.lookup_env("RILL_TEST_VAR")
expanded := os.expand_env("pid=$RILL_NO_SUCH_VAR!")
pid := os.getpid()
sep := os.path_separator
bad_exec := is_error(os.exec("rill-definitely-missing-binary"))
"#,
        )
        .expect("run");
    assert_eq!(scope.get("content"), Value::string("hello"));
    assert_eq!(scope.get("size"), Value::Int(5));
    assert_eq!(scope.get("isdir"), Value::Bool(false));
    assert_eq!(scope.get("missing"), Value::Bool(true));
    assert_eq!(scope.get("subdir"), Value::Bool(true));
    assert_eq!(scope.get("got"), Value::string("xyz"));
    assert_eq!(scope.get("gone"), Value::Bool(false));
    assert_eq!(scope.get("expanded"), Value::string("pid=!"));
    assert!(matches!(scope.get("pid"), Value::Int(p) if p > 0));
    assert!(matches!(scope.get("sep"), Value::Char(_)));
    assert_eq!(scope.get("bad_exec"), Value::Bool(true));
}

#[test]
fn times_arithmetic_and_durations() {
    let engine = engine_with(stdlib::get_module_map(&["times"]));
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            r#"
times := import("times")
t := times.unix(1700000000, 0)
t2 := times.add(t, times.hour)
d := times.sub(t2, t)
later := times.after(t2, t)
secs := times.time_unix(t)
wd := times.time_weekday(times.date(2024, 1, 2, 0, 0, 0, 0))
ds := times.duration_string(90 * times.minute)
pd := times.parse_duration("1h30m")
neg := times.parse_duration("-2.5s")
hrs := times.duration_hours(times.hour)
ms := times.month_string(1)
jan := times.january
z := times.is_zero(times.unix(0, 0))
shifted := times.time_month(times.add_date(t, 0, 1, 0))
"#,
        )
        .expect("run");
    assert_eq!(scope.get("d"), Value::Int(3_600_000_000_000));
    assert_eq!(scope.get("later"), Value::Bool(true));
    assert_eq!(scope.get("secs"), Value::Int(1_700_000_000));
    assert_eq!(scope.get("wd"), Value::Int(2)); // 2024-01-02 is a Tuesday
    assert_eq!(scope.get("ds"), Value::string("1h30m0s"));
    assert_eq!(scope.get("pd"), Value::Int(5_400_000_000_000));
    assert_eq!(scope.get("neg"), Value::Int(-2_500_000_000));
    assert_eq!(scope.get("hrs"), Value::Float(1.0));
    assert_eq!(scope.get("ms"), Value::string("January"));
    assert_eq!(scope.get("jan"), Value::Int(1));
    assert_eq!(scope.get("z"), Value::Bool(true));
    // 2023-11-14 plus one month lands in December.
    assert_eq!(scope.get("shifted"), Value::Int(12));
}

#[test]
fn math_numeric_helpers() {
    let engine = engine_with(stdlib::get_module_map(&["math"]));
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            r#"
math := import("math")
cs := math.copysign(3.0, -1.0)
d1 := math.dim(5.0, 3.0)
d2 := math.dim(3.0, 5.0)
ld := math.ldexp(1.5, 3)
sb := math.signbit(-1.0)
golden := math.phi > 1.6 && math.phi < 1.62
"#,
        )
        .expect("run");
    assert_eq!(scope.get("cs"), Value::Float(-3.0));
    assert_eq!(scope.get("d1"), Value::Float(2.0));
    assert_eq!(scope.get("d2"), Value::Float(0.0));
    assert_eq!(scope.get("ld"), Value::Float(12.0));
    assert_eq!(scope.get("sb"), Value::Bool(true));
    assert_eq!(scope.get("golden"), Value::Bool(true));
}

#[test]
fn source_modules_compile_and_export() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("double", "base := 2\nexport func(n) { return n * base }\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(
            &scope,
            "double := import(\"double\")\nout := double(21)",
        )
        .expect("run");
    assert_eq!(scope.get("out"), Value::Int(42));
}

#[test]
fn source_module_without_export_yields_undefined() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("empty", "a := 1\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "out := is_undefined(import(\"empty\"))")
        .expect("run");
    assert_eq!(scope.get("out"), Value::Bool(true));
}

#[test]
fn exported_aggregates_are_immutable() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("cfg", "export {debug: true}\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    let err = engine
        .run_with_scope(&scope, "cfg := import(\"cfg\")\ncfg.debug = false")
        .expect_err("immutable");
    assert!(
        err.to_string().contains("not index-assignable: immutable-map"),
        "got {}",
        err
    );
}

#[test]
fn modules_can_import_modules() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("a", "b := import(\"b\")\nexport func(n) { return b(n) + 1 }\n");
    modules.add_source_module("b", "export func(n) { return n * 10 }\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "a := import(\"a\")\nout := a(4)")
        .expect("run");
    assert_eq!(scope.get("out"), Value::Int(41));
}

#[test]
fn cyclic_imports_are_rejected() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("a", "export import(\"b\")\n");
    modules.add_source_module("b", "export import(\"a\")\n");
    let engine = engine_with(modules);
    let err = engine.run("import(\"a\")").expect_err("cycle");
    assert!(
        err.to_string().contains("cyclic module import: a"),
        "got {}",
        err
    );
}

#[test]
fn missing_modules_fail_compilation() {
    let engine = Engine::new();
    let err = engine.run("import(\"user1\")").expect_err("missing");
    assert!(
        err.to_string().contains("module 'user1' not found"),
        "got {}",
        err
    );
}

#[test]
fn module_map_enumerates_registrations() {
    let modules = stdlib::stdlib_module_map();
    assert_eq!(modules.len(), stdlib::all_module_names().len());
    let mut names = modules.names();
    names.sort();
    assert!(names.contains(&"math".to_string()));
    assert!(!modules.is_empty());
    assert!(modules.get_builtin_module("nonexistent").is_none());
}

#[test]
fn host_defined_builtin_modules() {
    let mut attrs = std::collections::HashMap::new();
    attrs.insert("version".to_string(), Value::Int(3));
    let mut modules = ModuleMap::new();
    modules.add_builtin_module("host", BuiltinModule::new(attrs));
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "host := import(\"host\")\nout := host.version")
        .expect("run");
    assert_eq!(scope.get("out"), Value::Int(3));
}

#[test]
fn file_imports_resolve_extensions() {
    use rill::bytecode::compiler::Compiler;
    use rill::bytecode::symbol_table::SymbolTable;
    use rill::runtime::builtins::BUILTINS;
    use rill::runtime::vm::VM;
    use rill::syntax::parser::parse_file;
    use rill::syntax::source::SourceFileSet;

    let dir = tempfile::tempdir().expect("tempdir");
    let module_path = dir.path().join("util.rill");
    let mut module_file = std::fs::File::create(&module_path).expect("create");
    module_file
        .write_all(b"export func(n) { return n + 1 }\n")
        .expect("write");
    drop(module_file);

    let src = b"util := import(\"util\")\nout := util(41)\n";
    let mut file_set = SourceFileSet::new();
    let file_index = file_set.add_file("main.rill", src);
    let file = parse_file(&file_set.files[file_index], src).expect("parse");

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
    compiler.enable_file_import(true);
    compiler.set_import_dir(dir.path());
    compiler.compile(&file).expect("compile");
    let (mut bytecode, mut table) = compiler.finish();
    bytecode.remove_duplicates();

    let mut vm = VM::new(bytecode, Vec::new(), -1);
    vm.run().expect("run");
    let globals = vm.into_globals();
    let (symbol, _) = table.resolve("out", false).expect("out symbol");
    assert_eq!(globals[symbol.index], Value::Int(42));
}

#[test]
fn import_file_extensions_are_validated() {
    use rill::bytecode::compiler::Compiler;
    use rill::bytecode::symbol_table::SymbolTable;
    use rill::syntax::source::SourceFileSet;

    let mut file_set = SourceFileSet::new();
    let file_index = file_set.add_file("test", b"");
    let mut compiler = Compiler::new(
        file_set,
        file_index,
        SymbolTable::new(),
        Vec::new(),
        ModuleMap::new(),
    );

    assert_eq!(compiler.get_import_file_ext(), vec![".rill".to_string()]);
    assert!(compiler.set_import_file_ext(&[]).is_err());
    assert!(compiler.set_import_file_ext(&[""]).is_err());
    assert!(compiler.set_import_file_ext(&["foo"]).is_err());
    assert!(compiler.set_import_file_ext(&["foo.bar"]).is_err());
    assert!(compiler.set_import_file_ext(&["foo."]).is_err());
    assert!(compiler.set_import_file_ext(&[".mshk"]).is_ok());
    assert_eq!(compiler.get_import_file_ext(), vec![".mshk".to_string()]);
    // Replaces rather than appends.
    assert!(compiler.set_import_file_ext(&[".foo", ".bar"]).is_ok());
    assert_eq!(
        compiler.get_import_file_ext(),
        vec![".foo".to_string(), ".bar".to_string()]
    );
}

#[test]
fn immutable_maps_of_plain_data_flow_back_to_the_scope() {
    let mut modules = ModuleMap::new();
    modules.add_source_module("data", "export {answer: 42}\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "data := import(\"data\")")
        .expect("run");
    assert!(scope.contains("data"));

    // A module exposing functions stays out of the scope.
    let mut modules = ModuleMap::new();
    modules.add_source_module("fns", "export {f: func() { return 1 }}\n");
    let engine = engine_with(modules);
    let scope = Scope::new();
    engine
        .run_with_scope(&scope, "fns := import(\"fns\")")
        .expect("run");
    assert!(!scope.contains("fns"));
}
