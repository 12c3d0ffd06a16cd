use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use rill::bytecode::bytecode::Bytecode;
use rill::bytecode::cache;
use rill::bytecode::compiler::{Compiler, SOURCE_FILE_EXT};
use rill::bytecode::symbol_table::SymbolTable;
use rill::error::Error;
use rill::modules::ModuleMap;
use rill::runtime::builtin_function::UserFunction;
use rill::runtime::builtins::BUILTINS;
use rill::runtime::value::Value;
use rill::runtime::vm::{GLOBALS_SIZE, VM};
use rill::stdlib;
use rill::syntax::ast::{Expr, File, Ident, Stmt};
use rill::syntax::parser::parse_file;
use rill::syntax::source::SourceFileSet;

const REPL_PROMPT: &str = ">> ";

#[derive(ClapParser)]
#[command(name = "rill")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Rill scripting language", long_about = None)]
struct Cli {
    /// Compile only; write bytecode to this file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    output: Option<PathBuf>,

    /// Resolve import paths relative to the input file's directory
    #[arg(long)]
    resolve: bool,

    /// Skip the on-disk bytecode cache
    #[arg(long)]
    no_cache: bool,

    /// Script file (.rill) or compiled bytecode file; starts the REPL when
    /// omitted
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let modules = stdlib::stdlib_module_map();

    let Some(ref input) = cli.input else {
        run_repl(&modules);
        return ExitCode::SUCCESS;
    };

    let result = run_input(&cli, &input, &modules);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_input(cli: &Cli, input: &Path, modules: &ModuleMap) -> Result<(), Error> {
    let mut data = fs::read(input)?;
    // A shebang line reads as a line comment.
    if data.len() > 1 && &data[..2] == b"#!" {
        data[0] = b'/';
        data[1] = b'/';
    }

    let is_source = input
        .extension()
        .is_some_and(|ext| format!(".{}", ext.to_string_lossy()) == SOURCE_FILE_EXT);

    if let Some(output) = &cli.output {
        let bytecode = compile_source(&data, input, modules, cli.resolve)?;
        let mut out = fs::File::create(output)?;
        bytecode.encode(&mut out)?;
        println!("{}", output.display());
        return Ok(());
    }

    let bytecode = if is_source {
        let cache_path = cache::cache_path(input);
        match (!cli.no_cache)
            .then(|| cache::load_cache(&cache_path, &data, Some(modules)))
            .flatten()
        {
            Some(cached) => cached,
            None => {
                let bytecode = compile_source(&data, input, modules, cli.resolve)?;
                if !cli.no_cache {
                    // Best effort; an unwritable directory is not an error.
                    let _ = cache::write_cache(&cache_path, &data, &bytecode);
                }
                bytecode
            }
        }
    } else {
        Bytecode::decode(&mut data.as_slice(), Some(modules))?
    };

    let mut vm = VM::new(bytecode, Vec::new(), -1);
    vm.run()?;
    Ok(())
}

fn compile_source(
    data: &[u8],
    input: &Path,
    modules: &ModuleMap,
    resolve: bool,
) -> Result<Bytecode, Error> {
    let display_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());

    let mut file_set = SourceFileSet::new();
    let file_index = file_set.add_file(&display_name, data);
    let file = parse_file(&file_set.files[file_index], data)?;

    let mut symbol_table = SymbolTable::new();
    for (idx, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(idx, builtin.name);
    }

    let mut compiler = Compiler::new(
        file_set,
        file_index,
        symbol_table,
        Vec::new(),
        modules.clone(),
    );
    compiler.enable_file_import(true);
    if resolve && let Some(dir) = input.parent() {
        compiler.set_import_dir(dir);
    }
    compiler.compile(&file)?;

    let (mut bytecode, _) = compiler.finish();
    bytecode.remove_duplicates();
    Ok(bytecode)
}

fn run_repl(modules: &ModuleMap) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("repl init error: {}", err);
            return;
        }
    };

    let mut file_set = SourceFileSet::new();
    let mut symbol_table = SymbolTable::new();
    for (idx, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.define_builtin(idx, builtin.name);
    }
    let mut globals = vec![Value::Undefined; GLOBALS_SIZE];
    let mut constants: Vec<Value> = Vec::new();

    // Echo builtin the REPL wraps around every expression statement.
    let println_symbol = symbol_table.define("__repl_println__");
    globals[println_symbol.index] = Value::user_function(UserFunction::new("println", |args| {
        let parts: Vec<String> = args.iter().map(Value::plain_string).collect();
        println!("{}", parts.join(" "));
        Ok(Value::Undefined)
    }));

    loop {
        let line = match editor.readline(REPL_PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => return,
            Err(err) => {
                eprintln!("{}", err);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(&line);

        let file_index = file_set.add_file("repl", line.as_bytes());
        let file = match parse_file(&file_set.files[file_index], line.as_bytes()) {
            Ok(file) => add_prints(file),
            Err(errors) => {
                eprintln!("{}", errors);
                continue;
            }
        };

        let mut compiler = Compiler::new(
            std::mem::take(&mut file_set),
            file_index,
            std::mem::take(&mut symbol_table),
            std::mem::take(&mut constants),
            modules.clone(),
        );
        let compile_result = compiler.compile(&file);
        let (bytecode, table) = compiler.finish();
        symbol_table = table;
        file_set = bytecode.file_set.clone();
        constants = bytecode.constants.clone();
        if let Err(err) = compile_result {
            eprintln!("{}", err);
            continue;
        }

        let mut vm = VM::new(bytecode, std::mem::take(&mut globals), -1);
        let run_result = vm.run();
        globals = vm.into_globals();
        if let Err(err) = run_result {
            eprintln!("{}", err);
        }
    }
}

/// Wraps every top-level expression statement in a call to the injected
/// echo builtin, so the REPL prints what each expression evaluates to.
fn add_prints(file: File) -> File {
    let stmts = file
        .stmts
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::Expr(expr) => {
                let pos = expr.pos();
                Stmt::Expr(Expr::Call {
                    func: Box::new(Expr::Ident(Ident {
                        name: "__repl_println__".to_string(),
                        pos,
                    })),
                    args: vec![expr],
                    has_spread: false,
                    pos,
                })
            }
            other => other,
        })
        .collect();
    File { stmts }
}
