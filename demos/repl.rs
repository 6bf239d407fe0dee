use psp::Error;
use psp::ast::Value;
use psp::builtinops::create_global_scope;
use psp::evaluator::Scope;
use psp::program::Program;
use psp::reader::ParseConfig;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("Psp interpreter");
    println!("Enter forms like: (define sub (lambda [a b] {{- a b}}))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };
    let scope = create_global_scope();

    // Register custom function that can be called from user code for demonstration purposes
    scope.register_builtin_operation::<_, ()>("help", print_help);

    let config = ParseConfig {
        handle_comments: true,
    };

    loop {
        match rl.readline("psp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        _ = print_help().is_ok();
                        continue;
                    }
                    ":env" => {
                        print_scope(&scope);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                let result = if let Some(path) = line.strip_prefix(":load ") {
                    Program::load(path.trim()).and_then(|program| program.execute(&scope))
                } else {
                    Program::parse_with_config(line, None, &config)
                        .and_then(|program| program.execute(&scope))
                };

                match result {
                    Ok(Value::Unspecified) => {}
                    Ok(result) => println!("{result}"),
                    Err(Error::Parse(err)) => {
                        println!("Error: {err} ({})", err.kind);
                        if err.file().is_empty() {
                            println!("  {}", err.code);
                            println!("  {:>width$}", "^", width = err.column());
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() -> Result<Value, Error> {
    println!("Psp interpreter:");
    println!("  :help        - Show this help message");
    println!("  :env         - Show current scope bindings");
    println!("  :load <path> - Run a source file in the current scope");
    println!("  :quit        - Exit the interpreter");
    println!("  :exit        - Exit the interpreter");
    println!("  Ctrl+C       - Exit the interpreter");
    println!();
    println!("Core forms:");
    println!("  (define name value)    bind in the current scope");
    println!("  (setf! name value)     overwrite an existing binding");
    println!("  (lambda [params] body) create a closure");
    println!("  (quote form), 'form    return a form unevaluated");
    println!();
    println!("Brackets (), [] and {{}} are interchangeable; ; starts a comment.");
    println!();
    println!("Examples:");
    println!("  (define add +)");
    println!("  (define sub (lambda [a b] {{- a b}}))");
    println!("  (echo (sub (add 5 7) 3))");
    println!();

    Ok(Value::Unspecified)
}

fn print_scope(scope: &Scope) {
    let bindings = scope.get_all_bindings();

    if bindings.is_empty() {
        println!("Scope is empty.");
        return;
    }

    println!("Scope bindings ({} total):", bindings.len());
    println!();

    // Separate operations from user-defined values
    let mut operations = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        match value {
            Value::Operation(_) => operations.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !operations.is_empty() {
        println!("Operations ({}):", operations.len());
        // Print in columns for readability
        let mut col = 0;
        for name in operations {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
