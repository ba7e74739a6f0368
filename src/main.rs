use sable_lang::{
    config::InterpreterConfig,
    diagnostics::{emit_frontend_error, report_io_error, report_runtime_error},
    parse,
    runtime::{value::RuntimeVal, Interpreter},
};
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;
use std::thread;

const USAGE: &str = "Usage: sable [run|ast] <filename.sbl>\n       sable repl";
const REPL_FILE: &str = "<repl>";
// Deep recursion in scripts recurses in the evaluator too.
const STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() {
    init_tracing();
    let args: Vec<String> = env::args().skip(1).collect();

    let worker = thread::Builder::new()
        .name("sable".into())
        .stack_size(STACK_SIZE)
        .spawn(move || dispatch(&args));
    let code = match worker {
        Ok(handle) => handle.join().unwrap_or(101),
        Err(err) => {
            eprintln!("Failed to start interpreter: {err}");
            1
        }
    };
    process::exit(code);
}

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

fn dispatch(args: &[String]) -> i32 {
    match args {
        [command] if command == "repl" => repl(),
        [command, filename] => {
            if !filename.ends_with(".sbl") {
                eprintln!("Invalid file extension. Only .sbl files are allowed.");
                return 1;
            }
            let path = Path::new(filename);
            let source = match fs::read_to_string(path) {
                Ok(source) => source,
                Err(err) => {
                    report_io_error(path, &err);
                    return 1;
                }
            };
            match command.as_str() {
                "run" => run_file(filename, &source),
                "ast" => print_ast(filename, &source),
                _ => usage(),
            }
        }
        _ => usage(),
    }
}

fn usage() -> i32 {
    eprintln!("{USAGE}");
    1
}

fn run_file(filename: &str, source: &str) -> i32 {
    let program = match parse(filename, source) {
        Ok(program) => program,
        Err(err) => {
            emit_frontend_error(filename, source, &err);
            return 1;
        }
    };

    let mut interpreter = Interpreter::new(filename, InterpreterConfig::from_env());
    match interpreter.run(&program) {
        Ok(_) => 0,
        Err(err) => {
            report_runtime_error(&err, interpreter.context().failure_trace());
            1
        }
    }
}

fn print_ast(filename: &str, source: &str) -> i32 {
    match parse(filename, source) {
        Ok(program) => {
            println!("{program:#?}");
            0
        }
        Err(err) => {
            emit_frontend_error(filename, source, &err);
            1
        }
    }
}

/// Reads one statement per line. A line ending in `:` or `{` keeps reading until a
/// blank line closes the block.
fn repl() -> i32 {
    let mut interpreter = Interpreter::new(REPL_FILE, InterpreterConfig::from_env());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut source = match lines.next() {
            None => return 0,
            Some(Ok(line)) => line,
            Some(Err(err)) => {
                eprintln!("Failed to read input: {err}");
                return 1;
            }
        };
        match source.trim() {
            "" => continue,
            "exit" | "quit" => return 0,
            _ => {}
        }

        if source.trim_end().ends_with(':') || source.trim_end().ends_with('{') {
            for line in lines.by_ref() {
                let Ok(line) = line else { break };
                if line.trim().is_empty() {
                    break;
                }
                source.push('\n');
                source.push_str(&line);
            }
        }

        let program = match parse(REPL_FILE, &source) {
            Ok(program) => program,
            Err(err) => {
                emit_frontend_error(REPL_FILE, &source, &err);
                continue;
            }
        };
        match interpreter.run(&program) {
            Ok(RuntimeVal::Placeholder | RuntimeVal::Null) => {}
            Ok(value) => println!("{value}"),
            Err(err) => report_runtime_error(&err, interpreter.context().failure_trace()),
        }
    }
}
