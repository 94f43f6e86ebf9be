//! Verve CLI: run, compile, disassemble or dump source and bytecode files.

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use colored::Colorize;
use mimalloc::MiMalloc;

use verve::error::VerveError;
use verve::VmConfig;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// CLI command to execute.
enum Command {
    /// Execute a source file
    Run { input: String },
    /// Print the bytecode generated for a source file
    Disassemble { input: String },
    /// Generate bytecode and save it
    Compile { input: String, output: String },
    /// Execute a bytecode file
    Bytecode { input: String },
    /// Print the syntax tree of a source file
    PrintAst { input: String },
}

const USAGE: &[(&str, &str)] = &[
    ("verve <input>", "Execute <input> as verve source code"),
    ("verve -d <input>", "Print bytecode generated for <input>"),
    (
        "verve -c <input> <output>",
        "Generate bytecode for <input> and save it at <output>",
    ),
    ("verve -b <input>", "Execute <input> as verve bytecode"),
    (
        "verve --print-ast <input>",
        "Print the Abstract Syntax Tree for <input>",
    ),
];

fn print_usage() {
    println!("Usage:");
    for (form, description) in USAGE {
        println!("  {:<30}{}", form, description);
    }
}

fn parse_args(args: &[String]) -> Option<Command> {
    let command = match args {
        [flag, input] if flag == "-d" => Command::Disassemble {
            input: input.clone(),
        },
        [flag, input, output] if flag == "-c" => Command::Compile {
            input: input.clone(),
            output: output.clone(),
        },
        [flag, input] if flag == "-b" => Command::Bytecode {
            input: input.clone(),
        },
        [flag, input] if flag == "--print-ast" => Command::PrintAst {
            input: input.clone(),
        },
        [input] if !input.starts_with('-') => Command::Run {
            input: input.clone(),
        },
        _ => return None,
    };
    Some(command)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = parse_args(&args) else {
        print_usage();
        process::exit(1);
    };

    let result = match &command {
        Command::Run { input } => read_source(input).and_then(|source| {
            verve::run_source(&source, VmConfig::from_env()).map(|_| ())
        }),
        Command::Disassemble { input } => read_source(input).and_then(|source| {
            print!("{}", verve::disassemble_source(&source)?);
            Ok(())
        }),
        Command::Compile { input, output } => read_source(input).and_then(|source| {
            let bytes = verve::compile_source(&source)?;
            fs::write(output, bytes)?;
            Ok(())
        }),
        Command::Bytecode { input } => read_bytes(input)
            .and_then(|bytes| verve::run_bytecode(bytes, VmConfig::from_env()).map(|_| ())),
        Command::PrintAst { input } => read_source(input).and_then(|source| {
            print!("{}", verve::ast::print_program(&verve::parse(&source)?));
            Ok(())
        }),
    };

    if let Err(error) = result {
        eprintln!("{} {}", "Error:".red().bold(), error);
        process::exit(1);
    }
}

fn read_bytes(input: &str) -> Result<Vec<u8>, VerveError> {
    match fs::read(input) {
        Ok(bytes) => Ok(bytes),
        Err(_) => cannot_open(input),
    }
}

fn read_source(input: &str) -> Result<String, VerveError> {
    match fs::read_to_string(input) {
        Ok(source) => Ok(source),
        Err(_) => cannot_open(input),
    }
}

fn cannot_open<T>(input: &str) -> T {
    let path = Path::new(input);
    let shown = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    println!("Error: Cannot open file at `{}`", shown.display());
    process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert!(matches!(
            parse_args(&args(&["prog.vv"])),
            Some(Command::Run { input }) if input == "prog.vv"
        ));
        assert!(matches!(
            parse_args(&args(&["-c", "in.vv", "out.vvb"])),
            Some(Command::Compile { input, output }) if input == "in.vv" && output == "out.vvb"
        ));
        assert!(matches!(
            parse_args(&args(&["--print-ast", "in.vv"])),
            Some(Command::PrintAst { .. })
        ));
    }

    #[test]
    fn test_usage_errors() {
        assert!(parse_args(&args(&[])).is_none());
        assert!(parse_args(&args(&["-h"])).is_none());
        assert!(parse_args(&args(&["--help"])).is_none());
        assert!(parse_args(&args(&["-c", "only-input"])).is_none());
        assert!(parse_args(&args(&["-d"])).is_none());
        assert!(parse_args(&args(&["a", "b"])).is_none());
    }
}
