use std::{fs, path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use clap_stdin::FileOrStdin;
use smallcc::{compile, CompileOptions};

/// Compiles a small C-like language to x86-64 NASM assembly.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Source file, or `-` for stdin
    #[arg(default_value = "-")]
    input: FileOrStdin,
    /// Write the assembly here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the symbol table to stderr
    #[arg(long)]
    dump_symbols: bool,
    /// Report each compilation stage on stderr
    #[arg(short, long)]
    verbose: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    let options = CompileOptions {
        verbose: args.verbose,
        dump_symbols: args.dump_symbols,
    };

    let user_input = args
        .input
        .contents()
        .context("failed to read the source input")?;
    let output = compile(&user_input, &options)?;

    match &args.output {
        Some(path) => fs::write(path, &output.assembly)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", output.assembly),
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
