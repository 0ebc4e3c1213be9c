pub mod analyzer;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;

use analyzer::{SemanticVisitor, SymbolTable};
use codegen::Codegen;
use lexer::Lexer;
use parser::{Parser, Program};

pub use error::{CompileError, CompileResult};

#[derive(Clone, Copy, Debug, Default)]
pub struct CompileOptions {
    /// Report each stage on stderr.
    pub verbose: bool,
    /// Print the symbol table on stderr once analysis succeeds.
    pub dump_symbols: bool,
}

#[derive(Clone, Debug)]
pub struct CompileOutput {
    pub symbol_table: SymbolTable,
    pub assembly: String,
}

/// Source text to NASM assembly.
pub fn compile(user_input: &str, options: &CompileOptions) -> CompileResult<CompileOutput> {
    let tokens = Lexer::tokenize(user_input)?;
    if options.verbose {
        eprintln!("lexer: {} tokens", tokens.len());
    }

    let mut parser = Parser::new(tokens);
    let program = parser.parse()?;
    if options.verbose {
        eprintln!("parser: {} top-level declarations", program.0.len());
    }

    compile_program(&program, options)
}

/// Analyzes an already parsed program, then generates its assembly.
/// Nothing is generated when the analysis fails.
pub fn compile_program(program: &Program, options: &CompileOptions) -> CompileResult<CompileOutput> {
    let symbol_table = SemanticVisitor::new().visit_program(program)?;
    if options.verbose {
        eprintln!("analyzer: {} symbols", symbol_table.len());
    }
    if options.dump_symbols {
        eprint!("{}", symbol_table);
    }

    let assembly = Codegen::new(&symbol_table).generate(program)?;
    if options.verbose {
        eprintln!("codegen: {} bytes of assembly", assembly.len());
    }

    Ok(CompileOutput {
        symbol_table,
        assembly,
    })
}
