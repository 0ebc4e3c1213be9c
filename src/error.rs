use thiserror::Error;

use crate::{analyzer::SemanticErrors, codegen::CodegenError, lexer::LexError, parser::ParseError};

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lexical error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Semantic(#[from] SemanticErrors),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
}
