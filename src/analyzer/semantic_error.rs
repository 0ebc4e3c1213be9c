use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Undeclared function: {0}")]
    UndeclaredFunction(String),
    #[error("Function declared but not defined: {0}")]
    UndefinedFunction(String),
    #[error("Identifier already declared: {0}")]
    RedeclaredIdentifier(String),
    #[error("Type mismatch in {0}")]
    TypeMismatch(String),
    #[error("Wrong number of arguments for function: {name} (expected {expected}, got {found})")]
    WrongArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("Array index must be integer: {0}")]
    ArrayIndexType(String),
    #[error("Cannot index non-array variable: {0}")]
    NonArrayIndexed(String),
    #[error("Return type mismatch in function: {0}")]
    ReturnTypeMismatch(String),
    #[error("Missing return statement in function: {0}")]
    MissingReturn(String),
    #[error("Invalid array size for: {0}")]
    InvalidArraySize(String),
    #[error("Storage too large for: {0}")]
    StorageTooLarge(String),
    #[error("Reserved identifier: {0}")]
    ReservedIdentifier(String),
}

pub type SemanticResult<T> = Result<T, SemanticError>;

/// Every error that made the analysis fail, in the order they were found.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub struct SemanticErrors(pub Vec<SemanticError>);

impl SemanticErrors {
    pub fn first(&self) -> Option<&SemanticError> {
        self.0.first()
    }

    pub fn contains(&self, error: &SemanticError) -> bool {
        self.0.contains(error)
    }
}

impl fmt::Display for SemanticErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}
