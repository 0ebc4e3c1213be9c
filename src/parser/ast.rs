use crate::analyzer::DataType;

use super::Expr;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program(pub Vec<Declaration>);

impl Program {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A top-level declaration: a global variable or a function.
#[derive(Clone, Debug, PartialEq)]
pub struct Declaration {
    pub data_type: DataType,
    pub name: String,
    pub suffix: DeclarationSuffix,
    pub is_extern: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DeclarationSuffix {
    Variable(VariableSuffix),
    Function(FunctionSuffix),
}

#[derive(Clone, Debug, PartialEq)]
pub enum VariableSuffix {
    None,
    Initializer(Expr),
    Array(i64),
}

impl VariableSuffix {
    pub fn array_size(&self) -> Option<i64> {
        match self {
            VariableSuffix::Array(size) => Some(*size),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSuffix {
    pub params: Vec<Parameter>,
    /// `None` for a prototype.
    pub body: Option<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub data_type: DataType,
    pub name: Option<String>,
    pub is_array: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block(pub Vec<Stmt>);

#[derive(Clone, Debug, PartialEq)]
pub struct LocalDeclaration {
    pub data_type: DataType,
    pub name: String,
    pub suffix: VariableSuffix,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Declaration(LocalDeclaration),
    If(Expr, Block, Option<Block>),
    While(Expr, Block),
    For(Option<Expr>, Option<Expr>, Option<Expr>, Block),
    Return(Option<Expr>),
    Expr(Expr),
    Block(Block),
    Empty,
}
