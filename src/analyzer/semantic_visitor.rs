use crate::codegen::ENTRY_POINT;
use crate::parser::{
    Block, Constant, Declaration, DeclarationSuffix, Expr, FunctionSuffix, LValue, Parameter,
    Program, Stmt, VariableSuffix,
};

use super::{
    DataType, SemanticError, SemanticErrors, SemanticResult, SymbolEntry, SymbolKind,
    SymbolTable, FIRST_PARAM_OFFSET, PARAM_STRIDE,
};

#[derive(Clone, Debug)]
struct FunctionContext {
    name: String,
    return_type: DataType,
    has_return: bool,
}

/// Single pass over the tree that builds the symbol table and type-checks
/// every declaration, statement and expression.
#[derive(Debug, Default)]
pub struct SemanticVisitor {
    symbol_table: SymbolTable,
    current_func: Option<FunctionContext>,
}

impl SemanticVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops at the first failing declaration. When every declaration is
    /// valid, reports all functions that were prototyped but never defined.
    pub fn visit_program(mut self, program: &Program) -> Result<SymbolTable, SemanticErrors> {
        for declaration in program.0.iter() {
            if let Err(e) = self.visit_declaration(declaration) {
                return Err(SemanticErrors(vec![e]));
            }
        }

        let undefined: Vec<_> = self
            .symbol_table
            .iter()
            .filter(|e| e.is_undefined_function())
            .map(|e| SemanticError::UndefinedFunction(e.name.clone()))
            .collect();
        if !undefined.is_empty() {
            return Err(SemanticErrors(undefined));
        }

        Ok(self.symbol_table)
    }

    fn scope(&self) -> Option<&str> {
        self.current_func.as_ref().map(|f| f.name.as_str())
    }

    fn visit_declaration(&mut self, declaration: &Declaration) -> SemanticResult<()> {
        if declaration.name == ENTRY_POINT {
            return Err(SemanticError::ReservedIdentifier(declaration.name.clone()));
        }
        match &declaration.suffix {
            DeclarationSuffix::Variable(suffix) => self.declare_variable(
                &declaration.name,
                declaration.data_type,
                suffix,
                declaration.is_extern,
            ),
            DeclarationSuffix::Function(suffix) => self.visit_function(declaration, suffix),
        }
    }

    fn declare_variable(
        &mut self,
        name: &str,
        data_type: DataType,
        suffix: &VariableSuffix,
        is_extern: bool,
    ) -> SemanticResult<()> {
        if self.symbol_table.lookup_in_scope(name, self.scope()).is_some() {
            return Err(SemanticError::RedeclaredIdentifier(name.to_string()));
        }

        let array_size = match suffix.array_size() {
            Some(size) if size <= 0 => {
                return Err(SemanticError::InvalidArraySize(name.to_string()))
            }
            Some(size) => Some(size as usize),
            None => None,
        };

        let owner = self.current_func.as_ref().map(|f| f.name.as_str());
        let inserted = if is_extern {
            self.symbol_table
                .insert_extern_variable(name, data_type, array_size)
        } else {
            self.symbol_table
                .insert_variable(name, data_type, array_size, owner)
        };
        // The name is known to be free here, so only the size can be refused.
        if !inserted {
            return Err(SemanticError::StorageTooLarge(name.to_string()));
        }

        if let VariableSuffix::Initializer(expr) = suffix {
            let t = self.visit_expr(expr)?;
            if !data_type.is_compatible(&t) {
                return Err(SemanticError::TypeMismatch(name.to_string()));
            }
        }
        Ok(())
    }

    fn visit_function(
        &mut self,
        declaration: &Declaration,
        suffix: &FunctionSuffix,
    ) -> SemanticResult<()> {
        let name = &declaration.name;
        let param_count = suffix.params.len();
        let is_definition = suffix.body.is_some();

        match self.symbol_table.lookup_in_scope(name, None) {
            Some(existing) => {
                let SymbolKind::Function {
                    param_count: declared_count,
                    defined,
                } = existing.kind
                else {
                    return Err(SemanticError::RedeclaredIdentifier(name.clone()));
                };
                if existing.data_type != declaration.data_type || declared_count != param_count {
                    return Err(SemanticError::TypeMismatch(name.clone()));
                }
                if is_definition && defined {
                    return Err(SemanticError::RedeclaredIdentifier(name.clone()));
                }
                if is_definition {
                    self.symbol_table.mark_defined(name);
                }
            }
            None => {
                self.symbol_table.insert_function(
                    name,
                    declaration.data_type,
                    param_count,
                    is_definition,
                    declaration.is_extern,
                );
            }
        }

        match &suffix.body {
            Some(body) => self.visit_function_body(declaration, &suffix.params, body),
            None => Ok(()),
        }
    }

    fn visit_function_body(
        &mut self,
        declaration: &Declaration,
        params: &[Parameter],
        body: &Block,
    ) -> SemanticResult<()> {
        self.symbol_table.reset_frame();
        self.current_func = Some(FunctionContext {
            name: declaration.name.clone(),
            return_type: declaration.data_type,
            has_return: false,
        });

        let result = self
            .declare_params(&declaration.name, params)
            .and_then(|_| self.visit_block(body))
            .and_then(|_| match &self.current_func {
                Some(f) if !f.has_return => {
                    Err(SemanticError::MissingReturn(declaration.name.clone()))
                }
                _ => Ok(()),
            });

        self.current_func = None;
        result
    }

    fn declare_params(&mut self, function: &str, params: &[Parameter]) -> SemanticResult<()> {
        for (i, param) in params.iter().enumerate() {
            // Unnamed parameters still take their slot.
            let Some(name) = &param.name else {
                continue;
            };
            if self
                .symbol_table
                .lookup_in_scope(name, Some(function))
                .is_some()
            {
                return Err(SemanticError::RedeclaredIdentifier(name.clone()));
            }
            let offset = FIRST_PARAM_OFFSET + PARAM_STRIDE * i as i64;
            self.symbol_table
                .insert_parameter(name, param.data_type, offset, param.is_array, function);
        }
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> SemanticResult<()> {
        for stmt in block.0.iter() {
            self.visit_stmt(stmt)?;
        }
        Ok(())
    }

    fn visit_stmt(&mut self, stmt: &Stmt) -> SemanticResult<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Declaration(d) => self.declare_variable(&d.name, d.data_type, &d.suffix, false),
            Stmt::Expr(expr) => self.visit_expr(expr).map(|_| ()),
            Stmt::Block(block) => self.visit_block(block),
            Stmt::If(cond, then_block, else_block) => {
                self.visit_expr(cond)?;
                self.visit_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.visit_block(else_block)?;
                }
                Ok(())
            }
            Stmt::While(cond, body) => {
                self.visit_expr(cond)?;
                self.visit_block(body)
            }
            Stmt::For(init, cond, update, body) => {
                for e in [init, cond, update].into_iter().flatten() {
                    self.visit_expr(e)?;
                }
                self.visit_block(body)
            }
            Stmt::Return(expr) => self.visit_return(expr.as_ref()),
        }
    }

    fn visit_return(&mut self, expr: Option<&Expr>) -> SemanticResult<()> {
        if let Some(f) = self.current_func.as_mut() {
            f.has_return = true;
        }

        let Some(expr) = expr else {
            return Ok(());
        };
        let t = self.visit_expr(expr)?;
        match &self.current_func {
            Some(f) if !f.return_type.is_compatible(&t) => {
                Err(SemanticError::ReturnTypeMismatch(f.name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// Resolves a name used as a value: it must be a variable or parameter.
    fn resolve_variable(&self, name: &str) -> SemanticResult<SymbolEntry> {
        match self.symbol_table.lookup(name, self.scope()) {
            Some(entry) if !entry.is_function() => Ok(entry.clone()),
            _ => Err(SemanticError::UndeclaredVariable(name.to_string())),
        }
    }

    fn visit_expr(&mut self, expr: &Expr) -> SemanticResult<DataType> {
        match expr {
            Expr::Assign(target, value) => self.visit_assign(target, value),
            Expr::Binary(_kind, left, right) => {
                self.visit_expr(left)?;
                self.visit_expr(right)?;
                Ok(DataType::Int)
            }
            Expr::Not(e) => {
                self.visit_expr(e)?;
                Ok(DataType::Int)
            }
            Expr::Paren(e) => self.visit_expr(e),
            Expr::Ident(name) => Ok(self.resolve_variable(name)?.data_type),
            Expr::ArrayAccess(name, index) => self.visit_array_access(name, index),
            Expr::Call(name, args) => self.visit_call(name, args),
            Expr::Const(Constant::Int(_)) => Ok(DataType::Int),
            Expr::Const(Constant::Char(_)) => Ok(DataType::Char),
        }
    }

    fn visit_assign(&mut self, target: &LValue, value: &Expr) -> SemanticResult<DataType> {
        let target_type = match target {
            LValue::Ident(name) => {
                let entry = self.resolve_variable(name)?;
                if entry.is_array {
                    return Err(SemanticError::TypeMismatch(
                        "assignment of array".to_string(),
                    ));
                }
                entry.data_type
            }
            LValue::ArrayElement(name, index) => self.visit_array_access(name, index)?,
        };

        let value_type = self.visit_expr(value)?;
        if !target_type.is_compatible(&value_type) {
            return Err(SemanticError::TypeMismatch("assignment".to_string()));
        }
        Ok(target_type)
    }

    fn visit_array_access(&mut self, name: &str, index: &Expr) -> SemanticResult<DataType> {
        let entry = self
            .symbol_table
            .lookup(name, self.scope())
            .cloned()
            .ok_or_else(|| SemanticError::UndeclaredVariable(name.to_string()))?;
        if !entry.is_array {
            return Err(SemanticError::NonArrayIndexed(name.to_string()));
        }

        if self.visit_expr(index)? != DataType::Int {
            return Err(SemanticError::ArrayIndexType(name.to_string()));
        }
        Ok(entry.data_type)
    }

    fn visit_call(&mut self, name: &str, args: &[Expr]) -> SemanticResult<DataType> {
        let (return_type, expected) = match self.symbol_table.lookup(name, self.scope()) {
            Some(SymbolEntry {
                data_type,
                kind: SymbolKind::Function { param_count, .. },
                ..
            }) => (*data_type, *param_count),
            _ => return Err(SemanticError::UndeclaredFunction(name.to_string())),
        };

        for arg in args {
            self.visit_expr(arg)?;
        }

        if args.len() != expected {
            return Err(SemanticError::WrongArgumentCount {
                name: name.to_string(),
                expected,
                found: args.len(),
            });
        }
        Ok(return_type)
    }
}

/// Runs semantic analysis over `program`, producing its symbol table.
pub fn analyze(program: &Program) -> Result<SymbolTable, SemanticErrors> {
    SemanticVisitor::new().visit_program(program)
}
