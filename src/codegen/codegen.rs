use thiserror::Error;

use crate::{
    analyzer::{DataType, SymbolEntry, SymbolKind, SymbolTable},
    parser::{
        BinOpKind, Block, Constant, Declaration, DeclarationSuffix, Expr, LValue, Program, Stmt,
        VariableSuffix,
    },
};

/// Bytes pushed per call argument.
const ARGUMENT_SLOT: usize = 8;

/// Process entry label; user code may not declare it.
pub const ENTRY_POINT: &str = "_start";

pub type CodegenResult<T> = Result<T, CodegenError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("symbol {name} is missing from the symbol table (scope: {scope})")]
    MissingSymbol { name: String, scope: String },
}

/// Emits NASM x86-64 assembly. Every expression leaves its value in `rax`.
pub struct Codegen<'a> {
    label_index: usize,
    symbol_table: &'a SymbolTable,
    current_func: Option<String>,
    epilogue_label: String,
    asm: String,
}

fn size_directive(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int => "qword",
        DataType::Char => "byte",
    }
}

fn reserve_directive(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int => "resq",
        DataType::Char => "resb",
    }
}

/// User identifiers are emitted with NASM's `$` escape so that names like
/// `rax` or `qword` stay symbols.
fn symbol(name: &str) -> String {
    format!("${}", name)
}

fn frame_operand(offset: i64) -> String {
    if offset < 0 {
        format!("[rbp-{}]", -offset)
    } else {
        format!("[rbp+{}]", offset)
    }
}

fn jump_if(kind: BinOpKind) -> &'static str {
    match kind {
        BinOpKind::Equal => "je",
        BinOpKind::NotEqual => "jne",
        BinOpKind::LessThan => "jl",
        BinOpKind::GreaterThan => "jg",
        BinOpKind::LessEqual => "jle",
        BinOpKind::GreaterEqual => "jge",
        k => unreachable!("{:?} is not a comparison", k),
    }
}

impl<'a> Codegen<'a> {
    pub fn new(symbol_table: &'a SymbolTable) -> Self {
        Self {
            label_index: 0,
            symbol_table,
            current_func: None,
            epilogue_label: String::new(),
            asm: String::new(),
        }
    }

    pub fn generate(mut self, program: &Program) -> CodegenResult<String> {
        self.gen_entry_point(program)?;
        for declaration in program.0.iter() {
            self.gen_declaration(declaration)?;
        }
        self.gen_globals();
        Ok(self.asm)
    }

    fn new_label(&mut self) -> String {
        let s = format!(".L{:0>3}", self.label_index);
        self.label_index += 1;
        s
    }

    fn line(&mut self, s: &str) {
        self.asm.push_str(s);
        self.asm.push('\n');
    }

    fn ins(&mut self, s: &str) {
        self.asm.push_str("    ");
        self.line(s);
    }

    fn label(&mut self, label: &str) {
        self.line(&format!("{}:", label));
    }

    fn lookup(&self, name: &str) -> CodegenResult<&'a SymbolEntry> {
        let table: &'a SymbolTable = self.symbol_table;
        table
            .lookup(name, self.current_func.as_deref())
            .ok_or_else(|| CodegenError::MissingSymbol {
                name: name.to_string(),
                scope: self
                    .current_func
                    .clone()
                    .unwrap_or_else(|| "<global>".to_string()),
            })
    }

    fn operand(entry: &SymbolEntry) -> String {
        if entry.is_global() {
            format!("[{}]", symbol(&entry.name))
        } else {
            frame_operand(entry.offset)
        }
    }

    /// `_start` runs global initializers, calls `main` and exits with its result.
    fn gen_entry_point(&mut self, program: &Program) -> CodegenResult<()> {
        self.line("section .text");
        self.line(&format!("global {}", ENTRY_POINT));
        self.line("");
        self.label(ENTRY_POINT);
        for declaration in program.0.iter() {
            if let DeclarationSuffix::Variable(VariableSuffix::Initializer(expr)) =
                &declaration.suffix
            {
                self.gen_expr(expr)?;
                let entry = self.lookup(&declaration.name)?;
                self.gen_store(entry);
            }
        }
        self.ins(&format!("call {}", symbol("main")));
        self.ins("mov rdi, rax");
        self.ins("mov rax, 60");
        self.ins("syscall");
        self.line("");
        Ok(())
    }

    fn gen_declaration(&mut self, declaration: &Declaration) -> CodegenResult<()> {
        if declaration.is_extern {
            self.line(&format!("extern {}", symbol(&declaration.name)));
            return Ok(());
        }
        match &declaration.suffix {
            DeclarationSuffix::Function(f) => match &f.body {
                Some(body) => self.gen_function(&declaration.name, body),
                None => Ok(()),
            },
            DeclarationSuffix::Variable(_) => Ok(()),
        }
    }

    fn gen_function(&mut self, name: &str, body: &Block) -> CodegenResult<()> {
        self.current_func = Some(name.to_string());
        self.epilogue_label = self.new_label();

        self.label(&symbol(name));
        self.ins("push rbp");
        self.ins("mov rbp, rsp");
        let frame_size = self.symbol_table.frame_size(name);
        if frame_size > 0 {
            self.ins(&format!("sub rsp, {}", frame_size));
        }

        self.gen_block(body)?;

        let epilogue = self.epilogue_label.clone();
        self.label(&epilogue);
        self.ins("mov rsp, rbp");
        self.ins("pop rbp");
        self.ins("ret");
        self.line("");

        self.current_func = None;
        Ok(())
    }

    fn gen_globals(&mut self) {
        self.line("section .bss");
        let table = self.symbol_table;
        for entry in table.global_variables() {
            self.line(&format!(
                "{}: {} {}",
                symbol(&entry.name),
                reserve_directive(entry.data_type),
                entry.array_size.unwrap_or(1)
            ));
        }
    }

    fn gen_block(&mut self, block: &Block) -> CodegenResult<()> {
        for stmt in block.0.iter() {
            self.gen_stmt(stmt)?;
            // Nothing after a return in the same block can run.
            if matches!(stmt, Stmt::Return(_)) {
                break;
            }
        }
        Ok(())
    }

    fn gen_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::Empty => Ok(()),
            Stmt::Declaration(d) => {
                if let VariableSuffix::Initializer(expr) = &d.suffix {
                    self.gen_expr(expr)?;
                    let entry = self.lookup(&d.name)?;
                    self.gen_store(entry);
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.gen_expr(expr),
            Stmt::Block(block) => self.gen_block(block),
            Stmt::If(cond, then_block, else_block) => {
                self.gen_if(cond, then_block, else_block.as_ref())
            }
            Stmt::While(cond, body) => self.gen_while(cond, body),
            Stmt::For(init, cond, update, body) => {
                self.gen_for(init.as_ref(), cond.as_ref(), update.as_ref(), body)
            }
            Stmt::Return(expr) => {
                if let Some(e) = expr {
                    self.gen_expr(e)?;
                }
                let epilogue = self.epilogue_label.clone();
                self.ins(&format!("jmp {}", epilogue));
                Ok(())
            }
        }
    }

    fn gen_if(
        &mut self,
        cond: &Expr,
        then_block: &Block,
        else_block: Option<&Block>,
    ) -> CodegenResult<()> {
        self.gen_expr(cond)?;
        self.ins("cmp rax, 0");
        match else_block {
            None => {
                let end_label = self.new_label();
                self.ins(&format!("je {}", end_label));
                self.gen_block(then_block)?;
                self.label(&end_label);
            }
            Some(else_block) => {
                let else_label = self.new_label();
                let end_label = self.new_label();
                self.ins(&format!("je {}", else_label));
                self.gen_block(then_block)?;
                self.ins(&format!("jmp {}", end_label));
                self.label(&else_label);
                self.gen_block(else_block)?;
                self.label(&end_label);
            }
        }
        Ok(())
    }

    fn gen_while(&mut self, cond: &Expr, body: &Block) -> CodegenResult<()> {
        let begin_label = self.new_label();
        let end_label = self.new_label();

        self.label(&begin_label);
        self.gen_expr(cond)?;
        self.ins("cmp rax, 0");
        self.ins(&format!("je {}", end_label));
        self.gen_block(body)?;
        self.ins(&format!("jmp {}", begin_label));
        self.label(&end_label);
        Ok(())
    }

    fn gen_for(
        &mut self,
        init: Option<&Expr>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Block,
    ) -> CodegenResult<()> {
        let begin_label = self.new_label();
        let end_label = self.new_label();

        if let Some(e) = init {
            self.gen_expr(e)?;
        }
        self.label(&begin_label);
        if let Some(e) = cond {
            self.gen_expr(e)?;
            self.ins("cmp rax, 0");
            self.ins(&format!("je {}", end_label));
        }
        self.gen_block(body)?;
        if let Some(e) = update {
            self.gen_expr(e)?;
        }
        self.ins(&format!("jmp {}", begin_label));
        self.label(&end_label);
        Ok(())
    }

    /// Loads a scalar into `rax`; for arrays, loads the base address.
    fn gen_load(&mut self, entry: &SymbolEntry) {
        let operand = Self::operand(entry);
        if entry.is_array {
            if entry.kind == SymbolKind::Parameter {
                self.ins(&format!("mov rax, qword {}", operand));
            } else {
                self.ins(&format!("lea rax, {}", operand));
            }
            return;
        }
        match entry.data_type {
            DataType::Int => self.ins(&format!("mov rax, qword {}", operand)),
            DataType::Char => self.ins(&format!("movzx rax, byte {}", operand)),
        }
    }

    /// Stores `rax` into a scalar variable.
    fn gen_store(&mut self, entry: &SymbolEntry) {
        let operand = Self::operand(entry);
        match entry.data_type {
            DataType::Int => self.ins(&format!("mov qword {}, rax", operand)),
            DataType::Char => self.ins(&format!("mov byte {}, al", operand)),
        }
    }

    /// Leaves the address of `name[index]` in `rdi`. Clobbers `rax` and `rbx`.
    fn gen_element_address(&mut self, name: &str, index: &Expr) -> CodegenResult<&'a SymbolEntry> {
        self.gen_expr(index)?;
        self.ins("mov rbx, rax");
        let entry = self.lookup(name)?;
        if entry.data_type == DataType::Int {
            self.ins("shl rbx, 3");
        }

        let operand = Self::operand(entry);
        if entry.kind == SymbolKind::Parameter {
            self.ins(&format!("mov rdi, qword {}", operand));
        } else {
            self.ins(&format!("lea rdi, {}", operand));
        }
        self.ins("add rdi, rbx");
        Ok(entry)
    }

    fn gen_expr(&mut self, expr: &Expr) -> CodegenResult<()> {
        match expr {
            Expr::Const(Constant::Int(value)) => self.ins(&format!("mov rax, {}", value)),
            Expr::Const(Constant::Char(value)) => self.ins(&format!("mov rax, {}", value)),
            Expr::Ident(name) => {
                let entry = self.lookup(name)?;
                self.gen_load(entry);
            }
            Expr::ArrayAccess(name, index) => {
                let entry = self.gen_element_address(name, index)?;
                match entry.data_type {
                    DataType::Int => self.ins("mov rax, qword [rdi]"),
                    DataType::Char => self.ins("movzx rax, byte [rdi]"),
                }
            }
            Expr::Assign(target, value) => self.gen_assign(target, value)?,
            Expr::Paren(e) => self.gen_expr(e)?,
            Expr::Not(e) => {
                self.gen_expr(e)?;
                self.ins("cmp rax, 0");
                self.gen_bool_from_jump("je");
            }
            Expr::Binary(kind, left, right) => self.gen_binary(*kind, left, right)?,
            Expr::Call(name, args) => self.gen_call(name, args)?,
        }
        Ok(())
    }

    fn gen_assign(&mut self, target: &LValue, value: &Expr) -> CodegenResult<()> {
        self.gen_expr(value)?;
        match target {
            LValue::Ident(name) => {
                let entry = self.lookup(name)?;
                self.gen_store(entry);
            }
            LValue::ArrayElement(name, index) => {
                self.ins("push rax");
                let entry = self.gen_element_address(name, index)?;
                self.ins("pop rax");
                let directive = size_directive(entry.data_type);
                match entry.data_type {
                    DataType::Int => self.ins(&format!("mov {} [rdi], rax", directive)),
                    DataType::Char => self.ins(&format!("mov {} [rdi], al", directive)),
                }
            }
        }
        Ok(())
    }

    /// Left operand ends up in `rbx`, right operand in `rax`, result in `rax`.
    fn gen_binary(&mut self, kind: BinOpKind, left: &Expr, right: &Expr) -> CodegenResult<()> {
        self.gen_expr(left)?;
        self.ins("push rax");
        self.gen_expr(right)?;
        self.ins("pop rbx");

        match kind {
            BinOpKind::Add => {
                self.ins("add rbx, rax");
                self.ins("mov rax, rbx");
            }
            BinOpKind::Sub => {
                self.ins("sub rbx, rax");
                self.ins("mov rax, rbx");
            }
            BinOpKind::Mul => self.ins("imul rax, rbx"),
            BinOpKind::Div | BinOpKind::Mod => {
                self.ins("mov rcx, rax");
                self.ins("mov rax, rbx");
                self.ins("cqo");
                self.ins("idiv rcx");
                if kind == BinOpKind::Mod {
                    self.ins("mov rax, rdx");
                }
            }
            BinOpKind::LogicalAnd => self.gen_logical_and(),
            BinOpKind::LogicalOr => self.gen_logical_or(),
            k if k.is_comparison() => {
                self.ins("cmp rbx, rax");
                self.gen_bool_from_jump(jump_if(k));
            }
            k => unreachable!("unhandled binary operator {:?}", k),
        }
        Ok(())
    }

    /// Sets `rax` to 1 when `jump` is taken on the current flags, 0 otherwise.
    fn gen_bool_from_jump(&mut self, jump: &str) {
        let true_label = self.new_label();
        let end_label = self.new_label();

        self.ins(&format!("{} {}", jump, true_label));
        self.ins("mov rax, 0");
        self.ins(&format!("jmp {}", end_label));
        self.label(&true_label);
        self.ins("mov rax, 1");
        self.label(&end_label);
    }

    /// Both operands are already evaluated; no short-circuit.
    fn gen_logical_and(&mut self) {
        let false_label = self.new_label();
        let end_label = self.new_label();

        self.ins("cmp rbx, 0");
        self.ins(&format!("je {}", false_label));
        self.ins("cmp rax, 0");
        self.ins(&format!("je {}", false_label));
        self.ins("mov rax, 1");
        self.ins(&format!("jmp {}", end_label));
        self.label(&false_label);
        self.ins("mov rax, 0");
        self.label(&end_label);
    }

    fn gen_logical_or(&mut self) {
        let true_label = self.new_label();
        let end_label = self.new_label();

        self.ins("cmp rbx, 0");
        self.ins(&format!("jne {}", true_label));
        self.ins("cmp rax, 0");
        self.ins(&format!("jne {}", true_label));
        self.ins("mov rax, 0");
        self.ins(&format!("jmp {}", end_label));
        self.label(&true_label);
        self.ins("mov rax, 1");
        self.label(&end_label);
    }

    /// Arguments are pushed last to first, so the first one sits at `rbp+16`
    /// in the callee. The caller pops them after the call.
    fn gen_call(&mut self, name: &str, args: &[Expr]) -> CodegenResult<()> {
        self.lookup(name)?;
        for arg in args.iter().rev() {
            self.gen_expr(arg)?;
            self.ins("push rax");
        }
        self.ins(&format!("call {}", symbol(name)));
        if !args.is_empty() {
            self.ins(&format!("add rsp, {}", args.len() * ARGUMENT_SLOT));
        }
        Ok(())
    }
}

/// Generates the assembly for an analyzed program.
pub fn generate(program: &Program, symbol_table: &SymbolTable) -> CodegenResult<String> {
    Codegen::new(symbol_table).generate(program)
}
