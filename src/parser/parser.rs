use thiserror::Error;

use crate::analyzer::DataType;
use crate::lexer::{Token, TokenKind};

use super::{
    BinOpKind, Block, Constant, Declaration, DeclarationSuffix, Expr, FunctionSuffix,
    LocalDeclaration, Parameter, Program, Stmt, VariableSuffix,
};

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: unexpected token {found:?} (was expecting {expected})")]
    UnexpectedToken {
        found: TokenKind,
        expected: String,
        line: usize,
    },
    #[error("unexpected end of input (was expecting {expected})")]
    UnexpectedEof { expected: String },
    #[error("line {line}: left side of assignment is not assignable")]
    InvalidAssignmentTarget { line: usize },
    #[error("line {line}: extern declaration of {name} cannot have {what}")]
    ExternWithDefinition {
        name: String,
        what: &'static str,
        line: usize,
    },
}

#[derive(Debug)]
pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, index: 0 }
    }

    pub fn parse(&mut self) -> ParseResult<Program> {
        self.parse_program()
    }

    fn is_eof(&self) -> bool {
        self.index >= self.tokens.len()
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.index).map(|t| &t.kind)
    }

    fn current_line(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.index) {
            Some(t) => ParseError::UnexpectedToken {
                found: t.kind.clone(),
                expected: expected.to_string(),
                line: t.line,
            },
            None => ParseError::UnexpectedEof {
                expected: expected.to_string(),
            },
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.peek() != Some(kind) {
            return false;
        }
        self.index += 1;
        true
    }

    fn expect(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.consume(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("{:?}", kind)))
        }
    }

    fn consume_ident(&mut self) -> Option<String> {
        if let Some(TokenKind::Ident(name)) = self.peek() {
            let name = name.clone();
            self.index += 1;
            Some(name)
        } else {
            None
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        self.consume_ident()
            .ok_or_else(|| self.unexpected("identifier"))
    }

    fn expect_num(&mut self) -> ParseResult<i64> {
        if let Some(TokenKind::Num(value)) = self.peek() {
            let value = *value;
            self.index += 1;
            Ok(value)
        } else {
            Err(self.unexpected("integer constant"))
        }
    }

    fn parse_data_type(&mut self) -> Option<DataType> {
        if self.consume(&TokenKind::Int) {
            Some(DataType::Int)
        } else if self.consume(&TokenKind::Char) {
            Some(DataType::Char)
        } else {
            None
        }
    }

    fn expect_data_type(&mut self) -> ParseResult<DataType> {
        self.parse_data_type()
            .ok_or_else(|| self.unexpected("int or char"))
    }

    /// program = declaration*
    fn parse_program(&mut self) -> ParseResult<Program> {
        let mut declarations = vec![];

        while !self.is_eof() {
            declarations.push(self.parse_declaration()?);
        }

        Ok(Program(declarations))
    }

    /// declaration = "extern"? type ident ( "(" params ")" ( ";" | block ) | var_suffix ";" )
    fn parse_declaration(&mut self) -> ParseResult<Declaration> {
        let is_extern = self.consume(&TokenKind::Extern);
        let data_type = self.expect_data_type()?;
        let line = self.current_line();
        let name = self.expect_ident()?;

        let suffix = if self.consume(&TokenKind::OpenParen) {
            let params = self.parse_params()?;
            let body = if self.consume(&TokenKind::SemiColon) {
                None
            } else {
                Some(self.parse_block()?)
            };
            if is_extern && body.is_some() {
                return Err(ParseError::ExternWithDefinition {
                    name,
                    what: "a body",
                    line,
                });
            }
            DeclarationSuffix::Function(FunctionSuffix { params, body })
        } else {
            let suffix = self.parse_variable_suffix()?;
            self.expect(&TokenKind::SemiColon)?;
            if is_extern && matches!(suffix, VariableSuffix::Initializer(_)) {
                return Err(ParseError::ExternWithDefinition {
                    name,
                    what: "an initializer",
                    line,
                });
            }
            DeclarationSuffix::Variable(suffix)
        };

        Ok(Declaration {
            data_type,
            name,
            suffix,
            is_extern,
        })
    }

    /// var_suffix = ( "=" expr | "[" integer "]" )?
    fn parse_variable_suffix(&mut self) -> ParseResult<VariableSuffix> {
        if self.consume(&TokenKind::Equal) {
            Ok(VariableSuffix::Initializer(self.parse_expr()?))
        } else if self.consume(&TokenKind::OpenSquareBrace) {
            let size = self.expect_num()?;
            self.expect(&TokenKind::CloseSquareBrace)?;
            Ok(VariableSuffix::Array(size))
        } else {
            Ok(VariableSuffix::None)
        }
    }

    /// params = "void" | ε | param ("," param)*
    fn parse_params(&mut self) -> ParseResult<Vec<Parameter>> {
        let mut params = vec![];
        if self.consume(&TokenKind::CloseParen) {
            return Ok(params);
        }
        if self.consume(&TokenKind::Void) {
            self.expect(&TokenKind::CloseParen)?;
            return Ok(params);
        }

        params.push(self.parse_param()?);
        while self.consume(&TokenKind::Comma) {
            params.push(self.parse_param()?);
        }
        self.expect(&TokenKind::CloseParen)?;

        Ok(params)
    }

    /// param = type ident? ( "[" "]" )?
    fn parse_param(&mut self) -> ParseResult<Parameter> {
        let data_type = self.expect_data_type()?;
        let name = self.consume_ident();
        let is_array = if self.consume(&TokenKind::OpenSquareBrace) {
            self.expect(&TokenKind::CloseSquareBrace)?;
            true
        } else {
            false
        };

        Ok(Parameter {
            data_type,
            name,
            is_array,
        })
    }

    /// block = "{" stmt* "}"
    fn parse_block(&mut self) -> ParseResult<Block> {
        self.expect(&TokenKind::OpenCurlyBrace)?;
        let mut stmts = vec![];
        while !self.consume(&TokenKind::CloseCurlyBrace) {
            if self.is_eof() {
                return Err(self.unexpected("}"));
            }
            stmts.push(self.parse_stmt()?);
        }
        Ok(Block(stmts))
    }

    /// stmt = type ident var_suffix ";"
    ///      | "if" "(" expr ")" block ("else" (block | if-stmt))?
    ///      | "while" "(" expr ")" block
    ///      | "for" "(" expr? ";" expr? ";" expr? ")" block
    ///      | "return" expr? ";"
    ///      | block
    ///      | ";"
    ///      | expr ";"
    fn parse_stmt(&mut self) -> ParseResult<Stmt> {
        if let Some(data_type) = self.parse_data_type() {
            let name = self.expect_ident()?;
            let suffix = self.parse_variable_suffix()?;
            self.expect(&TokenKind::SemiColon)?;
            Ok(Stmt::Declaration(LocalDeclaration {
                data_type,
                name,
                suffix,
            }))
        } else if self.consume(&TokenKind::If) {
            self.parse_if()
        } else if self.consume(&TokenKind::While) {
            self.expect(&TokenKind::OpenParen)?;
            let cond = self.parse_expr()?;
            self.expect(&TokenKind::CloseParen)?;
            let body = self.parse_block()?;
            Ok(Stmt::While(cond, body))
        } else if self.consume(&TokenKind::For) {
            self.parse_for()
        } else if self.consume(&TokenKind::Return) {
            if self.consume(&TokenKind::SemiColon) {
                return Ok(Stmt::Return(None));
            }
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::SemiColon)?;
            Ok(Stmt::Return(Some(expr)))
        } else if self.peek() == Some(&TokenKind::OpenCurlyBrace) {
            Ok(Stmt::Block(self.parse_block()?))
        } else if self.consume(&TokenKind::SemiColon) {
            Ok(Stmt::Empty)
        } else {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::SemiColon)?;
            Ok(Stmt::Expr(expr))
        }
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::OpenParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::CloseParen)?;
        let then_block = self.parse_block()?;

        let else_block = if !self.consume(&TokenKind::Else) {
            None
        } else if self.consume(&TokenKind::If) {
            Some(Block(vec![self.parse_if()?]))
        } else {
            Some(self.parse_block()?)
        };

        Ok(Stmt::If(cond, then_block, else_block))
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        self.expect(&TokenKind::OpenParen)?;
        let init = self.parse_optional_expr(&TokenKind::SemiColon)?;
        let cond = self.parse_optional_expr(&TokenKind::SemiColon)?;
        let update = self.parse_optional_expr(&TokenKind::CloseParen)?;
        let body = self.parse_block()?;

        Ok(Stmt::For(init, cond, update, body))
    }

    /// expr? terminator
    fn parse_optional_expr(&mut self, terminator: &TokenKind) -> ParseResult<Option<Expr>> {
        if self.consume(terminator) {
            return Ok(None);
        }
        let expr = self.parse_expr()?;
        self.expect(terminator)?;
        Ok(Some(expr))
    }

    /// expr = assign
    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.parse_assign()
    }

    /// assign = or ("=" assign)?
    fn parse_assign(&mut self) -> ParseResult<Expr> {
        let line = self.current_line();
        let node = self.parse_or()?;
        if !self.consume(&TokenKind::Equal) {
            return Ok(node);
        }

        let target = node
            .into_lvalue()
            .ok_or(ParseError::InvalidAssignmentTarget { line })?;
        let value = self.parse_assign()?;
        Ok(Expr::Assign(target, Box::new(value)))
    }

    /// Parses `next (op next)*` for the operators in `ops`, left associative.
    fn parse_left_assoc(
        &mut self,
        ops: &[(TokenKind, BinOpKind)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut node = next(self)?;

        'outer: loop {
            for (token, kind) in ops {
                if self.consume(token) {
                    let right = next(self)?;
                    node = Expr::binary(*kind, node, right);
                    continue 'outer;
                }
            }
            return Ok(node);
        }
    }

    /// or = and ("||" and)*
    fn parse_or(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[(TokenKind::LogicalOr, BinOpKind::LogicalOr)],
            Self::parse_and,
        )
    }

    /// and = equality ("&&" equality)*
    fn parse_and(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[(TokenKind::LogicalAnd, BinOpKind::LogicalAnd)],
            Self::parse_equality,
        )
    }

    /// equality = relational ("==" relational | "!=" relational)*
    fn parse_equality(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[
                (TokenKind::DoubleEqual, BinOpKind::Equal),
                (TokenKind::NotEqual, BinOpKind::NotEqual),
            ],
            Self::parse_relational,
        )
    }

    /// relational = add ("<" add | "<=" add | ">" add | ">=" add)*
    fn parse_relational(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[
                (TokenKind::LessThan, BinOpKind::LessThan),
                (TokenKind::LessEqual, BinOpKind::LessEqual),
                (TokenKind::GreaterThan, BinOpKind::GreaterThan),
                (TokenKind::GreaterEqual, BinOpKind::GreaterEqual),
            ],
            Self::parse_add,
        )
    }

    /// add = mul ("+" mul | "-" mul)*
    fn parse_add(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[
                (TokenKind::Plus, BinOpKind::Add),
                (TokenKind::Minus, BinOpKind::Sub),
            ],
            Self::parse_mul,
        )
    }

    /// mul = unary ("*" unary | "/" unary | "%" unary)*
    fn parse_mul(&mut self) -> ParseResult<Expr> {
        self.parse_left_assoc(
            &[
                (TokenKind::Star, BinOpKind::Mul),
                (TokenKind::Slash, BinOpKind::Div),
                (TokenKind::Percent, BinOpKind::Mod),
            ],
            Self::parse_unary,
        )
    }

    /// unary = "!" unary | primary
    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.consume(&TokenKind::Exclamation) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    /// primary = num | character | "(" expr ")"
    ///         | ident ("(" (expr ("," expr)*)? ")" | "[" expr "]")?
    fn parse_primary(&mut self) -> ParseResult<Expr> {
        if self.consume(&TokenKind::OpenParen) {
            let expr = self.parse_expr()?;
            self.expect(&TokenKind::CloseParen)?;
            return Ok(Expr::Paren(Box::new(expr)));
        }

        if let Some(name) = self.consume_ident() {
            if self.consume(&TokenKind::OpenParen) {
                let mut args = vec![];
                if !self.consume(&TokenKind::CloseParen) {
                    args.push(self.parse_expr()?);
                    while self.consume(&TokenKind::Comma) {
                        args.push(self.parse_expr()?);
                    }
                    self.expect(&TokenKind::CloseParen)?;
                }
                return Ok(Expr::Call(name, args));
            }
            if self.consume(&TokenKind::OpenSquareBrace) {
                let index = self.parse_expr()?;
                self.expect(&TokenKind::CloseSquareBrace)?;
                return Ok(Expr::ArrayAccess(name, Box::new(index)));
            }
            return Ok(Expr::Ident(name));
        }

        match self.peek() {
            Some(&TokenKind::Num(value)) => {
                self.index += 1;
                Ok(Expr::Const(Constant::Int(value)))
            }
            Some(&TokenKind::Character(value)) => {
                self.index += 1;
                Ok(Expr::Const(Constant::Char(value)))
            }
            _ => Err(self.unexpected("expression")),
        }
    }
}

/// Parses a token stream into a [`Program`], or rejects it.
pub fn parse(tokens: Vec<Token>) -> ParseResult<Program> {
    Parser::new(tokens).parse()
}
