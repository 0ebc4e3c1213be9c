#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOpKind {
    LogicalOr,
    LogicalAnd,
    Equal,
    NotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOpKind {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOpKind::Equal
                | BinOpKind::NotEqual
                | BinOpKind::LessThan
                | BinOpKind::GreaterThan
                | BinOpKind::LessEqual
                | BinOpKind::GreaterEqual
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constant {
    Int(i64),
    Char(u8),
}

/// Something that can appear on the left of `=`.
#[derive(Clone, Debug, PartialEq)]
pub enum LValue {
    Ident(String),
    ArrayElement(String, Box<Expr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Assign(LValue, Box<Expr>),
    Binary(BinOpKind, Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Paren(Box<Expr>),
    Ident(String),
    ArrayAccess(String, Box<Expr>),
    Call(String, Vec<Expr>),
    Const(Constant),
}

impl Expr {
    pub fn binary(kind: BinOpKind, left: Expr, right: Expr) -> Self {
        Expr::Binary(kind, Box::new(left), Box::new(right))
    }

    pub fn int(value: i64) -> Self {
        Expr::Const(Constant::Int(value))
    }

    /// Turns a parsed expression into an assignment target, if it is one.
    pub fn into_lvalue(self) -> Option<LValue> {
        match self {
            Expr::Ident(name) => Some(LValue::Ident(name)),
            Expr::ArrayAccess(name, index) => Some(LValue::ArrayElement(name, index)),
            _ => None,
        }
    }
}
