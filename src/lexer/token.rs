use phf::phf_map;

pub(super) static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "int" => TokenKind::Int,
    "char" => TokenKind::Char,
    "void" => TokenKind::Void,
    "extern" => TokenKind::Extern,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "return" => TokenKind::Return,
};

pub(super) static TWO_SYMBOLS_TOKENS: phf::Map<&'static str, TokenKind> = phf_map! {
    "==" => TokenKind::DoubleEqual,
    "!=" => TokenKind::NotEqual,
    "<=" => TokenKind::LessEqual,
    ">=" => TokenKind::GreaterEqual,
    "&&" => TokenKind::LogicalAnd,
    "||" => TokenKind::LogicalOr,
};

pub(super) static ONE_SYMBOL_TOKENS: phf::Map<char, TokenKind> = phf_map! {
    '(' => TokenKind::OpenParen,
    ')' => TokenKind::CloseParen,
    '{' => TokenKind::OpenCurlyBrace,
    '}' => TokenKind::CloseCurlyBrace,
    '[' => TokenKind::OpenSquareBrace,
    ']' => TokenKind::CloseSquareBrace,
    ';' => TokenKind::SemiColon,
    ',' => TokenKind::Comma,
    '=' => TokenKind::Equal,
    '+' => TokenKind::Plus,
    '-' => TokenKind::Minus,
    '*' => TokenKind::Star,
    '/' => TokenKind::Slash,
    '%' => TokenKind::Percent,
    '!' => TokenKind::Exclamation,
    '<' => TokenKind::LessThan,
    '>' => TokenKind::GreaterThan,
};

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Num(i64),
    Character(u8),
    Ident(String),

    Int,
    Char,
    Void,
    Extern,
    If,
    Else,
    While,
    For,
    Return,

    OpenParen,
    CloseParen,
    OpenCurlyBrace,
    CloseCurlyBrace,
    OpenSquareBrace,
    CloseSquareBrace,
    SemiColon,
    Comma,

    Equal,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Exclamation,

    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
    DoubleEqual,
    NotEqual,
    LogicalAnd,
    LogicalOr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}
