use thiserror::Error;

use super::{
    token::{KEYWORDS, ONE_SYMBOL_TOKENS, TWO_SYMBOLS_TOKENS},
    Token, TokenKind,
};

pub type LexResult<T> = Result<T, LexError>;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum LexError {
    #[error("line {line}: can't tokenize {found:?}")]
    UnexpectedChar { found: char, line: usize },
    #[error("line {line}: integer literal {literal} is out of range")]
    IntegerOverflow { literal: String, line: usize },
    #[error("line {line}: malformed character literal")]
    MalformedCharacter { line: usize },
    #[error("line {line}: unterminated comment")]
    UnterminatedComment { line: usize },
}

#[derive(Debug)]
pub struct Lexer {
    tokens: Vec<Token>,
    index: usize,
    line: usize,
}

impl Lexer {
    fn new() -> Self {
        Self {
            tokens: vec![],
            index: 0,
            line: 1,
        }
    }

    fn new_token(&mut self, kind: TokenKind, len: usize) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
        self.index += len;
    }

    fn parse_number(&mut self, chars: &[char]) -> LexResult<()> {
        let s: String = chars.iter().take_while(|c| c.is_ascii_digit()).collect();
        let value = s.parse().map_err(|_| LexError::IntegerOverflow {
            literal: s.clone(),
            line: self.line,
        })?;
        self.new_token(TokenKind::Num(value), s.len());
        Ok(())
    }

    fn parse_identifier(&mut self, chars: &[char]) {
        let s: String = chars
            .iter()
            .take_while(|&&c| c.is_ascii_alphanumeric() || c == '_')
            .collect();

        let len = s.len();
        if let Some(kind) = KEYWORDS.get(s.as_str()) {
            self.new_token(kind.clone(), len);
        } else {
            self.new_token(TokenKind::Ident(s), len);
        }
    }

    /// character = "'" ( [^'\\] | "\\" [ntr0\\'"] ) "'"
    fn parse_character(&mut self, chars: &[char]) -> LexResult<()> {
        let malformed = LexError::MalformedCharacter { line: self.line };
        let (value, len) = match chars.get(1) {
            Some('\\') => {
                let value = match chars.get(2) {
                    Some('n') => b'\n',
                    Some('t') => b'\t',
                    Some('r') => b'\r',
                    Some('0') => b'\0',
                    Some('\\') => b'\\',
                    Some('\'') => b'\'',
                    Some('"') => b'"',
                    _ => return Err(malformed),
                };
                (value, 4)
            }
            Some(&c) if c != '\'' && c != '\n' && c.is_ascii() => (c as u8, 3),
            _ => return Err(malformed),
        };
        if chars.get(len - 1) != Some(&'\'') {
            return Err(malformed);
        }
        self.new_token(TokenKind::Character(value), len);
        Ok(())
    }

    fn skip_line_comment(&mut self, chars: &[char]) {
        while self.index < chars.len() && chars[self.index] != '\n' {
            self.index += 1;
        }
    }

    fn skip_block_comment(&mut self, chars: &[char]) -> LexResult<()> {
        let start_line = self.line;
        self.index += 2;
        while self.index < chars.len() {
            if chars[self.index] == '*' && chars.get(self.index + 1) == Some(&'/') {
                self.index += 2;
                return Ok(());
            }
            if chars[self.index] == '\n' {
                self.line += 1;
            }
            self.index += 1;
        }
        Err(LexError::UnterminatedComment { line: start_line })
    }

    fn _tokenize(&mut self, s: &str) -> LexResult<()> {
        let chars: Vec<_> = s.chars().collect();

        while self.index < chars.len() {
            let c = chars[self.index];
            let c2 = chars[self.index..].iter().take(2).collect::<String>();

            if c == '\n' {
                self.line += 1;
                self.index += 1;
            } else if c.is_whitespace() {
                self.index += 1;
            } else if c2 == "//" {
                self.skip_line_comment(&chars);
            } else if c2 == "/*" {
                self.skip_block_comment(&chars)?;
            } else if c.is_ascii_digit() {
                self.parse_number(&chars[self.index..])?;
            } else if c.is_ascii_alphabetic() || c == '_' {
                self.parse_identifier(&chars[self.index..]);
            } else if c == '\'' {
                self.parse_character(&chars[self.index..])?;
            } else if let Some(kind) = TWO_SYMBOLS_TOKENS.get(c2.as_str()) {
                self.new_token(kind.clone(), 2);
            } else if let Some(kind) = ONE_SYMBOL_TOKENS.get(&c) {
                self.new_token(kind.clone(), 1);
            } else {
                return Err(LexError::UnexpectedChar {
                    found: c,
                    line: self.line,
                });
            }
        }
        Ok(())
    }

    pub fn tokenize(s: &str) -> LexResult<Vec<Token>> {
        let mut lexer = Lexer::new();
        lexer._tokenize(s)?;

        Ok(lexer.tokens)
    }
}
