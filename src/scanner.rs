//! Streaming lexer: source text in, [`Token`]s out.
//!
//! [`Scanner`] is an iterator of `Result<Token>`. Whitespace and `//` comments
//! never surface; a lexical error is yielded in place of a token and scanning
//! resumes right after the offending input, so one pass reports every bad
//! character. The stream always ends with a single `EOF` token.
//!
//! | Lexeme class      | Recognised as                                        |
//! |-------------------|------------------------------------------------------|
//! | punctuation       | `( ) { } , . - + ; *` and `/` when not a comment     |
//! | operators         | `!` `!=` `=` `==` `<` `<=` `>` `>=` (longest match)  |
//! | strings           | `"..."`, may span lines, no escapes                  |
//! | numbers           | digits with an optional `.digits` fraction           |
//! | words             | `[A-Za-z_][A-Za-z0-9_]*`, keywords via a `phf` table |
//!
//! Comment bodies are skipped with `memchr`.

use std::iter::FusedIterator;

use log::{debug, info};
use memchr::memchr;
use phf::phf_map;

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};

static KEYWORDS: phf::Map<&'static [u8], TokenType> = phf_map! {
    b"and"    => TokenType::AND,
    b"class"  => TokenType::CLASS,
    b"else"   => TokenType::ELSE,
    b"false"  => TokenType::FALSE,
    b"fun"    => TokenType::FUN,
    b"for"    => TokenType::FOR,
    b"if"     => TokenType::IF,
    b"nil"    => TokenType::NIL,
    b"or"     => TokenType::OR,
    b"print"  => TokenType::PRINT,
    b"return" => TokenType::RETURN,
    b"super"  => TokenType::SUPER,
    b"this"   => TokenType::THIS,
    b"true"   => TokenType::TRUE,
    b"var"    => TokenType::VAR,
    b"while"  => TokenType::WHILE,
};

/// Lexer over a borrowed source string.
pub struct Scanner<'a> {
    src: &'a str,
    bytes: &'a [u8],
    /// Byte offset where the lexeme being scanned begins.
    start: usize,
    /// Byte offset of the next unread byte.
    cursor: usize,
    line: usize,
    done: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            bytes: src.as_bytes(),
            start: 0,
            cursor: 0,
            line: 1,
            done: false,
        }
    }

    #[inline(always)]
    fn at_end(&self) -> bool {
        self.cursor >= self.bytes.len()
    }

    /// Byte `offset` positions past the cursor, or `0` beyond the input.
    #[inline(always)]
    fn look(&self, offset: usize) -> u8 {
        self.bytes.get(self.cursor + offset).copied().unwrap_or(0)
    }

    #[inline(always)]
    fn bump(&mut self) -> u8 {
        let b: u8 = self.bytes[self.cursor];
        self.cursor += 1;
        b
    }

    /// `long` if the next byte is `next` (consuming it), otherwise `short`.
    #[inline(always)]
    fn either(&mut self, next: u8, long: TokenType, short: TokenType) -> TokenType {
        if self.look(0) == next {
            self.cursor += 1;
            long
        } else {
            short
        }
    }

    #[inline(always)]
    fn lexeme(&self) -> &'a str {
        &self.src[self.start..self.cursor]
    }

    /// Consume one lexeme. `None` means it was trivia (whitespace or a
    /// comment) and produced no token.
    fn lex(&mut self) -> Option<Result<TokenType>> {
        let kind: TokenType = match self.bump() {
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b'-' => TokenType::MINUS,
            b'+' => TokenType::PLUS,
            b';' => TokenType::SEMICOLON,
            b'*' => TokenType::STAR,

            b'!' => self.either(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.either(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.either(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.either(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'/' if self.look(0) == b'/' => {
                // Stop on the newline so the next call counts it.
                self.cursor = match memchr(b'\n', &self.bytes[self.cursor..]) {
                    Some(offset) => self.cursor + offset,
                    None => self.bytes.len(),
                };
                return None;
            }
            b'/' => TokenType::SLASH,

            b' ' | b'\r' | b'\t' => return None,
            b'\n' => {
                self.line += 1;
                return None;
            }

            b'"' => return Some(self.string()),
            b'0'..=b'9' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.word(),

            _ => {
                // Skip the whole code point so multi-byte input reports once.
                if let Some(c) = self.src[self.start..].chars().next() {
                    self.cursor = self.start + c.len_utf8();
                    debug!("Unexpected character {:?} on line {}", c, self.line);
                }
                return Some(Err(LoxError::lex(self.line, "Unexpected character.")));
            }
        };

        Some(Ok(kind))
    }

    /// Rest of a string literal after its opening quote. Newlines inside the
    /// literal still advance the line counter.
    fn string(&mut self) -> Result<TokenType> {
        while !self.at_end() && self.look(0) != b'"' {
            if self.bump() == b'\n' {
                self.line += 1;
            }
        }

        if self.at_end() {
            return Err(LoxError::lex(self.line, "Unterminated string."));
        }
        self.cursor += 1;

        let text: &str = &self.src[self.start + 1..self.cursor - 1];
        Ok(TokenType::STRING(text.to_owned()))
    }

    fn number(&mut self) -> TokenType {
        let digits = |s: &mut Self| {
            while s.look(0).is_ascii_digit() {
                s.cursor += 1;
            }
        };

        digits(self);
        if self.look(0) == b'.' && self.look(1).is_ascii_digit() {
            self.cursor += 1;
            digits(self);
        }

        // digits with at most one interior dot always parse
        TokenType::NUMBER(self.lexeme().parse::<f64>().unwrap_or(0.0))
    }

    /// Identifier or reserved word.
    fn word(&mut self) -> TokenType {
        while matches!(self.look(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.cursor += 1;
        }

        KEYWORDS
            .get(self.lexeme().as_bytes())
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while !self.at_end() {
            self.start = self.cursor;

            match self.lex() {
                Some(Ok(kind)) => {
                    debug!("Scanned {:?} on line {}", kind, self.line);
                    return Some(Ok(Token::new(kind, self.lexeme(), self.line)));
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {}
            }
        }

        self.done = true;
        Some(Ok(Token::new(TokenType::EOF, "", self.line)))
    }
}

impl<'a> FusedIterator for Scanner<'a> {}

/// Scan all of `src`, separating tokens from errors. The token list always
/// ends with `EOF`.
pub fn scan_tokens(src: &str) -> (Vec<Token>, Vec<LoxError>) {
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<LoxError> = Vec::new();

    for result in Scanner::new(src) {
        match result {
            Ok(token) => tokens.push(token),
            Err(e) => errors.push(e),
        }
    }

    info!(
        "Scanned {} token(s) with {} error(s)",
        tokens.len(),
        errors.len()
    );

    (tokens, errors)
}
