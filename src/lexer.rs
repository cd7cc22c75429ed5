pub mod format;

use crate::parser::ast::{SourceId, Span};
use chumsky::span::Span as _;
use phf_macros::phf_map;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// A token represents a single meaningful unit in the source code with its position.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// The kind of token.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,

    Comma,
    Colon,
    Dot,
    Equal,

    Star,
    Amp,
    Plus,
    Minus,
    Slash,

    Identifier(String),
    String(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),

    /// `#:when tag` or `#:unless tag` at the top of a file.
    Directive { when: bool, tag: String },

    Package,
    Import,
    Type,
    Struct,
    Interface,
    Fn,
    Let,
    Const,
    Return,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Amp => write!(f, "&"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Slash => write!(f, "/"),

            TokenKind::Identifier(s) => write!(f, "{}", s),
            TokenKind::String(s) => write!(f, "\"{}\"", s),
            TokenKind::Float(d) => write!(f, "{}", d),
            TokenKind::Integer(i) => write!(f, "{}", i),
            TokenKind::Boolean(b) => write!(f, "{}", b),

            TokenKind::Directive { when: true, tag } => write!(f, "#:when {}", tag),
            TokenKind::Directive { when: false, tag } => write!(f, "#:unless {}", tag),

            TokenKind::Package => write!(f, "package"),
            TokenKind::Import => write!(f, "import"),
            TokenKind::Type => write!(f, "type"),
            TokenKind::Struct => write!(f, "struct"),
            TokenKind::Interface => write!(f, "interface"),
            TokenKind::Fn => write!(f, "fn"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Const => write!(f, "const"),
            TokenKind::Return => write!(f, "return"),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenKind> = phf_map! {
    "package" => TokenKind::Package,
    "import" => TokenKind::Import,
    "type" => TokenKind::Type,
    "struct" => TokenKind::Struct,
    "interface" => TokenKind::Interface,
    "fn" => TokenKind::Fn,
    "let" => TokenKind::Let,
    "const" => TokenKind::Const,
    "return" => TokenKind::Return,
    "true" => TokenKind::Boolean(true),
    "false" => TokenKind::Boolean(false),
};

/// Errors that can occur during lexical analysis.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum LexError {
    #[error("unexpected character")]
    UnexpectedChar(Span),
    #[error("unterminated string")]
    UnterminatedString(Span),
    #[error("malformed number literal")]
    MalformedNumber(Span),
    #[error("malformed directive")]
    MalformedDirective(Span),
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedChar(s)
            | LexError::UnterminatedString(s)
            | LexError::MalformedNumber(s)
            | LexError::MalformedDirective(s) => *s,
        }
    }
}

/// A lexical analyzer that converts source code into a stream of tokens.
pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
    position: usize,
    source: SourceId,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str, source: SourceId) -> Self {
        Self {
            input: input.chars().peekable(),
            position: 0,
            source,
        }
    }

    /// Collects all tokens from the input, separating successful tokens from errors.
    pub fn collect_all(&mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(err) => errors.push(err),
            }
        }

        (tokens, errors)
    }

    fn span(&self, start: usize) -> Span {
        Span::new(self.source, start..self.position)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.input.next()?;
        self.position += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(&ch) = self.input.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(&ch) = self.input.peek() {
            self.bump();
            if ch == '\n' {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&ch) = self.input.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                word.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn read_string(&mut self, start: usize) -> Result<Token, LexError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(LexError::UnterminatedString(self.span(start))),
                Some('"') => return Ok(Token::new(TokenKind::String(value), self.span(start))),
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    _ => return Err(LexError::UnterminatedString(self.span(start))),
                },
                Some(ch) => value.push(ch),
            }
        }
    }

    fn read_number(&mut self, first: char, start: usize) -> Result<Token, LexError> {
        let mut text = String::new();
        text.push(first);
        while let Some(&ch) = self.input.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        let mut is_float = false;
        if self.input.peek() == Some(&'.') {
            // Only consume the dot when a digit follows; `1.foo` stays `1` `.` `foo`.
            let mut ahead = self.input.clone();
            ahead.next();
            if ahead.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('.');
                self.bump();
                while let Some(&ch) = self.input.peek() {
                    if ch.is_ascii_digit() {
                        text.push(ch);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(|d| Token::new(TokenKind::Float(d), self.span(start)))
                .map_err(|_| LexError::MalformedNumber(self.span(start)))
        } else {
            text.parse::<i64>()
                .map(|i| Token::new(TokenKind::Integer(i), self.span(start)))
                .map_err(|_| LexError::MalformedNumber(self.span(start)))
        }
    }

    fn read_directive(&mut self, start: usize) -> Result<Token, LexError> {
        if self.bump() != Some(':') {
            return Err(LexError::MalformedDirective(self.span(start)));
        }
        let mode = self.read_word();
        let when = match mode.as_str() {
            "when" => true,
            "unless" => false,
            _ => return Err(LexError::MalformedDirective(self.span(start))),
        };
        while self.input.peek() == Some(&' ') {
            self.bump();
        }
        let tag = self.read_word();
        if tag.is_empty() {
            return Err(LexError::MalformedDirective(self.span(start)));
        }
        Ok(Token::new(TokenKind::Directive { when, tag }, self.span(start)))
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.skip_whitespace();
            let start = self.position;
            let source = self.source;
            let ch = self.bump()?;
            let simple = move |kind| Ok(Token::new(kind, Span::new(source, start..start + 1)));
            return Some(match ch {
                '(' => simple(TokenKind::LeftParen),
                ')' => simple(TokenKind::RightParen),
                '{' => simple(TokenKind::LeftBrace),
                '}' => simple(TokenKind::RightBrace),
                ',' => simple(TokenKind::Comma),
                ':' => simple(TokenKind::Colon),
                '.' => simple(TokenKind::Dot),
                '=' => simple(TokenKind::Equal),
                '*' => simple(TokenKind::Star),
                '&' => simple(TokenKind::Amp),
                '+' => simple(TokenKind::Plus),
                '-' => simple(TokenKind::Minus),
                '/' => {
                    if self.input.peek() == Some(&'/') {
                        self.skip_line_comment();
                        continue;
                    }
                    simple(TokenKind::Slash)
                }
                '#' => self.read_directive(start),
                '"' => self.read_string(start),
                ch if ch.is_ascii_digit() => self.read_number(ch, start),
                ch if ch.is_alphabetic() || ch == '_' => {
                    let mut word = String::new();
                    word.push(ch);
                    word.push_str(&self.read_word());
                    let kind = KEYWORDS
                        .get(word.as_str())
                        .cloned()
                        .unwrap_or(TokenKind::Identifier(word));
                    Ok(Token::new(kind, self.span(start)))
                }
                _ => Err(LexError::UnexpectedChar(self.span(start))),
            });
        }
    }
}
