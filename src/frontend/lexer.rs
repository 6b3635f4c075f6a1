use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

use crate::frontend::token::{SourceLocation, Token, TokenKind, TokenValue};

/// Maximum byte length of a string literal segment. A segment of exactly
/// this length lexes fine; one more byte is a `BufferOverflow`.
pub const MAX_STRING_LENGTH: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerErrorKind {
    None,
    InvalidChar,
    InvalidString,
    InvalidNumber,
    InvalidIdentifier,
    UnterminatedComment,
    UnterminatedString,
    StringTooLong,
    InvalidEscape,
    BufferOverflow,
    Memory,
    FileIo,
}

/// The most recent lexer error. One record per lexer, updated on each
/// token call; `kind == None` means the last call succeeded.
#[derive(Debug, Clone, Error)]
#[error("{location}: {message}")]
pub struct LexerError {
    pub kind: LexerErrorKind,
    pub message: String,
    pub location: SourceLocation,
}

impl LexerError {
    fn none(location: SourceLocation) -> Self {
        LexerError {
            kind: LexerErrorKind::None,
            message: String::new(),
            location,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind != LexerErrorKind::None
    }
}

#[derive(Debug, Clone)]
pub struct LexerConfig {
    pub file_name: String,
    pub tab_width: usize,
    pub skip_whitespace: bool,
    pub include_comments: bool,
    pub track_line_endings: bool,
}

impl Default for LexerConfig {
    fn default() -> Self {
        LexerConfig {
            file_name: "input.osfl".to_string(),
            tab_width: 4,
            skip_whitespace: true,
            include_comments: false,
            track_line_endings: true,
        }
    }
}

/// Byte-driven lexer.
///
/// Works over raw bytes so that identifiers may contain high-bit bytes and
/// columns advance per byte. Tokens are produced on demand via [`Lexer::next`]
/// and [`Lexer::peek`]; the most recent error is retrievable via
/// [`Lexer::error`].
pub struct Lexer {
    source: Vec<u8>,
    pos: usize,
    line: u32,
    column: u32,
    config: LexerConfig,
    file: Rc<str>,
    error: LexerError,
    /// Tokens already produced but not yet consumed. Interpolation splits a
    /// single string into several tokens, and `peek` produces one ahead.
    pending: VecDeque<Token>,
    /// Brace-nesting depth per suspended `${ … }` interpolation. The top
    /// entry belongs to the innermost interpolation currently being lexed.
    interp_stack: Vec<u32>,
    /// Kind of the last significant token, for regex/division disambiguation.
    prev_kind: Option<TokenKind>,
}

impl Lexer {
    pub fn new(source: &str, config: LexerConfig) -> Self {
        let file: Rc<str> = Rc::from(config.file_name.as_str());
        Lexer {
            source: source.as_bytes().to_vec(),
            pos: 0,
            line: 1,
            column: 1,
            error: LexerError::none(SourceLocation::new(file.clone(), 1, 1)),
            config,
            file,
            pending: VecDeque::new(),
            interp_stack: Vec::new(),
            prev_kind: None,
        }
    }

    pub fn with_defaults(source: &str) -> Self {
        Lexer::new(source, LexerConfig::default())
    }

    /// Consume and return the next token. Clears the error record first;
    /// if this call fails the returned token has kind `Error` and the
    /// record describes the failure.
    pub fn next(&mut self) -> Token {
        self.error = LexerError::none(self.location());
        let token = match self.pending.pop_front() {
            Some(token) => token,
            None => self.produce(),
        };
        match token.kind {
            TokenKind::Whitespace | TokenKind::Newline | TokenKind::Comment => {}
            kind => self.prev_kind = Some(kind),
        }
        token
    }

    /// Return the next token without consuming it.
    pub fn peek(&mut self) -> Token {
        if self.pending.is_empty() {
            let token = self.produce();
            self.pending.push_back(token);
        }
        self.pending.front().cloned().expect("pending token")
    }

    /// The most recent error state.
    pub fn error(&self) -> &LexerError {
        &self.error
    }

    /// Drive the lexer to completion: collect tokens up to and including
    /// the EOF token, or stop at the first `Error` token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next();
            let kind = token.kind;
            tokens.push(token);
            if kind == TokenKind::Eof || kind == TokenKind::Error {
                break;
            }
        }
        tokens
    }

    // ------------------------------------------------------------------
    // Character management
    // ------------------------------------------------------------------

    fn current(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.source.get(self.pos + 1).copied()
    }

    fn peek_byte2(&self) -> Option<u8> {
        self.source.get(self.pos + 2).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.source.len()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.current();
        if b == Some(b'\n') {
            self.line += 1;
            self.column = 1;
        } else if b.is_some() {
            self.column += 1;
        }
        self.pos += 1;
        b
    }

    fn location(&self) -> SourceLocation {
        SourceLocation::new(self.file.clone(), self.line, self.column)
    }

    // ------------------------------------------------------------------
    // Error helpers
    // ------------------------------------------------------------------

    fn fail(
        &mut self,
        kind: LexerErrorKind,
        message: String,
        location: SourceLocation,
        lexeme: String,
    ) -> Token {
        self.error = LexerError {
            kind,
            message,
            location: location.clone(),
        };
        Token::new(TokenKind::Error, lexeme, location)
    }

    // ------------------------------------------------------------------
    // Token production
    // ------------------------------------------------------------------

    fn produce(&mut self) -> Token {
        loop {
            let location = self.location();
            let b = match self.current() {
                Some(b) => b,
                None => return Token::eof(location),
            };

            match b {
                b' ' | b'\t' | b'\r' => {
                    let token = self.scan_whitespace(location);
                    if let Some(token) = token {
                        return token;
                    }
                }
                b'\n' => {
                    self.advance();
                    if self.config.track_line_endings {
                        return Token::new(TokenKind::Newline, "\n", location);
                    }
                }
                b'/' if self.peek_byte() == Some(b'/') => {
                    let token = self.scan_line_comment(location);
                    if let Some(token) = token {
                        return token;
                    }
                }
                b'/' if self.peek_byte() == Some(b'*') => {
                    match self.scan_block_comment(location) {
                        Ok(Some(token)) => return token,
                        Ok(None) => {}
                        Err(token) => return token,
                    }
                }
                b'"' => return self.scan_string_or_docstring(location),
                b'/' if self.regex_position() => return self.scan_regex(location),
                b'0'..=b'9' => return self.scan_number(location),
                _ if is_identifier_start(b) => return self.scan_identifier(location),
                _ => return self.scan_operator(location),
            }
        }
    }

    fn scan_whitespace(&mut self, location: SourceLocation) -> Option<Token> {
        let start = self.pos;
        while matches!(self.current(), Some(b' ') | Some(b'\t') | Some(b'\r')) {
            self.advance();
        }
        if self.config.skip_whitespace {
            None
        } else {
            let text = self.lexeme_from(start);
            Some(Token::new(TokenKind::Whitespace, text, location))
        }
    }

    fn scan_line_comment(&mut self, location: SourceLocation) -> Option<Token> {
        self.advance();
        self.advance();
        let start = self.pos;
        while let Some(b) = self.current() {
            if b == b'\n' {
                break;
            }
            self.advance();
        }
        if self.config.include_comments {
            let text = self.lexeme_from(start).trim().to_string();
            Some(Token::new(TokenKind::Comment, text, location))
        } else {
            None
        }
    }

    fn scan_block_comment(&mut self, location: SourceLocation) -> Result<Option<Token>, Token> {
        self.advance();
        self.advance();
        let start = self.pos;
        let mut end = self.pos;
        let mut closed = false;
        while let Some(b) = self.current() {
            if b == b'*' && self.peek_byte() == Some(b'/') {
                end = self.pos;
                self.advance();
                self.advance();
                closed = true;
                break;
            }
            self.advance();
        }
        if !closed {
            return Err(self.fail(
                LexerErrorKind::UnterminatedComment,
                "unterminated block comment".to_string(),
                location.clone(),
                self.lexeme_from(start),
            ));
        }
        if self.config.include_comments {
            let text = String::from_utf8_lossy(&self.source[start..end])
                .trim()
                .to_string();
            Ok(Some(Token::new(TokenKind::Comment, text, location)))
        } else {
            Ok(None)
        }
    }

    // ------------------------------------------------------------------
    // Identifiers and keywords
    // ------------------------------------------------------------------

    fn scan_identifier(&mut self, location: SourceLocation) -> Token {
        let start = self.pos;
        while let Some(b) = self.current() {
            if is_identifier_part(b) {
                self.advance();
            } else {
                break;
            }
        }
        let text = self.lexeme_from(start);

        match text.as_str() {
            "true" => Token::boolean(true, text, location),
            "false" => Token::boolean(false, text, location),
            _ => match TokenKind::keyword(&text) {
                Some(kind) => Token::new(kind, text, location),
                None => Token::new(TokenKind::Identifier, text, location),
            },
        }
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    fn scan_number(&mut self, location: SourceLocation) -> Token {
        let start = self.pos;

        // Radix-prefixed integers: 0x / 0b / 0o.
        if self.current() == Some(b'0') {
            let radix = match self.peek_byte() {
                Some(b'x') | Some(b'X') => Some(16),
                Some(b'b') | Some(b'B') => Some(2),
                Some(b'o') | Some(b'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits_start = self.pos;
                while let Some(b) = self.current() {
                    if b.is_ascii_alphanumeric() || b == b'_' {
                        self.advance();
                    } else {
                        break;
                    }
                }
                let lexeme = self.lexeme_from(start);
                let digits: String = self.source[digits_start..self.pos]
                    .iter()
                    .map(|&b| b as char)
                    .filter(|&c| c != '_')
                    .collect();
                if digits.is_empty() {
                    return self.fail(
                        LexerErrorKind::InvalidNumber,
                        format!("expected digits after '{}'", &lexeme),
                        location.clone(),
                        lexeme,
                    );
                }
                return match i64::from_str_radix(&digits, radix) {
                    Ok(value) => Token::int(value, lexeme, location),
                    Err(_) => self.fail(
                        LexerErrorKind::InvalidNumber,
                        format!("invalid base-{} literal '{}'", radix, lexeme),
                        location.clone(),
                        lexeme,
                    ),
                };
            }
        }

        // Decimal integer, possibly a float.
        let mut digits = String::new();
        let mut is_float = false;
        self.collect_digits(&mut digits);

        if self.current() == Some(b'.')
            && self.peek_byte().map(|b| b.is_ascii_digit()).unwrap_or(false)
        {
            is_float = true;
            digits.push('.');
            self.advance();
            self.collect_digits(&mut digits);

            if matches!(self.current(), Some(b'e') | Some(b'E')) {
                digits.push('e');
                self.advance();
                if matches!(self.current(), Some(b'+') | Some(b'-')) {
                    digits.push(self.advance().unwrap() as char);
                }
                let before = digits.len();
                self.collect_digits(&mut digits);
                if digits.len() == before {
                    let lexeme = self.lexeme_from(start);
                    return self.fail(
                        LexerErrorKind::InvalidNumber,
                        format!("missing exponent digits in '{}'", lexeme),
                        location.clone(),
                        lexeme,
                    );
                }
            }
        }

        let lexeme = self.lexeme_from(start);
        if is_float {
            match digits.parse::<f64>() {
                Ok(value) => Token::float(value, lexeme, location),
                Err(_) => self.fail(
                    LexerErrorKind::InvalidNumber,
                    format!("invalid float literal '{}'", lexeme),
                    location.clone(),
                    lexeme,
                ),
            }
        } else {
            match digits.parse::<i64>() {
                Ok(value) => Token::int(value, lexeme, location),
                Err(_) => self.fail(
                    LexerErrorKind::InvalidNumber,
                    format!("invalid integer literal '{}'", lexeme),
                    location.clone(),
                    lexeme,
                ),
            }
        }
    }

    /// Append ASCII digits to `out`, skipping underscores between them.
    fn collect_digits(&mut self, out: &mut String) {
        while let Some(b) = self.current() {
            if b.is_ascii_digit() {
                out.push(b as char);
                self.advance();
            } else if b == b'_' {
                self.advance();
            } else {
                break;
            }
        }
    }

    // ------------------------------------------------------------------
    // Strings, docstrings, interpolation
    // ------------------------------------------------------------------

    fn scan_string_or_docstring(&mut self, location: SourceLocation) -> Token {
        if self.peek_byte() == Some(b'"') && self.peek_byte2() == Some(b'"') {
            return self.scan_docstring(location);
        }
        self.advance(); // opening quote
        self.scan_string_body(location)
    }

    /// Scan string content starting either just after the opening quote or
    /// at the resume point after an `${ … }` interpolation. Returns the
    /// String token for the accumulated text; encountering `${` queues an
    /// `InterpolationStart` behind it.
    fn scan_string_body(&mut self, location: SourceLocation) -> Token {
        // Accumulated in bytes: the length cap counts bytes, and the
        // source may carry multi-byte sequences.
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match self.current() {
                Some(b'"') => {
                    self.advance();
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    return Token::string(text.clone(), text, location);
                }
                Some(b'\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some(b'n') => b'\n',
                        Some(b't') => b'\t',
                        Some(b'\\') => b'\\',
                        Some(b'"') => b'"',
                        Some(other) => {
                            let loc = self.location();
                            return self.fail(
                                LexerErrorKind::InvalidEscape,
                                format!("invalid escape sequence '\\{}'", other as char),
                                loc,
                                format!("\\{}", other as char),
                            );
                        }
                        None => {
                            return self.fail(
                                LexerErrorKind::UnterminatedString,
                                "unterminated string literal".to_string(),
                                location.clone(),
                                String::from_utf8_lossy(&buf).into_owned(),
                            );
                        }
                    };
                    if buf.len() >= MAX_STRING_LENGTH {
                        return self.string_overflow(location, &buf);
                    }
                    buf.push(escaped);
                    self.advance();
                }
                Some(b'$') if self.peek_byte() == Some(b'{') => {
                    // Flush the accumulated text, then surface the marker.
                    let marker_loc = self.location();
                    self.advance();
                    self.advance();
                    self.interp_stack.push(0);
                    self.pending
                        .push_back(Token::new(TokenKind::InterpStart, "${", marker_loc));
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    return Token::string(text.clone(), text, location);
                }
                Some(b) => {
                    if buf.len() >= MAX_STRING_LENGTH {
                        return self.string_overflow(location, &buf);
                    }
                    buf.push(b);
                    self.advance();
                }
                None => {
                    return self.fail(
                        LexerErrorKind::UnterminatedString,
                        "unterminated string literal".to_string(),
                        location.clone(),
                        String::from_utf8_lossy(&buf).into_owned(),
                    );
                }
            }
        }
    }

    fn string_overflow(&mut self, location: SourceLocation, buf: &[u8]) -> Token {
        let text = String::from_utf8_lossy(buf).into_owned();
        self.fail(
            LexerErrorKind::BufferOverflow,
            format!(
                "string literal exceeds maximum length of {} bytes",
                MAX_STRING_LENGTH
            ),
            location,
            text,
        )
    }

    fn scan_docstring(&mut self, location: SourceLocation) -> Token {
        self.advance();
        self.advance();
        self.advance();
        let start = self.pos;
        loop {
            if self.at_end() {
                return self.fail(
                    LexerErrorKind::UnterminatedString,
                    "unterminated docstring".to_string(),
                    location.clone(),
                    self.lexeme_from(start),
                );
            }
            if self.current() == Some(b'"')
                && self.peek_byte() == Some(b'"')
                && self.peek_byte2() == Some(b'"')
            {
                let text = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                self.advance();
                self.advance();
                self.advance();
                let mut token = Token::new(TokenKind::Docstring, text.clone(), location);
                token.value = Some(TokenValue::Str(text));
                return token;
            }
            self.advance();
        }
    }

    /// `/` starts a regex only where an expression may begin: after a token
    /// that cannot end an expression. `//` and `/*` are already handled as
    /// comments before this is consulted.
    fn regex_position(&self) -> bool {
        !self.prev_kind.map(|k| k.can_end_expression()).unwrap_or(false)
    }

    fn scan_regex(&mut self, location: SourceLocation) -> Token {
        self.advance(); // opening slash
        let start = self.pos;
        loop {
            match self.current() {
                Some(b'/') => {
                    let body = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
                    self.advance();
                    let mut token = Token::new(TokenKind::Regex, format!("/{}/", body), location);
                    token.value = Some(TokenValue::Str(body));
                    return token;
                }
                Some(b'\\') => {
                    // A backslash escape keeps the following byte.
                    self.advance();
                    if self.current().is_some() {
                        self.advance();
                    }
                }
                Some(b'\n') | None => {
                    return self.fail(
                        LexerErrorKind::UnterminatedString,
                        "unterminated regex literal".to_string(),
                        location.clone(),
                        self.lexeme_from(start),
                    );
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Operators, delimiters, interpolation end
    // ------------------------------------------------------------------

    fn scan_operator(&mut self, location: SourceLocation) -> Token {
        let b = self.current().expect("operator byte");
        let p = self.peek_byte();

        // Interpolation bookkeeping: a bare `}` while inside `${ … }`
        // closes the interpolation and resumes the surrounding string.
        if b == b'}' {
            if let Some(depth) = self.interp_stack.last().copied() {
                if depth == 0 {
                    self.advance();
                    self.interp_stack.pop();
                    let resume_loc = self.location();
                    let token = Token::new(TokenKind::InterpEnd, "}", location);
                    // Queue the rest of the string behind the marker. The
                    // rest-scan may itself queue the next InterpolationStart,
                    // which must come after its own text segment.
                    let rest = self.scan_string_body(resume_loc);
                    self.pending.push_front(rest);
                    return token;
                }
                *self.interp_stack.last_mut().unwrap() = depth - 1;
                self.advance();
                return Token::new(TokenKind::RBrace, "}", location);
            }
        }
        if b == b'{' {
            if let Some(depth) = self.interp_stack.last_mut() {
                *depth += 1;
            }
            self.advance();
            return Token::new(TokenKind::LBrace, "{", location);
        }

        // Two-byte operators.
        let two = |kind: TokenKind, text: &str, lexer: &mut Lexer| {
            lexer.advance();
            lexer.advance();
            Token::new(kind, text, location.clone())
        };
        match (b, p) {
            (b'+', Some(b'+')) => return two(TokenKind::Increment, "++", self),
            (b'-', Some(b'-')) => return two(TokenKind::Decrement, "--", self),
            (b'*', Some(b'*')) => return two(TokenKind::Power, "**", self),
            (b'=', Some(b'=')) => return two(TokenKind::Eq, "==", self),
            (b'!', Some(b'=')) => return two(TokenKind::NotEq, "!=", self),
            (b'<', Some(b'=')) => return two(TokenKind::LtEq, "<=", self),
            (b'>', Some(b'=')) => return two(TokenKind::GtEq, ">=", self),
            (b'<', Some(b'<')) => return two(TokenKind::Shl, "<<", self),
            (b'>', Some(b'>')) => return two(TokenKind::Shr, ">>", self),
            (b'&', Some(b'&')) => return two(TokenKind::And, "&&", self),
            (b'|', Some(b'|')) => return two(TokenKind::Or, "||", self),
            (b'+', Some(b'=')) => return two(TokenKind::PlusAssign, "+=", self),
            (b'-', Some(b'=')) => return two(TokenKind::MinusAssign, "-=", self),
            (b'*', Some(b'=')) => return two(TokenKind::StarAssign, "*=", self),
            (b'/', Some(b'=')) => return two(TokenKind::SlashAssign, "/=", self),
            (b'%', Some(b'=')) => return two(TokenKind::PercentAssign, "%=", self),
            (b'-', Some(b'>')) => return two(TokenKind::Arrow, "->", self),
            (b'=', Some(b'>')) => return two(TokenKind::DoubleArrow, "=>", self),
            (b':', Some(b':')) => return two(TokenKind::DoubleColon, "::", self),
            _ => {}
        }

        let kind = match b {
            b'+' => TokenKind::Plus,
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'&' => TokenKind::BitAnd,
            b'|' => TokenKind::BitOr,
            b'^' => TokenKind::BitXor,
            b'~' => TokenKind::BitNot,
            b'!' => TokenKind::Not,
            b'=' => TokenKind::Assign,
            b'<' => TokenKind::Lt,
            b'>' => TokenKind::Gt,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'[' => TokenKind::LBracket,
            b']' => TokenKind::RBracket,
            b',' => TokenKind::Comma,
            b'.' => TokenKind::Dot,
            b';' => TokenKind::Semicolon,
            b':' => TokenKind::Colon,
            other => {
                self.advance();
                return self.fail(
                    LexerErrorKind::InvalidChar,
                    format!("invalid character '{}'", other as char),
                    location.clone(),
                    (other as char).to_string(),
                );
            }
        };
        self.advance();
        Token::new(kind, (b as char).to_string(), location)
    }

    fn lexeme_from(&self, start: usize) -> String {
        String::from_utf8_lossy(&self.source[start..self.pos]).into_owned()
    }
}

fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b >= 0x80
}

fn is_identifier_part(b: u8) -> bool {
    is_identifier_start(b) || b.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::with_defaults(source);
        lexer
            .tokenize()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !matches!(k, TokenKind::Newline | TokenKind::Eof))
            .collect()
    }

    fn tokens(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::with_defaults(source);
        lexer
            .tokenize()
            .into_iter()
            .filter(|t| !matches!(t.kind, TokenKind::Newline | TokenKind::Eof))
            .collect()
    }

    fn lex_error(source: &str) -> LexerError {
        let mut lexer = Lexer::with_defaults(source);
        let toks = lexer.tokenize();
        assert_eq!(
            toks.last().map(|t| t.kind),
            Some(TokenKind::Error),
            "expected an error token for {:?}",
            source
        );
        lexer.error().clone()
    }

    // --------------------
    // Keywords and identifiers
    // --------------------

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("frame var const func return if else elif while for"),
            vec![
                TokenKind::Frame,
                TokenKind::Var,
                TokenKind::Const,
                TokenKind::Func,
                TokenKind::Return,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Elif,
                TokenKind::While,
                TokenKind::For,
            ]
        );
        assert_eq!(
            kinds("switch try catch class import on_error retry reset null in loop"),
            vec![
                TokenKind::Switch,
                TokenKind::Try,
                TokenKind::Catch,
                TokenKind::Class,
                TokenKind::Import,
                TokenKind::OnError,
                TokenKind::Retry,
                TokenKind::Reset,
                TokenKind::Null,
                TokenKind::In,
                TokenKind::Loop,
            ]
        );
    }

    #[test]
    fn test_keyword_vs_identifier() {
        let t = tokens("frame frames iffy if");
        assert_eq!(t[0].kind, TokenKind::Frame);
        assert_eq!(t[1].kind, TokenKind::Identifier);
        assert_eq!(t[1].lexeme, "frames");
        assert_eq!(t[2].kind, TokenKind::Identifier);
        assert_eq!(t[3].kind, TokenKind::If);
    }

    #[test]
    fn test_booleans_decode() {
        let t = tokens("true false");
        assert_eq!(t[0].kind, TokenKind::Bool);
        assert_eq!(t[0].value, Some(TokenValue::Bool(true)));
        assert_eq!(t[1].value, Some(TokenValue::Bool(false)));
    }

    #[test]
    fn test_high_bit_identifier() {
        // Identifiers admit bytes with the high bit set.
        let t = tokens("größe = 1");
        assert_eq!(t[0].kind, TokenKind::Identifier);
        assert_eq!(t[0].lexeme, "größe");
        assert_eq!(t[1].kind, TokenKind::Assign);
    }

    // --------------------
    // Numbers
    // --------------------

    #[test]
    fn test_integer_radixes() {
        let t = tokens("123 0x2A 0b1010 0o17");
        assert_eq!(t[0].value, Some(TokenValue::Int(123)));
        assert_eq!(t[1].value, Some(TokenValue::Int(42)));
        assert_eq!(t[2].value, Some(TokenValue::Int(10)));
        assert_eq!(t[3].value, Some(TokenValue::Int(15)));
    }

    #[test]
    fn test_radix_zero_forms() {
        for src in ["0", "0x0", "0b0", "0o0"] {
            let t = tokens(src);
            assert_eq!(t[0].value, Some(TokenValue::Int(0)), "source {:?}", src);
        }
    }

    #[test]
    fn test_underscores_in_digits() {
        let t = tokens("1_000_000 0xFF_FF 3.141_59");
        assert_eq!(t[0].value, Some(TokenValue::Int(1_000_000)));
        assert_eq!(t[1].value, Some(TokenValue::Int(0xFFFF)));
        assert_eq!(t[2].value, Some(TokenValue::Float(3.14159)));
    }

    #[test]
    fn test_floats() {
        let t = tokens("3.14 2.5e3 1.0e-2 7.5E+1");
        assert_eq!(t[0].value, Some(TokenValue::Float(3.14)));
        assert_eq!(t[1].value, Some(TokenValue::Float(2500.0)));
        assert_eq!(t[2].value, Some(TokenValue::Float(0.01)));
        assert_eq!(t[3].value, Some(TokenValue::Float(75.0)));
    }

    #[test]
    fn test_dot_without_digit_is_member_access() {
        assert_eq!(
            kinds("1.foo"),
            vec![TokenKind::Integer, TokenKind::Dot, TokenKind::Identifier]
        );
    }

    #[test]
    fn test_invalid_hex_error() {
        let err = lex_error("0x");
        assert_eq!(err.kind, LexerErrorKind::InvalidNumber);
    }

    #[test]
    fn test_invalid_binary_digits_error() {
        let err = lex_error("0b102");
        assert_eq!(err.kind, LexerErrorKind::InvalidNumber);
    }

    #[test]
    fn test_missing_exponent_digits_error() {
        let err = lex_error("1.5e");
        assert_eq!(err.kind, LexerErrorKind::InvalidNumber);
    }

    // --------------------
    // Strings
    // --------------------

    #[test]
    fn test_string_with_escapes() {
        let t = tokens(r#""a\nb\tc\\d\"e""#);
        assert_eq!(t[0].kind, TokenKind::Str);
        assert_eq!(t[0].str_value(), Some("a\nb\tc\\d\"e"));
    }

    #[test]
    fn test_invalid_escape() {
        let err = lex_error(r#""bad\q""#);
        assert_eq!(err.kind, LexerErrorKind::InvalidEscape);
    }

    #[test]
    fn test_unterminated_string() {
        let err = lex_error("\"never closed");
        assert_eq!(err.kind, LexerErrorKind::UnterminatedString);
    }

    #[test]
    fn test_string_length_boundary() {
        // Exactly 63 bytes succeeds.
        let ok = format!("\"{}\"", "x".repeat(63));
        let t = tokens(&ok);
        assert_eq!(t[0].kind, TokenKind::Str);
        assert_eq!(t[0].str_value().unwrap().len(), 63);

        // 64 bytes fails with BufferOverflow.
        let too_long = format!("\"{}\"", "x".repeat(64));
        let err = lex_error(&too_long);
        assert_eq!(err.kind, LexerErrorKind::BufferOverflow);
    }

    #[test]
    fn test_docstring() {
        let t = tokens("\"\"\"first line\nsecond\"\"\"");
        assert_eq!(t[0].kind, TokenKind::Docstring);
        assert_eq!(t[0].str_value(), Some("first line\nsecond"));
    }

    #[test]
    fn test_unterminated_docstring() {
        let err = lex_error("\"\"\"open");
        assert_eq!(err.kind, LexerErrorKind::UnterminatedString);
    }

    // --------------------
    // Interpolation
    // --------------------

    #[test]
    fn test_interpolation_splits_string() {
        let t = tokens(r#""a${x}b""#);
        let ks: Vec<TokenKind> = t.iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Str,
                TokenKind::InterpStart,
                TokenKind::Identifier,
                TokenKind::InterpEnd,
                TokenKind::Str,
            ]
        );
        assert_eq!(t[0].str_value(), Some("a"));
        assert_eq!(t[2].lexeme, "x");
        assert_eq!(t[4].str_value(), Some("b"));
    }

    #[test]
    fn test_interpolation_with_expression() {
        let t = tokens(r#""n = ${1 + 2}""#);
        let ks: Vec<TokenKind> = t.iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Str,
                TokenKind::InterpStart,
                TokenKind::Integer,
                TokenKind::Plus,
                TokenKind::Integer,
                TokenKind::InterpEnd,
                TokenKind::Str,
            ]
        );
        assert_eq!(t[6].str_value(), Some(""));
    }

    #[test]
    fn test_interpolation_brace_nesting() {
        // Braces inside the interpolated expression do not close it.
        let t = tokens(r#""v${ { } }w""#);
        let ks: Vec<TokenKind> = t.iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Str,
                TokenKind::InterpStart,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::InterpEnd,
                TokenKind::Str,
            ]
        );
    }

    #[test]
    fn test_two_interpolations_in_one_string() {
        let t = tokens(r#""a${x}b${y}c""#);
        let ks: Vec<TokenKind> = t.iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Str,
                TokenKind::InterpStart,
                TokenKind::Identifier,
                TokenKind::InterpEnd,
                TokenKind::Str,
                TokenKind::InterpStart,
                TokenKind::Identifier,
                TokenKind::InterpEnd,
                TokenKind::Str,
            ]
        );
        assert_eq!(t[4].str_value(), Some("b"));
        assert_eq!(t[8].str_value(), Some("c"));
    }

    #[test]
    fn test_string_preserves_utf8_content() {
        let t = tokens("\"grün\"");
        assert_eq!(t[0].str_value(), Some("grün"));
        // The cap counts bytes, not characters.
        let exactly_63 = format!("\"{}é\"", "x".repeat(61)); // 61 + 2 bytes
        assert_eq!(tokens(&exactly_63)[0].kind, TokenKind::Str);
    }

    #[test]
    fn test_default_config() {
        let config = LexerConfig::default();
        assert_eq!(config.tab_width, 4);
        assert!(config.skip_whitespace);
        assert!(!config.include_comments);
        assert!(config.track_line_endings);
    }

    #[test]
    fn test_dollar_without_brace_is_literal() {
        let t = tokens(r#""cost: $5""#);
        assert_eq!(t[0].kind, TokenKind::Str);
        assert_eq!(t[0].str_value(), Some("cost: $5"));
    }

    // --------------------
    // Regex vs division
    // --------------------

    #[test]
    fn test_regex_literal() {
        let t = tokens(r"/ab+c/");
        assert_eq!(t[0].kind, TokenKind::Regex);
        assert_eq!(t[0].str_value(), Some("ab+c"));
    }

    #[test]
    fn test_regex_escape_keeps_next_byte() {
        let t = tokens(r"/a\/b/");
        assert_eq!(t[0].kind, TokenKind::Regex);
        assert_eq!(t[0].str_value(), Some(r"a\/b"));
    }

    #[test]
    fn test_division_after_value() {
        assert_eq!(
            kinds("10 / 2"),
            vec![TokenKind::Integer, TokenKind::Slash, TokenKind::Integer]
        );
        assert_eq!(
            kinds("x / y"),
            vec![
                TokenKind::Identifier,
                TokenKind::Slash,
                TokenKind::Identifier
            ]
        );
        assert_eq!(
            kinds("(a) / b"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier,
                TokenKind::RParen,
                TokenKind::Slash,
                TokenKind::Identifier
            ]
        );
    }

    #[test]
    fn test_regex_after_operator() {
        assert_eq!(
            kinds("x = /ab/"),
            vec![TokenKind::Identifier, TokenKind::Assign, TokenKind::Regex]
        );
    }

    // --------------------
    // Operators and delimiters
    // --------------------

    #[test]
    fn test_multi_char_operators() {
        assert_eq!(
            kinds("++ -- == != <= >= && || += -= *= /= %= -> => :: << >> **"),
            vec![
                TokenKind::Increment,
                TokenKind::Decrement,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::And,
                TokenKind::Or,
                TokenKind::PlusAssign,
                TokenKind::MinusAssign,
                TokenKind::StarAssign,
                TokenKind::SlashAssign,
                TokenKind::PercentAssign,
                TokenKind::Arrow,
                TokenKind::DoubleArrow,
                TokenKind::DoubleColon,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::Power,
            ]
        );
    }

    #[test]
    fn test_single_char_operators_and_delims() {
        assert_eq!(
            kinds("+ - * % ! < > & | ^ ~ ( ) { } [ ] , . ; :"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Percent,
                TokenKind::Not,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::BitAnd,
                TokenKind::BitOr,
                TokenKind::BitXor,
                TokenKind::BitNot,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Dot,
                TokenKind::Semicolon,
                TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn test_invalid_char() {
        let err = lex_error("@");
        assert_eq!(err.kind, LexerErrorKind::InvalidChar);
        assert_eq!(err.location.line, 1);
        assert_eq!(err.location.column, 1);
    }

    // --------------------
    // Comments, whitespace, newlines
    // --------------------

    #[test]
    fn test_comments_skipped_by_default() {
        assert_eq!(
            kinds("1 // trailing\n2 /* block */ 3"),
            vec![TokenKind::Integer, TokenKind::Integer, TokenKind::Integer]
        );
    }

    #[test]
    fn test_comments_included_when_configured() {
        let config = LexerConfig {
            include_comments: true,
            ..LexerConfig::default()
        };
        let mut lexer = Lexer::new("// note\n1", config);
        let t = lexer.tokenize();
        assert_eq!(t[0].kind, TokenKind::Comment);
        assert_eq!(t[0].lexeme, "note");
    }

    #[test]
    fn test_unterminated_block_comment() {
        let err = lex_error("/* open");
        assert_eq!(err.kind, LexerErrorKind::UnterminatedComment);
    }

    #[test]
    fn test_newline_tokens_tracked() {
        let mut lexer = Lexer::with_defaults("1\n2\r\n3");
        let ks: Vec<TokenKind> = lexer.tokenize().into_iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Integer,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_newlines_absorbed_when_untracked() {
        let config = LexerConfig {
            track_line_endings: false,
            ..LexerConfig::default()
        };
        let mut lexer = Lexer::new("1\n2", config);
        let ks: Vec<TokenKind> = lexer.tokenize().into_iter().map(|t| t.kind).collect();
        assert_eq!(ks, vec![TokenKind::Integer, TokenKind::Integer, TokenKind::Eof]);
    }

    #[test]
    fn test_whitespace_tokens_when_not_skipped() {
        let config = LexerConfig {
            skip_whitespace: false,
            ..LexerConfig::default()
        };
        let mut lexer = Lexer::new("1 2", config);
        let ks: Vec<TokenKind> = lexer.tokenize().into_iter().map(|t| t.kind).collect();
        assert_eq!(
            ks,
            vec![
                TokenKind::Integer,
                TokenKind::Whitespace,
                TokenKind::Integer,
                TokenKind::Eof
            ]
        );
    }

    // --------------------
    // Locations
    // --------------------

    #[test]
    fn test_locations_per_byte() {
        let mut lexer = Lexer::with_defaults("ab cd\n  ef");
        let t = lexer.tokenize();
        // "ab" at 1:1, "cd" at 1:4, newline at 1:6, "ef" at 2:3
        assert_eq!((t[0].location.line, t[0].location.column), (1, 1));
        assert_eq!((t[1].location.line, t[1].location.column), (1, 4));
        assert_eq!((t[2].location.line, t[2].location.column), (1, 6));
        assert_eq!((t[3].location.line, t[3].location.column), (2, 3));
    }

    #[test]
    fn test_token_location_is_first_byte() {
        let mut lexer = Lexer::with_defaults("  \"hi\"");
        let t = lexer.tokenize();
        assert_eq!(t[0].kind, TokenKind::Str);
        assert_eq!(t[0].location.column, 3);
    }

    #[test]
    fn test_lines_and_columns_start_at_one() {
        let mut lexer = Lexer::with_defaults("x");
        for token in lexer.tokenize() {
            assert!(token.location.line >= 1);
            assert!(token.location.column >= 1);
        }
    }

    // --------------------
    // next / peek / error contract
    // --------------------

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::with_defaults("1 2");
        assert_eq!(lexer.peek().value, Some(TokenValue::Int(1)));
        assert_eq!(lexer.peek().value, Some(TokenValue::Int(1)));
        assert_eq!(lexer.next().value, Some(TokenValue::Int(1)));
        assert_eq!(lexer.next().value, Some(TokenValue::Int(2)));
        assert_eq!(lexer.next().kind, TokenKind::Eof);
    }

    #[test]
    fn test_error_cleared_on_next_call() {
        let mut lexer = Lexer::with_defaults("@ 1");
        let bad = lexer.next();
        assert_eq!(bad.kind, TokenKind::Error);
        assert!(lexer.error().is_error());
        let good = lexer.next();
        assert_eq!(good.kind, TokenKind::Integer);
        assert!(!lexer.error().is_error());
    }

    #[test]
    fn test_eof_token_empty_lexeme() {
        let mut lexer = Lexer::with_defaults("");
        let t = lexer.next();
        assert_eq!(t.kind, TokenKind::Eof);
        assert!(t.lexeme.is_empty());
    }

    #[test]
    fn test_relex_matches_original_token_stream() {
        // Lexing the concatenation of all lexemes (space separated)
        // reproduces the same significant token sequence.
        let source = "frame Main { var x = 42 + 7 ; }";
        let first = tokens(source);
        let rejoined: Vec<String> = first.iter().map(|t| t.lexeme.clone()).collect();
        let second = tokens(&rejoined.join(" "));
        let ka: Vec<TokenKind> = first.iter().map(|t| t.kind).collect();
        let kb: Vec<TokenKind> = second.iter().map(|t| t.kind).collect();
        assert_eq!(ka, kb);
    }
}
