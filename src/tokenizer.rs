use crate::error::ParseError;
use crate::strings::{InternedStr, StringPool};
use crate::token::{self, Keyword, Token};

/// Identifiers longer than this are a lexical error.
pub const MAX_IDENTIFIER: usize = 256;

fn is_symbol(c: u8) -> bool {
    matches!(
        c,
        b';' | b':'
            | b'('
            | b')'
            | b'['
            | b']'
            | b'{'
            | b'}'
            | b'-'
            | b'+'
            | b'*'
            | b'/'
            | b'?'
            | b'!'
            | b','
            | b'='
            | b'.'
            | b'<'
            | b'>'
            | b'|'
            | b'&'
            | b'^'
            | b'~'
            | b'@'
    )
}

fn is_space(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// A valid token separator at the end of a number: end of input, whitespace
/// or any recognized symbol character.
fn is_number_separator(c: u8) -> bool {
    c == 0 || is_space(c) || is_symbol(c)
}

/// Pull-model tokenizer. Construct with a file name and source buffer, then
/// call [`next`](Tokenizer::next) to advance; the current token and its
/// associated state stay readable until the next call.
///
/// After the first error the tokenizer turns sticky: every subsequent
/// `next` produces [`Token::EndOfStream`], which unwinds the parser quickly
/// without cascading diagnostics.
pub struct Tokenizer<'a, 's> {
    strings: &'a StringPool<'a>,
    source: &'s str,
    buffer: &'s [u8],
    pos: usize,
    token: Token,
    int_value: i32,
    float_value: f32,
    identifier: String,
    file_name: InternedStr<'a>,
    line_number: u32,
    token_line_number: u32,
    error: bool,
    diagnostic: Option<ParseError>,
}

impl<'a, 's> Tokenizer<'a, 's> {
    pub fn new(strings: &'a StringPool<'a>, file_name: &str, source: &'s str) -> Self {
        let mut tokenizer = Tokenizer {
            strings,
            source,
            buffer: source.as_bytes(),
            pos: 0,
            token: Token::EndOfStream,
            int_value: 0,
            float_value: 0.0,
            identifier: String::new(),
            file_name: strings.add(file_name),
            line_number: 1,
            token_line_number: 1,
            error: false,
            diagnostic: None,
        };
        tokenizer.next();
        tokenizer
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn int_value(&self) -> i32 {
        self.int_value
    }

    pub fn float_value(&self) -> f32 {
        self.float_value
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Line number of the current token (not of the scan position).
    pub fn line_number(&self) -> u32 {
        self.token_line_number
    }

    pub fn file_name(&self) -> InternedStr<'a> {
        self.file_name
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn diagnostic(&self) -> Option<&ParseError> {
        self.diagnostic.as_ref()
    }

    pub fn take_diagnostic(&mut self) -> Option<ParseError> {
        self.diagnostic.take()
    }

    /// Records the first error, emits it to the error log and sets the
    /// sticky flag. Later errors are dropped.
    pub fn error(&mut self, message: String) {
        if self.error {
            return;
        }
        self.error = true;
        let diagnostic = ParseError::new(self.file_name.as_str(), self.line_number, message);
        eprintln!("{}", diagnostic);
        self.diagnostic = Some(diagnostic);
    }

    fn byte(&self, offset: usize) -> u8 {
        let index = self.pos + offset;
        if index < self.buffer.len() {
            self.buffer[index]
        } else {
            0
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buffer.len() || self.buffer[self.pos] == 0
    }

    pub fn next(&mut self) {
        while self.skip_whitespace()
            || self.skip_comment()
            || self.scan_line_directive()
            || self.skip_pragma_directive()
        {}

        if self.error {
            self.token = Token::EndOfStream;
            return;
        }

        self.token_line_number = self.line_number;

        if self.at_end() {
            self.token = Token::EndOfStream;
            return;
        }

        let multi_char = match (self.byte(0), self.byte(1)) {
            (b'+', b'=') => Some(Token::PlusEqual),
            (b'-', b'=') => Some(Token::MinusEqual),
            (b'*', b'=') => Some(Token::TimesEqual),
            (b'/', b'=') => Some(Token::DivideEqual),
            (b'=', b'=') => Some(Token::EqualEqual),
            (b'!', b'=') => Some(Token::NotEqual),
            (b'<', b'=') => Some(Token::LessEqual),
            (b'>', b'=') => Some(Token::GreaterEqual),
            (b'&', b'&') => Some(Token::AndAnd),
            (b'|', b'|') => Some(Token::BarBar),
            (b'+', b'+') => Some(Token::PlusPlus),
            (b'-', b'-') => Some(Token::MinusMinus),
            _ => None,
        };
        if let Some(token) = multi_char {
            self.token = token;
            self.pos += 2;
            return;
        }

        if self.scan_number() {
            return;
        }

        if is_symbol(self.byte(0)) {
            self.token = Token::Symbol(self.byte(0));
            self.pos += 1;
            return;
        }

        // Must be an identifier or a reserved word. A `::` pair is allowed
        // inside an identifier so namespace-qualified names stay one token.
        let start = self.pos;
        while !self.at_end() {
            let c = self.byte(0);
            let qualified = c == b':' && self.byte(1) == b':';
            if is_space(c) || (is_symbol(c) && !qualified) {
                break;
            }
            if qualified {
                self.pos += 1;
            }
            self.pos += 1;
        }

        let text = &self.source[start..self.pos];
        if text.len() >= MAX_IDENTIFIER {
            self.error("Syntax error: identifier too long".to_string());
            self.token = Token::EndOfStream;
            return;
        }

        if let Some(keyword) = Keyword::lookup(text) {
            self.token = Token::Keyword(keyword);
        } else {
            self.identifier.clear();
            self.identifier.push_str(text);
            self.token = Token::Identifier;
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut result = false;
        while self.pos < self.buffer.len() && is_space(self.buffer[self.pos]) {
            result = true;
            if self.buffer[self.pos] == b'\n' {
                self.line_number += 1;
            }
            self.pos += 1;
        }
        result
    }

    fn skip_comment(&mut self) -> bool {
        if self.byte(0) != b'/' {
            return false;
        }
        if self.byte(1) == b'/' {
            self.pos += 2;
            while self.pos < self.buffer.len() {
                let c = self.buffer[self.pos];
                self.pos += 1;
                if c == b'\n' {
                    self.line_number += 1;
                    break;
                }
            }
            return true;
        }
        if self.byte(1) == b'*' {
            self.pos += 2;
            loop {
                if self.pos >= self.buffer.len() {
                    self.error("Syntax error: unterminated comment".to_string());
                    return true;
                }
                if self.byte(0) == b'\n' {
                    self.line_number += 1;
                }
                if self.byte(0) == b'*' && self.byte(1) == b'/' {
                    self.pos += 2;
                    return true;
                }
                self.pos += 1;
            }
        }
        false
    }

    fn skip_pragma_directive(&mut self) -> bool {
        if self.buffer.len() - self.pos.min(self.buffer.len()) <= 7 || self.byte(0) != b'#' {
            return false;
        }
        let mut ptr = self.pos + 1;
        while ptr < self.buffer.len() && is_space(self.buffer[ptr]) && self.buffer[ptr] != b'\n' {
            ptr += 1;
        }
        if self.buffer[ptr..].starts_with(b"pragma")
            && ptr + 6 < self.buffer.len()
            && is_space(self.buffer[ptr + 6])
        {
            self.pos = ptr + 6;
            while self.pos < self.buffer.len() {
                let c = self.buffer[self.pos];
                self.pos += 1;
                if c == b'\n' {
                    self.line_number += 1;
                    break;
                }
            }
            return true;
        }
        false
    }

    fn scan_line_directive(&mut self) -> bool {
        if self.buffer.len() - self.pos.min(self.buffer.len()) <= 5
            || !self.buffer[self.pos..].starts_with(b"#line")
            || !is_space(self.byte(5))
        {
            return false;
        }
        self.pos += 5;

        while self.pos < self.buffer.len() && is_space(self.buffer[self.pos]) {
            if self.buffer[self.pos] == b'\n' {
                self.error("Syntax error: expected line number after #line".to_string());
                return false;
            }
            self.pos += 1;
        }

        let (line_value, consumed) = scan_decimal(&self.buffer[self.pos..]);
        if consumed == 0 || !is_space(self.byte(consumed)) {
            self.error("Syntax error: expected line number after #line".to_string());
            return false;
        }
        let line_number = line_value as u32;
        self.pos += consumed;

        while self.pos < self.buffer.len() && is_space(self.buffer[self.pos]) {
            let c = self.buffer[self.pos];
            self.pos += 1;
            if c == b'\n' {
                self.line_number = line_number;
                return true;
            }
        }

        if self.pos >= self.buffer.len() {
            self.line_number = line_number;
            return true;
        }

        if self.byte(0) != b'"' {
            self.error("Syntax error: expected '\"' after line number near #line".to_string());
            return false;
        }
        self.pos += 1;

        let name_start = self.pos;
        while self.pos < self.buffer.len()
            && self.byte(0) != b'"'
            && self.pos - name_start + 1 < MAX_IDENTIFIER
        {
            if self.byte(0) == b'\n' {
                self.error("Syntax error: expected '\"' before end of line near #line".to_string());
                return false;
            }
            self.pos += 1;
        }
        let directive_file = &self.source[name_start..self.pos];

        if self.pos >= self.buffer.len() {
            self.error("Syntax error: expected '\"' before end of file near #line".to_string());
            return false;
        }
        if self.byte(0) != b'"' {
            self.error("Syntax error: file name too long near #line".to_string());
            return false;
        }
        self.pos += 1;

        while self.pos < self.buffer.len() && self.byte(0) != b'\n' {
            if !is_space(self.byte(0)) {
                self.error("Syntax error: unexpected input after file name near #line".to_string());
                return false;
            }
            self.pos += 1;
        }
        self.pos += 1;

        self.line_number = line_number;
        self.file_name = self.strings.add(directive_file);
        true
    }

    fn scan_number(&mut self) -> bool {
        // The + or - is never part of the number.
        if self.byte(0) == b'+' || self.byte(0) == b'-' {
            return false;
        }

        if self.buffer.len() - self.pos > 2 && self.byte(0) == b'0' && self.byte(1) == b'x' {
            let (value, consumed) = scan_hex(&self.buffer[self.pos + 2..]);
            if is_number_separator(self.byte(2 + consumed)) {
                self.pos += 2 + consumed;
                self.token = Token::IntLiteral;
                self.int_value = value;
                return true;
            }
        }

        let (float_value, float_len) = scan_real(&self.buffer[self.pos..], self.source, self.pos);
        if float_len == 0 {
            return false;
        }
        let (int_value, int_len) = scan_decimal(&self.buffer[self.pos..]);

        // A trailing f or h is treated as part of the number (1.0f syntax)
        // and selects the literal kind; no suffix means float.
        let mut float_end = float_len;
        let mut suffix = 0u8;
        if matches!(self.byte(float_end), b'f' | b'h') {
            suffix = self.byte(float_end);
            float_end += 1;
        }

        if float_end > int_len && is_number_separator(self.byte(float_end)) {
            self.pos += float_end;
            self.token = if suffix == b'h' {
                Token::HalfLiteral
            } else {
                Token::FloatLiteral
            };
            self.float_value = float_value as f32;
            true
        } else if int_len > 0 && is_number_separator(self.byte(int_len)) {
            self.pos += int_len;
            self.token = Token::IntLiteral;
            self.int_value = int_value;
            true
        } else {
            false
        }
    }

    /// The spelling of the current token, with literal and identifier
    /// values substituted for their class names.
    pub fn token_name(&self) -> String {
        match self.token {
            Token::FloatLiteral | Token::HalfLiteral => format!("{}", self.float_value),
            Token::IntLiteral => format!("{}", self.int_value),
            Token::Identifier => self.identifier.clone(),
            token => token::token_name(token),
        }
    }
}

fn scan_decimal(bytes: &[u8]) -> (i32, usize) {
    let mut value: u64 = 0;
    let mut len = 0;
    while len < bytes.len() && bytes[len].is_ascii_digit() {
        value = (value.wrapping_mul(10)).wrapping_add((bytes[len] - b'0') as u64);
        len += 1;
    }
    (value as u32 as i32, len)
}

fn scan_hex(bytes: &[u8]) -> (i32, usize) {
    let mut value: u64 = 0;
    let mut len = 0;
    while len < bytes.len() && bytes[len].is_ascii_hexdigit() {
        let digit = match bytes[len] {
            c @ b'0'..=b'9' => c - b'0',
            c @ b'a'..=b'f' => c - b'a' + 10,
            c => c - b'A' + 10,
        };
        value = (value.wrapping_mul(16)).wrapping_add(digit as u64);
        len += 1;
    }
    (value as u32 as i32, len)
}

/// Longest-prefix real number scan with `strtod` semantics: digits, an
/// optional fraction, an optional exponent. Returns length zero when no
/// digits were consumed.
fn scan_real(bytes: &[u8], source: &str, offset: usize) -> (f64, usize) {
    let mut len = 0;
    let mut any_digits = false;
    while len < bytes.len() && bytes[len].is_ascii_digit() {
        len += 1;
        any_digits = true;
    }
    if len < bytes.len() && bytes[len] == b'.' {
        len += 1;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
            any_digits = true;
        }
    }
    if !any_digits {
        return (0.0, 0);
    }
    if len < bytes.len() && matches!(bytes[len], b'e' | b'E') {
        let mut exp = len + 1;
        if exp < bytes.len() && matches!(bytes[exp], b'+' | b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            len = exp;
            while len < bytes.len() && bytes[len].is_ascii_digit() {
                len += 1;
            }
        }
    }
    let text = &source[offset..offset + len];
    (text.parse::<f64>().unwrap_or(0.0), len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    fn tokens_of(source: &str) -> Vec<Token> {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut tokenizer = Tokenizer::new(&pool, "test.hlsl", source);
        let mut tokens = Vec::new();
        while tokenizer.token() != Token::EndOfStream {
            tokens.push(tokenizer.token());
            tokenizer.next();
        }
        tokens
    }

    #[test]
    fn keywords_and_symbols() {
        assert_eq!(
            tokens_of("float4 x;"),
            vec![
                Token::Keyword(Keyword::Float4),
                Token::Identifier,
                Token::Symbol(b';'),
            ]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            tokens_of("a += b && c <= d"),
            vec![
                Token::Identifier,
                Token::PlusEqual,
                Token::Identifier,
                Token::AndAnd,
                Token::Identifier,
                Token::LessEqual,
                Token::Identifier,
            ]
        );
    }

    #[test]
    fn float_half_and_bare_dot_literals() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);

        let t = Tokenizer::new(&pool, "t", "1.0f");
        assert_eq!(t.token(), Token::FloatLiteral);
        assert_eq!(t.float_value(), 1.0);

        let t = Tokenizer::new(&pool, "t", "1.0h");
        assert_eq!(t.token(), Token::HalfLiteral);

        let mut t = Tokenizer::new(&pool, "t", "1.");
        assert_eq!(t.token(), Token::FloatLiteral);
        t.next();
        assert_eq!(t.token(), Token::EndOfStream);
    }

    #[test]
    fn bad_suffix_is_not_a_single_literal() {
        // `1.0x` does not scan as one float literal; the leading `1` falls
        // back to an int literal terminated by the `.` symbol.
        let tokens = tokens_of("1.0x");
        assert_ne!(tokens[0], Token::FloatLiteral);
        assert_eq!(tokens[0], Token::IntLiteral);
    }

    #[test]
    fn hex_literal_wraps_to_signed() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "t", "0xFFFFFFFF");
        assert_eq!(t.token(), Token::IntLiteral);
        assert_eq!(t.int_value(), -1);
    }

    #[test]
    fn int_literal_value() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "t", "42");
        assert_eq!(t.token(), Token::IntLiteral);
        assert_eq!(t.int_value(), 42);
    }

    #[test]
    fn comments_and_pragmas_are_skipped() {
        assert_eq!(
            tokens_of("// line comment\n/* block\ncomment */ #pragma pack_matrix(row_major)\nint"),
            vec![Token::Keyword(Keyword::Int)]
        );
    }

    #[test]
    fn line_directive_updates_position() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "test.hlsl", "#line 42 \"other.hlsl\"\nint x;");
        assert_eq!(t.token(), Token::Keyword(Keyword::Int));
        assert_eq!(t.line_number(), 42);
        assert_eq!(t.file_name().as_str(), "other.hlsl");
    }

    #[test]
    fn line_directive_without_file_keeps_current_file() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "test.hlsl", "#line 7\nx");
        assert_eq!(t.token(), Token::Identifier);
        assert_eq!(t.line_number(), 7);
        assert_eq!(t.file_name().as_str(), "test.hlsl");
    }

    #[test]
    fn namespace_qualified_identifier_is_one_token() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "t", "ns::value");
        assert_eq!(t.token(), Token::Identifier);
        assert_eq!(t.identifier(), "ns::value");
    }

    #[test]
    fn sticky_error_returns_end_of_stream_forever() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut t = Tokenizer::new(&pool, "t", "#line x\nfloat");
        assert!(t.has_error());
        assert_eq!(t.token(), Token::EndOfStream);
        t.next();
        assert_eq!(t.token(), Token::EndOfStream);
        let diagnostic = t.diagnostic().unwrap();
        assert!(diagnostic.message.contains("#line"));
    }

    #[test]
    fn oversized_identifier_is_an_error() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let long = "x".repeat(300);
        let t = Tokenizer::new(&pool, "t", &long);
        assert!(t.has_error());
        assert_eq!(t.token(), Token::EndOfStream);
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let t = Tokenizer::new(&pool, "t", "/* no closing\nint x;");
        assert!(t.has_error());
    }

    #[test]
    fn token_line_number_tracks_newlines() {
        let bump = Bump::new();
        let pool = StringPool::new(&bump);
        let mut t = Tokenizer::new(&pool, "t", "a\nb\n\nc");
        assert_eq!(t.line_number(), 1);
        t.next();
        assert_eq!(t.line_number(), 2);
        t.next();
        assert_eq!(t.line_number(), 4);
    }
}
