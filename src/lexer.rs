//! Tokenizer for the manifest DSL subset
//!
//! Converts Gemfile/Podfile/gemspec/podspec source text into a flat token
//! stream with byte-accurate positions. Only the constructs the dependency
//! DSL relies on are tokenized; structural punctuation the DSL never keys
//! on (`{ } < > - + & * / ;`) is consumed silently so that surrounding
//! Ruby-flavoured code does not derail extraction.

use crate::error::ParseError;
use serde::Serialize;

/// Maximum number of tokens produced from a single input.
pub const MAX_TOKENS: usize = 40_000;
/// Maximum body length of a string, symbol or percent literal.
pub const MAX_LITERAL_LEN: usize = 8192;

/// Token kinds form a closed set; keywords get their own kinds so the
/// parser never string-compares `do`/`end`/`if`/`else`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Identifier,
    /// Any string literal, delimiters included (`'...'`, `"..."`, `%q{...}`, `%w[...]`).
    String,
    /// `:name`, `:"name"`, `:'name'`, and the block-argument pipe `|`.
    Symbol,
    Integer,
    Comma,
    Colon,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    Equals,
    NewLine,
    Do,
    End,
    If,
    Else,
    EndOfFile,
}

/// A token with its exact source slice and position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// The exact source slice, delimiters and all.
    pub text: &'src str,
    /// Byte offset of the first byte.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    /// 1-based line of the first byte.
    pub line: u32,
    /// 1-based column of the first byte, counted per byte.
    pub column: u32,
}

/// Tokenize the whole input, appending a final `EndOfFile` token.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, ParseError> {
    Lexer::new(source).run()
}

struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    column: u32,
    steps: usize,
    tokens: Vec<Token<'src>>,
}

impl<'src> Lexer<'src> {
    fn new(src: &'src str) -> Self {
        Lexer {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            steps: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token<'src>>, ParseError> {
        let budget = self.bytes.len().saturating_mul(2);
        while self.pos < self.bytes.len() {
            self.steps += 1;
            if self.steps > budget {
                return Err(self.error_here("runaway lexer"));
            }
            let start = self.pos;
            let line = self.line;
            let column = self.column;
            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\r' => self.bump(),
                b'\n' => {
                    self.pos += 1;
                    self.push(TokenKind::NewLine, start, line, column)?;
                    self.line += 1;
                    self.column = 1;
                }
                b'#' => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
                        self.bump();
                    }
                }
                b',' => self.single(TokenKind::Comma, start, line, column)?,
                b'(' => self.single(TokenKind::LeftParen, start, line, column)?,
                b')' => self.single(TokenKind::RightParen, start, line, column)?,
                b'[' => self.single(TokenKind::LeftBracket, start, line, column)?,
                b']' => self.single(TokenKind::RightBracket, start, line, column)?,
                b'.' => self.single(TokenKind::Dot, start, line, column)?,
                b'=' => self.single(TokenKind::Equals, start, line, column)?,
                // Structural punctuation the DSL never keys on.
                b'{' | b'}' | b'<' | b'>' | b'-' | b'+' | b'&' | b'*' | b'/' | b';' => self.bump(),
                b'|' => self.single(TokenKind::Symbol, start, line, column)?,
                b':' => self.lex_colon(start, line, column)?,
                b'\'' | b'"' => self.lex_string(start, line, column)?,
                b'%' => self.lex_percent(start, line, column)?,
                b'0'..=b'9' => {
                    while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                        self.bump();
                    }
                    self.push(TokenKind::Integer, start, line, column)?;
                }
                c if is_ident_start(c) => {
                    while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
                        self.bump();
                    }
                    let kind = match &self.src[start..self.pos] {
                        "do" => TokenKind::Do,
                        "end" => TokenKind::End,
                        "if" => TokenKind::If,
                        "else" => TokenKind::Else,
                        _ => TokenKind::Identifier,
                    };
                    self.push(kind, start, line, column)?;
                }
                _ => return Err(self.error_here("unknown character")),
            }
        }
        let eof_start = self.bytes.len();
        let line = self.line;
        let column = self.column;
        self.push(TokenKind::EndOfFile, eof_start, line, column)?;
        Ok(self.tokens)
    }

    /// Colon disambiguation: `::` namespace resolution, quoted and
    /// unquoted symbol literals, or a bare hash-key colon.
    fn lex_colon(&mut self, start: usize, line: u32, column: u32) -> Result<(), ParseError> {
        let prev_is_colon = start > 0 && self.bytes[start - 1] == b':';
        let next = self.bytes.get(start + 1).copied();
        if prev_is_colon || next == Some(b':') {
            return self.single(TokenKind::Colon, start, line, column);
        }
        match next {
            Some(q @ (b'\'' | b'"')) => {
                self.bump(); // :
                let opener_line = self.line;
                let opener_column = self.column;
                self.bump(); // opening quote
                self.literal_body(
                    q as char,
                    opener_line,
                    opener_column,
                    "unterminated symbol",
                    "symbol literal too long",
                )?;
                self.push(TokenKind::Symbol, start, line, column)
            }
            Some(c) if c.is_ascii_alphanumeric() || c == b'_' => {
                self.bump(); // :
                while self.pos < self.bytes.len() && is_ident_continue(self.bytes[self.pos]) {
                    self.bump();
                }
                self.push(TokenKind::Symbol, start, line, column)
            }
            _ => self.single(TokenKind::Colon, start, line, column),
        }
    }

    fn lex_string(&mut self, start: usize, line: u32, column: u32) -> Result<(), ParseError> {
        let quote = self.bytes[self.pos];
        let opener_line = self.line;
        let opener_column = self.column;
        self.bump();
        self.literal_body(
            quote as char,
            opener_line,
            opener_column,
            "unterminated string",
            "string literal too long",
        )?;
        self.push(TokenKind::String, start, line, column)
    }

    /// `%q` / `%w` literal with an arbitrary delimiter pair. The emitted
    /// token covers the whole form verbatim, delimiters included.
    fn lex_percent(&mut self, start: usize, line: u32, column: u32) -> Result<(), ParseError> {
        match self.bytes.get(start + 1) {
            Some(b'q' | b'w') => {}
            _ => return Err(self.error_here("unknown character")),
        }
        self.bump(); // %
        self.bump(); // q or w
        let Some(opener) = self.src[self.pos..].chars().next() else {
            return Err(self
                .error_here("unterminated %q/%w literal")
                .with_opener(line, column));
        };
        let opener_line = self.line;
        let opener_column = self.column;
        let closer = match opener {
            '{' => '}',
            '[' => ']',
            '(' => ')',
            '<' => '>',
            other => other,
        };
        self.consume_literal_char(opener);
        self.literal_body(
            closer,
            opener_line,
            opener_column,
            "unterminated %q/%w literal",
            "%q/%w literal too long",
        )?;
        self.push(TokenKind::String, start, line, column)
    }

    /// Consume a literal body through the closing delimiter. A backslash
    /// consumes the following character literally, whatever it is. The
    /// body is walked one decoded character at a time so an arbitrary
    /// (possibly multi-byte) delimiter never lands the cursor inside a
    /// UTF-8 sequence.
    fn literal_body(
        &mut self,
        closer: char,
        opener_line: u32,
        opener_column: u32,
        unterminated: &'static str,
        too_long: &'static str,
    ) -> Result<(), ParseError> {
        let mut body_len = 0usize;
        loop {
            let Some(c) = self.src[self.pos..].chars().next() else {
                return Err(self
                    .error_here(unterminated)
                    .with_opener(opener_line, opener_column));
            };
            if c == closer {
                self.consume_literal_char(c);
                return Ok(());
            }
            if c == '\\' {
                self.bump();
                let Some(escaped) = self.src[self.pos..].chars().next() else {
                    return Err(self
                        .error_here(unterminated)
                        .with_opener(opener_line, opener_column));
                };
                self.consume_literal_char(escaped);
                body_len += 2;
            } else {
                self.consume_literal_char(c);
                body_len += 1;
            }
            if body_len > MAX_LITERAL_LEN {
                return Err(self
                    .error_here(too_long)
                    .with_opener(opener_line, opener_column));
            }
        }
    }

    /// Advance past one decoded character inside a literal, keeping the
    /// per-byte column count and line tracking in step.
    fn consume_literal_char(&mut self, c: char) {
        if c == '\n' {
            self.pos += 1;
            self.line += 1;
            self.column = 1;
        } else {
            let width = c.len_utf8();
            self.pos += width;
            self.column += width as u32;
        }
    }

    fn single(
        &mut self,
        kind: TokenKind,
        start: usize,
        line: u32,
        column: u32,
    ) -> Result<(), ParseError> {
        self.bump();
        self.push(kind, start, line, column)
    }

    fn bump(&mut self) {
        self.pos += 1;
        self.column += 1;
    }

    fn push(
        &mut self,
        kind: TokenKind,
        start: usize,
        line: u32,
        column: u32,
    ) -> Result<(), ParseError> {
        if self.tokens.len() >= MAX_TOKENS {
            return Err(ParseError::new(
                "token quota exceeded",
                start,
                line,
                column,
                self.prev_byte(),
            ));
        }
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            start,
            end: self.pos,
            line,
            column,
        });
        Ok(())
    }

    fn prev_byte(&self) -> u8 {
        self.tokens
            .last()
            .and_then(|t| t.text.as_bytes().first().copied())
            .unwrap_or(0)
    }

    fn error_here(&self, message: &'static str) -> ParseError {
        ParseError::new(message, self.pos, self.line, self.column, self.prev_byte())
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_' || c == b'$'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'_' | b'$' | b'?' | b'!')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_empty_input() {
        let tokens = tokenize("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::EndOfFile);
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
    }

    #[test]
    fn test_gem_line() {
        let tokens = tokenize("gem 'rails', '~> 7.0'\n").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::String,
                TokenKind::Comma,
                TokenKind::String,
                TokenKind::NewLine,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(tokens[0].text, "gem");
        assert_eq!(tokens[1].text, "'rails'");
        assert_eq!(tokens[3].text, "'~> 7.0'");
    }

    #[test]
    fn test_positions_are_one_based_and_monotonic() {
        let tokens = tokenize("gem 'a'\npod 'b'\n").unwrap();
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[0].column, 1);
        let pod = tokens.iter().find(|t| t.text == "pod").unwrap();
        assert_eq!(pod.line, 2);
        assert_eq!(pod.column, 1);
        for pair in tokens.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("do end if else"),
            vec![
                TokenKind::Do,
                TokenKind::End,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_keyword_prefix_is_identifier() {
        let tokens = tokenize("endpoint doit").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_namespace_colons() {
        let tokens = tokenize("Gem::Specification").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Colon,
                TokenKind::Colon,
                TokenKind::Identifier,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_unquoted_symbol() {
        let tokens = tokenize(":development").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(tokens[0].text, ":development");
    }

    #[test]
    fn test_quoted_symbol() {
        let tokens = tokenize(":\"with space\"").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(tokens[0].text, ":\"with space\"");
    }

    #[test]
    fn test_bare_colon_before_space() {
        let tokens = tokenize("require: ").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].kind, TokenKind::Colon);
    }

    #[test]
    fn test_pipe_is_symbol() {
        let tokens = tokenize("|s|").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Symbol);
        assert_eq!(tokens[0].text, "|");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].kind, TokenKind::Symbol);
    }

    #[test]
    fn test_hash_rocket_swallows_gt() {
        // `=>` lexes as Equals; `>` is silent punctuation.
        let tokens = tokenize(":git => 'url'").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Symbol,
                TokenKind::Equals,
                TokenKind::String,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_comment_consumed_to_eol() {
        let tokens = tokenize("gem 'a' # gem 'b'\n").unwrap();
        let strings: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::String)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].text, "'a'");
    }

    #[test]
    fn test_string_with_backslash_escape() {
        let tokens = tokenize(r#""a\"b""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, r#""a\"b""#);
    }

    #[test]
    fn test_multiline_string_tracks_lines() {
        let tokens = tokenize("\"a\nb\" x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        let x = tokens.iter().find(|t| t.text == "x").unwrap();
        assert_eq!(x.line, 2);
    }

    #[test]
    fn test_percent_q_bracket_table() {
        for (src, text) in [
            ("%q{abc}", "%q{abc}"),
            ("%q[abc]", "%q[abc]"),
            ("%q(abc)", "%q(abc)"),
            ("%q<abc>", "%q<abc>"),
            ("%q!abc!", "%q!abc!"),
            ("%w[a b]", "%w[a b]"),
        ] {
            let tokens = tokenize(src).unwrap();
            assert_eq!(tokens[0].kind, TokenKind::String, "input {src}");
            assert_eq!(tokens[0].text, text, "input {src}");
        }
    }

    #[test]
    fn test_percent_with_multibyte_delimiter() {
        let tokens = tokenize("%qéaé x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[0].text, "%qéaé");
        let x = &tokens[1];
        assert_eq!(x.text, "x");
        // Columns count per byte, so the two-byte delimiters advance by 2.
        assert_eq!(x.column, 9);
    }

    #[test]
    fn test_unterminated_multibyte_percent_delimiter() {
        let err = tokenize("%qé abc").unwrap_err();
        assert_eq!(err.message, "unterminated %q/%w literal");
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("gem 'oops\n").unwrap_err();
        assert_eq!(err.message, "unterminated string");
        assert_eq!(err.opener.unwrap().line, 1);
        assert_eq!(err.opener.unwrap().column, 5);
        assert_eq!(err.prev, b'g');
    }

    #[test]
    fn test_unterminated_symbol() {
        let err = tokenize(":'oops").unwrap_err();
        assert_eq!(err.message, "unterminated symbol");
    }

    #[test]
    fn test_unterminated_percent() {
        let err = tokenize("%q{oops").unwrap_err();
        assert_eq!(err.message, "unterminated %q/%w literal");
    }

    #[test]
    fn test_percent_without_q_or_w_fails() {
        let err = tokenize("a % b").unwrap_err();
        assert_eq!(err.message, "unknown character");
    }

    #[test]
    fn test_unknown_character() {
        let err = tokenize("gem ~\n").unwrap_err();
        assert_eq!(err.message, "unknown character");
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 5);
    }

    #[test]
    fn test_string_literal_too_long() {
        let body = "a".repeat(MAX_LITERAL_LEN + 1);
        let err = tokenize(&format!("'{body}'")).unwrap_err();
        assert_eq!(err.message, "string literal too long");
    }

    #[test]
    fn test_token_quota() {
        let src = ",\n".repeat(MAX_TOKENS);
        let err = tokenize(&src).unwrap_err();
        assert_eq!(err.message, "token quota exceeded");
    }

    #[test]
    fn test_silent_punctuation() {
        assert_eq!(
            kinds("{ } < > - + & * / ;"),
            vec![TokenKind::EndOfFile]
        );
    }

    #[test]
    fn test_integer() {
        let tokens = tokenize("123").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[0].text, "123");
    }

    #[test]
    fn test_identifier_with_question_and_bang() {
        let tokens = tokenize("valid? frozen!").unwrap();
        assert_eq!(tokens[0].text, "valid?");
        assert_eq!(tokens[1].text, "frozen!");
    }

    #[test]
    fn test_crlf_line_endings() {
        let tokens = tokenize("gem 'a'\r\ngem 'b'\r\n").unwrap();
        let newlines = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::NewLine)
            .count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn test_utf8_in_string_keeps_positions() {
        let src = "gem 'café'\ngem 'b'\n";
        let tokens = tokenize(src).unwrap();
        let b = tokens.iter().find(|t| t.text == "'b'").unwrap();
        assert_eq!(b.line, 2);
        assert_eq!(&src[b.start..b.end], "'b'");
    }
}
