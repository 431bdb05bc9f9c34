//! Recursive-descent recognizer for the dependency DSL
//!
//! Walks the token stream and picks out the constructs dependency
//! manifests are made of: `gem`/`pod` declarations, `group`/`target`/
//! `platforms` blocks, and `Gem::Specification.new` / `Pod::Spec.new`
//! constructors with their `add_*dependency` method family. Everything
//! else in the file is skipped a line (or a balanced block) at a time,
//! so arbitrary surrounding code never aborts extraction.

use crate::error::ParseError;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::manifest::{GemDeclaration, ParseOutput};
use crate::strings::{expand_word_array, format_version, normalize};

/// Maximum block nesting depth.
pub const MAX_DEPTH: usize = 256;

/// Parse a manifest, reporting dynamic constructs via `tracing::debug!`.
pub fn parse(source: &str) -> Result<ParseOutput, ParseError> {
    parse_with_sink(source, &mut |message| tracing::debug!("{message}"))
}

/// Parse a manifest with a caller-supplied diagnostic sink.
///
/// The sink receives one human-readable message per dynamic construct
/// (string interpolation in a name, unresolvable `send` targets) and is
/// never allowed to interrupt the parse.
pub fn parse_with_sink(
    source: &str,
    sink: &mut dyn FnMut(&str),
) -> Result<ParseOutput, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
        out: ParseOutput::default(),
        sink,
    };
    parser.parse_block(&[], &[], false)?;
    Ok(parser.out)
}

struct Parser<'a, 'src> {
    tokens: &'a [Token<'src>],
    pos: usize,
    depth: usize,
    out: ParseOutput,
    sink: &'a mut dyn FnMut(&str),
}

impl<'a, 'src> Parser<'a, 'src> {
    fn peek(&self) -> &'a Token<'src> {
        &self.tokens[self.pos]
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::EndOfFile)
    }

    fn text_at(&self, offset: usize) -> &'src str {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.text)
            .unwrap_or("")
    }

    /// Advance the cursor, never moving past the EndOfFile token.
    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    /// Discard tokens through the next NewLine (inclusive).
    fn discard_line(&mut self) {
        while !self.at(TokenKind::NewLine) && !self.at(TokenKind::EndOfFile) {
            self.advance();
        }
        if self.at(TokenKind::NewLine) {
            self.advance();
        }
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error_at_current("nesting too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn error_at_current(&self, message: &'static str) -> ParseError {
        let token = self.peek();
        let prev = if self.pos > 0 {
            self.tokens[self.pos - 1]
                .text
                .as_bytes()
                .first()
                .copied()
                .unwrap_or(0)
        } else {
            0
        };
        ParseError::new(message, token.start, token.line, token.column, prev)
    }

    fn note_dynamic(&mut self, what: &str, detail: &str) {
        let message = format!("{what}: {}", clip(detail));
        (self.sink)(&message);
    }

    /// Main loop over one block scope. `groups`/`platforms` are the
    /// labels of the enclosing `group`/`target`/`platforms` blocks.
    fn parse_block(
        &mut self,
        groups: &[String],
        platforms: &[String],
        stop_at_end: bool,
    ) -> Result<(), ParseError> {
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::NewLine => self.advance(),
                TokenKind::End => {
                    self.advance();
                    if stop_at_end {
                        return Ok(());
                    }
                }
                TokenKind::Do => {
                    self.advance();
                    self.skip_do_block()?;
                }
                TokenKind::LeftParen => {
                    self.advance();
                    self.skip_paren_group()?;
                }
                TokenKind::Identifier => self.parse_statement(groups, platforms)?,
                _ => self.discard_line(),
            }
        }
    }

    fn parse_statement(
        &mut self,
        groups: &[String],
        platforms: &[String],
    ) -> Result<(), ParseError> {
        let word = self.peek().text;
        match word {
            "gem" | "pod" => {
                self.advance();
                let (decl, effective_groups) = self.parse_declaration(groups, platforms)?;
                let dev = effective_groups
                    .iter()
                    .any(|g| g == "development" || g == "test");
                self.emit(decl, effective_groups, dev, false);
                self.discard_line();
            }
            "group" | "target" => {
                self.advance();
                let labels = self.parse_labels();
                if self.at(TokenKind::Do) {
                    self.advance();
                    self.enter()?;
                    self.parse_block(&labels, platforms, true)?;
                    self.leave();
                } else {
                    self.discard_line();
                }
            }
            "platforms" => {
                self.advance();
                let labels = self.parse_labels();
                if self.at(TokenKind::Do) {
                    self.advance();
                    self.enter()?;
                    self.parse_block(groups, &labels, true)?;
                    self.leave();
                } else {
                    self.discard_line();
                }
            }
            "source" => self.discard_line(),
            "Gem" | "Pod" => {
                if self.try_spec_prefix() {
                    self.parse_spec()?;
                } else {
                    self.discard_line();
                }
            }
            _ => self.discard_line(),
        }
        Ok(())
    }

    /// Comma-separated label list after `group`/`target`/`platforms`.
    fn parse_labels(&mut self) -> Vec<String> {
        let mut labels = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Symbol | TokenKind::String => labels.push(normalize(self.peek().text)),
                TokenKind::Identifier => labels.push(self.peek().text.to_string()),
                _ => break,
            }
            self.advance();
            if self.at(TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        labels
    }

    /// `gem/pod NAME [, VERSION|ARRAY|KEY => VALUE]...`, also used for
    /// the argument list of the spec-block dependency methods.
    ///
    /// Returns the declaration (with `groups` unset) plus its effective
    /// group labels; routing decides whether those labels are echoed.
    fn parse_declaration(
        &mut self,
        outer_groups: &[String],
        outer_platforms: &[String],
    ) -> Result<(GemDeclaration, Vec<String>), ParseError> {
        let parenthesized = if self.at(TokenKind::LeftParen) {
            self.advance();
            true
        } else {
            false
        };

        let name = match self.peek().kind {
            TokenKind::String | TokenKind::Symbol => normalize(self.peek().text),
            TokenKind::Identifier => self.peek().text.to_string(),
            _ => return Err(self.error_at_current("name literal expected")),
        };
        self.advance();
        if name.contains("#{") {
            self.note_dynamic("dynamic interpolation in dependency name", &name);
        }

        // `'name'.freeze` is tolerated only in this position.
        if self.at(TokenKind::Dot)
            && self.kind_at(1) == TokenKind::Identifier
            && self.text_at(1) == "freeze"
        {
            self.advance();
            self.advance();
        }

        let mut versions = Vec::new();
        let mut inline_groups = Vec::new();
        let mut inline_platforms = Vec::new();
        let mut git = None;
        let mut path = None;
        let mut require = None;

        while self.at(TokenKind::Comma) {
            self.advance();
            match self.peek().kind {
                TokenKind::String => {
                    let raw = self.peek().text;
                    self.advance();
                    push_versions(&mut versions, raw);
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    loop {
                        match self.peek().kind {
                            TokenKind::String => {
                                let raw = self.peek().text;
                                self.advance();
                                push_versions(&mut versions, raw);
                            }
                            TokenKind::Comma => self.advance(),
                            TokenKind::RightBracket => {
                                self.advance();
                                break;
                            }
                            _ => break,
                        }
                    }
                }
                TokenKind::Symbol | TokenKind::Identifier
                    if matches!(self.kind_at(1), TokenKind::Equals | TokenKind::Colon) =>
                {
                    let key = if self.peek().kind == TokenKind::Symbol {
                        normalize(self.peek().text)
                    } else {
                        self.peek().text.to_string()
                    };
                    self.advance(); // key
                    self.advance(); // `=>` or `:`
                    match key.as_str() {
                        "group" => {
                            if matches!(
                                self.peek().kind,
                                TokenKind::Identifier | TokenKind::Symbol
                            ) {
                                inline_groups.push(self.scalar_value());
                            }
                        }
                        "platforms" => {
                            if self.at(TokenKind::LeftBracket) {
                                self.advance();
                                loop {
                                    match self.peek().kind {
                                        TokenKind::Symbol => {
                                            inline_platforms.push(normalize(self.peek().text));
                                            self.advance();
                                        }
                                        TokenKind::Comma => self.advance(),
                                        TokenKind::RightBracket => {
                                            self.advance();
                                            break;
                                        }
                                        _ => break,
                                    }
                                }
                            }
                        }
                        "git" | "github" => {
                            if self.at_scalar() {
                                git = Some(self.scalar_value());
                            }
                        }
                        "path" => {
                            if self.at_scalar() {
                                path = Some(self.scalar_value());
                            }
                        }
                        "require" => {
                            // Only a string literal normalizing to "false"
                            // clears the flag; bare identifiers do not.
                            if self.at(TokenKind::String) {
                                require = Some(normalize(self.peek().text) != "false");
                                self.advance();
                            } else {
                                require = Some(true);
                                if self.at_scalar() {
                                    self.advance();
                                }
                            }
                        }
                        _ => {
                            // Unknown key (`branch:`, `tag:`, ...): swallow the
                            // value so later recognized pairs still apply.
                            if self.at(TokenKind::LeftBracket) {
                                self.advance();
                                while !self.at(TokenKind::RightBracket)
                                    && !self.at(TokenKind::NewLine)
                                    && !self.at(TokenKind::EndOfFile)
                                {
                                    self.advance();
                                }
                                if self.at(TokenKind::RightBracket) {
                                    self.advance();
                                }
                            } else if self.at_scalar() {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        if parenthesized && self.at(TokenKind::RightParen) {
            self.advance();
        }

        let mut effective_groups = outer_groups.to_vec();
        effective_groups.extend(inline_groups);
        let mut effective_platforms = outer_platforms.to_vec();
        effective_platforms.extend(inline_platforms);

        let mut decl = GemDeclaration::new(name);
        decl.platforms = effective_platforms;
        decl.versions = versions;
        decl.git = git;
        decl.path = path;
        decl.require = require;
        Ok((decl, effective_groups))
    }

    fn at_scalar(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::String | TokenKind::Symbol | TokenKind::Identifier | TokenKind::Integer
        )
    }

    /// Consume one scalar value token, stripping quoting where present.
    fn scalar_value(&mut self) -> String {
        let token = self.peek();
        let value = match token.kind {
            TokenKind::String | TokenKind::Symbol => normalize(token.text),
            _ => token.text.to_string(),
        };
        self.advance();
        value
    }

    /// Route a parsed declaration. A trailing `if` strips group labels no
    /// matter how the declaration is classified; so does the development
    /// bucket itself. Declarations whose name normalized to nothing are
    /// dropped.
    fn emit(
        &mut self,
        mut decl: GemDeclaration,
        effective_groups: Vec<String>,
        dev: bool,
        strip_groups: bool,
    ) {
        if decl.name.is_empty() {
            return;
        }
        let conditional = self.at(TokenKind::If);
        if !(dev || strip_groups || conditional) {
            decl.groups = Some(effective_groups);
        }
        if dev {
            self.out.groups.development.push(decl);
        } else {
            self.out.groups.runtime.push(decl);
        }
    }

    /// `(Gem|Pod) :: (Specification|Spec) . new`, consumed when matched.
    fn try_spec_prefix(&mut self) -> bool {
        let matched = matches!(self.text_at(0), "Gem" | "Pod")
            && self.kind_at(1) == TokenKind::Colon
            && self.kind_at(2) == TokenKind::Colon
            && self.kind_at(3) == TokenKind::Identifier
            && matches!(self.text_at(3), "Specification" | "Spec")
            && self.kind_at(4) == TokenKind::Dot
            && self.kind_at(5) == TokenKind::Identifier
            && self.text_at(5) == "new";
        if matched {
            for _ in 0..6 {
                self.advance();
            }
        }
        matched
    }

    fn parse_spec(&mut self) -> Result<(), ParseError> {
        if self.at(TokenKind::String) {
            self.out.self_name = Some(normalize(self.peek().text));
            self.advance();
        }
        if !self.at(TokenKind::Do) {
            self.discard_line();
            return Ok(());
        }
        self.advance();
        self.enter()?;

        // Optional block-argument declaration `|s|`.
        let mut block_arg: Option<&'src str> = None;
        if self.peek().kind == TokenKind::Symbol
            && self.peek().text == "|"
            && self.kind_at(1) == TokenKind::Identifier
            && self.kind_at(2) == TokenKind::Symbol
            && self.text_at(2) == "|"
        {
            block_arg = Some(self.text_at(1));
            self.advance();
            self.advance();
            self.advance();
        }

        self.parse_spec_statements(block_arg)?;
        self.leave();
        Ok(())
    }

    /// Statements inside a spec block, through the matching `end`.
    fn parse_spec_statements(&mut self, block_arg: Option<&'src str>) -> Result<(), ParseError> {
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::End => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::NewLine => self.advance(),
                TokenKind::If => {
                    self.advance();
                    self.enter()?;
                    self.parse_spec_conditional(block_arg)?;
                    self.leave();
                }
                _ => self.parse_spec_statement(block_arg)?,
            }
        }
    }

    /// Only the first branch of an in-spec conditional is interpreted;
    /// an `else` branch is skipped through the matching `end`.
    fn parse_spec_conditional(&mut self, block_arg: Option<&'src str>) -> Result<(), ParseError> {
        self.discard_line();
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::End => {
                    self.advance();
                    return Ok(());
                }
                TokenKind::Else => {
                    self.advance();
                    self.skip_past_block_end();
                    return Ok(());
                }
                TokenKind::NewLine => self.advance(),
                TokenKind::If => {
                    self.advance();
                    self.enter()?;
                    self.parse_spec_conditional(block_arg)?;
                    self.leave();
                }
                _ => self.parse_spec_statement(block_arg)?,
            }
        }
    }

    fn parse_spec_statement(&mut self, block_arg: Option<&'src str>) -> Result<(), ParseError> {
        if !self.at(TokenKind::Identifier) {
            self.discard_line();
            return Ok(());
        }
        if let Some(arg) = block_arg
            && self.peek().text != arg
        {
            self.discard_line();
            return Ok(());
        }
        if self.kind_at(1) != TokenKind::Dot || self.kind_at(2) != TokenKind::Identifier {
            self.discard_line();
            return Ok(());
        }
        let method = self.text_at(2);
        self.advance(); // receiver
        self.advance(); // dot
        self.advance(); // method name

        if self.at(TokenKind::Equals) {
            self.advance();
            if self.at(TokenKind::String) {
                let value = normalize(self.peek().text);
                match method {
                    "name" => self.out.self_name = Some(value),
                    "version" => self.out.self_version = Some(value),
                    _ => {}
                }
            }
            self.discard_line();
            return Ok(());
        }

        if method == "send" {
            if self.at(TokenKind::LeftParen) {
                self.advance();
            }
            if self.at(TokenKind::Symbol) {
                let selector = normalize(self.peek().text);
                if selector.contains("dependency") {
                    let dev = selector.contains("development");
                    self.advance();
                    if self.at(TokenKind::Comma) {
                        self.advance();
                        let (decl, effective_groups) = self.parse_declaration(&[], &[])?;
                        self.emit(decl, effective_groups, dev, false);
                    }
                } else {
                    self.note_dynamic("unresolved send selector", &selector);
                }
            } else {
                let detail = self.peek().text;
                self.note_dynamic("dynamic send target", detail);
            }
            self.discard_line();
            return Ok(());
        }

        match method {
            "add_dependency" | "add_runtime_dependency" | "add_development_dependency"
            | "dependency" => {
                let dev = method.contains("development");
                let strip_groups = method == "dependency";
                let (decl, effective_groups) = self.parse_declaration(&[], &[])?;
                self.emit(decl, effective_groups, dev, strip_groups);
                self.discard_line();
            }
            _ => self.discard_line(),
        }
        Ok(())
    }

    /// Skip a stray `do ... end` block, balancing nested `do`s.
    fn skip_do_block(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::Do => {
                    depth += 1;
                    if self.depth + depth > MAX_DEPTH {
                        return Err(self.error_at_current("nesting too deep"));
                    }
                    self.advance();
                }
                TokenKind::End => {
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => self.advance(),
            }
        }
    }

    /// Skip a stray parenthesized group, balancing nested parens.
    fn skip_paren_group(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return Ok(()),
                TokenKind::LeftParen => {
                    depth += 1;
                    if self.depth + depth > MAX_DEPTH {
                        return Err(self.error_at_current("nesting too deep"));
                    }
                    self.advance();
                }
                TokenKind::RightParen => {
                    self.advance();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => self.advance(),
            }
        }
    }

    /// Skip everything through the `end` matching the current position,
    /// balancing nested `do` and `if` blocks along the way.
    fn skip_past_block_end(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.peek().kind {
                TokenKind::EndOfFile => return,
                TokenKind::Do | TokenKind::If => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::End => {
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => self.advance(),
            }
        }
    }
}

/// Append a version argument: `%w` arrays expand into one constraint per
/// word, everything else is a single constraint.
fn push_versions(versions: &mut Vec<String>, raw: &str) {
    if raw.starts_with("%w") {
        versions.extend(expand_word_array(raw).iter().map(|v| format_version(v)));
    } else {
        versions.push(format_version(&normalize(raw)));
    }
}

fn clip(detail: &str) -> String {
    if detail.chars().count() <= 80 {
        detail.to_string()
    } else {
        let head: String = detail.chars().take(77).collect();
        format!("{head}...")
    }
}
