//! Best-effort Rust source highlighting for stack-frame excerpts.
//!
//! The lexer is purely lexical: identifier roles are guessed from casing and
//! neighbouring tokens, so unusual code may come out with no role at all.

// Byte positions always come from `char::len_utf8` steps or ASCII delimiters.
#![allow(clippy::string_slice)]

/// Lines shown on each side of the current line by default.
pub const DEFAULT_CONTEXT: usize = 8;
/// Upper bound for the context window.
pub const MAX_CONTEXT: usize = 30;

const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "yield",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Keyword,
    Operator,
    String,
    Number,
    Comment,
    Lifetime,
    Macro,
    Attribute,
    Ident,
    Punct,
    Whitespace,
}

impl TokenKind {
    /// CSS-friendly name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Operator => "operator",
            Self::String => "string",
            Self::Number => "number",
            Self::Comment => "comment",
            Self::Lifetime => "lifetime",
            Self::Macro => "macro",
            Self::Attribute => "attribute",
            Self::Ident => "ident",
            Self::Punct => "punct",
            Self::Whitespace => "ws",
        }
    }
}

/// Guessed meaning of an identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Role {
    #[default]
    None,
    Function,
    Type,
    Constant,
    Member,
    Namespace,
}

impl Role {
    pub const fn as_str(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Function => Some("function"),
            Self::Type => Some("type"),
            Self::Constant => Some("constant"),
            Self::Member => Some("member"),
            Self::Namespace => Some("namespace"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub role: Role,
    pub text: &'src str,
}

/// One line of an excerpt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptLine<'src> {
    /// 1-based line number.
    pub number: usize,
    pub tokens: Vec<Token<'src>>,
    /// The line the excerpt is centered on.
    pub current: bool,
}

pub fn clamp_context(context: usize) -> usize {
    context.clamp(1, MAX_CONTEXT)
}

/// Tokenize `source` and assign identifier roles.
pub fn tokenize(source: &str) -> Vec<Token<'_>> {
    let mut tokens = Lexer::new(source).lex();
    assign_roles(&mut tokens);
    tokens
}

/// Every line of `source`, tokenized.
pub fn lines(source: &str) -> Vec<ExcerptLine<'_>> {
    split_lines(tokenize(source), 1, usize::MAX, 0)
}

/// Lines `line - context ..= line + context` of `source`, tokenized.
///
/// `line` is 1-based; out-of-range lines give an empty excerpt. `context` is
/// clamped to `1..=MAX_CONTEXT`.
pub fn excerpt(source: &str, line: usize, context: usize) -> Vec<ExcerptLine<'_>> {
    let total = source.lines().count();
    if line == 0 || line > total {
        return Vec::new();
    }
    let context = clamp_context(context);
    let first = line.saturating_sub(context).max(1);
    let last = (line + context).min(total);
    split_lines(tokenize(source), first, last, line)
}

/// Distribute tokens over lines, splitting tokens that span newlines.
fn split_lines(tokens: Vec<Token<'_>>, first: usize, last: usize, current: usize) -> Vec<ExcerptLine<'_>> {
    let mut lines = Vec::new();
    let mut number = 1;
    let mut line = Vec::new();

    for token in tokens {
        let mut pieces = token.text.split('\n').peekable();
        while let Some(piece) = pieces.next() {
            if !piece.is_empty() && (first..=last).contains(&number) {
                line.push(Token {
                    text: piece.trim_end_matches('\r'),
                    ..token
                });
            }
            if pieces.peek().is_some() {
                if (first..=last).contains(&number) {
                    lines.push(ExcerptLine {
                        number,
                        tokens: std::mem::take(&mut line),
                        current: number == current,
                    });
                }
                number += 1;
                if number > last {
                    return lines;
                }
            }
        }
    }

    if (first..=last).contains(&number) && !line.is_empty() {
        lines.push(ExcerptLine {
            number,
            tokens: line,
            current: number == current,
        });
    }
    lines
}

fn assign_roles(tokens: &mut [Token<'_>]) {
    let significant: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter(|(_, t)| !matches!(t.kind, TokenKind::Whitespace | TokenKind::Comment))
        .map(|(idx, _)| idx)
        .collect();

    for (pos, &idx) in significant.iter().enumerate() {
        if tokens[idx].kind != TokenKind::Ident {
            continue;
        }
        let prev = pos.checked_sub(1).map(|p| tokens[significant[p]]);
        let next = significant.get(pos + 1).map(|&n| tokens[n]);
        tokens[idx].role = guess_role(tokens[idx].text, prev, next);
    }
}

fn guess_role(text: &str, prev: Option<Token<'_>>, next: Option<Token<'_>>) -> Role {
    let next_is = |s: &str| next.is_some_and(|t| t.text == s);
    let prev_is = |s: &str| prev.is_some_and(|t| t.text == s);

    let starts_upper = text.chars().next().is_some_and(char::is_uppercase);
    if starts_upper {
        let all_caps = text
            .chars()
            .all(|c| c.is_uppercase() || c.is_ascii_digit() || c == '_');
        return if all_caps && text.len() > 1 {
            Role::Constant
        } else {
            Role::Type
        };
    }

    if prev_is(".") {
        return if next_is("(") || next_is("::") {
            Role::Function
        } else {
            Role::Member
        };
    }
    if prev_is("fn") || next_is("(") {
        return Role::Function;
    }
    if next_is("::") {
        return Role::Namespace;
    }
    Role::None
}

struct Lexer<'src> {
    source: &'src str,
    pos: usize,
}

impl<'src> Lexer<'src> {
    fn new(source: &'src str) -> Self {
        Self { source, pos: 0 }
    }

    fn lex(&mut self) -> Vec<Token<'src>> {
        let mut tokens = Vec::new();
        while self.pos < self.source.len() {
            let start = self.pos;
            let kind = self.lex_token();
            // Every branch consumes at least one char.
            debug_assert!(self.pos > start);
            tokens.push(Token {
                kind,
                role: Role::None,
                text: &self.source[start..self.pos],
            });
        }
        tokens
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    fn current(&self) -> char {
        self.rest().chars().next().unwrap_or('\0')
    }

    fn peek(&self) -> char {
        self.rest().chars().nth(1).unwrap_or('\0')
    }

    fn advance(&mut self) {
        if self.pos < self.source.len() {
            self.pos += self.current().len_utf8();
        }
    }

    fn advance_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.pos < self.source.len() && pred(self.current()) {
            self.advance();
        }
    }

    fn lex_token(&mut self) -> TokenKind {
        let c = self.current();
        match c {
            c if c.is_whitespace() => {
                self.advance_while(char::is_whitespace);
                TokenKind::Whitespace
            }
            '/' if self.peek() == '/' => {
                self.advance_while(|c| c != '\n');
                TokenKind::Comment
            }
            '/' if self.peek() == '*' => {
                self.lex_block_comment();
                TokenKind::Comment
            }
            '"' => {
                self.lex_string();
                TokenKind::String
            }
            'b' if self.peek() == '"' => {
                self.advance();
                self.lex_string();
                TokenKind::String
            }
            'b' if self.peek() == '\'' => {
                self.advance();
                self.lex_quote()
            }
            'r' | 'b' if self.is_raw_string() => {
                self.lex_raw_string();
                TokenKind::String
            }
            '\'' => self.lex_quote(),
            '#' if self.peek() == '[' || self.peek() == '!' => {
                self.lex_attribute();
                TokenKind::Attribute
            }
            c if c.is_ascii_digit() => {
                self.lex_number();
                TokenKind::Number
            }
            c if c.is_alphabetic() || c == '_' => self.lex_ident(),
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' => {
                self.advance();
                TokenKind::Punct
            }
            _ => {
                self.lex_operator();
                TokenKind::Operator
            }
        }
    }

    fn lex_block_comment(&mut self) {
        let mut depth = 0_usize;
        while self.pos < self.source.len() {
            if self.rest().starts_with("/*") {
                depth += 1;
                self.pos += 2;
            } else if self.rest().starts_with("*/") {
                depth -= 1;
                self.pos += 2;
                if depth == 0 {
                    return;
                }
            } else {
                self.advance();
            }
        }
    }

    fn lex_string(&mut self) {
        self.advance();
        while self.pos < self.source.len() {
            match self.current() {
                '\\' => {
                    self.advance();
                    self.advance();
                }
                '"' => {
                    self.advance();
                    return;
                }
                _ => self.advance(),
            }
        }
    }

    fn is_raw_string(&self) -> bool {
        let rest = self.rest();
        let rest = rest.strip_prefix("br").or_else(|| rest.strip_prefix('r'));
        rest.is_some_and(|r| r.trim_start_matches('#').starts_with('"'))
    }

    fn lex_raw_string(&mut self) {
        self.advance_while(|c| c == 'b' || c == 'r');
        let start = self.pos;
        self.advance_while(|c| c == '#');
        let hashes = self.pos - start;
        self.advance();

        let closing = format!("\"{}", "#".repeat(hashes));
        match self.rest().find(&closing) {
            Some(end) => self.pos += end + closing.len(),
            None => self.pos = self.source.len(),
        }
    }

    /// A char literal or a lifetime, both starting with `'`.
    fn lex_quote(&mut self) -> TokenKind {
        self.advance();
        let c = self.current();
        let is_lifetime = (c.is_alphabetic() || c == '_') && self.peek() != '\'';
        if is_lifetime {
            self.advance_while(|c| c.is_alphanumeric() || c == '_');
            return TokenKind::Lifetime;
        }

        if c == '\\' {
            self.advance();
        }
        self.advance();
        // `'\u{1F600}'` and friends
        self.advance_while(|c| c != '\'' && c != '\n');
        if self.current() == '\'' {
            self.advance();
        }
        TokenKind::String
    }

    fn lex_attribute(&mut self) {
        let mut depth = 0_usize;
        while self.pos < self.source.len() {
            match self.current() {
                '[' => depth += 1,
                ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                '\n' => return,
                _ => {}
            }
            self.advance();
        }
    }

    fn lex_number(&mut self) {
        self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        if self.current() == '.' && self.peek().is_ascii_digit() {
            self.advance();
            self.advance_while(|c| c.is_ascii_alphanumeric() || c == '_');
        }
    }

    fn lex_ident(&mut self) -> TokenKind {
        let start = self.pos;
        self.advance_while(|c| c.is_alphanumeric() || c == '_');
        let text = &self.source[start..self.pos];

        if self.current() == '!' && self.peek() != '=' {
            self.advance();
            return TokenKind::Macro;
        }
        if KEYWORDS.contains(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Ident
        }
    }

    fn lex_operator(&mut self) {
        const PAIRS: &[&str] = &[
            "::", "->", "=>", "==", "!=", "<=", ">=", "&&", "||", "..", "+=", "-=", "*=", "/=",
        ];
        if PAIRS.iter().any(|pair| self.rest().starts_with(pair)) {
            self.pos += 2;
        } else {
            self.advance();
        }
    }
}
