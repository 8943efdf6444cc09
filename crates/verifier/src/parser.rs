//! Parses logic programs embedded in magic-prefixed comment lines.
//!
//! The parser collects goal groups and inspections that the solver later
//! runs against a fact database. It stays usable after reporting an error;
//! the entry points return false when any error was recorded.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use crate::ast::{Builtins, EVarCell, EVarRef, SourcePos, Symbol, SymbolTable, Term, TermRef};

/// How a group of goals is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptanceCriterion {
    /// For this group to pass, no goals may fail.
    NoneMayFail,
    /// For this group to pass, some goals must fail.
    SomeMustFail,
}

/// A set of goals to be handled atomically.
#[derive(Debug)]
pub struct GoalGroup {
    pub accept_if: AcceptanceCriterion,
    /// Grouped goals, implicitly conjoined.
    pub goals: Vec<TermRef>,
}

/// Result of feeding one character to the [`LineClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexCheck {
    Magic,
    Ordinary,
    Inconclusive,
}

/// Decides, character by character, whether a line begins with the magic
/// comment prefix. Leading blanks and tabs are ignored.
///
/// The prefix cannot be baked into a lexer because there is no comment
/// syntax shared by all source languages; the caller supplies it per file.
pub struct LineClassifier {
    prefix: Vec<char>,
    matched: usize,
}

impl LineClassifier {
    pub fn new(prefix: &str) -> Self {
        LineClassifier {
            prefix: prefix.chars().collect(),
            matched: 0,
        }
    }

    pub fn check(&mut self, ch: char) -> LexCheck {
        if self.prefix.is_empty() {
            return LexCheck::Magic;
        }
        if self.matched == 0 && (ch == ' ' || ch == '\t') {
            return LexCheck::Inconclusive;
        }
        if self.prefix.get(self.matched) == Some(&ch) {
            self.matched += 1;
            if self.matched == self.prefix.len() {
                LexCheck::Magic
            } else {
                LexCheck::Inconclusive
            }
        } else {
            LexCheck::Ordinary
        }
    }
}

/// Unescapes a string literal, including its terminating quotes.
pub fn unescape(input: &str) -> Option<String> {
    let mut chars = input.chars();
    if chars.next()? != '"' {
        return None;
    }
    let mut out = String::new();
    loop {
        match chars.next()? {
            '"' => {
                return if chars.next().is_none() {
                    Some(out)
                } else {
                    None
                }
            }
            '\\' => match chars.next()? {
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                'n' => out.push('\n'),
                _ => return None,
            },
            other => out.push(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Atom(String),
    Str(String),
    Anchor(String),
    OffsetBegin(String),
    OffsetEnd(String),
    LParen,
    RParen,
    Comma,
    Equals,
    Question,
    Dot,
    LBrace,
    RBrace,
    BangBrace,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    pos: SourcePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnresolvedKind {
    /// An anchor (`@tok`).
    Anchor,
    /// The offset at the start of the location (`@^tok`).
    OffsetBegin,
    /// The offset at the end of the location (`@$tok`).
    OffsetEnd,
}

/// A record for some text to be matched against the next source line.
struct UnresolvedLocation {
    evar: EVarRef,
    text: String,
    group: usize,
    kind: UnresolvedKind,
    pos: SourcePos,
}

/// An end-of-source-line boundary in the token stream: pending location
/// references created by tokens before `at_token` resolve against `line`.
struct LineEvent {
    at_token: usize,
    line: String,
    offset_after: usize,
}

/// Collects together the goals and inspections of a verification program.
pub struct AssertionParser {
    groups: Vec<GoalGroup>,
    inspections: Vec<(String, EVarRef)>,
    identifier_context: HashMap<Symbol, TermRef>,
    evar_context: HashMap<Symbol, EVarRef>,
    unresolved: Vec<UnresolvedLocation>,
    errors: Vec<String>,
    had_errors: bool,
    inside_group: bool,
    evar_counter: u64,
}

impl Default for AssertionParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AssertionParser {
    pub fn new() -> Self {
        AssertionParser {
            groups: vec![GoalGroup {
                accept_if: AcceptanceCriterion::NoneMayFail,
                goals: Vec::new(),
            }],
            inspections: Vec::new(),
            identifier_context: HashMap::new(),
            evar_context: HashMap::new(),
            unresolved: Vec::new(),
            errors: Vec::new(),
            had_errors: false,
            inside_group: false,
            evar_counter: 0,
        }
    }

    pub fn groups(&self) -> &[GoalGroup] {
        &self.groups
    }

    pub fn inspections(&self) -> &[(String, EVarRef)] {
        &self.inspections
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Loads a string containing rules in magic comments. Returns true if
    /// there were no errors.
    pub fn parse_inline_rule_string(
        &mut self,
        content: &str,
        filename: &str,
        prefix: &str,
        symbols: &mut SymbolTable,
    ) -> bool {
        self.had_errors = false;
        let builtins = Builtins::intern(symbols);
        let mut run = ParseRun {
            parser: &mut *self,
            symbols,
            builtins,
            filename: filename.to_string(),
            tokens: Vec::new(),
            events: Vec::new(),
            pos: 0,
            next_event: 0,
        };
        run.scan(content, prefix);
        run.parse_program();
        run.finish();
        !self.had_errors
    }

    /// Loads a file containing rules in magic comments.
    pub fn parse_inline_rule_file(
        &mut self,
        path: &Path,
        prefix: &str,
        symbols: &mut SymbolTable,
    ) -> bool {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                self.parse_inline_rule_string(&content, &path.to_string_lossy(), prefix, symbols)
            }
            Err(err) => {
                self.error(format!("when reading {}: {err}", path.display()));
                false
            }
        }
    }

    fn error(&mut self, message: String) {
        warn!("assertion parse error: {message}");
        self.errors.push(message);
        self.had_errors = true;
    }

    fn fresh_evar(&mut self, pos: SourcePos) -> EVarRef {
        self.evar_counter += 1;
        EVarCell::new(self.evar_counter, pos)
    }

    /// The group currently receiving goals.
    fn group_id(&self) -> usize {
        if self.inside_group {
            self.groups.len() - 1
        } else {
            0
        }
    }

    fn append_goal(&mut self, group: usize, goal: TermRef) {
        self.groups[group].goals.push(goal);
    }
}

struct ParseRun<'a> {
    parser: &'a mut AssertionParser,
    symbols: &'a mut SymbolTable,
    builtins: Builtins,
    filename: String,
    tokens: Vec<Token>,
    events: Vec<LineEvent>,
    pos: usize,
    next_event: usize,
}

impl ParseRun<'_> {
    // ----- scanning -----

    fn scan(&mut self, content: &str, prefix: &str) {
        let mut offset = 0usize;
        for (index, line) in content.split('\n').enumerate() {
            let line_no = index as u32 + 1;
            match classify_line(line, prefix) {
                Some(content_start) => {
                    self.lex_line(&line[content_start..], line_no, content_start)
                }
                None => self.events.push(LineEvent {
                    at_token: self.tokens.len(),
                    line: line.to_string(),
                    offset_after: offset + line.len() + 1,
                }),
            }
            offset += line.len() + 1;
        }
    }

    fn lex_line(&mut self, text: &str, line: u32, col_base: usize) {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut i = 0usize;
        let pos_at = |byte: usize| SourcePos {
            line,
            column: (col_base + byte + 1) as u32,
        };
        while i < chars.len() {
            let (byte, c) = chars[i];
            let pos = pos_at(byte);
            match c {
                ' ' | '\t' | '\r' => {
                    i += 1;
                }
                '"' => match self.lex_string(text, &chars, &mut i) {
                    Some(value) => self.tokens.push(Token {
                        tok: Tok::Str(value),
                        pos,
                    }),
                    None => {
                        self.error_at(pos, "bad string literal");
                        return;
                    }
                },
                '@' => {
                    i += 1;
                    let mut kind = UnresolvedKind::Anchor;
                    if let Some(&(_, mark)) = chars.get(i) {
                        if mark == '^' {
                            kind = UnresolvedKind::OffsetBegin;
                            i += 1;
                        } else if mark == '$' {
                            kind = UnresolvedKind::OffsetEnd;
                            i += 1;
                        }
                    }
                    let token_text = if chars.get(i).map(|&(_, c)| c) == Some('"') {
                        match self.lex_string(text, &chars, &mut i) {
                            Some(value) => value,
                            None => {
                                self.error_at(pos, "bad quoted location spec");
                                return;
                            }
                        }
                    } else {
                        let start = i;
                        while i < chars.len() && is_atom_char(chars[i].1) {
                            i += 1;
                        }
                        chars[start..i].iter().map(|&(_, c)| c).collect()
                    };
                    if token_text.is_empty() {
                        self.error_at(pos, "empty location spec");
                        return;
                    }
                    let tok = match kind {
                        UnresolvedKind::Anchor => Tok::Anchor(token_text),
                        UnresolvedKind::OffsetBegin => Tok::OffsetBegin(token_text),
                        UnresolvedKind::OffsetEnd => Tok::OffsetEnd(token_text),
                    };
                    self.tokens.push(Token { tok, pos });
                }
                '!' => {
                    if chars.get(i + 1).map(|&(_, c)| c) == Some('{') {
                        self.tokens.push(Token {
                            tok: Tok::BangBrace,
                            pos,
                        });
                        i += 2;
                    } else {
                        self.error_at(pos, "unexpected '!'");
                        return;
                    }
                }
                '(' | ')' | ',' | '=' | '?' | '.' | '{' | '}' => {
                    let tok = match c {
                        '(' => Tok::LParen,
                        ')' => Tok::RParen,
                        ',' => Tok::Comma,
                        '=' => Tok::Equals,
                        '?' => Tok::Question,
                        '.' => Tok::Dot,
                        '{' => Tok::LBrace,
                        _ => Tok::RBrace,
                    };
                    self.tokens.push(Token { tok, pos });
                    i += 1;
                }
                _ if is_atom_char(c) => {
                    let start = i;
                    while i < chars.len() && is_atom_char(chars[i].1) {
                        i += 1;
                    }
                    let atom: String = chars[start..i].iter().map(|&(_, c)| c).collect();
                    self.tokens.push(Token {
                        tok: Tok::Atom(atom),
                        pos,
                    });
                }
                other => {
                    self.error_at(pos, &format!("unexpected character '{other}'"));
                    return;
                }
            }
        }
    }

    /// Lexes a quoted literal starting at `chars[*i]`, leaving `*i` just
    /// past the closing quote.
    fn lex_string(&mut self, text: &str, chars: &[(usize, char)], i: &mut usize) -> Option<String> {
        let start_byte = chars[*i].0;
        let mut j = *i + 1;
        let mut escaped = false;
        while j < chars.len() {
            let (byte, c) = chars[j];
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                let end_byte = byte + c.len_utf8();
                *i = j + 1;
                return unescape(&text[start_byte..end_byte]);
            }
            j += 1;
        }
        None
    }

    // ----- token plumbing -----

    fn fire_events(&mut self) {
        while self.next_event < self.events.len()
            && self.events[self.next_event].at_token <= self.pos
        {
            let line = std::mem::take(&mut self.events[self.next_event].line);
            let offset_after = self.events[self.next_event].offset_after;
            self.next_event += 1;
            self.resolve_locations(&line, offset_after);
        }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn peek2(&self) -> Option<&Tok> {
        self.tokens.get(self.pos + 1).map(|t| &t.tok)
    }

    fn here(&self) -> SourcePos {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.pos)
            .unwrap_or_default()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
            self.fire_events();
        }
        token
    }

    fn error_at(&mut self, pos: SourcePos, message: &str) {
        let rendered = format!("{}:{}:{}: {message}", self.filename, pos.line, pos.column);
        self.parser.error(rendered);
    }

    // ----- location resolution -----

    /// Called at the end of an ordinary source line to bind pending
    /// location references against its text.
    fn resolve_locations(&mut self, line: &str, offset_after: usize) {
        let records = std::mem::take(&mut self.parser.unresolved);
        for record in records {
            let Some(col) = line.find(&record.text) else {
                self.error_at(record.pos, &format!("{} not found", record.text));
                continue;
            };
            if line[col + 1..].contains(&record.text) {
                self.error_at(record.pos, &format!("{} is ambiguous", record.text));
                continue;
            }
            let line_start = offset_after - line.len() - 1;
            let begin = line_start + col;
            let end = begin + record.text.len();
            match record.kind {
                UnresolvedKind::OffsetBegin | UnresolvedKind::OffsetEnd => {
                    if record.evar.is_bound() {
                        self.error_at(record.pos, &format!("{} already resolved", record.text));
                        continue;
                    }
                    let offset = if record.kind == UnresolvedKind::OffsetBegin {
                        begin
                    } else {
                        end
                    };
                    record
                        .evar
                        .set_binding(Some(self.number_ident(offset)));
                }
                UnresolvedKind::Anchor => {
                    let anchor = Term::evar(record.evar.clone());
                    let begin_ident = self.number_ident(begin);
                    let start_goal = self.make_fact(vec![
                        anchor.clone(),
                        self.empty_ident(),
                        self.empty_ident(),
                        Term::ident(self.builtins.loc_start),
                        begin_ident,
                    ]);
                    let end_ident = self.number_ident(end);
                    let end_goal = self.make_fact(vec![
                        anchor,
                        self.empty_ident(),
                        self.empty_ident(),
                        Term::ident(self.builtins.loc_end),
                        end_ident,
                    ]);
                    self.parser.append_goal(record.group, start_goal);
                    self.parser.append_goal(record.group, end_goal);
                }
            }
        }
    }

    /// Reports pending location references that never saw a source line.
    fn finish(&mut self) {
        self.pos = self.tokens.len();
        self.fire_events();
        let leftovers = std::mem::take(&mut self.parser.unresolved);
        for record in leftovers {
            self.error_at(record.pos, &format!("{} not found", record.text));
        }
        if self.parser.inside_group {
            let pos = self.here();
            self.error_at(pos, "unterminated goal group");
            self.parser.inside_group = false;
        }
    }

    // ----- term construction -----

    fn empty_ident(&self) -> TermRef {
        Term::ident(self.builtins.empty)
    }

    fn number_ident(&mut self, value: usize) -> TermRef {
        Term::ident(self.symbols.intern(&value.to_string()))
    }

    fn make_fact(&self, body: Vec<TermRef>) -> TermRef {
        Term::predicate(Term::ident(self.builtins.fact), body)
    }

    fn interned_ident(&mut self, text: &str) -> TermRef {
        let symbol = self.symbols.intern(text);
        self.parser
            .identifier_context
            .entry(symbol)
            .or_insert_with(|| Term::ident(symbol))
            .clone()
    }

    fn interned_evar(&mut self, text: &str, pos: SourcePos) -> EVarRef {
        let symbol = self.symbols.intern(text);
        if let Some(evar) = self.parser.evar_context.get(&symbol) {
            return evar.clone();
        }
        let evar = self.parser.fresh_evar(pos);
        self.parser.evar_context.insert(symbol, evar.clone());
        evar
    }

    /// Roots a path fragment: absolute fragments pass through, empty ones
    /// become the root fact name, everything else gains `default_root`.
    fn path_ident(&mut self, fragment: &str, default_root: &str) -> TermRef {
        if fragment.is_empty() {
            self.interned_ident("/")
        } else if fragment.starts_with('/') {
            self.interned_ident(fragment)
        } else {
            let rooted = format!("{default_root}{fragment}");
            self.interned_ident(&rooted)
        }
    }

    // ----- grammar -----

    fn parse_program(&mut self) {
        self.fire_events();
        while let Some(tok) = self.peek() {
            match tok {
                Tok::LBrace => self.parse_group(AcceptanceCriterion::NoneMayFail),
                Tok::BangBrace => self.parse_group(AcceptanceCriterion::SomeMustFail),
                Tok::RBrace => {
                    let pos = self.here();
                    self.error_at(pos, "unmatched '}'");
                    self.bump();
                }
                _ => {
                    if !self.parse_goal() {
                        self.bump();
                    }
                }
            }
        }
    }

    fn parse_group(&mut self, accept_if: AcceptanceCriterion) {
        let pos = self.here();
        self.bump();
        if self.parser.inside_group {
            self.error_at(pos, "it is not valid to enter nested goal groups");
        } else {
            self.parser.inside_group = true;
            self.parser.groups.push(GoalGroup {
                accept_if,
                goals: Vec::new(),
            });
        }
        loop {
            match self.peek() {
                None => {
                    let pos = self.here();
                    self.error_at(pos, "unterminated goal group");
                    break;
                }
                Some(Tok::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Tok::LBrace) | Some(Tok::BangBrace) => {
                    let pos = self.here();
                    self.error_at(pos, "it is not valid to enter nested goal groups");
                    self.bump();
                }
                Some(_) => {
                    if !self.parse_goal() {
                        self.bump();
                    }
                }
            }
        }
        self.parser.inside_group = false;
    }

    /// Parses one goal. Returns false when no progress could be made.
    fn parse_goal(&mut self) -> bool {
        let start = self.pos;
        let Some((lhs, bound)) = self.parse_exp() else {
            return self.pos != start;
        };
        match self.peek().cloned() {
            Some(Tok::Dot) => {
                self.bump();
                let Some(property) = self.expect_atom("property path") else {
                    return true;
                };
                let Some((value, _)) = self.parse_exp() else {
                    return true;
                };
                let path = self.path_ident(&property, "/kythe/");
                let goal = self.make_fact(vec![
                    lhs,
                    self.empty_ident(),
                    self.empty_ident(),
                    path,
                    value,
                ]);
                self.parser.append_goal(self.parser.group_id(), goal);
                true
            }
            Some(Tok::Atom(kind)) => {
                self.bump();
                let mut ordinal = None;
                if self.peek() == Some(&Tok::Dot) {
                    self.bump();
                    match self.expect_atom("edge ordinal") {
                        Some(text) => match text.parse::<u32>() {
                            Ok(_) => ordinal = Some(text),
                            Err(_) => {
                                let pos = self.here();
                                self.error_at(
                                    pos,
                                    &format!("expected a numeric ordinal, got '{text}'"),
                                );
                            }
                        },
                        None => return true,
                    }
                }
                let Some((rhs, _)) = self.parse_exp() else {
                    return true;
                };
                let path = self.path_ident(&kind, "/kythe/edge/");
                let goal = match ordinal {
                    Some(ordinal) => {
                        let ordinal_value = self.interned_ident(&ordinal);
                        self.make_fact(vec![
                            lhs,
                            path,
                            rhs,
                            Term::ident(self.builtins.ordinal),
                            ordinal_value,
                        ])
                    }
                    None => self.make_fact(vec![
                        lhs,
                        path,
                        rhs,
                        Term::ident(self.builtins.root),
                        self.empty_ident(),
                    ]),
                };
                self.parser.append_goal(self.parser.group_id(), goal);
                true
            }
            _ if bound => true, // a bare binding is a complete goal
            _ => {
                let pos = self.here();
                self.error_at(pos, "expected an edge kind or a property");
                true
            }
        }
    }

    /// Parses one expression: a primary with optional inspection marker and
    /// optional `=` binding. Returns the expression and whether a binding
    /// goal was appended.
    fn parse_exp(&mut self) -> Option<(TermRef, bool)> {
        // "label"? EVar records an inspection under an explicit name.
        if let (Some(Tok::Str(_)), Some(Tok::Question)) = (self.peek(), self.peek2()) {
            let Some(Token {
                tok: Tok::Str(label),
                pos,
            }) = self.bump()
            else {
                unreachable!("peeked a string literal");
            };
            self.bump();
            let (term, bound) = self.parse_exp()?;
            match term.as_evar() {
                Some(evar) => self
                    .parser
                    .inspections
                    .push((label, evar.clone())),
                None => self.error_at(pos, "inspecting something that's not an EVar"),
            }
            return Some((term, bound));
        }

        let (term, spelling) = self.parse_primary()?;
        if self.peek() == Some(&Tok::Question) {
            let pos = self.here();
            self.bump();
            match term.as_evar() {
                Some(evar) => self
                    .parser
                    .inspections
                    .push((spelling.unwrap_or_default(), evar.clone())),
                None => self.error_at(pos, "inspecting something that's not an EVar"),
            }
        }
        let mut bound = false;
        if self.peek() == Some(&Tok::Equals) {
            self.bump();
            let (rhs, _) = self.parse_exp()?;
            let goal = Term::predicate(
                Term::ident(self.builtins.eq),
                vec![term.clone(), rhs],
            );
            self.parser.append_goal(self.parser.group_id(), goal);
            bound = true;
        }
        Some((term, bound))
    }

    fn parse_primary(&mut self) -> Option<(TermRef, Option<String>)> {
        let pos = self.here();
        match self.peek().cloned() {
            Some(Tok::Atom(text)) => {
                self.bump();
                if text == "vname" && self.peek() == Some(&Tok::LParen) {
                    return self.parse_vname_tail(pos).map(|t| (t, None));
                }
                if text == "_" {
                    let evar = self.parser.fresh_evar(pos);
                    return Some((Term::evar(evar), None));
                }
                if text.chars().next().is_some_and(|c| c.is_uppercase()) {
                    let evar = self.interned_evar(&text, pos);
                    Some((Term::evar(evar), Some(text)))
                } else {
                    Some((self.interned_ident(&text), Some(text)))
                }
            }
            Some(Tok::Str(text)) => {
                self.bump();
                Some((self.interned_ident(&text), Some(text)))
            }
            Some(Tok::Anchor(text)) => {
                self.bump();
                Some((self.anchor_spec(text.clone(), pos), Some(text)))
            }
            Some(Tok::OffsetBegin(text)) => {
                self.bump();
                Some((
                    self.offset_spec(text.clone(), pos, UnresolvedKind::OffsetBegin),
                    Some(text),
                ))
            }
            Some(Tok::OffsetEnd(text)) => {
                self.bump();
                Some((
                    self.offset_spec(text.clone(), pos, UnresolvedKind::OffsetEnd),
                    Some(text),
                ))
            }
            _ => {
                self.error_at(pos, "expected an expression");
                None
            }
        }
    }

    /// Parses the parenthesized five-field tail of a `vname(...)` tuple.
    fn parse_vname_tail(&mut self, pos: SourcePos) -> Option<TermRef> {
        self.bump(); // (
        let mut fields = Vec::new();
        loop {
            let (field, _) = self.parse_exp()?;
            fields.push(field);
            match self.peek() {
                Some(Tok::Comma) => {
                    self.bump();
                }
                Some(Tok::RParen) => {
                    self.bump();
                    break;
                }
                _ => {
                    let pos = self.here();
                    self.error_at(pos, "expected ',' or ')' in vname");
                    return None;
                }
            }
        }
        if fields.len() != 5 {
            self.error_at(
                pos,
                &format!("vname takes 5 fields, got {}", fields.len()),
            );
            return None;
        }
        Some(Term::predicate(Term::ident(self.builtins.vname), fields))
    }

    /// An anchor spec: a fresh EVar constrained to be an anchor node, with
    /// its offsets bound once the next source line is seen.
    fn anchor_spec(&mut self, text: String, pos: SourcePos) -> TermRef {
        let evar = self.parser.fresh_evar(pos);
        let group = self.parser.group_id();
        self.parser.unresolved.push(UnresolvedLocation {
            evar: evar.clone(),
            text,
            group,
            kind: UnresolvedKind::Anchor,
            pos,
        });
        let anchor_kind = self.interned_ident("anchor");
        let goal = self.make_fact(vec![
            Term::evar(evar.clone()),
            self.empty_ident(),
            self.empty_ident(),
            Term::ident(self.builtins.kind),
            anchor_kind,
        ]);
        self.parser.append_goal(group, goal);
        Term::evar(evar)
    }

    /// An offset spec: a fresh EVar bound directly to a byte offset once
    /// the next source line is seen.
    fn offset_spec(&mut self, text: String, pos: SourcePos, kind: UnresolvedKind) -> TermRef {
        let evar = self.parser.fresh_evar(pos);
        let group = self.parser.group_id();
        self.parser.unresolved.push(UnresolvedLocation {
            evar: evar.clone(),
            text,
            group,
            kind,
            pos,
        });
        Term::evar(evar)
    }

    fn expect_atom(&mut self, what: &str) -> Option<String> {
        match self.peek().cloned() {
            Some(Tok::Atom(text)) => {
                self.bump();
                Some(text)
            }
            _ => {
                let pos = self.here();
                self.error_at(pos, &format!("expected {what}"));
                None
            }
        }
    }
}

fn classify_line(line: &str, prefix: &str) -> Option<usize> {
    let mut classifier = LineClassifier::new(prefix);
    for (byte, ch) in line.char_indices() {
        match classifier.check(ch) {
            LexCheck::Magic => return Some(byte + ch.len_utf8()),
            LexCheck::Ordinary => return None,
            LexCheck::Inconclusive => continue,
        }
    }
    None
}

fn is_atom_char(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            '(' | ')' | '{' | '}' | ',' | '"' | '?' | '=' | '.' | '@' | '!'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_skips_leading_blanks() {
        let mut classifier = LineClassifier::new("//-");
        assert_eq!(classifier.check(' '), LexCheck::Inconclusive);
        assert_eq!(classifier.check('\t'), LexCheck::Inconclusive);
        assert_eq!(classifier.check('/'), LexCheck::Inconclusive);
        assert_eq!(classifier.check('/'), LexCheck::Inconclusive);
        assert_eq!(classifier.check('-'), LexCheck::Magic);
    }

    #[test]
    fn classifier_rejects_other_text() {
        let mut classifier = LineClassifier::new("//-");
        assert_eq!(classifier.check('i'), LexCheck::Ordinary);
        let mut partial = LineClassifier::new("//-");
        assert_eq!(partial.check('/'), LexCheck::Inconclusive);
        assert_eq!(partial.check('x'), LexCheck::Ordinary);
    }

    #[test]
    fn unescape_handles_literals() {
        assert_eq!(unescape(r#""""#), Some(String::new()));
        assert_eq!(unescape(""), None);
        assert_eq!(unescape(r#""foo""#), Some("foo".to_string()));
        assert_eq!(unescape(r#""\"foo\"""#), Some("\"foo\"".to_string()));
        assert_eq!(unescape(r#""\foo""#), None);
        assert_eq!(unescape(r#""foo\""#), None);
        assert_eq!(unescape(r#""\\""#), Some("\\".to_string()));
    }

    #[test]
    fn repeated_spellings_share_ast_nodes() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        assert!(parser.parse_inline_rule_string(
            "#- SomeNode childof SomeNode\n",
            "test",
            "#-",
            &mut symbols,
        ));
        let goals = &parser.groups()[0].goals;
        assert_eq!(goals.len(), 1);
        let (_, tuple) = goals[0].as_app().unwrap();
        let elements = tuple.as_tuple().unwrap();
        let first = elements[0].as_evar().unwrap();
        let second = elements[2].as_evar().unwrap();
        assert!(std::rc::Rc::ptr_eq(first, second));
    }

    #[test]
    fn underscore_is_fresh_every_time() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        assert!(parser.parse_inline_rule_string(
            "#- _ childof _\n",
            "test",
            "#-",
            &mut symbols,
        ));
        let goals = &parser.groups()[0].goals;
        let (_, tuple) = goals[0].as_app().unwrap();
        let elements = tuple.as_tuple().unwrap();
        let first = elements[0].as_evar().unwrap();
        let second = elements[2].as_evar().unwrap();
        assert!(!std::rc::Rc::ptr_eq(first, second));
    }

    #[test]
    fn groups_do_not_nest() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        assert!(!parser.parse_inline_rule_string(
            "#- !{ A childof B { C childof D } }\n",
            "test",
            "#-",
            &mut symbols,
        ));
        assert!(!parser.errors().is_empty());
    }

    #[test]
    fn parser_recovers_after_errors() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        assert!(!parser.parse_inline_rule_string(
            "#- )\n#- A childof B\n",
            "test",
            "#-",
            &mut symbols,
        ));
        // The goal after the error still parsed.
        assert_eq!(parser.groups()[0].goals.len(), 1);
    }

    #[test]
    fn anchor_specs_resolve_against_the_next_source_line() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        let content = "//- @text defines SomeNode\nsome text here\n";
        assert!(parser.parse_inline_rule_string(content, "test", "//-", &mut symbols));
        // kind-anchor goal, then the offsets resolved at end of the source
        // line, then the defines goal.
        let goals = &parser.groups()[0].goals;
        assert_eq!(goals.len(), 4);
        let expect_value = |goal: &TermRef, value: &str| {
            let (_, tuple) = goal.as_app().unwrap();
            let elements = tuple.as_tuple().unwrap();
            let symbol = elements[4].as_ident().unwrap();
            assert_eq!(symbols.text(symbol), value);
        };
        // "text" starts at byte 32 of the content: the source line starts
        // at 27 and "some " is 5 bytes long.
        expect_value(&goals[1], "32");
        expect_value(&goals[2], "36");
    }

    #[test]
    fn ambiguous_anchor_text_is_an_error() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        let content = "//- @text defines SomeNode\ntext and text again\n";
        assert!(!parser.parse_inline_rule_string(content, "test", "//-", &mut symbols));
    }

    #[test]
    fn unresolved_anchor_at_eof_is_an_error() {
        let mut symbols = SymbolTable::new();
        let mut parser = AssertionParser::new();
        assert!(!parser.parse_inline_rule_string(
            "//- @tok defines SomeNode",
            "test",
            "//-",
            &mut symbols,
        ));
    }
}
