//! The verifier facade: owns the symbol table, the fact database, and the
//! assertion parser, and runs the solver over them.

use std::cmp::Ordering;
use std::path::Path;

use tracing::warn;

use xrefscope_api::models::Entry;

use crate::ast::{Builtins, EVarRef, SymbolTable, Term, TermRef};
use crate::error::VerifyError;
use crate::parser::{AcceptanceCriterion, AssertionParser, GoalGroup};
use crate::solver::Solver;

pub struct Verifier {
    symbols: SymbolTable,
    builtins: Builtins,
    parser: AssertionParser,
    facts: Vec<TermRef>,
    entries: Vec<Entry>,
    ignore_dups: bool,
    database_prepared: bool,
    diagnostics: Vec<String>,
    highest_group_reached: usize,
    highest_goal_reached: usize,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        let mut symbols = SymbolTable::new();
        let builtins = Builtins::intern(&mut symbols);
        Verifier {
            symbols,
            builtins,
            parser: AssertionParser::new(),
            facts: Vec::new(),
            entries: Vec::new(),
            ignore_dups: false,
            database_prepared: false,
            diagnostics: Vec::new(),
            highest_group_reached: 0,
            highest_goal_reached: 0,
        }
    }

    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn groups(&self) -> &[GoalGroup] {
        self.parser.groups()
    }

    pub fn parse_errors(&self) -> &[String] {
        self.parser.errors()
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    pub fn highest_group_reached(&self) -> usize {
        self.highest_group_reached
    }

    pub fn highest_goal_reached(&self) -> usize {
        self.highest_goal_reached
    }

    /// Accept duplicate facts in the database.
    pub fn ignore_duplicate_facts(&mut self) {
        self.ignore_dups = true;
    }

    /// Adds one fact to the database.
    pub fn assert_fact(&mut self, entry: &Entry) {
        let source = self.vname_term(
            &entry.source.signature,
            &entry.source.corpus,
            &entry.source.root,
            &entry.source.path,
            &entry.source.language,
        );
        let edge = self.ident_or_empty(&entry.edge_kind);
        let target = match &entry.target {
            Some(vname) => self.vname_term(
                &vname.signature,
                &vname.corpus,
                &vname.root,
                &vname.path,
                &vname.language,
            ),
            None => Term::ident(self.builtins.empty),
        };
        let name = self.ident_or_empty(&entry.fact_name);
        let value = self.ident_or_empty(&entry.fact_value);
        let fact = Term::predicate(
            Term::ident(self.builtins.fact),
            vec![source, edge, target, name, value],
        );
        self.facts.push(fact);
        self.entries.push(entry.clone());
        self.database_prepared = false;
    }

    /// Loads newline-delimited JSON entries. Returns how many facts were
    /// added.
    pub fn load_json_entries(&mut self, data: &str) -> Result<usize, VerifyError> {
        let mut count = 0usize;
        for line in data.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let entry: Entry = serde_json::from_str(line)?;
            self.assert_fact(&entry);
            count += 1;
        }
        Ok(count)
    }

    /// Parses assertion rules embedded in `content`. Returns true if there
    /// were no parse errors.
    pub fn parse_inline_rules_string(
        &mut self,
        content: &str,
        filename: &str,
        prefix: &str,
    ) -> bool {
        self.parser
            .parse_inline_rule_string(content, filename, prefix, &mut self.symbols)
    }

    /// Parses assertion rules from a file.
    pub fn parse_inline_rules_file(&mut self, path: &Path, prefix: &str) -> bool {
        self.parser
            .parse_inline_rule_file(path, prefix, &mut self.symbols)
    }

    /// Sorts the database and checks fact well-formedness: every fact must
    /// have a valid shape, duplicates are rejected unless permitted, and
    /// two facts about one node may not disagree on a property value.
    pub fn prepare_database(&mut self) -> bool {
        if self.database_prepared {
            return true;
        }
        self.diagnostics.clear();
        let symbols = &self.symbols;
        let builtins = &self.builtins;
        self.facts
            .sort_by(|a, b| cmp_facts(symbols, a, b));

        let mut is_ok = true;
        for index in 0..self.facts.len() {
            let fact = &self.facts[index];
            if !fact_has_valid_form(builtins, fact) {
                self.diagnostics.push(format!(
                    "fact has invalid form: {}",
                    fact.to_display(symbols)
                ));
                is_ok = false;
                continue;
            }
            if index == 0 {
                continue;
            }
            let previous = &self.facts[index - 1];
            if !self.ignore_dups && cmp_facts(symbols, previous, fact) == Ordering::Equal {
                self.diagnostics.push(format!(
                    "two facts were equal: {}",
                    fact.to_display(symbols)
                ));
                is_ok = false;
                continue;
            }
            if node_facts_conflict(builtins, previous, fact) {
                self.diagnostics.push(format!(
                    "two facts about a node differed in value: {} vs {}",
                    previous.to_display(symbols),
                    fact.to_display(symbols)
                ));
                is_ok = false;
            }
        }
        for diagnostic in &self.diagnostics {
            warn!("{diagnostic}");
        }
        self.database_prepared = is_ok;
        is_ok
    }

    /// Solves all goal groups, printing inspections to stdout.
    pub fn verify_all_goals(&mut self) -> bool {
        self.verify_all_goals_with(|symbols, label, evar| {
            let rendered = match evar.binding() {
                Some(term) => term.to_display(symbols),
                None => "unbound".to_string(),
            };
            println!("{label}: {rendered}");
            true
        })
    }

    /// Solves all goal groups, invoking `inspect` for each inspection after
    /// the solver terminates. A false return from `inspect` fails the run.
    pub fn verify_all_goals_with<F>(&mut self, mut inspect: F) -> bool
    where
        F: FnMut(&SymbolTable, &str, &EVarRef) -> bool,
    {
        if !self.prepare_database() {
            return false;
        }
        let mut solver = Solver::new(&self.symbols, &self.builtins, &self.facts);
        let solved = match solver.solve(self.parser.groups()) {
            Ok(solved) => solved,
            Err(err) => {
                warn!("solving failed: {err}");
                return false;
            }
        };
        let progress = solver.progress();
        self.highest_group_reached = progress.highest_group_reached;
        self.highest_goal_reached = progress.highest_goal_reached;
        let mut inspections_ok = true;
        for (label, evar) in self.parser.inspections() {
            if !inspect(&self.symbols, label, evar) {
                inspections_ok = false;
            }
        }
        solved && inspections_ok
    }

    /// Renders all goal groups for debugging.
    pub fn show_goals(&self) -> String {
        let mut out = String::new();
        for group in self.parser.groups() {
            match group.accept_if {
                AcceptanceCriterion::NoneMayFail => out.push_str("group:\n"),
                AcceptanceCriterion::SomeMustFail => out.push_str("negated group:\n"),
            }
            for goal in &group.goals {
                out.push_str("  goal: ");
                goal.dump(&self.symbols, &mut out);
                out.push('\n');
            }
        }
        out
    }

    /// Dumps the sorted fact database as a JSON array.
    pub fn dump_as_json(&self) -> Result<String, VerifyError> {
        let mut entries = self.entries.clone();
        entries.sort();
        Ok(serde_json::to_string(&entries)?)
    }

    fn ident_or_empty(&mut self, text: &str) -> TermRef {
        if text.is_empty() {
            Term::ident(self.builtins.empty)
        } else {
            Term::ident(self.symbols.intern(text))
        }
    }

    fn vname_term(
        &mut self,
        signature: &str,
        corpus: &str,
        root: &str,
        path: &str,
        language: &str,
    ) -> TermRef {
        let fields = vec![
            self.ident_or_empty(signature),
            self.ident_or_empty(corpus),
            self.ident_or_empty(root),
            self.ident_or_empty(path),
            self.ident_or_empty(language),
        ];
        Term::predicate(Term::ident(self.builtins.vname), fields)
    }
}

fn fact_elements(fact: &TermRef) -> Option<&[TermRef]> {
    let (_, body) = fact.as_app()?;
    let elements = body.as_tuple()?;
    if elements.len() == 5 {
        Some(elements)
    } else {
        None
    }
}

fn ident_text<'a>(symbols: &'a SymbolTable, term: &TermRef) -> &'a str {
    match term.as_ident() {
        Some(symbol) => symbols.text(symbol),
        None => "",
    }
}

/// Orders a vname-or-ident element: vnames sort before idents.
fn cmp_vname_or_ident(symbols: &SymbolTable, a: &TermRef, b: &TermRef) -> Ordering {
    match (a.as_app(), b.as_app()) {
        (Some((_, at)), Some((_, bt))) => {
            let av = at.as_tuple().unwrap_or(&[]);
            let bv = bt.as_tuple().unwrap_or(&[]);
            for (x, y) in av.iter().zip(bv) {
                let ord = ident_text(symbols, x).cmp(ident_text(symbols, y));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            av.len().cmp(&bv.len())
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => ident_text(symbols, a).cmp(ident_text(symbols, b)),
    }
}

fn cmp_facts(symbols: &SymbolTable, a: &TermRef, b: &TermRef) -> Ordering {
    let (Some(av), Some(bv)) = (fact_elements(a), fact_elements(b)) else {
        return Ordering::Equal;
    };
    cmp_vname_or_ident(symbols, &av[0], &bv[0])
        .then_with(|| ident_text(symbols, &av[1]).cmp(ident_text(symbols, &bv[1])))
        .then_with(|| cmp_vname_or_ident(symbols, &av[2], &bv[2]))
        .then_with(|| ident_text(symbols, &av[3]).cmp(ident_text(symbols, &bv[3])))
        .then_with(|| ident_text(symbols, &av[4]).cmp(ident_text(symbols, &bv[4])))
}

fn is_empty_ident(builtins: &Builtins, term: &TermRef) -> bool {
    term.as_ident() == Some(builtins.empty)
}

fn vname_has_valid_form(builtins: &Builtins, term: &TermRef) -> bool {
    let Some((_, body)) = term.as_app() else {
        return false;
    };
    let Some(fields) = body.as_tuple() else {
        return false;
    };
    fields.len() == 5 && fields.iter().any(|field| !is_empty_ident(builtins, field))
}

fn fact_has_valid_form(builtins: &Builtins, fact: &TermRef) -> bool {
    let Some(elements) = fact_elements(fact) else {
        return false;
    };
    if !vname_has_valid_form(builtins, &elements[0]) {
        // Always need a source.
        return false;
    }
    if is_empty_ident(builtins, &elements[1]) {
        // (source, "", "", string, _)
        is_empty_ident(builtins, &elements[2]) && !is_empty_ident(builtins, &elements[3])
    } else {
        // (source, edge, target, "/", "") or (source, edge, target,
        // "/kythe/ordinal", base10)
        if !vname_has_valid_form(builtins, &elements[2]) {
            return false;
        }
        if elements[3].as_ident() == Some(builtins.root) {
            is_empty_ident(builtins, &elements[4])
        } else {
            elements[3].as_ident() == Some(builtins.ordinal)
        }
    }
}

/// Two adjacent sorted node facts conflict when they agree on source and
/// fact name but disagree on value.
fn node_facts_conflict(builtins: &Builtins, a: &TermRef, b: &TermRef) -> bool {
    let (Some(av), Some(bv)) = (fact_elements(a), fact_elements(b)) else {
        return false;
    };
    is_empty_ident(builtins, &av[1])
        && is_empty_ident(builtins, &bv[1])
        && is_empty_ident(builtins, &av[2])
        && is_empty_ident(builtins, &bv[2])
        && terms_equal(&av[0], &bv[0])
        && terms_equal(&av[3], &bv[3])
        && !terms_equal(&av[4], &bv[4])
}

fn terms_equal(a: &TermRef, b: &TermRef) -> bool {
    match (&**a, &**b) {
        (Term::Ident(x), Term::Ident(y)) => x == y,
        (Term::App { lhs: al, rhs: ar }, Term::App { lhs: bl, rhs: br }) => {
            terms_equal(al, bl) && terms_equal(ar, br)
        }
        (Term::Tuple(x), Term::Tuple(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(m, n)| terms_equal(m, n))
        }
        _ => false,
    }
}
