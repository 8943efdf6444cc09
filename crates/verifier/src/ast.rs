//! Term AST for the assertion language. Terms are shared by reference;
//! existential variables carry interior bindings that the solver installs
//! and retracts as it searches.

use std::cell::RefCell;
use std::rc::Rc;

use lasso::{Rodeo, Spur};

pub type Symbol = Spur;

/// Interns the strings appearing in facts and goals. Symbols compare by
/// key, so identifier equality never touches the text again.
#[derive(Default)]
pub struct SymbolTable {
    rodeo: Rodeo,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, text: &str) -> Symbol {
        self.rodeo.get_or_intern(text)
    }

    pub fn text(&self, symbol: Symbol) -> &str {
        self.rodeo.resolve(&symbol)
    }
}

/// Symbols with fixed meanings in fact tuples and goals.
pub struct Builtins {
    pub empty: Symbol,
    pub fact: Symbol,
    pub vname: Symbol,
    pub kind: Symbol,
    pub root: Symbol,
    pub eq: Symbol,
    pub ordinal: Symbol,
    pub anchor: Symbol,
    pub loc_start: Symbol,
    pub loc_end: Symbol,
}

impl Builtins {
    pub fn intern(symbols: &mut SymbolTable) -> Self {
        Builtins {
            empty: symbols.intern(""),
            fact: symbols.intern("fact"),
            vname: symbols.intern("vname"),
            kind: symbols.intern("/kythe/node/kind"),
            root: symbols.intern("/"),
            eq: symbols.intern("="),
            ordinal: symbols.intern("/kythe/ordinal"),
            anchor: symbols.intern("anchor"),
            loc_start: symbols.intern("/kythe/loc/start"),
            loc_end: symbols.intern("/kythe/loc/end"),
        }
    }
}

/// Position of a token in an assertion source, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

/// An existential variable. Identity is the cell itself; the numeric id
/// exists only for printing.
#[derive(Debug)]
pub struct EVarCell {
    pub id: u64,
    pub pos: SourcePos,
    binding: RefCell<Option<TermRef>>,
}

pub type EVarRef = Rc<EVarCell>;

impl EVarCell {
    pub fn new(id: u64, pos: SourcePos) -> EVarRef {
        Rc::new(EVarCell {
            id,
            pos,
            binding: RefCell::new(None),
        })
    }

    pub fn binding(&self) -> Option<TermRef> {
        self.binding.borrow().clone()
    }

    pub fn set_binding(&self, term: Option<TermRef>) {
        *self.binding.borrow_mut() = term;
    }

    pub fn is_bound(&self) -> bool {
        self.binding.borrow().is_some()
    }
}

#[derive(Debug)]
pub enum Term {
    Ident(Symbol),
    EVar(EVarRef),
    App { lhs: TermRef, rhs: TermRef },
    Tuple(Vec<TermRef>),
}

pub type TermRef = Rc<Term>;

impl Term {
    pub fn ident(symbol: Symbol) -> TermRef {
        Rc::new(Term::Ident(symbol))
    }

    pub fn evar(evar: EVarRef) -> TermRef {
        Rc::new(Term::EVar(evar))
    }

    pub fn app(lhs: TermRef, rhs: TermRef) -> TermRef {
        Rc::new(Term::App { lhs, rhs })
    }

    pub fn tuple(elements: Vec<TermRef>) -> TermRef {
        Rc::new(Term::Tuple(elements))
    }

    /// An application of `head` to a tuple of `body`, the shape used for
    /// `fact(...)` and `vname(...)` terms.
    pub fn predicate(head: TermRef, body: Vec<TermRef>) -> TermRef {
        Term::app(head, Term::tuple(body))
    }

    pub fn as_ident(&self) -> Option<Symbol> {
        match self {
            Term::Ident(symbol) => Some(*symbol),
            _ => None,
        }
    }

    pub fn as_evar(&self) -> Option<&EVarRef> {
        match self {
            Term::EVar(evar) => Some(evar),
            _ => None,
        }
    }

    pub fn as_app(&self) -> Option<(&TermRef, &TermRef)> {
        match self {
            Term::App { lhs, rhs } => Some((lhs, rhs)),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[TermRef]> {
        match self {
            Term::Tuple(elements) => Some(elements),
            _ => None,
        }
    }

    /// Renders the term, following EVar bindings.
    pub fn dump(&self, symbols: &SymbolTable, out: &mut String) {
        match self {
            Term::Ident(symbol) => {
                let text = symbols.text(*symbol);
                if text.is_empty() {
                    out.push_str("\"\"");
                } else {
                    out.push_str(text);
                }
            }
            Term::EVar(evar) => {
                out.push_str("EVar(_");
                out.push_str(&evar.id.to_string());
                out.push_str(" = ");
                match evar.binding() {
                    Some(term) => term.dump(symbols, out),
                    None => out.push_str("<null>"),
                }
                out.push(')');
            }
            Term::App { lhs, rhs } => {
                out.push_str("App(");
                lhs.dump(symbols, out);
                out.push_str(", ");
                rhs.dump(symbols, out);
                out.push(')');
            }
            Term::Tuple(elements) => {
                out.push('(');
                for (index, element) in elements.iter().enumerate() {
                    if index > 0 {
                        out.push_str(", ");
                    }
                    element.dump(symbols, out);
                }
                out.push(')');
            }
        }
    }

    pub fn to_display(&self, symbols: &SymbolTable) -> String {
        let mut out = String::new();
        self.dump(symbols, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_renders_nested_structure() {
        let mut symbols = SymbolTable::new();
        let f = Term::ident(symbols.intern("fact"));
        let a = Term::ident(symbols.intern("a"));
        let empty = Term::ident(symbols.intern(""));
        let term = Term::predicate(f, vec![a, empty]);
        assert_eq!(term.to_display(&symbols), "App(fact, (a, \"\"))");
    }

    #[test]
    fn evar_dump_shows_binding_state() {
        let mut symbols = SymbolTable::new();
        let evar = EVarCell::new(3, SourcePos::default());
        let term = Term::evar(evar.clone());
        assert_eq!(term.to_display(&symbols), "EVar(_3 = <null>)");
        evar.set_binding(Some(Term::ident(symbols.intern("x"))));
        assert_eq!(term.to_display(&symbols), "EVar(_3 = x)");
    }
}
