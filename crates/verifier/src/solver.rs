//! Backtracking unification of goal groups against the fact database.
//!
//! The solver works in a closed world: any universal quantification can be
//! exhaustively tested against database facts. Bindings are recorded on a
//! trail and retracted chronologically on backtracking; once a group is
//! proven its bindings stay in place for later groups and inspections.

use crate::ast::{Builtins, EVarRef, SymbolTable, Term, TermRef};
use crate::error::VerifyError;
use crate::parser::{AcceptanceCriterion, GoalGroup};

/// Where the solver stopped, for diagnostics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress {
    pub highest_group_reached: usize,
    pub highest_goal_reached: usize,
}

pub struct Solver<'a> {
    symbols: &'a SymbolTable,
    builtins: &'a Builtins,
    database: &'a [TermRef],
    trail: Vec<EVarRef>,
    progress: Progress,
}

impl<'a> Solver<'a> {
    pub fn new(symbols: &'a SymbolTable, builtins: &'a Builtins, database: &'a [TermRef]) -> Self {
        Solver {
            symbols,
            builtins,
            database,
            trail: Vec::new(),
            progress: Progress::default(),
        }
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Attempts to prove every `NoneMayFail` group and disprove every
    /// `SomeMustFail` group, in order. Returns the overall verdict.
    pub fn solve(&mut self, groups: &[GoalGroup]) -> Result<bool, VerifyError> {
        for (index, group) in groups.iter().enumerate() {
            if index > self.progress.highest_group_reached {
                self.progress.highest_group_reached = index;
                self.progress.highest_goal_reached = 0;
            }
            let mark = self.trail.len();
            let proven = self.solve_goals(&group.goals, 0)?;
            match group.accept_if {
                AcceptanceCriterion::NoneMayFail => {
                    if !proven {
                        self.undo_to(mark);
                        return Ok(false);
                    }
                    // Keep the witness bindings for later groups.
                }
                AcceptanceCriterion::SomeMustFail => {
                    if proven {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    fn bind(&mut self, evar: &EVarRef, term: TermRef) {
        evar.set_binding(Some(term));
        self.trail.push(evar.clone());
    }

    fn undo_to(&mut self, mark: usize) {
        for evar in self.trail.drain(mark..) {
            evar.set_binding(None);
        }
    }

    /// Proves `goals[index..]` as a conjunction, backtracking through the
    /// database per goal.
    fn solve_goals(&mut self, goals: &[TermRef], index: usize) -> Result<bool, VerifyError> {
        if index > self.progress.highest_goal_reached {
            self.progress.highest_goal_reached = index;
        }
        let Some(goal) = goals.get(index) else {
            return Ok(true);
        };
        let Some((head, body)) = goal.as_app() else {
            return Err(VerifyError::InvalidGoal);
        };

        // The `=` built-in: =(a, b) succeeds iff a and b unify.
        if head.as_ident() == Some(self.builtins.eq) {
            if let Some([lhs, rhs]) = body.as_tuple().and_then(|t| <&[_; 2]>::try_from(t).ok()) {
                let mark = self.trail.len();
                if self.unify(lhs, rhs)? && self.solve_goals(goals, index + 1)? {
                    return Ok(true);
                }
                self.undo_to(mark);
                return Ok(false);
            }
        }

        let database = self.database;
        for fact in database {
            let mark = self.trail.len();
            if self.unify(goal, fact)? && self.solve_goals(goals, index + 1)? {
                return Ok(true);
            }
            self.undo_to(mark);
        }
        Ok(false)
    }

    /// First-order unification. May leave bindings behind on failure; the
    /// caller owns the backtrack point.
    fn unify(&mut self, s: &TermRef, t: &TermRef) -> Result<bool, VerifyError> {
        if let Some(evar) = s.as_evar() {
            return self.unify_evar(evar, t);
        }
        if let Some(evar) = t.as_evar() {
            return self.unify_evar(evar, s);
        }
        match (&**s, &**t) {
            (Term::Ident(a), Term::Ident(b)) => Ok(a == b),
            (Term::App { lhs: sl, rhs: sr }, Term::App { lhs: tl, rhs: tr }) => {
                Ok(self.unify(sl, tl)? && self.unify(sr, tr)?)
            }
            (Term::Tuple(a), Term::Tuple(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b) {
                    if !self.unify(x, y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn unify_evar(&mut self, evar: &EVarRef, t: &TermRef) -> Result<bool, VerifyError> {
        if let Some(current) = evar.binding() {
            return self.unify(&current, t);
        }
        if let Some(other) = t.as_evar() {
            if std::rc::Rc::ptr_eq(evar, other) {
                return Ok(true);
            }
        }
        if occurs(evar, t) {
            return Err(VerifyError::Cycle(t.to_display(self.symbols)));
        }
        self.bind(evar, t.clone());
        Ok(true)
    }
}

fn occurs(evar: &EVarRef, term: &TermRef) -> bool {
    match &**term {
        Term::Ident(_) => false,
        Term::EVar(other) => match other.binding() {
            Some(bound) => occurs(evar, &bound),
            None => std::rc::Rc::ptr_eq(evar, other),
        },
        Term::App { lhs, rhs } => occurs(evar, lhs) || occurs(evar, rhs),
        Term::Tuple(elements) => elements.iter().any(|element| occurs(evar, element)),
    }
}
