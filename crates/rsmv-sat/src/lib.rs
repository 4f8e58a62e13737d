//! SAT engine driver.
//!
//! An [`Engine`] wraps one incremental CaDiCaL instance. Formulas arrive as
//! compilation units; each toplevel diagram is CNFized with the *no-cut*
//! strategy (one clause per root-to-zero path), microcode descriptors are
//! discharged as bit-level circuits, multiplexer descriptors as branch
//! selection clauses.
//!
//! Clauses belong to *groups*: each group owns an enable literal assumed at
//! every solve call. Inverting a group flips its assumption, retracting the
//! group's clauses without touching the clause database. Group 0 is the
//! permanent main group.
//!
//! CNF variables are named by timed canonical bit identifiers: DD variable →
//! UCBI → rebased at the frame being asserted → one solver variable per
//! distinct `(ctx, expr, absolute time, bit)`. Compiling a relation once and
//! asserting it at every unrolling depth is what makes the engine
//! incremental.

mod circuit;
mod microcode;

pub use circuit::Bit;

use cadical::Callbacks;
use rsmv_compiler::CompilationUnit;
use rsmv_dd::{Add, DdMgr, DdView};
use rsmv_enc::{EncodingMgr, Tcbi};
use rsmv_expr::Step;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum SatError {
    #[error("internal error: {0}")]
    Internal(String),
}

pub type SatResult<T> = Result<T, SatError>;

/// Outcome of a solve call. `Unknown` arises only from interruption.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Sat,
    Unsat,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Sat => write!(f, "SAT"),
            Status::Unsat => write!(f, "UNSAT"),
            Status::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Group handle. Group 0 is the ungated main group.
pub type Group = usize;

pub const MAIN_GROUP: Group = 0;

struct GroupInfo {
    lit: i32,
    inverted: bool,
}

/// Cooperative interruption: CaDiCaL polls this callback and aborts the
/// running solve when the shared flag is raised.
struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Callbacks for Interrupt {
    fn terminate(&mut self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// One SAT engine: solver, CNF variable naming, groups.
pub struct Engine {
    name: String,
    solver: cadical::Solver<Interrupt>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    interrupt: Arc<AtomicBool>,

    next_var: i32,
    tcbi_vars: FxHashMap<Tcbi, i32>,
    groups: Vec<GroupInfo>,

    clauses: usize,
    solves: usize,
}

impl Engine {
    pub fn new(
        name: &str,
        dd: Arc<DdMgr>,
        enc: Arc<EncodingMgr>,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        let mut solver: cadical::Solver<Interrupt> = cadical::Solver::new();
        solver.set_callbacks(Some(Interrupt {
            flag: interrupt.clone(),
        }));
        debug!(name, "created engine");
        Self {
            name: name.to_owned(),
            solver,
            dd,
            enc,
            interrupt,
            next_var: 0,
            tcbi_vars: FxHashMap::default(),
            groups: vec![GroupInfo {
                lit: 0,
                inverted: false,
            }],
            clauses: 0,
            solves: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raise the shared interruption flag; any in-flight solve on an engine
    /// sharing the flag returns `Unknown` promptly.
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    pub(crate) fn new_var(&mut self) -> i32 {
        self.next_var += 1;
        self.next_var
    }

    /// Open a fresh clause group with its own enable literal.
    pub fn new_group(&mut self) -> Group {
        let lit = self.new_var();
        self.groups.push(GroupInfo {
            lit,
            inverted: false,
        });
        self.groups.len() - 1
    }

    /// Flip the polarity of the most recently issued group, retracting (or
    /// re-enabling) its clauses at subsequent solve calls.
    pub fn invert_last_group(&mut self) {
        let g = self
            .groups
            .last_mut()
            .expect("the main group always exists");
        g.inverted = !g.inverted;
    }

    /// Append a clause to a group.
    pub fn add_clause(&mut self, group: Group, lits: &[i32]) {
        debug_assert!(lits.iter().all(|&l| l != 0));
        if group == MAIN_GROUP {
            self.solver.add_clause(lits.iter().copied());
        } else {
            let enable = -self.groups[group].lit;
            self.solver
                .add_clause(std::iter::once(enable).chain(lits.iter().copied()));
        }
        self.clauses += 1;
    }

    /// Solve under the current group assumptions.
    pub fn solve(&mut self) -> Status {
        if self.is_interrupted() {
            return Status::Unknown;
        }
        self.solves += 1;
        let assumptions: Vec<i32> = self
            .groups
            .iter()
            .skip(1)
            .map(|g| if g.inverted { -g.lit } else { g.lit })
            .collect();
        trace!(engine = %self.name, assumptions = assumptions.len(), "solving");
        match self.solver.solve_with(assumptions.into_iter()) {
            Some(true) => Status::Sat,
            Some(false) => Status::Unsat,
            None => Status::Unknown,
        }
    }

    /// Model value of a CNF variable after a SAT answer.
    pub fn model_value(&self, var: i32) -> bool {
        self.solver.value(var).unwrap_or(false)
    }

    /// The CNF variable naming a DD bit variable at an absolute base time,
    /// allocating it on first use.
    pub fn find_dd_var(&mut self, dd_var: u32, base: Step) -> SatResult<i32> {
        let ucbi = self.enc.find_ucbi(dd_var).ok_or_else(|| {
            SatError::Internal(format!("DD variable {dd_var} has no canonical bit identifier"))
        })?;
        let tcbi = ucbi.timed(base);
        if let Some(&v) = self.tcbi_vars.get(&tcbi) {
            return Ok(v);
        }
        let v = self.new_var();
        self.tcbi_vars.insert(tcbi, v);
        Ok(v)
    }

    /// Like [`Self::find_dd_var`] but without allocating: used when reading
    /// a model back.
    pub fn lookup_dd_var(&self, dd_var: u32, base: Step) -> Option<i32> {
        let ucbi = self.enc.find_ucbi(dd_var)?;
        self.tcbi_vars.get(&ucbi.timed(base)).copied()
    }

    // -- CNFization --------------------------------------------------------

    /// Assert a 0/1 diagram at a time frame: one clause per path from the
    /// root to the zero terminal, blocking that path.
    pub fn assert_add(&mut self, add: Add, time: Step, group: Group) -> SatResult<()> {
        let mut path = Vec::new();
        self.cnf_no_cut(add, time, group, &mut path)
    }

    fn cnf_no_cut(
        &mut self,
        node: Add,
        time: Step,
        group: Group,
        path: &mut Vec<(u32, bool)>,
    ) -> SatResult<()> {
        match self.dd.view(node) {
            DdView::Term(0) => {
                let mut lits = Vec::with_capacity(path.len());
                for &(var, taken) in path.iter() {
                    let v = self.find_dd_var(var, time)?;
                    lits.push(if taken { -v } else { v });
                }
                self.add_clause(group, &lits);
                Ok(())
            }
            DdView::Term(_) => Ok(()),
            DdView::Node { var, then, els } => {
                path.push((var, true));
                self.cnf_no_cut(then, time, group, path)?;
                path.pop();
                path.push((var, false));
                self.cnf_no_cut(els, time, group, path)?;
                path.pop();
                Ok(())
            }
        }
    }

    /// Assert a full compilation unit at a time frame: every toplevel
    /// diagram, every microcode descriptor, every multiplexer branch.
    pub fn assert_formula(
        &mut self,
        unit: &CompilationUnit,
        time: Step,
        group: Group,
    ) -> SatResult<()> {
        for &dd in &unit.dds {
            self.assert_add(dd, time, group)?;
        }
        for md in &unit.micros {
            self.assert_micro(md, time, group)?;
        }
        for (_, mux) in &unit.mux {
            self.assert_mux(mux, time, group)?;
        }
        Ok(())
    }

    /// Assert that at least one of the given state bits differs between two
    /// time frames.
    pub fn assert_uniqueness(&mut self, bits: &[u32], tj: Step, tk: Step) -> SatResult<()> {
        let mut diffs = Vec::with_capacity(bits.len());
        for &bit in bits {
            let a = self.find_dd_var(bit, tj)?;
            let b = self.find_dd_var(bit, tk)?;
            let d = self.new_var();
            // d ↔ a ⊕ b
            self.add_clause(MAIN_GROUP, &[-d, a, b]);
            self.add_clause(MAIN_GROUP, &[-d, -a, -b]);
            self.add_clause(MAIN_GROUP, &[d, -a, b]);
            self.add_clause(MAIN_GROUP, &[d, a, -b]);
            diffs.push(d);
        }
        self.add_clause(MAIN_GROUP, &diffs);
        Ok(())
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "engine `{}`: {} vars, {} clauses, {} groups, {} solves",
            self.name,
            self.next_var,
            self.clauses,
            self.groups.len(),
            self.solves
        )
    }
}
