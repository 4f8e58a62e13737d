//! Tseitin gate primitives over solver literals.
//!
//! A [`Bit`] is either a known constant or a solver literal; every gate
//! folds constants before allocating auxiliary variables, so circuits over
//! constant operands shrink to nothing.

use crate::{Engine, Group};

/// A single wire of a bit-level circuit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bit {
    Const(bool),
    /// A solver literal (possibly negative).
    Lit(i32),
}

impl Bit {
    pub const FALSE: Bit = Bit::Const(false);
    pub const TRUE: Bit = Bit::Const(true);

    pub fn negate(self) -> Bit {
        match self {
            Bit::Const(b) => Bit::Const(!b),
            Bit::Lit(l) => Bit::Lit(-l),
        }
    }
}

impl Engine {
    /// Fresh unconstrained wire.
    pub(crate) fn fresh_bit(&mut self) -> Bit {
        Bit::Lit(self.new_var())
    }

    /// `out ↔ a ∧ b`
    pub(crate) fn bit_and(&mut self, group: Group, a: Bit, b: Bit) -> Bit {
        match (a, b) {
            (Bit::Const(false), _) | (_, Bit::Const(false)) => Bit::FALSE,
            (Bit::Const(true), x) | (x, Bit::Const(true)) => x,
            (Bit::Lit(la), Bit::Lit(lb)) => {
                if la == lb {
                    return a;
                }
                if la == -lb {
                    return Bit::FALSE;
                }
                let o = self.new_var();
                self.add_clause(group, &[-o, la]);
                self.add_clause(group, &[-o, lb]);
                self.add_clause(group, &[o, -la, -lb]);
                Bit::Lit(o)
            }
        }
    }

    /// `out ↔ a ∨ b`
    pub(crate) fn bit_or(&mut self, group: Group, a: Bit, b: Bit) -> Bit {
        self.bit_and(group, a.negate(), b.negate()).negate()
    }

    /// `out ↔ a ⊕ b`
    pub(crate) fn bit_xor(&mut self, group: Group, a: Bit, b: Bit) -> Bit {
        match (a, b) {
            (Bit::Const(x), Bit::Const(y)) => Bit::Const(x ^ y),
            (Bit::Const(false), x) | (x, Bit::Const(false)) => x,
            (Bit::Const(true), x) | (x, Bit::Const(true)) => x.negate(),
            (Bit::Lit(la), Bit::Lit(lb)) => {
                if la == lb {
                    return Bit::FALSE;
                }
                if la == -lb {
                    return Bit::TRUE;
                }
                let o = self.new_var();
                self.add_clause(group, &[-o, la, lb]);
                self.add_clause(group, &[-o, -la, -lb]);
                self.add_clause(group, &[o, -la, lb]);
                self.add_clause(group, &[o, la, -lb]);
                Bit::Lit(o)
            }
        }
    }

    /// `out ↔ (a ↔ b)`
    pub(crate) fn bit_eq(&mut self, group: Group, a: Bit, b: Bit) -> Bit {
        self.bit_xor(group, a, b).negate()
    }

    /// `out ↔ (s ? a : b)`
    pub(crate) fn bit_mux(&mut self, group: Group, s: Bit, a: Bit, b: Bit) -> Bit {
        match s {
            Bit::Const(true) => a,
            Bit::Const(false) => b,
            _ => {
                if a == b {
                    return a;
                }
                let ta = self.bit_and(group, s, a);
                let tb = self.bit_and(group, s.negate(), b);
                self.bit_or(group, ta, tb)
            }
        }
    }

    /// Full adder: returns `(sum, carry)`.
    pub(crate) fn full_adder(&mut self, group: Group, a: Bit, b: Bit, cin: Bit) -> (Bit, Bit) {
        let ab = self.bit_xor(group, a, b);
        let sum = self.bit_xor(group, ab, cin);
        let c1 = self.bit_and(group, a, b);
        let c2 = self.bit_and(group, ab, cin);
        let carry = self.bit_or(group, c1, c2);
        (sum, carry)
    }

    /// Clause out: `a ↔ b`.
    pub(crate) fn force_bit_equal(&mut self, group: Group, a: Bit, b: Bit) {
        self.force_bit_equal_if(group, Bit::TRUE, a, b);
    }

    /// Clause out: `cond → (a ↔ b)`.
    pub(crate) fn force_bit_equal_if(&mut self, group: Group, cond: Bit, a: Bit, b: Bit) {
        let guard = match cond {
            Bit::Const(true) => None,
            Bit::Const(false) => return,
            Bit::Lit(l) => Some(-l),
        };
        let mut clause = |lits: &[i32]| {
            let mut full: Vec<i32> = guard.into_iter().collect();
            full.extend_from_slice(lits);
            self.add_clause(group, &full);
        };
        match (a, b) {
            (Bit::Const(x), Bit::Const(y)) => {
                if x != y {
                    // contradiction under the guard
                    clause(&[]);
                }
            }
            (Bit::Lit(l), Bit::Const(v)) | (Bit::Const(v), Bit::Lit(l)) => {
                clause(&[if v { l } else { -l }]);
            }
            (Bit::Lit(la), Bit::Lit(lb)) => {
                if la == lb {
                    return;
                }
                clause(&[-la, lb]);
                clause(&[la, -lb]);
            }
        }
    }
}
