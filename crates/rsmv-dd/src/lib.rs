//! Algebraic Decision Diagrams.
//!
//! An ADD is a BDD whose terminal nodes carry arbitrary `u64` values; the
//! engine uses them mostly with 0/1 terminals, where arithmetic product
//! doubles as logical conjunction. Nodes are hash-consed in a manager:
//! structurally equal diagrams share one handle, internal nodes are ordered
//! by variable index and never carry equal children.
//!
//! The manager is shared read-mostly across reachability strategies; all
//! mutation happens under one internal lock.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Mutex;

/// Handle to an ADD node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Add(u32);

/// A decoded view of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DdView {
    /// Terminal carrying a value.
    Term(u64),
    /// Internal node: `var ? then : else`.
    Node { var: u32, then: Add, els: Add },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum NodeData {
    Term(u64),
    Node { var: u32, t: Add, e: Add },
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Op2 {
    Plus,
    Minus,
    Times,
    Divide,
    Modulus,
    Or,
    Xor,
    Xnor,
    Equals,
    Lt,
    Leq,
    BwTimes,
    BwOr,
    BwXor,
    BwXnor,
    LShift,
    RShift,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Op1 {
    Negate,
    Cmpl,
    BwCmpl,
}

#[derive(Default)]
struct Pool {
    nodes: Vec<NodeData>,
    term_table: FxHashMap<u64, Add>,
    node_table: FxHashMap<(u32, Add, Add), Add>,
    apply2_cache: FxHashMap<(Op2, Add, Add), Add>,
    apply1_cache: FxHashMap<(Op1, Add), Add>,
    ite_cache: FxHashMap<(Add, Add, Add), Add>,
    num_vars: u32,
}

impl Pool {
    fn data(&self, a: Add) -> NodeData {
        self.nodes[a.0 as usize]
    }

    fn term(&mut self, value: u64) -> Add {
        if let Some(&a) = self.term_table.get(&value) {
            return a;
        }
        let a = Add(self.nodes.len() as u32);
        self.nodes.push(NodeData::Term(value));
        self.term_table.insert(value, a);
        a
    }

    fn mk(&mut self, var: u32, t: Add, e: Add) -> Add {
        if t == e {
            return t;
        }
        if let Some(&a) = self.node_table.get(&(var, t, e)) {
            return a;
        }
        let a = Add(self.nodes.len() as u32);
        self.nodes.push(NodeData::Node { var, t, e });
        self.node_table.insert((var, t, e), a);
        a
    }

    fn top_var(&self, a: Add) -> Option<u32> {
        match self.data(a) {
            NodeData::Term(_) => None,
            NodeData::Node { var, .. } => Some(var),
        }
    }

    /// Cofactors of `a` with respect to `var` (which must be at or above
    /// `a`'s top variable in the order).
    fn cofactor(&self, a: Add, var: u32) -> (Add, Add) {
        match self.data(a) {
            NodeData::Term(_) => (a, a),
            NodeData::Node { var: v, t, e } => {
                if v == var {
                    (t, e)
                } else {
                    (a, a)
                }
            }
        }
    }

    fn apply2(&mut self, op: Op2, a: Add, b: Add) -> Add {
        if let (NodeData::Term(va), NodeData::Term(vb)) = (self.data(a), self.data(b)) {
            let v = term_op2(op, va, vb);
            return self.term(v);
        }
        if let Some(&r) = self.apply2_cache.get(&(op, a, b)) {
            return r;
        }

        let var = match (self.top_var(a), self.top_var(b)) {
            (Some(x), Some(y)) => x.min(y),
            (Some(x), None) => x,
            (None, Some(y)) => y,
            (None, None) => unreachable!(),
        };
        let (at, ae) = self.cofactor(a, var);
        let (bt, be) = self.cofactor(b, var);
        let t = self.apply2(op, at, bt);
        let e = self.apply2(op, ae, be);
        let r = self.mk(var, t, e);
        self.apply2_cache.insert((op, a, b), r);
        r
    }

    fn apply1(&mut self, op: Op1, a: Add) -> Add {
        if let NodeData::Term(va) = self.data(a) {
            let v = term_op1(op, va);
            return self.term(v);
        }
        if let Some(&r) = self.apply1_cache.get(&(op, a)) {
            return r;
        }
        let NodeData::Node { var, t, e } = self.data(a) else {
            unreachable!()
        };
        let rt = self.apply1(op, t);
        let re = self.apply1(op, e);
        let r = self.mk(var, rt, re);
        self.apply1_cache.insert((op, a), r);
        r
    }

    fn ite(&mut self, f: Add, g: Add, h: Add) -> Add {
        if let NodeData::Term(v) = self.data(f) {
            return if v != 0 { g } else { h };
        }
        if g == h {
            return g;
        }
        if let Some(&r) = self.ite_cache.get(&(f, g, h)) {
            return r;
        }

        let var = [self.top_var(f), self.top_var(g), self.top_var(h)]
            .into_iter()
            .flatten()
            .min()
            .expect("at least f is internal");
        let (ft, fe) = self.cofactor(f, var);
        let (gt, ge) = self.cofactor(g, var);
        let (ht, he) = self.cofactor(h, var);
        let t = self.ite(ft, gt, ht);
        let e = self.ite(fe, ge, he);
        let r = self.mk(var, t, e);
        self.ite_cache.insert((f, g, h), r);
        r
    }
}

fn term_op2(op: Op2, a: u64, b: u64) -> u64 {
    match op {
        Op2::Plus => a.wrapping_add(b),
        Op2::Minus => a.wrapping_sub(b),
        Op2::Times => a.wrapping_mul(b),
        Op2::Divide => {
            if b == 0 {
                0
            } else {
                a / b
            }
        }
        Op2::Modulus => {
            if b == 0 {
                0
            } else {
                a % b
            }
        }
        Op2::Or => ((a != 0) || (b != 0)) as u64,
        Op2::Xor => ((a != 0) ^ (b != 0)) as u64,
        Op2::Xnor => !((a != 0) ^ (b != 0)) as u64,
        Op2::Equals => (a == b) as u64,
        Op2::Lt => (a < b) as u64,
        Op2::Leq => (a <= b) as u64,
        Op2::BwTimes => a & b,
        Op2::BwOr => a | b,
        Op2::BwXor => a ^ b,
        Op2::BwXnor => !(a ^ b),
        Op2::LShift => {
            if b >= 64 {
                0
            } else {
                a << b
            }
        }
        Op2::RShift => {
            if b >= 64 {
                0
            } else {
                a >> b
            }
        }
    }
}

fn term_op1(op: Op1, a: u64) -> u64 {
    match op {
        Op1::Negate => a.wrapping_neg(),
        Op1::Cmpl => (a == 0) as u64,
        Op1::BwCmpl => !a,
    }
}

/// The ADD manager: node factory and algebra.
pub struct DdMgr {
    pool: Mutex<Pool>,
}

impl Default for DdMgr {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! binary_op {
    ($name:ident, $op:ident) => {
        pub fn $name(&self, a: Add, b: Add) -> Add {
            self.pool.lock().unwrap().apply2(Op2::$op, a, b)
        }
    };
}

macro_rules! unary_op {
    ($name:ident, $op:ident) => {
        pub fn $name(&self, a: Add) -> Add {
            self.pool.lock().unwrap().apply1(Op1::$op, a)
        }
    };
}

impl DdMgr {
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(Pool::default()),
        }
    }

    /// Constant terminal.
    pub fn constant(&self, value: u64) -> Add {
        self.pool.lock().unwrap().term(value)
    }

    pub fn zero(&self) -> Add {
        self.constant(0)
    }

    pub fn one(&self) -> Add {
        self.constant(1)
    }

    /// Fresh boolean variable (a `var ? 1 : 0` node over a new index).
    pub fn bit(&self) -> Add {
        let mut pool = self.pool.lock().unwrap();
        let var = pool.num_vars;
        pool.num_vars += 1;
        let one = pool.term(1);
        let zero = pool.term(0);
        pool.mk(var, one, zero)
    }

    /// Number of allocated variables.
    pub fn num_vars(&self) -> u32 {
        self.pool.lock().unwrap().num_vars
    }

    binary_op!(plus, Plus);
    binary_op!(minus, Minus);
    binary_op!(times, Times);
    binary_op!(divide, Divide);
    binary_op!(modulus, Modulus);
    binary_op!(or, Or);
    binary_op!(xor, Xor);
    binary_op!(xnor, Xnor);
    binary_op!(equals, Equals);
    binary_op!(lt, Lt);
    binary_op!(leq, Leq);
    binary_op!(bw_times, BwTimes);
    binary_op!(bw_or, BwOr);
    binary_op!(bw_xor, BwXor);
    binary_op!(bw_xnor, BwXnor);
    binary_op!(lshift, LShift);
    binary_op!(rshift, RShift);

    unary_op!(negate, Negate);
    unary_op!(cmpl, Cmpl);
    unary_op!(bw_cmpl, BwCmpl);

    /// `f ? g : h`, with `f` read as a 0/1 predicate.
    pub fn ite(&self, f: Add, g: Add, h: Add) -> Add {
        self.pool.lock().unwrap().ite(f, g, h)
    }

    /// Decode a node.
    pub fn view(&self, a: Add) -> DdView {
        match self.pool.lock().unwrap().data(a) {
            NodeData::Term(v) => DdView::Term(v),
            NodeData::Node { var, t, e } => DdView::Node { var, then: t, els: e },
        }
    }

    pub fn is_constant(&self, a: Add) -> bool {
        matches!(self.view(a), DdView::Term(_))
    }

    /// Terminal value, if `a` is a terminal.
    pub fn value(&self, a: Add) -> Option<u64> {
        match self.view(a) {
            DdView::Term(v) => Some(v),
            _ => None,
        }
    }

    /// Evaluate under an assignment indexed by variable; missing entries
    /// read as false. Always lands on a terminal.
    pub fn eval(&self, a: Add, assignment: &[bool]) -> Add {
        let pool = self.pool.lock().unwrap();
        let mut cur = a;
        loop {
            match pool.data(cur) {
                NodeData::Term(_) => return cur,
                NodeData::Node { var, t, e } => {
                    cur = if assignment.get(var as usize).copied().unwrap_or(false) {
                        t
                    } else {
                        e
                    };
                }
            }
        }
    }

    /// Evaluate to the terminal value directly.
    pub fn eval_value(&self, a: Add, assignment: &[bool]) -> u64 {
        let t = self.eval(a, assignment);
        self.value(t).expect("eval lands on a terminal")
    }

    /// The ordered set of variables `a` depends on.
    pub fn support(&self, a: Add) -> Vec<u32> {
        let pool = self.pool.lock().unwrap();
        let mut seen: FxHashSet<Add> = FxHashSet::default();
        let mut vars: FxHashSet<u32> = FxHashSet::default();
        let mut stack = vec![a];
        while let Some(n) = stack.pop() {
            if !seen.insert(n) {
                continue;
            }
            if let NodeData::Node { var, t, e } = pool.data(n) {
                vars.insert(var);
                stack.push(t);
                stack.push(e);
            }
        }
        let mut out: Vec<u32> = vars.into_iter().collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn constants_are_interned() {
        let dd = DdMgr::new();
        assert_eq!(dd.constant(5), dd.constant(5));
        assert_ne!(dd.constant(5), dd.constant(6));
        assert_eq!(dd.zero(), dd.constant(0));
    }

    #[test]
    fn zero_one_algebra() {
        let dd = DdMgr::new();
        let a = dd.bit();
        let b = dd.bit();

        // conjunction via product
        let and = dd.times(a, b);
        assert_eq!(dd.eval_value(and, &[true, true]), 1);
        assert_eq!(dd.eval_value(and, &[true, false]), 0);

        let or = dd.or(a, b);
        assert_eq!(dd.eval_value(or, &[false, true]), 1);
        assert_eq!(dd.eval_value(or, &[false, false]), 0);

        let not_a = dd.cmpl(a);
        assert_eq!(dd.eval_value(not_a, &[false]), 1);
        assert_eq!(dd.eval_value(not_a, &[true]), 0);
    }

    #[test]
    fn packed_integer_encoding_evaluates() {
        let dd = DdMgr::new();
        // res = ((b0 * 2) + b1) * 2 + b2 — the monolithic builder shape
        let two = dd.constant(2);
        let mut res = dd.bit();
        for _ in 0..2 {
            res = dd.times(res, two);
            let b = dd.bit();
            res = dd.plus(res, b);
        }
        assert_eq!(dd.eval_value(res, &[true, false, true]), 0b101);
        assert_eq!(dd.eval_value(res, &[false, true, true]), 0b011);
    }

    #[test]
    fn relational_ops_yield_predicates() {
        let dd = DdMgr::new();
        let x = dd.bit();
        let three = dd.constant(3);
        let sum = dd.plus(x, three); // 3 or 4
        let lt = dd.lt(sum, dd.constant(4));
        assert_eq!(dd.eval_value(lt, &[false]), 1);
        assert_eq!(dd.eval_value(lt, &[true]), 0);
    }

    #[test]
    fn ite_multiplexes() {
        let dd = DdMgr::new();
        let c = dd.bit();
        let g = dd.constant(10);
        let h = dd.constant(20);
        let ite = dd.ite(c, g, h);
        assert_eq!(dd.eval_value(ite, &[true]), 10);
        assert_eq!(dd.eval_value(ite, &[false]), 20);
    }

    #[test]
    fn support_is_ordered() {
        let dd = DdMgr::new();
        let a = dd.bit();
        let b = dd.bit();
        let c = dd.bit();
        let f = dd.plus(dd.times(c, b), a);
        assert_eq!(dd.support(f), vec![0, 1, 2]);
        assert!(dd.support(dd.constant(7)).is_empty());
    }

    #[test]
    fn reduction_merges_equal_children() {
        let dd = DdMgr::new();
        let a = dd.bit();
        // a XOR a == 0: the diagram collapses to the zero terminal
        let x = dd.xor(a, a);
        assert_eq!(dd.value(x), Some(0));
    }

    proptest! {
        #[test]
        fn terminal_arithmetic_matches_u64(a in any::<u64>(), b in any::<u64>()) {
            let dd = DdMgr::new();
            let ca = dd.constant(a);
            let cb = dd.constant(b);
            prop_assert_eq!(dd.value(dd.plus(ca, cb)), Some(a.wrapping_add(b)));
            prop_assert_eq!(dd.value(dd.times(ca, cb)), Some(a.wrapping_mul(b)));
            prop_assert_eq!(dd.value(dd.equals(ca, cb)), Some((a == b) as u64));
            prop_assert_eq!(dd.value(dd.lt(ca, cb)), Some((a < b) as u64));
            prop_assert_eq!(dd.value(dd.bw_xor(ca, cb)), Some(a ^ b));
            prop_assert_eq!(dd.value(dd.bw_cmpl(ca)), Some(!a));
            let sh = b % 64;
            prop_assert_eq!(dd.value(dd.lshift(ca, dd.constant(sh))), Some(a << sh));
            prop_assert_eq!(dd.value(dd.rshift(ca, dd.constant(sh))), Some(a >> sh));
        }

        #[test]
        fn eval_agrees_with_terminal_ops(bits in proptest::collection::vec(any::<bool>(), 4)) {
            let dd = DdMgr::new();
            let vars: Vec<Add> = (0..4).map(|_| dd.bit()).collect();
            // f = (v0 + v1) * (v2 + v3) over 0/1 terminals
            let s1 = dd.plus(vars[0], vars[1]);
            let s2 = dd.plus(vars[2], vars[3]);
            let f = dd.times(s1, s2);
            let expected = (bits[0] as u64 + bits[1] as u64) * (bits[2] as u64 + bits[3] as u64);
            prop_assert_eq!(dd.eval_value(f, &bits), expected);
        }
    }
}
