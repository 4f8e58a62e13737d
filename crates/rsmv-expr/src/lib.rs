//! Hash-consed expression DAG.
//!
//! Expressions are immutable nodes stored in a process-wide pool owned by
//! [`ExprMgr`]. Construction always goes through the manager, which interns
//! every node: two structurally equal expressions share one [`Expr`] handle,
//! so structural equality coincides with handle equality and expressions can
//! be used directly as hash-map keys.

mod mgr;
mod printer;

pub use mgr::{ExprMgr, NameId};

use std::fmt;

/// Handle to an interned expression node. Copyable, comparable by identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expr(pub(crate) u32);

impl Expr {
    /// Raw pool index, usable as a map key.
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Time step annotation. Backward reachability counts down from
/// `step_t::MAX`, so all time arithmetic is wrapping.
pub type Step = u64;

/// Operator tag of an expression node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprOp {
    // leaves
    Ident,
    Num,
    True,
    False,

    // unary
    Neg,
    Not,
    Next,
    Prev,
    At,

    // binary arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LShift,
    RShift,

    // binary logical
    And,
    Or,
    Xor,
    Xnor,
    Implies,
    Iff,

    // binary relational
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // if-then-else: `Ite(Cond(c, t), e)`
    Cond,
    Ite,

    // structure
    Dot,
    Subscript,
    Bitslice,

    // type constructor (e.g. a cast target)
    Type,

    // temporal operators; carried through the DAG and the printer, never
    // compiled
    G,
    F,
    X,
    U,
    R,
}

impl ExprOp {
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            ExprOp::Ident | ExprOp::Num | ExprOp::True | ExprOp::False
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(
            self,
            ExprOp::Neg
                | ExprOp::Not
                | ExprOp::Next
                | ExprOp::Prev
                | ExprOp::At
                | ExprOp::Type
                | ExprOp::G
                | ExprOp::F
                | ExprOp::X
        )
    }

    pub fn is_binary_arithmetical(self) -> bool {
        matches!(
            self,
            ExprOp::Add
                | ExprOp::Sub
                | ExprOp::Mul
                | ExprOp::Div
                | ExprOp::Mod
                | ExprOp::LShift
                | ExprOp::RShift
        )
    }

    pub fn is_binary_logical(self) -> bool {
        matches!(
            self,
            ExprOp::And | ExprOp::Or | ExprOp::Xor | ExprOp::Xnor | ExprOp::Implies | ExprOp::Iff
        )
    }

    pub fn is_binary_relational(self) -> bool {
        matches!(
            self,
            ExprOp::Eq | ExprOp::Ne | ExprOp::Lt | ExprOp::Le | ExprOp::Gt | ExprOp::Ge
        )
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            ExprOp::G | ExprOp::F | ExprOp::X | ExprOp::U | ExprOp::R
        )
    }
}

/// An expression node as stored in the pool.
///
/// `lhs`/`rhs` are child handles (`Expr::NIL` when absent); `value` is the
/// inline payload: the numeric literal for [`ExprOp::Num`], the interned name
/// for [`ExprOp::Ident`], the absolute step for [`ExprOp::At`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExprNode {
    pub op: ExprOp,
    pub lhs: Expr,
    pub rhs: Expr,
    pub value: u64,
}

impl Expr {
    pub const NIL: Expr = Expr(u32::MAX);
}

/// Fully-qualified timed expression: the universal key of the engine.
///
/// Used for compiler memoization, the encoding registry, witness frames and
/// CNF variable naming.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FQExpr {
    /// Context the expression is resolved in (a dotted instance path;
    /// the empty identifier denotes the `main` module).
    pub ctx: Expr,
    /// The expression itself.
    pub expr: Expr,
    /// Time annotation.
    pub time: Step,
}

impl FQExpr {
    pub fn new(ctx: Expr, expr: Expr, time: Step) -> Self {
        Self { ctx, expr, time }
    }

    /// Same key rebased at a different time.
    pub fn at_time(self, time: Step) -> Self {
        Self { time, ..self }
    }
}
