//! The expression manager: interning pool and node factory.

use crate::{Expr, ExprNode, ExprOp, Step};
use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// Handle to an interned identifier name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NameId(pub u32);

#[derive(Default)]
struct Pool {
    nodes: Vec<ExprNode>,
    table: FxHashMap<ExprNode, Expr>,
    names: Vec<String>,
    name_table: FxHashMap<String, NameId>,
}

impl Pool {
    fn intern(&mut self, node: ExprNode) -> Expr {
        if let Some(&e) = self.table.get(&node) {
            return e;
        }
        let e = Expr(self.nodes.len() as u32);
        self.nodes.push(node);
        self.table.insert(node, e);
        e
    }

    fn intern_name(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.name_table.get(name) {
            return id;
        }
        let id = NameId(self.names.len() as u32);
        self.names.push(name.to_owned());
        self.name_table.insert(name.to_owned(), id);
        id
    }
}

/// Process-wide expression factory.
///
/// Interning writes are guarded by a lock so the manager can be shared
/// across reachability strategy threads; after model analysis the pool is
/// read-mostly.
pub struct ExprMgr {
    pool: RwLock<Pool>,
}

impl Default for ExprMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprMgr {
    pub fn new() -> Self {
        Self {
            pool: RwLock::new(Pool::default()),
        }
    }

    fn intern(&self, node: ExprNode) -> Expr {
        self.pool.write().unwrap().intern(node)
    }

    /// Fetch a node by handle. Nodes are tiny and copied out.
    pub fn node(&self, e: Expr) -> ExprNode {
        self.pool.read().unwrap().nodes[e.0 as usize]
    }

    pub fn op(&self, e: Expr) -> ExprOp {
        self.node(e).op
    }

    /// The interned text of an identifier name.
    pub fn name(&self, id: NameId) -> String {
        self.pool.read().unwrap().names[id.0 as usize].clone()
    }

    /// The text of an identifier expression.
    pub fn ident_name(&self, e: Expr) -> Option<String> {
        let node = self.node(e);
        (node.op == ExprOp::Ident).then(|| self.name(NameId(node.value as u32)))
    }

    // -- node factories ----------------------------------------------------

    pub fn make_identifier(&self, name: &str) -> Expr {
        let mut pool = self.pool.write().unwrap();
        let id = pool.intern_name(name);
        pool.intern(ExprNode {
            op: ExprOp::Ident,
            lhs: Expr::NIL,
            rhs: Expr::NIL,
            value: id.0 as u64,
        })
    }

    pub fn make_numeric(&self, value: u64) -> Expr {
        self.intern(ExprNode {
            op: ExprOp::Num,
            lhs: Expr::NIL,
            rhs: Expr::NIL,
            value,
        })
    }

    /// Alias of [`Self::make_numeric`] used when building witness values.
    pub fn make_iconst(&self, value: u64) -> Expr {
        self.make_numeric(value)
    }

    pub fn make_true(&self) -> Expr {
        self.intern(ExprNode {
            op: ExprOp::True,
            lhs: Expr::NIL,
            rhs: Expr::NIL,
            value: 0,
        })
    }

    pub fn make_false(&self) -> Expr {
        self.intern(ExprNode {
            op: ExprOp::False,
            lhs: Expr::NIL,
            rhs: Expr::NIL,
            value: 0,
        })
    }

    /// The empty identifier: context of the `main` module.
    pub fn make_empty(&self) -> Expr {
        self.make_identifier("")
    }

    pub fn make_main(&self) -> Expr {
        self.make_identifier("main")
    }

    pub fn make_unary(&self, op: ExprOp, a: Expr) -> Expr {
        debug_assert!(op.is_unary() || op.is_temporal());
        self.intern(ExprNode {
            op,
            lhs: a,
            rhs: Expr::NIL,
            value: 0,
        })
    }

    pub fn make_binary(&self, op: ExprOp, a: Expr, b: Expr) -> Expr {
        self.intern(ExprNode {
            op,
            lhs: a,
            rhs: b,
            value: 0,
        })
    }

    /// `c ? t : e`, stored as `Ite(Cond(c, t), e)`.
    pub fn make_ite(&self, c: Expr, t: Expr, e: Expr) -> Expr {
        let cond = self.make_binary(ExprOp::Cond, c, t);
        self.make_binary(ExprOp::Ite, cond, e)
    }

    pub fn make_next(&self, a: Expr) -> Expr {
        self.make_unary(ExprOp::Next, a)
    }

    pub fn make_prev(&self, a: Expr) -> Expr {
        self.make_unary(ExprOp::Prev, a)
    }

    /// Absolute time annotation `@step`.
    pub fn make_at(&self, step: Step, a: Expr) -> Expr {
        self.intern(ExprNode {
            op: ExprOp::At,
            lhs: a,
            rhs: Expr::NIL,
            value: step,
        })
    }

    pub fn make_dot(&self, a: Expr, b: Expr) -> Expr {
        self.make_binary(ExprOp::Dot, a, b)
    }

    pub fn make_subscript(&self, a: Expr, index: Expr) -> Expr {
        self.make_binary(ExprOp::Subscript, a, index)
    }

    /// Type-constructor expression wrapping a type name.
    pub fn make_type(&self, name: Expr) -> Expr {
        self.make_unary(ExprOp::Type, name)
    }

    // -- predicates (the compiler's dispatch table) ------------------------

    pub fn is_numeric(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Num
    }

    pub fn is_identifier(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Ident
    }

    pub fn is_true(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::True
    }

    pub fn is_false(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::False
    }

    pub fn is_unary_logical(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Not
    }

    pub fn is_unary_arithmetical(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Neg
    }

    pub fn is_binary_logical(&self, e: Expr) -> bool {
        self.op(e).is_binary_logical()
    }

    pub fn is_binary_arithmetical(&self, e: Expr) -> bool {
        self.op(e).is_binary_arithmetical()
    }

    pub fn is_binary_relational(&self, e: Expr) -> bool {
        self.op(e).is_binary_relational()
    }

    pub fn is_ite(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Ite
    }

    pub fn is_type(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Type
    }

    pub fn is_dot(&self, e: Expr) -> bool {
        self.op(e) == ExprOp::Dot
    }
}
