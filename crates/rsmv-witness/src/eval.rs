//! Pure expression evaluation against a witness.
//!
//! Walks a formula with context and time stacks, reading variable values
//! out of the witness frames and folding operators over literal values.
//! Used for witness value queries and trace validation.

use crate::{Witness, WitnessError, WitnessResult};
use rsmv_expr::{Expr, ExprMgr, ExprOp, FQExpr, Step};
use rsmv_model::{ModelMgr, SymbolKind};

/// Evaluate `body` in context `ctx` at frame `time` of `witness`.
pub fn eval(
    witness: &Witness,
    model: &ModelMgr,
    ctx: Expr,
    body: Expr,
    time: Step,
) -> WitnessResult<Expr> {
    let mut ev = Evaluator {
        witness,
        model,
        ctx_stack: vec![ctx],
        time_stack: vec![time],
    };
    ev.eval(body)
}

struct Evaluator<'a> {
    witness: &'a Witness,
    model: &'a ModelMgr,
    ctx_stack: Vec<Expr>,
    time_stack: Vec<Step>,
}

impl Evaluator<'_> {
    fn em(&self) -> &ExprMgr {
        self.model.em()
    }

    fn ctx(&self) -> Expr {
        *self.ctx_stack.last().expect("context stack is never empty")
    }

    fn time(&self) -> Step {
        *self.time_stack.last().expect("time stack is never empty")
    }

    fn eval(&mut self, e: Expr) -> WitnessResult<Expr> {
        let em = self.model.em().clone();
        let node = em.node(e);
        match node.op {
            ExprOp::True | ExprOp::False | ExprOp::Num => Ok(e),

            ExprOp::Ident => self.identifier(e),

            ExprOp::Next => {
                let t = self.time();
                self.time_stack.push(t.wrapping_add(1));
                let r = self.eval(node.lhs);
                self.time_stack.pop();
                r
            }
            ExprOp::Prev => {
                let t = self.time();
                self.time_stack.push(t.wrapping_sub(1));
                let r = self.eval(node.lhs);
                self.time_stack.pop();
                r
            }
            ExprOp::At => {
                self.time_stack.push(node.value);
                let r = self.eval(node.lhs);
                self.time_stack.pop();
                r
            }

            ExprOp::Dot => {
                let sub = em.make_dot(self.ctx(), node.lhs);
                self.ctx_stack.push(sub);
                let r = self.eval(node.rhs);
                self.ctx_stack.pop();
                r
            }

            ExprOp::Not => {
                let v = self.eval(node.lhs)?;
                match em.op(v) {
                    ExprOp::True => Ok(em.make_false()),
                    ExprOp::False => Ok(em.make_true()),
                    ExprOp::Num => Ok(em.make_iconst(!em.node(v).value)),
                    _ => Err(WitnessError::Unsupported(
                        "negation of a non-scalar value".into(),
                    )),
                }
            }
            ExprOp::Neg => {
                let v = self.scalar(node.lhs)?;
                Ok(em.make_iconst(v.wrapping_neg()))
            }

            ExprOp::Ite => {
                let cond = em.node(node.lhs);
                if cond.op != ExprOp::Cond {
                    return Err(WitnessError::Internal("malformed if-then-else".into()));
                }
                if self.truth(cond.lhs)? {
                    self.eval(cond.rhs)
                } else {
                    self.eval(node.rhs)
                }
            }

            op if op.is_binary_logical() => {
                let l = self.truth(node.lhs)?;
                let r = self.truth(node.rhs)?;
                let v = match op {
                    ExprOp::And => l && r,
                    ExprOp::Or => l || r,
                    ExprOp::Xor => l ^ r,
                    ExprOp::Xnor | ExprOp::Iff => l == r,
                    ExprOp::Implies => !l || r,
                    _ => unreachable!(),
                };
                Ok(self.boolean(v))
            }

            op if op.is_binary_arithmetical() => {
                let l = self.scalar(node.lhs)?;
                let r = self.scalar(node.rhs)?;
                let v = match op {
                    ExprOp::Add => l.wrapping_add(r),
                    ExprOp::Sub => l.wrapping_sub(r),
                    ExprOp::Mul => l.wrapping_mul(r),
                    ExprOp::Div => {
                        if r == 0 {
                            return Err(WitnessError::Unsupported("division by zero".into()));
                        }
                        l / r
                    }
                    ExprOp::Mod => {
                        if r == 0 {
                            return Err(WitnessError::Unsupported("modulus by zero".into()));
                        }
                        l % r
                    }
                    ExprOp::LShift => {
                        if r >= 64 {
                            0
                        } else {
                            l << r
                        }
                    }
                    ExprOp::RShift => {
                        if r >= 64 {
                            0
                        } else {
                            l >> r
                        }
                    }
                    _ => unreachable!(),
                };
                Ok(em.make_iconst(v))
            }

            op if op.is_binary_relational() => {
                let lv = self.eval(node.lhs)?;
                let rv = self.eval(node.rhs)?;
                // scalars compare by value (enum literals through their
                // positions), anything else by identity
                let v = match (self.value_of(lv), self.value_of(rv)) {
                    (Some(l), Some(r)) => match op {
                        ExprOp::Eq => l == r,
                        ExprOp::Ne => l != r,
                        ExprOp::Lt => l < r,
                        ExprOp::Le => l <= r,
                        ExprOp::Gt => l > r,
                        ExprOp::Ge => l >= r,
                        _ => unreachable!(),
                    },
                    _ => match op {
                        ExprOp::Eq => lv == rv,
                        ExprOp::Ne => lv != rv,
                        _ => {
                            return Err(WitnessError::Unsupported(
                                "ordering of non-scalar values".into(),
                            ))
                        }
                    },
                };
                Ok(self.boolean(v))
            }

            op => Err(WitnessError::Unsupported(format!("operator {op:?}"))),
        }
    }

    fn identifier(&mut self, e: Expr) -> WitnessResult<Expr> {
        let ctx = self.ctx();
        let sym = self
            .model
            .fetch_symbol(ctx, e)
            .map_err(|err| WitnessError::Unsupported(err.to_string()))?;
        match sym.kind {
            SymbolKind::Constant { value, .. } => Ok(self.em().make_iconst(value)),
            // an enum literal evaluates to itself
            SymbolKind::Literal { .. } => Ok(e),
            SymbolKind::Define { body } => self.eval(body),
            SymbolKind::Variable { .. } | SymbolKind::Temporary { .. } => {
                let key = FQExpr::new(sym.ctx, e, self.time());
                self.witness.value(key)
            }
        }
    }

    /// Numeric value of an evaluated expression; enum literals map to
    /// their declared position.
    fn value_of(&self, v: Expr) -> Option<u64> {
        let em = self.model.em();
        let node = em.node(v);
        match node.op {
            ExprOp::Num => Some(node.value),
            ExprOp::True => Some(1),
            ExprOp::False => Some(0),
            ExprOp::Ident => match self.model.fetch_symbol(self.ctx(), v).ok()?.kind {
                SymbolKind::Literal { value, .. } | SymbolKind::Constant { value, .. } => {
                    Some(value)
                }
                _ => None,
            },
            _ => None,
        }
    }

    fn scalar(&mut self, e: Expr) -> WitnessResult<u64> {
        let v = self.eval(e)?;
        self.value_of(v)
            .ok_or_else(|| WitnessError::Unsupported("expected a scalar value".into()))
    }

    fn truth(&mut self, e: Expr) -> WitnessResult<bool> {
        Ok(self.scalar(e)? != 0)
    }

    fn boolean(&self, v: bool) -> Expr {
        if v {
            self.em().make_true()
        } else {
            self.em().make_false()
        }
    }
}
