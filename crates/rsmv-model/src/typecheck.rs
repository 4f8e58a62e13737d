//! Type inference over preprocessed expressions.
//!
//! The compiler's operand-family classifier is driven entirely by the types
//! this walker assigns. Inference is cached per `(context, expression)`;
//! the cache is cleared when a new model is loaded.

use crate::{ModelError, ModelMgr, ModelResult, SymbolKind};
use rsmv_expr::{Expr, ExprOp};
use rsmv_types::{TypeId, TypeKind};

impl ModelMgr {
    /// Infer the type of `body` in context `ctx`.
    pub fn type_of(&self, body: Expr, ctx: Expr) -> ModelResult<TypeId> {
        if let Some(&ty) = self.type_cache.lock().unwrap().get(&(ctx, body)) {
            return Ok(ty);
        }
        let ty = self.infer(body, ctx)?;
        self.type_cache.lock().unwrap().insert((ctx, body), ty);
        Ok(ty)
    }

    fn infer(&self, body: Expr, ctx: Expr) -> ModelResult<TypeId> {
        let em = self.em().clone();
        let tm = self.tm().clone();
        let node = em.node(body);

        match node.op {
            ExprOp::True | ExprOp::False => Ok(tm.find_boolean()),
            ExprOp::Num => Ok(tm.find_int_const()),

            ExprOp::Ident => {
                let sym = self.fetch_symbol(ctx, body)?;
                match sym.kind {
                    SymbolKind::Constant { ty, .. } | SymbolKind::Literal { ty, .. } => Ok(ty),
                    SymbolKind::Variable { ty } | SymbolKind::Temporary { ty } => Ok(ty),
                    SymbolKind::Define { body } => self.type_of(body, sym.ctx),
                }
            }

            ExprOp::Next | ExprOp::Prev | ExprOp::At => self.type_of(node.lhs, ctx),

            ExprOp::Not => {
                let t = self.type_of(node.lhs, ctx)?;
                if tm.is_boolean(t) || tm.is_algebraic(t) {
                    Ok(t)
                } else {
                    Err(self.type_error("operand of `!` must be boolean or algebraic", body))
                }
            }

            ExprOp::Neg => {
                let t = self.type_of(node.lhs, ctx)?;
                if tm.is_algebraic(t) || tm.is_constant(t) {
                    Ok(t)
                } else {
                    Err(self.type_error("operand of unary `-` must be algebraic", body))
                }
            }

            op if op.is_binary_logical() => {
                let lt = self.type_of(node.lhs, ctx)?;
                let rt = self.type_of(node.rhs, ctx)?;
                if tm.is_boolean(lt) && tm.is_boolean(rt) {
                    Ok(tm.find_boolean())
                } else {
                    // bitwise reading over algebraic operands
                    tm.promote(lt, rt)
                        .map_err(|e| self.type_error(&e.to_string(), body))
                }
            }

            op if op.is_binary_arithmetical() => {
                let lt = self.type_of(node.lhs, ctx)?;
                let rt = self.type_of(node.rhs, ctx)?;
                tm.promote(lt, rt)
                    .map_err(|e| self.type_error(&e.to_string(), body))
            }

            op if op.is_binary_relational() => {
                let lt = self.type_of(node.lhs, ctx)?;
                let rt = self.type_of(node.rhs, ctx)?;

                let compatible = (tm.is_boolean(lt)
                    && tm.is_boolean(rt)
                    && matches!(op, ExprOp::Eq | ExprOp::Ne))
                    || (tm.is_enumerative(lt) && lt == rt)
                    || tm.promote(lt, rt).is_ok();
                if compatible {
                    Ok(tm.find_boolean())
                } else {
                    Err(self.type_error("incomparable operands", body))
                }
            }

            ExprOp::Ite => {
                let cond = em.node(node.lhs);
                if cond.op != ExprOp::Cond {
                    return Err(ModelError::Internal("malformed if-then-else".into()));
                }
                let ct = self.type_of(cond.lhs, ctx)?;
                if !tm.is_boolean(ct) {
                    return Err(self.type_error("condition must be boolean", body));
                }
                let tt = self.type_of(cond.rhs, ctx)?;
                let et = self.type_of(node.rhs, ctx)?;
                if tt == et {
                    Ok(tt)
                } else {
                    tm.promote(tt, et)
                        .map_err(|e| self.type_error(&e.to_string(), body))
                }
            }

            ExprOp::Dot => {
                let sub_ctx = em.make_dot(ctx, node.lhs);
                self.type_of(node.rhs, sub_ctx)
            }

            ExprOp::Subscript => {
                let at = self.type_of(node.lhs, ctx)?;
                match tm.kind(at) {
                    TypeKind::Array { elem, .. } => {
                        let it = self.type_of(node.rhs, ctx)?;
                        if tm.is_constant(it) || tm.is_algebraic(it) {
                            Ok(elem)
                        } else {
                            Err(self.type_error("array index must be numeric", body))
                        }
                    }
                    _ => Err(self.type_error("subscript of a non-array", body)),
                }
            }

            op if op.is_temporal() => {
                let t = self.type_of(node.lhs, ctx)?;
                if node.rhs != Expr::NIL {
                    let rt = self.type_of(node.rhs, ctx)?;
                    if !tm.is_boolean(rt) {
                        return Err(self.type_error("temporal operand must be boolean", body));
                    }
                }
                if tm.is_boolean(t) {
                    Ok(tm.find_boolean())
                } else {
                    Err(self.type_error("temporal operand must be boolean", body))
                }
            }

            _ => Err(self.type_error("expression has no type", body)),
        }
    }

    fn type_error(&self, message: &str, body: Expr) -> ModelError {
        ModelError::TypeError(format!("{message}: `{}`", self.em().print(body)))
    }
}
