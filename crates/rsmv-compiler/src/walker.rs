//! Traversal and operator compilation.

use crate::micro::{MicroDescriptor, MuxDescriptor, OpTriple};
use crate::{Compiler, CompilerError, CompilerResult};
use rsmv_expr::{Expr, ExprOp};
use rsmv_model::SymbolKind;
use rsmv_types::TypeKind;

impl Compiler {
    pub(crate) fn walk(&mut self, e: Expr) -> CompilerResult<()> {
        let node = self.em.node(e);
        match node.op {
            // time annotations adjust the clock around their subtree and
            // are never cached themselves
            ExprOp::Next => {
                let t = self.time();
                self.time_stack.push(t.wrapping_add(1));
                self.walk(node.lhs)?;
                self.time_stack.pop();
                Ok(())
            }
            ExprOp::Prev => {
                let t = self.time();
                self.time_stack.push(t.wrapping_sub(1));
                self.walk(node.lhs)?;
                self.time_stack.pop();
                Ok(())
            }
            ExprOp::At => {
                self.time_stack.push(node.value);
                self.walk(node.lhs)?;
                self.time_stack.pop();
                Ok(())
            }

            ExprOp::Type => Err(CompilerError::UnsupportedOpInFamily(
                "type constructor in formula".into(),
            )),

            op if op.is_temporal() => Err(CompilerError::UnsupportedOpInFamily(format!(
                "temporal operator {op:?}"
            ))),

            ExprOp::Bitslice => Err(CompilerError::UnsupportedOpInFamily(
                "bit slice".into(),
            )),

            ExprOp::Cond => Err(CompilerError::Internal(
                "bare condition node outside if-then-else".into(),
            )),

            _ => {
                if self.cache_hit(e) {
                    return Ok(());
                }
                let micro_mark = self.micros.len();
                let mux_mark = self.mux.len();

                match node.op {
                    ExprOp::Ident | ExprOp::Num | ExprOp::True | ExprOp::False => {
                        self.leaf(e)?;
                    }
                    ExprOp::Dot => {
                        let ctx = self.ctx();
                        self.ctx_stack.push(self.em.make_dot(ctx, node.lhs));
                        self.walk(node.rhs)?;
                        self.ctx_stack.pop();
                    }
                    ExprOp::Not | ExprOp::Neg => {
                        self.walk(node.lhs)?;
                        self.unary_postorder(node.op)?;
                    }
                    ExprOp::Ite => {
                        let cond = self.em.node(node.lhs);
                        if cond.op != ExprOp::Cond {
                            return Err(CompilerError::Internal(
                                "malformed if-then-else".into(),
                            ));
                        }
                        // an ITE in the else position extends this chain;
                        // a then-nested ITE starts a fresh one
                        let chain_root = self.chain_ctx.take().unwrap_or(e);
                        self.walk(cond.lhs)?;
                        self.walk(cond.rhs)?;
                        if self.em.op(node.rhs) == ExprOp::Ite {
                            self.chain_ctx = Some(chain_root);
                        }
                        self.walk(node.rhs)?;
                        self.chain_ctx = None;
                        self.ite_postorder(chain_root)?;
                    }
                    ExprOp::Subscript => {
                        self.walk(node.lhs)?;
                        self.subscript_postorder(e)?;
                    }
                    op if op.is_binary_arithmetical()
                        || op.is_binary_logical()
                        || op.is_binary_relational() =>
                    {
                        self.walk(node.lhs)?;
                        self.walk(node.rhs)?;
                        self.binary_postorder(op)?;
                    }
                    op => {
                        return Err(CompilerError::UnsupportedOpInFamily(format!(
                            "operator {op:?}"
                        )))
                    }
                }

                self.memoize(e, micro_mark, mux_mark);
                Ok(())
            }
        }
    }

    // -- leaves ------------------------------------------------------------

    fn leaf(&mut self, e: Expr) -> CompilerResult<()> {
        let node = self.em.node(e);
        match node.op {
            ExprOp::True => {
                self.add_stack.push(self.dd.one());
                self.type_stack.push(self.tm.find_boolean());
                Ok(())
            }
            ExprOp::False => {
                self.add_stack.push(self.dd.zero());
                self.type_stack.push(self.tm.find_boolean());
                Ok(())
            }
            // explicit constants: width depends on the sibling operand, so
            // they ride the stack as bare terminals until an operator site
            // coerces them
            ExprOp::Num => {
                self.add_stack.push(self.dd.constant(node.value));
                self.type_stack.push(self.tm.find_int_const());
                Ok(())
            }
            ExprOp::Ident => self.identifier_leaf(e),
            _ => Err(CompilerError::Internal("non-leaf in leaf handler".into())),
        }
    }

    fn identifier_leaf(&mut self, e: Expr) -> CompilerResult<()> {
        let ctx = self.ctx();
        let time = self.time();
        let sym = self.model.fetch_symbol(ctx, e)?;

        match sym.kind {
            SymbolKind::Constant { ty, value } => {
                if self.tm.is_boolean(ty) {
                    let dd = if value != 0 { self.dd.one() } else { self.dd.zero() };
                    self.add_stack.push(dd);
                    self.type_stack.push(self.tm.find_boolean());
                } else {
                    self.add_stack.push(self.dd.constant(value));
                    self.type_stack.push(self.tm.find_int_const());
                }
                Ok(())
            }
            SymbolKind::Literal { ty, value } => {
                self.add_stack.push(self.dd.constant(value));
                self.type_stack.push(ty);
                Ok(())
            }
            SymbolKind::Variable { ty } | SymbolKind::Temporary { ty } => {
                if self.tm.is_instance(ty) {
                    return Err(CompilerError::TypeError(format!(
                        "module instance `{}` used as a value",
                        self.em.print(e)
                    )));
                }
                let key = rsmv_expr::FQExpr::new(sym.ctx, e, time);
                let enc = match self.enc.find_encoding(key) {
                    Some(enc) => enc,
                    None => {
                        let fresh = self.enc.make_encoding(ty)?;
                        self.enc.register_encoding(key, fresh)?
                    }
                };
                if enc.is_monolithic() {
                    self.add_stack.push(enc.dv()[0]);
                } else {
                    self.push_dv_slice(enc.dv());
                }
                self.type_stack.push(ty);
                Ok(())
            }
            SymbolKind::Define { body } => self.walk(body),
        }
    }

    // -- operators ---------------------------------------------------------

    fn unary_postorder(&mut self, op: ExprOp) -> CompilerResult<()> {
        let ty = self.pop_type()?;

        if self.tm.is_boolean(ty) {
            if op != ExprOp::Not {
                return Err(CompilerError::UnsupportedOpInFamily(
                    "arithmetic negation of a boolean".into(),
                ));
            }
            let top = self.pop_add()?;
            self.add_stack.push(self.dd.cmpl(top));
            self.type_stack.push(ty);
            return Ok(());
        }

        if self.tm.is_constant(ty) {
            let top = self.pop_add()?;
            let v = self
                .dd
                .value(top)
                .ok_or_else(|| CompilerError::Internal("constant leaf is not terminal".into()))?;
            let folded = match op {
                ExprOp::Neg => v.wrapping_neg(),
                ExprOp::Not => !v,
                _ => unreachable!(),
            };
            self.add_stack.push(self.dd.constant(folded));
            self.type_stack.push(ty);
            return Ok(());
        }

        if self.tm.is_algebraic(ty) {
            let w = self.tm.width(ty);
            let x = self.pop_dv(w as usize)?;
            let z = self.make_auto_ddvect(w as usize)?;
            self.push_dv_slice(&z);
            self.micros.push(MicroDescriptor::unary(
                OpTriple::new(self.tm.is_signed(ty), op, w),
                z,
                x,
            ));
            self.type_stack.push(ty);
            return Ok(());
        }

        Err(CompilerError::TypeError(format!(
            "unary {op:?} on unsupported operand family"
        )))
    }

    fn binary_postorder(&mut self, op: ExprOp) -> CompilerResult<()> {
        let rt = self.pop_type()?;
        let lt = self.pop_type()?;

        // boolean family: 0/1 diagram algebra
        if self.tm.is_boolean(lt) && self.tm.is_boolean(rt) {
            return self.boolean_binary(op);
        }

        // enumeratives support relational operators only, through the
        // packed monolithic diagrams
        if self.tm.is_enumerative(lt) || self.tm.is_enumerative(rt) {
            if lt != rt {
                return Err(CompilerError::TypeError(
                    "comparison across distinct enums".into(),
                ));
            }
            if !op.is_binary_relational() {
                return Err(CompilerError::TypeError(format!(
                    "operator {op:?} on enumerative operands"
                )));
            }
            return self.monolithic_relational(op);
        }

        // algebraic family, including constants awaiting a width
        let l_ok = self.tm.is_algebraic(lt) || self.tm.is_constant(lt);
        let r_ok = self.tm.is_algebraic(rt) || self.tm.is_constant(rt);
        if l_ok && r_ok {
            let (x, y, w, signed, res_ty) = self.coerce_operands(lt, rt)?;
            if op.is_binary_relational() {
                let z = vec![self.make_auto_bit()?];
                self.add_stack.push(z[0]);
                self.micros.push(MicroDescriptor::binary(
                    OpTriple::new(signed, op, w),
                    z,
                    x,
                    y,
                ));
                self.type_stack.push(self.tm.find_boolean());
            } else {
                let z = self.make_auto_ddvect(w as usize)?;
                self.push_dv_slice(&z);
                self.micros.push(MicroDescriptor::binary(
                    OpTriple::new(signed, op, w),
                    z,
                    x,
                    y,
                ));
                self.type_stack.push(res_ty);
            }
            return Ok(());
        }

        Err(CompilerError::TypeError(format!(
            "operator {op:?} on incompatible operand families"
        )))
    }

    fn boolean_binary(&mut self, op: ExprOp) -> CompilerResult<()> {
        let rhs = self.pop_add()?;
        let lhs = self.pop_add()?;
        let dd = &self.dd;
        let result = match op {
            // 0/1 logic uses the arithmetic product for conjunction
            ExprOp::And => dd.times(lhs, rhs),
            ExprOp::Or => dd.or(lhs, rhs),
            ExprOp::Xor => dd.xor(lhs, rhs),
            ExprOp::Xnor | ExprOp::Iff => dd.xnor(lhs, rhs),
            ExprOp::Implies => {
                let nl = dd.cmpl(lhs);
                dd.or(nl, rhs)
            }
            ExprOp::Eq => dd.equals(lhs, rhs),
            ExprOp::Ne => {
                let eq = dd.equals(lhs, rhs);
                dd.cmpl(eq)
            }
            _ => {
                return Err(CompilerError::UnsupportedOpInFamily(format!(
                    "operator {op:?} on boolean operands"
                )))
            }
        };
        self.add_stack.push(result);
        self.type_stack.push(self.tm.find_boolean());
        Ok(())
    }

    fn monolithic_relational(&mut self, op: ExprOp) -> CompilerResult<()> {
        let rhs = self.pop_add()?;
        let lhs = self.pop_add()?;
        let dd = &self.dd;
        let result = match op {
            ExprOp::Eq => dd.equals(lhs, rhs),
            ExprOp::Ne => {
                let eq = dd.equals(lhs, rhs);
                dd.cmpl(eq)
            }
            ExprOp::Lt => dd.lt(lhs, rhs),
            ExprOp::Le => dd.leq(lhs, rhs),
            // simulate GT/GE by swapping
            ExprOp::Gt => dd.lt(rhs, lhs),
            ExprOp::Ge => dd.leq(rhs, lhs),
            _ => unreachable!("caller checked relational"),
        };
        self.add_stack.push(result);
        self.type_stack.push(self.tm.find_boolean());
        Ok(())
    }

    fn ite_postorder(&mut self, chain_root: Expr) -> CompilerResult<()> {
        let et = self.pop_type()?;
        let tt = self.pop_type()?;
        let ct = self.pop_type()?;
        if !self.tm.is_boolean(ct) {
            return Err(CompilerError::TypeError(
                "if-then-else condition is not boolean".into(),
            ));
        }

        // monolithic branches multiplex natively
        if self.tm.is_monolithic(tt) && self.tm.is_monolithic(et) {
            if tt != et {
                return Err(CompilerError::TypeError(
                    "if-then-else branches have distinct monolithic types".into(),
                ));
            }
            let rhs = self.pop_add()?;
            let lhs = self.pop_add()?;
            let c = self.pop_add()?;
            self.add_stack.push(self.dd.ite(c, lhs, rhs));
            self.type_stack.push(tt);
            return Ok(());
        }

        // algebraic branches defer to a multiplexer chain entry
        let t_ok = self.tm.is_algebraic(tt) || self.tm.is_constant(tt);
        let e_ok = self.tm.is_algebraic(et) || self.tm.is_constant(et);
        if t_ok && e_ok {
            let (x, y, w, _signed, res_ty) = self.coerce_operands(tt, et)?;
            let c = self.pop_add()?;
            let z = self.make_auto_ddvect(w as usize)?;
            let aux = self.make_auto_bit()?;
            self.push_dv_slice(&z);
            self.mux.push((
                chain_root,
                MuxDescriptor {
                    width: w,
                    z,
                    cnd: c,
                    aux,
                    x,
                    y,
                },
            ));
            self.type_stack.push(res_ty);
            return Ok(());
        }

        Err(CompilerError::TypeError(
            "if-then-else branches have incompatible types".into(),
        ))
    }

    fn subscript_postorder(&mut self, e: Expr) -> CompilerResult<()> {
        let node = self.em.node(e);
        let at = self.pop_type()?;
        let TypeKind::Array { elem, size } = self.tm.kind(at) else {
            return Err(CompilerError::TypeError("subscript of a non-array".into()));
        };

        let idx_node = self.em.node(node.rhs);
        if idx_node.op != ExprOp::Num {
            return Err(CompilerError::UnsupportedOpInFamily(
                "non-constant array index".into(),
            ));
        }
        let idx = idx_node.value;
        if idx >= size as u64 {
            return Err(CompilerError::TypeError(format!(
                "array index {idx} out of bounds (size {size})"
            )));
        }

        let ew = self.type_dd_width(elem);
        let whole = self.pop_dv(ew * size as usize)?;
        let slice = &whole[idx as usize * ew..(idx as usize + 1) * ew];
        self.push_dv_slice(slice);
        self.type_stack.push(elem);
        Ok(())
    }
}
