//! Compiler services: working-stack discipline, constant coercion,
//! auto-generated encodings, memoization, MUX post-processing.

use crate::micro::group_chains;
use crate::{CacheEntry, Compiler, CompilerError, CompilerResult};
use rsmv_dd::Add;
use rsmv_expr::{Expr, FQExpr, Step};
use rsmv_types::{TypeId, TypeKind};
use tracing::trace;

impl Compiler {
    pub(crate) fn ctx(&self) -> Expr {
        *self.ctx_stack.last().expect("context stack is never empty")
    }

    pub(crate) fn time(&self) -> Step {
        *self.time_stack.last().expect("time stack is never empty")
    }

    pub(crate) fn pop_add(&mut self) -> CompilerResult<Add> {
        self.add_stack
            .pop()
            .ok_or_else(|| CompilerError::Internal("diagram stack underflow".into()))
    }

    pub(crate) fn pop_type(&mut self) -> CompilerResult<TypeId> {
        self.type_stack
            .pop()
            .ok_or_else(|| CompilerError::Internal("type stack underflow".into()))
    }

    /// Pop `w` digits off the diagram stack. Digits are pushed most
    /// significant first, so popping yields the little-endian vector
    /// directly.
    pub(crate) fn pop_dv(&mut self, w: usize) -> CompilerResult<Vec<Add>> {
        let mut dv = Vec::with_capacity(w);
        for _ in 0..w {
            dv.push(self.pop_add()?);
        }
        Ok(dv)
    }

    /// Push a little-endian digit vector so that the least significant
    /// digit ends up on top of the stack.
    pub(crate) fn push_dv_slice(&mut self, dv: &[Add]) {
        for &d in dv.iter().rev() {
            self.add_stack.push(d);
        }
    }

    /// Diagram-stack footprint of a type.
    pub(crate) fn type_dd_width(&self, ty: TypeId) -> usize {
        match self.tm.kind(ty) {
            TypeKind::Boolean | TypeKind::Enum { .. } | TypeKind::IntConst | TypeKind::FxdConst => {
                1
            }
            TypeKind::Array { elem, size } => self.type_dd_width(elem) * size as usize,
            _ => self.tm.width(ty) as usize,
        }
    }

    // -- operand coercion --------------------------------------------------

    /// Pop both operands of an algebraic operator site, expanding abstract
    /// constants to digit vectors and extending narrower operands to the
    /// promoted width. Returns `(x, y, width, signedness, result type)`.
    pub(crate) fn coerce_operands(
        &mut self,
        lt: TypeId,
        rt: TypeId,
    ) -> CompilerResult<(Vec<Add>, Vec<Add>, u16, bool, TypeId)> {
        let l_const = self.tm.is_constant(lt);
        let r_const = self.tm.is_constant(rt);
        if l_const && r_const {
            return Err(CompilerError::AmbiguousConstantWidth);
        }

        let res_ty = self
            .tm
            .promote(lt, rt)
            .map_err(|e| CompilerError::TypeError(e.to_string()))?;
        let w = self.tm.width(res_ty);
        let signed = self.tm.is_signed(res_ty);

        // operands sit on the stack as [x, y] with y on top
        let y = self.pop_operand(rt, w)?;
        let x = self.pop_operand(lt, w)?;
        Ok((x, y, w, signed, res_ty))
    }

    fn pop_operand(&mut self, ty: TypeId, w: u16) -> CompilerResult<Vec<Add>> {
        if self.tm.is_constant(ty) {
            let c = self.pop_add()?;
            let v = self
                .dd
                .value(c)
                .ok_or_else(|| CompilerError::Internal("abstract constant is not terminal".into()))?;
            return Ok(self.const_digits(v, w));
        }

        let own = self.tm.width(ty);
        let mut dv = self.pop_dv(own as usize)?;
        if own < w {
            // zero-extension only: a signed fill digit would not be a plain
            // nibble encoding, which every descriptor digit must be
            if self.tm.is_signed(ty) {
                return Err(CompilerError::TypeError(
                    "signed operands of distinct widths".into(),
                ));
            }
            while dv.len() < w as usize {
                dv.push(self.dd.zero());
            }
        }
        Ok(dv)
    }

    /// Little-endian nibble digits of a constant.
    pub(crate) fn const_digits(&self, value: u64, w: u16) -> Vec<Add> {
        (0..w)
            .map(|i| self.dd.constant((value >> (4 * i)) & 0xF))
            .collect()
    }

    // -- auto-generated encodings ------------------------------------------

    fn make_auto_id(&mut self) -> Expr {
        self.em
            .make_identifier(&format!("__tmp{}", self.model.next_temp_index()))
    }

    /// Fresh boolean variable, registered as a global temporary so it has a
    /// canonical bit identifier and resolves like any other symbol.
    pub(crate) fn make_auto_bit(&mut self) -> CompilerResult<Add> {
        let aid = self.make_auto_id();
        let key = FQExpr::new(self.ctx(), aid, self.time());
        let ty = self.tm.find_boolean();
        let enc = self.enc.make_encoding(ty)?;
        let enc = self.enc.register_encoding(key, enc)?;
        self.model.add_temporary(aid, ty);
        Ok(enc.dv()[0])
    }

    /// Fresh little-endian digit vector: one auto nibble digit per
    /// position, each a registered temporary the microcode clauses can
    /// drive bit-by-bit.
    pub(crate) fn make_auto_ddvect(&mut self, w: usize) -> CompilerResult<Vec<Add>> {
        let mut dv = Vec::with_capacity(w);
        for _ in 0..w {
            let aid = self.make_auto_id();
            let key = FQExpr::new(self.ctx(), aid, self.time());
            let ty = self.tm.find_unsigned(1);
            let enc = self.enc.make_encoding(ty)?;
            let enc = self.enc.register_encoding(key, enc)?;
            self.model.add_temporary(aid, ty);
            dv.push(enc.dv()[0]);
        }
        Ok(dv)
    }

    // -- memoization -------------------------------------------------------

    /// On a hit, replay the recorded stack effect (diagram vector, type,
    /// microcode and MUX entries) and skip the subtree.
    pub(crate) fn cache_hit(&mut self, e: Expr) -> bool {
        let key = FQExpr::new(self.ctx(), e, self.time());
        let Some(entry) = self.cache.get(&key).cloned() else {
            return false;
        };
        trace!(expr = %self.em.print(e), "cache hit");
        self.push_dv_slice(&entry.dv);
        self.micros.extend(entry.micros);
        self.mux.extend(entry.mux);
        self.type_stack.push(entry.ty);
        true
    }

    /// Record the stack effect of a freshly compiled node.
    pub(crate) fn memoize(&mut self, e: Expr, micro_mark: usize, mux_mark: usize) {
        if self.preprocess || self.em.is_type(e) {
            return;
        }
        let Some(&ty) = self.type_stack.last() else {
            return;
        };
        let w = self.type_dd_width(ty);
        debug_assert!(w <= self.add_stack.len());

        // top of stack holds the least significant digit: reading downward
        // yields the little-endian vector
        let dv: Vec<Add> = self.add_stack.iter().rev().take(w).copied().collect();

        let key = FQExpr::new(self.ctx(), e, self.time());
        self.cache.insert(
            key,
            CacheEntry {
                dv,
                ty,
                micros: self.micros[micro_mark..].to_vec(),
                mux: self.mux[mux_mark..].to_vec(),
            },
        );
    }

    // -- MUX post-processing -----------------------------------------------

    /// Emit the activation conjuncts of every multiplexer chain: with
    /// `prev₀ = 0` and `prevₖ₊₁ = prevₖ ∨ cndₖ`, assert
    /// `(¬prevₖ ∧ cndₖ) ↔ auxₖ`. Chains are processed in reverse insertion
    /// order so outer branches shadow the inner ones they guard.
    pub(crate) fn post_process_muxes(&mut self) {
        let journal = std::mem::take(&mut self.mux);
        for (_toplevel, descs) in group_chains(&journal) {
            let mut prev = self.dd.zero();
            for d in descs.iter().rev() {
                let not_prev = self.dd.cmpl(prev);
                let act = self.dd.times(not_prev, d.cnd);
                let conj = self.dd.xnor(act, d.aux);
                self.add_stack.push(conj);
                prev = self.dd.or(prev, d.cnd);
            }
        }
        self.mux = journal;
    }
}
