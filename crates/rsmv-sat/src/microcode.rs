//! Microcode discharge: deferred algebraic operations become bit-level
//! circuits at the frame being asserted.
//!
//! Every descriptor operand digit is one of three shapes: a nibble
//! encoding (four bit variables), a constant terminal, or a single fresh
//! boolean (relational results, multiplexer activation bits). Digits are
//! little-endian; the flattened bit vectors below are LSB-first.

use crate::{Bit, Engine, Group, SatError, SatResult};
use rsmv_compiler::{MicroDescriptor, MuxDescriptor};
use rsmv_dd::{Add, DdView};
use rsmv_expr::{ExprOp, Step};

impl Engine {
    /// The solver literal of a single-bit diagram (relational result,
    /// activation witness).
    fn single_bit(&mut self, add: Add, time: Step) -> SatResult<Bit> {
        match self.dd.view(add) {
            DdView::Term(v) => Ok(Bit::Const(v != 0)),
            DdView::Node { var, .. } => Ok(Bit::Lit(self.find_dd_var(var, time)?)),
        }
    }

    /// Flatten a little-endian digit vector into LSB-first wires.
    fn vector_bits(&mut self, dv: &[Add], time: Step) -> SatResult<Vec<Bit>> {
        let mut out = Vec::with_capacity(dv.len() * 4);
        for &digit in dv {
            if let Some(v) = self.dd.value(digit) {
                for i in 0..4 {
                    out.push(Bit::Const((v >> i) & 1 == 1));
                }
                continue;
            }
            let support = self.dd.support(digit);
            if support.len() != 4 {
                return Err(SatError::Internal(format!(
                    "digit diagram has {} bits, expected a nibble",
                    support.len()
                )));
            }
            // ascending variable order is MSB first within a digit
            for &var in support.iter().rev() {
                out.push(Bit::Lit(self.find_dd_var(var, time)?));
            }
        }
        Ok(out)
    }

    /// Discharge one microcode descriptor at a time frame.
    pub fn assert_micro(
        &mut self,
        md: &MicroDescriptor,
        time: Step,
        group: Group,
    ) -> SatResult<()> {
        let signed = md.triple.signed;
        let x = self.vector_bits(&md.x, time)?;

        if md.is_relational() {
            let y = self.vector_bits(&md.y, time)?;
            let z = self.single_bit(md.z[0], time)?;
            let r = match md.triple.op {
                ExprOp::Eq => self.vec_eq(group, &x, &y),
                ExprOp::Ne => self.vec_eq(group, &x, &y).negate(),
                ExprOp::Lt => self.cmp_lt(group, &x, &y, signed),
                ExprOp::Gt => self.cmp_lt(group, &y, &x, signed),
                ExprOp::Le => self.cmp_lt(group, &y, &x, signed).negate(),
                ExprOp::Ge => self.cmp_lt(group, &x, &y, signed).negate(),
                op => {
                    return Err(SatError::Internal(format!(
                        "relational descriptor with operator {op:?}"
                    )))
                }
            };
            self.force_bit_equal(group, z, r);
            return Ok(());
        }

        let z = self.vector_bits(&md.z, time)?;

        if md.is_unary() {
            match md.triple.op {
                ExprOp::Neg => {
                    let neg = self.vec_negate(group, &x);
                    self.force_vec_equal_if(group, Bit::TRUE, &z, &neg);
                }
                ExprOp::Not => {
                    for (zi, xi) in z.iter().zip(x.iter()) {
                        self.force_bit_equal(group, *zi, xi.negate());
                    }
                }
                op => {
                    return Err(SatError::Internal(format!(
                        "unary descriptor with operator {op:?}"
                    )))
                }
            }
            return Ok(());
        }

        let y = self.vector_bits(&md.y, time)?;
        match md.triple.op {
            ExprOp::Add => {
                let (sum, _) = self.ripple_add(group, &x, &y, Bit::FALSE);
                self.force_vec_equal_if(group, Bit::TRUE, &z, &sum);
            }
            ExprOp::Sub => {
                let ny: Vec<Bit> = y.iter().map(|b| b.negate()).collect();
                let (diff, _) = self.ripple_add(group, &x, &ny, Bit::TRUE);
                self.force_vec_equal_if(group, Bit::TRUE, &z, &diff);
            }
            ExprOp::Mul => {
                let prod = self.mul_trunc(group, &x, &y, x.len());
                self.force_vec_equal_if(group, Bit::TRUE, &z, &prod);
            }
            ExprOp::Div => self.division(group, &x, &y, &z, signed, false)?,
            ExprOp::Mod => self.division(group, &x, &y, &z, signed, true)?,
            ExprOp::LShift => self.shift(group, &x, &y, &z, true, signed),
            ExprOp::RShift => self.shift(group, &x, &y, &z, false, signed),
            ExprOp::And | ExprOp::Or | ExprOp::Xor | ExprOp::Xnor | ExprOp::Iff
            | ExprOp::Implies => {
                for i in 0..z.len() {
                    let r = match md.triple.op {
                        ExprOp::And => self.bit_and(group, x[i], y[i]),
                        ExprOp::Or => self.bit_or(group, x[i], y[i]),
                        ExprOp::Xor => self.bit_xor(group, x[i], y[i]),
                        ExprOp::Xnor | ExprOp::Iff => self.bit_eq(group, x[i], y[i]),
                        ExprOp::Implies => self.bit_or(group, x[i].negate(), y[i]),
                        _ => unreachable!(),
                    };
                    self.force_bit_equal(group, z[i], r);
                }
            }
            op => {
                return Err(SatError::Internal(format!(
                    "binary descriptor with operator {op:?}"
                )))
            }
        }
        Ok(())
    }

    /// Discharge one multiplexer descriptor: the activation bit selects
    /// which branch drives the result digits.
    pub fn assert_mux(&mut self, md: &MuxDescriptor, time: Step, group: Group) -> SatResult<()> {
        let aux = self.single_bit(md.aux, time)?;
        let z = self.vector_bits(&md.z, time)?;
        let x = self.vector_bits(&md.x, time)?;
        let y = self.vector_bits(&md.y, time)?;
        self.force_vec_equal_if(group, aux, &z, &x);
        self.force_vec_equal_if(group, aux.negate(), &z, &y);
        Ok(())
    }

    // -- word-level circuit helpers ----------------------------------------

    fn force_vec_equal_if(&mut self, group: Group, cond: Bit, a: &[Bit], b: &[Bit]) {
        debug_assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            self.force_bit_equal_if(group, cond, *x, *y);
        }
    }

    fn ripple_add(
        &mut self,
        group: Group,
        x: &[Bit],
        y: &[Bit],
        cin: Bit,
    ) -> (Vec<Bit>, Bit) {
        debug_assert_eq!(x.len(), y.len());
        let mut carry = cin;
        let mut sum = Vec::with_capacity(x.len());
        for (a, b) in x.iter().zip(y.iter()) {
            let (s, c) = self.full_adder(group, *a, *b, carry);
            sum.push(s);
            carry = c;
        }
        (sum, carry)
    }

    /// Two's complement negation.
    fn vec_negate(&mut self, group: Group, x: &[Bit]) -> Vec<Bit> {
        let nx: Vec<Bit> = x.iter().map(|b| b.negate()).collect();
        let zeros = vec![Bit::FALSE; x.len()];
        let (neg, _) = self.ripple_add(group, &nx, &zeros, Bit::TRUE);
        neg
    }

    /// `s ? -x : x`, bitwise.
    fn cond_negate(&mut self, group: Group, x: &[Bit], s: Bit) -> Vec<Bit> {
        let neg = self.vec_negate(group, x);
        x.iter()
            .zip(neg.iter())
            .map(|(&orig, &n)| self.bit_mux(group, s, n, orig))
            .collect()
    }

    fn vec_eq(&mut self, group: Group, x: &[Bit], y: &[Bit]) -> Bit {
        let mut acc = Bit::TRUE;
        for (a, b) in x.iter().zip(y.iter()) {
            let e = self.bit_eq(group, *a, *b);
            acc = self.bit_and(group, acc, e);
        }
        acc
    }

    fn unsigned_lt(&mut self, group: Group, x: &[Bit], y: &[Bit]) -> Bit {
        // from the LSB up: lt = (x_i = y_i) ? lt : (¬x_i ∧ y_i)
        let mut lt = Bit::FALSE;
        for (a, b) in x.iter().zip(y.iter()) {
            let eq = self.bit_eq(group, *a, *b);
            let bl = self.bit_and(group, a.negate(), *b);
            lt = self.bit_mux(group, eq, lt, bl);
        }
        lt
    }

    fn cmp_lt(&mut self, group: Group, x: &[Bit], y: &[Bit], signed: bool) -> Bit {
        let ult = self.unsigned_lt(group, x, y);
        if !signed {
            return ult;
        }
        let sx = *x.last().expect("non-empty operand");
        let sy = *y.last().expect("non-empty operand");
        let diff = self.bit_xor(group, sx, sy);
        // differing signs: the negative side is smaller; same sign: the
        // unsigned order coincides with the two's complement order
        self.bit_mux(group, diff, sx, ult)
    }

    fn or_reduce(&mut self, group: Group, bits: &[Bit]) -> Bit {
        let mut acc = Bit::FALSE;
        for &b in bits {
            acc = self.bit_or(group, acc, b);
        }
        acc
    }

    /// Schoolbook multiplication truncated to `out` bits.
    fn mul_trunc(&mut self, group: Group, x: &[Bit], y: &[Bit], out: usize) -> Vec<Bit> {
        let mut acc = vec![Bit::FALSE; out];
        for (j, &yj) in y.iter().enumerate() {
            if j >= out {
                break;
            }
            let mut row = vec![Bit::FALSE; out];
            for (i, &xi) in x.iter().enumerate() {
                if i + j >= out {
                    break;
                }
                row[i + j] = self.bit_and(group, xi, yj);
            }
            let (sum, _) = self.ripple_add(group, &acc, &row, Bit::FALSE);
            acc = sum;
        }
        acc
    }

    /// Division and remainder through the quotient relation
    /// `x = q·y + r ∧ r < y`, gated on `y ≠ 0`. Signed operands work on
    /// magnitudes; the quotient takes the sign product, the remainder the
    /// dividend's sign (truncating semantics).
    fn division(
        &mut self,
        group: Group,
        x: &[Bit],
        y: &[Bit],
        z: &[Bit],
        signed: bool,
        is_mod: bool,
    ) -> SatResult<()> {
        let n = x.len();
        let nz = self.or_reduce(group, y);

        let (mx, my, sx, sy) = if signed {
            let sx = *x.last().unwrap();
            let sy = *y.last().unwrap();
            let mx = self.cond_negate(group, x, sx);
            let my = self.cond_negate(group, y, sy);
            (mx, my, sx, sy)
        } else {
            (x.to_vec(), y.to_vec(), Bit::FALSE, Bit::FALSE)
        };

        let q: Vec<Bit> = (0..n).map(|_| self.fresh_bit()).collect();
        let r: Vec<Bit> = (0..n).map(|_| self.fresh_bit()).collect();

        // q·my + r = mx, exactly: compute at double width, pin the top half
        // and the final carry to zero
        let mut q2 = q.clone();
        q2.extend(vec![Bit::FALSE; n]);
        let mut my2 = my.clone();
        my2.extend(vec![Bit::FALSE; n]);
        let prod = self.mul_trunc(group, &q2, &my2, 2 * n);
        let mut r2 = r.clone();
        r2.extend(vec![Bit::FALSE; n]);
        let (sum, carry) = self.ripple_add(group, &prod, &r2, Bit::FALSE);

        self.force_vec_equal_if(group, nz, &sum[..n], &mx);
        for &b in &sum[n..] {
            self.force_bit_equal_if(group, nz, b, Bit::FALSE);
        }
        self.force_bit_equal_if(group, nz, carry, Bit::FALSE);

        let bounded = self.unsigned_lt(group, &r, &my);
        self.force_bit_equal_if(group, nz, bounded, Bit::TRUE);

        let (mag, sign) = if is_mod {
            (r, sx)
        } else {
            (q, self.bit_xor(group, sx, sy))
        };
        let res = if signed {
            self.cond_negate(group, &mag, sign)
        } else {
            mag
        };
        self.force_vec_equal_if(group, nz, z, &res);
        Ok(())
    }

    /// Barrel shifter. `left` selects the direction; arithmetic fill on
    /// signed right shifts.
    fn shift(&mut self, group: Group, x: &[Bit], y: &[Bit], z: &[Bit], left: bool, signed: bool) {
        let n = x.len();
        let fill = if !left && signed {
            *x.last().expect("non-empty operand")
        } else {
            Bit::FALSE
        };

        let stages = usize::BITS as usize - (n - 1).leading_zeros() as usize;
        let mut cur = x.to_vec();
        for s in 0..stages.min(y.len()) {
            let sh = 1usize << s;
            let mut next = Vec::with_capacity(n);
            for i in 0..n {
                let from = if left {
                    if i >= sh {
                        cur[i - sh]
                    } else {
                        fill
                    }
                } else if i + sh < n {
                    cur[i + sh]
                } else {
                    fill
                };
                next.push(self.bit_mux(group, y[s], from, cur[i]));
            }
            cur = next;
        }

        // any selector bit beyond the barrel range shifts everything out
        let high = &y[stages.min(y.len())..];
        let overflow = self.or_reduce(group, high);
        for i in 0..n {
            let v = self.bit_mux(group, overflow, fill, cur[i]);
            self.force_bit_equal(group, z[i], v);
        }
    }
}
