//! Boolean encodings of typed variables.
//!
//! Every state variable occurrence at a given time is bound to an
//! [`Encoding`]: a vector of decision diagrams plus the underlying bit
//! variables. Monolithic encodings (booleans, enums) are a single packed
//! diagram; algebraic encodings hold one diagram per hexadecimal digit, in
//! little-endian digit order (digit 0 is least significant).
//!
//! The manager also maintains the UCBI registry: every allocated bit
//! variable maps back to an *untimed canonical bit identifier*
//! `(ctx, expr, time, bit)`. Rebasing a UCBI at an absolute time yields the
//! timed identifier (TCBI) under which the SAT driver names CNF variables —
//! this is what lets a formula compiled once be asserted at any time frame.

use rsmv_dd::{Add, DdMgr, DdView};
use rsmv_expr::{Expr, ExprMgr, FQExpr, Step};
use rsmv_types::{TypeId, TypeKind, TypeMgr, NIBBLE_SIZE};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Error)]
pub enum EncError {
    #[error("encoding registry conflict: key already bound")]
    RegistryConflict,

    #[error("type has no boolean encoding")]
    Unencodable,

    #[error("encoding cannot be evaluated to a scalar")]
    CannotEvaluate,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type EncResult<T> = Result<T, EncError>;

/// Untimed canonical bit identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ucbi {
    pub ctx: Expr,
    pub expr: Expr,
    pub time: Step,
    pub bit: u16,
}

/// Timed canonical bit identifier: a [`Ucbi`] rebased at an absolute time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Tcbi {
    pub ctx: Expr,
    pub expr: Expr,
    pub time: Step,
    pub bit: u16,
}

impl Ucbi {
    /// Rebase at an absolute base time (wrapping, so end-anchored backward
    /// frames work unchanged).
    pub fn timed(self, base: Step) -> Tcbi {
        Tcbi {
            ctx: self.ctx,
            expr: self.expr,
            time: self.time.wrapping_add(base),
            bit: self.bit,
        }
    }
}

/// The shape of an encoding.
#[derive(Clone, Debug)]
pub enum EncodingKind {
    /// One bit, one diagram.
    Boolean,
    /// `width` nibble digits, little-endian.
    Algebraic {
        width: u16,
        fract: u16,
        signed: bool,
    },
    /// Packed literal index plus the value ↔ literal maps.
    Enum { literals: Vec<Expr> },
    /// Concatenated element encodings, element 0 first.
    Array { elem_width: u16, size: u32 },
}

/// A variable encoding: diagrams plus the bits that compose them.
#[derive(Clone, Debug)]
pub struct Encoding {
    pub kind: EncodingKind,
    /// The diagram vector; length 1 for monolithic kinds, the digit count
    /// for algebraic kinds (little-endian), element-concatenated for
    /// arrays.
    dv: Vec<Add>,
    /// Every bit allocated for this encoding, in allocation order: digit 0
    /// first, most significant bit of each digit first.
    bits: Vec<Add>,
}

impl Encoding {
    pub fn dv(&self) -> &[Add] {
        &self.dv
    }

    pub fn bits(&self) -> &[Add] {
        &self.bits
    }

    /// Diagram-vector width.
    pub fn width(&self) -> usize {
        self.dv.len()
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, EncodingKind::Boolean)
    }

    pub fn is_monolithic(&self) -> bool {
        matches!(self.kind, EncodingKind::Boolean | EncodingKind::Enum { .. })
    }

    pub fn is_algebraic(&self) -> bool {
        matches!(self.kind, EncodingKind::Algebraic { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, EncodingKind::Array { .. })
    }

    /// Evaluate the encoding under a bit assignment (indexed by DD
    /// variable) and rebuild the scalar value as an expression.
    pub fn expr(&self, assignment: &[bool], dd: &DdMgr, em: &ExprMgr) -> EncResult<Expr> {
        match &self.kind {
            EncodingKind::Boolean => {
                let v = dd.eval_value(self.dv[0], assignment);
                Ok(if v == 0 { em.make_false() } else { em.make_true() })
            }
            EncodingKind::Enum { literals } => {
                let v = dd.eval_value(self.dv[0], assignment) as usize;
                literals.get(v).copied().ok_or_else(|| {
                    EncError::Internal(format!("enum index {v} out of range"))
                })
            }
            EncodingKind::Algebraic { .. } => {
                let mut res: u64 = 0;
                for &digit in self.dv.iter().rev() {
                    res = res.wrapping_mul(0x10).wrapping_add(dd.eval_value(digit, assignment));
                }
                Ok(em.make_iconst(res))
            }
            EncodingKind::Array { .. } => Err(EncError::CannotEvaluate),
        }
    }

    /// The enum literal for a packed value, for enum encodings.
    pub fn literal_of(&self, value: u64) -> Option<Expr> {
        match &self.kind {
            EncodingKind::Enum { literals } => literals.get(value as usize).copied(),
            _ => None,
        }
    }

    /// The packed value of an enum literal.
    pub fn value_of(&self, literal: Expr) -> Option<u64> {
        match &self.kind {
            EncodingKind::Enum { literals } => literals
                .iter()
                .position(|&l| l == literal)
                .map(|p| p as u64),
            _ => None,
        }
    }
}

/// Bits needed to represent `count` distinct values.
pub fn range_repr_bits(count: u64) -> u16 {
    debug_assert!(count > 0);
    let bits = 64 - count.saturating_sub(1).leading_zeros();
    (bits as u16).max(1)
}

#[derive(Default)]
struct Inner {
    registry: FxHashMap<FQExpr, Arc<Encoding>>,
    ucbis: FxHashMap<u32, Ucbi>,
}

/// Allocates encodings and keeps the `(ctx, variable, time) → encoding`
/// registry and the bit → UCBI map.
pub struct EncodingMgr {
    dd: Arc<DdMgr>,
    tm: Arc<TypeMgr>,
    inner: Mutex<Inner>,
}

impl EncodingMgr {
    pub fn new(dd: Arc<DdMgr>, tm: Arc<TypeMgr>) -> Self {
        Self {
            dd,
            tm,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn dd(&self) -> &Arc<DdMgr> {
        &self.dd
    }

    /// Fresh boolean DD variable.
    pub fn make_bit(&self) -> Add {
        self.dd.bit()
    }

    pub fn zero(&self) -> Add {
        self.dd.zero()
    }

    pub fn one(&self) -> Add {
        self.dd.one()
    }

    /// The algebraic digit base: digits are nibbles.
    pub fn base(&self) -> Add {
        self.dd.constant(0x10)
    }

    pub fn constant(&self, value: u64) -> Add {
        self.dd.constant(value)
    }

    /// Total number of allocated DD variables.
    pub fn num_dd_vars(&self) -> u32 {
        self.dd.num_vars()
    }

    /// Packed integer over `nbits` fresh bits: `result = result*2 + bit`,
    /// most significant bit allocated first.
    fn make_monolithic(&self, nbits: u16, bits: &mut Vec<Add>) -> Add {
        debug_assert!(nbits > 0);
        let two = self.dd.constant(2);
        let b = self.make_bit();
        bits.push(b);
        let mut res = b;
        for _ in 1..nbits {
            let b = self.make_bit();
            bits.push(b);
            res = self.dd.times(res, two);
            res = self.dd.plus(res, b);
        }
        res
    }

    /// Build a fresh encoding for a type.
    pub fn make_encoding(&self, ty: TypeId) -> EncResult<Encoding> {
        let mut bits = Vec::new();
        let enc = match self.tm.kind(ty) {
            TypeKind::Boolean => {
                let b = self.make_bit();
                bits.push(b);
                Encoding {
                    kind: EncodingKind::Boolean,
                    dv: vec![b],
                    bits,
                }
            }
            TypeKind::Enum { literals } => {
                let nbits = range_repr_bits(literals.len() as u64);
                let dd0 = self.make_monolithic(nbits, &mut bits);
                Encoding {
                    kind: EncodingKind::Enum { literals },
                    dv: vec![dd0],
                    bits,
                }
            }
            TypeKind::Unsigned { .. }
            | TypeKind::Signed { .. }
            | TypeKind::UnsignedFxd { .. }
            | TypeKind::SignedFxd { .. } => {
                let width = self.tm.width(ty);
                self.make_algebraic(width, self.fract_of(ty), self.tm.is_signed(ty))
            }
            TypeKind::Array { elem, size } => {
                let mut dv = Vec::new();
                let mut elem_width = 0;
                for _ in 0..size {
                    let e = self.make_encoding(elem)?;
                    elem_width = e.width() as u16;
                    dv.extend_from_slice(e.dv());
                    bits.extend_from_slice(e.bits());
                }
                Encoding {
                    kind: EncodingKind::Array { elem_width, size },
                    dv,
                    bits,
                }
            }
            TypeKind::IntConst | TypeKind::FxdConst | TypeKind::Instance { .. } => {
                return Err(EncError::Unencodable)
            }
        };
        Ok(enc)
    }

    /// Fresh algebraic encoding: `width` nibble digits, little-endian.
    pub fn make_algebraic(&self, width: u16, fract: u16, signed: bool) -> Encoding {
        let mut bits = Vec::new();
        let mut dv = Vec::new();
        for _ in 0..width {
            dv.push(self.make_monolithic(NIBBLE_SIZE, &mut bits));
        }
        Encoding {
            kind: EncodingKind::Algebraic {
                width,
                fract,
                signed,
            },
            dv,
            bits,
        }
    }

    /// Algebraic encoding wrapping pre-existing digit diagrams (used for
    /// temporaries).
    pub fn make_algebraic_from(&self, dds: Vec<Add>, bits: Vec<Add>, signed: bool) -> Encoding {
        Encoding {
            kind: EncodingKind::Algebraic {
                width: dds.len() as u16,
                fract: 0,
                signed,
            },
            dv: dds,
            bits,
        }
    }

    fn fract_of(&self, ty: TypeId) -> u16 {
        match self.tm.kind(ty) {
            TypeKind::UnsignedFxd { fract, .. } | TypeKind::SignedFxd { fract, .. } => fract,
            _ => 0,
        }
    }

    /// Bind an encoding to a `(ctx, variable, time)` key. At most one
    /// encoding may ever exist per key.
    pub fn register_encoding(&self, key: FQExpr, enc: Encoding) -> EncResult<Arc<Encoding>> {
        let mut inner = self.inner.lock().unwrap();
        if inner.registry.contains_key(&key) {
            return Err(EncError::RegistryConflict);
        }

        for (i, &bit) in enc.bits.iter().enumerate() {
            let DdView::Node { var, .. } = self.dd.view(bit) else {
                return Err(EncError::Internal("encoding bit is not a variable".into()));
            };
            inner.ucbis.insert(
                var,
                Ucbi {
                    ctx: key.ctx,
                    expr: key.expr,
                    time: key.time,
                    bit: i as u16,
                },
            );
        }

        let arc = Arc::new(enc);
        inner.registry.insert(key, arc.clone());
        trace!(?key, bits = arc.bits.len(), "registered encoding");
        Ok(arc)
    }

    pub fn find_encoding(&self, key: FQExpr) -> Option<Arc<Encoding>> {
        self.inner.lock().unwrap().registry.get(&key).cloned()
    }

    /// The UCBI a DD variable was allocated under, if any.
    pub fn find_ucbi(&self, dd_var: u32) -> Option<Ucbi> {
        self.inner.lock().unwrap().ucbis.get(&dd_var).copied()
    }
}
