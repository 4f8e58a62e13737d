//! Flyweight type objects.
//!
//! Types fall in two camps: *monolithic* types fit a single decision diagram
//! (booleans and enumeratives), *algebraic* types are vectors of decision
//! diagrams, one per hexadecimal digit — a type of width `N` occupies `N`
//! nibbles, i.e. `4·N` bits. Integer and fixed-point literals carry abstract
//! constant types until an operator site coerces them to a concrete width.
//!
//! Type objects are immutable and interned by [`TypeMgr`]: equality is
//! identity.

use rsmv_expr::Expr;
use rustc_hash::FxHashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Bits per algebraic digit.
pub const NIBBLE_SIZE: u16 = 4;

/// Handle to an interned type. Copyable, comparable by identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

/// The structure of a type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Boolean,
    /// Abstract type of integer literals (always unsigned).
    IntConst,
    /// Abstract type of fixed-point literals (always unsigned).
    FxdConst,
    /// Unsigned integer of `width` nibbles.
    Unsigned { width: u16 },
    /// Signed integer of `width` nibbles.
    Signed { width: u16 },
    /// Unsigned fixed-point: `width` integer nibbles, `fract` fractional.
    UnsignedFxd { width: u16, fract: u16 },
    /// Signed fixed-point.
    SignedFxd { width: u16, fract: u16 },
    /// Enumerative over identifier literals, in declaration order.
    Enum { literals: Vec<Expr> },
    /// Fixed-size array.
    Array { elem: TypeId, size: u32 },
    /// Module instance.
    Instance { module: Expr },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("type error: incompatible operand types")]
    Incompatible,
}

pub type TypeResult<T> = Result<T, TypeError>;

#[derive(Default)]
struct Pool {
    kinds: Vec<TypeKind>,
    table: FxHashMap<TypeKind, TypeId>,
}

impl Pool {
    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.table.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len() as u32);
        self.kinds.push(kind.clone());
        self.table.insert(kind, id);
        id
    }
}

/// Flyweight factory for type objects.
pub struct TypeMgr {
    pool: RwLock<Pool>,
}

impl Default for TypeMgr {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMgr {
    pub fn new() -> Self {
        Self {
            pool: RwLock::new(Pool::default()),
        }
    }

    fn intern(&self, kind: TypeKind) -> TypeId {
        self.pool.write().unwrap().intern(kind)
    }

    pub fn kind(&self, id: TypeId) -> TypeKind {
        self.pool.read().unwrap().kinds[id.0 as usize].clone()
    }

    // -- find_* flyweight constructors -------------------------------------

    pub fn find_boolean(&self) -> TypeId {
        self.intern(TypeKind::Boolean)
    }

    pub fn find_int_const(&self) -> TypeId {
        self.intern(TypeKind::IntConst)
    }

    pub fn find_fxd_const(&self) -> TypeId {
        self.intern(TypeKind::FxdConst)
    }

    pub fn find_unsigned(&self, width: u16) -> TypeId {
        self.intern(TypeKind::Unsigned { width })
    }

    pub fn find_signed(&self, width: u16) -> TypeId {
        self.intern(TypeKind::Signed { width })
    }

    pub fn find_unsigned_fxd(&self, width: u16, fract: u16) -> TypeId {
        self.intern(TypeKind::UnsignedFxd { width, fract })
    }

    pub fn find_signed_fxd(&self, width: u16, fract: u16) -> TypeId {
        self.intern(TypeKind::SignedFxd { width, fract })
    }

    pub fn find_enum(&self, literals: Vec<Expr>) -> TypeId {
        self.intern(TypeKind::Enum { literals })
    }

    pub fn find_array(&self, elem: TypeId, size: u32) -> TypeId {
        self.intern(TypeKind::Array { elem, size })
    }

    pub fn find_instance(&self, module: Expr) -> TypeId {
        self.intern(TypeKind::Instance { module })
    }

    // -- classification predicates -----------------------------------------

    pub fn is_boolean(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Boolean)
    }

    /// Fits a single decision diagram: boolean or enumerative.
    pub fn is_monolithic(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Boolean | TypeKind::Enum { .. })
    }

    pub fn is_enumerative(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Enum { .. })
    }

    /// Any signed/unsigned integer or fixed-point type.
    pub fn is_algebraic(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Unsigned { .. }
                | TypeKind::Signed { .. }
                | TypeKind::UnsignedFxd { .. }
                | TypeKind::SignedFxd { .. }
        )
    }

    /// Abstract literal type, coerced at operator sites.
    pub fn is_constant(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::IntConst | TypeKind::FxdConst)
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Array { .. })
    }

    pub fn is_instance(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Instance { .. })
    }

    pub fn is_signed(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::Signed { .. } | TypeKind::SignedFxd { .. }
        )
    }

    pub fn is_fixed(&self, id: TypeId) -> bool {
        matches!(
            self.kind(id),
            TypeKind::UnsignedFxd { .. } | TypeKind::SignedFxd { .. } | TypeKind::FxdConst
        )
    }

    /// Total nibble width of an algebraic type (integer plus fractional
    /// digits). Zero for non-algebraic types.
    pub fn width(&self, id: TypeId) -> u16 {
        match self.kind(id) {
            TypeKind::Unsigned { width } | TypeKind::Signed { width } => width,
            TypeKind::UnsignedFxd { width, fract } | TypeKind::SignedFxd { width, fract } => {
                width + fract
            }
            _ => 0,
        }
    }

    /// Enum literals in declaration order.
    pub fn enum_literals(&self, id: TypeId) -> Option<Vec<Expr>> {
        match self.kind(id) {
            TypeKind::Enum { literals } => Some(literals),
            _ => None,
        }
    }

    /// Implicit conversion of two operand types at an algebraic operator
    /// site. Fixed rules: fxd wins over int, signed wins over unsigned,
    /// width is the larger, constants take the other side's shape.
    pub fn promote(&self, a: TypeId, b: TypeId) -> TypeResult<TypeId> {
        if a == b {
            return Ok(a);
        }

        let (ka, kb) = (self.kind(a), self.kind(b));

        // literal against concrete: adopt the concrete side
        if self.is_constant(a) && self.is_algebraic(b) {
            return Ok(self.promote_const(&ka, b));
        }
        if self.is_constant(b) && self.is_algebraic(a) {
            return Ok(self.promote_const(&kb, a));
        }
        if self.is_constant(a) && self.is_constant(b) {
            // two abstract literals: fxd absorbs int
            return Ok(if matches!(ka, TypeKind::FxdConst) || matches!(kb, TypeKind::FxdConst) {
                self.find_fxd_const()
            } else {
                self.find_int_const()
            });
        }

        if !self.is_algebraic(a) || !self.is_algebraic(b) {
            return Err(TypeError::Incompatible);
        }

        let signed = self.is_signed(a) || self.is_signed(b);
        let fixed = self.is_fixed(a) || self.is_fixed(b);
        let fract = self.fract(a).max(self.fract(b));
        let width = self.width(a).max(self.width(b));

        Ok(match (fixed, signed) {
            (true, true) => self.find_signed_fxd(width - fract, fract),
            (true, false) => self.find_unsigned_fxd(width - fract, fract),
            (false, true) => self.find_signed(width),
            (false, false) => self.find_unsigned(width),
        })
    }

    fn fract(&self, id: TypeId) -> u16 {
        match self.kind(id) {
            TypeKind::UnsignedFxd { fract, .. } | TypeKind::SignedFxd { fract, .. } => fract,
            _ => 0,
        }
    }

    fn promote_const(&self, const_kind: &TypeKind, concrete: TypeId) -> TypeId {
        // a fxd literal drags an integer operand into fixed-point
        if matches!(const_kind, TypeKind::FxdConst) && !self.is_fixed(concrete) {
            let w = self.width(concrete);
            if self.is_signed(concrete) {
                self.find_signed_fxd(w, 0)
            } else {
                self.find_unsigned_fxd(w, 0)
            }
        } else {
            concrete
        }
    }
}
