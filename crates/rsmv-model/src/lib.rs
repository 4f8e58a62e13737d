//! Model storage, symbol resolution and type inference.
//!
//! A [`Model`] is a set of modules produced by the parser; the
//! [`ModelMgr`] owns the loaded model and answers the two questions the
//! compiler keeps asking: *what symbol does this identifier denote in this
//! context* ([`ModelMgr::fetch_symbol`]) and *what is the type of this
//! subexpression* ([`ModelMgr::type_of`]).

mod mgr;
mod typecheck;

pub use mgr::ModelMgr;

use rsmv_expr::Expr;
use rsmv_types::TypeId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unresolved symbol: `{name}` in context `{ctx}`")]
    UnresolvedSymbol { ctx: String, name: String },

    #[error("type error: {0}")]
    TypeError(String),

    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("unknown module `{0}`")]
    UnknownModule(String),

    #[error("duplicate module `{0}`")]
    DuplicateModule(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// What a resolved identifier denotes.
#[derive(Clone, Debug)]
pub enum SymbolKind {
    /// Named constant with a fixed value.
    Constant { ty: TypeId, value: u64 },
    /// Enum literal; `value` is its position in the literal list.
    Literal { ty: TypeId, value: u64 },
    /// State variable.
    Variable { ty: TypeId },
    /// Compiler-generated variable; global scope.
    Temporary { ty: TypeId },
    /// Macro with a body; type inferred on use.
    Define { body: Expr },
}

/// A resolved symbol record.
#[derive(Clone, Debug)]
pub struct Symbol {
    /// Context the symbol was found in.
    pub ctx: Expr,
    /// The identifier.
    pub name: Expr,
    pub kind: SymbolKind,
}

impl Symbol {
    pub fn is_variable(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Variable { .. } | SymbolKind::Temporary { .. }
        )
    }

    pub fn is_define(&self) -> bool {
        matches!(self.kind, SymbolKind::Define { .. })
    }

    pub fn is_const(&self) -> bool {
        matches!(
            self.kind,
            SymbolKind::Constant { .. } | SymbolKind::Literal { .. }
        )
    }
}

/// A module: typed variables plus INIT/TRANS/INVAR relations and defines.
#[derive(Clone, Debug)]
pub struct Module {
    /// Module name identifier.
    pub name: Expr,
    /// Declared variables, in declaration order.
    pub vars: Vec<(Expr, TypeId)>,
    /// Named constants.
    pub consts: Vec<(Expr, u64)>,
    /// `DEFINE name := body` macros.
    pub defines: Vec<(Expr, Expr)>,
    /// Initial-state predicates.
    pub init: Vec<Expr>,
    /// Transition predicates.
    pub trans: Vec<Expr>,
    /// Invariant predicates.
    pub invar: Vec<Expr>,
}

impl Module {
    pub fn new(name: Expr) -> Self {
        Self {
            name,
            vars: Vec::new(),
            consts: Vec::new(),
            defines: Vec::new(),
            init: Vec::new(),
            trans: Vec::new(),
            invar: Vec::new(),
        }
    }

    pub fn init_list(&self) -> &[Expr] {
        &self.init
    }

    pub fn trans_list(&self) -> &[Expr] {
        &self.trans
    }

    pub fn invar_list(&self) -> &[Expr] {
        &self.invar
    }

    pub fn variables(&self) -> &[(Expr, TypeId)] {
        &self.vars
    }

    pub fn lookup_var(&self, name: Expr) -> Option<TypeId> {
        self.vars.iter().find(|(n, _)| *n == name).map(|(_, t)| *t)
    }
}

/// A parsed model: an ordered collection of modules.
#[derive(Clone, Debug, Default)]
pub struct Model {
    modules: Vec<Module>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, module: Module) -> ModelResult<()> {
        if self.modules.iter().any(|m| m.name == module.name) {
            return Err(ModelError::DuplicateModule(format!("{:?}", module.name)));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, name: Expr) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
