//! The boolean compiler.
//!
//! Translates typed, time-stamped expressions over the model into decision
//! diagrams plus two side tables: microcode descriptors (deferred algebraic
//! operations) and multiplexer chains (algebraic if-then-else ladders).
//! Results are memoized per `(context, expression, time)`.
//!
//! The compilation engine is a walker over the expression DAG: on preorder
//! a node is looked up in the cache (a hit replays the recorded stack
//! effect and skips the subtree); the operator's actual compilation happens
//! in postorder, consuming operand diagrams from the working stacks.

mod internals;
mod micro;
mod walker;

pub use micro::{group_chains, MicroDescriptor, MuxDescriptor, MuxJournal, OpTriple};

use rsmv_dd::{Add, DdMgr};
use rsmv_enc::{EncError, EncodingMgr};
use rsmv_expr::{Expr, ExprMgr, FQExpr, Step};
use rsmv_model::{ModelError, ModelMgr};
use rsmv_types::{TypeId, TypeMgr};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("operator unsupported in operand family: {0}")]
    UnsupportedOpInFamily(String),

    #[error("type error: {0}")]
    TypeError(String),

    #[error("unresolved symbol: `{name}` in context `{ctx}`")]
    UnresolvedSymbol { ctx: String, name: String },

    #[error("cannot infer a width for constant expression")]
    AmbiguousConstantWidth,

    #[error("encoding registry conflict")]
    EncodingRegistryConflict,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CompilerResult<T> = Result<T, CompilerError>;

impl From<ModelError> for CompilerError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::UnresolvedSymbol { ctx, name } => {
                CompilerError::UnresolvedSymbol { ctx, name }
            }
            ModelError::TypeError(msg) => CompilerError::TypeError(msg),
            other => CompilerError::Internal(other.to_string()),
        }
    }
}

impl From<EncError> for CompilerError {
    fn from(e: EncError) -> Self {
        match e {
            EncError::RegistryConflict => CompilerError::EncodingRegistryConflict,
            other => CompilerError::Internal(other.to_string()),
        }
    }
}

/// The result of compiling one toplevel expression: the diagram vector
/// (main result first, MUX activation conjuncts after it) and the side
/// tables to be discharged by the SAT driver.
#[derive(Clone, Debug, Default)]
pub struct CompilationUnit {
    pub dds: Vec<Add>,
    pub micros: Vec<MicroDescriptor>,
    pub mux: MuxJournal,
}

/// A memoization entry: the stack effect of one compiled node.
#[derive(Clone)]
struct CacheEntry {
    dv: Vec<Add>,
    ty: TypeId,
    micros: Vec<MicroDescriptor>,
    mux: MuxJournal,
}

/// The compiler itself. One instance per client; working state is cleared
/// by every [`Compiler::process`] call.
pub struct Compiler {
    em: Arc<ExprMgr>,
    tm: Arc<TypeMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    model: Arc<ModelMgr>,

    cache: FxHashMap<FQExpr, CacheEntry>,

    add_stack: Vec<Add>,
    type_stack: Vec<TypeId>,
    ctx_stack: Vec<Expr>,
    time_stack: Vec<Step>,

    micros: Vec<MicroDescriptor>,
    mux: MuxJournal,
    /// Chain root propagated into the else branch of an if-then-elif
    /// ladder.
    chain_ctx: Option<Expr>,

    /// When set, nothing is memoized.
    preprocess: bool,
}

impl Compiler {
    pub fn new(model: Arc<ModelMgr>, dd: Arc<DdMgr>, enc: Arc<EncodingMgr>) -> Self {
        let em = model.em().clone();
        let tm = model.tm().clone();
        Self {
            em,
            tm,
            dd,
            enc,
            model,
            cache: FxHashMap::default(),
            add_stack: Vec::new(),
            type_stack: Vec::new(),
            ctx_stack: Vec::new(),
            time_stack: Vec::new(),
            micros: Vec::new(),
            mux: Vec::new(),
            chain_ctx: None,
            preprocess: false,
        }
    }

    pub fn set_preprocess(&mut self, on: bool) {
        self.preprocess = on;
    }

    /// Compile `body` in context `ctx` at time `time`.
    pub fn process(&mut self, ctx: Expr, body: Expr, time: Step) -> CompilerResult<CompilationUnit> {
        self.cache.clear();
        self.add_stack.clear();
        self.type_stack.clear();
        self.ctx_stack.clear();
        self.time_stack.clear();
        self.micros.clear();
        self.mux.clear();
        self.chain_ctx = None;

        self.ctx_stack.push(ctx);
        self.time_stack.push(time);

        debug!(time, expr = %self.em.print(body), "compiling");

        self.walk(body)?;
        self.post_process_muxes();

        // sanity: the walk must leave exactly the toplevel result behind
        if self.ctx_stack.len() != 1 || self.time_stack.len() != 1 || self.type_stack.len() != 1 {
            return Err(CompilerError::Internal(format!(
                "unbalanced walker stacks: ctx={} time={} type={}",
                self.ctx_stack.len(),
                self.time_stack.len(),
                self.type_stack.len()
            )));
        }

        Ok(CompilationUnit {
            dds: std::mem::take(&mut self.add_stack),
            micros: std::mem::take(&mut self.micros),
            mux: std::mem::take(&mut self.mux),
        })
    }

    /// The type left on the stack by the last [`Self::process`] call.
    pub fn result_type(&self) -> Option<TypeId> {
        self.type_stack.last().copied()
    }
}
