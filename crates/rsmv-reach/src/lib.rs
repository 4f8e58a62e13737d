//! SAT-based reachability analysis.
//!
//! Given a target predicate and optional forward / backward / global
//! constraints, up to three strategies race on their own threads: forward
//! unrolling from the initial states, backward unrolling from the goal
//! states, and a combined strategy interleaving one step of each. The
//! first to decide publishes the shared status and interrupts its peers;
//! on a SAT answer the winner reads the model back through the encodings
//! into a registered witness.

mod fsm;
mod strategy;
mod witness_build;

pub use fsm::{check_init_consistency, ConsistencyStatus, FsmData};

use rsmv_compiler::CompilerError;
use rsmv_dd::DdMgr;
use rsmv_enc::EncodingMgr;
use rsmv_expr::Expr;
use rsmv_model::ModelMgr;
use rsmv_sat::SatError;
use rsmv_witness::WitnessMgr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ReachError {
    #[error("no target given")]
    NoTarget,

    #[error("model not loaded")]
    ModelNotLoaded,

    #[error(transparent)]
    Compiler(#[from] CompilerError),

    #[error(transparent)]
    Sat(#[from] SatError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ReachResult<T> = Result<T, ReachError>;

/// Decision state shared by all strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReachStatus {
    Unknown,
    Reachable,
    Unreachable,
    Error,
}

/// Which strategies to launch.
#[derive(Clone, Copy, Debug)]
pub struct StrategyConfig {
    pub forward: bool,
    pub backward: bool,
    pub combined: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            forward: true,
            backward: true,
            combined: true,
        }
    }
}

/// The decision plus the registered witness, when reachable.
#[derive(Clone, Debug)]
pub struct ReachOutcome {
    pub status: ReachStatus,
    pub witness_id: Option<String>,
}

pub(crate) struct Shared {
    status: Mutex<ReachStatus>,
    witness_id: Mutex<Option<String>>,
    interrupt: Arc<AtomicBool>,
}

impl Shared {
    fn new() -> Self {
        Self {
            status: Mutex::new(ReachStatus::Unknown),
            witness_id: Mutex::new(None),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    pub(crate) fn sync_status(&self) -> ReachStatus {
        *self.status.lock().unwrap()
    }

    /// Transition out of `Unknown`; returns whether this caller won the
    /// race. No other transition ever happens.
    pub(crate) fn sync_set_status(&self, status: ReachStatus) -> bool {
        let mut cur = self.status.lock().unwrap();
        if *cur == ReachStatus::Unknown {
            *cur = status;
            true
        } else {
            false
        }
    }

    pub(crate) fn set_witness_id(&self, id: String) {
        *self.witness_id.lock().unwrap() = Some(id);
    }

    /// Signal every engine sharing the flag to abort.
    pub(crate) fn interrupt(&self) {
        self.interrupt.store(true, Ordering::Relaxed);
    }

    pub(crate) fn interrupt_flag(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }
}

/// The reachability analysis driver.
pub struct Reachability {
    model: Arc<ModelMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    wm: Arc<WitnessMgr>,
}

impl Reachability {
    pub fn new(
        model: Arc<ModelMgr>,
        dd: Arc<DdMgr>,
        enc: Arc<EncodingMgr>,
        wm: Arc<WitnessMgr>,
    ) -> Self {
        Self { model, dd, enc, wm }
    }

    /// Decide whether `target` is reachable under the given constraints.
    pub fn process(
        &self,
        target: Expr,
        forward_constraints: &[Expr],
        backward_constraints: &[Expr],
        global_constraints: &[Expr],
        strategies: StrategyConfig,
    ) -> ReachResult<ReachOutcome> {
        if !self.model.is_loaded() {
            return Err(ReachError::ModelNotLoaded);
        }

        let fsm = Arc::new(fsm::FsmData::build(
            &self.model,
            &self.dd,
            &self.enc,
            target,
            forward_constraints,
            backward_constraints,
            global_constraints,
        )?);

        let shared = Arc::new(Shared::new());

        // a one-sided constraint anchors time at one end; the strategy
        // unrolling from the other end cannot honor it
        let run_forward = strategies.forward && fsm.negative.is_empty();
        let run_backward = strategies.backward && fsm.positive.is_empty();
        let run_combined =
            strategies.combined && fsm.positive.is_empty() && fsm.negative.is_empty();
        if strategies.forward && !run_forward {
            warn!("forward strategy disabled by backward constraints");
        }
        if strategies.backward && !run_backward {
            warn!("backward strategy disabled by forward constraints");
        }
        if strategies.combined && !run_combined {
            warn!("combined strategy disabled by one-sided constraints");
        }

        let mut handles = Vec::new();
        let spawn = |kind: strategy::StrategyKind, handles: &mut Vec<std::thread::JoinHandle<()>>| {
            let worker = strategy::Worker {
                kind,
                fsm: fsm.clone(),
                shared: shared.clone(),
                model: self.model.clone(),
                dd: self.dd.clone(),
                enc: self.enc.clone(),
                wm: self.wm.clone(),
            };
            handles.push(std::thread::spawn(move || worker.run()));
        };

        if run_forward {
            spawn(strategy::StrategyKind::Forward, &mut handles);
        }
        if run_backward {
            spawn(strategy::StrategyKind::Backward, &mut handles);
        }
        if run_combined {
            spawn(strategy::StrategyKind::Combined, &mut handles);
        }

        if handles.is_empty() {
            return Ok(ReachOutcome {
                status: ReachStatus::Unknown,
                witness_id: None,
            });
        }

        for h in handles {
            if h.join().is_err() {
                shared.sync_set_status(ReachStatus::Error);
            }
        }

        let status = shared.sync_status();
        let witness_id = shared.witness_id.lock().unwrap().clone();
        info!(?status, "reachability analysis finished");
        Ok(ReachOutcome { status, witness_id })
    }
}
