//! The forward, backward and combined search strategies.
//!
//! Each strategy owns its engines; the only cross-thread state is the
//! shared status and the solvers' interruption flag. The forward loop
//! alternates a witness query (target asserted in a retractable group at
//! the current depth) with an unreachability query (the unrolled path
//! constraint plus pairwise state uniqueness, target retracted); the
//! backward loop mirrors it from the goal states, counting frames down
//! from the end-of-time sentinel.

use crate::witness_build::build_witness;
use crate::{FsmData, ReachResult, ReachStatus, Shared};
use rsmv_compiler::CompilationUnit;
use rsmv_dd::DdMgr;
use rsmv_enc::EncodingMgr;
use rsmv_expr::Step;
use rsmv_model::ModelMgr;
use rsmv_sat::{Engine, Status, MAIN_GROUP};
use rsmv_witness::WitnessMgr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StrategyKind {
    Forward,
    Backward,
    Combined,
}

pub(crate) struct Worker {
    pub kind: StrategyKind,
    pub fsm: Arc<FsmData>,
    pub shared: Arc<Shared>,
    pub model: Arc<ModelMgr>,
    pub dd: Arc<DdMgr>,
    pub enc: Arc<EncodingMgr>,
    pub wm: Arc<WitnessMgr>,
}

enum StepResult {
    Continue,
    Done,
}

impl Worker {
    pub fn run(self) {
        let result = match self.kind {
            StrategyKind::Forward => self.run_forward(),
            StrategyKind::Backward => self.run_backward(),
            StrategyKind::Combined => self.run_combined(),
        };
        if let Err(e) = result {
            error!(kind = ?self.kind, error = %e, "strategy failed");
            self.shared.sync_set_status(ReachStatus::Error);
        }
        // first to conclude sends everyone home
        self.shared.interrupt();
    }

    fn run_forward(&self) -> ReachResult<()> {
        let mut search = ForwardSearch::new("forward", self)?;
        while let StepResult::Continue = search.step(self)? {}
        info!("{}", search.engine);
        Ok(())
    }

    fn run_backward(&self) -> ReachResult<()> {
        let mut search = BackwardSearch::new("backward", self)?;
        while let StepResult::Continue = search.step(self)? {}
        info!("{}", search.engine);
        Ok(())
    }

    /// One forward step and one backward step per iteration, in a single
    /// thread with independent engines.
    fn run_combined(&self) -> ReachResult<()> {
        let mut fwd = ForwardSearch::new("combined-forward", self)?;
        let mut bwd = BackwardSearch::new("combined-backward", self)?;
        loop {
            if let StepResult::Done = fwd.step(self)? {
                break;
            }
            if let StepResult::Done = bwd.step(self)? {
                break;
            }
        }
        info!("{}", fwd.engine);
        info!("{}", bwd.engine);
        Ok(())
    }

    fn new_engine(&self, name: &str) -> Engine {
        Engine::new(
            name,
            self.dd.clone(),
            self.enc.clone(),
            self.shared.interrupt_flag(),
        )
    }

    fn assert_units(
        &self,
        engine: &mut Engine,
        units: &[CompilationUnit],
        time: Step,
    ) -> ReachResult<()> {
        for unit in units {
            engine.assert_formula(unit, time, MAIN_GROUP)?;
        }
        Ok(())
    }

    fn assert_fsm_init(&self, engine: &mut Engine, time: Step) -> ReachResult<()> {
        self.assert_units(engine, &self.fsm.init, time)
    }

    /// The transition relation spanning frames `time` and `time + 1`.
    fn assert_fsm_trans(&self, engine: &mut Engine, time: Step) -> ReachResult<()> {
        self.assert_units(engine, &self.fsm.trans, time)
    }

    fn assert_fsm_invar(&self, engine: &mut Engine, time: Step) -> ReachResult<()> {
        self.assert_units(engine, &self.fsm.invar, time)
    }
}

struct ForwardSearch {
    engine: Engine,
    k: Step,
}

impl ForwardSearch {
    fn new(name: &str, w: &Worker) -> ReachResult<Self> {
        let mut engine = w.new_engine(name);
        w.assert_fsm_init(&mut engine, 0)?;
        w.assert_fsm_invar(&mut engine, 0)?;
        w.assert_units(&mut engine, &w.fsm.positive, 0)?;
        w.assert_units(&mut engine, &w.fsm.global, 0)?;
        Ok(Self { engine, k: 0 })
    }

    fn step(&mut self, w: &Worker) -> ReachResult<StepResult> {
        if w.shared.sync_status() != ReachStatus::Unknown {
            return Ok(StepResult::Done);
        }
        let k = self.k;

        let goal = self.engine.new_group();
        self.engine.assert_formula(&w.fsm.target, k, goal)?;

        info!(k, "forward: looking for reachability witness");
        match self.engine.solve() {
            Status::Unknown => Ok(StepResult::Done),
            Status::Sat => {
                if w.shared.sync_set_status(ReachStatus::Reachable) {
                    let id = build_witness(w, &self.engine, k, false)?;
                    info!(k, witness = %id, "forward: target is reachable");
                    w.shared.set_witness_id(id);
                }
                Ok(StepResult::Done)
            }
            Status::Unsat => {
                info!(k, "forward: no reachability witness");
                // retract the goal and unroll one more transition
                self.engine.invert_last_group();
                w.assert_fsm_trans(&mut self.engine, k)?;
                w.assert_fsm_invar(&mut self.engine, k + 1)?;
                w.assert_units(&mut self.engine, &w.fsm.positive, k + 1)?;
                w.assert_units(&mut self.engine, &w.fsm.global, k + 1)?;
                for j in 0..=k {
                    self.engine.assert_uniqueness(&w.fsm.state_bits, j, k + 1)?;
                }

                if w.shared.sync_status() != ReachStatus::Unknown {
                    return Ok(StepResult::Done);
                }

                info!(k, "forward: looking for unreachability proof");
                match self.engine.solve() {
                    Status::Unknown => Ok(StepResult::Done),
                    Status::Unsat => {
                        info!(k, "forward: found unreachability proof");
                        w.shared.sync_set_status(ReachStatus::Unreachable);
                        Ok(StepResult::Done)
                    }
                    Status::Sat => {
                        self.k += 1;
                        Ok(StepResult::Continue)
                    }
                }
            }
        }
    }
}

struct BackwardSearch {
    engine: Engine,
    k: Step,
    decided: bool,
}

impl BackwardSearch {
    const END: Step = Step::MAX;

    fn new(name: &str, w: &Worker) -> ReachResult<Self> {
        let mut engine = w.new_engine(name);

        // goal state constraints, anchored at the end of time
        engine.assert_formula(&w.fsm.target, Self::END, MAIN_GROUP)?;
        w.assert_fsm_invar(&mut engine, Self::END)?;
        w.assert_units(&mut engine, &w.fsm.negative, Self::END)?;
        w.assert_units(&mut engine, &w.fsm.global, Self::END)?;

        let mut decided = false;
        match engine.solve() {
            Status::Unknown => decided = true,
            Status::Unsat => {
                info!("backward: empty goal states, target is trivially unreachable");
                w.shared.sync_set_status(ReachStatus::Unreachable);
                decided = true;
            }
            Status::Sat => {
                info!("backward: goal consistency check ok");
            }
        }

        Ok(Self {
            engine,
            k: 0,
            decided,
        })
    }

    fn step(&mut self, w: &Worker) -> ReachResult<StepResult> {
        if self.decided || w.shared.sync_status() != ReachStatus::Unknown {
            return Ok(StepResult::Done);
        }
        let k = self.k;

        // witness query: can the initial states meet the frontier?
        let init_group = self.engine.new_group();
        for unit in &w.fsm.init {
            self.engine
                .assert_formula(unit, Self::END - k, init_group)?;
        }

        info!(k, "backward: looking for reachability witness");
        match self.engine.solve() {
            Status::Unknown => Ok(StepResult::Done),
            Status::Sat => {
                if w.shared.sync_set_status(ReachStatus::Reachable) {
                    let id = build_witness(w, &self.engine, k, true)?;
                    info!(k, witness = %id, "backward: target is reachable");
                    w.shared.set_witness_id(id);
                }
                Ok(StepResult::Done)
            }
            Status::Unsat => {
                info!(k, "backward: no reachability witness");
                self.engine.invert_last_group();

                self.k += 1;
                let k = self.k;
                w.assert_fsm_trans(&mut self.engine, Self::END - k)?;
                w.assert_fsm_invar(&mut self.engine, Self::END - k)?;
                w.assert_units(&mut self.engine, &w.fsm.negative, Self::END - k)?;
                w.assert_units(&mut self.engine, &w.fsm.global, Self::END - k)?;
                for j in 0..k {
                    self.engine
                        .assert_uniqueness(&w.fsm.state_bits, Self::END - j, Self::END - k)?;
                }

                if w.shared.sync_status() != ReachStatus::Unknown {
                    return Ok(StepResult::Done);
                }

                info!(k, "backward: looking for unreachability proof");
                match self.engine.solve() {
                    Status::Unknown => Ok(StepResult::Done),
                    Status::Unsat => {
                        info!(k, "backward: found unreachability proof");
                        w.shared.sync_set_status(ReachStatus::Unreachable);
                        Ok(StepResult::Done)
                    }
                    Status::Sat => Ok(StepResult::Continue),
                }
            }
        }
    }
}
