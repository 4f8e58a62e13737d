//! Compilation of the model's transition system and the run's constraints.

use crate::{ReachError, ReachResult};
use rsmv_compiler::{CompilationUnit, Compiler};
use rsmv_dd::{DdMgr, DdView};
use rsmv_enc::EncodingMgr;
use rsmv_expr::{Expr, FQExpr};
use rsmv_model::ModelMgr;
use rsmv_sat::{Engine, Status, MAIN_GROUP};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

/// One state variable of the flattened model.
#[derive(Clone, Debug)]
pub struct StateVar {
    pub ctx: Expr,
    pub name: Expr,
}

/// Everything the strategies need, compiled once up front: the FSM
/// relations of every reachable module instance, the target, the
/// partitioned constraints, and the state bits for uniqueness clauses.
pub struct FsmData {
    pub init: Vec<CompilationUnit>,
    pub trans: Vec<CompilationUnit>,
    pub invar: Vec<CompilationUnit>,
    pub target: CompilationUnit,
    /// Constraints applied at absolute times 0, 1, … (forward-anchored).
    pub positive: Vec<CompilationUnit>,
    /// Constraints applied at end-anchored times (backward-anchored).
    pub negative: Vec<CompilationUnit>,
    /// Constraints applied at every explored frame by both directions.
    pub global: Vec<CompilationUnit>,
    pub state_vars: Vec<StateVar>,
    pub state_bits: Vec<u32>,
}

impl FsmData {
    pub fn build(
        model: &Arc<ModelMgr>,
        dd: &Arc<DdMgr>,
        enc: &Arc<EncodingMgr>,
        target: Expr,
        forward_constraints: &[Expr],
        backward_constraints: &[Expr],
        global_constraints: &[Expr],
    ) -> ReachResult<Self> {
        let em = model.em().clone();
        let mut compiler = Compiler::new(model.clone(), dd.clone(), enc.clone());

        let mut data = FsmData {
            init: Vec::new(),
            trans: Vec::new(),
            invar: Vec::new(),
            target: CompilationUnit::default(),
            positive: Vec::new(),
            negative: Vec::new(),
            global: Vec::new(),
            state_vars: Vec::new(),
            state_bits: Vec::new(),
        };

        let empty = em.make_empty();
        let main = em.make_main();
        data.compile_module(model, enc, &mut compiler, main, empty)?;

        info!(target = %em.print(target), "compiling reachability target");
        data.target = compiler.process(empty, target, 0)?;

        for &c in forward_constraints {
            debug!(constraint = %em.print(c), "compiling forward constraint");
            data.positive.push(compiler.process(empty, c, 0)?);
        }
        for &c in backward_constraints {
            debug!(constraint = %em.print(c), "compiling backward constraint");
            data.negative.push(compiler.process(empty, c, 0)?);
        }
        for &c in global_constraints {
            debug!(constraint = %em.print(c), "compiling global constraint");
            data.global.push(compiler.process(empty, c, 0)?);
        }

        Ok(data)
    }

    fn compile_module(
        &mut self,
        model: &Arc<ModelMgr>,
        enc: &Arc<EncodingMgr>,
        compiler: &mut Compiler,
        module_name: Expr,
        ctx: Expr,
    ) -> ReachResult<()> {
        let em = model.em().clone();
        let module = model
            .with_model(|m| m.module(module_name).cloned())
            .map_err(|_| ReachError::ModelNotLoaded)?
            .ok_or_else(|| {
                ReachError::Internal(format!("unknown module `{}`", em.print(module_name)))
            })?;

        for &pred in module.init_list() {
            self.init.push(compiler.process(ctx, pred, 0)?);
        }
        for &pred in module.trans_list() {
            self.trans.push(compiler.process(ctx, pred, 0)?);
        }
        for &pred in module.invar_list() {
            self.invar.push(compiler.process(ctx, pred, 0)?);
        }

        let tm = model.tm().clone();
        for &(var, ty) in module.variables() {
            if let rsmv_types::TypeKind::Instance { module: sub } = tm.kind(ty) {
                let sub_ctx = em.make_dot(ctx, var);
                self.compile_module(model, enc, compiler, sub, sub_ctx)?;
                continue;
            }

            // state variables not mentioned by any relation still need an
            // encoding at time zero: uniqueness and witness frames read it
            let key = FQExpr::new(ctx, var, 0);
            let encoding = match enc.find_encoding(key) {
                Some(e) => e,
                None => {
                    let fresh = enc.make_encoding(ty).map_err(rsmv_compiler::CompilerError::from)?;
                    enc.register_encoding(key, fresh)
                        .map_err(rsmv_compiler::CompilerError::from)?
                }
            };
            for &bit in encoding.bits() {
                if let DdView::Node { var, .. } = enc.dd().view(bit) {
                    self.state_bits.push(var);
                }
            }
            self.state_vars.push(StateVar { ctx, name: var });
        }

        Ok(())
    }
}

/// Outcome of the initial-state consistency check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsistencyStatus {
    /// At least one initial state satisfies INIT ∧ INVAR ∧ constraints.
    Ok,
    /// The initial states are empty.
    Ko,
    /// The solver was interrupted.
    Undecided,
}

/// SAT check of the initial states: INIT ∧ INVAR plus any extra
/// constraints, all at time zero.
pub fn check_init_consistency(
    model: &Arc<ModelMgr>,
    dd: &Arc<DdMgr>,
    enc: &Arc<EncodingMgr>,
    constraints: &[Expr],
) -> ReachResult<ConsistencyStatus> {
    if !model.is_loaded() {
        return Err(ReachError::ModelNotLoaded);
    }
    let em = model.em().clone();
    let fsm = FsmData::build(
        model,
        dd,
        enc,
        em.make_true(),
        &[],
        &[],
        constraints,
    )?;

    let mut engine = Engine::new(
        "initial",
        dd.clone(),
        enc.clone(),
        Arc::new(AtomicBool::new(false)),
    );
    for unit in fsm.init.iter().chain(fsm.invar.iter()).chain(fsm.global.iter()) {
        engine.assert_formula(unit, 0, MAIN_GROUP)?;
    }

    info!("checking initial-state consistency");
    Ok(match engine.solve() {
        Status::Sat => ConsistencyStatus::Ok,
        Status::Unsat => ConsistencyStatus::Ko,
        Status::Unknown => ConsistencyStatus::Undecided,
    })
}
