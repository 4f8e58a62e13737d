//! End-to-end reachability scenarios.
//!
//! Each case parses a literal model, runs the strategy race and checks the
//! decision; reachable cases also check the witness length and per-step
//! values, and validate the trace by evaluating INIT, TRANS, INVAR and the
//! target against it.

use rsmv_dd::DdMgr;
use rsmv_enc::EncodingMgr;
use rsmv_expr::{Expr, ExprMgr, FQExpr};
use rsmv_model::ModelMgr;
use rsmv_reach::{
    check_init_consistency, ConsistencyStatus, ReachOutcome, ReachStatus, Reachability,
    StrategyConfig,
};
use rsmv_types::TypeMgr;
use rsmv_witness::{Witness, WitnessMgr};
use std::sync::Arc;

struct World {
    em: Arc<ExprMgr>,
    tm: Arc<TypeMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    model: Arc<ModelMgr>,
    wm: Arc<WitnessMgr>,
    reach: Reachability,
}

impl World {
    fn new(model_src: &str) -> Self {
        let em = Arc::new(ExprMgr::new());
        let tm = Arc::new(TypeMgr::new());
        let dd = Arc::new(DdMgr::new());
        let enc = Arc::new(EncodingMgr::new(dd.clone(), tm.clone()));
        let model = Arc::new(ModelMgr::new(em.clone(), tm.clone()));
        let wm = Arc::new(WitnessMgr::new());

        let parsed = rsmv_syntax::parse_model(model_src, &em, &tm).expect("model parses");
        model.load(parsed).expect("model analyzes");

        let reach = Reachability::new(model.clone(), dd.clone(), enc.clone(), wm.clone());
        Self {
            em,
            tm,
            dd,
            enc,
            model,
            wm,
            reach,
        }
    }

    fn expr(&self, text: &str) -> Expr {
        rsmv_syntax::parse_expression(text, &self.em, &self.tm).expect("expression parses")
    }

    fn decide(&self, target: &str, forward: &[&str], global: &[&str]) -> ReachOutcome {
        let target = self.expr(target);
        let fwd: Vec<Expr> = forward.iter().map(|t| self.expr(t)).collect();
        let glob: Vec<Expr> = global.iter().map(|t| self.expr(t)).collect();
        self.reach
            .process(target, &fwd, &[], &glob, StrategyConfig::default())
            .expect("analysis completes")
    }

    fn witness(&self, outcome: &ReachOutcome) -> Arc<Witness> {
        let id = outcome.witness_id.as_ref().expect("witness registered");
        self.wm.get(id).expect("witness recorded")
    }

    /// Frame values of one variable across the whole trace.
    fn var_values(&self, w: &Witness, var: &str) -> Vec<Expr> {
        let ctx = self.em.make_empty();
        let v = self.em.make_identifier(var);
        (0..w.len())
            .map(|i| w.value(FQExpr::new(ctx, v, i as u64)).expect("value set"))
            .collect()
    }

    /// Check the trace against the model: INIT at frame 0, TRANS between
    /// consecutive frames, INVAR everywhere, the target at the last frame.
    fn validate_witness(&self, w: &Witness, target: &str) {
        let ctx = self.em.make_empty();
        let tru = self.em.make_true();
        let main = self
            .model
            .with_model(|m| m.module(self.em.make_main()).cloned())
            .unwrap()
            .unwrap();

        for &init in main.init_list() {
            assert_eq!(
                rsmv_witness::eval(w, &self.model, ctx, init, 0).unwrap(),
                tru,
                "INIT holds at frame 0"
            );
        }
        for i in 0..w.len() as u64 {
            for &invar in main.invar_list() {
                assert_eq!(
                    rsmv_witness::eval(w, &self.model, ctx, invar, i).unwrap(),
                    tru,
                    "INVAR holds at frame {i}"
                );
            }
            if i + 1 < w.len() as u64 {
                for &trans in main.trans_list() {
                    assert_eq!(
                        rsmv_witness::eval(w, &self.model, ctx, trans, i).unwrap(),
                        tru,
                        "TRANS holds between frames {i} and {}",
                        i + 1
                    );
                }
            }
        }
        assert_eq!(
            rsmv_witness::eval(w, &self.model, ctx, self.expr(target), w.len() as u64 - 1)
                .unwrap(),
            tru,
            "target holds at the last frame"
        );
    }
}

const TOGGLE: &str = "
    MODULE main
    VAR
      x : boolean;
    INIT
      !x;
    TRANS
      next(x) = !x;
";

const TOGGLE_PINNED: &str = "
    MODULE main
    VAR
      x : boolean;
    INIT
      !x;
    TRANS
      next(x) = !x;
    INVAR
      !x;
";

const COUNTER: &str = "
    MODULE main
    VAR
      c : unsigned int(2);
    INIT
      c = 0;
    TRANS
      next(c) = c + 1;
    INVAR
      c < 16;
";

const ROTOR: &str = "
    MODULE main
    VAR
      s : { A, B, C };
    INIT
      s = A;
    TRANS
      s = A ? next(s) = B : (s = B ? next(s) = C : next(s) = A);
";

const EVEN_COUNTER: &str = "
    MODULE main
    VAR
      c : unsigned int(1);
    INIT
      c = 0;
    TRANS
      next(c) = c + 2;
";

#[test]
fn trivially_reachable_toggle() {
    let world = World::new(TOGGLE);
    let outcome = world.decide("x", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Reachable);

    let w = world.witness(&outcome);
    assert_eq!(w.len(), 2);
    assert_eq!(
        world.var_values(&w, "x"),
        vec![world.em.make_false(), world.em.make_true()]
    );
    world.validate_witness(&w, "x");
}

#[test]
fn trivially_unreachable_by_invariant() {
    let world = World::new(TOGGLE_PINNED);
    let outcome = world.decide("x", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Unreachable);
    assert!(outcome.witness_id.is_none());
}

#[test]
fn counter_reaches_ten_in_ten_steps() {
    let world = World::new(COUNTER);
    let outcome = world.decide("c = 10", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Reachable);

    let w = world.witness(&outcome);
    assert_eq!(w.len(), 11);
    let expected: Vec<Expr> = (0..=10).map(|v| world.em.make_iconst(v)).collect();
    assert_eq!(world.var_values(&w, "c"), expected);
    world.validate_witness(&w, "c = 10");
}

#[test]
fn enum_rotor_reaches_its_third_state() {
    let world = World::new(ROTOR);
    let outcome = world.decide("s = C", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Reachable);

    let w = world.witness(&outcome);
    assert_eq!(w.len(), 3);
    assert_eq!(
        world.var_values(&w, "s"),
        vec![
            world.em.make_identifier("A"),
            world.em.make_identifier("B"),
            world.em.make_identifier("C"),
        ]
    );
    world.validate_witness(&w, "s = C");
}

#[test]
fn odd_values_are_unreachable_with_a_uniqueness_proof() {
    let world = World::new(EVEN_COUNTER);
    let outcome = world.decide("c = 3", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Unreachable);
}

#[test]
fn forward_constraint_blocks_the_target() {
    let world = World::new(COUNTER);
    let outcome = world.decide("c = 10", &["c <= 5"], &[]);
    assert_eq!(outcome.status, ReachStatus::Unreachable);

    // removing the constraint reverts the answer
    let outcome = world.decide("c = 10", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Reachable);
}

#[test]
fn global_constraint_binds_both_directions() {
    let world = World::new(COUNTER);
    let outcome = world.decide("c = 10", &[], &["c <= 5"]);
    assert_eq!(outcome.status, ReachStatus::Unreachable);
}

#[test]
fn single_strategies_agree() {
    for config in [
        StrategyConfig {
            forward: true,
            backward: false,
            combined: false,
        },
        StrategyConfig {
            forward: false,
            backward: true,
            combined: false,
        },
        StrategyConfig {
            forward: false,
            backward: false,
            combined: true,
        },
    ] {
        let world = World::new(ROTOR);
        let target = world.expr("s = C");
        let outcome = world
            .reach
            .process(target, &[], &[], &[], config)
            .expect("analysis completes");
        assert_eq!(outcome.status, ReachStatus::Reachable, "{config:?}");
        let w = world.witness(&outcome);
        assert_eq!(w.len(), 3, "{config:?}");

        let world = World::new(EVEN_COUNTER);
        let target = world.expr("c = 5");
        let outcome = world
            .reach
            .process(target, &[], &[], &[], config)
            .expect("analysis completes");
        assert_eq!(outcome.status, ReachStatus::Unreachable, "{config:?}");
    }
}

#[test]
fn consistency_check_detects_empty_initial_states() {
    let world = World::new(TOGGLE);
    let status = check_init_consistency(&world.model, &world.dd, &world.enc, &[]).unwrap();
    assert_eq!(status, ConsistencyStatus::Ok);

    let status =
        check_init_consistency(&world.model, &world.dd, &world.enc, &[world.expr("x")]).unwrap();
    assert_eq!(status, ConsistencyStatus::Ko);
}

#[test]
fn hierarchical_instances_participate_in_the_race() {
    let src = "
        MODULE main
        VAR
          sub : Counter;
        MODULE Counter
        VAR
          c : unsigned int(1);
        INIT
          c = 0;
        TRANS
          next(c) = c + 1;
    ";
    let world = World::new(src);
    let outcome = world.decide("sub.c = 3", &[], &[]);
    assert_eq!(outcome.status, ReachStatus::Reachable);

    let w = world.witness(&outcome);
    assert_eq!(w.len(), 4);
    // instance variables live under their dotted context
    let ctx = world
        .em
        .make_dot(world.em.make_empty(), world.em.make_identifier("sub"));
    let c = world.em.make_identifier("c");
    assert_eq!(
        w.value(FQExpr::new(ctx, c, 3)).unwrap(),
        world.em.make_iconst(3)
    );
}
