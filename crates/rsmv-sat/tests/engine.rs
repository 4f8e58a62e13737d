//! Engine tests driving the whole compile → CNFize → solve pipeline.

use rsmv_compiler::Compiler;
use rsmv_dd::{DdMgr, DdView};
use rsmv_enc::EncodingMgr;
use rsmv_expr::{Expr, ExprMgr, ExprOp, FQExpr, Step};
use rsmv_model::{Model, ModelMgr, Module};
use rsmv_sat::{Engine, Status, MAIN_GROUP};
use rsmv_types::TypeMgr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

struct Fixture {
    em: Arc<ExprMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    model: Arc<ModelMgr>,
}

impl Fixture {
    /// `b : boolean; c : unsigned int(1); s8 : signed int(2)`.
    fn new() -> Self {
        let em = Arc::new(ExprMgr::new());
        let tm = Arc::new(TypeMgr::new());
        let dd = Arc::new(DdMgr::new());
        let enc = Arc::new(EncodingMgr::new(dd.clone(), tm.clone()));
        let model = Arc::new(ModelMgr::new(em.clone(), tm.clone()));

        let mut main = Module::new(em.make_main());
        main.vars.push((em.make_identifier("b"), tm.find_boolean()));
        main.vars
            .push((em.make_identifier("c"), tm.find_unsigned(1)));
        main.vars
            .push((em.make_identifier("s8"), tm.find_signed(2)));

        let mut m = Model::new();
        m.add_module(main).unwrap();
        model.load(m).unwrap();

        Self { em, dd, enc, model }
    }

    fn engine(&self) -> Engine {
        Engine::new(
            "test",
            self.dd.clone(),
            self.enc.clone(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    fn compiler(&self) -> Compiler {
        Compiler::new(self.model.clone(), self.dd.clone(), self.enc.clone())
    }

    /// Compile at time 0 and assert at `time` in the main group.
    fn assert_at(&self, engine: &mut Engine, body: Expr, time: Step) {
        let unit = self
            .compiler()
            .process(self.em.make_empty(), body, 0)
            .unwrap();
        engine.assert_formula(&unit, time, MAIN_GROUP).unwrap();
    }

    /// Read a variable's value at a frame through its time-0 encoding.
    fn read_value(&self, engine: &Engine, var: &str, frame: Step) -> Expr {
        let key = FQExpr::new(self.em.make_empty(), self.em.make_identifier(var), 0);
        let enc = self.enc.find_encoding(key).expect("encoding exists");
        let mut asg = vec![false; self.enc.num_dd_vars() as usize];
        for &bit in enc.bits() {
            let DdView::Node { var, .. } = self.dd.view(bit) else {
                panic!("encoding bit is a variable");
            };
            if let Some(v) = engine.lookup_dd_var(var, frame) {
                asg[var as usize] = engine.model_value(v);
            }
        }
        enc.expr(&asg, &self.dd, &self.em).unwrap()
    }

    fn ident(&self, n: &str) -> Expr {
        self.em.make_identifier(n)
    }

    fn eq(&self, a: Expr, b: Expr) -> Expr {
        self.em.make_binary(ExprOp::Eq, a, b)
    }

    fn num(&self, v: u64) -> Expr {
        self.em.make_numeric(v)
    }
}

#[test]
fn contradiction_is_unsat_tautology_is_sat() {
    let f = Fixture::new();
    let mut e = f.engine();
    let b = f.ident("b");

    let taut = f.em.make_binary(ExprOp::Or, b, f.em.make_unary(ExprOp::Not, b));
    f.assert_at(&mut e, taut, 0);
    assert_eq!(e.solve(), Status::Sat);

    let contra = f.em.make_binary(ExprOp::And, b, f.em.make_unary(ExprOp::Not, b));
    f.assert_at(&mut e, contra, 0);
    assert_eq!(e.solve(), Status::Unsat);
}

#[test]
fn groups_retract_on_inversion() {
    let f = Fixture::new();
    let mut e = f.engine();
    let b = f.ident("b");

    // main: b must hold
    f.assert_at(&mut e, b, 0);
    assert_eq!(e.solve(), Status::Sat);

    // a retractable group demanding !b contradicts
    let g = e.new_group();
    let unit = f
        .compiler()
        .process(f.em.make_empty(), f.em.make_unary(ExprOp::Not, b), 0)
        .unwrap();
    e.assert_formula(&unit, 0, g).unwrap();
    assert_eq!(e.solve(), Status::Unsat);

    // flipping the group's polarity retracts it
    e.invert_last_group();
    assert_eq!(e.solve(), Status::Sat);
}

#[test]
fn adder_microcode_constrains_the_result() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    // c = 2 ∧ next(c) = c + 1
    f.assert_at(&mut e, f.eq(c, f.num(2)), 0);
    let sum = f.em.make_binary(ExprOp::Add, c, f.num(1));
    f.assert_at(&mut e, f.eq(f.em.make_next(c), sum), 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 0), f.em.make_iconst(2));
    assert_eq!(f.read_value(&e, "c", 1), f.em.make_iconst(3));
}

#[test]
fn adder_wraps_at_the_width() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    f.assert_at(&mut e, f.eq(c, f.num(15)), 0);
    let sum = f.em.make_binary(ExprOp::Add, c, f.num(1));
    f.assert_at(&mut e, f.eq(f.em.make_next(c), sum), 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 1), f.em.make_iconst(0));
}

#[test]
fn comparators_bound_the_model() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    let lt = f.em.make_binary(ExprOp::Lt, c, f.num(3));
    let ge = f.em.make_binary(ExprOp::Ge, c, f.num(2));
    f.assert_at(&mut e, lt, 0);
    f.assert_at(&mut e, ge, 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 0), f.em.make_iconst(2));
}

#[test]
fn multiplication_and_bounds_pin_a_root() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    // c*c = 9 ∧ c < 4 → c = 3
    let sq = f.em.make_binary(ExprOp::Mul, c, c);
    f.assert_at(&mut e, f.eq(sq, f.num(9)), 0);
    f.assert_at(&mut e, f.em.make_binary(ExprOp::Lt, c, f.num(4)), 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 0), f.em.make_iconst(3));
}

#[test]
fn division_follows_the_quotient_relation() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    // c / 3 = 2 ∧ c mod 3 = 1 → c = 7
    let q = f.em.make_binary(ExprOp::Div, c, f.num(3));
    let r = f.em.make_binary(ExprOp::Mod, c, f.num(3));
    f.assert_at(&mut e, f.eq(q, f.num(2)), 0);
    f.assert_at(&mut e, f.eq(r, f.num(1)), 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 0), f.em.make_iconst(7));
}

#[test]
fn shifts_move_bits() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    // c = 3 ∧ next(c) = c << 2 → 12
    f.assert_at(&mut e, f.eq(c, f.num(3)), 0);
    let sh = f.em.make_binary(ExprOp::LShift, c, f.num(2));
    f.assert_at(&mut e, f.eq(f.em.make_next(c), sh), 0);

    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 1), f.em.make_iconst(12));
}

#[test]
fn signed_comparison_orders_negatives_first() {
    let f = Fixture::new();
    let mut e = f.engine();
    let s8 = f.ident("s8");

    // s8 < 1 ∧ s8 != 0 ∧ s8 > -5 (0xFB in two's complement nibbles)
    f.assert_at(&mut e, f.em.make_binary(ExprOp::Lt, s8, f.num(1)), 0);
    f.assert_at(&mut e, f.em.make_binary(ExprOp::Ne, s8, f.num(0)), 0);
    let minus5 = f.em.make_unary(ExprOp::Neg, f.num(5));
    f.assert_at(&mut e, f.em.make_binary(ExprOp::Gt, s8, minus5), 0);

    assert_eq!(e.solve(), Status::Sat);
    // the model is one of -4..-1, i.e. 0xFC..0xFF at width 2
    let v = f.read_value(&e, "s8", 0);
    let val = f.em.node(v).value;
    assert!((0xFC..=0xFF).contains(&val), "got {val:#x}");
}

#[test]
fn formulas_relocate_across_time_frames() {
    let f = Fixture::new();
    let mut e = f.engine();
    let c = f.ident("c");

    // the same compiled unit pinned at two frames, plus a uniqueness
    // constraint between them: unsatisfiable
    let unit = f
        .compiler()
        .process(f.em.make_empty(), f.eq(c, f.num(5)), 0)
        .unwrap();
    e.assert_formula(&unit, 0, MAIN_GROUP).unwrap();
    e.assert_formula(&unit, 1, MAIN_GROUP).unwrap();
    assert_eq!(e.solve(), Status::Sat);

    let key = FQExpr::new(f.em.make_empty(), c, 0);
    let enc = f.enc.find_encoding(key).unwrap();
    let bits: Vec<u32> = enc
        .bits()
        .iter()
        .map(|&b| match f.dd.view(b) {
            DdView::Node { var, .. } => var,
            _ => panic!(),
        })
        .collect();
    e.assert_uniqueness(&bits, 0, 1).unwrap();
    assert_eq!(e.solve(), Status::Unsat);
}

#[test]
fn mux_chain_activations_are_exclusive() {
    let f = Fixture::new();
    let mut e = f.engine();
    let b = f.ident("b");
    let c = f.ident("c");

    // c = (b ? 1 : (c < 8 ? 2 : 3)) — an if-then-elif ladder; exactly one
    // activation bit may fire, and the branch it selects must drive c
    let inner = f.em.make_ite(
        f.em.make_binary(ExprOp::Lt, c, f.num(8)),
        f.num(2),
        f.em.make_binary(ExprOp::Add, c, f.num(1)),
    );
    let outer = f.em.make_ite(b, f.num(1), inner);
    let body = f.eq(c, outer);

    let unit = f
        .compiler()
        .process(f.em.make_empty(), body, 0)
        .unwrap();
    assert_eq!(unit.mux.len(), 2);
    e.assert_formula(&unit, 0, MAIN_GROUP).unwrap();

    // force the outer branch
    f.assert_at(&mut e, b, 0);
    assert_eq!(e.solve(), Status::Sat);
    assert_eq!(f.read_value(&e, "c", 0), f.em.make_iconst(1));

    let aux_value = |e: &Engine, aux| {
        let DdView::Node { var, .. } = f.dd.view(aux) else {
            panic!("activation bit is a variable")
        };
        e.lookup_dd_var(var, 0)
            .map(|cnf| e.model_value(cnf))
            .unwrap_or(false)
    };
    let fired: usize = unit
        .mux
        .iter()
        .map(|(_, d)| aux_value(&e, d.aux) as usize)
        .sum();
    assert_eq!(fired, 1, "exactly one branch fires");
}

#[test]
fn interruption_yields_unknown() {
    let f = Fixture::new();
    let flag = Arc::new(AtomicBool::new(true));
    let mut e = Engine::new("interrupted", f.dd.clone(), f.enc.clone(), flag);
    let b = f.ident("b");
    f.assert_at(&mut e, b, 0);
    assert_eq!(e.solve(), Status::Unknown);
}
