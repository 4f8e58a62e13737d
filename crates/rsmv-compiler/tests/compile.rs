//! Compiler integration tests: operand families, memoization, side tables.

use rsmv_compiler::{group_chains, CompilationUnit, Compiler, CompilerError};
use rsmv_dd::DdMgr;
use rsmv_enc::EncodingMgr;
use rsmv_expr::{Expr, ExprMgr, ExprOp};
use rsmv_model::{Model, ModelMgr, Module};
use rsmv_types::TypeMgr;
use std::sync::Arc;

struct Fixture {
    em: Arc<ExprMgr>,
    dd: Arc<DdMgr>,
    enc: Arc<EncodingMgr>,
    model: Arc<ModelMgr>,
}

impl Fixture {
    /// A main module with one variable of each operand family:
    /// `b : boolean; c : unsigned int(1); w : unsigned int(2);
    /// s : { A, B, C }; arr : unsigned int(1)[3]`.
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
            .push((em.make_identifier("w"), tm.find_unsigned(2)));
        main.vars.push((
            em.make_identifier("s"),
            tm.find_enum(vec![
                em.make_identifier("A"),
                em.make_identifier("B"),
                em.make_identifier("C"),
            ]),
        ));
        main.vars.push((
            em.make_identifier("arr"),
            tm.find_array(tm.find_unsigned(1), 3),
        ));
        let double_c = em.make_binary(
            ExprOp::Add,
            em.make_identifier("c"),
            em.make_identifier("c"),
        );
        main.defines.push((em.make_identifier("dbl"), double_c));

        let mut m = Model::new();
        m.add_module(main).unwrap();
        model.load(m).unwrap();

        Self {
            em,
            dd,
            enc,
            model,
        }
    }

    fn compiler(&self) -> Compiler {
        Compiler::new(self.model.clone(), self.dd.clone(), self.enc.clone())
    }

    fn compile(&self, body: Expr) -> CompilationUnit {
        self.compiler()
            .process(self.em.make_empty(), body, 0)
            .unwrap()
    }

    fn ident(&self, n: &str) -> Expr {
        self.em.make_identifier(n)
    }
}

#[test]
fn boolean_formula_compiles_to_one_predicate() {
    let f = Fixture::new();
    let b = f.ident("b");
    let body = f.em.make_binary(ExprOp::And, b, f.em.make_unary(ExprOp::Not, b));
    let unit = f.compile(body);

    assert_eq!(unit.dds.len(), 1);
    assert!(unit.micros.is_empty());
    assert!(unit.mux.is_empty());
    // b & !b is identically false
    assert_eq!(f.dd.value(unit.dds[0]), Some(0));
}

#[test]
fn algebraic_arithmetic_defers_to_microcode() {
    let f = Fixture::new();
    let c = f.ident("c");
    let sum = f.em.make_binary(ExprOp::Add, c, f.em.make_numeric(1));
    let body = f.em.make_binary(ExprOp::Eq, sum, f.em.make_numeric(3));
    let unit = f.compile(body);

    // one adder descriptor plus one relational descriptor
    assert_eq!(unit.micros.len(), 2);
    let add = &unit.micros[0];
    assert_eq!(add.triple.op, ExprOp::Add);
    assert_eq!(add.triple.width, 1);
    assert!(add.is_binary());
    // the literal operand was expanded to constant digits
    assert_eq!(f.dd.value(add.y[0]), Some(1));

    let rel = &unit.micros[1];
    assert_eq!(rel.triple.op, ExprOp::Eq);
    assert!(rel.is_relational());
    assert_eq!(rel.z.len(), 1);

    // the toplevel result is the relational result bit
    assert_eq!(unit.dds.len(), 1);
    assert_eq!(unit.dds[0], rel.z[0]);
}

#[test]
fn relational_on_wide_operand_keeps_width() {
    let f = Fixture::new();
    let w = f.ident("w");
    let body = f.em.make_binary(ExprOp::Lt, w, f.em.make_numeric(0x25));
    let unit = f.compile(body);

    assert_eq!(unit.micros.len(), 1);
    let rel = &unit.micros[0];
    assert_eq!(rel.triple.width, 2);
    assert_eq!(rel.x.len(), 2);
    // constant digits are little-endian base-16
    assert_eq!(f.dd.value(rel.y[0]), Some(5));
    assert_eq!(f.dd.value(rel.y[1]), Some(2));
}

#[test]
fn mixed_width_operand_is_zero_extended() {
    let f = Fixture::new();
    let c = f.ident("c");
    let w = f.ident("w");
    let sum = f.em.make_binary(ExprOp::Add, c, w);
    let body = f.em.make_binary(ExprOp::Eq, sum, f.em.make_numeric(0));
    let unit = f.compile(body);

    let add = &unit.micros[0];
    assert_eq!(add.triple.width, 2);
    assert_eq!(add.x.len(), 2);
    // the extension digit of the narrow operand is the zero terminal
    assert_eq!(f.dd.value(add.x[1]), Some(0));
}

#[test]
fn two_constants_have_no_width() {
    let f = Fixture::new();
    let body = f.em.make_binary(
        ExprOp::Eq,
        f.em.make_numeric(1),
        f.em.make_numeric(1),
    );
    let err = f
        .compiler()
        .process(f.em.make_empty(), body, 0)
        .unwrap_err();
    assert!(matches!(err, CompilerError::AmbiguousConstantWidth));
}

#[test]
fn enum_supports_relational_only() {
    let f = Fixture::new();
    let s = f.ident("s");
    let a = f.ident("A");

    let eq = f.em.make_binary(ExprOp::Eq, s, a);
    let unit = f.compile(eq);
    assert_eq!(unit.dds.len(), 1);
    assert!(unit.micros.is_empty());

    let bad = f.em.make_binary(ExprOp::Add, s, a);
    let err = f
        .compiler()
        .process(f.em.make_empty(), bad, 0)
        .unwrap_err();
    assert!(matches!(err, CompilerError::TypeError(_)));
}

#[test]
fn algebraic_ite_builds_a_mux_chain() {
    let f = Fixture::new();
    let b = f.ident("b");
    let c = f.ident("c");
    // b ? c + 1 : 0
    let sum = f.em.make_binary(ExprOp::Add, c, f.em.make_numeric(1));
    let ite = f.em.make_ite(b, sum, f.em.make_numeric(0));
    let body = f.em.make_binary(ExprOp::Eq, ite, f.em.make_numeric(2));
    let unit = f.compile(body);

    assert_eq!(unit.mux.len(), 1);
    let (_, d) = &unit.mux[0];
    assert_eq!(d.width, 1);
    assert_eq!(d.x.len(), 1);
    assert_eq!(f.dd.value(d.y[0]), Some(0));

    // the activation conjunct rides along as an extra toplevel diagram
    assert_eq!(unit.dds.len(), 2);
}

#[test]
fn else_ladder_shares_one_chain_with_exclusive_activations() {
    let f = Fixture::new();
    let b = f.ident("b");
    let c = f.ident("c");
    let s = f.ident("s");
    let a_lit = f.ident("A");

    // b ? 1 : (s = A ? c : 3) — an if-then-elif ladder over nibble values
    let inner = f.em.make_ite(
        f.em.make_binary(ExprOp::Eq, s, a_lit),
        c,
        f.em.make_numeric(3),
    );
    let outer = f.em.make_ite(b, f.em.make_numeric(1), inner);
    let body = f.em.make_binary(ExprOp::Eq, c, outer);
    let unit = f.compile(body);

    assert_eq!(unit.mux.len(), 2);
    let chains = group_chains(&unit.mux);
    assert_eq!(chains.len(), 1, "else-nested ITEs share a chain");
    assert_eq!(chains[0].1.len(), 2);

    // toplevel: relational result + two activation conjuncts
    assert_eq!(unit.dds.len(), 3);
}

#[test]
fn then_nested_ite_opens_its_own_chain() {
    let f = Fixture::new();
    let b = f.ident("b");
    let c = f.ident("c");
    let s = f.ident("s");
    let a_lit = f.ident("A");

    let inner = f.em.make_ite(
        f.em.make_binary(ExprOp::Eq, s, a_lit),
        c,
        f.em.make_numeric(3),
    );
    let outer = f.em.make_ite(b, inner, f.em.make_numeric(1));
    let body = f.em.make_binary(ExprOp::Eq, c, outer);
    let unit = f.compile(body);

    let chains = group_chains(&unit.mux);
    assert_eq!(chains.len(), 2, "then-nested ITE starts a fresh chain");
}

#[test]
fn cache_replays_the_same_stack_effect() {
    let f = Fixture::new();
    let c = f.ident("c");
    let sum = f.em.make_binary(ExprOp::Add, c, f.em.make_numeric(1));
    let lhs = f.em.make_binary(ExprOp::Eq, sum, f.em.make_numeric(2));
    let rhs = f.em.make_binary(ExprOp::Eq, sum, f.em.make_numeric(2));
    // identical subtrees: the second occurrence must hit the cache
    let body = f.em.make_binary(ExprOp::And, lhs, rhs);
    let unit = f.compile(body);

    // the adder and the comparison each appear twice: once compiled, once
    // replayed from the cache with identical result digits
    assert_eq!(unit.micros.len(), 4);
    assert_eq!(unit.micros[0].z, unit.micros[2].z);
    assert_eq!(unit.micros[1].z, unit.micros[3].z);
}

#[test]
fn preprocess_mode_skips_memoization() {
    let f = Fixture::new();
    let c = f.ident("c");
    let sum = f.em.make_binary(ExprOp::Add, c, f.em.make_numeric(1));
    let cmp = f.em.make_binary(ExprOp::Eq, sum, f.em.make_numeric(2));
    let body = f.em.make_binary(ExprOp::And, cmp, cmp);

    let mut comp = f.compiler();
    comp.set_preprocess(true);
    let unit = comp.process(f.em.make_empty(), body, 0).unwrap();

    // without the cache both occurrences compile fresh: the adders get
    // distinct result digits instead of a replayed vector
    assert_eq!(unit.micros.len(), 4);
    assert_ne!(unit.micros[0].z, unit.micros[2].z);
}

#[test]
fn fresh_compilations_are_deterministic() {
    let f = Fixture::new();
    let c = f.ident("c");
    let body = f.em.make_binary(
        ExprOp::And,
        f.em.make_binary(ExprOp::Lt, c, f.em.make_numeric(3)),
        f.ident("b"),
    );

    let mut comp = f.compiler();
    let cold = comp.process(f.em.make_empty(), body, 0).unwrap();
    // same compiler, same key: encodings are reused, structure identical
    let warm = comp.process(f.em.make_empty(), body, 0).unwrap();

    assert_eq!(cold.dds.len(), warm.dds.len());
    assert_eq!(cold.micros.len(), warm.micros.len());
    for (a, b) in cold.micros.iter().zip(warm.micros.iter()) {
        assert_eq!(a.triple, b.triple);
        assert_eq!(a.x.len(), b.x.len());
    }
}

#[test]
fn define_compiles_through_its_body() {
    let f = Fixture::new();
    let dbl = f.ident("dbl");
    let body = f.em.make_binary(ExprOp::Eq, dbl, f.em.make_numeric(4));
    let unit = f.compile(body);

    // dbl := c + c expands to an adder descriptor
    assert_eq!(unit.micros.len(), 2);
    assert_eq!(unit.micros[0].triple.op, ExprOp::Add);
}

#[test]
fn next_shifts_the_encoding_time() {
    let f = Fixture::new();
    let c = f.ident("c");
    let body = f.em.make_binary(ExprOp::Eq, f.em.make_next(c), c);
    f.compile(body);

    let ctx = f.em.make_empty();
    assert!(f
        .enc
        .find_encoding(rsmv_expr::FQExpr::new(ctx, c, 0))
        .is_some());
    assert!(f
        .enc
        .find_encoding(rsmv_expr::FQExpr::new(ctx, c, 1))
        .is_some());
}

#[test]
fn variable_encodings_are_stable_across_compilations() {
    let f = Fixture::new();
    let c = f.ident("c");
    let ctx = f.em.make_empty();
    let body = f.em.make_binary(ExprOp::Lt, c, f.em.make_numeric(3));

    f.compile(body);
    let first = f.enc.find_encoding(rsmv_expr::FQExpr::new(ctx, c, 0)).unwrap();
    f.compile(body);
    let second = f.enc.find_encoding(rsmv_expr::FQExpr::new(ctx, c, 0)).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn constant_subscript_selects_the_element() {
    let f = Fixture::new();
    let arr = f.ident("arr");
    let pick = f.em.make_subscript(arr, f.em.make_numeric(1));
    let body = f.em.make_binary(ExprOp::Eq, pick, f.em.make_numeric(7));
    let unit = f.compile(body);

    assert_eq!(unit.micros.len(), 1);
    assert!(unit.micros[0].is_relational());

    let oob = f.em.make_subscript(arr, f.em.make_numeric(9));
    let body = f.em.make_binary(ExprOp::Eq, oob, f.em.make_numeric(0));
    assert!(f.compiler().process(f.em.make_empty(), body, 0).is_err());
}

#[test]
fn temporal_operators_are_rejected() {
    let f = Fixture::new();
    let g = f.em.make_unary(ExprOp::G, f.ident("b"));
    let err = f.compiler().process(f.em.make_empty(), g, 0).unwrap_err();
    assert!(matches!(err, CompilerError::UnsupportedOpInFamily(_)));
}

#[test]
fn unresolved_symbols_are_reported() {
    let f = Fixture::new();
    let body = f.em.make_binary(ExprOp::And, f.ident("b"), f.ident("ghost"));
    let err = f
        .compiler()
        .process(f.em.make_empty(), body, 0)
        .unwrap_err();
    assert!(matches!(err, CompilerError::UnresolvedSymbol { .. }));
}

#[test]
fn algebraic_negation_emits_a_unary_descriptor() {
    let f = Fixture::new();
    let c = f.ident("c");
    let neg = f.em.make_unary(ExprOp::Neg, c);
    let body = f.em.make_binary(ExprOp::Eq, neg, f.em.make_numeric(0xF));
    let unit = f.compile(body);

    assert_eq!(unit.micros.len(), 2);
    assert_eq!(unit.micros[0].triple.op, ExprOp::Neg);
    assert!(unit.micros[0].is_unary());
}
