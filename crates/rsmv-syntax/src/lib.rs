//! Lexer and parser for the modelling language.
//!
//! The dialect is SMV-flavored: a model is a set of modules with typed
//! variables, `DEFINE` macros, named constants and INIT/TRANS/INVAR
//! predicate sections. Expressions are interned straight into the
//! expression manager, so parsing the same text twice yields identical
//! handles.
//!
//! ```text
//! MODULE main
//! VAR
//!   c : unsigned int(1);
//!   s : { IDLE, BUSY };
//! INIT
//!   c = 0;
//! TRANS
//!   next(c) = c + 1;
//! INVAR
//!   c < 10;
//! ```

mod lexer;
mod parser;
mod token;

pub use token::{Pos, Token, TokenKind};

use lexer::Lexer;
use parser::Parser;
use rsmv_expr::{Expr, ExprMgr};
use rsmv_model::Model;
use rsmv_types::TypeMgr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("syntax error at {pos}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub pos: Pos,
}

pub type SyntaxResult<T> = Result<T, SyntaxError>;

/// Parse a full model.
pub fn parse_model(source: &str, em: &ExprMgr, tm: &TypeMgr) -> SyntaxResult<Model> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens, em, tm).parse_model()
}

/// Parse a single expression (targets and constraints on the command
/// line).
pub fn parse_expression(source: &str, em: &ExprMgr, tm: &TypeMgr) -> SyntaxResult<Expr> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser::new(tokens, em, tm);
    let expr = parser.parse_expr()?;
    parser.expect_eof()?;
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsmv_expr::ExprOp;
    use rsmv_types::TypeKind;

    fn managers() -> (ExprMgr, TypeMgr) {
        (ExprMgr::new(), TypeMgr::new())
    }

    #[test]
    fn parses_a_counter_model() {
        let (em, tm) = managers();
        let src = "
            MODULE main
            VAR
              c : unsigned int(1);
            INIT
              c = 0;
            TRANS
              next(c) = c + 1;
            INVAR
              c < 10;
        ";
        let model = parse_model(src, &em, &tm).unwrap();
        let main = model.module(em.make_main()).unwrap();
        assert_eq!(main.vars.len(), 1);
        assert_eq!(main.vars[0].1, tm.find_unsigned(1));
        assert_eq!(main.init.len(), 1);
        assert_eq!(main.trans.len(), 1);
        assert_eq!(main.invar.len(), 1);

        // the transition relation is next(c) = c + 1
        let trans = em.node(main.trans[0]);
        assert_eq!(trans.op, ExprOp::Eq);
        assert_eq!(em.op(trans.lhs), ExprOp::Next);
    }

    #[test]
    fn parses_every_type_form() {
        let (em, tm) = managers();
        let src = "
            MODULE main
            VAR
              b : boolean;
              u : unsigned int(2);
              s : signed int(1);
              f : signed fxd(2, 1);
              e : { A, B, C };
              a : unsigned int(1)[4];
              sub : Child;
            MODULE Child
            VAR
              x : boolean;
        ";
        let model = parse_model(src, &em, &tm).unwrap();
        let main = model.module(em.make_main()).unwrap();
        assert_eq!(main.vars[0].1, tm.find_boolean());
        assert_eq!(main.vars[1].1, tm.find_unsigned(2));
        assert_eq!(main.vars[2].1, tm.find_signed(1));
        assert_eq!(main.vars[3].1, tm.find_signed_fxd(2, 1));
        assert!(matches!(tm.kind(main.vars[4].1), TypeKind::Enum { .. }));
        assert_eq!(
            main.vars[5].1,
            tm.find_array(tm.find_unsigned(1), 4)
        );
        assert_eq!(
            main.vars[6].1,
            tm.find_instance(em.make_identifier("Child"))
        );
    }

    #[test]
    fn expression_precedence_matches_the_printer() {
        let (em, tm) = managers();
        for src in [
            "a + b * c",
            "(a + b) * c",
            "a < 3 & b = 0 | x",
            "x -> y -> z",
            "c = 0 ? 1 : c + 1",
            "!x & y xor z",
            "sub.inner.c + 1",
            "arr[2] = 5",
            "next(c) >= prev(c) << 1",
        ] {
            let e = parse_expression(src, &em, &tm).unwrap();
            // reparsing the printed form must land on the same node
            let printed = em.print(e);
            let again = parse_expression(&printed, &em, &tm).unwrap();
            assert_eq!(e, again, "round-trip of `{src}` via `{printed}`");
        }
    }

    #[test]
    fn implies_is_right_associative() {
        let (em, tm) = managers();
        let e = parse_expression("x -> y -> z", &em, &tm).unwrap();
        let node = em.node(e);
        assert_eq!(node.op, ExprOp::Implies);
        assert_eq!(em.op(node.rhs), ExprOp::Implies);
    }

    #[test]
    fn dots_nest_to_the_right() {
        let (em, tm) = managers();
        let e = parse_expression("a.b.c", &em, &tm).unwrap();
        let node = em.node(e);
        assert_eq!(node.op, ExprOp::Dot);
        assert_eq!(em.ident_name(node.lhs).unwrap(), "a");
        assert_eq!(em.op(node.rhs), ExprOp::Dot);
    }

    #[test]
    fn defines_and_constants_parse() {
        let (em, tm) = managers();
        let src = "
            MODULE main
            VAR
              c : unsigned int(1);
            CONST
              LIMIT := 10;
            DEFINE
              succ := c + 1;
            INVAR
              c < LIMIT;
        ";
        let model = parse_model(src, &em, &tm).unwrap();
        let main = model.module(em.make_main()).unwrap();
        assert_eq!(main.consts, vec![(em.make_identifier("LIMIT"), 10)]);
        assert_eq!(main.defines.len(), 1);
    }

    #[test]
    fn errors_carry_positions() {
        let (em, tm) = managers();
        let err = parse_model("MODULE main\nVAR x boolean;", &em, &tm).unwrap_err();
        assert_eq!(err.pos.line, 2);
        assert!(err.message.contains("expected"));
    }

    #[test]
    fn trailing_input_is_rejected_for_expressions() {
        let (em, tm) = managers();
        assert!(parse_expression("a + b extra", &em, &tm).is_err());
        assert!(parse_expression("", &em, &tm).is_err());
    }
}
