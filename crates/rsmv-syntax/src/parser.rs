//! Recursive-descent parser.
//!
//! Produces interned expression trees directly through the expression
//! manager and assembles modules into a [`Model`].

use crate::token::{Token, TokenKind};
use crate::{SyntaxError, SyntaxResult};
use rsmv_expr::{Expr, ExprMgr, ExprOp};
use rsmv_model::{Model, Module};
use rsmv_types::{TypeId, TypeMgr};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    cursor: usize,
    em: &'a ExprMgr,
    tm: &'a TypeMgr,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, em: &'a ExprMgr, tm: &'a TypeMgr) -> Self {
        Self {
            tokens,
            cursor: 0,
            em,
            tm,
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.cursor].kind
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.cursor].clone();
        if self.cursor + 1 < self.tokens.len() {
            self.cursor += 1;
        }
        t
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> SyntaxResult<Token> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            Err(self.error(format!("expected {kind}, found {}", self.peek())))
        }
    }

    /// Require that the whole input was consumed.
    pub fn expect_eof(&mut self) -> SyntaxResult<()> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.error(format!("unexpected trailing input: {}", self.peek())))
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            pos: self.tokens[self.cursor].pos,
        }
    }

    fn ident(&mut self) -> SyntaxResult<Expr> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(self.em.make_identifier(&name))
            }
            other => Err(self.error(format!("expected an identifier, found {other}"))),
        }
    }

    // -- model grammar -----------------------------------------------------

    /// `model := module+`
    pub fn parse_model(&mut self) -> SyntaxResult<Model> {
        let mut model = Model::new();
        while !self.at(&TokenKind::Eof) {
            let module = self.parse_module()?;
            model
                .add_module(module)
                .map_err(|e| self.error(e.to_string()))?;
        }
        if model.is_empty() {
            return Err(self.error("empty model"));
        }
        Ok(model)
    }

    /// `module := MODULE ident section*`
    fn parse_module(&mut self) -> SyntaxResult<Module> {
        self.expect(TokenKind::Module)?;
        let name = self.ident()?;
        let mut module = Module::new(name);

        loop {
            match self.peek() {
                TokenKind::Var => {
                    self.bump();
                    self.parse_var_section(&mut module)?;
                }
                TokenKind::Const => {
                    self.bump();
                    self.parse_const_section(&mut module)?;
                }
                TokenKind::Define => {
                    self.bump();
                    self.parse_define_section(&mut module)?;
                }
                TokenKind::Init => {
                    self.bump();
                    self.parse_predicate_section(|m, e| m.init.push(e), &mut module)?;
                }
                TokenKind::Trans => {
                    self.bump();
                    self.parse_predicate_section(|m, e| m.trans.push(e), &mut module)?;
                }
                TokenKind::Invar => {
                    self.bump();
                    self.parse_predicate_section(|m, e| m.invar.push(e), &mut module)?;
                }
                _ => break,
            }
        }
        Ok(module)
    }

    /// `var_section := (ident ':' type ';')*`
    fn parse_var_section(&mut self, module: &mut Module) -> SyntaxResult<()> {
        while matches!(self.peek(), TokenKind::Ident(_)) {
            let name = self.ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Semi)?;
            module.vars.push((name, ty));
        }
        Ok(())
    }

    /// `const_section := (ident ':=' number ';')*`
    fn parse_const_section(&mut self, module: &mut Module) -> SyntaxResult<()> {
        while matches!(self.peek(), TokenKind::Ident(_)) {
            let name = self.ident()?;
            self.expect(TokenKind::ColonEq)?;
            let negative = self.eat(&TokenKind::Minus);
            let value = match self.bump().kind {
                TokenKind::Number(v) => {
                    if negative {
                        v.wrapping_neg()
                    } else {
                        v
                    }
                }
                other => return Err(self.error(format!("expected a number, found {other}"))),
            };
            self.expect(TokenKind::Semi)?;
            module.consts.push((name, value));
        }
        Ok(())
    }

    /// `define_section := (ident ':=' expr ';')*`
    fn parse_define_section(&mut self, module: &mut Module) -> SyntaxResult<()> {
        while matches!(self.peek(), TokenKind::Ident(_)) {
            let name = self.ident()?;
            self.expect(TokenKind::ColonEq)?;
            let body = self.parse_expr()?;
            self.expect(TokenKind::Semi)?;
            module.defines.push((name, body));
        }
        Ok(())
    }

    /// `predicate_section := (expr ';')*`
    fn parse_predicate_section(
        &mut self,
        push: impl Fn(&mut Module, Expr),
        module: &mut Module,
    ) -> SyntaxResult<()> {
        while !self.at_section_boundary() {
            let pred = self.parse_expr()?;
            self.expect(TokenKind::Semi)?;
            push(module, pred);
        }
        Ok(())
    }

    fn at_section_boundary(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Eof
                | TokenKind::Module
                | TokenKind::Var
                | TokenKind::Const
                | TokenKind::Define
                | TokenKind::Init
                | TokenKind::Trans
                | TokenKind::Invar
        )
    }

    /// `type := boolean | (unsigned|signed) (int '(' N ')' | fxd '(' N ',' F ')')
    ///        | '{' ident (',' ident)* '}' | ident`, with an optional
    /// `'[' N ']'` array suffix.
    fn parse_type(&mut self) -> SyntaxResult<TypeId> {
        let base = match self.peek().clone() {
            TokenKind::Boolean => {
                self.bump();
                self.tm.find_boolean()
            }
            TokenKind::Unsigned | TokenKind::Signed => {
                let signed = self.at(&TokenKind::Signed);
                self.bump();
                match self.bump().kind {
                    TokenKind::Int => {
                        self.expect(TokenKind::LParen)?;
                        let width = self.number()? as u16;
                        self.expect(TokenKind::RParen)?;
                        if signed {
                            self.tm.find_signed(width)
                        } else {
                            self.tm.find_unsigned(width)
                        }
                    }
                    TokenKind::Fxd => {
                        self.expect(TokenKind::LParen)?;
                        let width = self.number()? as u16;
                        self.expect(TokenKind::Comma)?;
                        let fract = self.number()? as u16;
                        self.expect(TokenKind::RParen)?;
                        if signed {
                            self.tm.find_signed_fxd(width, fract)
                        } else {
                            self.tm.find_unsigned_fxd(width, fract)
                        }
                    }
                    other => {
                        return Err(
                            self.error(format!("expected `int` or `fxd`, found {other}"))
                        )
                    }
                }
            }
            TokenKind::LBrace => {
                self.bump();
                let mut literals = vec![self.ident()?];
                while self.eat(&TokenKind::Comma) {
                    literals.push(self.ident()?);
                }
                self.expect(TokenKind::RBrace)?;
                self.tm.find_enum(literals)
            }
            TokenKind::Ident(_) => {
                let module = self.ident()?;
                self.tm.find_instance(module)
            }
            other => return Err(self.error(format!("expected a type, found {other}"))),
        };

        if self.eat(&TokenKind::LBracket) {
            let size = self.number()? as u32;
            self.expect(TokenKind::RBracket)?;
            if size == 0 {
                return Err(self.error("zero-sized array"));
            }
            return Ok(self.tm.find_array(base, size));
        }
        Ok(base)
    }

    fn number(&mut self) -> SyntaxResult<u64> {
        match self.bump().kind {
            TokenKind::Number(v) => Ok(v),
            other => Err(self.error(format!("expected a number, found {other}"))),
        }
    }

    // -- expression grammar (precedence climbing) --------------------------

    /// `expr := implies ('?' expr ':' expr)?`
    pub fn parse_expr(&mut self) -> SyntaxResult<Expr> {
        let cond = self.parse_implies()?;
        if self.eat(&TokenKind::Question) {
            let then = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let els = self.parse_expr()?;
            return Ok(self.em.make_ite(cond, then, els));
        }
        Ok(cond)
    }

    /// right-associative `->`
    fn parse_implies(&mut self) -> SyntaxResult<Expr> {
        let lhs = self.parse_iff()?;
        if self.eat(&TokenKind::Arrow) {
            let rhs = self.parse_implies()?;
            return Ok(self.em.make_binary(ExprOp::Implies, lhs, rhs));
        }
        Ok(lhs)
    }

    fn parse_iff(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_or()?;
        while self.eat(&TokenKind::DArrow) {
            let rhs = self.parse_or()?;
            lhs = self.em.make_binary(ExprOp::Iff, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_xor()?;
        while self.eat(&TokenKind::Pipe) {
            let rhs = self.parse_xor()?;
            lhs = self.em.make_binary(ExprOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_and()?;
        loop {
            let op = match self.peek() {
                TokenKind::XorKw => ExprOp::Xor,
                TokenKind::XnorKw => ExprOp::Xnor,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_and()?;
            lhs = self.em.make_binary(op, lhs, rhs);
        }
    }

    fn parse_and(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_relational()?;
        while self.eat(&TokenKind::Amp) {
            let rhs = self.parse_relational()?;
            lhs = self.em.make_binary(ExprOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    /// non-associative relational operators
    fn parse_relational(&mut self) -> SyntaxResult<Expr> {
        let lhs = self.parse_shift()?;
        let op = match self.peek() {
            TokenKind::Eq => ExprOp::Eq,
            TokenKind::NotEq => ExprOp::Ne,
            TokenKind::Lt => ExprOp::Lt,
            TokenKind::Le => ExprOp::Le,
            TokenKind::Gt => ExprOp::Gt,
            TokenKind::Ge => ExprOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_shift()?;
        Ok(self.em.make_binary(op, lhs, rhs))
    }

    fn parse_shift(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Shl => ExprOp::LShift,
                TokenKind::Shr => ExprOp::RShift,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = self.em.make_binary(op, lhs, rhs);
        }
    }

    fn parse_additive(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => ExprOp::Add,
                TokenKind::Minus => ExprOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = self.em.make_binary(op, lhs, rhs);
        }
    }

    fn parse_multiplicative(&mut self) -> SyntaxResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => ExprOp::Mul,
                TokenKind::Slash => ExprOp::Div,
                TokenKind::Percent => ExprOp::Mod,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = self.em.make_binary(op, lhs, rhs);
        }
    }

    fn parse_unary(&mut self) -> SyntaxResult<Expr> {
        match self.peek() {
            TokenKind::Bang => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(self.em.make_unary(ExprOp::Not, operand))
            }
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(self.em.make_unary(ExprOp::Neg, operand))
            }
            _ => self.parse_postfix(),
        }
    }

    /// `postfix := segment ('.' segment)*`, nesting dots to the right: the
    /// left side of a dot is always one scope step
    fn parse_postfix(&mut self) -> SyntaxResult<Expr> {
        let mut segments = vec![self.parse_segment()?];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.parse_segment()?);
        }
        let mut e = segments.pop().expect("at least one segment");
        while let Some(scope) = segments.pop() {
            e = self.em.make_dot(scope, e);
        }
        Ok(e)
    }

    /// `segment := primary ('[' expr ']')*`
    fn parse_segment(&mut self) -> SyntaxResult<Expr> {
        let mut e = self.parse_primary()?;
        while self.eat(&TokenKind::LBracket) {
            let index = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            e = self.em.make_subscript(e, index);
        }
        Ok(e)
    }

    fn parse_primary(&mut self) -> SyntaxResult<Expr> {
        match self.peek().clone() {
            TokenKind::Number(v) => {
                self.bump();
                Ok(self.em.make_numeric(v))
            }
            TokenKind::True => {
                self.bump();
                Ok(self.em.make_true())
            }
            TokenKind::False => {
                self.bump();
                Ok(self.em.make_false())
            }
            TokenKind::Next => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.em.make_next(inner))
            }
            TokenKind::Prev => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.em.make_prev(inner))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(_) => self.ident(),
            other => Err(self.error(format!("expected an expression, found {other}"))),
        }
    }
}
