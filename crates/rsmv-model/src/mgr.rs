//! Model manager: ownership of the loaded model, symbol resolution,
//! temporaries.

use crate::{Model, ModelError, ModelResult, Module, Symbol, SymbolKind};
use rsmv_expr::{Expr, ExprMgr, ExprOp};
use rsmv_types::{TypeId, TypeMgr};
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Owns the loaded [`Model`] and resolves `(context, identifier)` pairs to
/// [`Symbol`] records.
///
/// Resolution order: local scope of the context's module, then enclosing
/// contexts (one dotted segment at a time), then globals (compiler
/// temporaries).
pub struct ModelMgr {
    em: Arc<ExprMgr>,
    tm: Arc<TypeMgr>,
    model: RwLock<Option<Model>>,
    /// Global auto-generated temporaries, keyed by identifier.
    temporaries: RwLock<FxHashMap<Expr, Symbol>>,
    /// Process-wide counter for auto identifiers; temporaries from distinct
    /// compilers must never collide in the encoding registry.
    temp_counter: AtomicU32,
    /// Inference cache, keyed on (ctx, expr).
    pub(crate) type_cache: Mutex<FxHashMap<(Expr, Expr), TypeId>>,
}

impl ModelMgr {
    pub fn new(em: Arc<ExprMgr>, tm: Arc<TypeMgr>) -> Self {
        Self {
            em,
            tm,
            model: RwLock::new(None),
            temporaries: RwLock::new(FxHashMap::default()),
            temp_counter: AtomicU32::new(0),
            type_cache: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn em(&self) -> &Arc<ExprMgr> {
        &self.em
    }

    pub fn tm(&self) -> &Arc<TypeMgr> {
        &self.tm
    }

    /// Install a model, replacing any previous one, and analyze it: every
    /// INIT/TRANS/INVAR predicate of every reachable module must type-check
    /// as boolean.
    pub fn load(&self, model: Model) -> ModelResult<()> {
        *self.model.write().unwrap() = Some(model);
        self.temporaries.write().unwrap().clear();
        self.type_cache.lock().unwrap().clear();
        self.analyze()
    }

    fn analyze(&self) -> ModelResult<()> {
        let model = self.model.read().unwrap();
        let model = model.as_ref().ok_or(ModelError::ModelNotLoaded)?;

        let main = self.em.make_main();
        if model.module(main).is_none() {
            return Err(ModelError::UnknownModule("main".into()));
        }

        let empty = self.em.make_empty();
        self.analyze_module(model, main, empty)
    }

    fn analyze_module(&self, model: &Model, name: Expr, ctx: Expr) -> ModelResult<()> {
        let module = model
            .module(name)
            .ok_or_else(|| ModelError::UnknownModule(self.em.print(name)))?
            .clone();

        for section in [&module.init, &module.trans, &module.invar] {
            for &pred in section {
                let ty = self.type_of(pred, ctx)?;
                if !self.tm.is_boolean(ty) {
                    return Err(ModelError::TypeError(format!(
                        "predicate `{}` is not boolean",
                        self.em.print(pred)
                    )));
                }
            }
        }

        // recurse into instances, extending the context path
        for (var, ty) in &module.vars {
            if let rsmv_types::TypeKind::Instance { module: sub } = self.tm.kind(*ty) {
                let sub_ctx = self.em.make_dot(ctx, *var);
                self.analyze_module(model, sub, sub_ctx)?;
            }
        }

        debug!(module = %self.em.print(name), "module analyzed");
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().unwrap().is_some()
    }

    /// Run a closure against the loaded model.
    pub fn with_model<R>(&self, f: impl FnOnce(&Model) -> R) -> ModelResult<R> {
        let model = self.model.read().unwrap();
        let model = model.as_ref().ok_or(ModelError::ModelNotLoaded)?;
        Ok(f(model))
    }

    /// The module a context path denotes. The empty context is `main`;
    /// `ctx.sub` follows the `sub` instance variable of `ctx`'s module.
    pub fn scope(&self, ctx: Expr) -> ModelResult<Module> {
        let model = self.model.read().unwrap();
        let model = model.as_ref().ok_or(ModelError::ModelNotLoaded)?;
        self.scope_in(model, ctx)
    }

    fn scope_in(&self, model: &Model, ctx: Expr) -> ModelResult<Module> {
        let node = self.em.node(ctx);
        let module_name = match node.op {
            ExprOp::Ident if ctx == self.em.make_empty() || ctx == self.em.make_main() => {
                self.em.make_main()
            }
            ExprOp::Dot => {
                let parent = self.scope_in(model, node.lhs)?;
                match parent.lookup_var(node.rhs).map(|t| self.tm.kind(t)) {
                    Some(rsmv_types::TypeKind::Instance { module }) => module,
                    _ => {
                        return Err(ModelError::UnresolvedSymbol {
                            ctx: self.em.print(node.lhs),
                            name: self.em.print(node.rhs),
                        })
                    }
                }
            }
            _ => {
                return Err(ModelError::UnknownModule(self.em.print(ctx)));
            }
        };

        model
            .module(module_name)
            .cloned()
            .ok_or_else(|| ModelError::UnknownModule(self.em.print(module_name)))
    }

    /// Resolve an identifier in a context to a symbol record.
    pub fn fetch_symbol(&self, ctx: Expr, name: Expr) -> ModelResult<Symbol> {
        let mut cur = ctx;
        loop {
            if let Some(sym) = self.lookup_local(cur, name)? {
                return Ok(sym);
            }
            // enclosing context: drop the last dotted segment
            let node = self.em.node(cur);
            if node.op == ExprOp::Dot {
                cur = node.lhs;
                continue;
            }
            break;
        }

        // globals: compiler temporaries
        if let Some(sym) = self.temporaries.read().unwrap().get(&name) {
            return Ok(sym.clone());
        }

        Err(ModelError::UnresolvedSymbol {
            ctx: self.em.print(ctx),
            name: self.em.print(name),
        })
    }

    fn lookup_local(&self, ctx: Expr, name: Expr) -> ModelResult<Option<Symbol>> {
        let module = match self.scope(ctx) {
            Ok(m) => m,
            Err(ModelError::ModelNotLoaded) => return Err(ModelError::ModelNotLoaded),
            Err(_) => return Ok(None),
        };

        if let Some(ty) = module.lookup_var(name) {
            return Ok(Some(Symbol {
                ctx,
                name,
                kind: SymbolKind::Variable { ty },
            }));
        }

        if let Some((_, body)) = module.defines.iter().find(|(n, _)| *n == name) {
            return Ok(Some(Symbol {
                ctx,
                name,
                kind: SymbolKind::Define { body: *body },
            }));
        }

        if let Some((_, value)) = module.consts.iter().find(|(n, _)| *n == name) {
            return Ok(Some(Symbol {
                ctx,
                name,
                kind: SymbolKind::Constant {
                    ty: self.tm.find_int_const(),
                    value: *value,
                },
            }));
        }

        // enum literals of any variable's enum type
        for (_, ty) in &module.vars {
            if let Some(lits) = self.tm.enum_literals(*ty) {
                if let Some(pos) = lits.iter().position(|&l| l == name) {
                    return Ok(Some(Symbol {
                        ctx,
                        name,
                        kind: SymbolKind::Literal {
                            ty: *ty,
                            value: pos as u64,
                        },
                    }));
                }
            }
        }

        Ok(None)
    }

    /// Fresh index for an auto-generated identifier.
    pub fn next_temp_index(&self) -> u32 {
        self.temp_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a compiler-generated global temporary.
    pub fn add_temporary(&self, name: Expr, ty: TypeId) {
        let sym = Symbol {
            ctx: self.em.make_empty(),
            name,
            kind: SymbolKind::Temporary { ty },
        };
        self.temporaries.write().unwrap().insert(name, sym);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<ExprMgr>, Arc<TypeMgr>, ModelMgr) {
        let em = Arc::new(ExprMgr::new());
        let tm = Arc::new(TypeMgr::new());
        let mm = ModelMgr::new(em.clone(), tm.clone());
        (em, tm, mm)
    }

    fn tiny_model(em: &ExprMgr, tm: &TypeMgr) -> Model {
        let mut main = Module::new(em.make_main());
        let x = em.make_identifier("x");
        main.vars.push((x, tm.find_boolean()));
        main.init.push(em.make_unary(ExprOp::Not, x));

        let mut model = Model::new();
        model.add_module(main).unwrap();
        model
    }

    #[test]
    fn resolves_local_variable() {
        let (em, tm, mm) = setup();
        mm.load(tiny_model(&em, &tm)).unwrap();

        let sym = mm
            .fetch_symbol(em.make_empty(), em.make_identifier("x"))
            .unwrap();
        assert!(sym.is_variable());
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        let (em, tm, mm) = setup();
        mm.load(tiny_model(&em, &tm)).unwrap();

        let err = mm
            .fetch_symbol(em.make_empty(), em.make_identifier("nope"))
            .unwrap_err();
        assert!(matches!(err, ModelError::UnresolvedSymbol { .. }));
    }

    #[test]
    fn resolves_through_instance_contexts() {
        let (em, tm, mm) = setup();

        let counter = em.make_identifier("Counter");
        let mut sub = Module::new(counter);
        let c = em.make_identifier("c");
        sub.vars.push((c, tm.find_unsigned(1)));

        let mut main = Module::new(em.make_main());
        let inst = em.make_identifier("inner");
        main.vars.push((inst, tm.find_instance(counter)));

        let mut model = Model::new();
        model.add_module(main).unwrap();
        model.add_module(sub).unwrap();
        mm.load(model).unwrap();

        let ctx = em.make_dot(em.make_empty(), inst);
        let sym = mm.fetch_symbol(ctx, c).unwrap();
        assert!(sym.is_variable());

        // enclosing-scope fallback: `inner` itself resolves from the sub ctx
        let sym = mm.fetch_symbol(ctx, inst).unwrap();
        assert!(sym.is_variable());
    }

    #[test]
    fn temporaries_resolve_globally() {
        let (em, tm, mm) = setup();
        mm.load(tiny_model(&em, &tm)).unwrap();

        let t = em.make_identifier("__tmp0");
        mm.add_temporary(t, tm.find_boolean());
        let sym = mm.fetch_symbol(em.make_empty(), t).unwrap();
        assert!(matches!(sym.kind, SymbolKind::Temporary { .. }));
    }

    #[test]
    fn enum_literals_resolve_with_positions() {
        let (em, tm, mm) = setup();

        let mut main = Module::new(em.make_main());
        let s = em.make_identifier("s");
        let lits = vec![
            em.make_identifier("A"),
            em.make_identifier("B"),
            em.make_identifier("C"),
        ];
        let ty = tm.find_enum(lits.clone());
        main.vars.push((s, ty));

        let mut model = Model::new();
        model.add_module(main).unwrap();
        mm.load(model).unwrap();

        let sym = mm.fetch_symbol(em.make_empty(), lits[2]).unwrap();
        match sym.kind {
            SymbolKind::Literal { value, .. } => assert_eq!(value, 2),
            other => panic!("expected literal, got {other:?}"),
        }
    }
}
