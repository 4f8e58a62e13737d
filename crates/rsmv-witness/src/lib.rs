//! Witness traces.
//!
//! A [`Witness`] is an ordered sequence of time frames; each frame maps
//! fully-qualified timed expressions to value expressions. The
//! [`WitnessMgr`] registers witnesses under auto-generated identifiers and
//! tracks the *current* one for evaluation queries.

mod eval;

pub use eval::eval;

use rsmv_expr::{Expr, FQExpr};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WitnessError {
    #[error("no value recorded for the requested key")]
    NoValue,

    #[error("unknown witness `{0}`")]
    UnknownWitness(String),

    #[error("expression cannot be evaluated: {0}")]
    Unsupported(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type WitnessResult<T> = Result<T, WitnessError>;

/// One time frame: value assignments for a single step.
#[derive(Clone, Debug, Default)]
pub struct TimeFrame {
    map: FxHashMap<FQExpr, Expr>,
}

impl TimeFrame {
    /// The value bound to `key`.
    pub fn value(&self, key: FQExpr) -> WitnessResult<Expr> {
        self.map.get(&key).copied().ok_or(WitnessError::NoValue)
    }

    pub fn has_value(&self, key: FQExpr) -> bool {
        self.map.contains_key(&key)
    }

    /// Bind a value. Frames are append-only: a key, once set, keeps its
    /// first value.
    pub fn set_value(&mut self, key: FQExpr, value: Expr) {
        self.map.entry(key).or_insert(value);
    }

    /// Iterate over the recorded assignments.
    pub fn entries(&self) -> impl Iterator<Item = (&FQExpr, &Expr)> {
        self.map.iter()
    }
}

/// A multi-frame trace.
#[derive(Clone, Debug)]
pub struct Witness {
    id: String,
    desc: String,
    frames: Vec<TimeFrame>,
}

impl Witness {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            desc: String::new(),
            frames: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_desc(&mut self, desc: impl Into<String>) {
        self.desc = desc.into();
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Append a fresh frame and hand it out for filling.
    pub fn new_frame(&mut self) -> &mut TimeFrame {
        self.frames.push(TimeFrame::default());
        debug!(witness = %self.id, frame = self.frames.len() - 1, "added time frame");
        self.frames.last_mut().expect("just pushed")
    }

    pub fn frame(&self, i: usize) -> Option<&TimeFrame> {
        self.frames.get(i)
    }

    pub fn frames(&self) -> &[TimeFrame] {
        &self.frames
    }

    /// Number of time frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Value lookup: the key's time selects the frame.
    pub fn value(&self, key: FQExpr) -> WitnessResult<Expr> {
        let frame = self
            .frames
            .get(key.time as usize)
            .ok_or(WitnessError::NoValue)?;
        frame.value(key)
    }

    pub fn has_value(&self, key: FQExpr) -> bool {
        self.frames
            .get(key.time as usize)
            .is_some_and(|f| f.has_value(key))
    }
}

#[derive(Default)]
struct Registry {
    witnesses: FxHashMap<String, Arc<Witness>>,
    current: Option<String>,
    counter: u64,
}

/// Registry of witnesses, keyed by identifier.
#[derive(Default)]
pub struct WitnessMgr {
    inner: Mutex<Registry>,
}

impl WitnessMgr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next value of the witness id counter.
    pub fn autoincrement(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        inner.counter
    }

    /// Register a finished witness.
    pub fn record(&self, witness: Witness) -> Arc<Witness> {
        let arc = Arc::new(witness);
        self.inner
            .lock()
            .unwrap()
            .witnesses
            .insert(arc.id().to_owned(), arc.clone());
        arc
    }

    pub fn set_current(&self, id: &str) {
        self.inner.lock().unwrap().current = Some(id.to_owned());
    }

    pub fn current(&self) -> Option<Arc<Witness>> {
        let inner = self.inner.lock().unwrap();
        let id = inner.current.as_ref()?;
        inner.witnesses.get(id).cloned()
    }

    pub fn get(&self, id: &str) -> WitnessResult<Arc<Witness>> {
        self.inner
            .lock()
            .unwrap()
            .witnesses
            .get(id)
            .cloned()
            .ok_or_else(|| WitnessError::UnknownWitness(id.to_owned()))
    }

    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .lock()
            .unwrap()
            .witnesses
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}
