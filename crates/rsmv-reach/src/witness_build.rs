//! Witness extraction: read the SAT model back through the encodings.

use crate::strategy::Worker;
use crate::{ReachError, ReachResult};
use rsmv_dd::DdView;
use rsmv_expr::{FQExpr, Step};
use rsmv_sat::Engine;
use rsmv_witness::Witness;
use tracing::debug;

/// Build and register a `reach_<N>` witness of `k + 1` frames from the
/// engine's current model. For a backward search the SAT frames count down
/// from the end-of-time sentinel and are emitted in reversed order, so the
/// witness always reads forward from an initial state.
pub(crate) fn build_witness(
    w: &Worker,
    engine: &Engine,
    k: Step,
    reversed: bool,
) -> ReachResult<String> {
    let em = w.model.em().clone();
    let id = format!("reach_{}", w.wm.autoincrement());
    let mut witness = Witness::new(id.clone());
    witness.set_desc(format!(
        "reachability witness from engine `{}`",
        engine.name()
    ));

    let nvars = w.enc.num_dd_vars() as usize;

    for i in 0..=k {
        let base = if reversed { Step::MAX - k + i } else { i };
        let frame = witness.new_frame();

        for sv in &w.fsm.state_vars {
            let key = FQExpr::new(sv.ctx, sv.name, 0);
            let Some(encoding) = w.enc.find_encoding(key) else {
                return Err(ReachError::Internal(format!(
                    "state variable `{}` has no time-zero encoding",
                    em.print(sv.name)
                )));
            };
            if encoding.is_array() {
                // arrays have no scalar value; their elements are reachable
                // through subscripted formulas instead
                continue;
            }

            let mut assignment = vec![false; nvars];
            for &bit in encoding.bits() {
                let DdView::Node { var, .. } = w.dd.view(bit) else {
                    return Err(ReachError::Internal("encoding bit is not a variable".into()));
                };
                if let Some(cnf) = engine.lookup_dd_var(var, base) {
                    assignment[var as usize] = engine.model_value(cnf);
                }
            }

            let value = encoding
                .expr(&assignment, &w.dd, &em)
                .map_err(|e| ReachError::Internal(e.to_string()))?;
            debug!(frame = i, var = %em.print(sv.name), value = %em.print(value), "witness value");
            frame.set_value(FQExpr::new(sv.ctx, sv.name, i), value);
        }
    }

    w.wm.record(witness);
    w.wm.set_current(&id);
    Ok(id)
}
