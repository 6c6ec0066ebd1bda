//! Early returns for predicates already enforced by a hash join.

use std::collections::HashSet;

use rowfn_ast::{BinaryOp, Expr, ExprRef, node_id};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::Value;
use tracing::debug;

use crate::context::CompilationContext;
use crate::options::CompilationOptions;
use crate::unit::{ExecutionUnit, JoinImplType};

/// Return status of a row that does not match.
pub const NO_MATCH: i32 = 0;

impl<E: IrEmitter> CompilationContext<E> {
    /// Guard `cond` with an early return if `qual` is a registered
    /// equi-join predicate. Returns the guarded value and whether a guard
    /// was emitted.
    fn guard_hash_qual(&mut self, cond: Value, qual: &ExprRef) -> (Value, bool) {
        let Some(idx) = self.join_info().registry_index(qual) else {
            return (cond, false);
        };
        debug!(target: "rowfn.codegen", idx, qual = %qual, "hash_join.ret_on_fail");
        let pass = self.emitter_mut().create_block(&format!("hash_pass_{idx}"));
        let fail = self.emitter_mut().create_block(&format!("hash_fail_{idx}"));
        self.emitter_mut().cond_br(cond, pass, fail);
        self.emitter_mut().set_insert_point(fail);
        self.emitter_mut().ret(Value::i32(NO_MATCH));
        self.emitter_mut().set_insert_point(pass);
        (Value::bool(true), true)
    }

    /// Branch out of the row function when `cond` is false and `qual` is
    /// also a hash-join condition.
    ///
    /// Unregistered predicates return `cond` unchanged and emit nothing.
    /// Registered ones leave the cursor in `hash_pass_{idx}` and return
    /// constant `true`.
    pub fn codegen_ret_on_hash_fail(&mut self, cond: Value, qual: &ExprRef) -> Value {
        self.guard_hash_qual(cond, qual).0
    }

    /// Fold the equality quals that only touch hash-joined relations into
    /// one early-return guard, and return the quals left for the nested
    /// loop.
    ///
    /// Only hash-plus-loop units are affected: their leading
    /// `input_descs.len() - 2` relations are hash joined, the trailing two
    /// are loop joined.
    pub fn codegen_hash_joins_before_loop_join(
        &mut self,
        primary_quals: &[ExprRef],
        unit: &ExecutionUnit,
        co: &CompilationOptions,
    ) -> Result<Vec<ExprRef>> {
        if self.join_info().join_impl_type() != JoinImplType::HashPlusLoop {
            return Ok(primary_quals.to_vec());
        }
        let inputs = unit.input_descs.len();
        if inputs <= 2 {
            return Err(RowFnError::precondition(
                "relation inputs of a hash-plus-loop unit",
                "more than 2",
                inputs,
            ));
        }
        let hash_group = inputs - 2;
        let _span = tracing::debug_span!(
            target: "rowfn.codegen",
            "hash_joins_before_loop_join",
            inputs,
            hash_group,
        )
        .entered();

        let mut filter = Value::bool(true);
        let mut folded = HashSet::new();
        for qual in &unit.inner_join_quals {
            let Expr::BinOper {
                op: BinaryOp::Eq, ..
            } = **qual
            else {
                continue;
            };
            if !qual.rte_indices().iter().all(|rte| *rte < hash_group) {
                continue;
            }
            let cond = self.codegen_scalar(qual, co)?;
            let cond = self.to_bool(cond);
            let (guarded, emitted) = self.guard_hash_qual(cond, qual);
            filter = if emitted {
                guarded
            } else {
                self.emit_and(filter, cond)
            };
            folded.insert(node_id(qual));
        }

        if folded.is_empty() {
            return Ok(primary_quals.to_vec());
        }
        debug!(target: "rowfn.codegen", folded = folded.len(), "hash_join.folded");

        match filter.as_const_int() {
            Some(0) => return Err(RowFnError::ConstantFalseConjunction),
            Some(_) => {}
            None => {
                let matched = self.emitter_mut().create_block("match_true");
                let unmatched = self.emitter_mut().create_block("match_false");
                self.emitter_mut().cond_br(filter, matched, unmatched);
                self.emitter_mut().set_insert_point(unmatched);
                self.emitter_mut().ret(Value::i32(NO_MATCH));
                self.emitter_mut().set_insert_point(matched);
            }
        }

        Ok(primary_quals
            .iter()
            .filter(|qual| !folded.contains(&node_id(qual)))
            .cloned()
            .collect())
    }
}
