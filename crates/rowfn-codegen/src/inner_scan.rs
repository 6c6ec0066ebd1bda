//! Nested-loop continuation.

use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, Value};
use tracing::debug;

use crate::context::CompilationContext;
use crate::hash_join::NO_MATCH;

impl<E: IrEmitter> CompilationContext<E> {
    /// End the current row of an inner scan.
    ///
    /// Without a registered inner-scan loop this is a `ret` of the no-match
    /// status. With one, the scan iterator is advanced and control jumps
    /// back to the loop's continuation block. Only a single inner scan is
    /// supported.
    pub fn codegen_inner_scan_next_row(&mut self) -> Result<()> {
        let labels = self.inner_scan_labels();
        if labels.is_empty() {
            self.emitter_mut().ret(Value::i32(NO_MATCH));
            return Ok(());
        }
        if labels.len() != 1 {
            return Err(RowFnError::precondition(
                "inner scan labels",
                1,
                labels.len(),
            ));
        }
        let label = labels[0];

        let count = self.scan_iterators().len();
        if count != 1 {
            return Err(RowFnError::precondition("inner scan iterators", 1, count));
        }
        let Some((input, it)) = self.scan_iterators().next().map(|(i, s)| (*i, *s)) else {
            return Err(RowFnError::internal("inner scan iterator vanished"));
        };

        debug!(
            target: "rowfn.codegen",
            table_id = input.table_id,
            nest_level = input.nest_level,
            "inner_scan.advance"
        );
        let next = self
            .emitter_mut()
            .binary(BinOp::Add, it.value, Value::i64(1));
        self.emitter_mut().store(next, it.slot);
        self.emitter_mut().br(label);
        Ok(())
    }
}
