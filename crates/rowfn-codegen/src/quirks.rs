//! Target-specific workarounds.

use rowfn_emit::IrEmitter;
use rowfn_types::{SqlType, TypeInfo, Value};

use crate::context::CompilationContext;
use crate::options::CompilationOptions;

/// Whether an unnested DOUBLE element must live at a stable address before
/// it is used as a group key.
///
/// Works around an addressing erratum of Maxwell GPUs that only shows up
/// when group-by buffers sit in shared thread memory.
pub const fn needs_unnest_double_spill(
    elem_ti: &TypeInfo,
    co: &CompilationOptions,
    thread_mem_shared: bool,
) -> bool {
    co.is_maxwell() && thread_mem_shared && matches!(elem_ti.sql_type, SqlType::Double)
}

impl<E: IrEmitter> CompilationContext<E> {
    /// Store `v` into a fresh stack cell and return the cell.
    pub(crate) fn spill_to_stack(&mut self, v: Value) -> Value {
        let cell = self.emitter_mut().alloca(v.ty());
        self.emitter_mut().store(v, cell);
        cell
    }
}
