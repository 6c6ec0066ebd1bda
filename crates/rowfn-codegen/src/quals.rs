//! Filter qualifiers.

use rowfn_ast::ExprRef;
use rowfn_emit::IrEmitter;
use rowfn_error::Result;
use rowfn_types::Value;

use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    /// Conjunction of `quals` as an `i1`.
    ///
    /// Quals that are also hash-join conditions return early on failure and
    /// drop out of the conjunction.
    pub fn codegen_quals(&mut self, quals: &[ExprRef], co: &CompilationOptions) -> Result<Value> {
        let mut filter = Value::bool(true);
        for qual in quals {
            let cond = self.codegen_scalar(qual, co)?;
            let cond = self.to_bool(cond);
            let guarded = self.codegen_ret_on_hash_fail(cond, qual);
            if guarded == cond {
                filter = self.emit_and(filter, cond);
            }
        }
        Ok(filter)
    }
}
