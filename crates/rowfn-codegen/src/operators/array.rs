//! Array subscript and `UNNEST` outside of group-by.

use rowfn_ast::Expr;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{IrType, TypeInfo, Value, numeric_type_name};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    /// `arr[idx]`, bounds- and null-checked by the runtime.
    pub(crate) fn codegen_array_at(
        &mut self,
        ti: &TypeInfo,
        arr: &Expr,
        idx: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let arr_ti = arr.type_info();
        let Some(elem_ti) = arr_ti.elem_type() else {
            return Err(RowFnError::precondition(
                "array subscript operand",
                "ARRAY",
                arr_ti,
            ));
        };
        let buf = self.codegen_scalar(arr, co)?;
        let idx = self.codegen_scalar(idx, co)?;
        let idx = self.resize_int(idx, IrType::I64);
        let pos = self.pos_arg(arr);
        let callee = format!("array_at_{}_checked", numeric_type_name(&elem_ti));
        let null = null_value(&elem_ti);
        Ok(self
            .emitter_mut()
            .call(&callee, ir_type_of(&ti.with_notnull(false)), &[buf, pos, idx, null]))
    }

    /// The array itself; iteration over its elements is set up by
    /// group-by key codegen.
    pub(crate) fn codegen_unnest(&mut self, operand: &Expr, co: &CompilationOptions) -> Result<Value> {
        let operand_ti = operand.type_info();
        if !operand_ti.is_array() {
            return Err(RowFnError::precondition(
                "UNNEST operand",
                "ARRAY",
                operand_ti,
            ));
        }
        self.codegen_scalar(operand, co)
    }
}
