//! Column reads.

use rowfn_ast::Expr;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{Compression, IrType, SqlType, TypeInfo, Value};
use tracing::trace;

use super::ir_type_of;
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

/// Stored width in bytes of an integer-like column.
fn stored_width(ti: &TypeInfo) -> usize {
    match ti.compression {
        Compression::Fixed if ti.comp_param > 0 => (ti.comp_param as usize).div_ceil(8),
        _ => ti.logical_size(),
    }
}

impl<E: IrEmitter> CompilationContext<E> {
    /// Decode column `column_id` of `table_id` as seen through relation
    /// `rte_idx`.
    ///
    /// With `fetch_columns` off the column's row position stands in for its
    /// value. Decoded values are cached for the rest of the unit.
    pub(crate) fn codegen_column(
        &mut self,
        col: &Expr,
        fetch_columns: bool,
        _co: &CompilationOptions,
    ) -> Result<Vec<Value>> {
        let Expr::ColumnVar {
            ti,
            table_id,
            column_id,
            rte_idx,
        } = col
        else {
            return Err(RowFnError::internal(format!(
                "column handler given {}",
                col.kind_name()
            )));
        };
        if !fetch_columns {
            return Ok(vec![self.pos_arg(col)]);
        }
        let key = (*rte_idx, *table_id, *column_id);
        if let Some(values) = self.fetched_column(key) {
            trace!(target: "rowfn.codegen", table_id, column_id, rte_idx, "column.cache_hit");
            return Ok(values.clone());
        }

        let buf = self.column_buffer(*table_id, *column_id);
        let pos = self.pos_arg(col);
        let values = match ti.sql_type {
            SqlType::Array => vec![buf],
            SqlType::Text if ti.is_none_encoded_string() => {
                let em = self.emitter_mut();
                let packed = em.call("string_decode", IrType::I64, &[buf, pos]);
                let ptr = em.call("extract_str_ptr", IrType::Ptr, &[packed]);
                let len = em.call("extract_str_len", IrType::I32, &[packed]);
                vec![packed, ptr, len]
            }
            SqlType::Float => vec![self.emitter_mut().call(
                "fixed_width_float_decode",
                IrType::F32,
                &[buf, pos],
            )],
            SqlType::Double => vec![self.emitter_mut().call(
                "fixed_width_double_decode",
                IrType::F64,
                &[buf, pos],
            )],
            _ => {
                let width = Value::i32(stored_width(ti) as i32);
                let raw = self
                    .emitter_mut()
                    .call("fixed_width_int_decode", IrType::I64, &[buf, width, pos]);
                vec![self.resize_int(raw, ir_type_of(ti))]
            }
        };
        self.cache_fetched_column(key, values.clone());
        Ok(values)
    }
}
