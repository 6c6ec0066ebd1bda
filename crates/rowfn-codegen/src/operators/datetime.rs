//! `EXTRACT`, `DATEDIFF`, `DATE_TRUNC`.

use rowfn_ast::{DateField, Expr};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{IrType, TypeInfo, Value};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    fn codegen_time_operand(&mut self, expr: &Expr, co: &CompilationOptions) -> Result<Value> {
        let ti = expr.type_info();
        if !ti.is_time() {
            return Err(RowFnError::unsupported_type("date/time function", ti));
        }
        let v = self.codegen_scalar(expr, co)?;
        Ok(self.resize_int(v, IrType::I64))
    }

    /// Runtime results are `i64`; narrow to the declared type.
    fn finish_time_result(&mut self, ti: &TypeInfo, v: Value) -> Value {
        self.resize_int(v, ir_type_of(ti))
    }

    pub(crate) fn codegen_extract(
        &mut self,
        ti: &TypeInfo,
        field: DateField,
        from: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let v = self.codegen_time_operand(from, co)?;
        let field = Value::i32(field.code());
        let from_ti = from.type_info();
        let r = if from_ti.notnull {
            self.emitter_mut()
                .call("ExtractFromTime", IrType::I64, &[field, v])
        } else {
            let null = null_value(from_ti);
            self.emitter_mut()
                .call("ExtractFromTimeNullable", IrType::I64, &[field, v, null])
        };
        Ok(self.finish_time_result(ti, r))
    }

    pub(crate) fn codegen_datediff(
        &mut self,
        ti: &TypeInfo,
        field: DateField,
        start: &Expr,
        end: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let s = self.codegen_time_operand(start, co)?;
        let e = self.codegen_time_operand(end, co)?;
        let field = Value::i32(field.code());
        let r = if start.type_info().notnull && end.type_info().notnull {
            self.emitter_mut()
                .call("DateDiff", IrType::I64, &[field, s, e])
        } else {
            let null = null_value(start.type_info());
            self.emitter_mut()
                .call("DateDiffNullable", IrType::I64, &[field, s, e, null])
        };
        Ok(self.finish_time_result(ti, r))
    }

    pub(crate) fn codegen_datetrunc(
        &mut self,
        ti: &TypeInfo,
        field: DateField,
        from: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let v = self.codegen_time_operand(from, co)?;
        let field = Value::i32(field.code());
        let from_ti = from.type_info();
        let r = if from_ti.notnull {
            self.emitter_mut()
                .call("DateTruncate", IrType::I64, &[field, v])
        } else {
            let null = null_value(from_ti);
            self.emitter_mut()
                .call("DateTruncateNullable", IrType::I64, &[field, v, null])
        };
        Ok(self.finish_time_result(ti, r))
    }
}
