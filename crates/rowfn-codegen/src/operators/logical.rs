//! `AND`, `OR`, `NOT`.

use rowfn_ast::{BinaryOp, Expr};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, IrType, TypeInfo, Value};

use super::null_bool;
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    pub(crate) fn codegen_logical(
        &mut self,
        ti: &TypeInfo,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let (native, runtime) = match op {
            BinaryOp::And => (BinOp::And, "logical_and"),
            BinaryOp::Or => (BinOp::Or, "logical_or"),
            _ => return Err(RowFnError::internal(format!("{op:?} is not logical"))),
        };
        let lhs = self.codegen_scalar(left, co)?;
        let rhs = self.codegen_scalar(right, co)?;

        if ti.notnull {
            let lhs = self.to_bool(lhs);
            let rhs = self.to_bool(rhs);
            return Ok(self.emitter_mut().binary(native, lhs, rhs));
        }
        let lhs = self.to_nullable_bool(lhs);
        let rhs = self.to_nullable_bool(rhs);
        Ok(self
            .emitter_mut()
            .call(runtime, IrType::I8, &[lhs, rhs, null_bool()]))
    }

    pub(crate) fn codegen_not(
        &mut self,
        ti: &TypeInfo,
        operand: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let v = self.codegen_scalar(operand, co)?;
        if ti.notnull {
            let v = self.to_bool(v);
            return Ok(self.emitter_mut().binary(BinOp::Xor, v, Value::bool(true)));
        }
        let v = self.to_nullable_bool(v);
        Ok(self
            .emitter_mut()
            .call("logical_not", IrType::I8, &[v, null_bool()]))
    }
}
