//! `+ - * / %` and unary minus.

use rowfn_ast::{BinaryOp, Expr};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, TypeInfo, Value, numeric_type_name};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

fn native_op(op: BinaryOp, fp: bool) -> Option<BinOp> {
    Some(match (op, fp) {
        (BinaryOp::Plus, false) => BinOp::Add,
        (BinaryOp::Minus, false) => BinOp::Sub,
        (BinaryOp::Multiply, false) => BinOp::Mul,
        (BinaryOp::Divide, false) => BinOp::SDiv,
        (BinaryOp::Modulo, false) => BinOp::SRem,
        (BinaryOp::Plus, true) => BinOp::FAdd,
        (BinaryOp::Minus, true) => BinOp::FSub,
        (BinaryOp::Multiply, true) => BinOp::FMul,
        (BinaryOp::Divide, true) => BinOp::FDiv,
        (BinaryOp::Modulo, true) => BinOp::FRem,
        _ => return None,
    })
}

impl<E: IrEmitter> CompilationContext<E> {
    pub(crate) fn codegen_arith(
        &mut self,
        ti: &TypeInfo,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let operand_ti = *left.type_info();
        if !(operand_ti.is_integer() || operand_ti.is_decimal() || operand_ti.is_fp() || operand_ti.is_time()) {
            return Err(RowFnError::unsupported_type("arithmetic", operand_ti));
        }
        let lhs = self.codegen_scalar(left, co)?;
        let rhs = self.codegen_scalar(right, co)?;

        let nullable = !(left.type_info().notnull && right.type_info().notnull);
        if !nullable {
            let native = native_op(op, operand_ti.is_fp())
                .ok_or_else(|| RowFnError::internal(format!("{op:?} is not arithmetic")))?;
            return Ok(self.emitter_mut().binary(native, lhs, rhs));
        }

        let callee = format!("{}_{}_nullable", op.runtime_name(), numeric_type_name(&operand_ti));
        let null = null_value(&operand_ti);
        Ok(self
            .emitter_mut()
            .call(&callee, ir_type_of(&ti.with_notnull(false)), &[lhs, rhs, null]))
    }

    pub(crate) fn codegen_uminus(
        &mut self,
        ti: &TypeInfo,
        operand: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let operand_ti = *operand.type_info();
        if !(operand_ti.is_integer() || operand_ti.is_decimal() || operand_ti.is_fp()) {
            return Err(RowFnError::unsupported_type("unary minus", operand_ti));
        }
        let v = self.codegen_scalar(operand, co)?;
        let ty = ir_type_of(ti);
        if operand_ti.notnull {
            return Ok(if operand_ti.is_fp() {
                self.emitter_mut().binary(BinOp::FSub, Value::fp(ty, -0.0), v)
            } else {
                self.emitter_mut().binary(BinOp::Sub, Value::int(ty, 0), v)
            });
        }
        let callee = format!("uminus_{}_nullable", numeric_type_name(&operand_ti));
        let null = null_value(&operand_ti);
        Ok(self.emitter_mut().call(&callee, ty, &[v, null]))
    }
}
