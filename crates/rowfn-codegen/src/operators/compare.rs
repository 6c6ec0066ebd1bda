//! Comparisons, `IS NULL`, and membership tests.

use rowfn_ast::{BinaryOp, Expr, ExprRef};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{
    BinOp, CastKind, FloatPredicate, IntPredicate, IrType, TypeInfo, Value, inline_int_null_val,
    numeric_type_name,
};

use super::{bool_value, null_bool, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

fn int_predicate(op: BinaryOp) -> Option<IntPredicate> {
    Some(match op {
        BinaryOp::Eq => IntPredicate::Eq,
        BinaryOp::Ne => IntPredicate::Ne,
        BinaryOp::Lt => IntPredicate::Slt,
        BinaryOp::Le => IntPredicate::Sle,
        BinaryOp::Gt => IntPredicate::Sgt,
        BinaryOp::Ge => IntPredicate::Sge,
        _ => return None,
    })
}

fn float_predicate(op: BinaryOp) -> Option<FloatPredicate> {
    Some(match op {
        BinaryOp::Eq => FloatPredicate::Oeq,
        BinaryOp::Ne => FloatPredicate::One,
        BinaryOp::Lt => FloatPredicate::Olt,
        BinaryOp::Le => FloatPredicate::Ole,
        BinaryOp::Gt => FloatPredicate::Ogt,
        BinaryOp::Ge => FloatPredicate::Oge,
        _ => return None,
    })
}

impl<E: IrEmitter> CompilationContext<E> {
    pub(crate) fn codegen_cmp(
        &mut self,
        ti: &TypeInfo,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let operand_ti = *left.type_info();
        let nullable = !ti.notnull;

        if operand_ti.is_none_encoded_string() {
            let (lptr, llen) = self.codegen_str(left, co)?;
            let (rptr, rlen) = self.codegen_str(right, co)?;
            let stem = format!("string_{}", op.runtime_name());
            return Ok(if nullable {
                self.emitter_mut().call(
                    &format!("{stem}_nullable"),
                    IrType::I8,
                    &[lptr, llen, rptr, rlen, null_bool()],
                )
            } else {
                self.emitter_mut()
                    .call(&stem, IrType::I1, &[lptr, llen, rptr, rlen])
            });
        }
        if operand_ti.is_array() {
            return Err(RowFnError::unsupported_type("comparison", operand_ti));
        }

        let lhs = self.codegen_scalar(left, co)?;
        let rhs = self.codegen_scalar(right, co)?;
        self.emit_cmp(op, &operand_ti, lhs, rhs, nullable)
    }

    /// Compare two scalar values of type `operand_ti`.
    ///
    /// Returns `i1` when `nullable` is false, a nullable `i8` boolean
    /// otherwise.
    fn emit_cmp(
        &mut self,
        op: BinaryOp,
        operand_ti: &TypeInfo,
        lhs: Value,
        rhs: Value,
        nullable: bool,
    ) -> Result<Value> {
        if nullable {
            let callee = format!("{}_{}_nullable", op.runtime_name(), numeric_type_name(operand_ti));
            let null = null_value(operand_ti);
            return Ok(self
                .emitter_mut()
                .call(&callee, IrType::I8, &[lhs, rhs, null, null_bool()]));
        }
        let not_cmp = || RowFnError::internal(format!("{op:?} is not a comparison"));
        Ok(if operand_ti.is_fp() {
            let pred = float_predicate(op).ok_or_else(not_cmp)?;
            self.emitter_mut().fcmp(pred, lhs, rhs)
        } else {
            let pred = int_predicate(op).ok_or_else(not_cmp)?;
            self.emitter_mut().icmp(pred, lhs, rhs)
        })
    }

    pub(crate) fn codegen_is_null(
        &mut self,
        operand: &Expr,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let operand_ti = *operand.type_info();
        if operand_ti.notnull {
            return Ok(Value::bool(false));
        }
        if operand_ti.is_array() {
            let arr = self.codegen_scalar(operand, co)?;
            let pos = self.pos_arg(operand);
            return Ok(self.emitter_mut().call("array_is_null", IrType::I1, &[arr, pos]));
        }
        let values = self.codegen(Some(operand), true, co)?;
        self.codegen_null_check(&operand_ti, &values)
    }

    pub(crate) fn codegen_in_values(
        &mut self,
        ti: &TypeInfo,
        arg: &Expr,
        values: &[ExprRef],
        co: &CompilationOptions,
    ) -> Result<Value> {
        if values.is_empty() {
            return Ok(bool_value(ti, false));
        }
        let arg_ti = *arg.type_info();
        if arg_ti.is_none_encoded_string() || arg_ti.is_array() {
            return Err(RowFnError::unsupported_type("IN list", arg_ti));
        }
        let nullable = !ti.notnull;
        let lhs = self.codegen_scalar(arg, co)?;

        let mut result: Option<Value> = None;
        for value in values {
            let rhs = self.codegen_scalar(value, co)?;
            let eq = self.emit_cmp(BinaryOp::Eq, &arg_ti, lhs, rhs, nullable)?;
            result = Some(match result {
                None => eq,
                Some(acc) if nullable => {
                    self.emitter_mut()
                        .call("logical_or", IrType::I8, &[acc, eq, null_bool()])
                }
                Some(acc) => self.emitter_mut().binary(BinOp::Or, acc, eq),
            });
        }
        result.ok_or_else(|| RowFnError::internal("IN list produced no comparison"))
    }

    pub(crate) fn codegen_in_integer_set(
        &mut self,
        ti: &TypeInfo,
        arg: &Expr,
        values: &[i64],
        co: &CompilationOptions,
    ) -> Result<Value> {
        let arg_ti = *arg.type_info();
        let Some(null) = inline_int_null_val(&arg_ti.with_notnull(false)) else {
            return Err(RowFnError::unsupported_type("IN integer set", arg_ti));
        };
        let mut v = self.codegen_scalar(arg, co)?;
        if v.ty() != IrType::I64 {
            v = self.emitter_mut().cast(CastKind::SExt, v, IrType::I64);
        }
        let set_idx = self.literals_mut().add_int_set(values);
        let ret = if ti.notnull { IrType::I1 } else { IrType::I8 };
        Ok(self.emitter_mut().call(
            "in_integer_set",
            ret,
            &[v, Value::i32(set_idx as i32), Value::i64(null), null_bool()],
        ))
    }
}
