//! `CAST(x AS t)`.

use rowfn_ast::Expr;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, CastKind, Compression, IrType, TypeInfo, Value, numeric_type_name};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

/// `10^scale` for rescaling a decimal of type `ti`; scales past `i64` are
/// rejected.
fn pow10(scale: i32, ti: &TypeInfo) -> Result<i64> {
    10_i64
        .checked_pow(scale.unsigned_abs())
        .ok_or_else(|| RowFnError::unsupported_type("decimal scale", *ti))
}

impl<E: IrEmitter> CompilationContext<E> {
    pub(crate) fn codegen_cast(
        &mut self,
        ti: &TypeInfo,
        operand: &Expr,
        co: &CompilationOptions,
    ) -> Result<Vec<Value>> {
        let from = *operand.type_info();

        if ti.is_dict_encoded_string() {
            if let Expr::Constant {
                value: Some(datum), ..
            } = operand
            {
                if from.is_none_encoded_string() {
                    return self.codegen_constant(ti, datum, Compression::Dict, ti.comp_param);
                }
            }
            if from.is_dict_encoded_string() {
                return Ok(vec![self.codegen_scalar(operand, co)?]);
            }
            if from.is_none_encoded_string() {
                let (ptr, len) = self.codegen_str(operand, co)?;
                let dict = Value::i32(ti.comp_param);
                return Ok(vec![self.emitter_mut().call(
                    "string_to_dict_id",
                    IrType::I32,
                    &[ptr, len, dict],
                )]);
            }
            return Err(RowFnError::unsupported_type("cast to dictionary string", from));
        }

        if ti.is_string() || from.is_string() {
            if ti.is_none_encoded_string() && from.is_none_encoded_string() {
                return self.codegen(Some(operand), true, co);
            }
            return Err(RowFnError::unsupported_type("string cast", from));
        }
        if ti.is_array() || from.is_array() {
            return Err(RowFnError::unsupported_type("array cast", from));
        }

        let v = self.codegen_scalar(operand, co)?;
        Ok(vec![self.codegen_numeric_cast(&from, ti, v)?])
    }

    fn codegen_numeric_cast(&mut self, from: &TypeInfo, to: &TypeInfo, v: Value) -> Result<Value> {
        let to_ty = ir_type_of(to);

        if from.is_boolean() && to.is_boolean() {
            return Ok(if to_ty == IrType::I1 {
                self.to_bool(v)
            } else {
                self.to_nullable_bool(v)
            });
        }

        let same_type = from.sql_type == to.sql_type && from.scale == to.scale;
        if same_type {
            return Ok(v);
        }

        if !from.notnull {
            let callee = format!(
                "cast_{}_to_{}_nullable",
                numeric_type_name(from),
                numeric_type_name(to)
            );
            let args = [v, null_value(from), null_value(to)];
            return Ok(self.emitter_mut().call(&callee, to_ty, &args));
        }

        // Decimal rescaling happens in 64-bit integer or double space.
        let mut v = v;
        if from.is_decimal() && to.is_fp() {
            let d = self.emitter_mut().cast(CastKind::SiToFp, v, IrType::F64);
            let scaled = self
                .emitter_mut()
                .binary(BinOp::FDiv, d, Value::f64(pow10(from.scale, from)? as f64));
            return Ok(self.resize_fp(scaled, to_ty));
        }
        if from.is_fp() && to.is_decimal() {
            let d = self.resize_fp(v, IrType::F64);
            let scaled = self
                .emitter_mut()
                .binary(BinOp::FMul, d, Value::f64(pow10(to.scale, to)? as f64));
            return Ok(self.emitter_mut().cast(CastKind::FpToSi, scaled, IrType::I64));
        }
        if from.is_decimal() || to.is_decimal() {
            v = self.resize_int(v, IrType::I64);
            let from_scale = if from.is_decimal() { from.scale } else { 0 };
            let to_scale = if to.is_decimal() { to.scale } else { 0 };
            if to_scale > from_scale {
                let factor = Value::i64(pow10(to_scale - from_scale, to)?);
                v = self.emitter_mut().binary(BinOp::Mul, v, factor);
            } else if to_scale < from_scale {
                let factor = Value::i64(pow10(from_scale - to_scale, from)?);
                v = self.emitter_mut().binary(BinOp::SDiv, v, factor);
            }
            return Ok(self.resize_int(v, to_ty));
        }

        let from_ty = v.ty();
        Ok(match (from_ty.is_fp(), to_ty.is_fp()) {
            (false, false) => self.resize_int(v, to_ty),
            (false, true) => self.emitter_mut().cast(CastKind::SiToFp, v, to_ty),
            (true, false) => self.emitter_mut().cast(CastKind::FpToSi, v, to_ty),
            (true, true) => self.resize_fp(v, to_ty),
        })
    }

    /// Sign-extend or truncate an integer to `to` (`i1` zero-extends).
    pub(crate) fn resize_int(&mut self, v: Value, to: IrType) -> Value {
        let from = v.ty();
        if from == to {
            return v;
        }
        let kind = if from.bits() > to.bits() {
            CastKind::Trunc
        } else if from == IrType::I1 {
            CastKind::ZExt
        } else {
            CastKind::SExt
        };
        self.emitter_mut().cast(kind, v, to)
    }

    /// Extend or truncate a floating-point value to `to`.
    pub(crate) fn resize_fp(&mut self, v: Value, to: IrType) -> Value {
        let from = v.ty();
        if from == to {
            return v;
        }
        let kind = if from.bits() > to.bits() {
            CastKind::FpTrunc
        } else {
            CastKind::FpExt
        };
        self.emitter_mut().cast(kind, v, to)
    }
}

#[cfg(test)]
mod tests {
    use rowfn_ast::{Datum, UnaryOp};
    use rowfn_emit::FunctionBuilder;
    use rowfn_types::{Inst, SqlType};

    use super::*;
    use crate::unit::JoinInfo;

    fn ctx() -> CompilationContext<FunctionBuilder> {
        CompilationContext::new(FunctionBuilder::new("row_func"), JoinInfo::default())
    }

    fn cast_kinds(ctx: &CompilationContext<FunctionBuilder>) -> Vec<CastKind> {
        ctx.emitter()
            .all_instructions()
            .filter_map(|i| match i {
                Inst::Cast { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn widening_int_cast_sign_extends() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::new(SqlType::Int).not_null(), 1, 0, 0);
        let to = TypeInfo::new(SqlType::BigInt).not_null();
        let v = ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].ty(), IrType::I64);
        // decode returns i64, truncated to i32, then sign-extended back.
        assert_eq!(cast_kinds(&ctx), vec![CastKind::Trunc, CastKind::SExt]);
    }

    #[test]
    fn nullable_cast_calls_runtime() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::new(SqlType::SmallInt), 1, 0, 0);
        let to = TypeInfo::new(SqlType::Double);
        ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).unwrap();
        assert_eq!(
            ctx.emitter().callees().last(),
            Some(&"cast_int16_t_to_double_nullable")
        );
    }

    #[test]
    fn string_literal_to_dictionary() {
        let mut ctx = ctx();
        let lit = Expr::constant(TypeInfo::new(SqlType::Text), Datum::Str("abc".to_owned()));
        let to = TypeInfo::dict_text(9);
        let v = ctx.codegen_cast(&to, &lit, &CompilationOptions::cpu()).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].ty(), IrType::I32);
        assert_eq!(ctx.emitter().callees().last(), Some(&"string_to_dict_id"));
        assert_eq!(ctx.literals().strings(), &["abc".to_owned()]);
    }

    #[test]
    fn decimal_to_double_divides_by_scale() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::decimal(2).not_null(), 1, 0, 0);
        let to = TypeInfo::new(SqlType::Double).not_null();
        ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).unwrap();
        let divisor = ctx.emitter().all_instructions().find_map(|i| match i {
            Inst::Binary {
                op: BinOp::FDiv,
                rhs,
                ..
            } => rhs.as_const_fp(),
            _ => None,
        });
        assert_eq!(divisor, Some(100.0));
    }

    #[test]
    fn array_cast_is_rejected() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::array_of(SqlType::Int), 1, 0, 0);
        let inner = Expr::unary(TypeInfo::new(SqlType::Int), UnaryOp::Unnest, col);
        let err = ctx
            .codegen_cast(&TypeInfo::array_of(SqlType::BigInt), &inner, &CompilationOptions::cpu())
            .unwrap_err();
        assert!(matches!(err, RowFnError::UnsupportedType { .. }));
    }

    #[test]
    fn oversized_decimal_scale_is_rejected() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::decimal(19).not_null(), 1, 0, 0);
        let to = TypeInfo::new(SqlType::Double).not_null();
        let err = ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).unwrap_err();
        assert!(matches!(err, RowFnError::UnsupportedType { .. }));

        let col = Expr::column(TypeInfo::new(SqlType::BigInt).not_null(), 1, 1, 0);
        let to = TypeInfo::decimal(30).not_null();
        let err = ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).unwrap_err();
        assert!(matches!(err, RowFnError::UnsupportedType { .. }));

        let to = TypeInfo::decimal(18).not_null();
        assert!(ctx.codegen_cast(&to, &col, &CompilationOptions::cpu()).is_ok());
    }
}
