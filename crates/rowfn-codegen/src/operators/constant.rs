//! Literal materialization.

use rowfn_ast::Datum;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{Compression, IrType, TypeInfo, Value};

use super::{bool_value, ir_type_of};
use crate::context::CompilationContext;

impl<E: IrEmitter> CompilationContext<E> {
    /// Materialize a non-null literal of type `ti` stored with `compression`.
    ///
    /// `dict_id` names the target dictionary when `compression` is
    /// [`Compression::Dict`]; it is ignored otherwise.
    pub fn codegen_constant(
        &mut self,
        ti: &TypeInfo,
        datum: &Datum,
        compression: Compression,
        dict_id: i32,
    ) -> Result<Vec<Value>> {
        let ty = ir_type_of(ti);
        let value = match datum {
            Datum::Bool(b) => bool_value(ti, *b),
            Datum::Int(v) if ty.is_fp() => Value::fp(ty, *v as f64),
            Datum::Int(v) if ty.is_int() => Value::int(ty, *v),
            Datum::Fp(v) if ty.is_fp() => Value::fp(ty, *v),
            Datum::Str(s) if ti.is_string() => {
                let idx = self.literals_mut().add_string(s);
                let em = self.emitter_mut();
                let packed = em.call("load_str_literal", IrType::I64, &[Value::i32(idx as i32)]);
                let ptr = em.call("extract_str_ptr", IrType::Ptr, &[packed]);
                let len = em.call("extract_str_len", IrType::I32, &[packed]);
                if matches!(compression, Compression::Dict) {
                    let id = em.call(
                        "string_to_dict_id",
                        IrType::I32,
                        &[ptr, len, Value::i32(dict_id)],
                    );
                    return Ok(vec![id]);
                }
                return Ok(vec![packed, ptr, len]);
            }
            _ => return Err(RowFnError::unsupported_type("constant", ti)),
        };
        Ok(vec![value])
    }
}

#[cfg(test)]
mod tests {
    use rowfn_emit::FunctionBuilder;
    use rowfn_types::SqlType;

    use super::*;
    use crate::unit::JoinInfo;

    fn ctx() -> CompilationContext<FunctionBuilder> {
        CompilationContext::new(FunctionBuilder::new("row_func"), JoinInfo::default())
    }

    #[test]
    fn numeric_constants_emit_nothing() {
        let mut ctx = ctx();
        let v = ctx
            .codegen_constant(
                &TypeInfo::new(SqlType::SmallInt),
                &Datum::Int(7),
                Compression::None,
                0,
            )
            .unwrap();
        assert_eq!(v, vec![Value::int(IrType::I16, 7)]);
        let v = ctx
            .codegen_constant(
                &TypeInfo::new(SqlType::Float),
                &Datum::Fp(0.5),
                Compression::None,
                0,
            )
            .unwrap();
        assert_eq!(v, vec![Value::f32(0.5)]);
        assert_eq!(ctx.emitter().instruction_count(), 0);
    }

    #[test]
    fn booleans_follow_nullability() {
        let mut ctx = ctx();
        let nn = TypeInfo::new(SqlType::Boolean).not_null();
        assert_eq!(
            ctx.codegen_constant(&nn, &Datum::Bool(true), Compression::None, 0)
                .unwrap(),
            vec![Value::bool(true)]
        );
        assert_eq!(
            ctx.codegen_constant(
                &TypeInfo::new(SqlType::Boolean),
                &Datum::Bool(true),
                Compression::None,
                0
            )
            .unwrap(),
            vec![Value::i8(1)]
        );
    }

    #[test]
    fn strings_go_through_the_literal_pool() {
        let mut ctx = ctx();
        let text = TypeInfo::new(SqlType::Text);
        let v = ctx
            .codegen_constant(&text, &Datum::Str("x".to_owned()), Compression::None, 0)
            .unwrap();
        assert_eq!(v.len(), 3);
        assert_eq!(ctx.literals().strings(), &["x".to_owned()]);
    }

    #[test]
    fn mismatched_payload_is_rejected() {
        let mut ctx = ctx();
        let err = ctx
            .codegen_constant(
                &TypeInfo::new(SqlType::Int),
                &Datum::Str("x".to_owned()),
                Compression::None,
                0,
            )
            .unwrap_err();
        assert!(matches!(err, RowFnError::UnsupportedType { .. }));
    }
}
