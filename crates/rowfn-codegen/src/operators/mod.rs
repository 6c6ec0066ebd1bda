//! Operator handlers.
//!
//! Every handler receives its node's operands undispatched, evaluates them
//! through [`CompilationContext::codegen`], and returns values whose IR
//! width and null encoding match the node's declared type. Handlers may
//! open internal control flow but always leave the cursor at a single
//! successor block.
//!
//! Representation rules shared by every handler:
//!
//! | type                          | IR value                           |
//! |-------------------------------|------------------------------------|
//! | BOOLEAN NOT NULL              | `i1`                               |
//! | BOOLEAN (nullable)            | `i8`, NULL = `i8::MIN`             |
//! | integers, time, decimal       | `iN` of the logical width          |
//! | FLOAT / DOUBLE                | `float` / `double`                 |
//! | dictionary TEXT               | `i32` id                           |
//! | none-encoded TEXT             | `[i64 packed, ptr, i32 len]`       |
//! | ARRAY                         | column buffer `ptr`                |

mod arith;
mod array;
mod case;
mod cast;
mod column;
mod compare;
mod constant;
mod datetime;
mod function;
mod logical;
mod string;

use rowfn_ast::Expr;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{
    CastKind, FloatPredicate, IntPredicate, IrType, SqlType, TypeInfo, Value, inline_fp_null_val,
    inline_int_null_val,
};

use crate::context::CompilationContext;
use crate::options::CompilationOptions;

/// IR type a value of `ti` is held in.
pub fn ir_type_of(ti: &TypeInfo) -> IrType {
    match ti.sql_type {
        SqlType::Boolean => {
            if ti.notnull {
                IrType::I1
            } else {
                IrType::I8
            }
        }
        SqlType::TinyInt => IrType::I8,
        SqlType::SmallInt => IrType::I16,
        SqlType::Int => IrType::I32,
        SqlType::BigInt
        | SqlType::Decimal
        | SqlType::Time
        | SqlType::Timestamp
        | SqlType::Date => IrType::I64,
        SqlType::Float => IrType::F32,
        SqlType::Double => IrType::F64,
        SqlType::Text if ti.is_dict_encoded_string() => IrType::I32,
        SqlType::Text | SqlType::Array => IrType::Ptr,
    }
}

/// The in-band NULL of `ti`, typed as a nullable value of `ti`.
///
/// Types without a scalar sentinel (none-encoded strings, arrays) use a
/// null pointer.
pub fn null_value(ti: &TypeInfo) -> Value {
    let nullable = ti.with_notnull(false);
    let ty = ir_type_of(&nullable);
    if let Some(fp) = inline_fp_null_val(&nullable) {
        return Value::fp(ty, fp);
    }
    match inline_int_null_val(&nullable) {
        Some(int) => Value::int(ty, int),
        None => Value::int(IrType::Ptr, 0),
    }
}

/// NULL of a nullable boolean.
pub const fn null_bool() -> Value {
    Value::i8(i8::MIN)
}

/// A boolean constant in the representation of `ti`.
pub const fn bool_value(ti: &TypeInfo, value: bool) -> Value {
    if ti.notnull {
        Value::bool(value)
    } else {
        Value::i8(value as i8)
    }
}

fn expect_operand_count(what: &str, values: &[Value], expected: usize) -> Result<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(RowFnError::precondition(
            format!("values produced for {what}"),
            expected,
            values.len(),
        ))
    }
}

impl<E: IrEmitter> CompilationContext<E> {
    /// Evaluate a scalar operand (one value).
    pub(crate) fn codegen_scalar(&mut self, expr: &Expr, co: &CompilationOptions) -> Result<Value> {
        let values = self.codegen(Some(expr), true, co)?;
        values
            .first()
            .copied()
            .ok_or_else(|| RowFnError::internal(format!("{} produced no value", expr.kind_name())))
    }

    /// Evaluate a none-encoded string operand to `(ptr, len)`.
    pub(crate) fn codegen_str(&mut self, expr: &Expr, co: &CompilationOptions) -> Result<(Value, Value)> {
        let ti = expr.type_info();
        if !ti.is_none_encoded_string() {
            return Err(RowFnError::unsupported_type("string operand", ti));
        }
        let values = self.codegen(Some(expr), true, co)?;
        expect_operand_count("a none-encoded string", &values, 3)?;
        Ok((values[1], values[2]))
    }

    /// Widen a truth value to the nullable boolean representation.
    pub(crate) fn to_nullable_bool(&mut self, v: Value) -> Value {
        if v.ty() != IrType::I1 {
            return v;
        }
        match v.as_const_int() {
            Some(c) => Value::i8(c as i8),
            None => self.emitter_mut().cast(CastKind::ZExt, v, IrType::I8),
        }
    }

    /// `i1` that is true when `values` (of type `ti`) hold NULL.
    pub(crate) fn codegen_null_check(&mut self, ti: &TypeInfo, values: &[Value]) -> Result<Value> {
        if ti.notnull {
            return Ok(Value::bool(false));
        }
        let Some(first) = values.first().copied() else {
            return Err(RowFnError::internal("null check on an empty value list"));
        };
        if ti.is_none_encoded_string() {
            expect_operand_count("a none-encoded string", values, 3)?;
            return Ok(self
                .emitter_mut()
                .icmp(IntPredicate::Eq, values[1], Value::int(IrType::Ptr, 0)));
        }
        if ti.is_array() {
            return Err(RowFnError::unsupported_type("null check", ti));
        }
        let null = null_value(ti);
        Ok(if ti.is_fp() {
            self.emitter_mut().fcmp(FloatPredicate::Oeq, first, null)
        } else {
            self.emitter_mut().icmp(IntPredicate::Eq, first, null)
        })
    }
}
