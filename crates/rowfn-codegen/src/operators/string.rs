//! `CHAR_LENGTH`, `LIKE` / `ILIKE`, `REGEXP`.

use rowfn_ast::{Datum, Expr, ExprRef};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{IrType, TypeInfo, Value, inline_int_null_val};

use super::null_bool;
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

const DEFAULT_ESCAPE: u8 = b'\\';

/// The escape character of a pattern match, as the runtime expects it.
fn escape_char(escape: Option<&ExprRef>) -> Result<Value> {
    let Some(escape) = escape else {
        return Ok(Value::i8(DEFAULT_ESCAPE as i8));
    };
    match &**escape {
        Expr::Constant {
            value: Some(Datum::Str(s)),
            ..
        } if s.len() == 1 => Ok(Value::i8(s.as_bytes()[0] as i8)),
        other => Err(RowFnError::unsupported_type(
            "escape character",
            other.type_info(),
        )),
    }
}

impl<E: IrEmitter> CompilationContext<E> {
    pub(crate) fn codegen_char_length(
        &mut self,
        ti: &TypeInfo,
        arg: &Expr,
        calc_encoded_length: bool,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let (ptr, len) = self.codegen_str(arg, co)?;
        let name = if calc_encoded_length {
            "char_length_encoded"
        } else {
            "char_length"
        };
        if arg.type_info().notnull {
            return Ok(self.emitter_mut().call(name, IrType::I32, &[ptr, len]));
        }
        let null = inline_int_null_val(&ti.with_notnull(false)).unwrap_or(i64::from(i32::MIN));
        Ok(self.emitter_mut().call(
            &format!("{name}_nullable"),
            IrType::I32,
            &[ptr, len, Value::i32(null as i32)],
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn codegen_like(
        &mut self,
        ti: &TypeInfo,
        arg: &Expr,
        pattern: &Expr,
        escape: Option<&ExprRef>,
        is_ilike: bool,
        is_simple: bool,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let (ptr, len) = self.codegen_str(arg, co)?;
        let (pptr, plen) = self.codegen_str(pattern, co)?;
        let op = if is_ilike { "ilike" } else { "like" };

        let mut args = vec![ptr, len, pptr, plen];
        let mut name = if is_simple {
            format!("string_{op}_simple")
        } else {
            args.push(escape_char(escape)?);
            format!("string_{op}")
        };
        let ret = if ti.notnull {
            IrType::I1
        } else {
            name.push_str("_nullable");
            args.push(null_bool());
            IrType::I8
        };
        Ok(self.emitter_mut().call(&name, ret, &args))
    }

    pub(crate) fn codegen_regexp(
        &mut self,
        ti: &TypeInfo,
        arg: &Expr,
        pattern: &Expr,
        escape: Option<&ExprRef>,
        co: &CompilationOptions,
    ) -> Result<Value> {
        let (ptr, len) = self.codegen_str(arg, co)?;
        let (pptr, plen) = self.codegen_str(pattern, co)?;
        let esc = escape_char(escape)?;
        Ok(if ti.notnull {
            self.emitter_mut()
                .call("regexp_like", IrType::I1, &[ptr, len, pptr, plen, esc])
        } else {
            self.emitter_mut().call(
                "regexp_like_nullable",
                IrType::I8,
                &[ptr, len, pptr, plen, esc, null_bool()],
            )
        })
    }
}
