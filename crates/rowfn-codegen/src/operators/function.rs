//! Runtime function calls.

use rowfn_ast::ExprRef;
use rowfn_emit::IrEmitter;
use rowfn_error::Result;
use rowfn_types::{BinOp, CastKind, IrType, TypeInfo, Value};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    /// Evaluate call arguments. None-encoded strings pass `(ptr, len)`.
    fn codegen_call_args(
        &mut self,
        args: &[ExprRef],
        co: &CompilationOptions,
    ) -> Result<Vec<(TypeInfo, Vec<Value>)>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            let values = self.codegen(Some(arg), true, co)?;
            out.push((*arg.type_info(), values));
        }
        Ok(out)
    }

    fn flatten_call_args(evaluated: &[(TypeInfo, Vec<Value>)]) -> Vec<Value> {
        evaluated
            .iter()
            .flat_map(|(ti, values)| {
                if ti.is_none_encoded_string() {
                    values.iter().skip(1).copied().collect::<Vec<_>>()
                } else {
                    values.iter().take(1).copied().collect()
                }
            })
            .collect()
    }

    /// A function whose result is NULL whenever any argument is NULL.
    ///
    /// With nullable arguments the call is guarded: `func_null` stores the
    /// result sentinel, `func_call` stores the call result, `func_end`
    /// loads whichever ran.
    pub(crate) fn codegen_function_oper(
        &mut self,
        ti: &TypeInfo,
        name: &str,
        args: &[ExprRef],
        co: &CompilationOptions,
    ) -> Result<Value> {
        let evaluated = self.codegen_call_args(args, co)?;
        let call_args = Self::flatten_call_args(&evaluated);
        let ret = ir_type_of(ti);

        let nullable_args: Vec<&(TypeInfo, Vec<Value>)> =
            evaluated.iter().filter(|(arg_ti, _)| !arg_ti.notnull).collect();
        if ti.notnull || nullable_args.is_empty() {
            return Ok(self.emitter_mut().call(name, ret, &call_args));
        }

        let mut any_null = Value::bool(false);
        for (arg_ti, values) in nullable_args {
            let is_null = self.codegen_null_check(arg_ti, values)?;
            any_null = if any_null == Value::bool(false) {
                is_null
            } else {
                self.emitter_mut().binary(BinOp::Or, any_null, is_null)
            };
        }

        let cell = self.emitter_mut().alloca(ret);
        let null_block = self.emitter_mut().create_block("func_null");
        let call_block = self.emitter_mut().create_block("func_call");
        let end_block = self.emitter_mut().create_block("func_end");
        self.emitter_mut().cond_br(any_null, null_block, call_block);

        self.emitter_mut().set_insert_point(null_block);
        self.emitter_mut().store(null_value(ti), cell);
        self.emitter_mut().br(end_block);

        self.emitter_mut().set_insert_point(call_block);
        let result = self.emitter_mut().call(name, ret, &call_args);
        self.emitter_mut().store(result, cell);
        self.emitter_mut().br(end_block);

        self.emitter_mut().set_insert_point(end_block);
        Ok(self.emitter_mut().load(ret, cell))
    }

    /// A function that receives nulls and handles them itself.
    ///
    /// DECIMAL arguments are passed as DOUBLE. A nullable result calls the
    /// `_nullable` variant with the result sentinel appended.
    pub(crate) fn codegen_function_oper_with_custom_type_handling(
        &mut self,
        ti: &TypeInfo,
        name: &str,
        args: &[ExprRef],
        co: &CompilationOptions,
    ) -> Result<Value> {
        let evaluated = self.codegen_call_args(args, co)?;
        let mut call_args = Vec::with_capacity(evaluated.len() + 1);
        for (arg_ti, values) in &evaluated {
            if arg_ti.is_decimal() {
                let v = values[0];
                let d = self.emitter_mut().cast(CastKind::SiToFp, v, IrType::F64);
                let scale = 10_f64.powi(arg_ti.scale);
                call_args.push(self.emitter_mut().binary(BinOp::FDiv, d, Value::f64(scale)));
            } else {
                call_args.extend(Self::flatten_call_args(std::slice::from_ref(&(*arg_ti, values.clone()))));
            }
        }

        let ret = ir_type_of(ti);
        if ti.notnull {
            return Ok(self.emitter_mut().call(name, ret, &call_args));
        }
        call_args.push(null_value(ti));
        Ok(self
            .emitter_mut()
            .call(&format!("{name}_nullable"), ret, &call_args))
    }
}
