//! `CASE WHEN .. THEN .. ELSE .. END`.

use rowfn_ast::ExprRef;
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{TypeInfo, Value};

use super::{ir_type_of, null_value};
use crate::context::CompilationContext;
use crate::options::CompilationOptions;

impl<E: IrEmitter> CompilationContext<E> {
    /// Each branch stores into one stack cell; `case_end` loads it.
    pub(crate) fn codegen_case(
        &mut self,
        ti: &TypeInfo,
        branches: &[(ExprRef, ExprRef)],
        else_expr: Option<&ExprRef>,
        co: &CompilationOptions,
    ) -> Result<Value> {
        if ti.is_none_encoded_string() || ti.is_array() {
            return Err(RowFnError::unsupported_type("CASE result", ti));
        }
        let ty = ir_type_of(ti);
        let cell = self.emitter_mut().alloca(ty);
        let end = self.emitter_mut().create_block("case_end");

        // Columns decoded in a branch block are only visible inside it;
        // only the first condition is evaluated in a block dominating
        // `case_end`.
        let mut dominating = None;
        for (when, then) in branches {
            let cond = self.codegen_scalar(when, co)?;
            let cond = self.to_bool(cond);
            if dominating.is_none() {
                dominating = Some(self.fetch_cache_snapshot());
            }
            let then_block = self.emitter_mut().create_block("case_then");
            let next_block = self.emitter_mut().create_block("case_next");
            self.emitter_mut().cond_br(cond, then_block, next_block);

            self.emitter_mut().set_insert_point(then_block);
            let before_then = self.fetch_cache_snapshot();
            let v = self.codegen_scalar(then, co)?;
            let v = self.coerce_branch(v, ti);
            self.emitter_mut().store(v, cell);
            self.emitter_mut().br(end);
            self.restore_fetch_cache(before_then);

            self.emitter_mut().set_insert_point(next_block);
        }

        let otherwise = match else_expr {
            Some(e) => {
                let v = self.codegen_scalar(e, co)?;
                self.coerce_branch(v, ti)
            }
            None => null_value(ti),
        };
        self.emitter_mut().store(otherwise, cell);
        self.emitter_mut().br(end);
        if let Some(cache) = dominating {
            self.restore_fetch_cache(cache);
        }

        self.emitter_mut().set_insert_point(end);
        Ok(self.emitter_mut().load(ty, cell))
    }

    /// Bring a branch value to the CASE result representation.
    fn coerce_branch(&mut self, v: Value, ti: &TypeInfo) -> Value {
        let ty = ir_type_of(ti);
        if v.ty() == ty {
            return v;
        }
        if ti.is_boolean() {
            return if ti.notnull {
                self.to_bool(v)
            } else {
                self.to_nullable_bool(v)
            };
        }
        if ty.is_fp() {
            self.resize_fp(v, ty)
        } else {
            self.resize_int(v, ty)
        }
    }
}
