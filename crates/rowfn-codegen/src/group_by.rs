//! Group-by key derivation.
//!
//! A group-by column lowers to one packed key of the configured width. An
//! `UNNEST(array)` column instead opens a loop over the array's elements
//! inside the row function; the rest of the row body runs once per element
//! and the loop exits through the enclosing conditional structure.

use rowfn_ast::{Expr, UnaryOp};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{
    BinOp, BlockId, CastKind, IntPredicate, IrType, TypeInfo, Value, log2_bytes, numeric_type_name,
};
use tracing::debug;

use crate::context::CompilationContext;
use crate::operators::{ir_type_of, null_value};
use crate::options::{CompilationOptions, DEFAULT_KEY_WIDTH};
use crate::quirks::needs_unnest_double_spill;

/// Result of [`CompilationContext::group_by_column_codegen`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupColumnValue {
    /// The packed key, null-translated when requested.
    pub key: Value,
    /// The packed key before null translation.
    pub orig_key: Option<Value>,
}

// ── Diamond ─────────────────────────────────────────────────────────────────

/// An open conditional: code emitted between [`open`](Self::open) and
/// [`close`](Self::close) runs only when the condition held.
///
/// `cond_false` is where a failing check jumps to. It starts out as the
/// diamond's own false block and may be redirected, e.g. to an array loop
/// head so that a failing row advances the loop instead of leaving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiamondCodegen {
    pub cond_true: BlockId,
    pub cond_false: BlockId,
    pub orig_cond_false: BlockId,
    pub chain_to_next: bool,
}

impl DiamondCodegen {
    /// Branch on `cond` into `{label_prefix}_true` / `{label_prefix}_false`
    /// and move the cursor into the true block.
    pub fn open<E: IrEmitter>(
        ctx: &mut CompilationContext<E>,
        cond: Value,
        label_prefix: &str,
        chain_to_next: bool,
    ) -> Self {
        let em = ctx.emitter_mut();
        let cond_true = em.create_block(&format!("{label_prefix}_true"));
        let cond_false = em.create_block(&format!("{label_prefix}_false"));
        em.cond_br(cond, cond_true, cond_false);
        em.set_insert_point(cond_true);
        Self {
            cond_true,
            cond_false,
            orig_cond_false: cond_false,
            chain_to_next,
        }
    }

    /// Redirect the false edge taken at [`close`](Self::close).
    pub fn set_false_target(&mut self, target: BlockId) {
        self.cond_false = target;
    }

    /// Finish the true side and continue after the diamond.
    pub fn close<E: IrEmitter>(self, ctx: &mut CompilationContext<E>) {
        let em = ctx.emitter_mut();
        if self.chain_to_next {
            em.br(self.cond_false);
        }
        em.set_insert_point(self.orig_cond_false);
    }
}

// ── Array loops ─────────────────────────────────────────────────────────────

/// Heads of the array loops opened so far, innermost last.
///
/// Loops are never popped: they stay open until the row function ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArrayLoopStack {
    heads: Vec<BlockId>,
}

impl ArrayLoopStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost open loop.
    pub fn top(&self) -> Option<BlockId> {
        self.heads.last().copied()
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.heads.iter().copied()
    }

    pub(crate) fn push(&mut self, head: BlockId) {
        self.heads.push(head);
    }
}

// ── Key codegen ─────────────────────────────────────────────────────────────

impl<E: IrEmitter> CompilationContext<E> {
    /// Lower one group-by column to a key of `col_width` bytes.
    ///
    /// The cache candidate is appended to the group-by expression cache.
    /// When `translate_null_val` is set, the column's null sentinel is
    /// replaced by `translated_null_val` and the untranslated key is
    /// returned alongside.
    #[allow(clippy::too_many_arguments)]
    pub fn group_by_column_codegen(
        &mut self,
        expr: &Expr,
        col_width: usize,
        co: &CompilationOptions,
        translate_null_val: bool,
        translated_null_val: i64,
        diamond: &mut DiamondCodegen,
        array_loops: &mut ArrayLoopStack,
        thread_mem_shared: bool,
    ) -> Result<GroupColumnValue> {
        if !co.accepts_key_width(col_width) {
            return Err(RowFnError::KeyWidthMismatch {
                width: col_width,
                compaction: co.key_compaction,
            });
        }
        let packed_ty = IrType::int((col_width * 8) as u32).ok_or_else(|| {
            RowFnError::precondition("group key width in bytes", "1, 2, 4 or 8", col_width)
        })?;
        let _span = tracing::debug_span!(
            target: "rowfn.codegen",
            "group_by_column",
            kind = expr.kind_name(),
            col_width,
        )
        .entered();

        let mut key_ti = *expr.type_info();
        let mut key = self.codegen_scalar(expr, co)?;
        let mut cache_candidate = key;

        if let Expr::UOper {
            op: UnaryOp::Unnest,
            operand,
            ..
        } = expr
        {
            let Some(elem_ti) = operand.type_info().elem_type() else {
                return Err(RowFnError::precondition(
                    "UNNEST operand",
                    "ARRAY",
                    operand.type_info(),
                ));
            };
            let pos = self.pos_arg(operand);
            key = self.codegen_array_loop(key, pos, &elem_ti, diamond, array_loops);
            key_ti = elem_ti;
            cache_candidate = key;
            if needs_unnest_double_spill(&elem_ti, co, thread_mem_shared) {
                cache_candidate = self.spill_to_stack(key);
            }
        }

        self.push_group_by_key(cache_candidate);

        let mut orig_key = None;
        if translate_null_val {
            orig_key = Some(key);
            key = self.translate_null_key(key, &key_ti, packed_ty, translated_null_val)?;
        }

        let key = self.cast_to_type_in(key, packed_ty)?;
        let orig_key = match orig_key {
            Some(v) => Some(self.cast_to_type_in(v, packed_ty)?),
            None => None,
        };
        Ok(GroupColumnValue { key, orig_key })
    }

    /// Open a loop over the elements of `arr` and return the current
    /// element. Leaves the cursor in the loop body.
    fn codegen_array_loop(
        &mut self,
        arr: Value,
        pos: Value,
        elem_ti: &TypeInfo,
        diamond: &mut DiamondCodegen,
        array_loops: &mut ArrayLoopStack,
    ) -> Value {
        let preheader = self.emitter().insert_block();
        let head = self
            .emitter_mut()
            .create_block_after("array_loop_head", preheader);
        diamond.set_false_target(head);

        let idx_cell = self.emitter_mut().alloca(IrType::I32);
        self.emitter_mut().store(Value::i32(0), idx_cell);
        let elem_log2 = Value::i32(log2_bytes(elem_ti.logical_size()) as i32);
        let size = self
            .emitter_mut()
            .call("array_size", IrType::I32, &[arr, pos, elem_log2]);
        self.emitter_mut().br(head);

        let exit = array_loops.top().unwrap_or(diamond.orig_cond_false);
        debug!(
            target: "rowfn.codegen",
            depth = array_loops.len() + 1,
            elem = %elem_ti,
            nested = array_loops.top().is_some(),
            "group_by.array_loop"
        );

        self.emitter_mut().set_insert_point(head);
        let idx = self.emitter_mut().load(IrType::I32, idx_cell);
        let in_bounds = self.emitter_mut().icmp(IntPredicate::Slt, idx, size);
        let body = self.emitter_mut().create_block("array_loop_body");
        self.emitter_mut().cond_br(in_bounds, body, exit);

        self.emitter_mut().set_insert_point(body);
        let next = self
            .emitter_mut()
            .binary(BinOp::Add, idx, Value::i32(1));
        self.emitter_mut().store(next, idx_cell);
        let callee = format!("array_at_{}", numeric_type_name(elem_ti));
        let elem = self
            .emitter_mut()
            .call(&callee, ir_type_of(elem_ti), &[arr, pos, idx]);

        array_loops.push(head);
        elem
    }

    /// Replace the null sentinel of `key_ti` in `key` with `translated`.
    fn translate_null_key(
        &mut self,
        key: Value,
        key_ti: &TypeInfo,
        packed_ty: IrType,
        translated: i64,
    ) -> Result<Value> {
        if !(key_ti.is_integer_like() || key_ti.is_fp()) {
            return Err(RowFnError::unsupported_type("group key null translation", key_ti));
        }
        let key_ty = ir_type_of(&key_ti.with_notnull(false));
        let key = if key_ty.is_int() {
            self.resize_int(key, key_ty)
        } else {
            key
        };
        let translated_ty = if key_ty.is_fp() { packed_ty } else { key_ty };
        let prefix = if packed_ty.bits() as usize == DEFAULT_KEY_WIDTH * 8 {
            "translate_null_key_"
        } else {
            "translate_null_key_i32_"
        };
        let callee = format!("{prefix}{}", numeric_type_name(key_ti));
        debug!(target: "rowfn.codegen", callee = %callee, translated, "group_by.translate_null");
        Ok(self.emitter_mut().call(
            &callee,
            translated_ty,
            &[key, null_value(key_ti), Value::int(translated_ty, translated)],
        ))
    }

    /// Reinterpret `v` as the integer type `int_ty`.
    ///
    /// Integers are resized, pointers converted, floating-point values
    /// resized and then bit-cast.
    fn cast_to_type_in(&mut self, v: Value, int_ty: IrType) -> Result<Value> {
        let ty = v.ty();
        let bits = int_ty.bits();
        if ty == int_ty {
            return Ok(v);
        }
        if ty == IrType::Ptr {
            return Ok(self.emitter_mut().cast(CastKind::PtrToInt, v, int_ty));
        }
        if ty.is_int() {
            return Ok(self.resize_int(v, int_ty));
        }
        let fp_ty = IrType::fp(bits)
            .ok_or_else(|| RowFnError::precondition("floating-point key width", "32 or 64 bits", bits))?;
        let v = self.resize_fp(v, fp_ty);
        Ok(self.emitter_mut().cast(CastKind::BitCast, v, int_ty))
    }
}

#[cfg(test)]
mod tests {
    use rowfn_emit::FunctionBuilder;
    use rowfn_types::{Inst, SqlType};

    use super::*;
    use crate::options::GpuArchitecture;
    use crate::unit::JoinInfo;

    fn ctx() -> CompilationContext<FunctionBuilder> {
        CompilationContext::new(FunctionBuilder::new("row_func"), JoinInfo::default())
    }

    fn diamond(ctx: &mut CompilationContext<FunctionBuilder>) -> DiamondCodegen {
        let pos = ctx.row_pos();
        let cond = ctx.to_bool(pos);
        DiamondCodegen::open(ctx, cond, "filter", true)
    }

    fn unnest(elem: SqlType) -> std::sync::Arc<Expr> {
        let arr = Expr::column(TypeInfo::array_of(elem), 3, 1, 0);
        Expr::unary(TypeInfo::new(elem), UnaryOp::Unnest, arr)
    }

    #[test]
    fn scalar_key_is_widened_to_key_width() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let col = Expr::column(TypeInfo::new(SqlType::Int), 3, 0, 0);
        let v = ctx
            .group_by_column_codegen(&col, 8, &CompilationOptions::cpu(), false, 0, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(v.key.ty(), IrType::I64);
        assert_eq!(v.orig_key, None);
        assert!(loops.is_empty());
        assert_eq!(ctx.group_by_expr_cache().len(), 1);
    }

    #[test]
    fn width_mismatch_is_fatal() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let col = Expr::column(TypeInfo::new(SqlType::Int), 3, 0, 0);
        let err = ctx
            .group_by_column_codegen(&col, 4, &CompilationOptions::cpu(), false, 0, &mut d, &mut loops, false)
            .unwrap_err();
        assert!(matches!(err, RowFnError::KeyWidthMismatch { width: 4, compaction: false }));
        assert!(ctx.group_by_expr_cache().is_empty());

        let co = CompilationOptions::cpu().with_key_compaction(true);
        let v = ctx
            .group_by_column_codegen(&col, 4, &co, false, 0, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(v.key.ty(), IrType::I32);
    }

    #[test]
    fn null_translation_keeps_original_key() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let col = Expr::column(TypeInfo::new(SqlType::Double), 3, 0, 0);
        let v = ctx
            .group_by_column_codegen(&col, 8, &CompilationOptions::cpu(), true, -1, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(v.key.ty(), IrType::I64);
        assert_eq!(v.orig_key.map(|k| k.ty()), Some(IrType::I64));
        assert_eq!(ctx.emitter().callees().last(), Some(&"translate_null_key_double"));
        // The original double is bit-cast, the translated key already is an integer.
        assert_eq!(
            ctx.emitter().count_where(|i| matches!(i, Inst::Cast { kind: CastKind::BitCast, .. })),
            1
        );
    }

    #[test]
    fn compact_keys_use_the_i32_translator() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let col = Expr::column(TypeInfo::new(SqlType::SmallInt), 3, 0, 0);
        let co = CompilationOptions::cpu().with_key_compaction(true);
        let v = ctx
            .group_by_column_codegen(&col, 4, &co, true, 7, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(v.key.ty(), IrType::I32);
        assert_eq!(ctx.emitter().callees().last(), Some(&"translate_null_key_i32_int16_t"));
    }

    #[test]
    fn unnest_opens_a_loop_exiting_through_the_diamond() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let expr = unnest(SqlType::Int);
        let v = ctx
            .group_by_column_codegen(&expr, 8, &CompilationOptions::cpu(), false, 0, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(v.key.ty(), IrType::I64);
        assert_eq!(loops.len(), 1);

        let e = ctx.emitter();
        let head = e.block_by_name("array_loop_head").unwrap();
        let body = e.block_by_name("array_loop_body").unwrap();
        assert_eq!(loops.top(), Some(head));
        assert_eq!(d.cond_false, head);
        assert_eq!(e.insert_block(), body);

        // The head sits right after the block it was opened from.
        let true_block = e.block_by_name("filter_true").unwrap();
        let layout = e.layout();
        let at = layout.iter().position(|b| *b == true_block).unwrap();
        assert_eq!(layout[at + 1], head);

        let exits: Vec<BlockId> = e
            .instructions(head)
            .iter()
            .filter_map(|i| match i {
                Inst::CondBr { else_block, .. } => Some(*else_block),
                _ => None,
            })
            .collect();
        assert_eq!(exits, vec![d.orig_cond_false]);
        assert!(e.callees().contains(&"array_size"));
        assert!(e.callees().contains(&"array_at_int32_t"));
    }

    #[test]
    fn nested_unnest_exits_into_the_enclosing_loop() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let co = CompilationOptions::cpu();
        ctx.group_by_column_codegen(&unnest(SqlType::Int), 8, &co, false, 0, &mut d, &mut loops, false)
            .unwrap();
        let outer = loops.top().unwrap();
        ctx.group_by_column_codegen(&unnest(SqlType::BigInt), 8, &co, false, 0, &mut d, &mut loops, false)
            .unwrap();
        assert_eq!(loops.len(), 2);
        let inner = loops.top().unwrap();
        assert_ne!(inner, outer);

        let exits: Vec<BlockId> = ctx
            .emitter()
            .instructions(inner)
            .iter()
            .filter_map(|i| match i {
                Inst::CondBr { else_block, .. } => Some(*else_block),
                _ => None,
            })
            .collect();
        assert_eq!(exits, vec![outer]);
        assert_eq!(d.cond_false, inner);
    }

    #[test]
    fn maxwell_spills_unnested_doubles() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let co = CompilationOptions::gpu(GpuArchitecture::Maxwell);
        ctx.group_by_column_codegen(&unnest(SqlType::Double), 8, &co, false, 0, &mut d, &mut loops, true)
            .unwrap();
        let cached = ctx.group_by_expr_cache()[0];
        assert_eq!(cached.ty(), IrType::Ptr);
    }

    #[test]
    fn unnest_of_scalar_is_rejected() {
        let mut ctx = ctx();
        let mut d = diamond(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let col = Expr::column(TypeInfo::new(SqlType::Int), 3, 0, 0);
        let expr = Expr::unary(TypeInfo::new(SqlType::Int), UnaryOp::Unnest, col);
        let err = ctx
            .group_by_column_codegen(&expr, 8, &CompilationOptions::cpu(), false, 0, &mut d, &mut loops, false)
            .unwrap_err();
        assert!(matches!(err, RowFnError::Precondition { .. }));
        assert!(loops.is_empty());
    }

    #[test]
    fn diamond_close_chains_to_the_false_target() {
        let mut ctx = ctx();
        let d = diamond(&mut ctx);
        let t = d.cond_true;
        d.close(&mut ctx);
        let e = ctx.emitter();
        assert_eq!(e.instructions(t).last(), Some(&Inst::Br { target: d.cond_false }));
        assert_eq!(e.insert_block(), d.orig_cond_false);
    }
}
