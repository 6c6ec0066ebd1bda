//! Group-by key derivation.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use rowfn_ast::{Expr, ExprRef, UnaryOp};
use rowfn_codegen::{
    ArrayLoopStack, CompilationContext, CompilationOptions, DiamondCodegen, GpuArchitecture,
    JoinInfo,
};
use rowfn_emit::{FunctionBuilder, IrEmitter};
use rowfn_types::{BlockId, Inst, IrType, SqlType, TypeInfo};

const KEY_TYPES: [SqlType; 8] = [
    SqlType::Boolean,
    SqlType::SmallInt,
    SqlType::Int,
    SqlType::BigInt,
    SqlType::Float,
    SqlType::Double,
    SqlType::Timestamp,
    SqlType::Decimal,
];

const ELEM_TYPES: [SqlType; 4] = [SqlType::Int, SqlType::BigInt, SqlType::Float, SqlType::Double];

fn ctx() -> CompilationContext<FunctionBuilder> {
    CompilationContext::new(FunctionBuilder::new("row_func"), JoinInfo::default())
}

fn open_filter(ctx: &mut CompilationContext<FunctionBuilder>) -> DiamondCodegen {
    let pos = ctx.row_pos();
    let cond = ctx.to_bool(pos);
    DiamondCodegen::open(ctx, cond, "filter", true)
}

fn unnest(elem: SqlType, column_id: i32) -> ExprRef {
    let arr = Expr::column(TypeInfo::array_of(elem), 7, column_id, 0);
    Expr::unary(TypeInfo::new(elem), UnaryOp::Unnest, arr)
}

fn exit_targets(e: &FunctionBuilder, head: BlockId) -> Vec<BlockId> {
    e.instructions(head)
        .iter()
        .filter_map(|i| match i {
            Inst::CondBr { else_block, .. } => Some(*else_block),
            _ => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn prop_scalar_keys_fill_one_cache_slot(
        ty_idx in 0..KEY_TYPES.len(),
        nullable in any::<bool>(),
        compact in any::<bool>(),
        translate in any::<bool>(),
    ) {
        let ti = TypeInfo::new(KEY_TYPES[ty_idx]).with_notnull(!nullable);
        let col = Expr::column(ti, 7, 0, 0);
        let (co, width) = if compact {
            (CompilationOptions::cpu().with_key_compaction(true), 4)
        } else {
            (CompilationOptions::cpu(), 8)
        };

        let mut ctx = ctx();
        let mut diamond = open_filter(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let before = ctx.group_by_expr_cache().len();
        let v = ctx
            .group_by_column_codegen(&col, width, &co, translate, -1, &mut diamond, &mut loops, false)
            .unwrap();

        prop_assert!(loops.is_empty());
        prop_assert_eq!(ctx.group_by_expr_cache().len(), before + 1);
        let packed = IrType::int((width * 8) as u32).unwrap();
        prop_assert_eq!(v.key.ty(), packed);
        prop_assert_eq!(v.orig_key.is_some(), translate);
        if let Some(orig) = v.orig_key {
            prop_assert_eq!(orig.ty(), packed);
        }
        prop_assert_eq!(diamond.cond_false, diamond.orig_cond_false);
    }

    #[test]
    fn prop_unnest_pushes_one_loop_with_one_exit(
        elems in prop::collection::vec(0..ELEM_TYPES.len(), 1..4),
    ) {
        let mut ctx = ctx();
        let mut diamond = open_filter(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let co = CompilationOptions::cpu();

        for (i, elem_idx) in elems.iter().enumerate() {
            let enclosing = loops.top();
            let expr = unnest(ELEM_TYPES[*elem_idx], i as i32);
            let v = ctx
                .group_by_column_codegen(&expr, 8, &co, false, 0, &mut diamond, &mut loops, false)
                .unwrap();
            prop_assert_eq!(v.key.ty(), IrType::I64);
            prop_assert_eq!(loops.len(), i + 1);
            prop_assert_eq!(ctx.group_by_expr_cache().len(), i + 1);

            let Some(head) = loops.top() else {
                return Err(TestCaseError::fail("no loop pushed"));
            };
            prop_assert_eq!(diamond.cond_false, head);
            let exits = exit_targets(ctx.emitter(), head);
            let expected = enclosing.unwrap_or(diamond.orig_cond_false);
            prop_assert_eq!(exits, vec![expected]);
        }
    }
}

#[test]
fn width_must_match_unless_compacted() {
    let mut ctx = ctx();
    let mut diamond = open_filter(&mut ctx);
    let mut loops = ArrayLoopStack::new();
    let col = Expr::column(TypeInfo::new(SqlType::BigInt), 7, 0, 0);
    for width in [1, 2, 4, 16] {
        let err = ctx
            .group_by_column_codegen(&col, width, &CompilationOptions::cpu(), false, 0, &mut diamond, &mut loops, false)
            .unwrap_err();
        assert!(err.is_fatal());
    }
    let compacted = CompilationOptions::cpu().with_key_compaction(true);
    assert!(
        ctx.group_by_column_codegen(&col, 2, &compacted, false, 0, &mut diamond, &mut loops, false)
            .is_err()
    );
    assert!(ctx.group_by_expr_cache().is_empty());
}

#[test]
fn keys_are_cached_in_declaration_order() {
    let mut ctx = ctx();
    let mut diamond = open_filter(&mut ctx);
    let mut loops = ArrayLoopStack::new();
    let co = CompilationOptions::cpu();
    let a = Expr::column(TypeInfo::new(SqlType::Int), 7, 0, 0);
    let b = Expr::column(TypeInfo::new(SqlType::Double), 7, 1, 0);
    ctx.group_by_column_codegen(&a, 8, &co, false, 0, &mut diamond, &mut loops, false)
        .unwrap();
    ctx.group_by_column_codegen(&b, 8, &co, false, 0, &mut diamond, &mut loops, false)
        .unwrap();
    let cache = ctx.group_by_expr_cache();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache[0].ty(), IrType::I32);
    assert_eq!(cache[1].ty(), IrType::F64);
}

#[test]
fn double_spill_depends_on_target_and_shared_memory() {
    let cases = [
        (CompilationOptions::gpu(GpuArchitecture::Maxwell), true, IrType::Ptr),
        (CompilationOptions::gpu(GpuArchitecture::Maxwell), false, IrType::F64),
        (CompilationOptions::gpu(GpuArchitecture::Volta), true, IrType::F64),
        (CompilationOptions::cpu(), true, IrType::F64),
    ];
    for (co, shared, cached) in cases {
        let mut ctx = ctx();
        let mut diamond = open_filter(&mut ctx);
        let mut loops = ArrayLoopStack::new();
        let v = ctx
            .group_by_column_codegen(&unnest(SqlType::Double, 0), 8, &co, false, 0, &mut diamond, &mut loops, shared)
            .unwrap();
        assert_eq!(ctx.group_by_expr_cache()[0].ty(), cached);
        assert_eq!(v.key.ty(), IrType::I64);
    }
}

#[test]
fn row_body_after_unnest_finishes_cleanly() {
    let mut ctx = ctx();
    let mut diamond = open_filter(&mut ctx);
    let mut loops = ArrayLoopStack::new();
    ctx.group_by_column_codegen(&unnest(SqlType::Int, 0), 8, &CompilationOptions::cpu(), false, 0, &mut diamond, &mut loops, false)
        .unwrap();
    diamond.close(&mut ctx);
    ctx.emitter_mut().ret(rowfn_types::Value::i32(0));
    let function = ctx.into_emitter().finish().unwrap();
    let text = function.disassemble();
    assert!(text.contains("array_loop_head"));
    assert!(text.contains("array_size"));
}
