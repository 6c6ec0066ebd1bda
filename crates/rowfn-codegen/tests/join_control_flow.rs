//! Hash-join short-circuits and inner-scan advance.

use proptest::prelude::*;
use rowfn_ast::{BinaryOp, Expr, ExprRef, node_id};
use rowfn_codegen::{
    CompilationContext, CompilationOptions, ExecutionUnit, InputDescriptor, JoinImplType, JoinInfo,
    NO_MATCH,
};
use rowfn_emit::{FunctionBuilder, IrEmitter};
use rowfn_types::{Inst, IrType, SqlType, TypeInfo, Value};

// ─── Helpers ─────────────────────────────────────────────────────────────

fn qual(op: BinaryOp, l: usize, r: usize) -> ExprRef {
    let int = TypeInfo::new(SqlType::Int).not_null();
    Expr::binary(
        TypeInfo::new(SqlType::Boolean).not_null(),
        op,
        Expr::column(int, 100 + l as i32, 0, l),
        Expr::column(int, 100 + r as i32, 1, r),
    )
}

fn unit(inputs: usize, inner_join_quals: Vec<ExprRef>) -> ExecutionUnit {
    ExecutionUnit {
        input_descs: (0..inputs)
            .map(|i| InputDescriptor::new(100 + i as i32, i))
            .collect(),
        inner_join_quals,
        ..ExecutionUnit::default()
    }
}

fn ctx(impl_type: JoinImplType, registered: Vec<ExprRef>) -> CompilationContext<FunctionBuilder> {
    CompilationContext::new(
        FunctionBuilder::new("row_func"),
        JoinInfo::new(impl_type, registered),
    )
}

fn returns(e: &FunctionBuilder) -> usize {
    e.count_where(|i| matches!(i, Inst::Ret { .. }))
}

/// A qual of a hybrid unit with `inputs` relations: `(expr, folds)`.
fn hybrid_qual(inputs: usize) -> impl Strategy<Value = (ExprRef, bool)> {
    let hash_group = inputs - 2;
    (0..3_u8, 0..inputs, 0..inputs).prop_map(move |(shape, l, r)| match shape {
        0 => {
            let (l, r) = (l % hash_group, r % hash_group);
            (qual(BinaryOp::Eq, l, r), true)
        }
        1 => {
            let l = l % hash_group;
            (qual(BinaryOp::Lt, l, r % hash_group), false)
        }
        _ => {
            let r = hash_group + r % 2;
            (qual(BinaryOp::Eq, l, r), false)
        }
    })
}

// ─── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn prop_ret_on_hash_fail_block_counts(registry_len in 0_usize..5, pick in 0_usize..6) {
        let registry: Vec<ExprRef> = (0..registry_len).map(|i| qual(BinaryOp::Eq, i, i + 1)).collect();
        let probe = registry.get(pick).cloned().unwrap_or_else(|| qual(BinaryOp::Eq, 9, 8));
        let registered = pick < registry_len;

        let mut ctx = ctx(JoinImplType::HashJoin, registry);
        let pos = ctx.row_pos();
        let cond = ctx.to_bool(pos);
        let before = ctx.emitter().block_count();
        let out = ctx.codegen_ret_on_hash_fail(cond, &probe);
        let created = ctx.emitter().block_count() - before;

        if registered {
            prop_assert_eq!(created, 2);
            prop_assert_eq!(out, Value::bool(true));
            let pass = format!("hash_pass_{pick}");
            prop_assert!(ctx.emitter().block_by_name(&pass).is_some());
        } else {
            prop_assert_eq!(created, 0);
            prop_assert_eq!(out, cond);
        }
    }

    #[test]
    fn prop_non_hybrid_units_keep_their_quals(
        inputs in 1_usize..6,
        hash in any::<bool>(),
        count in 0_usize..5,
    ) {
        let quals: Vec<ExprRef> = (0..count).map(|i| qual(BinaryOp::Eq, 0, i % inputs)).collect();
        let impl_type = if hash { JoinImplType::HashJoin } else { JoinImplType::Loop };
        let mut ctx = ctx(impl_type, vec![]);
        let out = ctx
            .codegen_hash_joins_before_loop_join(&quals, &unit(inputs, quals.clone()), &CompilationOptions::cpu())
            .unwrap();
        prop_assert_eq!(out.iter().map(node_id).collect::<Vec<_>>(), quals.iter().map(node_id).collect::<Vec<_>>());
        prop_assert_eq!(ctx.emitter().instruction_count(), 0);
    }

    #[test]
    fn prop_hybrid_strips_exactly_the_hash_group_equalities(
        (inputs, quals) in (3_usize..7).prop_flat_map(|n| (Just(n), prop::collection::vec(hybrid_qual(n), 0..6)))
    ) {
        let exprs: Vec<ExprRef> = quals.iter().map(|(q, _)| q.clone()).collect();
        let folded: Vec<usize> = quals.iter().filter(|(_, f)| *f).map(|(q, _)| node_id(q)).collect();

        let mut ctx = ctx(JoinImplType::HashPlusLoop, vec![]);
        let out = ctx
            .codegen_hash_joins_before_loop_join(&exprs, &unit(inputs, exprs.clone()), &CompilationOptions::cpu())
            .unwrap();

        prop_assert_eq!(out.len(), exprs.len() - folded.len());
        prop_assert!(out.iter().all(|q| !folded.contains(&node_id(q))));
        let e = ctx.emitter();
        let expected_returns = usize::from(!folded.is_empty());
        prop_assert_eq!(returns(e), expected_returns);
        prop_assert_eq!(e.block_by_name("match_false").is_some(), !folded.is_empty());
    }
}

// ─── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn four_inputs_two_hash_group_equalities_leave_nothing_for_the_loop() {
    let quals = vec![qual(BinaryOp::Eq, 0, 1), qual(BinaryOp::Eq, 1, 0)];
    let mut ctx = ctx(JoinImplType::HashPlusLoop, vec![]);
    let out = ctx
        .codegen_hash_joins_before_loop_join(&quals, &unit(4, quals.clone()), &CompilationOptions::cpu())
        .unwrap();
    assert!(out.is_empty());

    let e = ctx.emitter();
    assert_eq!(returns(e), 1);
    let unmatched = e.block_by_name("match_false").unwrap();
    assert_eq!(
        e.instructions(unmatched),
        &[Inst::Ret {
            value: Value::i32(NO_MATCH)
        }]
    );
    assert_eq!(e.insert_block(), e.block_by_name("match_true").unwrap());
}

#[test]
fn hybrid_unit_with_two_inputs_is_fatal() {
    let quals = vec![qual(BinaryOp::Eq, 0, 1)];
    let mut ctx = ctx(JoinImplType::HashPlusLoop, vec![]);
    let err = ctx
        .codegen_hash_joins_before_loop_join(&quals, &unit(2, quals.clone()), &CompilationOptions::cpu())
        .unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn inner_scan_without_labels_returns_once() {
    let mut ctx = ctx(JoinImplType::Loop, vec![]);
    ctx.codegen_inner_scan_next_row().unwrap();
    let e = ctx.emitter();
    assert_eq!(returns(e), 1);
    assert_eq!(e.count_where(|i| matches!(i, Inst::Br { .. } | Inst::CondBr { .. })), 0);
}

#[test]
fn inner_scan_with_one_label_advances_and_loops_back() {
    let mut ctx = ctx(JoinImplType::Loop, vec![]);
    let it = ctx.emitter_mut().param("inner_it", IrType::I64);
    let slot = ctx.emitter_mut().param("inner_it_slot", IrType::Ptr);
    ctx.register_scan_iterator(InputDescriptor::new(101, 1), it, slot);
    let label = ctx.emitter_mut().create_block("inner_scan_continue");
    ctx.add_inner_scan_label(label);

    // Columns of the scanned relation read at the iterator.
    let col = Expr::column(TypeInfo::new(SqlType::Int), 101, 0, 1);
    assert_eq!(ctx.pos_arg(&col), it);

    ctx.codegen_inner_scan_next_row().unwrap();
    let e = ctx.emitter();
    assert_eq!(e.count_where(|i| matches!(i, Inst::Store { ptr, .. } if *ptr == slot)), 1);
    assert_eq!(e.count_where(|i| matches!(i, Inst::Br { target } if *target == label)), 1);
    assert_eq!(returns(e), 0);
}

#[test]
fn filter_quals_combine_with_hash_join_guards() {
    let registered = qual(BinaryOp::Eq, 0, 1);
    let residual = qual(BinaryOp::Lt, 0, 1);
    let mut ctx = ctx(JoinImplType::HashJoin, vec![registered.clone()]);
    let filter = ctx
        .codegen_quals(&[registered, residual], &CompilationOptions::cpu())
        .unwrap();
    assert_eq!(filter.ty(), IrType::I1);
    let e = ctx.emitter();
    assert_eq!(returns(e), 1);
    assert!(e.block_by_name("hash_fail_0").is_some());
}
