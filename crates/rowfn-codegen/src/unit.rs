//! Execution-unit descriptor and join metadata.

use std::collections::HashMap;

use rowfn_ast::{Expr, ExprRef, node_id};

/// One relation input of a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InputDescriptor {
    pub table_id: i32,
    /// Position of the relation in the join (its `rte_idx`).
    pub nest_level: usize,
}

impl InputDescriptor {
    pub const fn new(table_id: i32, nest_level: usize) -> Self {
        Self {
            table_id,
            nest_level,
        }
    }
}

/// The relational slice compiled into one row function.
#[derive(Debug, Clone, Default)]
pub struct ExecutionUnit {
    /// Relation inputs, outermost first.
    pub input_descs: Vec<InputDescriptor>,
    /// Inner join qualifiers, in plan order.
    pub inner_join_quals: Vec<ExprRef>,
    /// Residual filter qualifiers.
    pub quals: Vec<ExprRef>,
    /// Group-by expressions, in declaration order.
    pub groupby_exprs: Vec<ExprRef>,
}

/// Join strategy of a compiled unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum JoinImplType {
    /// No join, or a plain nested loop.
    #[default]
    Loop,
    /// Hash join over every relation.
    HashJoin,
    /// Hash join over the leading relations, nested loop over the last two.
    HashPlusLoop,
}

/// Join metadata of a compiled unit.
///
/// The equi-join predicate registry maps each predicate, by node identity,
/// to its position in `equi_join_tautologies`. It is built once, when the
/// metadata is created.
#[derive(Debug, Clone, Default)]
pub struct JoinInfo {
    join_impl_type: JoinImplType,
    equi_join_tautologies: Vec<ExprRef>,
    registry: HashMap<usize, usize>,
}

impl JoinInfo {
    pub fn new(join_impl_type: JoinImplType, equi_join_tautologies: Vec<ExprRef>) -> Self {
        let mut registry = HashMap::with_capacity(equi_join_tautologies.len());
        for (i, cond) in equi_join_tautologies.iter().enumerate() {
            registry.entry(node_id(cond)).or_insert(i);
        }
        Self {
            join_impl_type,
            equi_join_tautologies,
            registry,
        }
    }

    pub const fn join_impl_type(&self) -> JoinImplType {
        self.join_impl_type
    }

    pub fn equi_join_tautologies(&self) -> &[ExprRef] {
        &self.equi_join_tautologies
    }

    /// Registry position of `qual`. Only binary operators are ever registered.
    pub fn registry_index(&self, qual: &ExprRef) -> Option<usize> {
        if !matches!(**qual, Expr::BinOper { .. }) {
            return None;
        }
        self.registry.get(&node_id(qual)).copied()
    }
}
