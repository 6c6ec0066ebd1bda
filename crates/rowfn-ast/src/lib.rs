//! Analyzed scalar expression tree.
//!
//! The relational planner hands the code generator a typed, pre-validated
//! DAG of scalar expressions. Nodes are shared through [`ExprRef`]; the code
//! generator never mutates them. Node identity (the address behind the
//! `Arc`) is significant: the equi-join predicate registry of a compiled unit
//! refers to nodes by identity, not by structure.

mod display;

use std::collections::BTreeSet;
use std::sync::Arc;

use rowfn_types::TypeInfo;

/// Shared handle to an expression node.
pub type ExprRef = Arc<Expr>;

/// Stable identity of a shared node, used as a registry key.
pub fn node_id(expr: &ExprRef) -> usize {
    Arc::as_ptr(expr) as usize
}

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Class of a binary operator. Every operator belongs to exactly one class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpClass {
    Arithmetic,
    Comparison,
    Logic,
    ArrayAt,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    // Arithmetic
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Logical
    And,
    Or,

    // Subscript
    ArrayAt,
}

impl BinaryOp {
    pub const ALL: [Self; 14] = [
        Self::Plus,
        Self::Minus,
        Self::Multiply,
        Self::Divide,
        Self::Modulo,
        Self::Eq,
        Self::Ne,
        Self::Lt,
        Self::Le,
        Self::Gt,
        Self::Ge,
        Self::And,
        Self::Or,
        Self::ArrayAt,
    ];

    pub const fn class(self) -> OpClass {
        match self {
            Self::Plus | Self::Minus | Self::Multiply | Self::Divide | Self::Modulo => {
                OpClass::Arithmetic
            }
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => OpClass::Comparison,
            Self::And | Self::Or => OpClass::Logic,
            Self::ArrayAt => OpClass::ArrayAt,
        }
    }

    pub const fn is_arithmetic(self) -> bool {
        matches!(self.class(), OpClass::Arithmetic)
    }

    pub const fn is_comparison(self) -> bool {
        matches!(self.class(), OpClass::Comparison)
    }

    pub const fn is_logic(self) -> bool {
        matches!(self.class(), OpClass::Logic)
    }

    /// Stem used in runtime helper names (`add_int32_t_nullable`, ...).
    pub const fn runtime_name(self) -> &'static str {
        match self {
            Self::Plus => "add",
            Self::Minus => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
            Self::Modulo => "mod",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::And => "logical_and",
            Self::Or => "logical_or",
            Self::ArrayAt => "array_at",
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    /// Conversion to the node's declared type.
    Cast,
    UMinus,
    IsNull,
    /// Array expansion into one evaluation pass per element.
    Unnest,
}

impl UnaryOp {
    pub const ALL: [Self; 5] = [
        Self::Not,
        Self::Cast,
        Self::UMinus,
        Self::IsNull,
        Self::Unnest,
    ];
}

/// Field selector for EXTRACT, DATEDIFF and DATE_TRUNC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    Year,
    Quarter,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    DayOfWeek,
    DayOfYear,
    Week,
    Epoch,
}

impl DateField {
    /// Code passed to the runtime date helpers.
    pub const fn code(self) -> i32 {
        self as i32
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Payload of a non-null constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Bool(bool),
    /// Integers, decimals (already scaled), and time values.
    Int(i64),
    Fp(f64),
    Str(String),
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// An analyzed scalar expression.
///
/// The variant set is closed; every consumer matches it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// The iteration position of relation `rte_idx`.
    IterVar { ti: TypeInfo, rte_idx: usize },

    /// Column `column_id` of table `table_id`, read through relation `rte_idx`.
    ColumnVar {
        ti: TypeInfo,
        table_id: i32,
        column_id: i32,
        rte_idx: usize,
    },

    BinOper {
        ti: TypeInfo,
        op: BinaryOp,
        left: ExprRef,
        right: ExprRef,
    },

    UOper {
        ti: TypeInfo,
        op: UnaryOp,
        operand: ExprRef,
    },

    /// A literal; `value == None` is SQL NULL.
    Constant { ti: TypeInfo, value: Option<Datum> },

    /// `CASE WHEN .. THEN .. [ELSE ..] END`.
    Case {
        ti: TypeInfo,
        branches: Vec<(ExprRef, ExprRef)>,
        else_expr: Option<ExprRef>,
    },

    Extract {
        ti: TypeInfo,
        field: DateField,
        from: ExprRef,
    },

    Datediff {
        ti: TypeInfo,
        field: DateField,
        start: ExprRef,
        end: ExprRef,
    },

    Datetrunc {
        ti: TypeInfo,
        field: DateField,
        from: ExprRef,
    },

    /// `CHAR_LENGTH` (encoded length) or `LENGTH` (byte length).
    CharLength {
        ti: TypeInfo,
        arg: ExprRef,
        calc_encoded_length: bool,
    },

    Like {
        ti: TypeInfo,
        arg: ExprRef,
        pattern: ExprRef,
        escape: Option<ExprRef>,
        is_ilike: bool,
        /// Pattern is a plain prefix/suffix/substring match.
        is_simple: bool,
    },

    Regexp {
        ti: TypeInfo,
        arg: ExprRef,
        pattern: ExprRef,
        escape: Option<ExprRef>,
    },

    /// Selectivity hint; evaluates to its operand.
    Likelihood {
        ti: TypeInfo,
        arg: ExprRef,
        likelihood: f32,
    },

    /// `arg IN (v1, v2, ...)`.
    InValues {
        ti: TypeInfo,
        arg: ExprRef,
        values: Vec<ExprRef>,
    },

    /// `arg IN <set>` against a precomputed integer set.
    InIntegerSet {
        ti: TypeInfo,
        arg: ExprRef,
        values: Vec<i64>,
    },

    /// A runtime function with generic null propagation.
    FunctionOper {
        ti: TypeInfo,
        name: String,
        args: Vec<ExprRef>,
    },

    /// A runtime function that handles nulls and argument typing itself.
    FunctionOperWithCustomTypeHandling {
        ti: TypeInfo,
        name: String,
        args: Vec<ExprRef>,
    },
}

impl Expr {
    // ── Constructors ────────────────────────────────────────────────────

    pub fn iter_var(rte_idx: usize) -> ExprRef {
        Arc::new(Self::IterVar {
            ti: TypeInfo::new(rowfn_types::SqlType::BigInt).not_null(),
            rte_idx,
        })
    }

    pub fn column(ti: TypeInfo, table_id: i32, column_id: i32, rte_idx: usize) -> ExprRef {
        Arc::new(Self::ColumnVar {
            ti,
            table_id,
            column_id,
            rte_idx,
        })
    }

    pub fn constant(ti: TypeInfo, value: Datum) -> ExprRef {
        Arc::new(Self::Constant {
            ti,
            value: Some(value),
        })
    }

    pub fn null(ti: TypeInfo) -> ExprRef {
        Arc::new(Self::Constant { ti, value: None })
    }

    pub fn binary(ti: TypeInfo, op: BinaryOp, left: ExprRef, right: ExprRef) -> ExprRef {
        Arc::new(Self::BinOper {
            ti,
            op,
            left,
            right,
        })
    }

    pub fn unary(ti: TypeInfo, op: UnaryOp, operand: ExprRef) -> ExprRef {
        Arc::new(Self::UOper { ti, op, operand })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    /// Declared result type.
    pub const fn type_info(&self) -> &TypeInfo {
        match self {
            Self::IterVar { ti, .. }
            | Self::ColumnVar { ti, .. }
            | Self::BinOper { ti, .. }
            | Self::UOper { ti, .. }
            | Self::Constant { ti, .. }
            | Self::Case { ti, .. }
            | Self::Extract { ti, .. }
            | Self::Datediff { ti, .. }
            | Self::Datetrunc { ti, .. }
            | Self::CharLength { ti, .. }
            | Self::Like { ti, .. }
            | Self::Regexp { ti, .. }
            | Self::Likelihood { ti, .. }
            | Self::InValues { ti, .. }
            | Self::InIntegerSet { ti, .. }
            | Self::FunctionOper { ti, .. }
            | Self::FunctionOperWithCustomTypeHandling { ti, .. } => ti,
        }
    }

    /// Node kind, for diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::IterVar { .. } => "iter_var",
            Self::ColumnVar { .. } => "column_var",
            Self::BinOper { .. } => "bin_oper",
            Self::UOper { .. } => "u_oper",
            Self::Constant { .. } => "constant",
            Self::Case { .. } => "case",
            Self::Extract { .. } => "extract",
            Self::Datediff { .. } => "datediff",
            Self::Datetrunc { .. } => "datetrunc",
            Self::CharLength { .. } => "char_length",
            Self::Like { .. } => "like",
            Self::Regexp { .. } => "regexp",
            Self::Likelihood { .. } => "likelihood",
            Self::InValues { .. } => "in_values",
            Self::InIntegerSet { .. } => "in_integer_set",
            Self::FunctionOper { .. } => "function_oper",
            Self::FunctionOperWithCustomTypeHandling { .. } => "function_oper_custom",
        }
    }

    /// Whether this node is `UNNEST(..)`.
    pub const fn is_unnest(&self) -> bool {
        matches!(
            self,
            Self::UOper {
                op: UnaryOp::Unnest,
                ..
            }
        )
    }

    /// Direct children, in evaluation order.
    pub fn children(&self) -> Vec<&ExprRef> {
        match self {
            Self::IterVar { .. }
            | Self::ColumnVar { .. }
            | Self::Constant { .. } => Vec::new(),
            Self::BinOper { left, right, .. } => vec![left, right],
            Self::UOper { operand, .. } => vec![operand],
            Self::Case {
                branches,
                else_expr,
                ..
            } => branches
                .iter()
                .flat_map(|(when, then)| [when, then])
                .chain(else_expr)
                .collect(),
            Self::Extract { from, .. } | Self::Datetrunc { from, .. } => vec![from],
            Self::Datediff { start, end, .. } => vec![start, end],
            Self::CharLength { arg, .. }
            | Self::Likelihood { arg, .. }
            | Self::InIntegerSet { arg, .. } => vec![arg],
            Self::Like {
                arg,
                pattern,
                escape,
                ..
            }
            | Self::Regexp {
                arg,
                pattern,
                escape,
                ..
            } => [arg, pattern].into_iter().chain(escape).collect(),
            Self::InValues { arg, values, .. } => std::iter::once(arg).chain(values).collect(),
            Self::FunctionOper { args, .. }
            | Self::FunctionOperWithCustomTypeHandling { args, .. } => args.iter().collect(),
        }
    }

    /// Insert every relation index this expression reads into `out`.
    pub fn collect_rte_idx(&self, out: &mut BTreeSet<usize>) {
        match self {
            Self::IterVar { rte_idx, .. } | Self::ColumnVar { rte_idx, .. } => {
                out.insert(*rte_idx);
            }
            _ => {
                for child in self.children() {
                    child.collect_rte_idx(out);
                }
            }
        }
    }

    /// The set of relation indices this expression reads.
    pub fn rte_indices(&self) -> BTreeSet<usize> {
        let mut out = BTreeSet::new();
        self.collect_rte_idx(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use rowfn_types::SqlType;

    use super::*;

    fn int_col(rte_idx: usize, column_id: i32) -> ExprRef {
        Expr::column(TypeInfo::new(SqlType::Int), 1, column_id, rte_idx)
    }

    #[test]
    fn every_binary_op_has_one_class() {
        for op in BinaryOp::ALL {
            let hits = [op.is_arithmetic(), op.is_comparison(), op.is_logic()]
                .into_iter()
                .filter(|b| *b)
                .count();
            if op.class() == OpClass::ArrayAt {
                assert_eq!(hits, 0, "{op:?}");
            } else {
                assert_eq!(hits, 1, "{op:?}");
            }
        }
    }

    #[test]
    fn collect_rte_idx_walks_every_child() {
        let bool_ti = TypeInfo::new(SqlType::Boolean);
        let eq = Expr::binary(bool_ti, BinaryOp::Eq, int_col(0, 1), int_col(2, 1));
        let case = Arc::new(Expr::Case {
            ti: TypeInfo::new(SqlType::Int),
            branches: vec![(eq, int_col(1, 3))],
            else_expr: Some(int_col(3, 4)),
        });
        assert_eq!(case.rte_indices(), BTreeSet::from([0, 1, 2, 3]));
    }

    #[test]
    fn constants_reference_no_relation() {
        let c = Expr::constant(TypeInfo::new(SqlType::Int), Datum::Int(7));
        assert!(c.rte_indices().is_empty());
        assert!(c.children().is_empty());
    }

    #[test]
    fn node_identity_is_per_allocation() {
        let a = int_col(0, 1);
        let b = int_col(0, 1);
        assert_eq!(*a, *b);
        assert_ne!(node_id(&a), node_id(&b));
        assert_eq!(node_id(&a), node_id(&Arc::clone(&a)));
    }

    #[test]
    fn unnest_detection() {
        let arr = Expr::column(TypeInfo::array_of(SqlType::Int), 1, 2, 0);
        let unnest = Expr::unary(TypeInfo::new(SqlType::Int), UnaryOp::Unnest, arr);
        assert!(unnest.is_unnest());
        assert_eq!(unnest.kind_name(), "u_oper");
        assert!(!int_col(0, 1).is_unnest());
    }

    #[test]
    fn date_field_codes_are_ordinals() {
        assert_eq!(DateField::Year.code(), 0);
        assert_eq!(DateField::Epoch.code(), 13);
    }
}
