//! Row-function code generation.
//!
//! Lowers a typed scalar-expression tree, together with the control flow of
//! the physical join and group-by strategy, into one row-function body
//! through an [`IrEmitter`](rowfn_emit::IrEmitter):
//! - expression dispatch and the operator handlers it routes to
//! - early returns for predicates already enforced by a hash join
//! - nested-loop continuation for inner scans
//! - group-by keys, including inline loops over unnested arrays
//!
//! All per-unit state lives in a [`CompilationContext`]; compile
//! independent units with independent contexts.

pub mod context;
pub mod dispatch;
pub mod group_by;
pub mod hash_join;
pub mod inner_scan;
pub mod operators;
pub mod options;
pub mod quals;
pub mod quirks;
pub mod unit;

pub use context::{CompilationContext, IteratorSlot, LiteralPool};
pub use dispatch::Handler;
pub use group_by::{ArrayLoopStack, DiamondCodegen, GroupColumnValue};
pub use hash_join::NO_MATCH;
pub use operators::{bool_value, ir_type_of, null_bool, null_value};
pub use options::{
    COMPACTED_MIN_KEY_WIDTH, CompilationOptions, DEFAULT_KEY_WIDTH, DeviceType, GpuArchitecture,
};
pub use quirks::needs_unnest_double_spill;
pub use unit::{ExecutionUnit, InputDescriptor, JoinImplType, JoinInfo};
