//! Shared vocabulary for the rowfn code generator.
//!
//! - [`sql_type`]: logical SQL types as seen by the analyzer, their physical
//!   widths, encodings, and in-band null sentinels.
//! - [`ir`]: the native IR the code generator emits: value handles, block
//!   handles, instruction shapes.

pub mod ir;
pub mod sql_type;

pub use ir::{
    BinOp, BlockId, CastKind, Const, FloatPredicate, Inst, IntPredicate, IrType, LocalId, Value,
};
pub use sql_type::{
    Compression, SqlType, TypeInfo, inline_fp_null_val, inline_int_null_val, log2_bytes,
    numeric_type_name,
};
