//! Native IR vocabulary.
//!
//! The code generator never inspects emitted instructions; it only holds
//! [`Value`] and [`BlockId`] handles returned by the emitter. The instruction
//! shapes in [`Inst`] exist so that an emitter can record what it was asked
//! to produce (see `rowfn-emit`).

use std::fmt;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Machine-level type of a value in the emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrType {
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// Untyped address (stack cells, column buffers, string payloads).
    Ptr,
}

impl IrType {
    /// Integer type of the given bit width.
    pub const fn int(bits: u32) -> Option<Self> {
        match bits {
            1 => Some(Self::I1),
            8 => Some(Self::I8),
            16 => Some(Self::I16),
            32 => Some(Self::I32),
            64 => Some(Self::I64),
            _ => None,
        }
    }

    /// Floating-point type of the given bit width.
    pub const fn fp(bits: u32) -> Option<Self> {
        match bits {
            32 => Some(Self::F32),
            64 => Some(Self::F64),
            _ => None,
        }
    }

    /// Scalar size in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::I1 => 1,
            Self::I8 => 8,
            Self::I16 => 16,
            Self::I32 | Self::F32 => 32,
            Self::I64 | Self::F64 | Self::Ptr => 64,
        }
    }

    pub const fn is_int(self) -> bool {
        matches!(
            self,
            Self::I1 | Self::I8 | Self::I16 | Self::I32 | Self::I64
        )
    }

    pub const fn is_fp(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::I1 => "i1",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::Ptr => "ptr",
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Handle to a control-flow block of the function under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u32);

impl BlockId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to the result of one emitted instruction (or a function parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(u32);

impl LocalId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compile-time constant.
///
/// Floating-point payloads are kept as `f64` bits so constants compare and
/// hash exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Const {
    Int { ty: IrType, value: i64 },
    Fp { ty: IrType, bits: u64 },
}

/// Opaque handle to a value in the emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Const(Const),
    Local { id: LocalId, ty: IrType },
}

impl Value {
    /// Integer constant of type `ty`, truncated to the type's width.
    pub const fn int(ty: IrType, value: i64) -> Self {
        let value = match ty {
            IrType::I1 => (value != 0) as i64,
            IrType::I8 => value as i8 as i64,
            IrType::I16 => value as i16 as i64,
            IrType::I32 => value as i32 as i64,
            _ => value,
        };
        Self::Const(Const::Int { ty, value })
    }

    pub const fn bool(value: bool) -> Self {
        Self::int(IrType::I1, value as i64)
    }

    pub const fn i8(value: i8) -> Self {
        Self::int(IrType::I8, value as i64)
    }

    pub const fn i32(value: i32) -> Self {
        Self::int(IrType::I32, value as i64)
    }

    pub const fn i64(value: i64) -> Self {
        Self::int(IrType::I64, value)
    }

    pub fn f32(value: f32) -> Self {
        Self::Const(Const::Fp {
            ty: IrType::F32,
            bits: f64::from(value).to_bits(),
        })
    }

    pub fn f64(value: f64) -> Self {
        Self::Const(Const::Fp {
            ty: IrType::F64,
            bits: value.to_bits(),
        })
    }

    /// Floating-point constant of type `ty` (`F32` rounds).
    pub fn fp(ty: IrType, value: f64) -> Self {
        match ty {
            IrType::F32 => Self::f32(value as f32),
            _ => Self::f64(value),
        }
    }

    pub const fn local(id: LocalId, ty: IrType) -> Self {
        Self::Local { id, ty }
    }

    pub const fn ty(&self) -> IrType {
        match self {
            Self::Const(Const::Int { ty, .. } | Const::Fp { ty, .. }) | Self::Local { ty, .. } => {
                *ty
            }
        }
    }

    pub const fn is_const(&self) -> bool {
        matches!(self, Self::Const(_))
    }

    /// The integer payload of a constant, if this is an integer constant.
    pub const fn as_const_int(&self) -> Option<i64> {
        match self {
            Self::Const(Const::Int { value, .. }) => Some(*value),
            _ => None,
        }
    }

    /// The payload of a floating-point constant.
    pub fn as_const_fp(&self) -> Option<f64> {
        match self {
            Self::Const(Const::Fp { bits, .. }) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const(Const::Int { ty, value }) => write!(f, "{ty} {value}"),
            Self::Const(Const::Fp { ty, bits }) => write!(f, "{ty} {}", f64::from_bits(*bits)),
            Self::Local { id, ty } => write!(f, "{ty} %{}", id.0),
        }
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// Two-operand arithmetic / bitwise operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    SRem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
}

impl BinOp {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::SDiv => "sdiv",
            Self::SRem => "srem",
            Self::FAdd => "fadd",
            Self::FSub => "fsub",
            Self::FMul => "fmul",
            Self::FDiv => "fdiv",
            Self::FRem => "frem",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }
}

/// Signed integer comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
}

impl IntPredicate {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Sgt => "sgt",
            Self::Sge => "sge",
        }
    }
}

/// Ordered floating-point comparison predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatPredicate {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FloatPredicate {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Oeq => "oeq",
            Self::One => "one",
            Self::Olt => "olt",
            Self::Ole => "ole",
            Self::Ogt => "ogt",
            Self::Oge => "oge",
        }
    }
}

/// Conversion between IR types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    Trunc,
    SExt,
    ZExt,
    FpToSi,
    SiToFp,
    FpTrunc,
    FpExt,
    PtrToInt,
    /// Reinterpret the bits; source and target have the same width.
    BitCast,
}

impl CastKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trunc => "trunc",
            Self::SExt => "sext",
            Self::ZExt => "zext",
            Self::FpToSi => "fptosi",
            Self::SiToFp => "sitofp",
            Self::FpTrunc => "fptrunc",
            Self::FpExt => "fpext",
            Self::PtrToInt => "ptrtoint",
            Self::BitCast => "bitcast",
        }
    }
}

/// One emitted instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Inst {
    Binary {
        dst: LocalId,
        op: BinOp,
        lhs: Value,
        rhs: Value,
    },
    ICmp {
        dst: LocalId,
        pred: IntPredicate,
        lhs: Value,
        rhs: Value,
    },
    FCmp {
        dst: LocalId,
        pred: FloatPredicate,
        lhs: Value,
        rhs: Value,
    },
    Cast {
        dst: LocalId,
        kind: CastKind,
        value: Value,
        to: IrType,
    },
    /// Reserve a stack cell of type `ty`; `dst` is its address.
    Alloca { dst: LocalId, ty: IrType },
    Load {
        dst: LocalId,
        ty: IrType,
        ptr: Value,
    },
    Store { value: Value, ptr: Value },
    /// Call a named external runtime function.
    Call {
        dst: LocalId,
        callee: String,
        ret: IrType,
        args: Vec<Value>,
    },
    Br { target: BlockId },
    CondBr {
        cond: Value,
        then_block: BlockId,
        else_block: BlockId,
    },
    Ret { value: Value },
}

impl Inst {
    /// Whether this instruction ends a block.
    pub const fn is_terminator(&self) -> bool {
        matches!(self, Self::Br { .. } | Self::CondBr { .. } | Self::Ret { .. })
    }

    /// Successor blocks named by a terminator.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Br { target } => vec![*target],
            Self::CondBr {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            _ => Vec::new(),
        }
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Binary { op, .. } => op.name(),
            Self::ICmp { .. } => "icmp",
            Self::FCmp { .. } => "fcmp",
            Self::Cast { kind, .. } => kind.name(),
            Self::Alloca { .. } => "alloca",
            Self::Load { .. } => "load",
            Self::Store { .. } => "store",
            Self::Call { .. } => "call",
            Self::Br { .. } | Self::CondBr { .. } => "br",
            Self::Ret { .. } => "ret",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_constants_truncate_to_width() {
        assert_eq!(Value::int(IrType::I8, 300).as_const_int(), Some(44));
        assert_eq!(Value::int(IrType::I1, 5).as_const_int(), Some(1));
        assert_eq!(Value::i32(i32::MIN).as_const_int(), Some(i64::from(i32::MIN)));
        assert_eq!(Value::bool(false).ty(), IrType::I1);
    }

    #[test]
    fn fp_constants_compare_by_bits() {
        assert_eq!(Value::f64(1.5), Value::f64(1.5));
        assert_ne!(Value::f64(0.0), Value::f64(-0.0));
        assert_eq!(Value::f32(2.5).ty(), IrType::F32);
        assert_eq!(Value::f32(2.5).as_const_fp(), Some(2.5));
        assert_eq!(Value::fp(IrType::F64, 3.0), Value::f64(3.0));
    }

    #[test]
    fn local_values_are_not_constants() {
        let v = Value::local(LocalId::new(3), IrType::I64);
        assert!(!v.is_const());
        assert_eq!(v.as_const_int(), None);
        assert_eq!(v.to_string(), "i64 %3");
    }

    #[test]
    fn type_widths() {
        assert_eq!(IrType::int(32), Some(IrType::I32));
        assert_eq!(IrType::int(24), None);
        assert_eq!(IrType::fp(64), Some(IrType::F64));
        assert_eq!(IrType::Ptr.bits(), 64);
        assert!(IrType::I1.is_int());
        assert!(!IrType::Ptr.is_int());
    }

    #[test]
    fn terminators() {
        let br = Inst::Br {
            target: BlockId::new(2),
        };
        assert!(br.is_terminator());
        assert_eq!(br.successors(), vec![BlockId::new(2)]);
        let store = Inst::Store {
            value: Value::i32(0),
            ptr: Value::local(LocalId::new(0), IrType::Ptr),
        };
        assert!(!store.is_terminator());
        assert!(store.successors().is_empty());
        assert_eq!(store.mnemonic(), "store");
    }
}
