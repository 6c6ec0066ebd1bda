// Row-function emission.
//
// This crate provides the abstract emission interface the code generator
// drives (`IrEmitter`), plus `FunctionBuilder`: an in-memory implementation
// that records blocks and instructions, validates terminators on `finish`,
// and disassembles the result. The IR vocabulary lives in rowfn-types.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, BlockId, CastKind, FloatPredicate, Inst, IntPredicate, IrType, LocalId, Value};
use tracing::debug;

// ── Emission Interface ──────────────────────────────────────────────────────

/// Consumer of the instructions the code generator produces.
///
/// The code generator is a pure producer: it never reads an instruction
/// back. Every value-producing method returns a fresh [`Value`] handle.
/// Instructions are appended to the block under the emission cursor.
pub trait IrEmitter {
    /// Declare a function parameter.
    fn param(&mut self, name: &str, ty: IrType) -> Value;

    /// Create a block at the end of the function layout.
    fn create_block(&mut self, name: &str) -> BlockId;

    /// Create a block placed immediately after `after` in the layout.
    fn create_block_after(&mut self, name: &str, after: BlockId) -> BlockId;

    /// The block under the emission cursor.
    fn insert_block(&self) -> BlockId;

    /// Move the emission cursor to the end of `block`.
    fn set_insert_point(&mut self, block: BlockId);

    fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value;

    fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value;

    fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value;

    fn cast(&mut self, kind: CastKind, value: Value, to: IrType) -> Value;

    /// Reserve a stack cell; the result is its address.
    fn alloca(&mut self, ty: IrType) -> Value;

    fn load(&mut self, ty: IrType, ptr: Value) -> Value;

    fn store(&mut self, value: Value, ptr: Value);

    /// Call the named external runtime function.
    fn call(&mut self, callee: &str, ret: IrType, args: &[Value]) -> Value;

    fn br(&mut self, target: BlockId);

    fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId);

    fn ret(&mut self, value: Value);
}

// ── Function Builder ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
struct BlockData {
    name: String,
    insts: Vec<Inst>,
}

/// A row function under construction.
///
/// Starts with a single `entry` block under the cursor. Value numbering is
/// sequential and shared by parameters and instruction results, so building
/// the same instruction stream twice yields identical functions.
#[derive(Debug)]
pub struct FunctionBuilder {
    name: String,
    params: Vec<(String, Value)>,
    /// Block storage (indexed by `BlockId`).
    blocks: Vec<BlockData>,
    /// Layout order of blocks.
    layout: Vec<BlockId>,
    cursor: BlockId,
    next_local: u32,
    /// Name → number of blocks already created with it.
    name_uses: HashMap<String, u32>,
}

impl FunctionBuilder {
    /// Create a builder with an empty `entry` block.
    pub fn new(name: impl Into<String>) -> Self {
        let mut builder = Self {
            name: name.into(),
            params: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
            cursor: BlockId::new(0),
            next_local: 0,
            name_uses: HashMap::new(),
        };
        let entry = builder.new_block("entry");
        builder.layout.push(entry);
        builder.cursor = entry;
        builder
    }

    fn new_block(&mut self, name: &str) -> BlockId {
        let uses = self.name_uses.entry(name.to_owned()).or_insert(0);
        let unique = if *uses == 0 {
            name.to_owned()
        } else {
            format!("{name}.{uses}")
        };
        *uses += 1;
        let id = BlockId::new(u32::try_from(self.blocks.len()).unwrap_or(u32::MAX));
        self.blocks.push(BlockData {
            name: unique,
            insts: Vec::new(),
        });
        id
    }

    fn fresh(&mut self, ty: IrType) -> (LocalId, Value) {
        let id = LocalId::new(self.next_local);
        self.next_local += 1;
        (id, Value::local(id, ty))
    }

    fn push(&mut self, inst: Inst) {
        self.blocks[self.cursor.index()].insts.push(inst);
    }

    // ── Inspection ──────────────────────────────────────────────────────

    /// Number of blocks created so far, including `entry`.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Blocks in layout order.
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    pub fn block_name(&self, block: BlockId) -> &str {
        &self.blocks[block.index()].name
    }

    /// Find a block by its (deduplicated) name.
    pub fn block_by_name(&self, name: &str) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(BlockId::new)
    }

    /// Instructions recorded in `block`.
    pub fn instructions(&self, block: BlockId) -> &[Inst] {
        &self.blocks[block.index()].insts
    }

    /// Every recorded instruction, in layout order.
    pub fn all_instructions(&self) -> impl Iterator<Item = &Inst> {
        self.layout
            .iter()
            .flat_map(|b| self.blocks[b.index()].insts.iter())
    }

    /// Number of recorded instructions matching `pred`.
    pub fn count_where(&self, pred: impl Fn(&Inst) -> bool) -> usize {
        self.all_instructions().filter(|inst| pred(inst)).count()
    }

    /// Names of every external function called, in emission order.
    pub fn callees(&self) -> Vec<&str> {
        self.all_instructions()
            .filter_map(|inst| match inst {
                Inst::Call { callee, .. } => Some(callee.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Total instructions recorded.
    pub fn instruction_count(&self) -> usize {
        self.blocks.iter().map(|b| b.insts.len()).sum()
    }

    // ── Finalization ────────────────────────────────────────────────────

    /// Validate that every block ends in exactly one terminator and return
    /// the finished function.
    pub fn finish(self) -> Result<RowFunction> {
        for id in &self.layout {
            let block = &self.blocks[id.index()];
            let terminators = block.insts.iter().filter(|i| i.is_terminator()).count();
            match block.insts.last() {
                Some(last) if last.is_terminator() && terminators == 1 => {}
                _ if terminators == 0 => {
                    return Err(RowFnError::UnterminatedBlock {
                        block: block.name.clone(),
                    });
                }
                _ => {
                    return Err(RowFnError::internal(format!(
                        "block '{}' has {terminators} terminators or code after its terminator",
                        block.name
                    )));
                }
            }
        }

        debug!(
            target: "rowfn.emit",
            function = %self.name,
            blocks = self.layout.len(),
            instructions = self.instruction_count(),
            "row function finished"
        );

        let blocks = self
            .layout
            .iter()
            .map(|id| {
                let data = &self.blocks[id.index()];
                Block {
                    id: *id,
                    name: data.name.clone(),
                    insts: data.insts.clone(),
                }
            })
            .collect();

        Ok(RowFunction {
            name: self.name,
            params: self.params,
            blocks,
        })
    }
}

impl IrEmitter for FunctionBuilder {
    fn param(&mut self, name: &str, ty: IrType) -> Value {
        let (_, value) = self.fresh(ty);
        self.params.push((name.to_owned(), value));
        value
    }

    fn create_block(&mut self, name: &str) -> BlockId {
        let id = self.new_block(name);
        self.layout.push(id);
        id
    }

    fn create_block_after(&mut self, name: &str, after: BlockId) -> BlockId {
        let id = self.new_block(name);
        let pos = self
            .layout
            .iter()
            .position(|b| *b == after)
            .map_or(self.layout.len(), |p| p + 1);
        self.layout.insert(pos, id);
        id
    }

    fn insert_block(&self) -> BlockId {
        self.cursor
    }

    fn set_insert_point(&mut self, block: BlockId) {
        self.cursor = block;
    }

    fn binary(&mut self, op: BinOp, lhs: Value, rhs: Value) -> Value {
        let (dst, value) = self.fresh(lhs.ty());
        self.push(Inst::Binary { dst, op, lhs, rhs });
        value
    }

    fn icmp(&mut self, pred: IntPredicate, lhs: Value, rhs: Value) -> Value {
        let (dst, value) = self.fresh(IrType::I1);
        self.push(Inst::ICmp {
            dst,
            pred,
            lhs,
            rhs,
        });
        value
    }

    fn fcmp(&mut self, pred: FloatPredicate, lhs: Value, rhs: Value) -> Value {
        let (dst, value) = self.fresh(IrType::I1);
        self.push(Inst::FCmp {
            dst,
            pred,
            lhs,
            rhs,
        });
        value
    }

    fn cast(&mut self, kind: CastKind, value: Value, to: IrType) -> Value {
        let (dst, result) = self.fresh(to);
        self.push(Inst::Cast {
            dst,
            kind,
            value,
            to,
        });
        result
    }

    fn alloca(&mut self, ty: IrType) -> Value {
        let (dst, value) = self.fresh(IrType::Ptr);
        self.push(Inst::Alloca { dst, ty });
        value
    }

    fn load(&mut self, ty: IrType, ptr: Value) -> Value {
        let (dst, value) = self.fresh(ty);
        self.push(Inst::Load { dst, ty, ptr });
        value
    }

    fn store(&mut self, value: Value, ptr: Value) {
        self.push(Inst::Store { value, ptr });
    }

    fn call(&mut self, callee: &str, ret: IrType, args: &[Value]) -> Value {
        let (dst, value) = self.fresh(ret);
        self.push(Inst::Call {
            dst,
            callee: callee.to_owned(),
            ret,
            args: args.to_vec(),
        });
        value
    }

    fn br(&mut self, target: BlockId) {
        self.push(Inst::Br { target });
    }

    fn cond_br(&mut self, cond: Value, then_block: BlockId, else_block: BlockId) {
        self.push(Inst::CondBr {
            cond,
            then_block,
            else_block,
        });
    }

    fn ret(&mut self, value: Value) {
        self.push(Inst::Ret { value });
    }
}

// ── Row Function ────────────────────────────────────────────────────────────

/// One block of a finished function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub name: String,
    pub insts: Vec<Inst>,
}

/// A finished, validated row function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFunction {
    name: String,
    params: Vec<(String, Value)>,
    /// Blocks in layout order.
    blocks: Vec<Block>,
}

impl RowFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn block_label(&self, id: BlockId) -> &str {
        self.blocks
            .iter()
            .find(|b| b.id == id)
            .map_or("<detached>", |b| b.name.as_str())
    }

    fn write_inst(&self, out: &mut String, inst: &Inst) -> fmt::Result {
        match inst {
            Inst::Binary { dst, op, lhs, rhs } => {
                write!(out, "%{} = {} {lhs}, {rhs}", dst.index(), op.name())
            }
            Inst::ICmp {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(out, "%{} = icmp {} {lhs}, {rhs}", dst.index(), pred.name()),
            Inst::FCmp {
                dst,
                pred,
                lhs,
                rhs,
            } => write!(out, "%{} = fcmp {} {lhs}, {rhs}", dst.index(), pred.name()),
            Inst::Cast {
                dst,
                kind,
                value,
                to,
            } => write!(out, "%{} = {} {value} to {to}", dst.index(), kind.name()),
            Inst::Alloca { dst, ty } => write!(out, "%{} = alloca {ty}", dst.index()),
            Inst::Load { dst, ty, ptr } => write!(out, "%{} = load {ty}, {ptr}", dst.index()),
            Inst::Store { value, ptr } => write!(out, "store {value}, {ptr}"),
            Inst::Call {
                dst,
                callee,
                ret,
                args,
            } => {
                write!(out, "%{} = call {ret} @{callee}(", dst.index())?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    write!(out, "{arg}")?;
                }
                out.push(')');
                Ok(())
            }
            Inst::Br { target } => write!(out, "br label %{}", self.block_label(*target)),
            Inst::CondBr {
                cond,
                then_block,
                else_block,
            } => write!(
                out,
                "br {cond}, label %{}, label %{}",
                self.block_label(*then_block),
                self.block_label(*else_block)
            ),
            Inst::Ret { value } => write!(out, "ret {value}"),
        }
    }

    /// Disassemble the function to LLVM-flavoured text.
    ///
    /// ```text
    /// define i32 @row_func(i64 %0 pos) {
    /// entry:
    ///   ret i32 0
    /// }
    /// ```
    pub fn disassemble(&self) -> String {
        let mut out = String::with_capacity(self.blocks.len() * 80);
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(name, value)| format!("{value} {name}"))
            .collect();
        let _ = writeln!(out, "define i32 @{}({}) {{", self.name, params.join(", "));
        for block in &self.blocks {
            let _ = writeln!(out, "{}:", block.name);
            for inst in &block.insts {
                out.push_str("  ");
                let _ = self.write_inst(&mut out, inst);
                out.push('\n');
            }
        }
        out.push_str("}\n");
        out
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
