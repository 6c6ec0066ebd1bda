//! Per-unit compilation state.

use std::collections::{BTreeMap, HashMap};

use rowfn_ast::Expr;
use rowfn_emit::IrEmitter;
use rowfn_types::{BinOp, BlockId, IntPredicate, IrType, Value};

use crate::unit::{InputDescriptor, JoinInfo};

/// Current value and backing stack slot of an inner-scan iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorSlot {
    pub value: Value,
    pub slot: Value,
}

/// Literals the compiled unit hands to the runtime by index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiteralPool {
    strings: Vec<String>,
    int_sets: Vec<Vec<i64>>,
}

impl LiteralPool {
    /// Intern a string literal and return its index.
    pub fn add_string(&mut self, s: &str) -> usize {
        if let Some(i) = self.strings.iter().position(|existing| existing == s) {
            return i;
        }
        self.strings.push(s.to_owned());
        self.strings.len() - 1
    }

    /// Intern an integer set and return its index.
    pub fn add_int_set(&mut self, values: &[i64]) -> usize {
        if let Some(i) = self.int_sets.iter().position(|existing| existing == values) {
            return i;
        }
        self.int_sets.push(values.to_vec());
        self.int_sets.len() - 1
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn int_sets(&self) -> &[Vec<i64>] {
        &self.int_sets
    }
}

/// Everything one row-function compilation reads and mutates.
///
/// Owned by the compiling thread for the lifetime of one unit. Independent
/// units need independent contexts.
#[derive(Debug)]
pub struct CompilationContext<E> {
    emitter: E,
    row_pos: Value,
    /// Fragment offset per secondary relation (`rte_idx`).
    frag_offsets: HashMap<usize, Value>,
    /// Hash-probe match position per relation.
    inner_positions: HashMap<usize, Value>,
    scan_to_iterator: BTreeMap<InputDescriptor, IteratorSlot>,
    inner_scan_labels: Vec<BlockId>,
    column_buffers: BTreeMap<(i32, i32), Value>,
    /// Decoded values per (rte_idx, table_id, column_id).
    fetched_columns: HashMap<(usize, i32, i32), Vec<Value>>,
    group_by_expr_cache: Vec<Value>,
    join_info: JoinInfo,
    literals: LiteralPool,
}

impl<E: IrEmitter> CompilationContext<E> {
    /// Start a unit: declares the `pos` parameter on `emitter`.
    pub fn new(mut emitter: E, join_info: JoinInfo) -> Self {
        let row_pos = emitter.param("pos", IrType::I64);
        Self {
            emitter,
            row_pos,
            frag_offsets: HashMap::new(),
            inner_positions: HashMap::new(),
            scan_to_iterator: BTreeMap::new(),
            inner_scan_labels: Vec::new(),
            column_buffers: BTreeMap::new(),
            fetched_columns: HashMap::new(),
            group_by_expr_cache: Vec::new(),
            join_info,
            literals: LiteralPool::default(),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn emitter_mut(&mut self) -> &mut E {
        &mut self.emitter
    }

    pub fn into_emitter(self) -> E {
        self.emitter
    }

    /// The current row position.
    pub const fn row_pos(&self) -> Value {
        self.row_pos
    }

    pub const fn join_info(&self) -> &JoinInfo {
        &self.join_info
    }

    /// Group-by key values, one per `group_by_column_codegen` call.
    pub fn group_by_expr_cache(&self) -> &[Value] {
        &self.group_by_expr_cache
    }

    pub const fn literals(&self) -> &LiteralPool {
        &self.literals
    }

    pub(crate) fn literals_mut(&mut self) -> &mut LiteralPool {
        &mut self.literals
    }

    pub fn inner_scan_labels(&self) -> &[BlockId] {
        &self.inner_scan_labels
    }

    pub(crate) fn scan_iterators(&self) -> impl ExactSizeIterator<Item = (&InputDescriptor, &IteratorSlot)> {
        self.scan_to_iterator.iter()
    }

    pub(crate) fn frag_offset(&self, rte_idx: usize) -> Option<Value> {
        self.frag_offsets.get(&rte_idx).copied()
    }

    pub(crate) fn push_group_by_key(&mut self, key: Value) {
        self.group_by_expr_cache.push(key);
    }

    // ── Registration ────────────────────────────────────────────────────

    /// Record the fragment offset of secondary relation `rte_idx`.
    pub fn register_frag_offset(&mut self, rte_idx: usize, offset: Value) {
        self.frag_offsets.insert(rte_idx, offset);
    }

    /// Record the matched row position of relation `rte_idx`.
    pub fn register_inner_position(&mut self, rte_idx: usize, pos: Value) {
        self.inner_positions.insert(rte_idx, pos);
    }

    /// Record the iterator of an inner scan.
    pub fn register_scan_iterator(&mut self, input: InputDescriptor, value: Value, slot: Value) {
        self.scan_to_iterator
            .insert(input, IteratorSlot { value, slot });
    }

    /// Record the continuation block of an inner scan loop.
    pub fn add_inner_scan_label(&mut self, label: BlockId) {
        self.inner_scan_labels.push(label);
    }

    // ── Positions and buffers ───────────────────────────────────────────

    /// Row position to read `expr` at.
    ///
    /// Columns of a relation with a registered match position or scan
    /// iterator read there; everything else reads the current row.
    pub fn pos_arg(&self, expr: &Expr) -> Value {
        if let Expr::ColumnVar {
            table_id, rte_idx, ..
        } = expr
        {
            if let Some(pos) = self.inner_positions.get(rte_idx) {
                return *pos;
            }
            let input = InputDescriptor::new(*table_id, *rte_idx);
            if let Some(it) = self.scan_to_iterator.get(&input) {
                return it.value;
            }
        }
        self.row_pos
    }

    /// Buffer parameter of a column, declared on first use.
    pub(crate) fn column_buffer(&mut self, table_id: i32, column_id: i32) -> Value {
        if let Some(buf) = self.column_buffers.get(&(table_id, column_id)) {
            return *buf;
        }
        let name = format!("col_buf_{table_id}_{column_id}");
        let buf = self.emitter.param(&name, IrType::Ptr);
        self.column_buffers.insert((table_id, column_id), buf);
        buf
    }

    pub(crate) fn fetched_column(&self, key: (usize, i32, i32)) -> Option<&Vec<Value>> {
        self.fetched_columns.get(&key)
    }

    pub(crate) fn cache_fetched_column(&mut self, key: (usize, i32, i32), values: Vec<Value>) {
        self.fetched_columns.insert(key, values);
    }

    /// Copy of the fetch cache, taken before emitting into a block whose
    /// definitions do not dominate what follows it.
    pub(crate) fn fetch_cache_snapshot(&self) -> HashMap<(usize, i32, i32), Vec<Value>> {
        self.fetched_columns.clone()
    }

    pub(crate) fn restore_fetch_cache(&mut self, snapshot: HashMap<(usize, i32, i32), Vec<Value>>) {
        self.fetched_columns = snapshot;
    }

    // ── Small emission helpers ──────────────────────────────────────────

    /// Narrow a value to an `i1` truth value (`v > 0` unless already `i1`).
    pub fn to_bool(&mut self, v: Value) -> Value {
        if v.ty() == IrType::I1 {
            return v;
        }
        if let Some(c) = v.as_const_int() {
            return Value::bool(c > 0);
        }
        let zero = Value::int(v.ty(), 0);
        self.emitter.icmp(IntPredicate::Sgt, v, zero)
    }

    /// `a AND b` on `i1`, folded when both sides are constant.
    pub(crate) fn emit_and(&mut self, a: Value, b: Value) -> Value {
        match (a.as_const_int(), b.as_const_int()) {
            (Some(x), Some(y)) => Value::bool(x != 0 && y != 0),
            _ => self.emitter.binary(BinOp::And, a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use rowfn_emit::FunctionBuilder;
    use rowfn_types::{SqlType, TypeInfo};

    use super::*;

    fn ctx() -> CompilationContext<FunctionBuilder> {
        CompilationContext::new(FunctionBuilder::new("row_func"), JoinInfo::default())
    }

    #[test]
    fn pos_arg_prefers_inner_positions() {
        let mut ctx = ctx();
        let col = Expr::column(TypeInfo::new(SqlType::Int), 7, 0, 1);
        assert_eq!(ctx.pos_arg(&col), ctx.row_pos());

        let it = ctx.emitter_mut().param("it", IrType::I64);
        let slot = ctx.emitter_mut().param("it_slot", IrType::Ptr);
        ctx.register_scan_iterator(InputDescriptor::new(7, 1), it, slot);
        assert_eq!(ctx.pos_arg(&col), it);

        let probe = ctx.emitter_mut().param("probe", IrType::I64);
        ctx.register_inner_position(1, probe);
        assert_eq!(ctx.pos_arg(&col), probe);
    }

    #[test]
    fn column_buffers_are_declared_once() {
        let mut ctx = ctx();
        let a = ctx.column_buffer(1, 2);
        let b = ctx.column_buffer(1, 2);
        let c = ctx.column_buffer(1, 3);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn to_bool_keeps_i1_and_folds_constants() {
        let mut ctx = ctx();
        let pos = ctx.row_pos();
        assert_eq!(ctx.to_bool(Value::bool(true)), Value::bool(true));
        assert_eq!(ctx.to_bool(Value::i8(i8::MIN)), Value::bool(false));
        let before = ctx.emitter().instruction_count();
        let b = ctx.to_bool(pos);
        assert_eq!(b.ty(), IrType::I1);
        assert_eq!(ctx.emitter().instruction_count(), before + 1);
    }

    #[test]
    fn emit_and_folds_constants() {
        let mut ctx = ctx();
        assert_eq!(ctx.emit_and(Value::bool(true), Value::bool(false)), Value::bool(false));
        assert_eq!(ctx.emit_and(Value::bool(true), Value::bool(true)), Value::bool(true));
        assert_eq!(ctx.emitter().instruction_count(), 0);
    }

    #[test]
    fn literal_pool_interns() {
        let mut pool = LiteralPool::default();
        assert_eq!(pool.add_string("a"), 0);
        assert_eq!(pool.add_string("b"), 1);
        assert_eq!(pool.add_string("a"), 0);
        assert_eq!(pool.add_int_set(&[1, 2]), 0);
        assert_eq!(pool.add_int_set(&[1, 2]), 0);
        assert_eq!(pool.strings().len(), 2);
    }
}
