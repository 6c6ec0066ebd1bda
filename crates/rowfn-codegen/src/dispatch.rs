//! Expression dispatch.
//!
//! [`CompilationContext::codegen`] is the single entry point through which
//! every component evaluates a sub-expression. Node kinds, binary operators
//! and unary operators are closed enums, so each node reaches exactly one
//! handler.

use rowfn_ast::{BinaryOp, Expr, OpClass, UnaryOp};
use rowfn_emit::IrEmitter;
use rowfn_error::{Result, RowFnError};
use rowfn_types::{BinOp, Compression, IrType, TypeInfo, Value};
use tracing::trace;

use crate::context::CompilationContext;
use crate::operators::null_value;
use crate::options::CompilationOptions;

/// The handler a node is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    RowPosition,
    IterVar,
    Arithmetic,
    Comparison,
    Logical,
    ArrayAt,
    Not,
    Cast,
    UMinus,
    IsNull,
    Unnest,
    Column,
    NullConstant,
    Constant,
    Case,
    Extract,
    Datediff,
    Datetrunc,
    CharLength,
    Like,
    Regexp,
    Likelihood,
    InValues,
    InIntegerSet,
    Function,
    FunctionWithCustomTypeHandling,
}

impl Handler {
    /// Route a node. `None` is the current row position.
    pub const fn of(expr: Option<&Expr>) -> Self {
        let Some(expr) = expr else {
            return Self::RowPosition;
        };
        match expr {
            Expr::IterVar { .. } => Self::IterVar,
            Expr::ColumnVar { .. } => Self::Column,
            Expr::BinOper { op, .. } => Self::for_binary(*op),
            Expr::UOper { op, .. } => Self::for_unary(*op),
            Expr::Constant { value: None, .. } => Self::NullConstant,
            Expr::Constant { .. } => Self::Constant,
            Expr::Case { .. } => Self::Case,
            Expr::Extract { .. } => Self::Extract,
            Expr::Datediff { .. } => Self::Datediff,
            Expr::Datetrunc { .. } => Self::Datetrunc,
            Expr::CharLength { .. } => Self::CharLength,
            Expr::Like { .. } => Self::Like,
            Expr::Regexp { .. } => Self::Regexp,
            Expr::Likelihood { .. } => Self::Likelihood,
            Expr::InValues { .. } => Self::InValues,
            Expr::InIntegerSet { .. } => Self::InIntegerSet,
            Expr::FunctionOper { .. } => Self::Function,
            Expr::FunctionOperWithCustomTypeHandling { .. } => {
                Self::FunctionWithCustomTypeHandling
            }
        }
    }

    pub const fn for_binary(op: BinaryOp) -> Self {
        match op.class() {
            OpClass::Arithmetic => Self::Arithmetic,
            OpClass::Comparison => Self::Comparison,
            OpClass::Logic => Self::Logical,
            OpClass::ArrayAt => Self::ArrayAt,
        }
    }

    pub const fn for_unary(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Not => Self::Not,
            UnaryOp::Cast => Self::Cast,
            UnaryOp::UMinus => Self::UMinus,
            UnaryOp::IsNull => Self::IsNull,
            UnaryOp::Unnest => Self::Unnest,
        }
    }
}

/// NULL constant of `ti` in its full value-list shape.
fn null_constant(ti: &TypeInfo) -> Vec<Value> {
    if ti.is_none_encoded_string() {
        return vec![
            Value::i64(0),
            Value::int(IrType::Ptr, 0),
            Value::i32(0),
        ];
    }
    vec![null_value(ti)]
}

impl<E: IrEmitter> CompilationContext<E> {
    /// Lower `expr` into values.
    ///
    /// `None` yields the current row position. With `fetch_columns` off,
    /// column references yield their row position instead of their value.
    /// Most kinds produce one value; none-encoded strings produce
    /// `[packed, ptr, len]`.
    pub fn codegen(
        &mut self,
        expr: Option<&Expr>,
        fetch_columns: bool,
        co: &CompilationOptions,
    ) -> Result<Vec<Value>> {
        let handler = Handler::of(expr);
        let Some(expr) = expr else {
            return Ok(vec![self.row_pos()]);
        };
        trace!(
            target: "rowfn.codegen",
            kind = expr.kind_name(),
            ?handler,
            fetch_columns,
            "dispatch"
        );

        let value = match expr {
            Expr::IterVar { rte_idx, .. } => self.codegen_iter_var(*rte_idx, co),
            Expr::ColumnVar { .. } => return self.codegen_column(expr, fetch_columns, co),
            Expr::BinOper {
                ti,
                op,
                left,
                right,
            } => match op.class() {
                OpClass::Arithmetic => self.codegen_arith(ti, *op, left, right, co)?,
                OpClass::Comparison => self.codegen_cmp(ti, *op, left, right, co)?,
                OpClass::Logic => self.codegen_logical(ti, *op, left, right, co)?,
                OpClass::ArrayAt => self.codegen_array_at(ti, left, right, co)?,
            },
            Expr::UOper { ti, op, operand } => match op {
                UnaryOp::Not => self.codegen_not(ti, operand, co)?,
                UnaryOp::Cast => return self.codegen_cast(ti, operand, co),
                UnaryOp::UMinus => self.codegen_uminus(ti, operand, co)?,
                UnaryOp::IsNull => self.codegen_is_null(operand, co)?,
                UnaryOp::Unnest => self.codegen_unnest(operand, co)?,
            },
            Expr::Constant { ti, value: None } => return Ok(null_constant(ti)),
            Expr::Constant {
                ti,
                value: Some(datum),
            } => {
                if matches!(ti.compression, Compression::Dict) {
                    return Err(RowFnError::DictionaryConstant);
                }
                return self.codegen_constant(ti, datum, ti.compression, 0);
            }
            Expr::Case {
                ti,
                branches,
                else_expr,
            } => self.codegen_case(ti, branches, else_expr.as_ref(), co)?,
            Expr::Extract { ti, field, from } => self.codegen_extract(ti, *field, from, co)?,
            Expr::Datediff {
                ti,
                field,
                start,
                end,
            } => self.codegen_datediff(ti, *field, start, end, co)?,
            Expr::Datetrunc { ti, field, from } => self.codegen_datetrunc(ti, *field, from, co)?,
            Expr::CharLength {
                ti,
                arg,
                calc_encoded_length,
            } => self.codegen_char_length(ti, arg, *calc_encoded_length, co)?,
            Expr::Like {
                ti,
                arg,
                pattern,
                escape,
                is_ilike,
                is_simple,
            } => self.codegen_like(
                ti,
                arg,
                pattern,
                escape.as_ref(),
                *is_ilike,
                *is_simple,
                co,
            )?,
            Expr::Regexp {
                ti,
                arg,
                pattern,
                escape,
            } => self.codegen_regexp(ti, arg, pattern, escape.as_ref(), co)?,
            Expr::Likelihood { arg, .. } => return self.codegen(Some(arg), fetch_columns, co),
            Expr::InValues { ti, arg, values } => self.codegen_in_values(ti, arg, values, co)?,
            Expr::InIntegerSet { ti, arg, values } => {
                self.codegen_in_integer_set(ti, arg, values, co)?
            }
            Expr::FunctionOper { ti, name, args } => {
                self.codegen_function_oper(ti, name, args, co)?
            }
            Expr::FunctionOperWithCustomTypeHandling { ti, name, args } => {
                self.codegen_function_oper_with_custom_type_handling(ti, name, args, co)?
            }
        };
        Ok(vec![value])
    }

    /// Position of relation `rte_idx`, shifted by its fragment offset in
    /// multi-fragment joins.
    fn codegen_iter_var(&mut self, rte_idx: usize, co: &CompilationOptions) -> Value {
        let pos = self.row_pos();
        if rte_idx == 0 || !co.multifrag_join {
            return pos;
        }
        match self.frag_offset(rte_idx) {
            Some(offset) => self.emitter_mut().binary(BinOp::Add, pos, offset),
            None => pos,
        }
    }
}
