//! SQL-like rendering of expression nodes, used in diagnostics and logs.

use std::fmt;

#[allow(clippy::wildcard_imports)]
use crate::*;

fn comma_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "AND",
            Self::Or => "OR",
            Self::ArrayAt => "[]",
        })
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Year => "YEAR",
            Self::Quarter => "QUARTER",
            Self::Month => "MONTH",
            Self::Day => "DAY",
            Self::Hour => "HOUR",
            Self::Minute => "MINUTE",
            Self::Second => "SECOND",
            Self::Millisecond => "MILLISECOND",
            Self::Microsecond => "MICROSECOND",
            Self::Nanosecond => "NANOSECOND",
            Self::DayOfWeek => "DOW",
            Self::DayOfYear => "DOY",
            Self::Week => "WEEK",
            Self::Epoch => "EPOCH",
        })
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Self::Int(v) => write!(f, "{v}"),
            Self::Fp(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IterVar { rte_idx, .. } => write!(f, "$iter{rte_idx}"),
            Self::ColumnVar {
                table_id,
                column_id,
                rte_idx,
                ..
            } => write!(f, "$t{table_id}.c{column_id}@{rte_idx}"),
            Self::BinOper {
                op: BinaryOp::ArrayAt,
                left,
                right,
                ..
            } => write!(f, "{left}[{right}]"),
            Self::BinOper {
                op, left, right, ..
            } => write!(f, "({left} {op} {right})"),
            Self::UOper { ti, op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {operand}"),
                UnaryOp::Cast => write!(f, "CAST({operand} AS {ti})"),
                UnaryOp::UMinus => write!(f, "-{operand}"),
                UnaryOp::IsNull => write!(f, "{operand} IS NULL"),
                UnaryOp::Unnest => write!(f, "UNNEST({operand})"),
            },
            Self::Constant { value: None, .. } => f.write_str("NULL"),
            Self::Constant {
                value: Some(datum), ..
            } => write!(f, "{datum}"),
            Self::Case {
                branches,
                else_expr,
                ..
            } => {
                f.write_str("CASE")?;
                for (when, then) in branches {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(e) = else_expr {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            Self::Extract { field, from, .. } => write!(f, "EXTRACT({field} FROM {from})"),
            Self::Datediff {
                field, start, end, ..
            } => write!(f, "DATEDIFF({field}, {start}, {end})"),
            Self::Datetrunc { field, from, .. } => write!(f, "DATE_TRUNC({field}, {from})"),
            Self::CharLength {
                arg,
                calc_encoded_length,
                ..
            } => {
                let name = if *calc_encoded_length {
                    "CHAR_LENGTH"
                } else {
                    "LENGTH"
                };
                write!(f, "{name}({arg})")
            }
            Self::Like {
                arg,
                pattern,
                escape,
                is_ilike,
                ..
            } => {
                let kw = if *is_ilike { "ILIKE" } else { "LIKE" };
                write!(f, "{arg} {kw} {pattern}")?;
                if let Some(e) = escape {
                    write!(f, " ESCAPE {e}")?;
                }
                Ok(())
            }
            Self::Regexp {
                arg,
                pattern,
                escape,
                ..
            } => {
                write!(f, "{arg} REGEXP {pattern}")?;
                if let Some(e) = escape {
                    write!(f, " ESCAPE {e}")?;
                }
                Ok(())
            }
            Self::Likelihood {
                arg, likelihood, ..
            } => write!(f, "LIKELIHOOD({arg}, {likelihood})"),
            Self::InValues { arg, values, .. } => {
                write!(f, "{arg} IN (")?;
                comma_list(f, values)?;
                f.write_str(")")
            }
            Self::InIntegerSet { arg, values, .. } => {
                write!(f, "{arg} IN <set of {}>", values.len())
            }
            Self::FunctionOper { name, args, .. }
            | Self::FunctionOperWithCustomTypeHandling { name, args, .. } => {
                write!(f, "{name}(")?;
                comma_list(f, args)?;
                f.write_str(")")
            }
        }
    }
}
