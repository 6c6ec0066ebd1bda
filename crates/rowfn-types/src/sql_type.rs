//! Logical SQL types and their physical representation.
//!
//! The analyzer attaches a [`TypeInfo`] to every expression node. The code
//! generator only needs a handful of facts from it: the physical (logical)
//! width, whether the value may be null, how it is compressed on disk, and
//! which in-band bit pattern stands for NULL.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SqlType
// ---------------------------------------------------------------------------

/// Logical SQL type of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    /// Fixed-point decimal stored as a scaled 64-bit integer.
    Decimal,
    Float,
    Double,
    Text,
    Time,
    Timestamp,
    Date,
    /// Variable-length array; the element type lives in [`TypeInfo::elem`].
    Array,
}

impl SqlType {
    /// Canonical upper-case SQL name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::TinyInt => "TINYINT",
            Self::SmallInt => "SMALLINT",
            Self::Int => "INT",
            Self::BigInt => "BIGINT",
            Self::Decimal => "DECIMAL",
            Self::Float => "FLOAT",
            Self::Double => "DOUBLE",
            Self::Text => "TEXT",
            Self::Time => "TIME",
            Self::Timestamp => "TIMESTAMP",
            Self::Date => "DATE",
            Self::Array => "ARRAY",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// On-disk compression of a column or literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Stored at full logical width (strings as pointer + length).
    #[default]
    None,
    /// Dictionary-encoded string: the stored value is a 32-bit dictionary id.
    Dict,
    /// Fixed-width integer packing; `comp_param` is the stored bit width.
    Fixed,
}

// ---------------------------------------------------------------------------
// TypeInfo
// ---------------------------------------------------------------------------

/// Full type descriptor attached to an analyzed expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeInfo {
    pub sql_type: SqlType,
    /// True when the value can never be NULL.
    #[serde(default)]
    pub notnull: bool,
    #[serde(default)]
    pub compression: Compression,
    /// Dictionary id for [`Compression::Dict`], packed bit width for
    /// [`Compression::Fixed`], zero otherwise.
    #[serde(default)]
    pub comp_param: i32,
    /// Decimal scale; zero for every other type.
    #[serde(default)]
    pub scale: i32,
    /// Element type of an array.
    #[serde(default)]
    pub elem: Option<SqlType>,
}

impl TypeInfo {
    /// A nullable, uncompressed value of `sql_type`.
    #[must_use]
    pub const fn new(sql_type: SqlType) -> Self {
        Self {
            sql_type,
            notnull: false,
            compression: Compression::None,
            comp_param: 0,
            scale: 0,
            elem: None,
        }
    }

    /// A nullable array of `elem`.
    #[must_use]
    pub const fn array_of(elem: SqlType) -> Self {
        let mut ti = Self::new(SqlType::Array);
        ti.elem = Some(elem);
        ti
    }

    /// A nullable decimal with the given scale.
    #[must_use]
    pub const fn decimal(scale: i32) -> Self {
        let mut ti = Self::new(SqlType::Decimal);
        ti.scale = scale;
        ti
    }

    /// A nullable dictionary-encoded string.
    #[must_use]
    pub const fn dict_text(dict_id: i32) -> Self {
        let mut ti = Self::new(SqlType::Text);
        ti.compression = Compression::Dict;
        ti.comp_param = dict_id;
        ti
    }

    /// Same type, marked NOT NULL.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.notnull = true;
        self
    }

    /// Same type with a different nullability.
    #[must_use]
    pub const fn with_notnull(mut self, notnull: bool) -> Self {
        self.notnull = notnull;
        self
    }

    pub const fn is_fp(&self) -> bool {
        matches!(self.sql_type, SqlType::Float | SqlType::Double)
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self.sql_type,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Int | SqlType::BigInt
        )
    }

    pub const fn is_decimal(&self) -> bool {
        matches!(self.sql_type, SqlType::Decimal)
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self.sql_type, SqlType::Boolean)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self.sql_type, SqlType::Text)
    }

    pub const fn is_array(&self) -> bool {
        matches!(self.sql_type, SqlType::Array)
    }

    pub const fn is_time(&self) -> bool {
        matches!(
            self.sql_type,
            SqlType::Time | SqlType::Timestamp | SqlType::Date
        )
    }

    pub const fn is_dict_encoded_string(&self) -> bool {
        self.is_string() && matches!(self.compression, Compression::Dict)
    }

    /// Strings stored as pointer + length rather than a dictionary id.
    pub const fn is_none_encoded_string(&self) -> bool {
        self.is_string() && !matches!(self.compression, Compression::Dict)
    }

    /// Whether values of this type are a single in-register integer.
    pub const fn is_integer_like(&self) -> bool {
        !self.is_fp() && !self.is_array() && !self.is_none_encoded_string()
    }

    /// Type descriptor of an array's elements.
    ///
    /// Elements inherit nothing from the array: they are nullable and
    /// uncompressed.
    pub fn elem_type(&self) -> Option<Self> {
        self.elem.map(Self::new)
    }

    /// Width in bytes of one value once decoded into a register.
    pub const fn logical_size(&self) -> usize {
        match self.sql_type {
            SqlType::Boolean | SqlType::TinyInt => 1,
            SqlType::SmallInt => 2,
            SqlType::Int | SqlType::Float => 4,
            SqlType::Text => {
                if self.is_dict_encoded_string() {
                    4
                } else {
                    8
                }
            }
            SqlType::BigInt
            | SqlType::Decimal
            | SqlType::Double
            | SqlType::Time
            | SqlType::Timestamp
            | SqlType::Date
            | SqlType::Array => 8,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.sql_type, self.elem) {
            (SqlType::Array, Some(elem)) => write!(f, "{elem}[]")?,
            (SqlType::Decimal, _) => write!(f, "DECIMAL(scale={})", self.scale)?,
            (ty, _) => write!(f, "{ty}")?,
        }
        if self.is_dict_encoded_string() {
            write!(f, " ENCODING DICT({})", self.comp_param)?;
        }
        if self.notnull {
            f.write_str(" NOT NULL")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Null sentinels
// ---------------------------------------------------------------------------

/// The integer bit pattern that stands for NULL in a value of type `ti`.
///
/// `None` for floating-point types, none-encoded strings, and arrays: those
/// have no integer sentinel.
pub const fn inline_int_null_val(ti: &TypeInfo) -> Option<i64> {
    if !ti.is_integer_like() {
        return None;
    }
    Some(match ti.logical_size() {
        1 => i8::MIN as i64,
        2 => i16::MIN as i64,
        4 => i32::MIN as i64,
        _ => i64::MIN,
    })
}

/// The floating-point value that stands for NULL in a value of type `ti`.
pub fn inline_fp_null_val(ti: &TypeInfo) -> Option<f64> {
    match ti.sql_type {
        SqlType::Float => Some(f64::from(f32::MIN_POSITIVE)),
        SqlType::Double => Some(f64::MIN_POSITIVE),
        _ => None,
    }
}

/// Type suffix used by runtime function names (`int32_t`, `double`, ...).
pub const fn numeric_type_name(ti: &TypeInfo) -> &'static str {
    match ti.sql_type {
        SqlType::Float => "float",
        SqlType::Double => "double",
        _ => match ti.logical_size() {
            1 => "int8_t",
            2 => "int16_t",
            4 => "int32_t",
            _ => "int64_t",
        },
    }
}

/// Base-two logarithm of a power-of-two byte width.
pub const fn log2_bytes(bytes: usize) -> u32 {
    match bytes {
        1 => 0,
        2 => 1,
        4 => 2,
        _ => 3,
    }
}
