use thiserror::Error;

/// Primary error type for row-function code generation.
///
/// Every variant except [`RowFnError::InvalidOptions`] is a fatal defect: the
/// upstream planner handed the code generator an input that breaks one of its
/// guarantees. Fatal errors abort compilation of the whole unit; nothing is
/// rolled back and nothing is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowFnError {
    // === Dispatch ===
    /// A dictionary-encoded constant reached the generic dispatcher. Only an
    /// enclosing cast knows which dictionary the literal belongs to.
    #[error("dictionary-encoded constant must be lowered by its enclosing cast")]
    DictionaryConstant,

    /// A type the handler cannot lower.
    #[error("unsupported type {ty} in {context}")]
    UnsupportedType { context: String, ty: String },

    // === Preconditions ===
    /// An input-count or registration-count precondition was violated.
    #[error("precondition failed: {what} (expected {expected}, got {actual})")]
    Precondition {
        what: String,
        expected: String,
        actual: String,
    },

    /// The configured group-by key width is not allowed for the current
    /// compaction setting.
    #[error("invalid group key width {width} (key compaction {})", on_off(.compaction))]
    KeyWidthMismatch { width: usize, compaction: bool },

    /// A folded hash-join conjunction turned out to be statically false.
    #[error("hash join conjunction folded to constant false")]
    ConstantFalseConjunction,

    // === Emission ===
    /// A block was left without a terminator when the function was finished.
    #[error("block '{block}' has no terminator")]
    UnterminatedBlock { block: String },

    // === Configuration ===
    /// Compilation options could not be parsed.
    #[error("invalid compilation options: {0}")]
    InvalidOptions(String),

    // === Internal ===
    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

impl RowFnError {
    /// Whether this error aborts the compiled unit.
    ///
    /// Option parsing happens before a unit starts compiling, so it is the
    /// only error a caller may report and move past.
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidOptions(_))
    }

    /// Create a precondition error.
    pub fn precondition(
        what: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::Precondition {
            what: what.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an unsupported-type error.
    pub fn unsupported_type(context: impl Into<String>, ty: impl ToString) -> Self {
        Self::UnsupportedType {
            context: context.into(),
            ty: ty.to_string(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

fn on_off(flag: &bool) -> &'static str {
    if *flag { "on" } else { "off" }
}

/// Result type alias using `RowFnError`.
pub type Result<T> = std::result::Result<T, RowFnError>;
