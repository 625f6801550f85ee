use thiserror::Error;

/// Errors surfaced by split-test operations.
///
/// Every failure is synchronous and leaves the operation's input
/// unchanged; there are no retryable cases in this crate. Use
/// [`SplitError::kind`] to classify a variant into the caller-facing
/// taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("Duplicate variant name: {0}")]
    DuplicateName(String),

    #[error("Variant name must not be empty")]
    EmptyName,

    #[error("Variant '{0}' has no destination URL")]
    MissingDestination(String),

    #[error("Weight {weight} for variant '{name}' outside allowed range 1..=99")]
    WeightOutOfRange { name: String, weight: u32 },

    #[error("Variant weights sum to {0}, expected exactly 100")]
    WeightSumMismatch(u32),

    #[error("Variant index {index} out of range for {len} variants")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Split test not found: {0}")]
    TestNotFound(uuid::Uuid),

    #[error("A split test requires at least 2 variants, got {0}")]
    TooFewVariants(usize),

    #[error("Split test already holds {0} variants, cannot fit another")]
    SetFull(usize),

    #[error("Weight redistribution cannot restore bounds: {0}")]
    Unbalanced(String),
}

/// Caller-facing error classes.
///
/// `Validation` is malformed input (fix the request); `Invariant` is an
/// operation that would break a structural guarantee of the set and was
/// rejected whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Invariant,
}

impl SplitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SplitError::DuplicateName(_) => ErrorKind::Validation,
            SplitError::EmptyName => ErrorKind::Validation,
            SplitError::MissingDestination(_) => ErrorKind::Validation,
            SplitError::WeightOutOfRange { .. } => ErrorKind::Validation,
            SplitError::WeightSumMismatch(_) => ErrorKind::Validation,
            SplitError::IndexOutOfRange { .. } => ErrorKind::Validation,
            SplitError::TestNotFound(_) => ErrorKind::Validation,
            SplitError::TooFewVariants(_) => ErrorKind::Invariant,
            SplitError::SetFull(_) => ErrorKind::Invariant,
            SplitError::Unbalanced(_) => ErrorKind::Invariant,
        }
    }
}

pub type Result<T> = std::result::Result<T, SplitError>;
