use crate::value::Value;
use thiserror::Error;

/// Stable discriminant carried by every [`Error`].
///
/// [`Kind::as_str`] yields the keyword form used for programmatic matching
/// inside an [`ErrorHandler`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    ReservedLength,
    ReservedSimple,
    IllegalChunk,
    IllegalStream,
    DefiniteLengthRequired,
    UnexpectedBreak,
    DuplicateMapKey,
    MissingMapValue,
    Underflow,
    InvalidUtf8,
    UnrepresentableInteger,
    UnknownTag,
    UnknownValue,
    IncorrectType,
    MaxRecursion,
    ItemTooLarge,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::ReservedLength => "reserved-length",
            Kind::ReservedSimple => "reserved-simple",
            Kind::IllegalChunk => "illegal-chunk",
            Kind::IllegalStream => "illegal-stream",
            Kind::DefiniteLengthRequired => "definite-length-required",
            Kind::UnexpectedBreak => "unexpected-break",
            Kind::DuplicateMapKey => "duplicate-map-key",
            Kind::MissingMapValue => "missing-map-value",
            Kind::Underflow => "underflow",
            Kind::InvalidUtf8 => "invalid-utf8",
            Kind::UnrepresentableInteger => "unrepresentable-integer",
            Kind::UnknownTag => "unknown-tag",
            Kind::UnknownValue => "unknown-value",
            Kind::IncorrectType => "incorrect-type",
            Kind::MaxRecursion => "max-recursion",
            Kind::ItemTooLarge => "item-too-large",
        }
    }
}

impl core::fmt::Display for Kind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not enough data for encoded value")]
    Underflow,

    #[error("Reserved additional-information value {0}")]
    ReservedLength(u8),

    #[error("Reserved simple value {0}")]
    ReservedSimple(u8),

    #[error("Chunked string contains an invalid chunk")]
    IllegalChunk,

    #[error("Tags cannot have indefinite length")]
    IllegalStream,

    #[error("Canonical form requires definite lengths")]
    DefiniteLengthRequired,

    #[error("Break outside an indefinite-length item")]
    UnexpectedBreak,

    #[error("Duplicate map key {0}")]
    DuplicateMapKey(String),

    #[error("Map has a key with no value")]
    MissingMapValue,

    #[error(transparent)]
    InvalidUtf8(#[from] core::str::Utf8Error),

    #[error("Integer magnitude does not fit an 8-byte argument")]
    UnrepresentableInteger,

    #[error("No read handler for tag {0}")]
    UnknownTag(u64),

    #[error("No encoding for {0}")]
    UnknownValue(String),

    #[error("Incorrect type, expecting {0}, found {1}")]
    IncorrectType(String, String),

    #[error("Maximum recursion depth reached")]
    MaxRecursion,

    #[error("Item of {actual} bytes exceeds the configured limit of {max}")]
    ItemTooLarge { max: usize, actual: u64 },
}

impl Error {
    pub fn kind(&self) -> Kind {
        match self {
            Error::Underflow => Kind::Underflow,
            Error::ReservedLength(_) => Kind::ReservedLength,
            Error::ReservedSimple(_) => Kind::ReservedSimple,
            Error::IllegalChunk => Kind::IllegalChunk,
            Error::IllegalStream => Kind::IllegalStream,
            Error::DefiniteLengthRequired => Kind::DefiniteLengthRequired,
            Error::UnexpectedBreak => Kind::UnexpectedBreak,
            Error::DuplicateMapKey(_) => Kind::DuplicateMapKey,
            Error::MissingMapValue => Kind::MissingMapValue,
            Error::InvalidUtf8(_) => Kind::InvalidUtf8,
            Error::UnrepresentableInteger => Kind::UnrepresentableInteger,
            Error::UnknownTag(_) => Kind::UnknownTag,
            Error::UnknownValue(_) => Kind::UnknownValue,
            Error::IncorrectType(..) => Kind::IncorrectType,
            Error::MaxRecursion => Kind::MaxRecursion,
            Error::ItemTooLarge { .. } => Kind::ItemTooLarge,
        }
    }
}

/// Injected error policy.
///
/// Returning `Some(value)` substitutes the replacement for the malformed
/// construct and decoding resumes at the byte after it; returning `None`
/// aborts the whole call. Only errors whose construct has a known extent are
/// offered to the handler; structural errors unwind regardless.
pub type ErrorHandler = dyn Fn(Kind, &str) -> Option<Value> + Send + Sync;
