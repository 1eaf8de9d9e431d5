use backtrace::Backtrace;
use parking_lot::Mutex;
use serde::{de, ser};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for HDoc operations.
///
/// Every fallible operation in the engine reports one of these categories, so callers can
/// branch on the kind instead of parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use hdocdb::errors::{HDocError, ErrorKind, HDocResult};
///
/// fn example() -> HDocResult<()> {
///     Err(HDocError::new("Index not found", ErrorKind::IndexNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Path Errors
    /// A path string could not be parsed
    PathSyntaxError,
    /// A path walks through a value that is not the container it needs
    PathConflict,

    // Mutation Errors
    /// An operand is not compatible with the value it is applied to
    TypeMismatch,

    // Document Errors
    /// A document with the same identity is already stored
    DocumentExists,
    /// The addressed document is not stored
    DocumentNotFound,
    /// The document identity is missing or not a scalar
    InvalidId,

    // Condition Errors
    /// A condition could not be built or is malformed
    ConditionError,

    // Indexing Errors
    /// Generic indexing error
    IndexingError,
    /// Index does not exist
    IndexNotFound,
    /// An index with the same name is already defined
    IndexAlreadyExists,
    /// The requested index state transition is not allowed
    InvalidIndexState,

    // Collection Errors
    /// Collection does not exist
    CollectionNotFound,

    // Operation Errors
    /// The operation is not valid in the current context
    InvalidOperation,
    /// Input failed validation
    ValidationError,

    // IO and Storage Errors
    /// Fault reported by the underlying store
    IOError,
    /// Store has already been closed
    StoreAlreadyClosed,
    /// Error encoding or decoding stored bytes
    EncodingError,

    // Generic/Internal Errors
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::PathSyntaxError => write!(f, "Path syntax error"),
            ErrorKind::PathConflict => write!(f, "Path conflict"),
            ErrorKind::TypeMismatch => write!(f, "Type mismatch"),
            ErrorKind::DocumentExists => write!(f, "Document exists"),
            ErrorKind::DocumentNotFound => write!(f, "Document not found"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::ConditionError => write!(f, "Condition error"),
            ErrorKind::IndexingError => write!(f, "Indexing error"),
            ErrorKind::IndexNotFound => write!(f, "Index not found"),
            ErrorKind::IndexAlreadyExists => write!(f, "Index already exists"),
            ErrorKind::InvalidIndexState => write!(f, "Invalid index state"),
            ErrorKind::CollectionNotFound => write!(f, "Collection not found"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::IOError => write!(f, "IO error"),
            ErrorKind::StoreAlreadyClosed => write!(f, "Store already closed"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Custom HDoc error type.
///
/// `HDocError` carries a message, an [ErrorKind] and an optional cause. A backtrace is captured
/// unresolved at construction and only symbolized when the error is debug-printed.
///
/// # Examples
///
/// ```rust,ignore
/// use hdocdb::errors::{HDocError, ErrorKind};
///
/// let cause = HDocError::new("connection reset", ErrorKind::IOError);
/// let err = HDocError::new_with_cause("Failed to write row", ErrorKind::IOError, cause);
/// assert_eq!(err.kind(), &ErrorKind::IOError);
/// ```
#[derive(Clone)]
pub struct HDocError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<HDocError>>,
    backtrace: Arc<Mutex<Backtrace>>,
}

impl HDocError {
    /// Creates a new `HDocError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        HDocError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    /// Creates a new `HDocError` that keeps `cause` as its source.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: HDocError) -> Self {
        HDocError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Mutex::new(Backtrace::new_unresolved())),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&HDocError> {
        self.cause.as_deref()
    }
}

impl Display for HDocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for HDocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => {
                let mut backtrace = self.backtrace.lock();
                backtrace.resolve();
                write!(f, "{}: {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for HDocError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for HDoc operations.
pub type HDocResult<T> = Result<T, HDocError>;

impl de::Error for HDocError {
    fn custom<T: Display>(msg: T) -> Self {
        HDocError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl ser::Error for HDocError {
    fn custom<T: Display>(msg: T) -> Self {
        HDocError::new(&msg.to_string(), ErrorKind::EncodingError)
    }
}

impl From<std::io::Error> for HDocError {
    fn from(err: std::io::Error) -> Self {
        HDocError::new(&format!("IO error: {}", err), ErrorKind::IOError)
    }
}

impl From<std::string::FromUtf8Error> for HDocError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        HDocError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::EncodingError,
        )
    }
}

impl From<std::fmt::Error> for HDocError {
    fn from(err: std::fmt::Error) -> Self {
        HDocError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<std::num::ParseIntError> for HDocError {
    fn from(err: std::num::ParseIntError) -> Self {
        HDocError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<std::num::ParseFloatError> for HDocError {
    fn from(err: std::num::ParseFloatError) -> Self {
        HDocError::new(
            &format!("Float parsing error: {}", err),
            ErrorKind::ValidationError,
        )
    }
}

impl From<regex::Error> for HDocError {
    fn from(err: regex::Error) -> Self {
        HDocError::new(
            &format!("Invalid regular expression: {}", err),
            ErrorKind::ConditionError,
        )
    }
}

impl From<bincode::error::EncodeError> for HDocError {
    fn from(err: bincode::error::EncodeError) -> Self {
        HDocError::new(&format!("Failed to encode: {}", err), ErrorKind::EncodingError)
    }
}

impl From<bincode::error::DecodeError> for HDocError {
    fn from(err: bincode::error::DecodeError) -> Self {
        HDocError::new(&format!("Failed to decode: {}", err), ErrorKind::EncodingError)
    }
}

impl From<String> for HDocError {
    fn from(msg: String) -> Self {
        HDocError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for HDocError {
    fn from(msg: &str) -> Self {
        HDocError::new(msg, ErrorKind::InternalError)
    }
}
