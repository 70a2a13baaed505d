use std::{fmt, io};

/// Crate-wide `Result` type using [`DataFormatError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, DataFormatError>;

/// Top-level error type for export operations.
///
/// This type wraps more specific error kinds and provides a single
/// error type that can be used throughout the crate.
#[derive(Debug)]
pub enum DataFormatError {
    /// The export request was rejected before any cursor was opened.
    Request(RequestError),

    /// The search backend failed to serve the query or cursor.
    Backend(BackendError),

    /// The export failed while producing output.
    Execution(ExecutionError),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors.
    Io(io::Error),

    /// JSON encoding or decoding errors.
    Json(serde_json::Error),

    /// Generic error with a free-form message.
    Generic(String),
}

/// Request validation errors.
#[derive(Debug)]
pub enum RequestError {
    /// The `format` parameter names no known writer.
    UnknownFormat(String),

    /// The `fl` parameter could not be parsed into column names.
    MalformedFieldList(String),

    /// The request body is not a usable query payload.
    MalformedQuery(String),

    /// No target index was given.
    MissingIndex,
}

/// Search backend errors.
#[derive(Debug)]
pub enum BackendError {
    /// The target index does not exist.
    IndexNotFound(String),

    /// Query execution failed.
    QueryFailed(String),

    /// The query uses a clause the backend cannot evaluate.
    UnsupportedQuery(String),

    /// The cursor id is unknown to the backend.
    CursorNotFound(String),

    /// The cursor outlived its keep-alive window.
    CursorExpired(String),
}

/// Export execution errors.
#[derive(Debug)]
pub enum ExecutionError {
    /// Writing to the output sink failed.
    WriteFailed(String),

    /// Building or serializing the spreadsheet failed.
    Spreadsheet(String),

    /// The caller cancelled the export.
    Cancelled,
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl DataFormatError {
    /// Whether the error should be reported to the caller as a bad request.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, DataFormatError::Request(_))
    }

    /// Whether the error is the result of a cancelled export.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DataFormatError::Execution(ExecutionError::Cancelled))
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for DataFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormatError::Request(e) => write!(f, "Bad request: {e}"),
            DataFormatError::Backend(e) => write!(f, "Backend error: {e}"),
            DataFormatError::Execution(e) => write!(f, "Export error: {e}"),
            DataFormatError::Config(e) => write!(f, "Configuration error: {e}"),
            DataFormatError::Io(e) => write!(f, "I/O error: {e}"),
            DataFormatError::Json(e) => write!(f, "JSON error: {e}"),
            DataFormatError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::UnknownFormat(format) => {
                write!(f, "Unknown format '{format}' (expected csv, json or xls)")
            }
            RequestError::MalformedFieldList(msg) => write!(f, "Malformed field list: {msg}"),
            RequestError::MalformedQuery(msg) => write!(f, "Malformed query: {msg}"),
            RequestError::MissingIndex => write!(f, "No index given"),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::IndexNotFound(index) => write!(f, "Index not found: {index}"),
            BackendError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            BackendError::UnsupportedQuery(clause) => {
                write!(f, "Unsupported query clause: {clause}")
            }
            BackendError::CursorNotFound(id) => write!(f, "Cursor not found: {id}"),
            BackendError::CursorExpired(id) => write!(f, "Cursor expired: {id}"),
        }
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::WriteFailed(msg) => write!(f, "Write failed: {msg}"),
            ExecutionError::Spreadsheet(msg) => write!(f, "Spreadsheet error: {msg}"),
            ExecutionError::Cancelled => write!(f, "Export cancelled"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for DataFormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataFormatError::Io(e) => Some(e),
            DataFormatError::Json(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for RequestError {}
impl std::error::Error for BackendError {}
impl std::error::Error for ExecutionError {}
impl std::error::Error for ConfigError {}

/* ========================= Conversions to DataFormatError ========================= */

impl From<io::Error> for DataFormatError {
    fn from(err: io::Error) -> Self {
        DataFormatError::Io(err)
    }
}

impl From<serde_json::Error> for DataFormatError {
    fn from(err: serde_json::Error) -> Self {
        DataFormatError::Json(err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for DataFormatError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        DataFormatError::Execution(ExecutionError::Spreadsheet(err.to_string()))
    }
}

impl From<RequestError> for DataFormatError {
    fn from(err: RequestError) -> Self {
        DataFormatError::Request(err)
    }
}

impl From<BackendError> for DataFormatError {
    fn from(err: BackendError) -> Self {
        DataFormatError::Backend(err)
    }
}

impl From<ExecutionError> for DataFormatError {
    fn from(err: ExecutionError) -> Self {
        DataFormatError::Execution(err)
    }
}

impl From<ConfigError> for DataFormatError {
    fn from(err: ConfigError) -> Self {
        DataFormatError::Config(err)
    }
}

impl From<String> for DataFormatError {
    fn from(msg: String) -> Self {
        DataFormatError::Generic(msg)
    }
}

impl From<&str> for DataFormatError {
    fn from(msg: &str) -> Self {
        DataFormatError::Generic(msg.to_owned())
    }
}
