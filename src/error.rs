use core::fmt;

/// Failure codes reported by the recognition engine.
///
/// The numeric values match the engine's own codes so they can be carried
/// across an FFI boundary unchanged; see [`ErrorCode::from_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    Error = 1,
    Misuse = 2,
    PermissionDenied = 3,
    NotFound = 4,
    Busy = 5,
    Corrupt = 6,
    EmptyStore = 7,
    AuthDenied = 8,
    NoConnection = 9,
    Timeout = 10,
    Thread = 11,
    CredentialMismatch = 12,
    SlowConnection = 13,
    RecordNotFound = 14,
    Aborted = 15,
    Unavailable = 16,
    UnsupportedImage = 17,
}

impl ErrorCode {
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Map an engine status code back to an [`ErrorCode`]. Returns `None`
    /// for `0` (success) and for unknown codes.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Error,
            2 => Self::Misuse,
            3 => Self::PermissionDenied,
            4 => Self::NotFound,
            5 => Self::Busy,
            6 => Self::Corrupt,
            7 => Self::EmptyStore,
            8 => Self::AuthDenied,
            9 => Self::NoConnection,
            10 => Self::Timeout,
            11 => Self::Thread,
            12 => Self::CredentialMismatch,
            13 => Self::SlowConnection,
            14 => Self::RecordNotFound,
            15 => Self::Aborted,
            16 => Self::Unavailable,
            17 => Self::UnsupportedImage,
            _ => return None,
        })
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Error => "unspecified error",
            Self::Misuse => "invalid use of the library",
            Self::PermissionDenied => "access permission denied",
            Self::NotFound => "file not found",
            Self::Busy => "database file locked",
            Self::Corrupt => "database file corrupted",
            Self::EmptyStore => "empty database",
            Self::AuthDenied => "authorization denied",
            Self::NoConnection => "no internet connection",
            Self::Timeout => "operation timeout",
            Self::Thread => "threading error",
            Self::CredentialMismatch => "credentials mismatch",
            Self::SlowConnection => "internet connection too slow",
            Self::RecordNotFound => "record not found",
            Self::Aborted => "operation aborted",
            Self::Unavailable => "resource temporarily unavailable",
            Self::UnsupportedImage => "image size or format not supported",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// An error raised by one of the recognition engine's operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} ({message})")]
pub struct EngineError {
    code: ErrorCode,
    message: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_aborted(&self) -> bool {
        self.code == ErrorCode::Aborted
    }
}

impl From<ErrorCode> for EngineError {
    fn from(code: ErrorCode) -> Self {
        Self::new(code, code.description())
    }
}

/// Top-level crate error.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The recognition engine cannot run on this platform.
    #[error("recognition engine is not compatible with this device")]
    Incompatible,
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
    #[error("failed to spawn {name} thread")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("frame source error")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),
}
