//! Error types for stripecode

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the erasure-coding frontend and its backends.
///
/// Every variant maps to a stable negative error code (the `-200` series)
/// via [`Error::code`], so callers bridging to foreign ABIs or persisting
/// results can translate losslessly.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested backend id or name is unknown
    #[error("backend not supported: {0}")]
    BackendNotSupported(String),

    /// The backend does not implement the requested operation
    #[error("backend method not implemented: {0}")]
    MethodNotImplemented(String),

    /// Backend initialization failed
    #[error("backend init error: {0}")]
    BackendInitError(String),

    /// Backend instance is busy
    #[error("backend instance in use")]
    BackendInUse,

    /// The backend is known but not linked into this build, or the
    /// descriptor does not resolve to a live instance
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    /// A stored payload checksum did not match the payload bytes
    #[error("fragment payload checksum mismatch on fragment {index}")]
    BadChecksum { index: u32 },

    /// Invalid or inconsistent parameters
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// A fragment header is missing its magic or fails its metadata checksum
    #[error("bad fragment header: {0}")]
    BadHeader(String),

    /// Fewer than the minimum number of fragments survive, or the failure
    /// pattern exceeds the code's hamming distance
    #[error("insufficient fragments: have {available}, need {required}")]
    InsufficientFragments { available: usize, required: usize },
}

impl Error {
    /// Stable numeric code for this error, matching the on-wire taxonomy
    /// (`-200` through `-208`).
    pub fn code(&self) -> i32 {
        match self {
            Error::BackendNotSupported(_) => -200,
            Error::MethodNotImplemented(_) => -201,
            Error::BackendInitError(_) => -202,
            Error::BackendInUse => -203,
            Error::BackendNotAvailable(_) => -204,
            Error::BadChecksum { .. } => -205,
            Error::InvalidParams(_) => -206,
            Error::BadHeader(_) => -207,
            Error::InsufficientFragments { .. } => -208,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(Error::BackendNotSupported("x".into()).code(), -200);
        assert_eq!(Error::MethodNotImplemented("x".into()).code(), -201);
        assert_eq!(Error::BackendInitError("x".into()).code(), -202);
        assert_eq!(Error::BackendInUse.code(), -203);
        assert_eq!(Error::BackendNotAvailable("x".into()).code(), -204);
        assert_eq!(Error::BadChecksum { index: 0 }.code(), -205);
        assert_eq!(Error::InvalidParams("x".into()).code(), -206);
        assert_eq!(Error::BadHeader("x".into()).code(), -207);
        assert_eq!(
            Error::InsufficientFragments {
                available: 1,
                required: 2
            }
            .code(),
            -208
        );
    }
}
