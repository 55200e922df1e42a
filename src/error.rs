//! Error types for pk11eddsa
//!
//! Every public operation returns one `EddsaError` on failure. HSM status
//! codes are mapped into this taxonomy at the adapter boundary, so the
//! core never sees a vendor error.

use thiserror::Error;

use crate::ports::HsmCall;

/// Result type alias for pk11eddsa operations
pub type EddsaResult<T> = Result<T, EddsaError>;

/// Top-level error type for all pk11eddsa operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EddsaError {
    /// The key algorithm (or curve parameters) is not Ed25519 or Ed448
    #[error("Algorithm not supported: {algorithm}")]
    InvalidAlgorithm { algorithm: String },

    /// Wire data or token point marker does not match the algorithm
    #[error("Invalid key encoding: {reason}")]
    InvalidEncoding { reason: String },

    /// Caller-provided output buffer is too small
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    InsufficientBuffer { needed: usize, available: usize },

    /// Operation needs key material (or private material) that is not present
    #[error("Key material missing: {reason}")]
    KeyMaterialMissing { reason: String },

    /// Token search yielded no object
    #[error("No token object matches {search}")]
    NotFound { search: String },

    /// Token search yielded more than one object
    #[error("{count} token objects match {search}")]
    AmbiguousMatch { search: String, count: usize },

    /// An underlying HSM call failed
    #[error("HSM {operation} failed: {reason}")]
    CryptoOperationFailure { operation: HsmCall, reason: String },

    /// The HSM rejected the signature
    #[error("Signature verification failed")]
    VerificationFailed,

    /// No session could be acquired from the pool
    #[error("No HSM session available: {reason}")]
    SessionUnavailable { reason: String },

    /// Private-key file content is malformed or inconsistent with the key
    #[error("Invalid private key file: {reason}")]
    InvalidPrivateKeyFile { reason: String },

    /// Token label could not be parsed
    #[error("Invalid token label: {reason}")]
    InvalidLabel { reason: String },

    /// A token-bound key was requested without a label
    #[error("No engine or label given for token-bound key")]
    NoEngine,

    /// The key carries no material to serialize
    #[error("Key has no material")]
    NullKey,

    /// Reading or writing a key file failed
    #[error("I/O error: {0}")]
    Io(String),
}

impl EddsaError {
    pub(crate) fn hsm(operation: HsmCall, reason: impl ToString) -> Self {
        EddsaError::CryptoOperationFailure {
            operation,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn private_file(reason: impl Into<String>) -> Self {
        EddsaError::InvalidPrivateKeyFile {
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        EddsaError::InvalidEncoding {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for EddsaError {
    fn from(err: std::io::Error) -> Self {
        EddsaError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EddsaError::InsufficientBuffer {
            needed: 64,
            available: 10,
        };
        assert_eq!(
            err.to_string(),
            "Output buffer too small: need 64 bytes, have 10"
        );
    }

    #[test]
    fn test_hsm_error_names_call() {
        let err = EddsaError::hsm(HsmCall::Sign, "CKR_DEVICE_ERROR");
        assert!(err.to_string().contains("sign"));
        assert!(err.to_string().contains("CKR_DEVICE_ERROR"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: EddsaError = io.into();
        assert!(matches!(err, EddsaError::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        let result: EddsaResult<i32> = Ok(42);
        assert_eq!(result.unwrap(), 42);

        let result: EddsaResult<i32> = Err(EddsaError::NullKey);
        assert!(result.is_err());
    }
}
