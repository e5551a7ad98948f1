use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    Internal,

    /// The user provided invalid or incomplete artifacts, or triggered an
    /// operation that cannot currently be performed.
    User,

    /// The crypto service could not be reached, rejected the request, or
    /// answered with something we cannot interpret.
    Service,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The artifact's filename does not carry the suffix expected for its slot.
    InvalidExtension,
    /// The artifact contained no data at all.
    EmptyArtifact,
    /// The artifact could not be read, or is binary rather than text.
    UnreadableArtifact,
    /// An AES key bundle lacks at least one of `encryption_key`, `nonce`, `tag`.
    KeyMaterialIncomplete,
    /// An RSA private key failed the header/body/footer check.
    InvalidKeyFormat,
    /// A required input (content, technique, key) has not been supplied.
    PreconditionUnmet,
    /// The service was unreachable or answered with an unparsable body.
    TransportFailure,
    /// The service answered with a non-success status and an error message.
    ServiceError,
    /// The service answered successfully but a required field was missing.
    MalformedResponse,
    /// Configuration could not be loaded or is invalid.
    Config,
    /// An operation was triggered while a request was still in flight.
    Busy,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct CryptdeskError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl CryptdeskError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// The user-facing message carried by the error.
    ///
    /// For failed operations this is the failure reason shown to the user.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CryptdeskError>;
