//! Error types for the MPPS proxy core

use thiserror::Error;

/// Result type alias for proxy-core operations.
pub type Result<T> = std::result::Result<T, DimseError>;

/// Error types that can occur while handling DIMSE requests and spool state.
///
/// Each variant maps to one of the three peer-visible DIMSE status kinds at
/// the point a response is synthesized; see [`DimseError::status_kind`].
#[derive(Error, Debug)]
pub enum DimseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM object error: {0}")]
    DicomObject(String),

    #[error("no matching forward rule")]
    NoMatchingRule,

    #[error("template transform error: {0}")]
    Transform(String),

    #[error("missing .ncreate for iuid {0}")]
    MissingNCreate(String),

    #[error("DIMSE operation failed: {0}")]
    OperationFailed(String),

    #[error("association rejected: {0}")]
    AssociationRejected(String),

    #[error("Failed to rename file: {0}")]
    RenameFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("interrupted wait during live-forward: {0}")]
    Interrupted(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),
}

/// The three peer-visible DIMSE status kinds this core ever synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    ProcessingFailure,
    OutOfResources,
    UnableToProcess,
}

impl DimseError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform(msg.into())
    }

    /// Map this error to the DIMSE status kind a peer should see (§7).
    pub fn status_kind(&self) -> StatusKind {
        match self {
            DimseError::NoMatchingRule
            | DimseError::Transform(_)
            | DimseError::MissingNCreate(_)
            | DimseError::Config(_) => StatusKind::ProcessingFailure,
            DimseError::Io(_) | DimseError::RenameFailed(_) => StatusKind::OutOfResources,
            DimseError::Interrupted(_) => StatusKind::UnableToProcess,
            _ => StatusKind::ProcessingFailure,
        }
    }

    /// Whether retrying the same operation might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DimseError::Io(_) | DimseError::AssociationRejected(_) | DimseError::Interrupted(_)
        )
    }
}

impl StatusKind {
    /// DICOM status code for this kind.
    pub fn code(&self) -> u16 {
        match self {
            StatusKind::ProcessingFailure => 0x0110,
            StatusKind::OutOfResources => 0xA700,
            StatusKind::UnableToProcess => 0xC000,
        }
    }
}
