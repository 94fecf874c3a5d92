//! Error types for the engine's public and internal boundaries.

use std::fmt;

/// Hard errors returned from the public entry points (§7).
///
/// These either reflect API misuse or an unrecoverable failure; they are
/// distinct from [`ValidationFailure`], which is expected control flow during
/// a trial and never escapes the executor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StylusError {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("operation requires the engine to be initialized first")]
    NotInitialized,

    #[error("illegal state transition: {from:?} -> {to:?}")]
    InvalidState { from: String, to: String },

    #[error("XML error in {element}: {description}")]
    XmlError { element: String, description: String },

    #[error("I/O error: {0}")]
    IoError(String),
}

/// Internal-only failure raised by the compile/validate/score pipeline.
///
/// Never surfaced to a public caller: the [`crate::executor::Executor`]
/// catches every [`ValidationFailure`] and turns it into a rollback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}: {detail}")]
pub struct ValidationFailure {
    pub reason: ValidationReason,
    pub detail: String,
}
impl ValidationFailure {
    pub fn new(reason: ValidationReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationReason {
    Strokes,
    Measurement,
    Overlaps,
    Segments,
}
impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Strokes => "strokes",
            Self::Measurement => "measurement",
            Self::Overlaps => "overlaps",
            Self::Segments => "segments",
        };
        f.write_str(s)
    }
}

/// Why a mutation was rejected before ever reaching validation (§7).
///
/// Carried on the attempt record rather than as a hard error, mirroring the
/// source's `STGT_MUTATION` / `STGR_{CHANGE,COPY,DELETE,INSERT}` reason
/// codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationRejection {
    #[error("illegal start codon created outside a gene")]
    IllegalStartCodon,
    #[error("illegal stop codon created")]
    IllegalStopCodon,
    #[error("change is silent and rejectSilent is set")]
    SilentChangeRejected,
    #[error("copy source crosses a gene boundary")]
    CopyCrossesBoundary,
    #[error("transpose source crosses a gene boundary")]
    TransposeCrossesBoundary,
    #[error("mutation target overlaps its own source")]
    TargetOverlapsSource,
    #[error("index range is empty")]
    EmptyIndexRange,
}

pub type StylusResult<T> = Result<T, StylusError>;
