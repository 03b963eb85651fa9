use thiserror::Error;

pub type LinkerResult<T> = Result<T, LinkerError>;

/// Fatal error kinds from the linker and its build-message substrate.
///
/// Only invariant breaches and conditions the spec marks fatal reach here as
/// an `Err`; everything else is accumulated into the current [`Job`] via
/// `buildmessage::error`/`exception` and never unwinds past a job boundary.
///
/// [`Job`]: crate::buildmessage::Job
#[derive(Error, Debug)]
pub enum LinkerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("diagnostic API used outside a job")]
    NoJob,

    #[error("diagnostic API used outside a capture")]
    NoCapture,

    #[error("package declares exports, a main module, or eager modules but no runtime dependency")]
    RuntimeRequired,

    #[error("internal invariant breach: unrecognised chunk in CombinedFile")]
    UnrecognisedChunk,

    #[error("LINKER_LEGACY is set to a value other than \"new\"; the legacy linker is not implemented by this crate")]
    LegacyLinkerUnsupported,

    #[error("malformed source map: {0}")]
    SourceMap(String),

    #[error("module tree error: {0}")]
    ModuleTree(String),

    #[error("invalid input file: {0}")]
    InvalidInputFile(String),

    #[error("{0}")]
    Rethrown(String),
}
