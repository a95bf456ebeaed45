//! Error types for load and save pipelines.

use miette::Diagnostic;
use thiserror::Error;

/// HTML → Markdown conversion failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConvertError(pub String);

/// Markdown reflow failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FormatError(pub String);

/// The transport refused or failed to deliver a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<&str> for TransportError {
    fn from(s: &str) -> Self {
        TransportError(s.to_string())
    }
}

impl From<String> for TransportError {
    fn from(s: String) -> Self {
        TransportError(s)
    }
}

/// Main error type for docweave operations.
#[derive(Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum DocweaveError {
    /// Save was requested before any document was loaded.
    #[error("no document loaded")]
    #[diagnostic(code(docweave::not_loaded), help("load a document before saving it"))]
    NotLoaded,

    /// The doc-only view has no live widget to read from.
    #[error("no active documentation editor")]
    #[diagnostic(code(docweave::no_active_editor))]
    NoActiveEditor,

    /// The snapshot body does not match what its mode says it is.
    #[error("mode `{mode}` does not match the snapshot source")]
    #[diagnostic(code(docweave::mode_mismatch))]
    ModeMismatch { mode: String },

    /// Splitting the converted buffer did not give one piece per block.
    #[error("expected {expected} doc blocks after conversion, found {found}")]
    #[diagnostic(
        code(docweave::block_count_mismatch),
        help("the HTML converter must keep the text of unknown elements")
    )]
    BlockCountMismatch { expected: usize, found: usize },

    #[error("HTML to Markdown conversion failed: {0}")]
    #[diagnostic(code(docweave::convert))]
    Convert(#[from] ConvertError),

    #[error("Markdown reflow failed: {0}")]
    #[diagnostic(code(docweave::format))]
    Format(#[from] FormatError),

    #[error("transport did not confirm the save: {0}")]
    #[diagnostic(code(docweave::transport))]
    Transport(#[from] TransportError),
}

pub type Result<T, E = DocweaveError> = std::result::Result<T, E>;
