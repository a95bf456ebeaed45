//! docweave-core: save pipeline for an editor that mixes code with rich-text
//! documentation.
//!
//! This crate provides:
//! - the data model exchanged with the host (`DocBlock`, `DocumentSnapshot`, `UpdatePayload`)
//! - capability traits for every outside collaborator, bundled by `Host`
//! - the doc block codec (rich text ⇄ reflowed Markdown)
//! - `SaveCoordinator`, `AutosaveScheduler` and `NavigationInterceptor`,
//!   wired together per document by `Session`

pub mod autosave;
pub mod capability;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod navigation;
pub mod session;
pub mod snapshot;
pub mod types;

#[cfg(test)]
mod test_support;

pub use autosave::AutosaveScheduler;
pub use capability::{
    CodeView, DocView, Host, HtmlToMarkdown, MarkdownFormatter, MarkdownToHtml,
    NavigationController, Transport,
};
pub use codec::{decode_doc, decode_doc_blocks, encode_doc_blocks, reflow_width};
pub use config::{SessionConfig, WidthPolicy};
pub use coordinator::{SaveCoordinator, SaveOutcome, SaveStatus};
pub use error::{ConvertError, DocweaveError, FormatError, Result, TransportError};
pub use navigation::{
    IgnoreReason, NavigateEvent, NavigationAllowance, NavigationDecision, NavigationInterceptor,
    NavigationOutcome,
};
pub use session::Session;
pub use smol_str::SmolStr;
pub use snapshot::SnapshotBuilder;
pub use types::{CodeSource, DocBlock, DocumentSnapshot, Metadata, Source, UpdatePayload};
