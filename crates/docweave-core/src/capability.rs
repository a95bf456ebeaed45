//! Collaborator seams.
//!
//! The core never touches a widget, a Markdown engine, or the network
//! directly. Everything it needs from the outside world is expressed as one
//! of these traits, and a [`Host`] bundles one implementation of each so a
//! session can be generic over a single type parameter.
//!
//! Async operations return `Send` futures: the autosave timer runs the save
//! pipeline on a spawned task.

use std::future::Future;

use url::Url;

use crate::error::{ConvertError, FormatError, TransportError};
use crate::types::{CodeSource, DocBlock, UpdatePayload};

/// Rich text → Markdown conversion.
///
/// Implementations must keep the text content of elements they do not
/// recognise (either as text or verbatim as HTML). The codec relies on this
/// to find its separators again.
pub trait HtmlToMarkdown: Send + Sync {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError>;
}

/// Markdown → rich text, used when loading content into the widgets.
pub trait MarkdownToHtml: Send + Sync {
    fn to_html(&self, markdown: &str) -> String;
}

/// Deterministic Markdown reflow to a target line width.
pub trait MarkdownFormatter: Send + Sync {
    fn format(
        &self,
        markdown: &str,
        print_width: usize,
    ) -> impl Future<Output = Result<String, FormatError>> + Send;
}

/// The rich-text widget showing a doc-only document.
pub trait DocView: Send + Sync {
    /// Current HTML, or `None` when no widget instance is attached.
    fn html(&self) -> Option<String>;

    /// Remove rendered math so that only the source markup remains.
    fn untypeset_math(&self);

    /// Render math in the live view again.
    fn typeset_math(&self) -> impl Future<Output = ()> + Send;

    /// Replace the widget contents, waiting for the widget to be ready first.
    fn set_html(&self, html: &str) -> impl Future<Output = ()> + Send;
}

/// The code editor holding code and per-block rich text.
pub trait CodeView: Send + Sync {
    /// Current code plus doc blocks whose contents are the widget's HTML.
    fn contents(&self) -> CodeSource;

    /// Replace code and doc blocks (block contents as HTML).
    fn set_contents(
        &self,
        code: &str,
        doc_blocks: Vec<DocBlock>,
    ) -> impl Future<Output = ()> + Send;
}

/// Delivers a payload to durable storage.
///
/// `Ok(())` means the delivery was confirmed. A future that never resolves
/// is a channel that never confirms.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        payload: UpdatePayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Performs the real page transition once a pre-navigation save finished.
pub trait NavigationController: Send + Sync {
    fn navigate(&self, destination: &Url);
}

/// Everything a session needs from its environment.
pub trait Host: Send + Sync + 'static {
    type Converter: HtmlToMarkdown;
    type Renderer: MarkdownToHtml;
    type Formatter: MarkdownFormatter;
    type Doc: DocView;
    type Code: CodeView;
    type Transport: Transport;

    fn converter(&self) -> &Self::Converter;
    fn renderer(&self) -> &Self::Renderer;
    fn formatter(&self) -> &Self::Formatter;
    fn doc_view(&self) -> &Self::Doc;
    fn code_view(&self) -> &Self::Code;
    fn transport(&self) -> &Self::Transport;
}
