//! Document model shared by load, save, and the transport.
//!
//! These are the serializable shapes: a snapshot is rebuilt from widget state
//! on every save and handed to the transport wrapped in an [`UpdatePayload`].

use serde::{Deserialize, Serialize};

/// A single documentation comment.
///
/// Serialized as a 5-element array
/// `[start_line, delimiter_kind, indent, comment_prefix, contents]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DocBlockRepr", into = "DocBlockRepr")]
pub struct DocBlock {
    /// Line in the source file where the comment starts, if known.
    pub start_line: Option<u32>,
    /// Which comment delimiter the lexer matched (inline, block, ...).
    pub delimiter_kind: Option<String>,
    /// Whitespace preceding the comment delimiter.
    pub indent: String,
    /// The comment delimiter itself, e.g. `//` or `#`.
    pub comment_prefix: String,
    /// Markdown on disk, HTML while the block lives in the widget.
    pub contents: String,
}

#[derive(Serialize, Deserialize)]
struct DocBlockRepr(Option<u32>, Option<String>, String, String, String);

impl From<DocBlockRepr> for DocBlock {
    fn from(repr: DocBlockRepr) -> Self {
        let DocBlockRepr(start_line, delimiter_kind, indent, comment_prefix, contents) = repr;
        Self {
            start_line,
            delimiter_kind,
            indent,
            comment_prefix,
            contents,
        }
    }
}

impl From<DocBlock> for DocBlockRepr {
    fn from(block: DocBlock) -> Self {
        DocBlockRepr(
            block.start_line,
            block.delimiter_kind,
            block.indent,
            block.comment_prefix,
            block.contents,
        )
    }
}

impl DocBlock {
    /// Create a block with no position metadata.
    pub fn new(
        indent: impl Into<String>,
        comment_prefix: impl Into<String>,
        contents: impl Into<String>,
    ) -> Self {
        Self {
            start_line: None,
            delimiter_kind: None,
            indent: indent.into(),
            comment_prefix: comment_prefix.into(),
            contents: contents.into(),
        }
    }

    /// Builder-style setter for the source position.
    pub fn at_line(mut self, line: u32) -> Self {
        self.start_line = Some(line);
        self
    }

    /// Builder-style setter for the delimiter kind.
    pub fn with_delimiter(mut self, kind: impl Into<String>) -> Self {
        self.delimiter_kind = Some(kind.into());
        self
    }

    /// Replace the contents, keeping everything else.
    pub fn with_contents(&self, contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            ..self.clone()
        }
    }
}

/// Document-level metadata. Set on load, never changed by a save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Editor mode; selects doc-only vs code + doc handling.
    pub mode: String,
}

impl Metadata {
    pub fn new(mode: impl Into<String>) -> Self {
        Self { mode: mode.into() }
    }
}

/// Plain code plus its documentation blocks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSource {
    pub code: String,
    #[serde(default)]
    pub doc_blocks: Vec<DocBlock>,
}

/// Body of a document snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    /// Code interleaved with documentation blocks.
    Code {
        code: String,
        #[serde(default)]
        doc_blocks: Vec<DocBlock>,
    },
    /// A single documentation body; `doc_blocks` stays empty.
    Doc {
        doc: String,
        #[serde(default)]
        doc_blocks: Vec<DocBlock>,
    },
}

impl Source {
    pub fn doc(doc: impl Into<String>) -> Self {
        Source::Doc {
            doc: doc.into(),
            doc_blocks: Vec::new(),
        }
    }

    pub fn code(code: impl Into<String>, doc_blocks: Vec<DocBlock>) -> Self {
        Source::Code {
            code: code.into(),
            doc_blocks,
        }
    }

    /// The documentation blocks of a code document, empty for doc-only.
    pub fn doc_blocks(&self) -> &[DocBlock] {
        match self {
            Source::Code { doc_blocks, .. } | Source::Doc { doc_blocks, .. } => doc_blocks,
        }
    }

    pub fn is_doc_only(&self) -> bool {
        matches!(self, Source::Doc { .. })
    }
}

impl From<CodeSource> for Source {
    fn from(source: CodeSource) -> Self {
        Source::Code {
            code: source.code,
            doc_blocks: source.doc_blocks,
        }
    }
}

/// Serializable snapshot of a whole document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub metadata: Metadata,
    pub source: Source,
}

impl DocumentSnapshot {
    pub fn new(metadata: Metadata, source: Source) -> Self {
        Self { metadata, source }
    }
}

/// Unit of work handed to the transport.
///
/// `file_path` and the positions are filled in by collaborators, the core
/// leaves them unset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub file_path: Option<String>,
    pub contents: DocumentSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_position: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_position: Option<u32>,
}

impl UpdatePayload {
    pub fn new(contents: DocumentSnapshot) -> Self {
        Self {
            file_path: None,
            contents,
            scroll_position: None,
            cursor_position: None,
        }
    }
}
