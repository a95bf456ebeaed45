//! Building a [`DocumentSnapshot`] from live widget state.

use tracing::debug;

use crate::capability::{CodeView, DocView, Host, MarkdownToHtml};
use crate::codec;
use crate::config::SessionConfig;
use crate::error::{DocweaveError, Result};
use crate::types::{DocumentSnapshot, Metadata, Source};

/// Dispatches on the document kind and runs the matching decode.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    config: SessionConfig,
}

impl SnapshotBuilder {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn is_doc_only(&self, metadata: &Metadata) -> bool {
        self.config.is_doc_only(&metadata.mode)
    }

    /// Capture the current document.
    ///
    /// For doc-only documents rendered math is removed before the HTML is
    /// read, and rendered again afterwards whether or not the conversion
    /// succeeded.
    pub async fn build<H: Host>(
        &self,
        host: &H,
        metadata: &Metadata,
    ) -> Result<DocumentSnapshot> {
        let source = if self.is_doc_only(metadata) {
            self.build_doc(host).await?
        } else {
            self.build_code(host).await?
        };
        Ok(DocumentSnapshot::new(metadata.clone(), source))
    }

    async fn build_doc<H: Host>(&self, host: &H) -> Result<Source> {
        let view = host.doc_view();
        view.untypeset_math();
        let Some(html) = view.html() else {
            view.typeset_math().await;
            return Err(DocweaveError::NoActiveEditor);
        };
        let doc = codec::decode_doc(
            &html,
            host.converter(),
            host.formatter(),
            self.config.doc_only_width,
        )
        .await;
        view.typeset_math().await;
        Ok(Source::doc(doc?))
    }

    async fn build_code<H: Host>(&self, host: &H) -> Result<Source> {
        let mut source = host.code_view().contents();
        debug!(blocks = source.doc_blocks.len(), "decoding doc blocks");
        codec::decode_doc_blocks(
            &mut source.doc_blocks,
            host.converter(),
            host.formatter(),
            self.config.width_policy(),
        )
        .await?;
        Ok(source.into())
    }

    /// Push a loaded snapshot into the widgets, rendering Markdown to HTML.
    pub async fn apply<H: Host>(&self, host: &H, snapshot: &DocumentSnapshot) -> Result<()> {
        let doc_only = self.is_doc_only(&snapshot.metadata);
        match (&snapshot.source, doc_only) {
            (Source::Doc { doc, .. }, true) => {
                let view = host.doc_view();
                view.set_html(&host.renderer().to_html(doc)).await;
                view.typeset_math().await;
            }
            (Source::Code { code, doc_blocks }, false) => {
                let blocks = codec::encode_doc_blocks(host.renderer(), doc_blocks);
                host.code_view().set_contents(code, blocks).await;
            }
            _ => {
                return Err(DocweaveError::ModeMismatch {
                    mode: snapshot.metadata.mode.clone(),
                });
            }
        }
        Ok(())
    }
}
