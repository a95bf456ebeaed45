//! Widget-less host: views that hold HTML in memory and a transport that
//! writes the payload as JSON.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use docweave_core::{
    CodeSource, CodeView, DocBlock, DocView, Host, MarkdownToHtml, Transport, TransportError,
    UpdatePayload,
};
use docweave_markdown::{CommonMarkRenderer, HtmdConverter, Reflow};
use tracing::{debug, trace};

/// How loaded content reaches the views.
#[derive(Debug, Clone, Copy)]
pub enum WidgetRenderer {
    /// Stored Markdown is rendered to HTML.
    CommonMark(CommonMarkRenderer),
    /// Content already is widget HTML.
    Passthrough,
}

impl MarkdownToHtml for WidgetRenderer {
    fn to_html(&self, markdown: &str) -> String {
        match self {
            Self::CommonMark(renderer) => renderer.to_html(markdown),
            Self::Passthrough => markdown.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct HeadlessDocView {
    html: Mutex<Option<String>>,
}

impl DocView for HeadlessDocView {
    fn html(&self) -> Option<String> {
        self.html.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn untypeset_math(&self) {
        trace!("no math renderer attached");
    }

    async fn typeset_math(&self) {}

    async fn set_html(&self, html: &str) {
        *self.html.lock().unwrap_or_else(|e| e.into_inner()) = Some(html.to_string());
    }
}

#[derive(Debug, Default)]
pub struct HeadlessCodeView {
    source: Mutex<CodeSource>,
}

impl CodeView for HeadlessCodeView {
    fn contents(&self) -> CodeSource {
        self.source.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    async fn set_contents(&self, code: &str, doc_blocks: Vec<DocBlock>) {
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = CodeSource {
            code: code.to_string(),
            doc_blocks,
        };
    }
}

/// Writes each payload as pretty JSON to `out`, or stdout when unset.
#[derive(Debug)]
pub struct FileTransport {
    file_path: Option<String>,
    out: Option<PathBuf>,
}

impl FileTransport {
    pub fn new(file_path: Option<String>, out: Option<PathBuf>) -> Self {
        Self { file_path, out }
    }
}

impl Transport for FileTransport {
    async fn send(&self, mut payload: UpdatePayload) -> Result<(), TransportError> {
        payload.file_path = self.file_path.clone();
        let json =
            serde_json::to_string_pretty(&payload).map_err(|e| TransportError(e.to_string()))?;
        match &self.out {
            Some(path) => {
                tokio::fs::write(path, format!("{json}\n"))
                    .await
                    .map_err(|e| TransportError(format!("writing {}: {}", path.display(), e)))?;
                debug!(path = %path.display(), bytes = json.len(), "payload written");
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{json}").map_err(|e| TransportError(e.to_string()))?;
            }
        }
        Ok(())
    }
}

pub struct HeadlessHost {
    renderer: WidgetRenderer,
    doc: HeadlessDocView,
    code: HeadlessCodeView,
    transport: FileTransport,
}

impl HeadlessHost {
    pub fn new(renderer: WidgetRenderer, transport: FileTransport) -> Self {
        Self {
            renderer,
            doc: HeadlessDocView::default(),
            code: HeadlessCodeView::default(),
            transport,
        }
    }
}

impl Host for HeadlessHost {
    type Converter = HtmdConverter;
    type Renderer = WidgetRenderer;
    type Formatter = Reflow;
    type Doc = HeadlessDocView;
    type Code = HeadlessCodeView;
    type Transport = FileTransport;

    fn converter(&self) -> &HtmdConverter {
        &HtmdConverter
    }

    fn renderer(&self) -> &WidgetRenderer {
        &self.renderer
    }

    fn formatter(&self) -> &Reflow {
        &Reflow
    }

    fn doc_view(&self) -> &HeadlessDocView {
        &self.doc
    }

    fn code_view(&self) -> &HeadlessCodeView {
        &self.code
    }

    fn transport(&self) -> &FileTransport {
        &self.transport
    }
}
