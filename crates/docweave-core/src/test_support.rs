//! In-memory collaborators for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio::time::Instant;
use url::Url;

use crate::capability::{
    CodeView, DocView, Host, HtmlToMarkdown, MarkdownFormatter, MarkdownToHtml,
    NavigationController, Transport,
};
use crate::error::{ConvertError, FormatError, TransportError};
use crate::types::{CodeSource, DocBlock, UpdatePayload};

#[derive(Debug, Clone, Default)]
enum ConvertMode {
    #[default]
    Normal,
    Replacing(String, String),
    Failing,
}

/// Tag-stripping converter: `</p>` becomes a blank line, entities are decoded
/// after tags are removed. Elements without text vanish, like in real converters.
#[derive(Debug, Default)]
pub struct FakeConverter {
    calls: AtomicUsize,
    mode: ConvertMode,
}

impl FakeConverter {
    /// Removes `needle` from every output.
    pub fn dropping(needle: &str) -> Self {
        Self::replacing(needle, "")
    }

    /// Replaces `needle` with `with` in every output.
    pub fn replacing(needle: &str, with: &str) -> Self {
        Self {
            mode: ConvertMode::Replacing(needle.to_string(), with.to_string()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: ConvertMode::Failing,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HtmlToMarkdown for FakeConverter {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut text = String::new();
        let mut in_tag = false;
        for c in html.replace("</p>", "\n\n").chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if !in_tag => text.push(c),
                _ => {}
            }
        }
        let text = text
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&amp;", "&");
        match &self.mode {
            ConvertMode::Normal => Ok(text),
            ConvertMode::Replacing(needle, with) => Ok(text.replace(needle.as_str(), with)),
            ConvertMode::Failing => Err(ConvertError("malformed markup".into())),
        }
    }
}

/// Returns its input unchanged, like a converter that keeps unknown elements as HTML.
pub struct VerbatimConverter;

impl HtmlToMarkdown for VerbatimConverter {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError> {
        Ok(html.to_string())
    }
}

/// Trims, then appends a newline. Records every width it was asked for.
#[derive(Debug, Default)]
pub struct FakeFormatter {
    widths: Mutex<Vec<usize>>,
    fail: AtomicBool,
    fail_on: Mutex<Option<String>>,
}

impl FakeFormatter {
    pub fn widths(&self) -> Vec<usize> {
        self.widths.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Fail only for input containing `needle`.
    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock().unwrap() = Some(needle.to_string());
    }
}

impl MarkdownFormatter for FakeFormatter {
    async fn format(&self, markdown: &str, print_width: usize) -> Result<String, FormatError> {
        self.widths.lock().unwrap().push(print_width);
        let needle_hit = self
            .fail_on
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|needle| markdown.contains(needle));
        if self.fail.load(Ordering::SeqCst) || needle_hit {
            return Err(FormatError("unterminated fence".into()));
        }
        let trimmed = markdown.trim();
        if trimmed.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{trimmed}\n"))
        }
    }
}

/// Wraps trimmed Markdown in a paragraph.
pub struct FakeRenderer;

impl MarkdownToHtml for FakeRenderer {
    fn to_html(&self, markdown: &str) -> String {
        format!("<p>{}</p>", markdown.trim())
    }
}

/// Doc-only widget. Rendered math shows up as extra markup after the HTML.
#[derive(Debug, Default)]
pub struct FakeDocView {
    html: Mutex<Option<String>>,
    math_rendered: AtomicBool,
    log: Mutex<Vec<String>>,
}

impl FakeDocView {
    pub fn attach(&self, html: &str) {
        *self.html.lock().unwrap() = Some(html.to_string());
        self.math_rendered.store(true, Ordering::SeqCst);
    }

    pub fn detach(&self) {
        *self.html.lock().unwrap() = None;
    }

    pub fn math_rendered(&self) -> bool {
        self.math_rendered.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn raw_html(&self) -> Option<String> {
        self.html.lock().unwrap().clone()
    }
}

impl DocView for FakeDocView {
    fn html(&self) -> Option<String> {
        let html = self.html.lock().unwrap().clone()?;
        self.log.lock().unwrap().push("html".into());
        if self.math_rendered() {
            Some(format!("{html}<mjx-container>rendered</mjx-container>"))
        } else {
            Some(html)
        }
    }

    fn untypeset_math(&self) {
        self.log.lock().unwrap().push("untypeset".into());
        self.math_rendered.store(false, Ordering::SeqCst);
    }

    async fn typeset_math(&self) {
        self.log.lock().unwrap().push("typeset".into());
        self.math_rendered.store(true, Ordering::SeqCst);
    }

    async fn set_html(&self, html: &str) {
        self.log.lock().unwrap().push("set_html".into());
        *self.html.lock().unwrap() = Some(html.to_string());
    }
}

#[derive(Debug, Default)]
pub struct FakeCodeView {
    source: Mutex<CodeSource>,
}

impl FakeCodeView {
    pub fn set(&self, code: &str, doc_blocks: Vec<DocBlock>) {
        *self.source.lock().unwrap() = CodeSource {
            code: code.to_string(),
            doc_blocks,
        };
    }

    pub fn source(&self) -> CodeSource {
        self.source.lock().unwrap().clone()
    }
}

impl CodeView for FakeCodeView {
    fn contents(&self) -> CodeSource {
        self.source()
    }

    async fn set_contents(&self, code: &str, doc_blocks: Vec<DocBlock>) {
        self.set(code, doc_blocks);
    }
}

#[derive(Debug, Clone, Default)]
pub enum TransportMode {
    #[default]
    Confirm,
    Fail,
    /// Never resolves.
    Never,
    /// Each send waits for one permit.
    Gated(Arc<Semaphore>),
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    mode: Mutex<TransportMode>,
    started: Mutex<Vec<Instant>>,
    confirmed: Mutex<Vec<(Instant, UpdatePayload)>>,
}

impl FakeTransport {
    pub fn set_mode(&self, mode: TransportMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn started(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    pub fn confirmed(&self) -> Vec<UpdatePayload> {
        self.confirmed.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
    }

    pub fn confirmed_at(&self) -> Vec<Instant> {
        self.confirmed.lock().unwrap().iter().map(|(at, _)| *at).collect()
    }
}

impl Transport for FakeTransport {
    async fn send(&self, payload: UpdatePayload) -> Result<(), TransportError> {
        self.started.lock().unwrap().push(Instant::now());
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            TransportMode::Confirm => {}
            TransportMode::Fail => return Err("channel closed".into()),
            TransportMode::Never => std::future::pending::<()>().await,
            TransportMode::Gated(gate) => {
                let permit = gate.acquire().await.map_err(|e| TransportError(e.to_string()))?;
                permit.forget();
            }
        }
        self.confirmed.lock().unwrap().push((Instant::now(), payload));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeNavigation {
    visited: Mutex<Vec<Url>>,
}

impl FakeNavigation {
    pub fn visited(&self) -> Vec<Url> {
        self.visited.lock().unwrap().clone()
    }
}

impl NavigationController for FakeNavigation {
    fn navigate(&self, destination: &Url) {
        self.visited.lock().unwrap().push(destination.clone());
    }
}

impl NavigationController for Arc<FakeNavigation> {
    fn navigate(&self, destination: &Url) {
        self.as_ref().navigate(destination);
    }
}

/// Host whose parts stay inspectable from the test after the session takes it.
#[derive(Clone, Default)]
pub struct FakeHost {
    pub converter: Arc<FakeConverter>,
    pub formatter: Arc<FakeFormatter>,
    pub doc: Arc<FakeDocView>,
    pub code: Arc<FakeCodeView>,
    pub transport: Arc<FakeTransport>,
}

impl Host for FakeHost {
    type Converter = FakeConverter;
    type Renderer = FakeRenderer;
    type Formatter = FakeFormatter;
    type Doc = FakeDocView;
    type Code = FakeCodeView;
    type Transport = FakeTransport;

    fn converter(&self) -> &FakeConverter {
        &self.converter
    }

    fn renderer(&self) -> &FakeRenderer {
        &FakeRenderer
    }

    fn formatter(&self) -> &FakeFormatter {
        &self.formatter
    }

    fn doc_view(&self) -> &FakeDocView {
        &self.doc
    }

    fn code_view(&self) -> &FakeCodeView {
        &self.code
    }

    fn transport(&self) -> &FakeTransport {
        &self.transport
    }
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
