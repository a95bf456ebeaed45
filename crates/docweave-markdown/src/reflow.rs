//! Width-aware Markdown reflow.
//!
//! The input is parsed with pulldown-cmark and only paragraph text is
//! rewrapped: top-level paragraphs and the text of list items, at the item's
//! content column. Everything whose line structure carries meaning (fenced
//! and indented code, display math, headings, tables, block quotes, raw
//! HTML, thematic breaks) is copied through unchanged. Hard line breaks are
//! kept.

use std::borrow::Cow;
use std::ops::Range;

use docweave_core::{FormatError, MarkdownFormatter};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use textwrap::{WordSeparator, WordSplitter, WrapAlgorithm};
use tracing::trace;

use crate::render::default_md_options;

/// [`MarkdownFormatter`] backed by [`reflow`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Reflow;

impl MarkdownFormatter for Reflow {
    async fn format(&self, markdown: &str, print_width: usize) -> Result<String, FormatError> {
        reflow(markdown, print_width)
    }
}

/// Rewrap `markdown` so no paragraph line exceeds `width` columns.
///
/// Words longer than the width are never split. Output ends with exactly one
/// newline, or is empty when the input holds no content.
pub fn reflow(markdown: &str, width: usize) -> Result<String, FormatError> {
    if width == 0 {
        return Err(FormatError("print width must be at least 1".into()));
    }
    trace!(width, "reflowing markdown");
    let mut out = Lines::default();
    let mut cursor = 0;

    for span in spans(markdown) {
        let range = span.range().clone();
        let start = line_start(markdown, range.start);
        if start < cursor {
            continue;
        }
        let end = line_end(markdown, &range);
        out.gap(&markdown[cursor..start]);
        match span {
            Span::Keep(_) => out.kept(&markdown[start..end]),
            Span::Rewrap(range) => {
                let first = &markdown[start..range.start];
                let rest: String = first
                    .chars()
                    .map(|c| if c == '\t' { c } else { ' ' })
                    .collect();
                let mut lines = markdown[range.start..end].trim_end().split('\n');
                let head = lines.next().unwrap_or_default();
                let tail: Vec<&str> = lines.collect();
                out.extend(wrap_paragraph(head, &tail, width, first, &rest));
            }
        }
        cursor = end;
    }
    out.gap(&markdown[cursor..]);
    Ok(out.finish())
}

/// The renderer's extensions plus math, so display math is recognised.
fn parse_options() -> Options {
    default_md_options() | Options::ENABLE_MATH
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Item,
    Paragraph,
    /// Block quotes and footnote definitions. Nothing inside is rewrapped.
    Sheltered,
    Block,
    Inline,
}

impl Frame {
    fn of(tag: &Tag<'_>) -> Self {
        match tag {
            Tag::Item => Self::Item,
            Tag::Paragraph => Self::Paragraph,
            Tag::BlockQuote(_) | Tag::FootnoteDefinition(_) => Self::Sheltered,
            Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Link { .. }
            | Tag::Image { .. } => Self::Inline,
            _ => Self::Block,
        }
    }
}

/// Byte ranges of the input, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Span {
    Rewrap(Range<usize>),
    Keep(Range<usize>),
}

impl Span {
    fn range(&self) -> &Range<usize> {
        match self {
            Self::Rewrap(range) | Self::Keep(range) => range,
        }
    }
}

/// Paragraph text being collected.
struct Run {
    range: Range<usize>,
    math: bool,
}

impl Run {
    fn new(range: Range<usize>) -> Self {
        Self { range, math: false }
    }

    fn into_span(self, markdown: &str) -> Span {
        if self.math || markdown[self.range.clone()].trim_start().starts_with("$$") {
            Span::Keep(self.range)
        } else {
            Span::Rewrap(self.range)
        }
    }
}

/// Collects rewrap and keep spans from the parser's offset events.
#[derive(Default)]
struct SpanCollector {
    spans: Vec<Span>,
    stack: Vec<Frame>,
    paragraph: Option<Run>,
    /// Inline content sitting directly in a tight list item.
    item_text: Option<Run>,
}

impl SpanCollector {
    fn sheltered(&self) -> bool {
        self.stack.contains(&Frame::Sheltered)
    }

    fn in_item(&self) -> bool {
        self.stack.last() == Some(&Frame::Item)
    }

    fn extend_item_text(&mut self, range: &Range<usize>) {
        match &mut self.item_text {
            Some(run) => {
                run.range.start = run.range.start.min(range.start);
                run.range.end = run.range.end.max(range.end);
            }
            None => self.item_text = Some(Run::new(range.clone())),
        }
    }

    fn close_item_text(&mut self, markdown: &str) {
        if let Some(run) = self.item_text.take() {
            if !self.sheltered() {
                self.spans.push(run.into_span(markdown));
            }
        }
    }

    fn event(&mut self, markdown: &str, event: Event<'_>, range: Range<usize>) {
        match event {
            Event::Start(tag) => {
                let frame = Frame::of(&tag);
                if self.in_item() {
                    if frame == Frame::Inline {
                        self.extend_item_text(&range);
                    } else {
                        self.close_item_text(markdown);
                    }
                }
                match tag {
                    Tag::Paragraph => self.paragraph = Some(Run::new(range)),
                    Tag::CodeBlock(_) => self.spans.push(Span::Keep(range)),
                    _ => {}
                }
                self.stack.push(frame);
            }
            Event::End(end) => {
                if end == TagEnd::Item {
                    self.close_item_text(markdown);
                }
                self.stack.pop();
                if end == TagEnd::Paragraph {
                    if let Some(run) = self.paragraph.take() {
                        if !self.sheltered() {
                            self.spans.push(run.into_span(markdown));
                        }
                    }
                }
            }
            // Left in the item's first-line prefix.
            Event::TaskListMarker(_) => {}
            other => {
                let inline = !matches!(other, Event::Rule | Event::Html(_));
                if self.in_item() {
                    if inline {
                        self.extend_item_text(&range);
                    } else {
                        self.close_item_text(markdown);
                    }
                }
                if matches!(other, Event::DisplayMath(_)) {
                    if let Some(run) = self.paragraph.as_mut().or(self.item_text.as_mut()) {
                        run.math = true;
                    }
                }
            }
        }
    }
}

fn spans(markdown: &str) -> Vec<Span> {
    let mut collector = SpanCollector::default();
    for (event, range) in Parser::new_ext(markdown, parse_options()).into_offset_iter() {
        collector.event(markdown, event, range);
    }
    collector.spans
}

fn line_start(markdown: &str, pos: usize) -> usize {
    markdown[..pos].rfind('\n').map_or(0, |i| i + 1)
}

/// Offset just past the line holding the last non-blank byte of `range`.
fn line_end(markdown: &str, range: &Range<usize>) -> usize {
    let last = range.start + markdown[range.clone()].trim_end().len();
    markdown[last..]
        .find('\n')
        .map_or(markdown.len(), |i| last + i + 1)
}

/// Output lines. Blank runs outside kept blocks collapse to one blank line.
#[derive(Default)]
struct Lines(Vec<String>);

impl Lines {
    fn gap(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim_end();
            if !line.is_empty() || self.0.last().is_some_and(|l| !l.is_empty()) {
                self.0.push(line.to_string());
            }
        }
    }

    fn kept(&mut self, text: &str) {
        self.0.extend(text.lines().map(|l| l.trim_end().to_string()));
    }

    fn extend(&mut self, lines: Vec<String>) {
        self.0.extend(lines);
    }

    fn finish(mut self) -> String {
        while self.0.last().is_some_and(|l| l.is_empty()) {
            self.0.pop();
        }
        if self.0.is_empty() {
            return String::new();
        }
        let mut text = self.0.join("\n");
        text.push('\n');
        text
    }
}

/// Wrap one paragraph, splitting at hard breaks.
fn wrap_paragraph(
    head: &str,
    tail: &[&str],
    width: usize,
    first: &str,
    rest: &str,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut segment: Vec<&str> = Vec::new();
    let mut prefix = first;
    let raw = std::iter::once(head).chain(tail.iter().copied());
    let count = tail.len() + 1;

    for (n, line) in raw.enumerate() {
        segment.push(line.trim());
        let last = n + 1 == count;
        let two_space_break = !last && line.ends_with("  ");
        let backslash_break = !last && line.trim_end().ends_with('\\');
        if last || two_space_break || backslash_break {
            let mut wrapped = wrap_segment(&segment.join(" "), width, prefix, rest);
            if two_space_break {
                if let Some(end) = wrapped.last_mut() {
                    end.push_str("  ");
                }
            }
            out.append(&mut wrapped);
            segment.clear();
            prefix = rest;
        }
    }
    out
}

fn wrap_segment(text: &str, width: usize, first: &str, rest: &str) -> Vec<String> {
    let options = textwrap::Options::new(width)
        .initial_indent(first)
        .subsequent_indent(rest)
        .break_words(false)
        .word_separator(WordSeparator::AsciiSpace)
        .word_splitter(WordSplitter::NoHyphenation)
        .wrap_algorithm(WrapAlgorithm::FirstFit);
    let wrapped: Vec<String> = textwrap::wrap(text, options)
        .into_iter()
        .map(Cow::into_owned)
        .collect();

    // A continuation line that would start a new block is pulled back up.
    let mut merged: Vec<String> = Vec::with_capacity(wrapped.len());
    for line in wrapped {
        let body = line.strip_prefix(rest).unwrap_or(&line);
        if starts_block(body) {
            if let Some(prev) = merged.last_mut() {
                prev.push(' ');
                prev.push_str(body);
                continue;
            }
        }
        merged.push(line);
    }
    merged
}

/// Bullet (`-`, `*`, `+`) or ordered (`1.`, `1)`) list marker at line start.
fn is_list_marker(trimmed: &str) -> bool {
    let bytes = trimmed.as_bytes();
    let len = match bytes.first() {
        Some(b'-' | b'*' | b'+') => 1,
        Some(b'0'..=b'9') => {
            let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
            match bytes.get(digits) {
                Some(b'.' | b')') if digits <= 9 => digits + 1,
                _ => return false,
            }
        }
        _ => return false,
    };
    matches!(bytes.get(len), None | Some(b' ' | b'\t')) && !is_thematic_break(trimmed)
}

/// Would this line interrupt a paragraph if it started one?
fn starts_block(line: &str) -> bool {
    let trimmed = line.trim_start();
    is_heading(trimmed)
        || trimmed.starts_with('>')
        || trimmed.starts_with('|')
        || trimmed.starts_with('<')
        || is_thematic_break(trimmed)
        || is_list_marker(trimmed)
        || trimmed.starts_with("```")
        || trimmed.starts_with("~~~")
        || trimmed.starts_with("$$")
        || is_setext_underline(trimmed)
}

fn is_heading(trimmed: &str) -> bool {
    let hashes = trimmed.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes)
        && matches!(trimmed.as_bytes().get(hashes), None | Some(b' ' | b'\t'))
}

fn is_thematic_break(trimmed: &str) -> bool {
    let mut chars = trimmed.chars().filter(|c| !c.is_whitespace());
    let Some(first) = chars.next() else {
        return false;
    };
    matches!(first, '-' | '*' | '_') && chars.clone().all(|c| c == first) && chars.count() >= 2
}

fn is_setext_underline(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && (trimmed.bytes().all(|b| b == b'=') || trimmed.bytes().all(|b| b == b'-'))
}
