//! Doc block codec: many per-block rich-text fragments ⇄ one Markdown buffer.
//!
//! On save the widget hands back one HTML fragment per doc block. They are
//! joined with a synthetic separator element, converted to Markdown in a
//! single pass, split apart again, and reflowed to the width each block has
//! left once it is re-embedded behind its indent and comment delimiter.
//!
//! Two synthetic elements are involved:
//! - `<docweave-separator>` between blocks,
//! - `<docweave-empty>` standing in for a block with no rendered content,
//!   which converters would otherwise drop along with its boundary.
//!
//! Both carry alphanumeric marker text. Converters either keep unknown
//! elements verbatim or keep only their text, and neither escapes letters and
//! digits, so the marker survives conversion either way. The marker number is
//! picked so it appears nowhere in the document being converted.

use tracing::debug;

use crate::capability::{HtmlToMarkdown, MarkdownFormatter, MarkdownToHtml};
use crate::config::WidthPolicy;
use crate::error::{DocweaveError, Result};
use crate::types::DocBlock;

pub const SEPARATOR_TAG: &str = "docweave-separator";
pub const PLACEHOLDER_TAG: &str = "docweave-empty";

/// How many marker numbers are tried before a collision in the converted
/// output is reported as a count mismatch.
const MAX_MARKER_ATTEMPTS: usize = 8;

/// Marker texts for one decode pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Markers {
    number: usize,
    separator: String,
    placeholder: String,
}

impl Markers {
    fn numbered(n: usize) -> Self {
        Self {
            number: n,
            separator: format!("docweavesep{n}x"),
            placeholder: format!("docweaveempty{n}x"),
        }
    }

    /// Smallest-numbered markers, starting at `from`, that collide with
    /// nothing in `blocks`. Character references are decoded before looking.
    pub(crate) fn choose(blocks: &[DocBlock], from: usize) -> Self {
        let texts: Vec<String> = blocks.iter().map(|b| text_content(&b.contents)).collect();
        let mut n = from;
        loop {
            let markers = Self::numbered(n);
            let collides = blocks.iter().zip(&texts).any(|(block, text)| {
                markers.occurs_in(&block.contents) || markers.occurs_in(text)
            });
            if !collides {
                debug!(marker = n, blocks = blocks.len(), "doc block markers chosen");
                return markers;
            }
            n += 1;
        }
    }

    /// Whether the converter produced marker text the join did not put in,
    /// e.g. by resolving markup that spells one out.
    pub(crate) fn collides_in_output(&self, markdown: &str, blocks: &[DocBlock]) -> bool {
        let empty = blocks.iter().filter(|b| b.contents.trim().is_empty()).count();
        markdown.matches(self.separator.as_str()).count() > blocks.len() - 1
            || markdown.matches(self.placeholder.as_str()).count() > empty
    }

    fn occurs_in(&self, haystack: &str) -> bool {
        haystack.contains(&self.separator) || haystack.contains(&self.placeholder)
    }

    fn separator_html(&self) -> String {
        format!("\n<{SEPARATOR_TAG}>{}</{SEPARATOR_TAG}>\n", self.separator)
    }

    fn placeholder_html(&self) -> String {
        format!("<{PLACEHOLDER_TAG}>{}</{PLACEHOLDER_TAG}>", self.placeholder)
    }

    /// Join block contents, substituting the placeholder for empty blocks.
    pub(crate) fn join(&self, blocks: &[DocBlock]) -> String {
        let placeholder = self.placeholder_html();
        let parts: Vec<&str> = blocks
            .iter()
            .map(|block| {
                if block.contents.trim().is_empty() {
                    placeholder.as_str()
                } else {
                    block.contents.as_str()
                }
            })
            .collect();
        parts.join(&self.separator_html())
    }

    /// Split converted Markdown back into trimmed per-block strings.
    pub(crate) fn split(&self, markdown: &str) -> Vec<String> {
        let open = format!("<{SEPARATOR_TAG}>");
        let close = format!("</{SEPARATOR_TAG}>");
        let pieces: Vec<&str> = markdown.split(self.separator.as_str()).collect();
        let last = pieces.len() - 1;
        pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let mut piece = piece.trim();
                if i > 0 {
                    piece = piece.strip_prefix(close.as_str()).unwrap_or(piece).trim_start();
                }
                if i < last {
                    piece = piece.strip_suffix(open.as_str()).unwrap_or(piece).trim_end();
                }
                piece.to_string()
            })
            .collect()
    }

    /// Whether a split piece is the converted form of the empty placeholder.
    pub(crate) fn is_placeholder(&self, piece: &str) -> bool {
        let open = format!("<{PLACEHOLDER_TAG}>");
        let close = format!("</{PLACEHOLDER_TAG}>");
        let piece = piece.trim();
        let piece = piece.strip_prefix(open.as_str()).unwrap_or(piece);
        let piece = piece.strip_suffix(close.as_str()).unwrap_or(piece);
        piece.trim() == self.placeholder
    }
}

/// Text content of an HTML fragment: tags removed, character references
/// resolved.
fn text_content(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    decode_char_refs(&text)
}

/// Resolve numeric character references and the common named ones.
/// Unknown or malformed references are kept as written.
fn decode_char_refs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let resolved = rest.find(';').and_then(|end| {
            let c = match &rest[1..end] {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                name => {
                    let code = match name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => name.strip_prefix('#').and_then(|dec| dec.parse().ok()),
                    };
                    code.and_then(char::from_u32)
                }
            };
            c.map(|c| (c, end))
        });
        match resolved {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Reflow width for a block with the default 80/40 policy.
pub fn reflow_width(indent: &str, comment_prefix: &str) -> usize {
    WidthPolicy::default().print_width(indent, comment_prefix)
}

/// Convert the widget's per-block HTML back to reflowed Markdown, in place.
///
/// Block order, count, and every field but `contents` are preserved. An
/// empty or whitespace-only block comes back as `""`; a block whose reflow
/// produced nothing comes back as a single newline.
pub async fn decode_doc_blocks<C, F>(
    blocks: &mut [DocBlock],
    converter: &C,
    formatter: &F,
    policy: WidthPolicy,
) -> Result<()>
where
    C: HtmlToMarkdown,
    F: MarkdownFormatter,
{
    if blocks.is_empty() {
        return Ok(());
    }

    let (markers, markdown) = convert_joined(blocks, converter)?;
    let pieces = markers.split(&markdown);
    if pieces.len() != blocks.len() {
        return Err(DocweaveError::BlockCountMismatch {
            expected: blocks.len(),
            found: pieces.len(),
        });
    }

    // Blocks are only written once every piece has been reflowed.
    let mut decoded = Vec::with_capacity(pieces.len());
    for (block, piece) in blocks.iter().zip(pieces) {
        let contents = if markers.is_placeholder(&piece) {
            String::new()
        } else {
            let width = policy.print_width(&block.indent, &block.comment_prefix);
            let formatted = formatter.format(&piece, width).await?;
            if formatted.is_empty() {
                "\n".to_string()
            } else {
                formatted
            }
        };
        decoded.push(contents);
    }
    for (block, contents) in blocks.iter_mut().zip(decoded) {
        block.contents = contents;
    }
    Ok(())
}

/// Join and convert, moving to higher-numbered markers when the converted
/// output contains marker text of its own.
fn convert_joined<C: HtmlToMarkdown>(
    blocks: &[DocBlock],
    converter: &C,
) -> Result<(Markers, String)> {
    let mut markers = Markers::choose(blocks, 0);
    let mut attempt = 1;
    loop {
        let markdown = converter.to_markdown(&markers.join(blocks))?;
        if attempt == MAX_MARKER_ATTEMPTS || !markers.collides_in_output(&markdown, blocks) {
            return Ok((markers, markdown));
        }
        debug!(marker = markers.number, "converted output contains marker text, retrying");
        markers = Markers::choose(blocks, markers.number + 1);
        attempt += 1;
    }
}

/// Convert a whole doc-only body from HTML to reflowed Markdown.
pub async fn decode_doc<C, F>(
    html: &str,
    converter: &C,
    formatter: &F,
    width: usize,
) -> Result<String>
where
    C: HtmlToMarkdown,
    F: MarkdownFormatter,
{
    let markdown = converter.to_markdown(html)?;
    Ok(formatter.format(&markdown, width).await?)
}

/// Render each block's Markdown to HTML for the widget.
pub fn encode_doc_blocks<R: MarkdownToHtml>(renderer: &R, blocks: &[DocBlock]) -> Vec<DocBlock> {
    blocks
        .iter()
        .map(|block| {
            if block.contents.trim().is_empty() {
                block.with_contents(String::new())
            } else {
                block.with_contents(renderer.to_html(&block.contents))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeConverter, FakeFormatter, FakeRenderer, VerbatimConverter};

    fn block(indent: &str, prefix: &str, contents: &str) -> DocBlock {
        DocBlock::new(indent, prefix, contents)
    }

    #[test]
    fn markers_avoid_document_text() {
        let blocks = vec![block("", "//", "<p>docweavesep0x</p>")];
        assert_eq!(Markers::choose(&blocks, 0), Markers::numbered(1));

        let blocks = vec![block("", "//", "<p>docweave<b>empty0</b>x and docweavesep1x</p>")];
        assert_eq!(Markers::choose(&blocks, 0), Markers::numbered(2));

        let blocks = vec![block("", "//", "<p>plain</p>")];
        assert_eq!(Markers::choose(&blocks, 0), Markers::numbered(0));
        assert_eq!(Markers::choose(&blocks, 4), Markers::numbered(4));
    }

    #[test]
    fn markers_avoid_text_spelled_with_character_references() {
        let blocks = vec![block("", "//", "<p>docweave&#101;mpty0x</p>")];
        assert_eq!(Markers::choose(&blocks, 0), Markers::numbered(1));

        let blocks = vec![block("", "//", "<p>docweave&#x73;ep0x and docweave&#X73;ep1x</p>")];
        assert_eq!(Markers::choose(&blocks, 0), Markers::numbered(2));
    }

    #[test]
    fn join_substitutes_placeholder_for_blank_blocks() {
        let markers = Markers::numbered(0);
        let joined = markers.join(&[block("", "//", "<p>a</p>"), block("", "//", "  \n ")]);
        assert_eq!(
            joined,
            "<p>a</p>\n<docweave-separator>docweavesep0x</docweave-separator>\n\
             <docweave-empty>docweaveempty0x</docweave-empty>"
        );
    }

    #[test]
    fn split_handles_text_and_verbatim_separators() {
        let markers = Markers::numbered(0);
        assert_eq!(markers.split("a\n\ndocweavesep0x\n\nb"), vec!["a", "b"]);
        assert_eq!(
            markers.split("a\n<docweave-separator>docweavesep0x</docweave-separator>\nb"),
            vec!["a", "b"]
        );
        assert_eq!(markers.split("only"), vec!["only"]);
    }

    #[test]
    fn placeholder_recognised_in_both_forms() {
        let markers = Markers::numbered(3);
        assert!(markers.is_placeholder(" docweaveempty3x\n"));
        assert!(markers.is_placeholder("<docweave-empty>docweaveempty3x</docweave-empty>"));
        assert!(!markers.is_placeholder("docweaveempty0x"));
        assert!(!markers.is_placeholder("docweaveempty3x and more"));
    }

    #[test]
    fn text_content_resolves_references() {
        assert_eq!(text_content("<p>a <b>b</b></p>c"), "a bc");
        assert_eq!(text_content("<p>&lt;x&gt; &amp; &#65;&#x42;</p>"), "<x> & AB");
        assert_eq!(text_content("fish & chips; &bogus; &#xZZ;"), "fish & chips; &bogus; &#xZZ;");
    }

    #[test]
    fn reflow_width_examples() {
        assert_eq!(reflow_width("    ", "//"), 73);
        assert_eq!(reflow_width(&" ".repeat(50), &"#".repeat(10)), 40);
    }

    #[tokio::test]
    async fn zero_blocks_decode_to_zero_blocks() {
        let converter = FakeConverter::default();
        let mut blocks: Vec<DocBlock> = Vec::new();
        decode_doc_blocks(
            &mut blocks,
            &converter,
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap();
        assert!(blocks.is_empty());
        assert_eq!(converter.calls(), 0);
    }

    #[tokio::test]
    async fn decode_converts_once_and_reflows_per_block() {
        let converter = FakeConverter::default();
        let formatter = FakeFormatter::default();
        let mut blocks = vec![
            block("    ", "//", "<p>first</p>"),
            block("", "#", "<p>second</p><p>para</p>"),
        ];
        decode_doc_blocks(&mut blocks, &converter, &formatter, WidthPolicy::default())
            .await
            .unwrap();

        assert_eq!(converter.calls(), 1);
        assert_eq!(blocks[0].contents, "first\n");
        assert_eq!(blocks[1].contents, "second\n\npara\n");
        assert_eq!(formatter.widths(), vec![73, 78]);
        assert_eq!(blocks[0].indent, "    ");
        assert_eq!(blocks[1].comment_prefix, "#");
    }

    #[tokio::test]
    async fn empty_blocks_survive_in_place() {
        let formatter = FakeFormatter::default();
        let mut blocks = vec![
            block("", "//", "<p>a</p>"),
            block("", "//", ""),
            block("", "//", "   \n\t"),
            block("", "//", "<p>d</p>"),
        ];
        decode_doc_blocks(
            &mut blocks,
            &FakeConverter::default(),
            &formatter,
            WidthPolicy::default(),
        )
        .await
        .unwrap();

        let contents: Vec<&str> = blocks.iter().map(|b| b.contents.as_str()).collect();
        assert_eq!(contents, vec!["a\n", "", "", "d\n"]);
        assert_eq!(formatter.widths().len(), 2);
    }

    #[tokio::test]
    async fn elements_without_content_are_not_blank_blocks() {
        // `<p></p>` is not blank markup, so reflow runs and yields nothing.
        let mut blocks = vec![block("", "//", "<p></p>"), block("", "//", "<p>b</p>")];
        decode_doc_blocks(
            &mut blocks,
            &FakeConverter::default(),
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap();
        assert_eq!(blocks[0].contents, "\n");
        assert_eq!(blocks[1].contents, "b\n");
    }

    #[tokio::test]
    async fn separator_lookalike_content_stays_aligned() {
        let mut blocks = vec![
            block("", "//", "<p>docweavesep0x</p>"),
            block("", "//", "<p>&lt;docweave-separator&gt;&lt;/docweave-separator&gt;</p>"),
            block("", "//", "<p>docweaveempty0x</p>"),
            block("", "//", ""),
        ];
        decode_doc_blocks(
            &mut blocks,
            &FakeConverter::default(),
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap();

        let contents: Vec<&str> = blocks.iter().map(|b| b.contents.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "docweavesep0x\n",
                "<docweave-separator></docweave-separator>\n",
                "docweaveempty0x\n",
                "",
            ]
        );
    }

    #[tokio::test]
    async fn verbatim_converter_output_is_split_too() {
        let mut blocks = vec![block("", "//", "a"), block("", "//", ""), block("", "//", "c")];
        decode_doc_blocks(
            &mut blocks,
            &VerbatimConverter,
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap();
        let contents: Vec<&str> = blocks.iter().map(|b| b.contents.as_str()).collect();
        assert_eq!(contents, vec!["a\n", "", "c\n"]);
    }

    #[tokio::test]
    async fn lost_separator_is_an_error() {
        let converter = FakeConverter::dropping("docweavesep0x");
        let mut blocks = vec![block("", "//", "<p>a</p>"), block("", "//", "<p>b</p>")];
        let err = decode_doc_blocks(
            &mut blocks,
            &converter,
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            DocweaveError::BlockCountMismatch { expected: 2, found: 1 }
        ));
    }

    #[tokio::test]
    async fn conversion_failure_propagates() {
        let converter = FakeConverter::failing();
        let mut blocks = vec![block("", "//", "<p>a</p>")];
        let err = decode_doc_blocks(
            &mut blocks,
            &converter,
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocweaveError::Convert(_)));
        assert_eq!(blocks[0].contents, "<p>a</p>");
    }

    #[tokio::test]
    async fn converter_made_marker_text_moves_to_the_next_markers() {
        // The converter turns `ZZ` into text that reads like the first separator.
        let converter = FakeConverter::replacing("ZZ", "docweavesep0x");
        let mut blocks = vec![block("", "//", "<p>a ZZ</p>"), block("", "//", "<p>b</p>")];
        decode_doc_blocks(
            &mut blocks,
            &converter,
            &FakeFormatter::default(),
            WidthPolicy::default(),
        )
        .await
        .unwrap();

        assert_eq!(converter.calls(), 2);
        assert_eq!(blocks[0].contents, "a docweavesep0x\n");
        assert_eq!(blocks[1].contents, "b\n");
    }

    #[tokio::test]
    async fn formatter_failure_leaves_every_block_untouched() {
        let formatter = FakeFormatter::default();
        formatter.fail_on("second");
        let mut blocks = vec![
            block("", "//", "<p>first</p>"),
            block("", "//", "<p>second</p>"),
            block("", "//", "<p>third</p>"),
        ];
        let err = decode_doc_blocks(
            &mut blocks,
            &FakeConverter::default(),
            &formatter,
            WidthPolicy::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DocweaveError::Format(_)));
        let contents: Vec<&str> = blocks.iter().map(|b| b.contents.as_str()).collect();
        assert_eq!(contents, vec!["<p>first</p>", "<p>second</p>", "<p>third</p>"]);
    }

    #[tokio::test]
    async fn decode_doc_reflows_at_given_width() {
        let formatter = FakeFormatter::default();
        let md = decode_doc("<p>body</p>", &FakeConverter::default(), &formatter, 80)
            .await
            .unwrap();
        assert_eq!(md, "body\n");
        assert_eq!(formatter.widths(), vec![80]);
    }

    #[test]
    fn encode_renders_each_block() {
        let blocks = vec![block("  ", "//", "hello"), block("", "#", "  ")];
        let encoded = encode_doc_blocks(&FakeRenderer, &blocks);
        assert_eq!(encoded[0].contents, "<p>hello</p>");
        assert_eq!(encoded[0].indent, "  ");
        assert_eq!(encoded[1].contents, "");
    }
}
