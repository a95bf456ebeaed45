use docweave_core::MarkdownToHtml;
use pulldown_cmark::{Options, Parser, html};

/// Markdown → HTML with the CommonMark extensions doc comments use.
#[derive(Debug, Clone, Copy)]
pub struct CommonMarkRenderer {
    options: Options,
}

impl CommonMarkRenderer {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

impl Default for CommonMarkRenderer {
    fn default() -> Self {
        Self::new(default_md_options())
    }
}

pub fn default_md_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_HEADING_ATTRIBUTES
}

impl MarkdownToHtml for CommonMarkRenderer {
    fn to_html(&self, markdown: &str) -> String {
        if markdown.trim().is_empty() {
            return String::new();
        }
        let parser = Parser::new_ext(markdown, self.options);
        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, parser);
        out
    }
}
