use docweave_core::{ConvertError, HtmlToMarkdown};
use tracing::warn;

/// HTML → Markdown through `htmd`.
///
/// Unknown elements keep their text, which is what the doc block codec needs
/// to find its separators again.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmdConverter;

impl HtmlToMarkdown for HtmdConverter {
    fn to_markdown(&self, html: &str) -> Result<String, ConvertError> {
        htmd::convert(html).map_err(|e| {
            warn!(error = %e, "htmd rejected document");
            ConvertError(e.to_string())
        })
    }
}
