use n0_future::time::Duration;
use serde::{Deserialize, Serialize};

/// Mode string that marks a document as doc-only.
pub const DOC_ONLY_MODE: &str = "markdown";

/// Default autosave quiet period.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 1000;

/// Tunables for a session. Every field has a default so partial config files work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Debounce interval between the last mutation and the autosave.
    pub quiet_period_ms: u64,
    /// Column limit for a re-embedded doc block line.
    pub max_line_width: usize,
    /// Floor for the per-block reflow width.
    pub min_reflow_width: usize,
    /// Reflow width for doc-only documents.
    pub doc_only_width: usize,
    /// `metadata.mode` value that selects doc-only handling.
    pub doc_only_mode: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            max_line_width: 80,
            min_reflow_width: 40,
            doc_only_width: 80,
            doc_only_mode: DOC_ONLY_MODE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn width_policy(&self) -> WidthPolicy {
        WidthPolicy {
            max_line_width: self.max_line_width,
            min_width: self.min_reflow_width,
        }
    }

    pub fn is_doc_only(&self, mode: &str) -> bool {
        mode == self.doc_only_mode
    }
}

/// How wide a doc block may be reflowed, given where it sits in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidthPolicy {
    pub max_line_width: usize,
    pub min_width: usize,
}

impl Default for WidthPolicy {
    fn default() -> Self {
        Self {
            max_line_width: 80,
            min_width: 40,
        }
    }
}

impl WidthPolicy {
    /// `max(min_width, max_line_width - indent - prefix - 1)`.
    ///
    /// The extra column is the space between the delimiter and the text.
    pub fn print_width(&self, indent: &str, comment_prefix: &str) -> usize {
        let used = indent.chars().count() + comment_prefix.chars().count() + 1;
        self.max_line_width.saturating_sub(used).max(self.min_width)
    }
}
