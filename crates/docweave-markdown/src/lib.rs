//! docweave-markdown: the Markdown side of the docweave save pipeline.
//!
//! - [`HtmdConverter`]: widget HTML → Markdown
//! - [`CommonMarkRenderer`]: stored Markdown → widget HTML
//! - [`Reflow`]: width-aware Markdown formatter

pub mod convert;
pub mod reflow;
pub mod render;

pub use convert::HtmdConverter;
pub use reflow::{Reflow, reflow};
pub use render::CommonMarkRenderer;
