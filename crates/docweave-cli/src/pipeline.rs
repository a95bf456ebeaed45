use std::path::PathBuf;

use docweave_core::{DocumentSnapshot, Session, SessionConfig};
use docweave_markdown::CommonMarkRenderer;
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing::info;

use crate::headless::{FileTransport, HeadlessHost, WidgetRenderer};

/// What the snapshot's doc contents hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// HTML, as the widgets would hand it back.
    Html,
    /// Stored Markdown.
    Markdown,
}

impl Input {
    fn renderer(self) -> WidgetRenderer {
        match self {
            Input::Html => WidgetRenderer::Passthrough,
            Input::Markdown => WidgetRenderer::CommonMark(CommonMarkRenderer::default()),
        }
    }
}

pub struct RunArgs {
    pub snapshot: PathBuf,
    pub out: Option<PathBuf>,
    pub file_path: Option<String>,
}

/// Load the snapshot into headless views and run one forced save.
pub async fn run(args: RunArgs, input: Input, config: SessionConfig) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.snapshot)
        .await
        .into_diagnostic()
        .wrap_err_with(|| format!("reading snapshot {}", args.snapshot.display()))?;
    let snapshot: DocumentSnapshot = serde_json::from_str(&raw)
        .into_diagnostic()
        .wrap_err("snapshot is not a valid document snapshot")?;

    let file_path = args
        .file_path
        .unwrap_or_else(|| args.snapshot.display().to_string());
    let transport = FileTransport::new(Some(file_path), args.out);
    let session = Session::new(HeadlessHost::new(input.renderer(), transport), config);

    session.load(snapshot).await?;
    let outcome = session.save_now().await?;
    info!(?input, ?outcome, snapshot = %args.snapshot.display(), "pipeline finished");
    Ok(())
}
