//! Running the cell under the cursor against the compiled Python artifact.
//!
//! The runner owns the session's import cache and talks to the outside world
//! through three seams: the editor document ([`SourceDocument`]), the file
//! system holding the derived artifact ([`ArtifactFs`]), and the interactive
//! execution surface ([`ExecutionBackend`]).

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::app::scan::{
    collect_prefix_lines, count_occurrences, find_nth_occurrence, floor_char_boundary,
};
use crate::app::session::ImportSession;
use crate::app::sync::{WaitPolicy, wait_until_newer};
use crate::domain::errors::{RunError, SyncError};
use crate::domain::model::{CellBounds, CellPayload, RunOutcome};
use crate::infra::config::Config;

static IMPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#|from\b|import\b)").expect("import pattern is valid"));

/// An open source document as the editor sees it.
#[async_trait]
pub trait SourceDocument: Send + Sync {
    fn path(&self) -> &Path;

    /// Current buffer contents.
    fn text(&self) -> &str;

    /// Byte offset of the cursor in [`SourceDocument::text`].
    fn cursor(&self) -> usize;

    /// Persist the buffer so the external compiler sees it.
    async fn save(&self) -> io::Result<()>;
}

/// File access needed to observe the compiler's output.
#[async_trait]
pub trait ArtifactFs: Send + Sync {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Interactive surface that executes a text payload.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Bring the interactive context up if it is not running.
    ///
    /// Returns `true` when a new context was started, which has seen none of
    /// the payloads sent before.
    async fn connect(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn execute(&self, payload: &str) -> anyhow::Result<()>;

    /// Shut the interactive context down once the session is over.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Marker strings, file naming, and wait bounds used by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSettings {
    pub source_marker: String,
    pub derived_marker: String,
    pub source_extensions: Vec<String>,
    pub derived_extension: String,
    pub wait: WaitPolicy,
}

impl CellSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_marker: config.markers.source.clone(),
            derived_marker: config.markers.derived.clone(),
            source_extensions: config.paths.source_extensions.clone(),
            derived_extension: config.paths.derived_extension.clone(),
            wait: WaitPolicy::from_config(config),
        }
    }
}

impl Default for CellSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Session-scoped orchestrator for "run current cell" requests.
#[derive(Debug)]
pub struct CellRunner<F, B> {
    fs: F,
    backend: B,
    settings: CellSettings,
    session: ImportSession,
}

impl<F, B> CellRunner<F, B>
where
    F: ArtifactFs,
    B: ExecutionBackend,
{
    /// Start a session with an empty import cache.
    pub fn new(fs: F, backend: B, settings: CellSettings) -> Self {
        Self {
            fs,
            backend,
            settings,
            session: ImportSession::new(),
        }
    }

    pub fn settings(&self) -> &CellSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Imports already sent during this session, oldest first.
    pub fn imports(&self) -> &[String] {
        self.session.imports()
    }

    /// Forget every cached import so the next run re-sends the full block.
    pub fn reset_imports(&mut self) -> usize {
        let dropped = self.session.reset();
        tracing::info!(dropped, "import cache reset");
        dropped
    }

    /// Save, wait for the compiler, cut the current cell out of the artifact and
    /// send it with any imports this session has not sent yet.
    #[tracing::instrument(skip_all, fields(source = %document.path().display()))]
    pub async fn run_current_cell(
        &mut self,
        document: &dyn SourceDocument,
    ) -> Result<RunOutcome, RunError> {
        let source = document.path();
        document
            .save()
            .await
            .map_err(|err| source_unavailable(source, err))?;

        let index = cell_index(document.text(), document.cursor(), &self.settings.source_marker);
        if index < 1 {
            tracing::info!("no cell marker before cursor");
            return Ok(RunOutcome::NoCell);
        }

        let artifact = self.artifact_path(source)?;
        let source_modified = self
            .fs
            .modified(source)
            .await
            .map_err(|err| source_unavailable(source, err))?;

        let fs = &self.fs;
        let target = artifact.as_path();
        wait_until_newer(source_modified, || fs.modified(target), self.settings.wait)
            .await
            .map_err(|err| match err {
                SyncError::Timeout { waited } => RunError::NotUpdated { waited },
                SyncError::Unavailable(source) => RunError::ArtifactUnavailable {
                    path: artifact.clone(),
                    source,
                },
            })?;

        let text = self.read_artifact(&artifact).await?;

        let fresh = self.backend.connect().await.map_err(dispatch_failed)?;
        if fresh {
            let dropped = self.session.reset();
            if dropped > 0 {
                tracing::info!(dropped, "interactive context restarted, import cache cleared");
            }
        }

        let payload = self.assemble(index, artifact, &text)?;
        self.backend
            .execute(&payload.text)
            .await
            .map_err(dispatch_failed)?;

        let added = self.session.record(payload.new_imports.iter().cloned());
        tracing::info!(
            cell = payload.index,
            imports = added,
            bytes = payload.text.len(),
            "cell dispatched"
        );
        Ok(RunOutcome::Executed(payload))
    }

    /// Build the payload for the current cell from the artifact as it is now.
    ///
    /// Does not save, wait, dispatch, or touch the import cache.
    pub async fn preview_cell(
        &self,
        document: &dyn SourceDocument,
    ) -> Result<Option<CellPayload>, RunError> {
        let index = cell_index(document.text(), document.cursor(), &self.settings.source_marker);
        if index < 1 {
            return Ok(None);
        }
        let artifact = self.artifact_path(document.path())?;
        let text = self.read_artifact(&artifact).await?;
        self.assemble(index, artifact, &text).map(Some)
    }

    /// Companion Python path for `source`, e.g. `Plot.fsx` -> `Plot.py`.
    pub fn artifact_path(&self, source: &Path) -> Result<PathBuf, RunError> {
        let recognized = source
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.settings.source_extensions.iter().any(|known| known == ext));
        if !recognized {
            return Err(RunError::UnsupportedSource {
                path: source.to_path_buf(),
            });
        }
        Ok(source.with_extension(&self.settings.derived_extension))
    }

    async fn read_artifact(&self, artifact: &Path) -> Result<String, RunError> {
        self.fs
            .read_to_string(artifact)
            .await
            .map_err(|source| RunError::ArtifactRead {
                path: artifact.to_path_buf(),
                source,
            })
    }

    fn assemble(
        &self,
        index: usize,
        artifact: PathBuf,
        text: &str,
    ) -> Result<CellPayload, RunError> {
        let marker = self.settings.derived_marker.as_str();
        let bounds = cell_bounds(text, marker, index).ok_or_else(|| RunError::CellNotFound {
            index,
            found: count_occurrences(text, marker, 0),
        })?;

        let new_imports = self.session.novel(collect_prefix_lines(text, is_import_line));

        let mut payload = new_imports.join("\n");
        payload.push('\n');
        payload.push_str(bounds.body(text, marker));

        tracing::debug!(cell = index, ?bounds, imports = new_imports.len(), "cell assembled");
        Ok(CellPayload {
            index,
            artifact,
            new_imports,
            bounds,
            text: payload,
        })
    }
}

/// Which cell the cursor sits in: the number of source markers before it.
pub fn cell_index(text: &str, cursor: usize, marker: &str) -> usize {
    let cursor = floor_char_boundary(text, cursor);
    count_occurrences(&text[..cursor], marker, 0)
}

/// Boundaries of the `index`-th cell (1-based) in the derived text.
///
/// The cell runs from its marker to the next marker, or to the end of the text
/// when it is the last one. `None` when the text has fewer than `index` markers.
pub fn cell_bounds(text: &str, marker: &str, index: usize) -> Option<CellBounds> {
    let start = find_nth_occurrence(text, marker, index, 0)?;
    let end = find_nth_occurrence(text, marker, 1, start + marker.len()).unwrap_or(text.len());
    Some(CellBounds { start, end })
}

/// Lines that belong to the import block at the top of a compiled module.
pub fn is_import_line(line: &str) -> bool {
    IMPORT_LINE.is_match(line)
}

fn dispatch_failed(err: anyhow::Error) -> RunError {
    tracing::warn!(error = %err, "execution backend rejected payload");
    RunError::Dispatch(err)
}

fn source_unavailable(path: &Path, source: io::Error) -> RunError {
    RunError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    }
}
