//! Source documents opened from disk for the command line host.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;

use crate::app::runner::SourceDocument;
use crate::app::scan::{floor_char_boundary, offset_at};

/// Cursor position as supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Byte offset into the document.
    Offset(usize),
    /// 1-based line and character column.
    LineColumn { line: usize, column: usize },
}

impl Cursor {
    /// Resolve to a byte offset on a character boundary of `text`.
    pub fn resolve(self, text: &str) -> Result<usize> {
        match self {
            Cursor::Offset(offset) => Ok(floor_char_boundary(text, offset)),
            Cursor::LineColumn { line, column } => offset_at(text, line, column)
                .ok_or_else(|| anyhow!("line {line} is past the end of the document")),
        }
    }
}

/// A source file plus cursor, optionally carrying an unsaved editor buffer.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    text: String,
    cursor: usize,
    unsaved: bool,
}

impl FileDocument {
    /// Open the file as it currently exists on disk.
    pub async fn open(path: impl Into<PathBuf>, cursor: Cursor) -> Result<Self> {
        let path = path.into();
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cursor = cursor.resolve(&text)?;
        Ok(Self {
            path,
            text,
            cursor,
            unsaved: false,
        })
    }

    /// Wrap an editor buffer that [`SourceDocument::save`] writes back to `path`.
    pub fn from_buffer(path: impl Into<PathBuf>, text: String, cursor: Cursor) -> Result<Self> {
        let cursor = cursor.resolve(&text)?;
        Ok(Self {
            path: path.into(),
            text,
            cursor,
            unsaved: true,
        })
    }
}

#[async_trait]
impl SourceDocument for FileDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    async fn save(&self) -> io::Result<()> {
        if !self.unsaved {
            return Ok(());
        }
        tracing::debug!(path = %self.path.display(), "writing editor buffer");
        tokio::fs::write(&self.path, &self.text).await
    }
}
