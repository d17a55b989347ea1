//! Domain models for cells, boundaries, and run outcomes.

use std::path::PathBuf;

/// Byte offsets of one cell inside the derived Python text.
///
/// `start` points at the cell's own marker, `end` at the next marker or the
/// end of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub start: usize,
    pub end: usize,
}

impl CellBounds {
    /// Cell text following the marker, up to `end`.
    pub fn body<'a>(&self, text: &'a str, marker: &str) -> &'a str {
        let from = (self.start + marker.len()).min(self.end);
        text.get(from..self.end).unwrap_or_default()
    }
}

/// Text assembled for one cell, ready to be sent to the execution backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellPayload {
    /// Which source cell (1-based) this payload belongs to.
    pub index: usize,
    /// Derived artifact the cell was cut from.
    pub artifact: PathBuf,
    /// Imports not yet sent in this session.
    pub new_imports: Vec<String>,
    pub bounds: CellBounds,
    /// Exact text handed to the backend.
    pub text: String,
}

/// Result of a successful "run current cell" request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No cell marker precedes the cursor; the user needs guidance, not an error.
    NoCell,
    Executed(CellPayload),
}
