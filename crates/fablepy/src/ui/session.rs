//! Long-lived session shared by the interactive prompt and the stdio protocol.

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::app::commands::{self, MESSAGE_PREFIX, Notifier, Report, Severity};
use crate::app::runner::{ArtifactFs, CellRunner, ExecutionBackend};
use crate::infra::document::{Cursor, FileDocument};

/// One request addressed to a running session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum Request {
    Run {
        file: PathBuf,
        #[serde(default)]
        offset: Option<usize>,
        #[serde(default)]
        line: Option<usize>,
        #[serde(default)]
        column: Option<usize>,
        /// Unsaved editor buffer, written to `file` before compiling.
        #[serde(default)]
        text: Option<String>,
    },
    Reset,
    Imports,
    Quit,
}

impl Request {
    /// Parse a line typed at the interactive prompt.
    ///
    /// `run <file> <line> [column]`, `offset <file> <n>`, `reset`, `imports`, `quit`.
    pub fn parse_line(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let command = words.next().ok_or_else(|| anyhow!("empty command"))?;
        let request = match command {
            "run" => {
                let file = words
                    .next()
                    .ok_or_else(|| anyhow!("usage: run <file> <line> [column]"))?;
                let line = parse_number(words.next(), "line")?;
                let column = words
                    .next()
                    .map(|col| parse_number(Some(col), "column"))
                    .transpose()?;
                Request::Run {
                    file: PathBuf::from(file),
                    offset: None,
                    line: Some(line),
                    column,
                    text: None,
                }
            }
            "offset" => {
                let file = words.next().ok_or_else(|| anyhow!("usage: offset <file> <n>"))?;
                let offset = parse_number(words.next(), "offset")?;
                Request::Run {
                    file: PathBuf::from(file),
                    offset: Some(offset),
                    line: None,
                    column: None,
                    text: None,
                }
            }
            "reset" => Request::Reset,
            "imports" => Request::Imports,
            "quit" | "exit" => Request::Quit,
            other => bail!("unknown command: {other}"),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected argument: {extra}");
        }
        Ok(request)
    }
}

fn parse_number(word: Option<&str>, what: &str) -> Result<usize> {
    let word = word.ok_or_else(|| anyhow!("missing {what}"))?;
    word.parse()
        .map_err(|_| anyhow!("{what} must be a positive number, got {word}"))
}

/// Reply to a [`Request`], one JSON object per line on the stdio protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imports: Option<Vec<String>>,
}

impl Response {
    pub fn invalid(err: &anyhow::Error) -> Self {
        Self {
            severity: Severity::Error,
            message: format!("{MESSAGE_PREFIX}invalid request: {err}"),
            imports: None,
        }
    }
}

impl From<Report> for Response {
    fn from(report: Report) -> Self {
        Self {
            severity: report.severity,
            message: report.message,
            imports: None,
        }
    }
}

/// Host-side session: owns the runner, and with it the import cache, until exit.
pub struct Session<F, B> {
    runner: CellRunner<F, B>,
}

impl<F, B> Session<F, B>
where
    F: ArtifactFs,
    B: ExecutionBackend,
{
    pub fn new(runner: CellRunner<F, B>) -> Self {
        Self { runner }
    }

    /// End the session, shutting down the execution backend.
    pub async fn close(&self) -> Result<()> {
        self.runner.backend().close().await
    }

    /// Handle one request. Returns `None` when the session should end.
    pub async fn handle(&mut self, request: Request, notifier: &dyn Notifier) -> Option<Response> {
        match request {
            Request::Run {
                file,
                offset,
                line,
                column,
                text,
            } => Some(self.run(file, offset, line, column, text, notifier).await),
            Request::Reset => Some(commands::reset_imports(&mut self.runner, notifier).into()),
            Request::Imports => {
                let imports = self.runner.imports().to_vec();
                Some(Response {
                    severity: Severity::Info,
                    message: format!("{MESSAGE_PREFIX}{} cached imports", imports.len()),
                    imports: Some(imports),
                })
            }
            Request::Quit => None,
        }
    }

    async fn run(
        &mut self,
        file: PathBuf,
        offset: Option<usize>,
        line: Option<usize>,
        column: Option<usize>,
        text: Option<String>,
        notifier: &dyn Notifier,
    ) -> Response {
        let cursor = match (offset, line) {
            (Some(offset), _) => Cursor::Offset(offset),
            (None, Some(line)) => Cursor::LineColumn {
                line,
                column: column.unwrap_or(1),
            },
            (None, None) => {
                let err = anyhow!("run needs either offset or line");
                return Response::invalid(&err);
            }
        };

        let document = match text {
            Some(text) => FileDocument::from_buffer(file, text, cursor),
            None => FileDocument::open(file, cursor).await,
        };
        match document {
            Ok(document) => commands::run_current_cell(&mut self.runner, &document, notifier)
                .await
                .into(),
            Err(err) => {
                let report = Report::from_error(&err);
                report.deliver(notifier);
                report.into()
            }
        }
    }
}
