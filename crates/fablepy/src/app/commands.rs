//! User-facing commands: every outcome becomes one line of feedback.

use serde::Serialize;

use crate::app::runner::{ArtifactFs, CellRunner, ExecutionBackend, SourceDocument};
use crate::domain::model::RunOutcome;

/// Prefix identifying this tool in every message shown to the user.
pub const MESSAGE_PREFIX: &str = "FABLE-PY: ";

/// Receives the one-line feedback produced by a command.
pub trait Notifier {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// Feedback for a single command invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
}

impl Report {
    fn info(message: impl AsRef<str>) -> Self {
        Self {
            severity: Severity::Info,
            message: format!("{MESSAGE_PREFIX}{}", message.as_ref()),
        }
    }

    fn error(message: impl AsRef<str>) -> Self {
        Self {
            severity: Severity::Error,
            message: format!("{MESSAGE_PREFIX}{}", message.as_ref()),
        }
    }

    /// Report for a failure that happened before the runner was reached.
    pub fn from_error(err: &anyhow::Error) -> Self {
        Self::error(format!("{err:#}"))
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn deliver(&self, notifier: &dyn Notifier) {
        match self.severity {
            Severity::Info => notifier.info(&self.message),
            Severity::Error => notifier.error(&self.message),
        }
    }
}

/// "Run current cell": never fails, every error is turned into a report.
pub async fn run_current_cell<F, B>(
    runner: &mut CellRunner<F, B>,
    document: &dyn SourceDocument,
    notifier: &dyn Notifier,
) -> Report
where
    F: ArtifactFs,
    B: ExecutionBackend,
{
    let report = match runner.run_current_cell(document).await {
        Ok(RunOutcome::NoCell) => Report::info(format!(
            "Use {} to declare a new cell",
            runner.settings().source_marker
        )),
        Ok(RunOutcome::Executed(payload)) => {
            let imports = match payload.new_imports.len() {
                0 => String::new(),
                1 => " with 1 new import".to_owned(),
                n => format!(" with {n} new imports"),
            };
            Report::info(format!("Ran cell {}{imports}", payload.index))
        }
        Err(err) => {
            tracing::error!(error = %err, "run current cell failed");
            Report::error(err.to_string())
        }
    };
    report.deliver(notifier);
    report
}

/// "Reset imports": clears the session cache, cannot fail.
pub fn reset_imports<F, B>(runner: &mut CellRunner<F, B>, notifier: &dyn Notifier) -> Report
where
    F: ArtifactFs,
    B: ExecutionBackend,
{
    runner.reset_imports();
    let report = Report::info("Imports have been reset");
    report.deliver(notifier);
    report
}
