mod common;

use std::sync::Mutex;

use async_trait::async_trait;
use fablepy::app::commands::{self, Notifier};
use fablepy::app::runner::{CellRunner, CellSettings, ExecutionBackend};
use fablepy::domain::errors::RunError;
use fablepy::domain::model::RunOutcome;
use fablepy::infra::backend::CommandBackend;
use fablepy::infra::document::{Cursor, FileDocument};
use fablepy::infra::fs::DiskFs;

#[derive(Default)]
struct Recorder {
    payloads: Mutex<Vec<String>>,
}

#[async_trait]
impl ExecutionBackend for Recorder {
    async fn execute(&self, payload: &str) -> anyhow::Result<()> {
        self.payloads.lock().unwrap().push(payload.to_owned());
        Ok(())
    }
}

#[derive(Default)]
struct Messages(Mutex<Vec<String>>);

impl Notifier for Messages {
    fn info(&self, message: &str) {
        self.0.lock().unwrap().push(format!("info {message}"));
    }

    fn error(&self, message: &str) {
        self.0.lock().unwrap().push(format!("error {message}"));
    }
}

fn runner() -> CellRunner<DiskFs, Recorder> {
    CellRunner::new(DiskFs, Recorder::default(), CellSettings::default())
}

#[tokio::test]
async fn second_run_sends_no_imports() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let document =
        FileDocument::open(&source, Cursor::Offset(common::offset_of("let area"))).await?;
    let mut runner = runner();

    let first = match runner.run_current_cell(&document).await? {
        RunOutcome::Executed(payload) => payload,
        RunOutcome::NoCell => panic!("cursor is inside cell 2"),
    };
    assert_eq!(first.index, 2);
    assert_eq!(first.new_imports.len(), 4);
    assert_eq!(first.artifact, temp.path().join("Plot.py"));

    let second = match runner.run_current_cell(&document).await? {
        RunOutcome::Executed(payload) => payload,
        RunOutcome::NoCell => panic!("cursor is inside cell 2"),
    };
    assert!(second.new_imports.is_empty());
    assert_eq!(
        second.text,
        "\n\narea = pi * radius * radius\n\nto_console(printf(\"%f\"))(area)\n"
    );

    let sent = runner.backend().payloads.lock().unwrap().clone();
    assert_eq!(sent, vec![first.text, second.text]);
    Ok(())
}

#[tokio::test]
async fn reset_resends_imports() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let document = FileDocument::open(&source, Cursor::LineColumn { line: 6, column: 3 }).await?;
    let mut runner = runner();
    let messages = Messages::default();

    commands::run_current_cell(&mut runner, &document, &messages).await;
    commands::reset_imports(&mut runner, &messages);
    assert!(runner.imports().is_empty());
    commands::run_current_cell(&mut runner, &document, &messages).await;

    let sent = runner.backend().payloads.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
    assert!(sent[0].starts_with("from __future__ import annotations\nfrom math import pi\n"));
    assert!(sent[0].ends_with("\nradius = 2.0\n\n"));

    assert_eq!(
        messages.0.into_inner().unwrap(),
        vec![
            "info FABLE-PY: Ran cell 1 with 4 new imports",
            "info FABLE-PY: Imports have been reset",
            "info FABLE-PY: Ran cell 1 with 4 new imports",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn cursor_above_first_cell_gets_guidance() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let document = FileDocument::open(&source, Cursor::LineColumn { line: 3, column: 1 }).await?;
    let mut runner = runner();
    let messages = Messages::default();

    let report = commands::run_current_cell(&mut runner, &document, &messages).await;
    assert!(!report.is_error());
    assert_eq!(report.message, "FABLE-PY: Use NEW_CELL to declare a new cell");
    assert!(runner.backend().payloads.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_python_file_asks_about_fable() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    std::fs::remove_file(temp.path().join("Plot.py"))?;
    let cursor = Cursor::Offset(common::offset_of("let radius"));
    let document = FileDocument::open(&source, cursor).await?;
    let mut runner = runner();

    let err = runner.run_current_cell(&document).await.unwrap_err();
    assert!(matches!(err, RunError::ArtifactUnavailable { .. }));
    assert!(err.to_string().ends_with("not found, is Fable running?"));
    Ok(())
}

#[tokio::test]
async fn unsaved_buffer_is_saved_before_waiting() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let edited = common::SOURCE.replace("2.0", "3.0");
    let document = FileDocument::from_buffer(
        &source,
        edited.clone(),
        Cursor::Offset(common::offset_of("let radius")),
    )?;

    // The save bumps the source mtime past the stale Python file, so the run
    // must time out rather than send the old cell.
    let mut settings = CellSettings::default();
    settings.wait.timeout = std::time::Duration::from_millis(50);
    settings.wait.interval = std::time::Duration::from_millis(10);
    let mut runner = CellRunner::new(DiskFs, Recorder::default(), settings);

    let err = runner.run_current_cell(&document).await.unwrap_err();
    assert!(matches!(err, RunError::NotUpdated { .. }));
    assert_eq!(std::fs::read_to_string(&source)?, edited);
    assert!(runner.backend().payloads.lock().unwrap().is_empty());
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn command_backend_keeps_one_interpreter_per_session() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let source = common::write_pair(temp.path(), 5);
    let pids = temp.path().join("pids");
    let transcript = temp.path().join("transcript");
    let backend = CommandBackend::new(vec![
        "sh".into(),
        "-c".into(),
        format!(
            "echo $$ >> '{}'; exec cat >> '{}'",
            pids.display(),
            transcript.display()
        ),
    ])?;
    let document = FileDocument::open(&source, Cursor::LineColumn { line: 6, column: 1 }).await?;
    let mut runner = CellRunner::new(DiskFs, backend, CellSettings::default());

    let mut sent = String::new();
    for _ in 0..2 {
        match runner.run_current_cell(&document).await? {
            RunOutcome::Executed(payload) => sent.push_str(&payload.text),
            RunOutcome::NoCell => panic!("cursor is inside cell 1"),
        }
    }
    runner.backend().close().await?;

    assert_eq!(std::fs::read_to_string(&pids)?.lines().count(), 1);
    let received = std::fs::read_to_string(&transcript)?;
    assert_eq!(received, sent);
    assert_eq!(received.matches("from math import pi").count(), 1);
    Ok(())
}
