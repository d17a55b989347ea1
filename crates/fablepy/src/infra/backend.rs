//! Execution backends receiving cell payloads.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::Mutex;

use crate::app::runner::ExecutionBackend;
use crate::infra::clipboard;
use crate::infra::config::{BackendKind, Config};

/// Backend selected from configuration.
#[derive(Debug)]
pub enum Backend {
    Stdout(StdoutBackend),
    Command(CommandBackend),
    Clipboard(ClipboardBackend),
}

impl Backend {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(match config.backend.kind() {
            BackendKind::Stdout => Self::Stdout(StdoutBackend),
            BackendKind::Command => Self::Command(CommandBackend::new(config.backend.command())?),
            BackendKind::Clipboard => Self::Clipboard(ClipboardBackend),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Stdout(_) => BackendKind::Stdout,
            Self::Command(_) => BackendKind::Command,
            Self::Clipboard(_) => BackendKind::Clipboard,
        }
    }
}

#[async_trait]
impl ExecutionBackend for Backend {
    async fn connect(&self) -> Result<bool> {
        match self {
            Self::Command(backend) => backend.connect().await,
            Self::Stdout(_) | Self::Clipboard(_) => Ok(false),
        }
    }

    async fn execute(&self, payload: &str) -> Result<()> {
        match self {
            Self::Stdout(backend) => backend.execute(payload).await,
            Self::Command(backend) => backend.execute(payload).await,
            Self::Clipboard(backend) => backend.execute(payload).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Self::Command(backend) => backend.close().await,
            Self::Stdout(_) | Self::Clipboard(_) => Ok(()),
        }
    }
}

/// Writes the payload verbatim to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutBackend;

#[async_trait]
impl ExecutionBackend for StdoutBackend {
    async fn execute(&self, payload: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(payload.as_bytes())
            .await
            .context("failed to write payload to stdout")?;
        stdout.flush().await.context("failed to flush stdout")?;
        Ok(())
    }
}

/// Keeps one interactive program alive per session and writes every payload to
/// its stdin, so definitions and imports from earlier cells stay in scope.
#[derive(Debug)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    process: Mutex<Option<Interpreter>>,
}

#[derive(Debug)]
struct Interpreter {
    child: Child,
    stdin: ChildStdin,
}

impl CommandBackend {
    pub fn new(command: Vec<String>) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts
            .next()
            .filter(|program| !program.trim().is_empty())
            .context("backend.command must name a program")?;
        Ok(Self {
            program,
            args: parts.collect(),
            process: Mutex::new(None),
        })
    }

    fn spawn(&self) -> Result<Interpreter> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        let stdin = child
            .stdin
            .take()
            .with_context(|| format!("{} has no stdin", self.program))?;
        tracing::info!(program = %self.program, pid = ?child.id(), "interactive process started");
        Ok(Interpreter { child, stdin })
    }

    fn is_alive(&self, running: &mut Interpreter) -> bool {
        match running.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                tracing::warn!(program = %self.program, %status, "interactive process exited");
                false
            }
            Err(err) => {
                tracing::warn!(program = %self.program, error = %err, "cannot poll interactive process");
                false
            }
        }
    }

    /// Reuse the live process or start a new one. The flag is `true` for a new one.
    fn ensure_running<'a>(
        &self,
        slot: &'a mut Option<Interpreter>,
    ) -> Result<(&'a mut Interpreter, bool)> {
        let current = slot
            .take()
            .and_then(|mut running| self.is_alive(&mut running).then_some(running));
        let (interpreter, fresh) = match current {
            Some(running) => (running, false),
            None => (self.spawn()?, true),
        };
        Ok((slot.insert(interpreter), fresh))
    }
}

#[async_trait]
impl ExecutionBackend for CommandBackend {
    async fn connect(&self) -> Result<bool> {
        let mut slot = self.process.lock().await;
        let (_, fresh) = self.ensure_running(&mut slot)?;
        Ok(fresh)
    }

    async fn execute(&self, payload: &str) -> Result<()> {
        let mut slot = self.process.lock().await;
        let (running, _) = self.ensure_running(&mut slot)?;

        let mut written = running.stdin.write_all(payload.as_bytes()).await;
        if written.is_ok() {
            written = running.stdin.flush().await;
        }
        if let Err(err) = written {
            *slot = None;
            return Err(err).with_context(|| format!("failed to send payload to {}", self.program));
        }
        Ok(())
    }

    /// Close stdin and wait for the program, so its output is complete.
    async fn close(&self) -> Result<()> {
        let Some(Interpreter { mut child, stdin }) = self.process.lock().await.take() else {
            return Ok(());
        };
        drop(stdin);

        let status = child
            .wait()
            .await
            .with_context(|| format!("{} did not exit cleanly", self.program))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("{} exited with {status}", self.program))
        }
    }
}

/// Copies the payload to the clipboard for pasting into an interactive window.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipboardBackend;

#[async_trait]
impl ExecutionBackend for ClipboardBackend {
    async fn execute(&self, payload: &str) -> Result<()> {
        let payload = payload.to_owned();
        tokio::task::spawn_blocking(move || clipboard::copy_text(&payload))
            .await
            .context("clipboard task panicked")?
    }
}
