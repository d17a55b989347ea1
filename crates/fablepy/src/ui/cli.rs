//! Command line surface.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

use crate::app::commands::{self, MESSAGE_PREFIX, Notifier, Report};
use crate::app::runner::{CellRunner, CellSettings, ExecutionBackend};
use crate::infra::backend::Backend;
use crate::infra::config::{BackendKind, Config};
use crate::infra::document::{Cursor, FileDocument};
use crate::infra::fs::DiskFs;
use crate::infra::notify::{ConsoleNotifier, LogNotifier};
use crate::ui::session::Session;
use crate::ui::{prompt, stdio};

#[derive(Debug, Parser)]
#[command(
    name = "fablepy",
    author,
    version,
    about = "Run F# cells through their Fable-compiled Python",
    long_about = None
)]
pub struct Cli {
    /// Extra config file layered over user and workspace config.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the cell under the cursor once, with a fresh import cache.
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// Override the configured backend.
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
    },
    /// Print the payload for the cell under the cursor without running it.
    Cell {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Keep a session open so imports are sent only once.
    Session {
        /// Speak newline-delimited JSON on stdin/stdout instead of showing a prompt.
        #[arg(long)]
        stdio: bool,
        /// Override the configured backend.
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,
    },
    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Source file and cursor position.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// F# source file (.fs or .fsx).
    pub file: PathBuf,
    /// Cursor as a byte offset.
    #[arg(long, conflicts_with = "line", required_unless_present = "line")]
    pub offset: Option<usize>,
    /// Cursor line (1-based).
    #[arg(long)]
    pub line: Option<usize>,
    /// Cursor column (1-based, characters).
    #[arg(long, requires = "line")]
    pub column: Option<usize>,
    /// Read the unsaved editor buffer from stdin and save it before running.
    #[arg(long)]
    pub stdin_buffer: bool,
}

impl TargetArgs {
    fn cursor(&self) -> Cursor {
        match (self.offset, self.line) {
            (Some(offset), _) => Cursor::Offset(offset),
            (None, line) => Cursor::LineColumn {
                line: line.unwrap_or(1),
                column: self.column.unwrap_or(1),
            },
        }
    }

    async fn document(&self) -> Result<FileDocument> {
        if self.stdin_buffer {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read editor buffer from stdin")?;
            FileDocument::from_buffer(&self.file, text, self.cursor())
        } else {
            FileDocument::open(&self.file, self.cursor()).await
        }
    }
}

/// Execute the parsed command line.
pub async fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Run { target, backend } => {
            if let Some(kind) = backend {
                config.backend.set_kind(kind);
            }
            let mut runner = build_runner(&config)?;
            let notifier = ConsoleNotifier;
            let report = match target.document().await {
                Ok(document) => {
                    commands::run_current_cell(&mut runner, &document, &notifier).await
                }
                Err(err) => {
                    let report = Report::from_error(&err);
                    report.deliver(&notifier);
                    report
                }
            };
            if let Err(err) = runner.backend().close().await {
                Report::from_error(&err).deliver(&notifier);
                return Ok(ExitCode::FAILURE);
            }
            Ok(exit_code(&report))
        }
        Commands::Cell { target } => preview(&config, &target).await,
        Commands::Session {
            stdio: use_stdio,
            backend,
        } => {
            if let Some(kind) = backend {
                config.backend.set_kind(kind);
            }
            if use_stdio && config.backend.kind() == BackendKind::Stdout {
                bail!("--stdio needs the command or clipboard backend, stdout carries the protocol");
            }
            let mut session = Session::new(build_runner(&config)?);
            if use_stdio {
                let input = BufReader::new(tokio::io::stdin());
                stdio::serve(&mut session, input, tokio::io::stdout(), &LogNotifier).await?;
            } else {
                prompt::run(&mut session, &ConsoleNotifier).await?;
            }
            session.close().await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "fablepy", &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_runner(config: &Config) -> Result<CellRunner<DiskFs, Backend>> {
    let backend = Backend::from_config(config)?;
    tracing::info!(backend = ?backend.kind(), "session started");
    Ok(CellRunner::new(DiskFs, backend, CellSettings::from_config(config)))
}

async fn preview(config: &Config, target: &TargetArgs) -> Result<ExitCode> {
    let notifier = ConsoleNotifier;
    let runner = build_runner(config)?;
    let document = match target.document().await {
        Ok(document) => document,
        Err(err) => {
            Report::from_error(&err).deliver(&notifier);
            return Ok(ExitCode::FAILURE);
        }
    };

    match runner.preview_cell(&document).await {
        Ok(Some(payload)) => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(payload.text.as_bytes()).await?;
            stdout.flush().await?;
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => {
            notifier.info(&format!(
                "{MESSAGE_PREFIX}Use {} to declare a new cell",
                config.markers.source
            ));
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            notifier.error(&format!("{MESSAGE_PREFIX}{err}"));
            Ok(ExitCode::FAILURE)
        }
    }
}

fn exit_code(report: &Report) -> ExitCode {
    if report.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
