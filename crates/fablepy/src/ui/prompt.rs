//! Interactive session prompt.

use anyhow::{Context, Result};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

use crate::app::commands::Notifier;
use crate::app::runner::{ArtifactFs, ExecutionBackend};
use crate::ui::session::{Request, Response, Session};

const HELP: &str = "\
commands:
  run <file> <line> [column]   run the cell under a 1-based line/column
  offset <file> <n>            run the cell under a byte offset
  reset                        forget imports sent in this session
  imports                      list imports sent in this session
  quit                         end the session";

/// Read commands until `quit`, Ctrl-C, or Ctrl-D.
pub async fn run<F, B>(session: &mut Session<F, B>, notifier: &dyn Notifier) -> Result<()>
where
    F: ArtifactFs,
    B: ExecutionBackend,
{
    let mut line_editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("fablepy".into()),
        DefaultPromptSegment::Empty,
    );

    eprintln!("fablepy session, type `help` for commands");
    loop {
        let line = match line_editor.read_line(&prompt).context("failed to read command")? {
            Signal::Success(line) => line,
            _ => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "help" {
            eprintln!("{HELP}");
            continue;
        }

        let request = match Request::parse_line(line) {
            Ok(request) => request,
            Err(err) => {
                notifier.error(&Response::invalid(&err).message);
                continue;
            }
        };

        match session.handle(request, notifier).await {
            None => break,
            // Run and reset already reported through the notifier.
            Some(response) => {
                if let Some(imports) = response.imports {
                    notifier.info(&response.message);
                    for import in imports {
                        eprintln!("  {import}");
                    }
                }
            }
        }
    }
    Ok(())
}
