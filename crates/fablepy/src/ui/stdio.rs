//! Newline-delimited JSON protocol for editor integrations.
//!
//! Each input line is a [`Request`]; each request gets exactly one [`Response`]
//! line on stdout, except `quit`, which ends the session.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::app::commands::Notifier;
use crate::app::runner::{ArtifactFs, ExecutionBackend};
use crate::ui::session::{Request, Response, Session};

/// Serve requests from `input` until it closes or a `quit` request arrives.
pub async fn serve<F, B, R, W>(
    session: &mut Session<F, B>,
    input: R,
    mut output: W,
    notifier: &dyn Notifier,
) -> Result<()>
where
    F: ArtifactFs,
    B: ExecutionBackend,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match session.handle(request, notifier).await {
                Some(response) => response,
                None => break,
            },
            Err(err) => {
                tracing::warn!(error = %err, "malformed request");
                Response::invalid(&err.into())
            }
        };

        let mut encoded = serde_json::to_string(&response).context("failed to encode response")?;
        encoded.push('\n');
        output
            .write_all(encoded.as_bytes())
            .await
            .context("failed to write response")?;
        output.flush().await.context("failed to flush response")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::runner::{CellRunner, CellSettings};
    use crate::infra::fs::DiskFs;
    use crate::infra::notify::LogNotifier;
    use async_trait::async_trait;

    struct Discard;

    #[async_trait]
    impl ExecutionBackend for Discard {
        async fn execute(&self, _payload: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn answers_each_request_on_its_own_line() -> Result<()> {
        let mut session = Session::new(CellRunner::new(DiskFs, Discard, CellSettings::default()));
        let input = b"{\"cmd\":\"imports\"}\n\nnot json\n{\"cmd\":\"reset\"}\n{\"cmd\":\"quit\"}\n{\"cmd\":\"reset\"}\n";
        let mut output = Vec::new();

        serve(&mut session, &input[..], &mut output, &LogNotifier).await?;

        let text = String::from_utf8(output)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#"{"severity":"info","message":"FABLE-PY: 0 cached imports","imports":[]}"#
        );
        assert!(lines[1].contains(r#""severity":"error""#));
        assert!(lines[1].contains("invalid request"));
        assert_eq!(
            lines[2],
            r#"{"severity":"info","message":"FABLE-PY: Imports have been reset"}"#
        );
        Ok(())
    }
}
