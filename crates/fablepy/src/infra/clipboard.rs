//! Clipboard integration utilities.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result, anyhow};

/// Place `text` on the system clipboard.
///
/// Tries the native clipboard first and falls back to the platform's command line
/// tools when no display connection is available.
pub fn copy_text(text: &str) -> Result<()> {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_owned())) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(error = %err, "native clipboard unavailable, trying shell tools");
            copy_with_tools(text)
        }
    }
}

fn copy_with_tools(text: &str) -> Result<()> {
    let mut failures = Vec::new();
    for tool in clipboard_tools() {
        match pipe_into(tool, text) {
            Ok(()) => return Ok(()),
            Err(err) => failures.push(format!("{}: {err}", tool[0])),
        }
    }

    if failures.is_empty() {
        Err(anyhow!("no clipboard available on this platform"))
    } else {
        Err(anyhow!("no clipboard available ({})", failures.join("; ")))
    }
}

fn pipe_into(tool: &[&str], text: &str) -> Result<()> {
    let (program, args) = tool.split_first().context("clipboard tool missing program")?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(text.as_bytes())
            .context("failed to write clipboard contents")?;
    }

    let status = child
        .wait()
        .with_context(|| format!("{program} did not exit cleanly"))?;
    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("exited with {status}"))
    }
}

#[cfg(target_os = "macos")]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[&["pbcopy"]]
}

#[cfg(all(unix, not(target_os = "macos")))]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[
        &["wl-copy"],
        &["xclip", "-selection", "clipboard"],
        &["xsel", "--clipboard", "--input"],
    ]
}

#[cfg(target_os = "windows")]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[&["powershell.exe", "-NoProfile", "-Command", "Set-Clipboard"]]
}

#[cfg(not(any(unix, target_os = "windows")))]
fn clipboard_tools() -> &'static [&'static [&'static str]] {
    &[]
}
