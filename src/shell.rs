//! Subprocess bridge
//!
//! Pipes text through a shell script running in strict mode. The stdin writer and the
//! stderr drain run as their own tasks while the caller waits for exit and collects
//! stdout; writing inline would deadlock once input or output outgrows the pipe buffer.

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::{ShellError, ShellFailure};

/// Abort on any failed command, unset variable, or failed pipeline stage.
pub const STRICT_MODE: &str = "set -euo pipefail";

/// Shell used to run scripts.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Program invoked as `<program> -c <script>`.
    pub program: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "bash".to_string(),
        }
    }
}

/// Runs scripts with piped stdio.
#[derive(Debug, Clone, Default)]
pub struct Shell {
    config: ShellConfig,
}

impl Shell {
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    pub fn program(&self) -> &str {
        &self.config.program
    }

    /// Run `script_builder(input)` with `input` on stdin and return its stdout.
    ///
    /// On a non-zero exit (or a spawn / pipe failure) the error carries the trimmed
    /// stderr text ahead of the failure description.
    #[instrument(skip_all, fields(program = %self.config.program, input_len = input.len()))]
    pub async fn execute<F>(&self, script_builder: F, input: &str) -> Result<String, ShellError>
    where
        F: FnOnce(&str) -> String,
    {
        let script = format!("{STRICT_MODE}; {}", script_builder(input));
        debug!(script = %script, "spawning shell");

        let mut child = Command::new(&self.config.program)
            .arg("-c")
            .arg(&script)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ShellError::new("", ShellFailure::Spawn(e)))?;

        let stdin = child.stdin.take();
        let data = input.as_bytes().to_vec();
        let writer = tokio::spawn(async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&data).await {
                // The script stopped reading; its exit status decides the outcome
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
            // stdin dropped here: the script sees end-of-input
        });

        let stderr = child.stderr.take();
        let drain = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                stderr.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        });

        let output = child.wait_with_output().await;
        let written = writer.await;
        let drained = drain.await;

        let stderr = match drained {
            Ok(Ok(buf)) => String::from_utf8_lossy(&buf).trim().to_string(),
            Ok(Err(e)) => return Err(ShellError::new("", ShellFailure::Output(e))),
            Err(e) => return Err(ShellError::new("", ShellFailure::Join(e))),
        };

        let output = output.map_err(|e| ShellError::new(stderr.clone(), ShellFailure::Output(e)))?;
        debug!(status = %output.status, stdout_len = output.stdout.len(), "shell exited");

        if !output.status.success() {
            return Err(ShellError::new(stderr, ShellFailure::Exit(output.status)));
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ShellError::new(stderr, ShellFailure::Stdin(e))),
            Err(e) => return Err(ShellError::new(stderr, ShellFailure::Join(e))),
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
