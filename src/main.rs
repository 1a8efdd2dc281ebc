//! Quill CLI - render a template to a file or stdout

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use colored::Colorize;
use tokio::runtime::Handle;
use tracing::info;

use quill::{Context, Engine, FixSuggestion, QuillError};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Render templates with shell, prompt and YAML extensions into plain text")]
#[command(version)]
struct Cli {
    /// Template to render
    source: PathBuf,

    /// Output file, created or truncated (default: stdout)
    destination: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout may carry the rendered document
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            // --help and --version land here too and are not failures
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = innermost(&e).and_then(|q| q.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let runtime = Handle::current();

    // Filters and prompts block; keep them off the async workers
    tokio::task::spawn_blocking(move || {
        render_file(&cli.source, cli.destination.as_deref(), runtime)
    })
    .await
    .context("render task panicked")??;

    Ok(())
}

fn render_file(
    source: &Path,
    destination: Option<&Path>,
    runtime: Handle,
) -> Result<(), QuillError> {
    let engine = Engine::builder().runtime(runtime).build()?;
    let document = engine.load(source)?;
    let output = document.render(&Context::new())?;

    match destination {
        Some(path) => {
            std::fs::write(path, &output)?;
            info!(path = %path.display(), bytes = output.len(), "wrote output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Deepest quill error in the chain: the one closest to the actual failure.
fn innermost(err: &anyhow::Error) -> Option<&QuillError> {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<QuillError>())
        .last()
}
