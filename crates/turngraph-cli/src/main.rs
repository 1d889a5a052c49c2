//! Turngraph CLI
//!
//! Reads a nested conversation record (JSON) and writes an interactive
//! graph of it:
//! - `html` (default): self-contained explorer with drill-down into tool calls
//! - `json`: the graph/sub-graph/tool-usage data contract
//! - `dot`: Graphviz source with one cluster per tool-use view

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use tracing_subscriber::EnvFilter;

use turngraph_core::{decompose, load_conversation};

mod viz;

/// Environment variable holding a `tracing` filter directive.
const LOG_ENV: &str = "TURNGRAPH_LOG";

/// Conversations are nested one level per turn. Parsing and decomposition
/// recurse as deep as the longest chain; rendering and dropping the result
/// recurse once per level of tool-call nesting.
const WORKER_STACK_BYTES: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "turngraph")]
#[command(
    author,
    version,
    about = "Turngraph: visualize LLM conversation trees and their tool calls"
)]
struct Cli {
    #[command(flatten)]
    viz: VizArgs,
    /// Log at debug level (overrides `TURNGRAPH_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct VizArgs {
    /// Input conversation file (JSON, one root turn).
    input: PathBuf,
    /// Output file (extension does not matter; use `--format`).
    #[arg(short, long, default_value = "llm_graph.html")]
    out: PathBuf,
    /// Output format: html|json|dot
    #[arg(long, default_value = "html")]
    format: String,
    /// Page title (html only).
    #[arg(long, default_value = viz::DEFAULT_TITLE)]
    title: String,
    /// Open the written file with the platform's default handler.
    #[arg(long)]
    open: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    cmd_viz(&cli.viz)
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // A subscriber may already be installed when embedded; keep the existing one.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Sizes reported after a successful write.
#[derive(Debug, Clone, Copy)]
struct WriteSummary {
    nodes: usize,
    edges: usize,
    subgraphs: usize,
}

fn cmd_viz(args: &VizArgs) -> Result<()> {
    let format = viz::VizFormat::parse(&args.format)?;
    let options = viz::RenderOptions {
        format,
        title: args.title.clone(),
    };

    // Everything that walks the nested sub-graph maps, including dropping
    // them, stays on the worker.
    let input = args.input.clone();
    let out = args.out.clone();
    let summary = on_worker_thread(move || -> Result<WriteSummary> {
        let root = load_conversation(&input)?;
        tracing::debug!(turns = root.turn_count(), "loaded conversation");
        let g = decompose(&root);
        drop(root);

        let rendered = viz::render(&g, &options)?;
        fs::write(&out, rendered).with_context(|| format!("failed to write {}", out.display()))?;
        Ok(WriteSummary {
            nodes: g.graph.nodes.len(),
            edges: g.graph.edges.len(),
            subgraphs: g.subgraph_count(),
        })
    })?;

    println!(
        "{} {} (nodes={} edges={} subgraphs={})",
        "wrote".green().bold(),
        args.out.display(),
        summary.nodes,
        summary.edges,
        summary.subgraphs
    );

    if args.open {
        if let Err(e) = open_in_browser(&args.out) {
            tracing::warn!("could not open {}: {e:#}", args.out.display());
        }
    }
    Ok(())
}

/// Run `f` on a thread with a stack large enough for deeply nested input.
fn on_worker_thread<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    thread::Builder::new()
        .name("turngraph-worker".to_string())
        .stack_size(WORKER_STACK_BYTES)
        .spawn(f)
        .context("failed to spawn worker thread")?
        .join()
        .map_err(|_| anyhow!("worker thread panicked"))?
}

fn open_in_browser(path: &Path) -> Result<()> {
    let path = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]);
        c
    } else {
        Command::new("xdg-open")
    };
    command
        .arg(&path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("failed to launch browser")?;
    Ok(())
}
