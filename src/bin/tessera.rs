use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tessera", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene JSON to a PNG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Cancellation policy: cancel_before_exec_newer, cancel_after_newer_done or no_cancel.
    #[arg(long)]
    policy: Option<tessera::CancelPolicy>,

    /// Tile worker threads.
    #[arg(long)]
    threads: Option<usize>,

    /// Submit the scene this many times; passes after the first reuse cached tiles.
    #[arg(long, default_value_t = 1)]
    repeat: u32,

    /// Renderer options JSON. `--policy` and `--threads` override its values.
    #[arg(long)]
    opts: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
    }
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.repeat >= 1, "--repeat must be >= 1");

    let mut opts = match &args.opts {
        Some(path) => tessera::RendererOpts::from_path(path)?,
        None => tessera::RendererOpts::default(),
    };
    if let Some(policy) = args.policy {
        opts.cancel_policy = policy;
    }
    if args.threads.is_some() {
        opts.worker_threads = args.threads;
    }

    let scene = tessera::SceneDef::from_path(&args.in_path)?
        .build()
        .with_context(|| format!("build scene '{}'", args.in_path.display()))?;
    let renderer = tessera::Renderer::new(opts)?;

    let latest: Arc<Mutex<Option<tessera::RenderComplete>>> = Arc::new(Mutex::new(None));
    let sink = latest.clone();
    renderer.add_listener(move |e: &tessera::RenderComplete| -> anyhow::Result<()> {
        let mut slot = sink.lock();
        if slot.as_ref().is_none_or(|prev| prev.seq < e.seq) {
            *slot = Some(e.clone());
        }
        Ok(())
    });

    let started = std::time::Instant::now();
    for i in 0..args.repeat {
        renderer.render(scene.root(), scene.blocks());
        if i == 0 {
            scene.mark_clean();
        }
    }
    renderer.wait_idle();
    let elapsed = started.elapsed();

    let done = latest
        .lock()
        .take()
        .context("no pass delivered a result")?;
    let raster = done
        .raster
        .context("scene covers no pixels, nothing to write")?;
    tessera::write_png(&raster, &args.out)?;

    let stats = renderer.stats();
    eprintln!(
        "wrote {} ({}x{}, pass {}) in {:.1?}",
        args.out.display(),
        raster.width(),
        raster.height(),
        done.seq,
        elapsed
    );
    eprintln!(
        "passes: {} submitted, {} completed, {} cancelled, {} failed; tiles: {} drawn, {} reused",
        stats.passes_submitted,
        stats.passes_completed,
        stats.passes_cancelled,
        stats.passes_failed,
        stats.tiles_submitted,
        stats.tiles_reused
    );
    Ok(())
}
