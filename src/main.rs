//! Thumbnailer - render and cache picture thumbnails from the command line.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use thumbnailer::{
    config::{CacheArgs, Cli, Command, RenderConfig},
    ContentClassifier, ContentKind, ExtensionClassifier, IconKind, ImagePipeline, PictureRef,
    Priority, RenderCallback, RenderRequest, RenderTarget, RenderedIcon, ThumbnailService,
    TieredCache,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Render(config) => run_render(config).await,
        Command::Clear(args) => run_clear(args).await,
        Command::Check(args) => run_check(args).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "thumbnailer=debug"
    } else {
        "thumbnailer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Render Command
// =============================================================================

/// Output of one finished request, sent from a worker thread.
struct Completed {
    name: String,
    icon: Option<RenderedIcon>,
}

/// Forwards each resolved request to the render command.
struct ForwardTo {
    name: String,
    tx: mpsc::UnboundedSender<Completed>,
}

impl RenderCallback for ForwardTo {
    fn on_rendered(&self, request: &RenderRequest) {
        let completed = Completed {
            name: self.name.clone(),
            icon: request.result(),
        };
        if self.tx.send(completed).is_err() {
            warn!("Render command stopped listening before {} finished", self.name);
        }
    }
}

async fn run_render(config: RenderConfig) -> ExitCode {
    init_logging(config.cache.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let pictures = expand_paths(&config.paths);
    if pictures.is_empty() {
        error!("No files found to render");
        return ExitCode::FAILURE;
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.out).await {
        error!("Failed to create {}: {}", config.out.display(), e);
        return ExitCode::FAILURE;
    }

    let pool_config = config.pool_config();
    let props = config.cache.cache_properties();
    let cache = TieredCache::open(&props).await;
    let pipeline = Arc::new(ImagePipeline::with_settings(
        pool_config.jpeg_quality,
        pool_config.scale_quality,
    ));

    let mut service = match ThumbnailService::new(
        pool_config,
        cache,
        pipeline,
        Arc::new(ExtensionClassifier),
    ) {
        Ok(service) => service,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Rendering {} file(s) into {}", pictures.len(), config.out.display());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let size = config.thumbnail_size();
    let mut expected = 0;

    for path in &pictures {
        let callback = Arc::new(ForwardTo {
            name: output_name(path),
            tx: tx.clone(),
        });
        service.request(
            callback,
            RenderTarget::picture(path, config.rotation),
            size,
            Priority::Medium,
        );
        expected += 1;
    }

    if config.group {
        let classifier = ExtensionClassifier;
        let members: Vec<PictureRef> = pictures
            .iter()
            .filter(|path| classifier.classify(path) == ContentKind::Image)
            .map(|path| PictureRef::new(path, config.rotation))
            .collect();
        let callback = Arc::new(ForwardTo {
            name: "group".to_string(),
            tx: tx.clone(),
        });
        service.request(
            callback,
            RenderTarget::group(members),
            size,
            Priority::Low,
        );
        expected += 1;
    }
    drop(tx);

    let mut summary = Summary::default();
    while summary.total() < expected {
        let Some(completed) = rx.recv().await else {
            break;
        };
        summary.record(&completed);
        if let Err(e) = write_output(&config.out, &completed).await {
            error!("Failed to write thumbnail for {}: {}", completed.name, e);
            summary.failed += 1;
        }
    }

    println!();
    println!("Rendered:      {}", summary.thumbnails);
    println!("  from cache:  {}", summary.cache_hits);
    println!("Placeholders:  {}", summary.placeholders);
    if summary.failed > 0 {
        println!("Write errors:  {}", summary.failed);
    }
    println!();
    println!("{}", service.cache().stats_report().await);

    service.shutdown();

    if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[derive(Default)]
struct Summary {
    thumbnails: usize,
    cache_hits: usize,
    placeholders: usize,
    missing: usize,
    failed: usize,
}

impl Summary {
    fn record(&mut self, completed: &Completed) {
        match &completed.icon {
            Some(icon) if icon.kind == IconKind::Thumbnail => {
                self.thumbnails += 1;
                if icon.artifact.cache_hit() {
                    self.cache_hits += 1;
                }
            }
            Some(_) => self.placeholders += 1,
            None => self.missing += 1,
        }
    }

    fn total(&self) -> usize {
        self.thumbnails + self.placeholders + self.missing
    }
}

/// Files named on the command line, with directories expanded recursively.
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        collect_files(path, &mut files);
    }
    files
}

fn collect_files(path: &Path, files: &mut Vec<PathBuf>) {
    if !path.is_dir() {
        files.push(path.to_path_buf());
        return;
    }

    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Skipping unreadable directory {}: {}", path.display(), e);
            return;
        }
    };

    let mut children: Vec<PathBuf> = entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()).collect();
    children.sort();
    for child in children {
        collect_files(&child, files);
    }
}

fn output_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string())
}

async fn write_output(out: &Path, completed: &Completed) -> std::io::Result<()> {
    let Some(icon) = completed.icon.as_ref() else {
        warn!("No result for {}", completed.name);
        return Ok(());
    };

    // Placeholders are PNG
    let extension = if icon.kind == IconKind::Thumbnail {
        "jpg"
    } else {
        "png"
    };
    let target = out.join(format!("{}.thumb.{}", completed.name, extension));
    tokio::fs::write(&target, icon.artifact.bytes()).await?;
    info!("Wrote {}", target.display());
    Ok(())
}

// =============================================================================
// Clear Command
// =============================================================================

async fn run_clear(args: CacheArgs) -> ExitCode {
    init_logging(args.verbose);

    let cache = TieredCache::open(&args.cache_properties()).await;
    let mut ok = true;

    for (name, result) in [
        ("highres", cache.clear_highres().await),
        ("thumbnail", cache.clear_thumbnails().await),
    ] {
        match result {
            Ok(()) => println!("✓ Cleared {} cache", name),
            Err(e) => {
                println!("✗ Failed to clear {} cache: {}", name, e);
                ok = false;
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(args: CacheArgs) -> ExitCode {
    if args.verbose {
        init_logging(true);
    }

    println!("Thumbnailer Configuration Check");
    println!("═══════════════════════════════");
    println!();
    println!("Cache directory: {}", args.resolve_cache_dir().display());
    match args.cache_properties {
        Some(ref path) => println!("Properties file: {}", path.display()),
        None => println!("Properties file: (built-in defaults)"),
    }
    println!();

    let props = args.cache_properties();
    match serde_json::to_string_pretty(&props) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            println!("✗ Could not display configuration: {}", e);
            return ExitCode::FAILURE;
        }
    }
    println!();

    if let Err(e) = props.validate() {
        println!("✗ {}", e);
        return ExitCode::FAILURE;
    }

    let cache = TieredCache::open(&props).await;
    println!("{}", cache.stats_report().await);

    println!();
    println!("═══════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
