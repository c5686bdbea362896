//! OWS style service operator CLI.
//!
//! Loads and validates a service configuration the same way the server does
//! at startup, and prints what it found.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ows_api::{FunctionRegistries, LayerCatalog, StaticRangeCache};
use ows_common::{LayerNode, OwsConfig, ServiceKind};

#[derive(Parser, Debug)]
#[command(name = "ows-api")]
#[command(about = "OWS layer catalog and style tools")]
struct Args {
    /// Service configuration file (YAML)
    #[arg(short, long, env = "OWS_CONFIG_PATH")]
    config: PathBuf,

    /// Product date ranges for index styles with product ranges (YAML)
    #[arg(short, long, env = "OWS_RANGES_PATH")]
    ranges: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and print a summary
    Check,
    /// Print the folder and layer tree as JSON
    Layers,
}

fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args.log_level, args.log_json)?;

    let config = OwsConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let ranges = match &args.ranges {
        Some(path) => StaticRangeCache::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => StaticRangeCache::empty(),
    };
    let catalog = LayerCatalog::from_config(&config, &FunctionRegistries::default(), &ranges)
        .context("building layer catalog")?;

    match args.command {
        Command::Check => print_summary(&catalog),
        Command::Layers => {
            let tree: Vec<Value> = catalog.folders().iter().map(node_json).collect();
            println!("{}", serde_json::to_string_pretty(&tree)?);
        }
    }
    Ok(())
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr);
    if json {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_summary(catalog: &LayerCatalog) {
    let settings = catalog.settings();
    info!(layers = catalog.len(), "Configuration is valid");

    println!("Service: {}", settings.global.title);
    for service in [ServiceKind::Wms, ServiceKind::Wmts, ServiceKind::Wcs] {
        let state = if settings.is_enabled(service) { "enabled" } else { "disabled" };
        match settings.max_image_size(service) {
            Some((w, h)) => println!("  {:<5} {} (max {}x{})", service.as_str(), state, w, h),
            None => println!("  {:<5} {}", service.as_str(), state),
        }
    }
    println!("Layers: {}", catalog.len());
    for layer in catalog.layers() {
        println!(
            "  {} [{}] {} styles, default '{}'",
            layer.name,
            layer.product,
            layer.styles.len(),
            layer.styles.default_name()
        );
    }
}

fn node_json(node: &LayerNode) -> Value {
    match node {
        LayerNode::Folder(folder) => json!({
            "title": folder.title,
            "abstract": folder.abstract_text,
            "layers": folder.children.iter().map(node_json).collect::<Vec<_>>(),
        }),
        LayerNode::Layer(layer) => json!({
            "name": layer.name,
            "title": layer.title,
            "product": layer.product,
            "bands": layer.bands.canonical_set(),
            "default_style": layer.styles.default_name(),
            "styles": layer.styles.styles().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        }),
    }
}
