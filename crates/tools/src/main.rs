use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use layers::MapConfig;
use runtime::Frame;
use streaming::RoutedSource;
use tools::{RenderOptions, ToolError, render, summarize};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atlas", about = "Render layered map configurations headlessly")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render the applied layers of a configuration to SVG.
    Render {
        /// Map configuration JSON.
        config: PathBuf,
        /// Written to stdout when absent.
        #[arg(long, env = "ATLAS_OUT")]
        out: Option<PathBuf>,
        /// Root for relative data locations.
        #[arg(long, env = "ATLAS_DATA_ROOT", default_value = ".")]
        data_root: PathBuf,
        /// Simulated time played after loading and after each click.
        #[arg(long, env = "ATLAS_SIMULATE_MS", default_value_t = 1000.0)]
        simulate_ms: f64,
        #[arg(long, default_value_t = Frame::DEFAULT_DT_MS)]
        dt_ms: f64,
        /// Element id to click; repeatable.
        #[arg(long = "click")]
        clicks: Vec<String>,
        /// Layer id to hide before writing; repeatable.
        #[arg(long = "hide")]
        hidden: Vec<String>,
    },
    /// Print the layers of a configuration and their resolved kinds as JSON.
    Layers {
        config: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(ToolError::from)
        .and_then(|rt| rt.block_on(real_main(cli)));
    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn load_config(path: &Path) -> Result<MapConfig, ToolError> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(MapConfig::from_json(&text)?)
}

async fn real_main(cli: Cli) -> Result<(), ToolError> {
    match cli.command {
        Command::Render {
            config,
            out,
            data_root,
            simulate_ms,
            dt_ms,
            clicks,
            hidden,
        } => {
            let config = load_config(&config).await?;
            let source = Arc::new(RoutedSource::with_file_root(&data_root));
            let options = RenderOptions {
                simulate_ms,
                dt_ms,
                clicks,
                hidden,
            };
            let svg = render(config, source, &options).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, svg).await?;
                    info!(path = %path.display(), "Wrote scene");
                }
                None => println!("{svg}"),
            }
        }
        Command::Layers { config } => {
            let config = load_config(&config).await?;
            let json = serde_json::to_string_pretty(&summarize(&config))
                .map_err(|e| ToolError::Io(e.into()))?;
            println!("{json}");
        }
    }
    Ok(())
}
