pub mod types;
pub mod config;
pub mod data;
pub mod processing;
pub mod color;
pub mod projection;
pub mod render;
pub mod pipeline;
pub mod server;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the map once for one dataset and write it to a file
    Render {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        /// Slider position: 0 for the first dataset, 1 for the second
        #[arg(short, long, default_value = "0")]
        dataset: String,
        #[arg(short, long, value_name = "FILE", default_value = "map.svg")]
        output: PathBuf,
        /// Write the full HTML page with the slider instead of bare SVG
        #[arg(long)]
        page: bool,
    },
    /// Serve the interactive map
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { config, dataset, output, page } => {
            let selection = types::DatasetSelection::from_slider(&dataset)
                .ok_or_else(|| anyhow!("Dataset must be 0 or 1, got '{}'", dataset))?;
            let app_config = config::AppConfig::load_or_default(&config)?;
            let ctx = pipeline::RenderContext::new(app_config)?;

            let features = pipeline::fetch_and_join(&ctx, selection).await?;
            let svg = ctx.renderer.render_svg(&features);
            let document = if page {
                ctx.renderer.render_page(selection, &svg)
            } else {
                svg
            };

            tokio::fs::write(&output, document)
                .await
                .with_context(|| format!("Failed to write {:?}", output))?;
            tracing::info!(?output, features = features.len(), "map written");
        }
        Commands::Serve { config } => {
            let app_config = config::AppConfig::load_or_default(&config)?;
            let ctx = pipeline::RenderContext::new(app_config)?;
            server::start_server(ctx).await?;
        }
    }

    Ok(())
}
