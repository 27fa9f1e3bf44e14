use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use doppel_core::{FlatDirResolver, GalleryStore, MatchPipeline, PipelineOptions};
use doppel_faceapi::{FaceApiClient, FaceApiConfig};

mod config;
use config::Config;

#[derive(Parser)]
#[command(name = "doppel", about = "Celebrity look-alike matching CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a photo against the gallery and print the JSON report
    Match {
        /// Path to the query image
        image: PathBuf,
        /// Number of ranked matches to return (overrides DOPPEL_TOP_K)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Print compact JSON instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },
    /// Show gallery snapshot summary
    Gallery,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Match { image, top_k, compact } => {
            let store = Arc::new(GalleryStore::new(&config.gallery_path));
            let analyzer = Arc::new(FaceApiClient::new(FaceApiConfig {
                base_url: config.faceapi_url.clone(),
                model_name: config.model_name.clone(),
                enforce_detection: config.enforce_detection,
                request_timeout: config.request_timeout,
            })?);
            let resolver = FlatDirResolver::new(&config.reference_dir, config.reference_ext.as_str());
            let pipeline = MatchPipeline::new(
                store,
                analyzer,
                Box::new(resolver),
                PipelineOptions {
                    top_k: top_k.unwrap_or(config.top_k),
                    enrichment_timeout: config.enrichment_timeout,
                },
            );

            let report = pipeline.assemble(&image).await?;
            let json = report.to_json();
            if compact {
                println!("{json}");
            } else {
                println!("{}", serde_json::to_string_pretty(&json)?);
            }
        }
        Commands::Gallery => {
            let store = GalleryStore::new(&config.gallery_path);
            let gallery = store.get()?;
            println!("snapshot:   {}", config.gallery_path.display());
            println!("entries:    {}", gallery.len());
            println!(
                "dimension:  {}",
                gallery
                    .dimension()
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into())
            );
            println!("model:      {}", gallery.model().unwrap_or("-"));
            if let Some(at) = gallery.generated_at() {
                println!("generated:  {at}");
            }
        }
    }

    Ok(())
}
