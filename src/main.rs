use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use visual_matcher::{
    build_catalog, core::catalog::save_products, create_router, init, AppState, Architecture,
    Catalog, Config, ResNetEmbedder,
};

#[derive(Debug, Parser)]
#[command(name = "visual-matcher", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Pretrained weights (.ot) for the feature extractor
    #[arg(long, global = true)]
    weights: Option<PathBuf>,

    /// Feature extractor backbone
    #[arg(long, global = true, value_enum)]
    arch: Option<Architecture>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the search page and API
    Serve {
        /// Catalog file with precomputed embeddings
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Directory holding the catalog images
        #[arg(long)]
        image_dir: Option<PathBuf>,
        /// Address to listen on
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Embed every image under a directory and write a catalog file
    ///
    /// The first directory level becomes the category and the file name
    /// becomes the product name. Image paths are stored relative to the
    /// directory so it can be served as-is.
    Index {
        /// Root directory of product images
        image_dir: PathBuf,
        /// Where to write the catalog
        #[arg(long, short)]
        output: PathBuf,
    },
}

fn load_embedder(config: &Config) -> anyhow::Result<Arc<ResNetEmbedder>> {
    let embedder = ResNetEmbedder::load(config.arch, &config.weights_path)
        .with_context(|| format!("loading {} weights from {}", config.arch, config.weights_path.display()))?;
    Ok(Arc::new(embedder))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let embedder = load_embedder(&config)?;
    let catalog = Catalog::load(&config.catalog_path)
        .with_context(|| format!("loading catalog {}", config.catalog_path.display()))?;
    if !config.image_dir.is_dir() {
        log::warn!(
            "Image directory {} does not exist; product images will 404",
            config.image_dir.display()
        );
    }

    let addr = config.bind_addr;
    let state = AppState::new(config, catalog, embedder)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    log::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("Shutting down");
        })
        .await?;

    Ok(())
}

fn index(config: Config, image_dir: PathBuf, output: PathBuf) -> anyhow::Result<()> {
    let embedder = load_embedder(&config)?;
    let (products, report) = build_catalog(embedder.as_ref(), &image_dir)?;
    let path = save_products(&output, &products)?;

    log::info!(
        "Wrote {} products to {} ({} skipped)",
        report.indexed,
        path.display(),
        report.skipped.len()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init()?;
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(weights) = cli.weights {
        config.weights_path = weights;
    }
    if let Some(arch) = cli.arch {
        config.arch = arch;
    }

    match cli.command {
        Commands::Serve {
            catalog,
            image_dir,
            bind,
        } => {
            if let Some(catalog) = catalog {
                config.catalog_path = catalog;
            }
            if let Some(image_dir) = image_dir {
                config.image_dir = image_dir;
            }
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            serve(config).await
        }
        Commands::Index { image_dir, output } => {
            tokio::task::spawn_blocking(move || index(config, image_dir, output)).await?
        }
    }
}
