use std::path::PathBuf;
use std::sync::Arc;

use canopy::authz::context::RequestCtx;
use canopy::authz::graph::{MemoryGraph, ResourceGraph};
use canopy::authz::Authz;
use canopy::settings::{Backend, Settings};
use canopy::storage::{self, SqlGraph};
use canopy::{topology, web};
use clap::Parser;
use migration::{Migrator, MigratorTrait};
use miette::{IntoDiagnostic, Result};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "canopy",
    version,
    about = "Authorization decisions over a hierarchy of namespaces and objects"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// KDL topology applied before serving (overrides graph.topology_path)
    #[arg(short, long)]
    topology: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let mut settings = Settings::load(&cli.config)?;
    if let Some(path) = cli.topology {
        settings.graph.topology_path = Some(path);
    }
    tracing::info!(?settings, "Loaded configuration");

    let graph = open_graph(&settings).await?;

    if let Some(path) = &settings.graph.topology_path {
        let parsed = topology::load_topology(path)?;
        topology::apply_topology(&RequestCtx::new(), graph.as_ref(), &parsed).await?;
        tracing::info!(path = %path.display(), "Seeded topology");
    }

    web::serve(settings, Authz::new(graph)).await?;
    Ok(())
}

async fn open_graph(settings: &Settings) -> Result<Arc<dyn ResourceGraph>> {
    match settings.graph.backend {
        Backend::Database => {
            let db = storage::init(&settings.database).await?;
            Migrator::up(&db, None).await.into_diagnostic()?;
            tracing::info!(url = %settings.database.url, "Database ready");
            Ok(Arc::new(SqlGraph::new(db)))
        }
        Backend::Memory => {
            tracing::warn!("Using in-memory resource graph; state is lost on restart");
            Ok(Arc::new(MemoryGraph::new()))
        }
    }
}
