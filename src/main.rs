use std::path::PathBuf;
use std::sync::Arc;

use ai_pulse::aggregator::Aggregator;
use ai_pulse::config::Config;
use ai_pulse::routes::{self, AppState};
use ai_pulse::store::SnapshotStore;
use clap::{Parser, Subcommand};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "ai-pulse", version, about = "Hebrew AI news aggregator")]
struct Cli {
    /// Source configuration file
    #[arg(short, long, default_value = "sources.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline once and write the snapshot file
    Update {
        /// Overrides `pipeline.output_path`
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the news API
    Serve {
        #[arg(short, long, default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_pulse=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;
    let registry = Arc::new(config.registry());
    info!(
        "Loaded {} source groups from {}",
        registry.groups().len(),
        cli.config.display()
    );

    let aggregator = Aggregator::from_config(&config, registry.clone())?;

    match cli.command {
        Command::Update { output } => {
            let store = SnapshotStore::new(output.unwrap_or_else(|| config.pipeline.output_path.clone()));
            let news = aggregator.run().await?;
            store.update(news, &registry).await?;
        }
        Command::Serve { bind } => {
            let state = Arc::new(AppState {
                aggregator: Arc::new(aggregator),
                store: Arc::new(SnapshotStore::new(&config.pipeline.output_path)),
            });

            let app = routes::router(state).layer(TraceLayer::new_for_http());

            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!("Server starting on http://{}", bind);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
