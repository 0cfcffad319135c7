use clap::{Parser, Subcommand};
use medfinder::config::Config;
use medfinder::directory::{seed_demo, DoctorDirectory};
use medfinder::geocoding::GeocodeResolver;
use medfinder::logging;
use medfinder::proximity::ProximityEngine;
use medfinder::server::{start_server, AppState};
use medfinder::store::{GridIndexStore, LocationStore};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "medfinder")]
#[command(about = "Doctor locator: address geocoding and nearby search")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on (overrides config.toml)
        #[arg(long)]
        port: Option<u16>,
        /// Load demo doctors around the default campus
        #[arg(long)]
        seed: bool,
    },
    /// Resolve a free-text address through the provider chain and print the
    /// outcome
    Geocode {
        /// Address text, e.g. "Apollo Hospital, Hyderabad, India"
        address: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;
    let resolver = Arc::new(GeocodeResolver::from_config(&config.geocoding)?);

    match cli.command {
        Commands::Serve { port, seed } => {
            let store: Arc<dyn LocationStore> = Arc::new(GridIndexStore::new());
            info!(indexed = store.has_spatial_index(), "location store ready");

            let directory = Arc::new(DoctorDirectory::new(resolver, store.clone()));
            if seed {
                seed_demo(&directory).await?;
            }

            let engine = Arc::new(ProximityEngine::new(store, directory));
            let state = Arc::new(AppState {
                engine,
                default_radius_km: config.server.default_radius_km,
            });
            start_server(state, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Geocode { address } => {
            let outcome = resolver.resolve(&address).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
