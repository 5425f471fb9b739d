use std::{net::SocketAddr, sync::Arc, time::Duration};

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sniffertrek_backend::providers::GoogleMapsProvider;
use sniffertrek_backend::segmentation::DEFAULT_WAYPOINT_CEILING;
use sniffertrek_backend::store::{InMemoryTripStore, PgTripStore, TripStore};
use sniffertrek_backend::suggestions::HttpSuggestionProvider;
use sniffertrek_backend::{AppState, create_router};

#[derive(Parser)]
#[command(name = "sniffertrek", about = "Road-trip planning backend")]
struct Args {
    #[arg(long, env = "SNIFFERTREK_ADDR", default_value = "0.0.0.0:8080")]
    addr: SocketAddr,
    #[arg(long, env = "GOOGLE_MAPS_API_KEY")]
    google_api_key: String,
    /// Postgres trip store for cloud sync; omitted means in-memory only.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, env = "SUGGESTION_ENDPOINT", default_value = "http://localhost:8090/api/suggest")]
    suggestion_endpoint: String,
    /// Quiet window before a stop-list edit triggers a route request.
    #[arg(long, default_value_t = 300)]
    debounce_ms: u64,
    #[arg(long, default_value_t = DEFAULT_WAYPOINT_CEILING)]
    waypoint_ceiling: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sniffertrek_backend=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let google = Arc::new(GoogleMapsProvider::new(args.google_api_key));
    let suggestions = Arc::new(HttpSuggestionProvider::new(args.suggestion_endpoint));

    let store: Arc<dyn TripStore> = match &args.database_url {
        Some(url) => {
            let store = PgTripStore::connect(url).await.expect("connect trip store");
            store.migrate().await.expect("apply trip store migrations");
            tracing::info!("using Postgres trip store");
            Arc::new(store)
        }
        None => {
            tracing::info!("no DATABASE_URL, trips kept in memory");
            Arc::new(InMemoryTripStore::default())
        }
    };

    let state = AppState::new(
        google.clone(),
        google,
        suggestions,
        store,
        args.waypoint_ceiling,
        Duration::from_millis(args.debounce_ms),
    );
    let app = create_router(state);

    tracing::info!("starting sniffertrek backend on http://{}", args.addr);
    axum::serve(
        tokio::net::TcpListener::bind(args.addr).await.expect("bind"),
        app,
    )
    .await
    .expect("serve");
}
