use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::Router;
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use filedepot::index::SqliteIndex;
use filedepot::ingest::DEFAULT_GROUP_SIZE;
use filedepot::routes;
use filedepot::state::AppState;
use filedepot::store::FsBlobStore;

#[derive(Parser)]
#[command(name = "filedepot", about = "Deduplicating batch file-ingestion service")]
struct Args {
    #[arg(long, env = "PORT", default_value_t = 4020)]
    port: u16,
    /// Directory where accepted blobs are stored.
    #[arg(long, env = "UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,
    /// SQLite database holding the dedup index.
    #[arg(long, env = "DATABASE_PATH", default_value = "files.db")]
    database: PathBuf,
    /// Files processed concurrently per group.
    #[arg(long, default_value_t = DEFAULT_GROUP_SIZE)]
    group_size: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "filedepot=info".into()),
        )
        .init();

    let args = Args::parse();

    let index = match SqliteIndex::open(&args.database).await {
        Ok(index) => Arc::new(index),
        Err(e) => {
            eprintln!("failed to open dedup index at {}: {e}", args.database.display());
            std::process::exit(1);
        }
    };
    let store = match FsBlobStore::open(&args.upload_dir).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("failed to open blob store at {}: {e}", args.upload_dir.display());
            std::process::exit(1);
        }
    };

    let state = AppState::new(index, store, args.group_size);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", axum::routing::get(routes::health))
        .route("/upload", axum::routing::post(routes::upload))
        .route("/progress", axum::routing::get(routes::progress))
        .route("/ws/progress", axum::routing::get(routes::ws_progress))
        .layer(DefaultBodyLimit::max(1024 * 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr).await.unwrap();
    info!("filedepot listening on port {}", args.port);
    axum::serve(listener, app).await.unwrap();
}
