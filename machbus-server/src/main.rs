use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use machbus_entity::codec::ContentType;
use machbus_entity::ServerInfo;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use machbus_server::http::{self, AppState};
use machbus_server::ingest::{Ingestor, LogSink};
use machbus_server::registry::SchemaRegistry;
use machbus_server::{config, monitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::load_config().await;

    let registry = SchemaRegistry::new();
    let ingestor = Ingestor::new(registry.clone(), Arc::new(LogSink));

    monitor::spawn_sweeper(
        registry.clone(),
        Duration::from_millis(cfg.sweep_interval_ms),
        Duration::from_millis(cfg.machine_timeout_ms),
        Arc::new(|machine| warn!(%machine, "no contact, consider the machine offline")),
    );

    let mut info = ServerInfo::new(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
        cfg.heart_beat_interval_ms,
    );
    info.add_content_type(ContentType::Json.as_mime());
    info.add_content_type(ContentType::Xml.as_mime());

    let app = http::build_router(AppState { registry, ingestor, info }, &cfg.base_path);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("listening on http://{addr}{}", cfg.base_path);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
