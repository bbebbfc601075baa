use std::{net::SocketAddr, sync::Arc};

use tokio::signal;
use tracing::{error, info, warn};

use xeco_checkout as api;
use xeco_checkout::auth::{AuthProvider, InMemoryAuthProvider};
use xeco_checkout::store::{CommerceStore, InMemoryStore, SqlStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let store: Arc<dyn CommerceStore> = match cfg.database_url.as_deref() {
        Some(url) => {
            let sql = SqlStore::connect(url).await?;
            if cfg.auto_migrate {
                sql.create_schema().await.map_err(|e| {
                    error!("Failed creating schema: {}", e);
                    e
                })?;
            }
            info!("Using SQL store");
            Arc::new(sql)
        }
        None => {
            warn!("No database_url configured; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    if cfg.payment_workflow_url.is_none() {
        warn!("payment_workflow_url not configured; checkout sessions will be refused");
    }

    let auth: Arc<dyn AuthProvider> = Arc::new(InMemoryAuthProvider::new());
    let state = api::AppState::new(cfg.clone(), store, auth)?;

    tokio::spawn(api::events::log_events(state.events.subscribe()));
    api::handlers::health::init_start_time();

    let app = api::app(state);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, environment = %cfg.environment, "xeco-checkout listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
