use clap::Parser;
use qsync::{create_router, proxy_client, AppState, Config, PortSync, PortWatcher, QbitClient};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "qsync")]
#[command(about = "qBittorrent port synchronizer and allowlisted reverse proxy", long_about = None)]
struct Args {
    /// Port to listen on (overrides LISTEN_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the forwarded-port file (overrides PORT_FILE)
    #[arg(long)]
    port_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qsync=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(path) = args.port_file {
        config.port_file = path;
    }

    if config.allowlist.is_empty() {
        tracing::warn!("ALLOWED_IPS is empty, gated endpoints will deny all requests");
    }

    // qBittorrent client and the synchronizer that owns the current port
    let qbit = Arc::new(QbitClient::new(
        &config.qbit_addr,
        &config.qbit_user,
        &config.qbit_pass,
    )?);
    let sync = Arc::new(PortSync::new(qbit));

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    // The forwarded-port file may already exist at startup.
    if let Some(port) = qsync::watcher::check_file_now(&config.port_file) {
        tracing::info!(port, "initial check found port file");
        let _ = tx.send(port);
    }

    tracing::info!(path = %config.port_file.display(), "starting port file watcher");
    let _watcher = match PortWatcher::spawn(&config.port_file, tx) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            tracing::warn!(
                error = %err,
                "failed to start file watcher, continuing without live updates"
            );
            None
        }
    };

    // One consumer task serializes watcher events into the synchronizer.
    let consumer = sync.clone();
    tokio::spawn(async move {
        while let Some(port) = rx.recv().await {
            consumer.on_candidate_port(port).await;
        }
    });

    let state = AppState::new(
        sync,
        config.allowlist.clone(),
        config.port_file.clone(),
        &config.qbit_addr,
        proxy_client()?,
    );
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", config.listen_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, upstream = %config.qbit_addr, "reverse proxy listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
