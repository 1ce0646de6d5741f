mod api;
mod config;
mod resolver;
mod storage;
mod ytdlp;

use std::{io, sync::Arc};

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

use crate::{
    api::{AppState, build_router},
    config::AppConfig,
    storage::DownloadDir,
    ytdlp::YtDlp,
};

#[derive(Debug, Error)]
enum StartupError {
    #[error("could not create download directory {path}: {source}")]
    DownloadDir { path: String, source: io::Error },
    #[error("could not bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },
    #[error("HTTP server error: {0}")]
    Serve(io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "youtube_downloader_api=info,tower_http=info".to_string()),
        )
        .init();

    if let Err(error) = run(AppConfig::from_env()).await {
        eprintln!("Server error: {error}");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), StartupError> {
    let downloads = DownloadDir::new(&config.download_dir);
    downloads
        .ensure()
        .await
        .map_err(|source| StartupError::DownloadDir {
            path: config.download_dir.display().to_string(),
            source,
        })?;
    info!("Storing downloads in {:?}", downloads.root());

    let state = AppState {
        resolver: Arc::new(YtDlp::new(config.yt_dlp_bin.clone())),
        downloads,
    };
    let app = build_router(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.map_err(StartupError::Serve)
}
