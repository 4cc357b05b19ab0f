mod activity;
mod config;
mod feed;
mod fetcher;
mod routes;
mod store;

use std::sync::Arc;

use tower_http::services::ServeDir;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::fetcher::Fetcher;
use crate::routes::AppState;
use crate::store::{BlogStore, FeedSnapshot, NewBlog};

const CONFIG_PATH: &str = "blogwatch.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blogwatch=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; a missing file just means defaults.
    let config = if std::path::Path::new(CONFIG_PATH).exists() {
        Config::load(CONFIG_PATH)?
    } else {
        Config::default()
    };
    info!("Loaded {} seed blogs from configuration", config.blogs.len());

    // Build the store and register seed blogs; their feed data arrives
    // with the first refresh.
    let store = Arc::new(BlogStore::new());
    for seed in &config.blogs {
        store
            .create(
                NewBlog {
                    name: seed.name.clone(),
                    url: seed.url.clone(),
                    rss_url: seed.rss_url.clone(),
                },
                FeedSnapshot::default(),
            )
            .await;
    }

    let fetcher = Arc::new(Fetcher::new(store.clone())?);

    let state = Arc::new(AppState {
        store: store.clone(),
        fetcher: fetcher.clone(),
    });

    // Build router: the JSON API plus the static dashboard.
    let app = routes::router(state).fallback_service(ServeDir::new("static"));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
