use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::feed::{self, CanonicalFeed};
use crate::store::{BlogStore, FeedSnapshot, PostSummary, MAX_STORED_POSTS};

pub struct Fetcher {
    client: Client,
    store: Arc<BlogStore>,
    refreshing: Arc<RwLock<bool>>,
}

impl Fetcher {
    pub fn new(store: Arc<BlogStore>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Blogwatch/1.0 (Blog Activity Dashboard)")
            .build()?;

        Ok(Self {
            client,
            store,
            refreshing: Arc::new(RwLock::new(false)),
        })
    }

    /// Shared HTTP client, also used by the feed proxy route.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn is_refreshing(&self) -> bool {
        *self.refreshing.read().await
    }

    /// Fetch and normalize a feed, returning the fields a blog record
    /// derives from it. Used both for validating a blog at creation time
    /// and for refreshes.
    pub async fn probe_feed(&self, rss_url: &str) -> anyhow::Result<FeedSnapshot> {
        let response = self.client.get(rss_url).send().await?.error_for_status()?;
        let body = response.text().await?;

        let feed = feed::normalize(&body)?;
        for diagnostic in &feed.diagnostics {
            warn!("feed {}: {:?}", rss_url, diagnostic);
        }

        Ok(snapshot_from_feed(&feed))
    }

    pub async fn refresh_all_blogs(&self) -> anyhow::Result<()> {
        // Check if already refreshing
        {
            let mut refreshing = self.refreshing.write().await;
            if *refreshing {
                info!("Refresh already in progress, skipping");
                return Ok(());
            }
            *refreshing = true;
        }

        let result = self.do_refresh_all().await;

        // Clear refreshing flag
        {
            let mut refreshing = self.refreshing.write().await;
            *refreshing = false;
        }

        result
    }

    /// Refresh blogs strictly sequentially; a failure on one blog leaves
    /// its previous state untouched and never aborts the rest.
    async fn do_refresh_all(&self) -> anyhow::Result<()> {
        let blogs = self.store.list().await;
        info!("Refreshing {} blogs", blogs.len());

        for blog in blogs {
            match self.probe_feed(&blog.rss_url).await {
                Ok(snapshot) => {
                    let total = snapshot.total_posts;
                    self.store.apply_snapshot(blog.id, snapshot).await;
                    info!("Refreshed blog '{}': {} posts", blog.name, total);
                }
                Err(e) => {
                    error!("Failed to refresh blog '{}': {}", blog.name, e);
                }
            }
        }

        info!("Blog refresh complete");
        Ok(())
    }
}

/// Derive a record snapshot from a normalized feed: `last_posted` is the
/// maximum publish timestamp, `total_posts` the item count of this fetch,
/// and `posts` the most recent items capped to the stored projection size.
pub fn snapshot_from_feed(feed: &CanonicalFeed) -> FeedSnapshot {
    let last_posted = feed.items.iter().map(|item| item.published).max();

    let mut posts: Vec<PostSummary> = feed
        .items
        .iter()
        .map(|item| PostSummary {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.link.clone(),
            date: item.published,
        })
        .collect();
    posts.sort_by(|a, b| b.date.cmp(&a.date));
    posts.truncate(MAX_STORED_POSTS);

    FeedSnapshot {
        last_posted,
        total_posts: feed.items.len() as i64,
        posts,
    }
}
