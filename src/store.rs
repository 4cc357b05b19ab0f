use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Server-side cap on the stored recent-posts projection.
pub const MAX_STORED_POSTS: usize = 5;

/// Display projection of one feed item, retained on the blog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub url: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub rss_url: String,
    pub last_posted: Option<DateTime<Utc>>,
    pub total_posts: i64,
    pub posts: Vec<PostSummary>,
    pub created_at: DateTime<Utc>,
}

/// Client-supplied shape for creating a blog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBlog {
    pub name: String,
    pub url: String,
    pub rss_url: String,
}

/// Partial update; absent fields leave the record unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPatch {
    pub name: Option<String>,
    pub url: Option<String>,
    pub rss_url: Option<String>,
    pub last_posted: Option<DateTime<Utc>>,
    pub total_posts: Option<i64>,
    pub posts: Option<Vec<PostSummary>>,
}

/// What a feed fetch contributes to a blog record: overwritten wholesale
/// on every refresh, never merged incrementally.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub last_posted: Option<DateTime<Utc>>,
    pub total_posts: i64,
    pub posts: Vec<PostSummary>,
}

struct Inner {
    blogs: HashMap<i64, Blog>,
    next_id: i64,
}

/// In-memory blog store with an auto-increment id. Explicitly constructed
/// and shared by `Arc`; holds no durable state.
pub struct BlogStore {
    inner: RwLock<Inner>,
}

impl BlogStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                blogs: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    pub async fn list(&self) -> Vec<Blog> {
        let inner = self.inner.read().await;
        let mut blogs: Vec<Blog> = inner.blogs.values().cloned().collect();
        blogs.sort_by_key(|b| b.id);
        blogs
    }

    pub async fn get(&self, id: i64) -> Option<Blog> {
        self.inner.read().await.blogs.get(&id).cloned()
    }

    pub async fn create(&self, new: NewBlog, snapshot: FeedSnapshot) -> Blog {
        let mut inner = self.inner.write().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let blog = Blog {
            id,
            name: new.name,
            url: new.url,
            rss_url: new.rss_url,
            last_posted: snapshot.last_posted,
            total_posts: snapshot.total_posts,
            posts: normalize_posts(snapshot.posts),
            created_at: Utc::now(),
        };
        inner.blogs.insert(id, blog.clone());
        blog
    }

    pub async fn update(&self, id: i64, patch: BlogPatch) -> Option<Blog> {
        let mut inner = self.inner.write().await;
        let blog = inner.blogs.get_mut(&id)?;

        if let Some(name) = patch.name {
            blog.name = name;
        }
        if let Some(url) = patch.url {
            blog.url = url;
        }
        if let Some(rss_url) = patch.rss_url {
            blog.rss_url = rss_url;
        }
        if let Some(last_posted) = patch.last_posted {
            blog.last_posted = Some(last_posted);
        }
        if let Some(total_posts) = patch.total_posts {
            blog.total_posts = total_posts;
        }
        if let Some(posts) = patch.posts {
            blog.posts = normalize_posts(posts);
        }

        Some(blog.clone())
    }

    /// Overwrite a blog's feed-derived fields with a fresh snapshot.
    /// When the new fetch yielded no items, the previous `last_posted`
    /// is retained so a temporarily empty feed does not erase history.
    pub async fn apply_snapshot(&self, id: i64, snapshot: FeedSnapshot) -> Option<Blog> {
        let mut inner = self.inner.write().await;
        let blog = inner.blogs.get_mut(&id)?;

        if snapshot.last_posted.is_some() {
            blog.last_posted = snapshot.last_posted;
        }
        blog.total_posts = snapshot.total_posts;
        blog.posts = normalize_posts(snapshot.posts);

        Some(blog.clone())
    }

    pub async fn delete(&self, id: i64) -> bool {
        self.inner.write().await.blogs.remove(&id).is_some()
    }
}

impl Default for BlogStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Cap the projection and make sure every entry carries a usable id.
fn normalize_posts(mut posts: Vec<PostSummary>) -> Vec<PostSummary> {
    posts.truncate(MAX_STORED_POSTS);
    for post in &mut posts {
        if post.id.is_empty() {
            post.id = format!("{}-{}", post.url, post.date.timestamp_millis());
        }
    }
    posts
}
