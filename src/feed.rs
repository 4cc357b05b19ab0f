use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use roxmltree::{Document, Node};
use thiserror::Error;
use tracing::debug;

/// Number of characters kept from an item's content/description field.
const EXCERPT_CHARS: usize = 150;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("feed is not well-formed XML: {0}")]
    Malformed(#[from] roxmltree::Error),
}

/// Syntactic family of a feed document.
///
/// `NaverBlog` is RSS-shaped but emits RFC 3339-like dates with a
/// colonless UTC offset (`+0900`), which needs repair before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    NaverBlog,
    Atom,
    Rss,
}

impl Dialect {
    fn entry_tag(self) -> &'static str {
        match self {
            Dialect::Atom => "entry",
            Dialect::Rss | Dialect::NaverBlog => "item",
        }
    }
}

/// Dialect-independent representation of a parsed feed.
#[derive(Debug, Clone)]
pub struct CanonicalFeed {
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    /// Items in document order, never re-sorted.
    pub items: Vec<CanonicalItem>,
    /// Non-fatal anomalies encountered while normalizing.
    pub diagnostics: Vec<Diagnostic>,
}

/// One feed entry after normalization. Missing source fields degrade to
/// empty strings rather than failing the document.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalItem {
    pub id: String,
    pub title: String,
    pub link: String,
    /// Original, unparsed text of the source date field.
    pub raw_publish_date: String,
    pub published: DateTime<Utc>,
    pub excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The item's publish date was absent or unparsable; `published` was
    /// defaulted to the time of normalization.
    DateFallback { link: String, raw_date: String },
}

/// Parse raw feed markup into a [`CanonicalFeed`].
///
/// Fails only when the input is not well-formed XML. Missing fields,
/// unparsable dates and empty item lists degrade to defaults.
pub fn normalize(raw: &str) -> Result<CanonicalFeed, ParseError> {
    normalize_at(raw, Utc::now())
}

/// Like [`normalize`], with an explicit "now" used for date fallbacks.
/// Deterministic given `now`.
pub fn normalize_at(raw: &str, now: DateTime<Utc>) -> Result<CanonicalFeed, ParseError> {
    let doc = Document::parse(raw)?;
    let dialect = detect_dialect(&doc);
    debug!("detected feed dialect: {:?}", dialect);

    let (title, description, link) = extract_feed_metadata(&doc, dialect);

    let mut entries: Vec<Node> = doc
        .descendants()
        .filter(|n| is_tag(n, dialect.entry_tag()))
        .collect();

    // Real-world feeds sometimes mislabel their root element; before
    // concluding the feed is empty, look for anything entry-shaped.
    if entries.is_empty() {
        entries = doc
            .descendants()
            .filter(|n| is_tag(n, "item") || is_tag(n, "entry"))
            .collect();
    }

    let mut items = Vec::with_capacity(entries.len());
    let mut diagnostics = Vec::new();
    for entry in entries {
        items.push(extract_item(&entry, dialect, now, &mut diagnostics));
    }

    Ok(CanonicalFeed {
        title,
        description,
        link,
        items,
        diagnostics,
    })
}

/// Ranked structural probes, first confident match wins: the vendor probe
/// inspects the RSS channel itself (generator, channel link), so incidental
/// marker strings inside item content cannot trigger it.
fn detect_dialect(doc: &Document) -> Dialect {
    let root = doc.root_element();
    if root.tag_name().name().eq_ignore_ascii_case("feed") {
        return Dialect::Atom;
    }

    if let Some(channel) = doc.descendants().find(|n| is_tag(n, "channel")) {
        let generator = child_text(&channel, "generator").unwrap_or_default();
        let channel_link = child_text(&channel, "link").unwrap_or_default();
        if generator.to_ascii_lowercase().contains("naver")
            || channel_link.contains("blog.naver.com")
        {
            return Dialect::NaverBlog;
        }
        return Dialect::Rss;
    }

    // No channel: a feed container anywhere still means Atom.
    if doc.descendants().any(|n| is_tag(&n, "feed")) {
        return Dialect::Atom;
    }

    Dialect::Rss
}

fn extract_feed_metadata(
    doc: &Document,
    dialect: Dialect,
) -> (String, Option<String>, Option<String>) {
    match dialect {
        Dialect::Atom => {
            let feed = doc.root_element();
            let title = child_text(&feed, "title").unwrap_or_default();
            let description = child_text(&feed, "subtitle");
            let link = link_href(&feed);
            (title, description, link)
        }
        Dialect::Rss | Dialect::NaverBlog => {
            let channel = doc.descendants().find(|n| is_tag(n, "channel"));
            match channel {
                Some(channel) => {
                    let title = child_text(&channel, "title").unwrap_or_default();
                    let description = child_text(&channel, "description");
                    let link = child_text(&channel, "link");
                    (title, description, link)
                }
                None => (String::new(), None, None),
            }
        }
    }
}

fn extract_item(
    entry: &Node,
    dialect: Dialect,
    now: DateTime<Utc>,
    diagnostics: &mut Vec<Diagnostic>,
) -> CanonicalItem {
    let title = child_text(entry, "title").unwrap_or_default();

    let (link, raw_date, content, native_id) = match dialect {
        Dialect::Atom => (
            link_href(entry).unwrap_or_default(),
            child_text_any(entry, &["published", "updated"]).unwrap_or_default(),
            child_text_any(entry, &["content", "summary"]).unwrap_or_default(),
            child_text(entry, "id").unwrap_or_default(),
        ),
        Dialect::Rss | Dialect::NaverBlog => (
            child_text(entry, "link").unwrap_or_default(),
            child_text(entry, "pubDate").unwrap_or_default(),
            child_text(entry, "description").unwrap_or_default(),
            child_text(entry, "guid").unwrap_or_default(),
        ),
    };

    let published = match parse_publish_date(&raw_date, dialect) {
        Some(instant) => instant,
        None => {
            diagnostics.push(Diagnostic::DateFallback {
                link: link.clone(),
                raw_date: raw_date.clone(),
            });
            now
        }
    };

    let id = if native_id.is_empty() {
        format!("{}-{}", link, published.timestamp_millis())
    } else {
        native_id
    };

    CanonicalItem {
        id,
        title,
        link,
        raw_publish_date: raw_date,
        published,
        excerpt: content.chars().take(EXCERPT_CHARS).collect(),
    }
}

/// Parse a publish date, trying the formats feeds actually emit.
/// Returns `None` when nothing matches; the caller decides the fallback.
pub fn parse_publish_date(raw: &str, dialect: Dialect) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    if dialect == Dialect::NaverBlog {
        if let Some(repaired) = repair_offset(trimmed) {
            if let Ok(dt) = DateTime::parse_from_rfc3339(&repaired) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }
    None
}

/// Rewrite a trailing colonless offset (`+0900`) to ISO form (`+09:00`).
fn repair_offset(raw: &str) -> Option<String> {
    if raw.len() < 5 || !raw.is_char_boundary(raw.len() - 5) {
        return None;
    }
    let (head, tail) = raw.split_at(raw.len() - 5);
    let mut chars = tail.chars();
    let sign = chars.next()?;
    if (sign != '+' && sign != '-') || !chars.all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}{}{}:{}", head, sign, &tail[1..3], &tail[3..5]))
}

// Selector helpers compare local names only, so namespaced Atom documents
// and plain RSS go through the same code path.

fn is_tag(node: &Node, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

fn child_text(node: &Node, name: &str) -> Option<String> {
    child_text_any(node, &[name])
}

fn child_text_any(node: &Node, names: &[&str]) -> Option<String> {
    for child in node.children() {
        if names.iter().any(|name| is_tag(&child, name)) {
            if let Some(text) = child.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(trimmed.to_string());
                }
            }
        }
    }
    None
}

/// Atom link extraction: prefer the `rel="alternate"` link, fall back to
/// the first `link` element's href.
fn link_href(node: &Node) -> Option<String> {
    let links: Vec<Node> = node.children().filter(|c| is_tag(c, "link")).collect();
    for link in &links {
        if link.attribute("rel") == Some("alternate") {
            if let Some(href) = link.attribute("href") {
                return Some(href.trim().to_string());
            }
        }
    }
    links
        .first()
        .and_then(|link| link.attribute("href"))
        .map(|href| href.trim().to_string())
}
