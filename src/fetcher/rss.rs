use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::ACCEPT, Client};
use tracing::{debug, warn};

use super::{strip_tags, truncate_chars, SourceFetcher, SourceMeta};
use crate::classify::is_ai_related;
use crate::model::RawStory;

/// Stories kept per feed
pub const MAX_ITEMS: usize = 3;
const DESCRIPTION_LIMIT: usize = 200;

static ITEM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<item(?:\s[^>]*)?>(.*?)</item>").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| cdata_element("title"));
static LINK_RE: Lazy<Regex> = Lazy::new(|| cdata_element("link"));
static DESCRIPTION_RE: Lazy<Regex> = Lazy::new(|| cdata_element("description"));
static PUB_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<pubDate>(.*?)</pubDate>").unwrap());

fn cdata_element(tag: &str) -> Regex {
    Regex::new(&format!(r"(?s)<{tag}>(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?</{tag}>")).unwrap()
}

/// One entry pulled out of a feed document, before filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub description: String,
}

pub struct RssFetcher {
    client: Client,
    meta: SourceMeta,
}

impl RssFetcher {
    pub fn new(client: Client, meta: SourceMeta) -> Self {
        Self { client, meta }
    }

    /// Pull `<item>` blocks out of an RSS document.
    ///
    /// This is pattern matching, not XML parsing: an item missing its title
    /// or link is skipped and scanning continues with the next block.
    pub fn extract_items(xml: &str) -> Vec<FeedEntry> {
        let mut entries = Vec::new();

        for captures in ITEM_RE.captures_iter(xml) {
            let item = &captures[1];

            let title = TITLE_RE.captures(item).map(|c| strip_tags(&c[1]));
            let link = LINK_RE.captures(item).map(|c| c[1].trim().to_string());

            let (title, link) = match (title, link) {
                (Some(title), Some(link)) if !title.is_empty() && !link.is_empty() => (title, link),
                _ => {
                    debug!("Skipping RSS item without title or link");
                    continue;
                }
            };

            let description = DESCRIPTION_RE
                .captures(item)
                .map(|c| truncate_chars(&strip_tags(&c[1]), DESCRIPTION_LIMIT))
                .unwrap_or_default();

            let published = PUB_DATE_RE
                .captures(item)
                .and_then(|c| parse_pub_date(&c[1]));

            entries.push(FeedEntry {
                title,
                link,
                published,
                description,
            });
        }

        entries
    }

    /// Parse an Atom (or otherwise non-`<item>`) document with feed-rs.
    pub fn extract_entries_with_parser(bytes: &[u8]) -> anyhow::Result<Vec<FeedEntry>> {
        let feed = parser::parse(bytes)?;

        let entries = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let title = entry.title.map(|t| strip_tags(&t.content))?;
                let link = entry.links.first().map(|l| l.href.clone())?;
                if title.is_empty() || link.is_empty() {
                    return None;
                }
                let description = entry
                    .summary
                    .map(|s| truncate_chars(&strip_tags(&s.content), DESCRIPTION_LIMIT))
                    .unwrap_or_default();

                Some(FeedEntry {
                    title,
                    link,
                    published: entry.published.or(entry.updated),
                    description,
                })
            })
            .collect();

        Ok(entries)
    }

    /// Apply the keyword filter and per-feed cap, and stamp source metadata.
    ///
    /// Official sources skip the keyword filter.
    pub fn select(&self, entries: Vec<FeedEntry>, now: DateTime<Utc>) -> Vec<RawStory> {
        let slug = self.meta.slug();
        let mut stories = Vec::new();

        for entry in entries {
            if stories.len() >= MAX_ITEMS {
                break;
            }

            let text = format!("{} {}", entry.title, entry.description);
            if !self.meta.is_official() && !is_ai_related(&text) {
                continue;
            }

            stories.push(RawStory {
                id: format!("rss-{}-{}", slug, stories.len()),
                title: entry.title,
                url: entry.link,
                published_at: entry.published.unwrap_or(now),
                source_name: self.meta.name.clone(),
                source_type: self.meta.source_type,
                source_icon: self.meta.icon.clone(),
                favicon: self.meta.favicon.clone(),
                is_hebrew: false,
                is_verified: self.meta.is_official(),
                description: Some(entry.description).filter(|d| !d.is_empty()),
                score: None,
            });
        }

        stories
    }
}

fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[async_trait]
impl SourceFetcher for RssFetcher {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
        let response = self
            .client
            .get(&self.meta.url)
            .header(ACCEPT, "application/rss+xml, application/xml, text/xml")
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        let xml = String::from_utf8_lossy(&bytes);

        let mut entries = Self::extract_items(&xml);
        if entries.is_empty() && !ITEM_RE.is_match(&xml) {
            warn!("No <item> blocks in '{}', trying feed parser", self.meta.name);
            entries = Self::extract_entries_with_parser(&bytes)?;
        }

        Ok(self.select(entries, Utc::now()))
    }
}
