use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{SourceFetcher, SourceMeta};
use crate::classify::is_ai_related;
use crate::model::RawStory;

/// How far down the ranked list to look
pub const SCAN_LIMIT: usize = 80;
/// Stop once this many AI stories are found
pub const QUOTA: usize = 3;

#[derive(Debug, Deserialize)]
struct Item {
    id: u64,
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    time: i64,
    score: Option<i64>,
}

/// Walks the top-stories list of a Hacker News style API, one item at a time.
pub struct HackerNewsFetcher {
    client: Client,
    meta: SourceMeta,
}

impl HackerNewsFetcher {
    pub fn new(client: Client, meta: SourceMeta) -> Self {
        Self { client, meta }
    }

    fn base_url(&self) -> &str {
        self.meta.url.trim_end_matches('/')
    }

    async fn top_story_ids(&self) -> anyhow::Result<Vec<u64>> {
        let url = format!("{}/topstories.json", self.base_url());
        let ids = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<u64>>()
            .await?;
        Ok(ids)
    }

    async fn item(&self, id: u64) -> anyhow::Result<Option<Item>> {
        let url = format!("{}/item/{}.json", self.base_url(), id);
        let item = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Option<Item>>()
            .await?;
        Ok(item)
    }

    fn to_story(&self, item: Item, title: String) -> RawStory {
        let url = item
            .url
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", item.id));

        RawStory {
            id: format!("hn-{}", item.id),
            title,
            url,
            published_at: DateTime::<Utc>::from_timestamp(item.time, 0).unwrap_or_else(Utc::now),
            source_name: self.meta.name.clone(),
            source_type: self.meta.source_type,
            source_icon: self.meta.icon.clone(),
            favicon: self.meta.favicon.clone(),
            is_hebrew: false,
            is_verified: false,
            description: None,
            score: item.score,
        }
    }
}

#[async_trait]
impl SourceFetcher for HackerNewsFetcher {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
        let ids = self.top_story_ids().await?;
        let mut stories = Vec::new();

        for id in ids.into_iter().take(SCAN_LIMIT) {
            if stories.len() >= QUOTA {
                break;
            }

            let Some(item) = self.item(id).await? else {
                debug!("Item {} is null, skipping", id);
                continue;
            };
            let Some(title) = item.title.clone().filter(|t| !t.is_empty()) else {
                continue;
            };

            if is_ai_related(&title) {
                stories.push(self.to_story(item, title));
            }
        }

        Ok(stories)
    }
}
