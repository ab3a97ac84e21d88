use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::{SourceFetcher, SourceMeta};
use crate::model::RawStory;

pub const API_KEY_ENV: &str = "NEWS_API_KEY";
const QUERY: &str = "artificial intelligence OR OpenAI OR Anthropic OR NVIDIA AI";
const PAGE_SIZE: &str = "10";
const MAX_ARTICLES: usize = 5;

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<DateTime<Utc>>,
}

/// Searches a NewsAPI compatible `/everything` endpoint.
///
/// Without an API key the source is skipped and contributes nothing.
pub struct NewsApiFetcher {
    client: Client,
    meta: SourceMeta,
    api_key: Option<String>,
}

impl NewsApiFetcher {
    pub fn new(client: Client, meta: SourceMeta, api_key: Option<String>) -> Self {
        Self {
            client,
            meta,
            api_key,
        }
    }

    pub fn from_env(client: Client, meta: SourceMeta) -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty());
        Self::new(client, meta, api_key)
    }
}

#[async_trait]
impl SourceFetcher for NewsApiFetcher {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
        let Some(api_key) = &self.api_key else {
            info!("{} not set, skipping '{}'", API_KEY_ENV, self.meta.name);
            return Ok(Vec::new());
        };

        let url = format!("{}/everything", self.meta.url.trim_end_matches('/'));
        let response: Response = self
            .client
            .get(&url)
            .query(&[
                ("q", QUERY),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", PAGE_SIZE),
                ("apiKey", api_key.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        if response.status != "ok" {
            anyhow::bail!(
                "NewsAPI error: {}",
                response.message.unwrap_or_else(|| response.status.clone())
            );
        }

        let now = Utc::now();
        let stories = response
            .articles
            .into_iter()
            .take(MAX_ARTICLES)
            .enumerate()
            .filter_map(|(index, article)| {
                let title = article.title.filter(|t| !t.is_empty())?;
                let url = article.url.filter(|u| !u.is_empty())?;
                Some(RawStory {
                    id: format!("newsapi-{}-{}", now.timestamp_millis(), index),
                    title,
                    url,
                    published_at: article.published_at.unwrap_or(now),
                    source_name: self.meta.name.clone(),
                    source_type: self.meta.source_type,
                    source_icon: self.meta.icon.clone(),
                    favicon: self.meta.favicon.clone(),
                    is_hebrew: false,
                    is_verified: false,
                    description: article.description.filter(|d| !d.is_empty()),
                    score: None,
                })
            })
            .collect();

        Ok(stories)
    }
}
