use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use tracing::{error, info};

use crate::config::{FetcherKind, SourceConfig, SourceGroup, SourceRegistry};
use crate::model::{RawStory, SourceType};

pub mod hacker_news;
pub mod news_api;
pub mod rss;
pub mod telegram;

pub use hacker_news::HackerNewsFetcher;
pub use news_api::NewsApiFetcher;
pub use rss::RssFetcher;
pub use telegram::TelegramFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; AI-Pulse-Bot/1.0)";

/// Builds the HTTP client shared by every fetcher and translator.
pub fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Display metadata a fetcher stamps onto every story it produces.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceMeta {
    pub name: String,
    pub source_type: SourceType,
    pub icon: String,
    pub favicon: String,
    pub url: String,
}

impl SourceMeta {
    pub fn new(group: &SourceGroup, source: &SourceConfig) -> Self {
        Self {
            name: source.name.clone(),
            source_type: group.kind,
            icon: group.icon.clone(),
            favicon: source.favicon.clone(),
            url: source.url.clone(),
        }
    }

    pub fn is_official(&self) -> bool {
        self.source_type == SourceType::Official
    }

    /// Lower-cased name with whitespace runs replaced by dashes.
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn meta(&self) -> &SourceMeta;

    async fn fetch(&self) -> anyhow::Result<Vec<RawStory>>;
}

/// Runs a fetcher, turning any failure into an empty contribution.
pub async fn fetch_or_empty(fetcher: &dyn SourceFetcher) -> Vec<RawStory> {
    let meta = fetcher.meta();
    info!("Fetching {} ({})", meta.name, meta.url);

    match fetcher.fetch().await {
        Ok(stories) => {
            info!("Got {} stories from '{}'", stories.len(), meta.name);
            stories
        }
        Err(e) => {
            error!("Fetch failed for '{}': {:#}", meta.name, e);
            Vec::new()
        }
    }
}

/// One fetcher per configured source, in registry order.
pub fn build_fetchers(registry: &SourceRegistry, client: &Client) -> Vec<Box<dyn SourceFetcher>> {
    let mut fetchers: Vec<Box<dyn SourceFetcher>> = Vec::new();

    for group in registry.groups() {
        for source in &group.sources {
            let meta = SourceMeta::new(group, source);
            let fetcher: Box<dyn SourceFetcher> = match source.fetcher {
                FetcherKind::Rss => Box::new(RssFetcher::new(client.clone(), meta)),
                FetcherKind::HackerNews => Box::new(HackerNewsFetcher::new(client.clone(), meta)),
                FetcherKind::Telegram => Box::new(TelegramFetcher::new(client.clone(), meta)),
                FetcherKind::NewsApi => Box::new(NewsApiFetcher::from_env(client.clone(), meta)),
            };
            fetchers.push(fetcher);
        }
    }

    fetchers
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Removes markup, decodes entities and collapses whitespace.
pub fn strip_tags(raw: &str) -> String {
    normalize_markup(raw, "")
}

/// Like [`strip_tags`], but every tag becomes a word break.
pub fn flatten_markup(raw: &str) -> String {
    normalize_markup(raw, " ")
}

fn normalize_markup(raw: &str, tag_replacement: &str) -> String {
    let without_tags = TAG_RE.replace_all(raw, tag_replacement);
    let decoded = html_escape::decode_html_entities(&without_tags);
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Truncates to at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    pub(crate) fn meta(source_type: SourceType) -> SourceMeta {
        SourceMeta {
            name: "Test Source".to_string(),
            source_type,
            icon: "icon".to_string(),
            favicon: "https://example.com/favicon.ico".to_string(),
            url: "https://example.com".to_string(),
        }
    }

    struct FailingFetcher(SourceMeta);

    #[async_trait]
    impl SourceFetcher for FailingFetcher {
        fn meta(&self) -> &SourceMeta {
            &self.0
        }

        async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
            anyhow::bail!("connection refused")
        }
    }

    #[test]
    fn test_strip_tags() {
        assert_eq!(strip_tags("<p>Hello   <b>world</b></p>"), "Hello world");
        assert_eq!(strip_tags("Open<em>AI</em>"), "OpenAI");
        assert_eq!(strip_tags("Fish &amp; Chips"), "Fish & Chips");
        assert_eq!(strip_tags("  \n\t "), "");
    }

    #[test]
    fn test_flatten_markup_breaks_words_at_tags() {
        assert_eq!(flatten_markup("line one<br/>line two"), "line one line two");
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("שלום עולם", 4), "שלום");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_slug() {
        let mut m = meta(SourceType::Official);
        m.name = "NVIDIA  Newsroom".to_string();
        assert_eq!(m.slug(), "nvidia-newsroom");
    }

    #[tokio::test]
    async fn test_fetch_or_empty_swallows_errors() {
        let fetcher = FailingFetcher(meta(SourceType::Tech));
        let stories = fetch_or_empty(&fetcher).await;
        assert!(stories.is_empty());
    }

    #[test]
    fn test_build_fetchers_follows_registry_order() {
        let config = Config::from_str(
            r#"
            [[groups]]
            kind = "community"
            icon = "community"
            [[groups.sources]]
            name = "Hacker News"
            fetcher = "hacker_news"
            url = "https://hacker-news.firebaseio.com/v0"

            [[groups]]
            kind = "local"
            icon = "israel"
            [[groups.sources]]
            name = "AI Israel Telegram"
            fetcher = "telegram"
            url = "https://t.me/s/ai_tg_il"

            [[groups]]
            kind = "official"
            icon = "verified"
            [[groups.sources]]
            name = "OpenAI Blog"
            fetcher = "rss"
            url = "https://openai.com/blog/rss.xml"
            "#,
        )
        .unwrap();
        let client = http_client(Duration::from_secs(5)).unwrap();

        let fetchers = build_fetchers(&config.registry(), &client);
        let names: Vec<&str> = fetchers.iter().map(|f| f.meta().name.as_str()).collect();

        assert_eq!(names, vec!["OpenAI Blog", "AI Israel Telegram", "Hacker News"]);
        assert_eq!(fetchers[1].meta().icon, "israel");
    }
}
