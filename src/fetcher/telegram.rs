use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{header::USER_AGENT, Client};

use super::{flatten_markup, truncate_chars, SourceFetcher, SourceMeta};
use crate::model::RawStory;

const CANDIDATES: usize = 5;
const MAX_MESSAGES: usize = 2;
const MESSAGE_LIMIT: usize = 300;
const TITLE_LIMIT: usize = 150;
const MIN_MESSAGE_LEN: usize = 20;
const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static MESSAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<div class="tgme_widget_message_text[^"]*"[^>]*>.*?</div>"#).unwrap()
});

/// Scrapes the public web preview of a chat channel (`https://t.me/s/<channel>`).
///
/// Messages are already in the display language and are never translated.
pub struct TelegramFetcher {
    client: Client,
    meta: SourceMeta,
}

impl TelegramFetcher {
    pub fn new(client: Client, meta: SourceMeta) -> Self {
        Self { client, meta }
    }

    /// Message texts from a preview page, cleaned and truncated.
    pub fn extract_messages(html: &str) -> Vec<String> {
        MESSAGE_RE
            .find_iter(html)
            .take(CANDIDATES)
            .map(|m| truncate_chars(&flatten_markup(m.as_str()), MESSAGE_LIMIT))
            .filter(|text| text.chars().count() > MIN_MESSAGE_LEN)
            .take(MAX_MESSAGES)
            .collect()
    }

    pub fn to_stories(&self, messages: Vec<String>, now: DateTime<Utc>) -> Vec<RawStory> {
        messages
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut title = truncate_chars(&text, TITLE_LIMIT);
                if text.chars().count() > TITLE_LIMIT {
                    title.push_str("...");
                }

                RawStory {
                    id: format!("tg-{}-{}", now.timestamp_millis(), index),
                    title,
                    url: self.meta.url.clone(),
                    published_at: now,
                    source_name: self.meta.name.clone(),
                    source_type: self.meta.source_type,
                    source_icon: self.meta.icon.clone(),
                    favicon: self.meta.favicon.clone(),
                    is_hebrew: true,
                    is_verified: false,
                    description: None,
                    score: None,
                }
            })
            .collect()
    }
}

#[async_trait]
impl SourceFetcher for TelegramFetcher {
    fn meta(&self) -> &SourceMeta {
        &self.meta
    }

    async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
        let html = self
            .client
            .get(&self.meta.url)
            .header(USER_AGENT, BROWSER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(self.to_stories(Self::extract_messages(&html), Utc::now()))
    }
}
