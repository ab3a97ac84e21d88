use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::model::SourceType;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineSettings,
    #[serde(default)]
    pub translation: TranslationSettings,
    #[serde(default)]
    pub groups: Vec<SourceGroup>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineSettings {
    /// How many stories survive the sort
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Pause between source groups, in milliseconds
    #[serde(default = "default_source_delay_ms")]
    pub source_delay_ms: u64,
    /// Pause between enrichment calls, in milliseconds
    #[serde(default = "default_enrich_delay_ms")]
    pub enrich_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,
}

fn default_max_items() -> usize {
    10
}

fn default_source_delay_ms() -> u64 {
    200
}

fn default_enrich_delay_ms() -> u64 {
    150
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_output_path() -> PathBuf {
    PathBuf::from("data/news.json")
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            source_delay_ms: default_source_delay_ms(),
            enrich_delay_ms: default_enrich_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            output_path: default_output_path(),
        }
    }
}

impl PipelineSettings {
    pub fn source_delay(&self) -> Duration {
        Duration::from_millis(self.source_delay_ms)
    }

    pub fn enrich_delay(&self) -> Duration {
        Duration::from_millis(self.enrich_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TranslationSettings {
    #[serde(default = "default_language_pair")]
    pub language_pair: String,
    #[serde(default = "default_mymemory_url")]
    pub mymemory_url: String,
    #[serde(default = "default_openai_url")]
    pub openai_url: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Name of the environment variable holding the generation API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_language_pair() -> String {
    "en|he".to_string()
}

fn default_mymemory_url() -> String {
    "https://api.mymemory.translated.net".to_string()
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl Default for TranslationSettings {
    fn default() -> Self {
        Self {
            language_pair: default_language_pair(),
            mymemory_url: default_mymemory_url(),
            openai_url: default_openai_url(),
            openai_model: default_openai_model(),
            api_key_env: default_api_key_env(),
        }
    }
}

impl TranslationSettings {
    /// The generation API key, if the configured variable is set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    Rss,
    HackerNews,
    Telegram,
    NewsApi,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceGroup {
    pub kind: SourceType,
    /// Lower sorts first. Defaults to the kind's built-in rank.
    #[serde(default)]
    pub priority: Option<u32>,
    pub icon: String,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl SourceGroup {
    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or_else(|| self.kind.default_priority())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SourceConfig {
    pub name: String,
    pub fetcher: FetcherKind,
    pub url: String,
    #[serde(default)]
    pub favicon: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        anyhow::ensure!(
            config.pipeline.max_items > 0,
            "pipeline.max_items must be at least 1"
        );
        Ok(config)
    }

    pub fn registry(&self) -> SourceRegistry {
        SourceRegistry::new(self.groups.clone())
    }
}

/// Read-only view of the configured sources, ordered by fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRegistry {
    groups: Vec<SourceGroup>,
}

impl SourceRegistry {
    pub fn new(mut groups: Vec<SourceGroup>) -> Self {
        groups.sort_by_key(|group| group.kind);
        Self { groups }
    }

    pub fn groups(&self) -> &[SourceGroup] {
        &self.groups
    }

    /// Priority rank for a source type. Types without a group sort last.
    pub fn priority(&self, kind: SourceType) -> u32 {
        self.groups
            .iter()
            .find(|group| group.kind == kind)
            .map(SourceGroup::priority)
            .unwrap_or(u32::MAX)
    }

    pub fn source_names(&self) -> BTreeMap<SourceType, Vec<String>> {
        let mut names: BTreeMap<SourceType, Vec<String>> = BTreeMap::new();
        for group in &self.groups {
            names
                .entry(group.kind)
                .or_default()
                .extend(group.sources.iter().map(|source| source.name.clone()));
        }
        names
    }
}
