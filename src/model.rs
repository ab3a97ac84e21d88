use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Serialize, Serializer};

/// Where a story came from. The variant order is the fetch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Official,
    Local,
    Tech,
    Research,
    Community,
}

impl SourceType {
    pub const ALL: [SourceType; 5] = [
        SourceType::Official,
        SourceType::Local,
        SourceType::Tech,
        SourceType::Research,
        SourceType::Community,
    ];

    /// Built-in priority rank, used when a group does not set its own.
    pub fn default_priority(self) -> u32 {
        match self {
            SourceType::Official => 1,
            SourceType::Local => 2,
            SourceType::Tech => 3,
            SourceType::Research => 4,
            SourceType::Community => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceType::Official => "מקור רשמי",
            SourceType::Local => "עדכון מקומי",
            SourceType::Tech => "חדשות טכנולוגיה",
            SourceType::Research => "מחקר אקדמי",
            SourceType::Community => "קהילה",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Funding,
    Hardware,
    Product,
    Markets,
    Research,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::Funding => "מימון",
            Category::Hardware => "חומרה",
            Category::Product => "מוצר",
            Category::Markets => "שווקים",
            Category::Research => "מחקר",
        }
    }
}

/// A story as returned by a source fetcher, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStory {
    pub id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub source_type: SourceType,
    pub source_icon: String,
    pub favicon: String,
    pub is_hebrew: bool,
    pub is_verified: bool,
    pub description: Option<String>,
    pub score: Option<i64>,
}

/// A story with display text attached.
///
/// The position-dependent fields (`id`, `isBreaking`) are not stored here;
/// they are emitted when a [`NewsSnapshot`] is serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub story_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_title: Option<String>,
    pub headline: String,
    pub summary: String,
    pub summary_bullets: [String; 3],
    pub category: Category,
    pub category_label: String,
    pub source: String,
    pub source_url: String,
    pub source_type: SourceType,
    pub source_type_label: String,
    pub source_icon: String,
    pub favicon: String,
    pub published_at: DateTime<Utc>,
    pub time_ago: String,
    pub is_verified: bool,
    pub is_hebrew: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionedItem<'a> {
    id: usize,
    #[serde(flatten)]
    item: &'a NewsItem,
    is_breaking: bool,
}

fn serialize_news<S: Serializer>(news: &[NewsItem], serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(news.len()))?;
    for (index, item) in news.iter().enumerate() {
        seq.serialize_element(&PositionedItem {
            id: index + 1,
            item,
            is_breaking: index == 0,
        })?;
    }
    seq.end()
}

/// The complete output of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsSnapshot {
    #[serde(serialize_with = "serialize_news")]
    pub news: Vec<NewsItem>,
    /// Carried over from the previous snapshot without interpretation.
    #[serde(default)]
    pub ai_tools: Vec<serde_json::Value>,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub sources: BTreeMap<SourceType, Vec<String>>,
}

impl NewsSnapshot {
    pub fn assemble(
        news: Vec<NewsItem>,
        ai_tools: Vec<serde_json::Value>,
        sources: BTreeMap<SourceType, Vec<String>>,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            news,
            ai_tools,
            last_updated,
            sources,
        }
    }
}
