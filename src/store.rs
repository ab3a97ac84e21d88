use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SourceRegistry;
use crate::model::{NewsItem, NewsSnapshot};

/// The snapshot file: one JSON document, overwritten on every run.
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The `aiTools` list of the previous snapshot.
    ///
    /// A missing, unreadable or oddly shaped file yields an empty list.
    pub async fn load_ai_tools(&self) -> Vec<Value> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read {}, starting fresh: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(mut document) => match document.get_mut("aiTools").map(Value::take) {
                Some(Value::Array(tools)) => tools,
                _ => Vec::new(),
            },
            Err(e) => {
                warn!("Could not parse {}, starting fresh: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// The last complete snapshot, if one can be read.
    pub async fn load(&self) -> Option<NewsSnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Stored snapshot at {} is invalid: {}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, snapshot: &NewsSnapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("writing {}", self.path.display()))?;

        Ok(())
    }

    /// Build a snapshot around fresh news, keeping the stored tool list.
    pub async fn assemble(&self, news: Vec<NewsItem>, registry: &SourceRegistry) -> NewsSnapshot {
        let ai_tools = self.load_ai_tools().await;
        NewsSnapshot::assemble(news, ai_tools, registry.source_names(), Utc::now())
    }

    /// Replace the stored snapshot with fresh news.
    pub async fn update(&self, news: Vec<NewsItem>, registry: &SourceRegistry) -> anyhow::Result<NewsSnapshot> {
        let snapshot = self.assemble(news, registry).await;
        self.save(&snapshot).await?;
        info!(
            "Wrote {} news stories to {}",
            snapshot.news.len(),
            self.path.display()
        );
        Ok(snapshot)
    }
}
