use std::cmp::Reverse;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::config::{Config, PipelineSettings, SourceRegistry};
use crate::enrich::Enricher;
use crate::fetcher::{build_fetchers, fetch_or_empty, http_client, SourceFetcher};
use crate::model::{NewsItem, RawStory};
use crate::translate::{Generator, MyMemoryTranslator, OpenAiClient, Translator};

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every source came back empty.
    #[error("No stories found")]
    NoData,
}

/// Sort stories by source priority, then newest first, and keep the top `max`.
pub fn rank(mut stories: Vec<RawStory>, registry: &SourceRegistry, max: usize) -> Vec<RawStory> {
    stories.sort_by_key(|story| (registry.priority(story.source_type), Reverse(story.published_at)));
    stories.truncate(max);
    stories
}

pub struct Aggregator {
    registry: Arc<SourceRegistry>,
    fetchers: Vec<Box<dyn SourceFetcher>>,
    enricher: Enricher,
    settings: PipelineSettings,
}

impl Aggregator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        fetchers: Vec<Box<dyn SourceFetcher>>,
        enricher: Enricher,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            registry,
            fetchers,
            enricher,
            settings,
        }
    }

    /// Wire up fetchers and text services from configuration.
    ///
    /// With a generation API key in the environment the OpenAI compatible
    /// client handles translation and display text; otherwise titles go
    /// through MyMemory and everything else is canned.
    pub fn from_config(config: &Config, registry: Arc<SourceRegistry>) -> anyhow::Result<Self> {
        let client = http_client(config.pipeline.request_timeout())?;
        let fetchers = build_fetchers(&registry, &client);
        let translation = &config.translation;

        let enricher = match translation.api_key() {
            Some(api_key) => {
                info!("Generation API key found, using {}", translation.openai_url);
                let service = Arc::new(OpenAiClient::new(
                    client,
                    &translation.openai_url,
                    &translation.openai_model,
                    api_key,
                ));
                let translator: Arc<dyn Translator> = service.clone();
                let generator: Arc<dyn Generator> = service;
                Enricher::new(Some(translator), Some(generator))
            }
            None => {
                info!("No generation API key, using canned display text");
                let translator: Arc<dyn Translator> = Arc::new(MyMemoryTranslator::new(
                    client,
                    &translation.mymemory_url,
                    &translation.language_pair,
                ));
                Enricher::new(Some(translator), None)
            }
        };

        Ok(Self::new(registry, fetchers, enricher, config.pipeline.clone()))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Run every fetcher in order, pausing whenever the source type changes.
    pub async fn collect(&self) -> Vec<RawStory> {
        let mut all_stories = Vec::new();
        let mut previous_type = None;

        for fetcher in &self.fetchers {
            let source_type = fetcher.meta().source_type;
            if previous_type.is_some_and(|previous| previous != source_type) {
                tokio::time::sleep(self.settings.source_delay()).await;
            }
            previous_type = Some(source_type);

            all_stories.extend(fetch_or_empty(fetcher.as_ref()).await);
        }

        info!("Total stories collected: {}", all_stories.len());
        all_stories
    }

    /// Fetch, rank and enrich. Fails only when no source produced anything.
    pub async fn run(&self) -> Result<Vec<NewsItem>, PipelineError> {
        let stories = self.collect().await;
        if stories.is_empty() {
            return Err(PipelineError::NoData);
        }

        let selected = rank(stories, &self.registry, self.settings.max_items);
        let now = Utc::now();
        let count = selected.len();

        let mut news = Vec::with_capacity(count);
        for (index, story) in selected.into_iter().enumerate() {
            info!("[{}/{}] Enriching '{}'", index + 1, count, story.title);
            news.push(self.enricher.enrich(story, now).await);
            if index + 1 < count {
                tokio::time::sleep(self.settings.enrich_delay()).await;
            }
        }

        Ok(news)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceGroup;
    use crate::fetcher::SourceMeta;
    use crate::model::SourceType;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone};
    use std::sync::Mutex;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap()
    }

    fn story(id: &str, source_type: SourceType, hours_old: i64) -> RawStory {
        RawStory {
            id: id.to_string(),
            title: format!("AI story {}", id),
            url: format!("https://example.com/{}", id),
            published_at: base_time() - Duration::hours(hours_old),
            source_name: "Test".to_string(),
            source_type,
            source_icon: "icon".to_string(),
            favicon: String::new(),
            is_hebrew: false,
            is_verified: source_type == SourceType::Official,
            description: None,
            score: None,
        }
    }

    fn registry() -> SourceRegistry {
        let groups = SourceType::ALL
            .iter()
            .map(|kind| SourceGroup {
                kind: *kind,
                priority: None,
                icon: "icon".to_string(),
                sources: vec![],
            })
            .collect();
        SourceRegistry::new(groups)
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            source_delay_ms: 0,
            enrich_delay_ms: 0,
            ..PipelineSettings::default()
        }
    }

    /// Returns canned stories, or an error, and records that it ran.
    struct StubFetcher {
        meta: SourceMeta,
        stories: Option<Vec<RawStory>>,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl StubFetcher {
        fn boxed(
            name: &str,
            source_type: SourceType,
            stories: Option<Vec<RawStory>>,
            calls: &Arc<Mutex<Vec<String>>>,
        ) -> Box<dyn SourceFetcher> {
            Box::new(Self {
                meta: SourceMeta {
                    name: name.to_string(),
                    source_type,
                    icon: "icon".to_string(),
                    favicon: String::new(),
                    url: "https://example.com".to_string(),
                },
                stories,
                calls: calls.clone(),
            })
        }
    }

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        fn meta(&self) -> &SourceMeta {
            &self.meta
        }

        async fn fetch(&self) -> anyhow::Result<Vec<RawStory>> {
            self.calls.lock().unwrap().push(self.meta.name.clone());
            self.stories
                .clone()
                .ok_or_else(|| anyhow::anyhow!("upstream unavailable"))
        }
    }

    mod rank_tests {
        use super::*;

        #[test]
        fn test_official_first_regardless_of_time() {
            let stories = vec![
                story("community", SourceType::Community, 0),
                story("official", SourceType::Official, 48),
                story("tech", SourceType::Tech, 1),
            ];

            let ranked = rank(stories, &registry(), 10);
            let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();

            assert_eq!(ids, vec!["official", "tech", "community"]);
        }

        #[test]
        fn test_newest_first_within_priority() {
            let stories = vec![
                story("old", SourceType::Tech, 10),
                story("new", SourceType::Tech, 1),
                story("mid", SourceType::Tech, 5),
            ];

            let ranked = rank(stories, &registry(), 10);
            let ids: Vec<&str> = ranked.iter().map(|s| s.id.as_str()).collect();

            assert_eq!(ids, vec!["new", "mid", "old"]);
        }

        #[test]
        fn test_ties_keep_input_order() {
            let stories = vec![
                story("first", SourceType::Local, 2),
                story("second", SourceType::Local, 2),
            ];

            let ranked = rank(stories, &registry(), 10);
            assert_eq!(ranked[0].id, "first");
            assert_eq!(ranked[1].id, "second");
        }

        #[test]
        fn test_unconfigured_type_sorts_last() {
            let registry = SourceRegistry::new(vec![SourceGroup {
                kind: SourceType::Community,
                priority: None,
                icon: "community".to_string(),
                sources: vec![],
            }]);
            let stories = vec![
                story("research", SourceType::Research, 0),
                story("community", SourceType::Community, 10),
            ];

            let ranked = rank(stories, &registry, 10);
            assert_eq!(ranked[0].id, "community");
        }

        #[test]
        fn test_truncation_keeps_sorted_prefix() {
            let stories: Vec<RawStory> = (0..25)
                .map(|i| {
                    let source_type = SourceType::ALL[i % SourceType::ALL.len()];
                    story(&format!("s{}", i), source_type, i as i64)
                })
                .collect();

            let full = rank(stories.clone(), &registry(), usize::MAX);
            let top = rank(stories, &registry(), 10);

            assert_eq!(top.len(), 10);
            assert_eq!(top, full[..10].to_vec());
        }

        #[test]
        fn test_fewer_than_max() {
            let ranked = rank(vec![story("only", SourceType::Tech, 0)], &registry(), 10);
            assert_eq!(ranked.len(), 1);
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_all_sources_failing_is_no_data() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fetchers = vec![
                StubFetcher::boxed("a", SourceType::Official, None, &calls),
                StubFetcher::boxed("b", SourceType::Community, None, &calls),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), settings());

            let result = aggregator.run().await;

            assert!(matches!(result, Err(PipelineError::NoData)));
            assert_eq!(calls.lock().unwrap().len(), 2);
        }

        #[tokio::test]
        async fn test_all_sources_empty_is_no_data() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fetchers = vec![StubFetcher::boxed("a", SourceType::Tech, Some(vec![]), &calls)];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), settings());

            assert!(matches!(aggregator.run().await, Err(PipelineError::NoData)));
        }

        #[tokio::test]
        async fn test_failing_source_does_not_stop_others() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fetchers = vec![
                StubFetcher::boxed("official", SourceType::Official, None, &calls),
                StubFetcher::boxed(
                    "tech",
                    SourceType::Tech,
                    Some(vec![story("t1", SourceType::Tech, 1)]),
                    &calls,
                ),
                StubFetcher::boxed(
                    "community",
                    SourceType::Community,
                    Some(vec![story("c1", SourceType::Community, 0)]),
                    &calls,
                ),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), settings());

            let news = aggregator.run().await.unwrap();

            assert_eq!(*calls.lock().unwrap(), vec!["official", "tech", "community"]);
            assert_eq!(news.len(), 2);
            assert_eq!(news[0].story_id, "t1");
            assert_eq!(news[1].story_id, "c1");
        }

        #[tokio::test]
        async fn test_output_is_truncated_and_enriched() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let many: Vec<RawStory> = (0..15)
                .map(|i| story(&format!("c{}", i), SourceType::Community, i))
                .collect();
            let fetchers = vec![
                StubFetcher::boxed("community", SourceType::Community, Some(many), &calls),
                StubFetcher::boxed(
                    "official",
                    SourceType::Official,
                    Some(vec![story("o1", SourceType::Official, 100)]),
                    &calls,
                ),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), settings());

            let news = aggregator.run().await.unwrap();

            assert_eq!(news.len(), 10);
            assert_eq!(news[0].story_id, "o1");
            assert!(news[0].is_verified);
            assert_eq!(news[1].story_id, "c0");
            for item in &news {
                assert!(!item.headline.is_empty());
                assert!(!item.summary.is_empty());
                assert!(item.summary_bullets.iter().all(|b| !b.is_empty()));
            }
        }

        #[tokio::test]
        async fn test_hung_source_does_not_block_others() {
            use crate::fetcher::{http_client, RssFetcher};
            use std::time::Duration as StdDuration;
            use wiremock::matchers::{method, path};
            use wiremock::{Mock, MockServer, ResponseTemplate};

            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/official.xml"))
                .respond_with(ResponseTemplate::new(200).set_delay(StdDuration::from_secs(5)))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/tech.xml"))
                .respond_with(ResponseTemplate::new(200).set_body_string(
                    "<rss><channel><item><title>Nvidia ships a new GPU</title>\
                     <link>https://example.com/gpu</link></item></channel></rss>",
                ))
                .mount(&server)
                .await;

            let client = http_client(StdDuration::from_millis(300)).unwrap();
            let feed = |name: &str, source_type: SourceType, file: &str| -> Box<dyn SourceFetcher> {
                Box::new(RssFetcher::new(
                    client.clone(),
                    SourceMeta {
                        name: name.to_string(),
                        source_type,
                        icon: "icon".to_string(),
                        favicon: String::new(),
                        url: format!("{}/{}", server.uri(), file),
                    },
                ))
            };
            let fetchers = vec![
                feed("Slow Blog", SourceType::Official, "official.xml"),
                feed("Tech Feed", SourceType::Tech, "tech.xml"),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), settings());

            let started = std::time::Instant::now();
            let news = aggregator.run().await.unwrap();

            assert!(started.elapsed() < StdDuration::from_secs(3));
            assert_eq!(news.len(), 1);
            assert_eq!(news[0].source, "Tech Feed");
        }
    }

    mod pacing_tests {
        use super::*;

        fn paced(delay_ms: u64) -> PipelineSettings {
            PipelineSettings {
                source_delay_ms: delay_ms,
                enrich_delay_ms: 0,
                ..PipelineSettings::default()
            }
        }

        #[tokio::test(start_paused = true)]
        async fn test_pause_only_between_source_types() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fetchers = vec![
                StubFetcher::boxed("openai", SourceType::Official, Some(vec![]), &calls),
                StubFetcher::boxed("nvidia", SourceType::Official, Some(vec![]), &calls),
                StubFetcher::boxed("telegram", SourceType::Local, Some(vec![]), &calls),
                StubFetcher::boxed("ai-news", SourceType::Tech, None, &calls),
                StubFetcher::boxed("newsapi", SourceType::Tech, Some(vec![]), &calls),
                StubFetcher::boxed("hn", SourceType::Community, Some(vec![]), &calls),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), paced(200));

            let started = tokio::time::Instant::now();
            let stories = aggregator.collect().await;

            // official -> local -> tech -> community
            let elapsed = started.elapsed();
            assert!(elapsed >= std::time::Duration::from_millis(600), "{:?}", elapsed);
            assert!(elapsed < std::time::Duration::from_millis(800), "{:?}", elapsed);
            assert!(stories.is_empty());
            assert_eq!(calls.lock().unwrap().len(), 6);
        }

        #[tokio::test(start_paused = true)]
        async fn test_single_source_type_never_pauses() {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let fetchers = vec![
                StubFetcher::boxed("a", SourceType::Tech, Some(vec![story("t1", SourceType::Tech, 0)]), &calls),
                StubFetcher::boxed("b", SourceType::Tech, Some(vec![story("t2", SourceType::Tech, 1)]), &calls),
            ];
            let aggregator = Aggregator::new(Arc::new(registry()), fetchers, Enricher::default(), paced(200));

            let started = tokio::time::Instant::now();
            let stories = aggregator.collect().await;

            assert_eq!(started.elapsed(), std::time::Duration::ZERO);
            assert_eq!(stories.len(), 2);
        }
    }
}
