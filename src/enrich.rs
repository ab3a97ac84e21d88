use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use tracing::warn;

use crate::classify::detect_category;
use crate::model::{Category, NewsItem, RawStory, SourceType};
use crate::translate::{Generator, Translator};

/// Prefix for titles that could not be translated
pub const UNTRANSLATED_MARKER: &str = "🌐";

const LOCAL_HEADLINE: &str = "עדכון מקומי מקהילת AI בישראל";
const FALLBACK_SUMMARY: &str = "חדשות חמות מעולם הבינה המלאכותית. לפרטים המלאים, בקרו בקישור המקורי.";

fn headline_pool(category: Category) -> &'static [&'static str] {
    match category {
        Category::Product => &[
            "השקה חדשה שתשנה את התעשייה",
            "מוצר חדש מבטיח לחולל מהפכה",
            "עדכון משמעותי שכדאי להכיר",
        ],
        Category::Funding => &[
            "השקעה ענקית מעידה על פוטנציאל",
            "גיוס הון משמעותי בתעשיית ה-AI",
            "משקיעים מאמינים בטכנולוגיה",
        ],
        Category::Hardware => &[
            "חומרה חדשה תאיץ את עולם ה-AI",
            "שבב חדש מבטיח ביצועים מרשימים",
            "פריצת דרך בתחום החומרה",
        ],
        Category::Research => &[
            "מחקר חדש חושף תובנות מרתקות",
            "התקדמות משמעותית בתחום",
            "פיתוח חדש פותח אפשרויות",
        ],
        Category::Markets => &["תזוזות בשוק ה-AI", "השפעה על שוק ההון", "מגמות חדשות בשוק"],
    }
}

/// A random canned headline for the category.
pub fn canned_headline(category: Category) -> &'static str {
    headline_pool(category)
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(LOCAL_HEADLINE)
}

pub fn canned_bullets(source_type: SourceType) -> [String; 3] {
    let bullets: [&str; 3] = match source_type {
        SourceType::Official => [
            "הודעה רשמית מחברת הטכנולוגיה המובילה",
            "צפי להשפעה משמעותית על השוק",
            "פרטים מלאים בקישור המקורי",
        ],
        SourceType::Tech => [
            "סיקור מקיף מאתר טכנולוגיה מוביל",
            "ניתוח השלכות על התעשייה",
            "המשך מעקב אחר ההתפתחויות",
        ],
        SourceType::Research => [
            "מחקר חדש בתחום הבינה המלאכותית",
            "תרומה לקידום הידע בתחום",
            "פוטנציאל ליישומים עתידיים",
        ],
        SourceType::Community => [
            "נושא שמסעיר את קהילת הטכנולוגיה",
            "דיון ער בקרב מפתחים ומומחים",
            "שווה לעקוב אחר התגובות",
        ],
        SourceType::Local => [
            "עדכון חדש מקהילת ה-AI הישראלית",
            "מידע רלוונטי לשוק המקומי",
            "לפרטים נוספים בקישור המקורי",
        ],
    };
    bullets.map(str::to_string)
}

/// Relative Hebrew label for how long ago `published` was.
pub fn time_ago_label(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - published).num_hours();
    let days = hours / 24;

    if hours < 1 {
        "לפני פחות משעה".to_string()
    } else if hours == 1 {
        "לפני שעה".to_string()
    } else if hours < 24 {
        format!("לפני {} שעות", hours)
    } else if days == 1 {
        "לפני יום".to_string()
    } else {
        format!("לפני {} ימים", days)
    }
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Display text for a story: translated title, headline, summary, bullets.
struct DisplayText {
    title: String,
    original_title: Option<String>,
    headline: String,
    summary: String,
    bullets: [String; 3],
}

/// Adds display text to raw stories.
///
/// Enrichment never fails: every external call has a canned fallback.
#[derive(Clone, Default)]
pub struct Enricher {
    translator: Option<Arc<dyn Translator>>,
    generator: Option<Arc<dyn Generator>>,
}

impl Enricher {
    pub fn new(translator: Option<Arc<dyn Translator>>, generator: Option<Arc<dyn Generator>>) -> Self {
        Self {
            translator,
            generator,
        }
    }

    pub async fn enrich(&self, story: RawStory, now: DateTime<Utc>) -> NewsItem {
        let category = detect_category(&story.title, story.description.as_deref().unwrap_or(""));

        let display = if story.is_hebrew {
            DisplayText {
                title: story.title.clone(),
                original_title: None,
                headline: LOCAL_HEADLINE.to_string(),
                summary: story.title.clone(),
                bullets: canned_bullets(SourceType::Local),
            }
        } else {
            self.display_text(&story, category).await
        };

        NewsItem {
            story_id: story.id,
            title: display.title,
            original_title: display.original_title,
            headline: display.headline,
            summary: display.summary,
            summary_bullets: display.bullets,
            category,
            category_label: category.label().to_string(),
            source: story.source_name,
            source_url: story.url,
            source_type: story.source_type,
            source_type_label: story.source_type.label().to_string(),
            source_icon: story.source_icon,
            favicon: story.favicon,
            published_at: story.published_at,
            time_ago: time_ago_label(story.published_at, now),
            is_verified: story.is_verified,
            is_hebrew: story.is_hebrew,
            description: story.description,
            score: story.score,
        }
    }

    async fn display_text(&self, story: &RawStory, category: Category) -> DisplayText {
        let translated = self.translate(&story.title).await;
        let headline = self
            .generated_headline(&story.title)
            .await
            .unwrap_or_else(|| canned_headline(category).to_string());

        let summary = match self.generated_summary(&story.title).await {
            Some(summary) => summary,
            None => match &translated {
                Some(title) => format!("{}. {}", title, headline),
                None => FALLBACK_SUMMARY.to_string(),
            },
        };

        let bullets = self
            .generated_bullets(&story.title)
            .await
            .unwrap_or_else(|| canned_bullets(story.source_type));

        let title = translated
            .unwrap_or_else(|| format!("{} {}", UNTRANSLATED_MARKER, story.title));

        DisplayText {
            title,
            original_title: Some(story.title.clone()),
            headline,
            summary,
            bullets,
        }
    }

    async fn translate(&self, text: &str) -> Option<String> {
        let translator = self.translator.as_ref()?;
        match translator.translate(text).await {
            Ok(translated) => non_empty(translated),
            Err(e) => {
                warn!("Translation failed, keeping original title: {:#}", e);
                None
            }
        }
    }

    async fn generated_headline(&self, title: &str) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator.headline(title).await {
            Ok(headline) => non_empty(headline),
            Err(e) => {
                warn!("Headline generation failed: {:#}", e);
                None
            }
        }
    }

    async fn generated_summary(&self, title: &str) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator.summary(title).await {
            Ok(summary) => non_empty(summary),
            Err(e) => {
                warn!("Summary generation failed: {:#}", e);
                None
            }
        }
    }

    /// Generated bullets, only if there are exactly three non-empty ones.
    async fn generated_bullets(&self, title: &str) -> Option<[String; 3]> {
        let generator = self.generator.as_ref()?;
        let bullets = match generator.bullets(title).await {
            Ok(bullets) => bullets,
            Err(e) => {
                warn!("Bullet generation failed: {:#}", e);
                return None;
            }
        };

        let bullets: Vec<String> = bullets.into_iter().filter_map(non_empty).collect();
        match <[String; 3]>::try_from(bullets) {
            Ok(bullets) => Some(bullets),
            Err(bullets) => {
                warn!("Expected 3 bullets, got {}; using canned bullets", bullets.len());
                None
            }
        }
    }
}
