//! Keyword classification of story text.
//!
//! Everything here is plain case-insensitive substring matching. There is no
//! tokenisation, so short keywords like `ai` also match inside longer words.

use crate::model::Category;

pub const AI_KEYWORDS: &[&str] = &[
    "ai",
    "artificial intelligence",
    "machine learning",
    "neural",
    "gpt",
    "openai",
    "anthropic",
    "claude",
    "nvidia",
    "llm",
    "chatgpt",
    "gemini",
    "deepmind",
    "transformer",
    "diffusion",
    "midjourney",
    "hugging face",
    "meta ai",
    "copilot",
    "llama",
    "mistral",
    "groq",
    "perplexity",
];

/// Keyword groups in tie-break order. Text matching none of them is research.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Funding,
        &["funding", "raises", "investment", "valuation", "billion", "million"],
    ),
    (
        Category::Hardware,
        &["chip", "gpu", "hardware", "processor", "server"],
    ),
    (
        Category::Product,
        &["launch", "release", "announce", "new feature", "update", "available"],
    ),
    (
        Category::Markets,
        &["stock", "market", "ipo", "shares", "trading"],
    ),
];

pub fn is_ai_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    AI_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

pub fn detect_category(title: &str, content: &str) -> Category {
    let text = format!("{} {}", title, content).to_lowercase();

    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|keyword| text.contains(keyword)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Research)
}
