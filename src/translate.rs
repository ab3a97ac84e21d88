//! External text services: translation and display-text generation.
//!
//! Two providers are supported. [`MyMemoryTranslator`] needs no credentials
//! and only translates. [`OpenAiClient`] talks to an OpenAI compatible
//! chat-completions endpoint and can both translate and write headlines,
//! summaries and bullets. Every call may fail; callers fall back to canned text.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const BRAND_NAMES: &[&str] = &[
    "OpenAI",
    "Anthropic",
    "NVIDIA",
    "Google",
    "Microsoft",
    "Meta",
    "Apple",
    "Claude",
    "GPT",
    "ChatGPT",
    "Gemini",
    "Copilot",
    "Llama",
    "Mistral",
    "DeepMind",
    "Hugging Face",
    "TensorFlow",
    "PyTorch",
    "CUDA",
    "GeForce",
    "RTX",
    "DGX",
    "Omniverse",
    "DALL-E",
    "Sora",
    "Midjourney",
    "Perplexity",
    "Groq",
    "xAI",
    "Grok",
    "AWS",
    "Azure",
    "Stability AI",
];

static BRAND_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    BRAND_NAMES
        .iter()
        .map(|brand| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(brand))).unwrap())
        .collect()
});

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Text with brand names swapped for placeholder tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectedText {
    pub text: String,
    replacements: Vec<(String, &'static str)>,
}

impl ProtectedText {
    /// Replace known brand names with `XBRAND<n>X` tokens.
    pub fn protect(text: &str) -> Self {
        let mut processed = text.to_string();
        let mut replacements = Vec::new();

        for (index, (brand, pattern)) in BRAND_NAMES.iter().zip(BRAND_PATTERNS.iter()).enumerate() {
            if pattern.is_match(&processed) {
                let placeholder = format!("XBRAND{}X", index);
                processed = pattern.replace_all(&processed, placeholder.as_str()).into_owned();
                replacements.push((placeholder, *brand));
            }
        }

        Self {
            text: processed,
            replacements,
        }
    }

    /// Put the brand names back into a translated string.
    pub fn restore(&self, translated: &str) -> String {
        let mut restored = translated.to_string();

        for (placeholder, brand) in &self.replacements {
            let pattern = Regex::new(&format!(r"(?i)\s*{}\s*", regex::escape(placeholder)));
            if let Ok(pattern) = pattern {
                let replacement = format!(" {} ", brand);
                restored = pattern.replace_all(&restored, regex::NoExpand(&replacement)).into_owned();
            }
        }

        WHITESPACE_RE.replace_all(&restored, " ").trim().to_string()
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> anyhow::Result<String>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn headline(&self, title: &str) -> anyhow::Result<String>;

    async fn summary(&self, title: &str) -> anyhow::Result<String>;

    async fn bullets(&self, title: &str) -> anyhow::Result<Vec<String>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryResponse {
    response_status: Value,
    response_data: Option<MyMemoryData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MyMemoryData {
    translated_text: Option<String>,
}

/// Free MyMemory translation API, with brand-name protection.
pub struct MyMemoryTranslator {
    client: Client,
    base_url: String,
    language_pair: String,
}

impl MyMemoryTranslator {
    pub fn new(client: Client, base_url: &str, language_pair: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language_pair: language_pair.to_string(),
        }
    }
}

fn status_is_ok(status: &Value) -> bool {
    match status {
        Value::Number(n) => n.as_u64() == Some(200),
        Value::String(s) => s.trim() == "200",
        _ => false,
    }
}

#[async_trait]
impl Translator for MyMemoryTranslator {
    async fn translate(&self, text: &str) -> anyhow::Result<String> {
        if text.trim().chars().count() < 3 {
            anyhow::bail!("text too short to translate");
        }

        let protected = ProtectedText::protect(text);
        let url = format!("{}/get", self.base_url);
        let response: MyMemoryResponse = self
            .client
            .get(&url)
            .query(&[("q", protected.text.as_str()), ("langpair", self.language_pair.as_str())])
            .send()
            .await?
            .json()
            .await?;

        if !status_is_ok(&response.response_status) {
            anyhow::bail!("translation service returned status {}", response.response_status);
        }

        let translated = response
            .response_data
            .and_then(|data| data.translated_text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("translation service returned no text"))?;

        if translated.trim_start().starts_with("MYMEMORY WARNING") {
            anyhow::bail!("translation quota exhausted");
        }

        Ok(protected.restore(&translated))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

const TRANSLATE_PROMPT: &str = "You are a professional Hebrew translator specializing in tech news. \
Translate the following English tech news headline to Hebrew. Keep brand names in English. \
Return ONLY the Hebrew translation.";
const HEADLINE_PROMPT: &str = "You are a Hebrew tech journalist. Create a catchy, professional Hebrew \
sub-headline (15-20 words) for this news story. Be engaging but professional. Return ONLY the Hebrew headline.";
const SUMMARY_PROMPT: &str = "You are a Hebrew tech journalist. Write a 2-3 sentence Hebrew summary \
for this AI news headline. Be informative and professional. Return ONLY the Hebrew summary.";
const BULLETS_PROMPT: &str = "You are a Hebrew tech journalist. Create exactly 3 bullet points in Hebrew \
summarizing the key points of this AI news headline. Each bullet should be 10-15 words. \
Return as JSON array of 3 strings.";

/// OpenAI compatible chat-completions client.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(client: Client, base_url: &str, model: &str, api_key: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key,
        }
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
        };

        let response: ChatResponse = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| anyhow::anyhow!("completion returned no content"))?;

        Ok(content)
    }
}

/// Parse a bullet list reply: a JSON array of strings, else one bullet per line.
pub fn parse_bullets(content: &str) -> Vec<String> {
    if let Ok(items) = serde_json::from_str::<Vec<String>>(content) {
        return items.into_iter().map(|item| item.trim().to_string()).collect();
    }

    content
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim().to_string())
        .filter(|line| !line.is_empty())
        .take(3)
        .collect()
}

#[async_trait]
impl Translator for OpenAiClient {
    async fn translate(&self, text: &str) -> anyhow::Result<String> {
        self.complete(TRANSLATE_PROMPT, text, 200).await
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn headline(&self, title: &str) -> anyhow::Result<String> {
        self.complete(HEADLINE_PROMPT, title, 100).await
    }

    async fn summary(&self, title: &str) -> anyhow::Result<String> {
        self.complete(SUMMARY_PROMPT, title, 200).await
    }

    async fn bullets(&self, title: &str) -> anyhow::Result<Vec<String>> {
        let content = self.complete(BULLETS_PROMPT, title, 300).await?;
        Ok(parse_bullets(&content))
    }
}
