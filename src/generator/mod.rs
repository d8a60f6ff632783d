//! Content generation: prompt construction, the model seam, and cleanup of the
//! model's reply into a bare markup document.

pub mod gemini;

pub use gemini::GeminiClient;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

const FENCE: &str = "```";

/// A one-shot text completion service.
/// Real implementation: `GeminiClient`. Tests substitute canned replies.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Build the fixed instruction prompt around a brief.
pub fn build_prompt(brief: &str) -> String {
    format!(
        "You are a code generator. \
         Return only a single HTML/JS/CSS code block for the app requested. \
         Do NOT add any explanations, comments, or extra text.\n\n\
         Task brief: {}\nReturn ONLY the code block, nothing else.",
        brief
    )
}

/// Drop a leading fence line and a trailing fence line, then trim.
///
/// Best effort: text without fences comes back trimmed but otherwise
/// unchanged, and fences anywhere else are left alone.
pub fn strip_code_fences(text: &str) -> String {
    let mut body = text.trim();
    if body.starts_with(FENCE) {
        body = body.split_once('\n').map_or("", |(_, rest)| rest);
    }
    let tail = body.trim_end();
    if tail.ends_with(FENCE) {
        body = tail.rsplit_once('\n').map_or("", |(head, _)| head);
    }
    body.trim().to_string()
}

/// Turns a brief into the markup for the site's entry document.
#[derive(Clone)]
pub struct ContentGenerator {
    model: Arc<dyn TextGenerator>,
}

impl ContentGenerator {
    pub fn new(model: Arc<dyn TextGenerator>) -> Self {
        Self { model }
    }

    pub async fn generate_site(&self, brief: &str) -> Result<String> {
        if brief.trim().is_empty() {
            anyhow::bail!("Brief is empty");
        }
        let prompt = build_prompt(brief);
        let reply = self.model.generate(&prompt).await?;
        let markup = strip_code_fences(&reply);
        tracing::debug!(
            reply_chars = reply.chars().count(),
            markup_chars = markup.chars().count(),
            "generation reply cleaned"
        );
        Ok(markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedGenerator {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl TextGenerator for FailingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("quota exceeded")
        }
    }

    #[test]
    fn test_prompt_is_deterministic_and_embeds_brief() {
        let prompt = build_prompt("a countdown timer");
        assert_eq!(prompt, build_prompt("a countdown timer"));
        assert!(prompt.starts_with("You are a code generator."));
        assert!(prompt.contains("Task brief: a countdown timer\n"));
        assert!(prompt.ends_with("Return ONLY the code block, nothing else."));
    }

    #[test]
    fn test_strip_fenced_reply() {
        let reply = "```html\n<!DOCTYPE html>\n<html></html>\n```";
        assert_eq!(strip_code_fences(reply), "<!DOCTYPE html>\n<html></html>");
    }

    #[test]
    fn test_strip_fenced_reply_with_surrounding_whitespace() {
        let reply = "\n  ```html\n<html></html>\n```\n\n";
        assert_eq!(strip_code_fences(reply), "<html></html>");
    }

    #[test]
    fn test_strip_unfenced_reply_only_trims() {
        assert_eq!(strip_code_fences("  <html></html>\n"), "<html></html>");
    }

    #[test]
    fn test_strip_leading_fence_only() {
        assert_eq!(strip_code_fences("```\n<p>hi</p>"), "<p>hi</p>");
    }

    #[test]
    fn test_strip_trailing_fence_only() {
        assert_eq!(strip_code_fences("<p>hi</p>\n```"), "<p>hi</p>");
    }

    #[test]
    fn test_strip_interior_fence_untouched() {
        let reply = "<pre>\n```\ncode\n```\n</pre>";
        assert_eq!(strip_code_fences(reply), reply);
    }

    #[test]
    fn test_strip_bare_fence_yields_empty() {
        assert_eq!(strip_code_fences("```"), "");
    }

    #[tokio::test]
    async fn test_generate_site_sends_prompt_and_cleans_reply() {
        let model = CannedGenerator::new("```html\n<h1>Timer</h1>\n```");
        let generator = ContentGenerator::new(model.clone());
        let markup = generator.generate_site("a countdown timer").await.unwrap();
        assert_eq!(markup, "<h1>Timer</h1>");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("a countdown timer"));
    }

    #[tokio::test]
    async fn test_generate_site_rejects_empty_brief() {
        let model = CannedGenerator::new("<p></p>");
        let generator = ContentGenerator::new(model.clone());
        assert!(generator.generate_site("  ").await.is_err());
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generate_site_propagates_model_failure() {
        let generator = ContentGenerator::new(Arc::new(FailingGenerator));
        let err = generator.generate_site("anything").await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }
}
