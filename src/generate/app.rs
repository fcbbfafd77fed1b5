use std::sync::Arc;

use tracing::{info, warn};

use crate::errors::CompletionError;
use crate::llm::{ApiFormat, Completer};
use crate::models::Attachment;
use crate::util::strip_code_fences;

/// Structural requirements appended to every app prompt.
const APP_REQUIREMENTS: &str = r#"CRITICAL REQUIREMENTS:
1. Create a SINGLE, COMPLETE HTML file with ALL code inline
2. Include ALL JavaScript inline within <script> tags (no external JS files)
3. Include ALL CSS inline within <style> tags (no external CSS files except CDN libraries)
4. You MUST implement EVERY element ID, class, and functionality mentioned in the checks
5. If checks mention specific element IDs (like #total-sales, #markdown-output), you MUST create those exact elements
6. If checks mention loading libraries (Bootstrap, marked.js, highlight.js), you MUST include them via CDN
7. Handle data from attachments by fetching from their URLs (they are data: URLs)
8. Make the app functional, responsive, and professional
9. Add clear comments explaining the code
10. Ensure ALL JavaScript checks will pass when executed

IMPORTANT: The checks are JavaScript expressions that will be run on your page. Make sure your HTML structure and JavaScript logic satisfy ALL of them.

OUTPUT FORMAT:
Return ONLY the complete HTML code. Do not include any explanations, markdown formatting, or code fences. Start with <!DOCTYPE html>."#;

/// Build the prompt for the application artifact.
///
/// Attachment and check sections are only present when non-empty.
pub fn build_app_prompt(brief: &str, attachments: &[Attachment], checks: &[String]) -> String {
    let mut prompt = String::from(
        "You are an expert web developer. Create a single, complete HTML file for a web application.\n\n",
    );
    prompt.push_str("BRIEF:\n");
    prompt.push_str(brief);
    prompt.push('\n');

    if !attachments.is_empty() {
        prompt.push_str("\nATTACHMENTS PROVIDED:\n");
        for (i, att) in attachments.iter().enumerate() {
            prompt.push_str(&format!("{}. {}: {}\n", i + 1, att.name, att.url));
        }
    }

    if !checks.is_empty() {
        prompt.push_str("\nCRITICAL - THESE JAVASCRIPT CHECKS MUST PASS:\n");
        for (i, check) in checks.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", i + 1, check));
        }
    }

    prompt.push('\n');
    prompt.push_str(APP_REQUIREMENTS);
    prompt
}

/// Generates the `index.html` body for a task.
pub struct AppGenerator {
    completer: Arc<dyn Completer>,
    model: String,
    format: ApiFormat,
}

impl AppGenerator {
    pub fn new(completer: Arc<dyn Completer>, model: &str) -> Self {
        Self {
            completer,
            model: model.to_string(),
            format: ApiFormat::default(),
        }
    }

    pub fn with_format(mut self, format: ApiFormat) -> Self {
        self.format = format;
        self
    }

    /// Generate the artifact. The doctype is not validated here; a page that
    /// misses it is an evaluation problem, not a generation error.
    pub async fn generate(
        &self,
        brief: &str,
        attachments: &[Attachment],
        checks: &[String],
    ) -> Result<String, CompletionError> {
        let prompt = build_app_prompt(brief, attachments, checks);
        let raw = self
            .completer
            .complete(&prompt, &self.model, self.format)
            .await?;
        let html = strip_code_fences(&raw);

        if !html.to_ascii_lowercase().starts_with("<!doctype html") {
            warn!("Generated app does not start with a doctype declaration");
        }
        info!(bytes = html.len(), "Generated app code");
        Ok(html)
    }
}
