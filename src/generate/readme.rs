use std::sync::Arc;

use tracing::info;

use crate::errors::CompletionError;
use crate::llm::{ApiFormat, Completer};

/// Build the README prompt. The update variant adds a "Recent Updates"
/// section and asks the description to reflect the earlier version.
pub fn build_readme_prompt(brief: &str, project: &str, is_update: bool) -> String {
    if is_update {
        format!(
            r#"Update the README.md for this GitHub repository with new features.

PROJECT: {project}
NEW FEATURES/UPDATES: {brief}

Create a comprehensive README that includes:
1. Project Title and Description (updated)
2. Features (include new features)
3. Recent Updates section
4. Setup Instructions
5. Usage (updated if needed)
6. Code Explanation (brief)
7. License (MIT)

Make it clear that this is an updated version with new capabilities."#
        )
    } else {
        format!(
            r#"Create a professional README.md for this GitHub repository.

PROJECT: {project}
DESCRIPTION: {brief}

Include these sections:
1. Project Title and Description
2. Features
3. Setup Instructions
4. Usage
5. Code Explanation (brief)
6. License (MIT)

Make it clear, professional, and helpful."#
        )
    }
}

/// Generates the `README.md` body for a task.
pub struct ReadmeGenerator {
    completer: Arc<dyn Completer>,
    model: String,
    format: ApiFormat,
}

impl ReadmeGenerator {
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

    pub async fn generate(
        &self,
        brief: &str,
        project: &str,
        is_update: bool,
    ) -> Result<String, CompletionError> {
        let prompt = build_readme_prompt(brief, project, is_update);
        let text = self
            .completer
            .complete(&prompt, &self.model, self.format)
            .await?;
        let readme = text.trim().to_string();
        info!(bytes = readme.len(), is_update, "Generated README");
        Ok(readme)
    }
}
