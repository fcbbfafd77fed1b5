//! Shared utility functions for the launchpad crate.

use std::time::Duration;

use async_trait::async_trait;

/// Normalize a task identifier into a repository-name-safe slug.
///
/// Every character outside `[A-Za-z0-9-]` becomes `-`, runs of `-` collapse,
/// leading and trailing `-` are dropped, and the result is lower-cased.
pub fn sanitize_task_id(task_id: &str) -> String {
    task_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

/// Pull the body out of a fenced code block, if the text has one.
///
/// A fence tagged `html` wins over any other fence. For an untagged (or
/// differently tagged) fence, a one-word info string on the opening line is
/// dropped. A one-word first line of real content, such as `hello`, is
/// indistinguishable from a tag and is dropped too. Text without fences is
/// returned as-is. The result is trimmed.
pub fn strip_code_fences(text: &str) -> String {
    const HTML_FENCE: &str = "```html";
    const FENCE: &str = "```";

    let lowered = text.to_ascii_lowercase();
    let inner = if let Some(idx) = lowered.find(HTML_FENCE) {
        let rest = &text[idx + HTML_FENCE.len()..];
        rest.split(FENCE).next().unwrap_or(rest)
    } else if let Some(idx) = text.find(FENCE) {
        let rest = &text[idx + FENCE.len()..];
        drop_info_string(rest.split(FENCE).next().unwrap_or(rest))
    } else {
        text
    };
    inner.trim().to_string()
}

fn drop_info_string(block: &str) -> &str {
    match block.split_once('\n') {
        Some((first, rest))
            if !first.trim().is_empty()
                && first
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '_')) =>
        {
            rest
        }
        _ => block,
    }
}

/// Abstraction over waiting, so retry and poll loops can be tested without
/// real delays. Real implementation: `TokioSleeper`.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Test double that records every requested sleep and returns immediately.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSleeper {
    calls: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(test)]
impl RecordingSleeper {
    pub(crate) fn calls(&self) -> Vec<Duration> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.lock().unwrap().push(duration);
    }
}
