//! Collision-free repository names for round 1.
//!
//! Candidates, in order:
//! 1. `{sanitized}{suffix}`
//! 2. `{sanitized}{suffix}-{YYYYmmdd-HHMMSS}`
//! 3. `{task_id}{suffix}-v{i}` for `i = 1..=max_attempts`
//! 4. `{task_id}{suffix}-{timestamp}-{rand 1000..=9999}`, returned unchecked
//!
//! Candidates 3 and 4 are built from the raw task id, not the sanitized one.
//! Any lookup outcome other than "not found" counts as taken.

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use super::client::HostingApi;
use crate::util::sanitize_task_id;

/// `true` only when the provider reports the name as not found.
pub async fn is_name_free(api: &dyn HostingApi, name: &str) -> bool {
    match api.get_repo(name).await {
        Ok(None) => true,
        Ok(Some(_)) => false,
        Err(e) => {
            warn!(name, "Could not check repository name, treating it as taken: {}", e);
            false
        }
    }
}

/// Resolve a free repository name for `task_id`.
pub async fn resolve_unique_name(
    api: &dyn HostingApi,
    task_id: &str,
    suffix: &str,
    max_attempts: u32,
) -> String {
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    let random_suffix = rand::thread_rng().gen_range(1000..=9999);
    resolve_with(api, task_id, suffix, max_attempts, &timestamp, random_suffix).await
}

pub(crate) async fn resolve_with(
    api: &dyn HostingApi,
    task_id: &str,
    suffix: &str,
    max_attempts: u32,
    timestamp: &str,
    random_suffix: u32,
) -> String {
    let base_name = format!("{}{}", sanitize_task_id(task_id), suffix);
    if is_name_free(api, &base_name).await {
        return base_name;
    }
    warn!(name = %base_name, "Repository already exists, generating unique name");

    let timestamped = format!("{}-{}", base_name, timestamp);
    if is_name_free(api, &timestamped).await {
        info!(name = %timestamped, "Using unique name");
        return timestamped;
    }
    warn!(name = %timestamped, "Timestamped name also exists, trying counters");

    let counter_base = format!("{}{}", task_id, suffix);
    for i in 1..=max_attempts {
        let candidate = format!("{}-v{}", counter_base, i);
        if is_name_free(api, &candidate).await {
            info!(name = %candidate, "Using unique name");
            return candidate;
        }
    }

    let fallback = format!("{}-{}-{}", counter_base, timestamp, random_suffix);
    info!(name = %fallback, "Using unique name with random suffix");
    fallback
}
