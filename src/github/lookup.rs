use tracing::{debug, info, warn};

use super::ROUND_ONE_SUFFIX;
use super::client::HostingApi;
use crate::errors::PublishError;
use crate::models::Repository;
use crate::util::sanitize_task_id;

/// Find the round 1 repository for `task_id`.
///
/// Every owned repository whose name starts with `{sanitized}-round1` is a
/// candidate (timestamp and counter variants included); the most recently
/// created one wins.
pub async fn find_round_one(
    api: &dyn HostingApi,
    task_id: &str,
) -> Result<Repository, PublishError> {
    let prefix = format!("{}{}", sanitize_task_id(task_id), ROUND_ONE_SUFFIX);
    info!(pattern = %prefix, "Searching for round 1 repository");

    let mut matching: Vec<Repository> = api
        .list_repos()
        .await?
        .into_iter()
        .filter(|r| r.name.starts_with(&prefix))
        .collect();

    for repo in &matching {
        debug!(name = %repo.name, created_at = %repo.created_at, "Found candidate");
    }

    if matching.is_empty() {
        return Err(PublishError::RoundOneNotFound { pattern: prefix });
    }

    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let selected = matching.remove(0);

    if !matching.is_empty() {
        warn!(
            candidates = matching.len() + 1,
            selected = %selected.name,
            "Multiple round 1 repositories found, using the most recent"
        );
    } else {
        info!(name = %selected.name, "Found round 1 repository");
    }

    Ok(selected)
}
