//! GitHub publishing back-end.
//!
//! ## Module Map
//!
//! ```text
//!  pipeline.rs
//!      │
//!      │ Publisher::create_and_publish()     (round 1)
//!      │ Publisher::resolve_and_publish()    (round 2)
//!      v
//!  publish.rs ──> naming.rs   resolve_unique_name()   (create only)
//!      │     ──> lookup.rs   find_round_one()         (update only)
//!      │     ──> pages.rs    enable / ensure Pages, wait_for_deployment()
//!      v
//!  client.rs   HostingApi trait + GitHubClient (REST, reqwest)
//! ```
//!
//! Published layout per repository: `LICENSE`, `README.md`, `index.html`,
//! served from `https://{owner}.github.io/{repo}/`.

pub mod client;
pub mod lookup;
pub mod naming;
pub mod pages;
pub mod publish;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{GitHubClient, HostingApi};
pub use pages::{HttpSiteProbe, SiteProbe};
pub use publish::Publisher;

/// Suffix appended to round 1 repository names.
pub const ROUND_ONE_SUFFIX: &str = "-round1";

pub const LICENSE_PATH: &str = "LICENSE";
pub const README_PATH: &str = "README.md";
pub const INDEX_PATH: &str = "index.html";
