//! LLM-backed content generation.
//!
//! - `app` turns a brief, attachments and checks into a single-file HTML app.
//! - `readme` writes the README that accompanies the app.
//!
//! Both go through the `Completer` seam, in the responses format unless
//! `[completion] format` says otherwise.

pub mod app;
pub mod readme;

pub use app::AppGenerator;
pub use readme::ReadmeGenerator;
