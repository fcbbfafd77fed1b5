pub mod config;
pub mod errors;
pub mod generate;
pub mod github;
pub mod llm;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod server;
pub mod util;

#[cfg(test)]
mod test_support;
