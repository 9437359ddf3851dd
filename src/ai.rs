pub mod common;
pub mod config;
pub mod lm;
pub mod prompts;

pub use config::LmConfig;
pub use lm::{rewrite_text, LmError, RewriteMode};
