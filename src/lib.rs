//! Curriculum Hub - weekly learning curricula with AI feedback
//!
//! Users build or generate week-by-week curricula, write a summary for each
//! week and get it graded by an LLM. Public curricula are shared through a
//! feed with follows, likes, bookmarks and comments.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod metrics;
pub mod models;
pub mod services;
