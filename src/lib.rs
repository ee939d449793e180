//! streams-cache - versioned asset-caching proxy
//!
//! Serves application requests cache-first from a versioned named cache,
//! keeps live API hosts off the cache, and manages installed application
//! files through a small control-message channel.

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod fetch;
pub mod http;
pub mod storage;
pub mod ui;
pub mod worker;

pub use error::{StreamsError, StreamsResult};
