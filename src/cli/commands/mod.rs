//! CLI command implementations

pub mod caches;
pub mod clients;
pub mod config;
pub mod fetch;
pub mod install;
pub mod send;
pub mod status;

pub use caches::{entries, execute as caches};
pub use clients::execute as clients;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::{execute as install, skip_waiting};
pub use send::execute as send;
pub use status::execute as status;
