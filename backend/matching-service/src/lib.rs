pub mod commands;
pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod posting;
pub mod services;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{MatchError, Result};
pub use models::{Match, MatchQuery};
pub use services::MatchingService;
pub use store::{MemoryPostingStore, PostingStore, RedisPostingStore};
