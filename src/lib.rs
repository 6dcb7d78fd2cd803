//! Smartcache - adaptive search cache with per-supplier rate limits
//!
//! This crate sits between a search domain and the upstream suppliers it
//! queries. Results are cached for a time that adapts to how far ahead the
//! searched date is and how often the same search is being asked for, and
//! once a supplier's outgoing request budget is spent, searches are served
//! from cache only.
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::{DateTime, Duration, Utc};
//! use smartcache::{SearchModel, SmartCache};
//! use tokio_util::sync::CancellationToken;
//!
//! struct HotelSearch {
//!     city: String,
//!     check_in: DateTime<Utc>,
//! }
//!
//! impl SearchModel for HotelSearch {
//!     fn result_key(&self) -> String {
//!         format!("{}-{}", self.city, self.check_in.format("%Y-%m-%d"))
//!     }
//!     fn history_key(&self) -> String {
//!         self.result_key()
//!     }
//!     fn search_date(&self) -> DateTime<Utc> {
//!         self.check_in
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> smartcache::Result<()> {
//!     let manager = SmartCache::builder().build::<HotelSearch>()?;
//!
//!     let search = HotelSearch {
//!         city: "Lisbon".into(),
//!         check_in: Utc::now() + Duration::days(10),
//!     };
//!     let offers: Option<Vec<String>> = manager
//!         .search_from_cache(
//!             &search,
//!             "acme",
//!             || async { Ok(vec!["Hotel Avenida".to_string()]) },
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{offers:?}");
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod history;
pub mod lock;
pub mod manager;
pub mod settings;
pub mod store;
pub mod telemetry;
pub mod traits;
pub mod ttl;

// Re-export main types at crate root
pub use error::{Result, SmartCacheError};
pub use manager::{SearchKeys, SmartCache, SmartCacheBuilder, SmartCacheManager};
pub use traits::SearchModel;

pub use cache::{CacheBackend, CacheConfig, MokaCacheBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, HistoryBackend};
pub use history::{CacheSearchHistory, DatabaseSearchHistory, SearchHistory};
pub use lock::AsyncLock;
pub use settings::{CacheSettingService, LimitSettingService};
pub use store::{
    CacheSetting, Entity, GenericStore, IncomingRequest, LimitSetting, MemoryStore,
    OutgoingRequest,
};
