//! Search-domain capability trait

use chrono::{DateTime, Utc};

/// What a search domain must tell the manager about one of its searches.
///
/// Implemented by the caller's search model (e.g. a flight search). The
/// manager is generic over this trait; it never inspects the model
/// otherwise.
///
/// ```rust
/// use chrono::{DateTime, Utc};
/// use smartcache::SearchModel;
///
/// struct FlightSearch {
///     origin: String,
///     destination: String,
///     date: DateTime<Utc>,
///     adults: u8,
/// }
///
/// impl SearchModel for FlightSearch {
///     fn result_key(&self) -> String {
///         format!("{}-{}-{}-{}", self.origin, self.destination, self.date.format("%Y-%m-%d"), self.adults)
///     }
///
///     fn history_key(&self) -> String {
///         // passenger count omitted: near-duplicate searches share a bucket
///         format!("{}-{}-{}", self.origin, self.destination, self.date.format("%Y-%m-%d"))
///     }
///
///     fn search_date(&self) -> DateTime<Utc> {
///         self.date
///     }
/// }
/// ```
pub trait SearchModel: Send + Sync {
    /// Key identifying the cached payload for this exact search.
    fn result_key(&self) -> String;

    /// Coarser key under which near-duplicate searches are counted.
    fn history_key(&self) -> String;

    /// The date being searched for.
    fn search_date(&self) -> DateTime<Utc>;
}
