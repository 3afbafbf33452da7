// Network access: the fetcher seam, its reqwest backend and the reachability signal.

pub mod connectivity;
pub mod http_fetcher;
pub mod traits;

use std::time::Duration;

pub use connectivity::{Connectivity, NetworkStatus};
pub use http_fetcher::{cache_bust_url, HttpFetcher};
pub use traits::{FetchResponse, Fetcher, ProgressCallback};

/// Convert a timeout in seconds to a per-request limit. `0` means no limit.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
