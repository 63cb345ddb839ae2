#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod fetcher;
mod http;
mod listing;
mod thumbnails;
mod url;

// ============================================================================
// Public API
// ============================================================================

pub use fetcher::BlockFetcher;
pub use http::ReqwestHttpClient;
pub use listing::RevisionListing;
pub use thumbnails::ThumbnailTokenClient;

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio_test as _;
