//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces the download pipeline expects from the
//! surrounding application and from the remote API adapter. They contain no
//! implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No HTTP client or crypto library types in any signature
//! - Cancellation travels as a `CancellationToken`, never as a bool
//! - With the `test-utils` feature, every port has a mockall mock

pub mod account;
pub mod crypto;
pub mod fetcher;
pub mod http;
pub mod listing;
pub mod nodes;
pub mod revisions;
pub mod sink;
pub mod telemetry;
pub mod thumbnail_api;

pub use account::AccountPort;
pub use crypto::CryptoServicePort;
pub use fetcher::BlockFetcherPort;
pub use http::{ByteProgress, BlobRequest, HttpClientPort, HttpError, HttpMethod, JsonRequest};
pub use listing::{RevisionEventSource, RevisionListingPort};
pub use nodes::NodesServicePort;
pub use revisions::RevisionsServicePort;
pub use sink::DownloadSink;
pub use telemetry::{NoopTelemetry, TelemetryPort, TracingTelemetry};
pub use thumbnail_api::{ThumbnailApiPort, ThumbnailToken, ThumbnailTokenBatch};

#[cfg(feature = "test-utils")]
pub use account::MockAccountPort;
#[cfg(feature = "test-utils")]
pub use crypto::MockCryptoServicePort;
#[cfg(feature = "test-utils")]
pub use fetcher::MockBlockFetcherPort;
#[cfg(feature = "test-utils")]
pub use http::MockHttpClientPort;
#[cfg(feature = "test-utils")]
pub use listing::{MockRevisionEventSource, MockRevisionListingPort};
#[cfg(feature = "test-utils")]
pub use nodes::MockNodesServicePort;
#[cfg(feature = "test-utils")]
pub use revisions::MockRevisionsServicePort;
#[cfg(feature = "test-utils")]
pub use sink::MockDownloadSink;
#[cfg(feature = "test-utils")]
pub use thumbnail_api::MockThumbnailApiPort;
