#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod errors;
pub mod keys;
pub mod node;
pub mod ports;
pub mod revision;
pub mod uid;

// Re-export commonly used types for convenience
pub use config::{DEFAULT_BASE_URL, DEFAULT_LANGUAGE, DriveConfig};
pub use errors::{DownloadError, DownloadResult};
pub use keys::{NodeKey, PrivateKey, RevisionKeys, SessionKey, VerificationKey};
pub use node::{ActiveRevision, Node, NodeKeys, NodeLookup, NodeType};
pub use ports::{
    AccountPort, BlobRequest, BlockFetcherPort, ByteProgress, CryptoServicePort, DownloadSink,
    HttpClientPort, HttpError, HttpMethod, JsonRequest, NodesServicePort, NoopTelemetry,
    RevisionEventSource, RevisionListingPort, RevisionsServicePort, TelemetryPort,
    ThumbnailApiPort, ThumbnailToken, ThumbnailTokenBatch, TracingTelemetry,
};
pub use revision::{
    BlockMetadata, ContentAuthor, Revision, RevisionEvent, ThumbnailDescriptor, ThumbnailType,
};
pub use uid::{NodeUid, RevisionUid, ThumbnailUid};

// Silence unused dev-dependency warnings
#[cfg(test)]
use tokio as _;
#[cfg(test)]
use tokio_test as _;
