#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

mod controller;
mod crypto;
mod downloader;
mod module;
mod pipeline;
mod progress;
mod queue;
mod stream;
mod thumbnails;

// ============================================================================
// Public API
// ============================================================================

pub use controller::DownloadController;
pub use crypto::DriveCryptoService;
pub use downloader::FileDownloader;
pub use module::{DownloadModule, DownloadModuleDeps, build_download_module};
pub use pipeline::MAX_BLOCK_CONCURRENCY;
pub use progress::{ProgressCallback, ProgressThrottle};
pub use queue::MAX_CONCURRENT_DOWNLOADS;
pub use stream::{
    BlockLookup, BlockPosition, DEFAULT_BLOCK_SIZE, ReadBytes, SeekableStream, block_for_offset,
};
pub use thumbnails::{MAX_CONCURRENT_THUMBNAILS, MAX_THUMBNAIL_ATTEMPTS, ThumbnailResult};

// Silence unused dev-dependency warnings
#[cfg(test)]
use mockall as _;
#[cfg(test)]
use tokio_test as _;
