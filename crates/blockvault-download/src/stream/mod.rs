//! Random-access reads over encrypted content.
//!
//! Two-level design: an inner producer that demand-loads one block per pull
//! (`start` / `pull` / `seek`), and an outer byte-granular reader that adds
//! buffered `read(n)` and seek-with-invalidation on top.

mod block_index;
mod producer;
mod seekable;

pub use block_index::{BlockLookup, BlockPosition, DEFAULT_BLOCK_SIZE, block_for_offset};
pub use seekable::{ReadBytes, SeekableStream};

pub(crate) use producer::BlockStream;
