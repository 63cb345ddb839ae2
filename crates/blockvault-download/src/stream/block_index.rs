//! Offset to block-index translation.

/// Block plaintext size assumed when the uploader declared no per-block
/// sizes.
pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// A file offset translated into block coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockPosition {
    /// 1-based block index.
    pub index: u64,
    /// Offset within that block's plaintext.
    pub offset: u64,
}

/// Result of translating a file offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockLookup {
    /// The offset falls inside a block.
    Within(BlockPosition),
    /// The offset is at or past the end of the sized file.
    End,
}

/// Translate a plaintext file offset into `(block index, in-block offset)`.
///
/// With no declared sizes every block is assumed [`DEFAULT_BLOCK_SIZE`] long
/// and the translation never reports the end; the caller discovers EOF when
/// the index has no block. Zero-sized entries are permitted and skipped.
#[must_use]
pub fn block_for_offset(claimed_block_sizes: Option<&[u64]>, position: u64) -> BlockLookup {
    let sizes = match claimed_block_sizes {
        Some(sizes) if !sizes.is_empty() => sizes,
        _ => {
            return BlockLookup::Within(BlockPosition {
                index: position / DEFAULT_BLOCK_SIZE + 1,
                offset: position % DEFAULT_BLOCK_SIZE,
            });
        }
    };

    let mut running = 0u64;
    for (i, &size) in sizes.iter().enumerate() {
        if position < running + size {
            return BlockLookup::Within(BlockPosition {
                index: i as u64 + 1,
                offset: position - running,
            });
        }
        running += size;
    }
    BlockLookup::End
}
