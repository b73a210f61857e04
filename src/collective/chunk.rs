//! Partitioning of an element buffer into per-rank chunks.

use crate::core::error::{CollectiveError, Result};
use std::ops::Range;

/// Sizes and offsets of the `rank_size` contiguous chunks of a buffer.
///
/// For a plan built by [`ChunkPlan::new`], the first `count % rank_size`
/// chunks hold one extra element, `chunk_offsets[i]` is the sum of the sizes
/// before chunk `i`, and all sizes add up to `count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    chunk_sizes: Vec<usize>,
    chunk_offsets: Vec<usize>,
}

impl ChunkPlan {
    /// Split `count` elements into `rank_size` chunks, giving the remainder
    /// to the lowest-indexed chunks.
    ///
    /// If `count < rank_size` some chunks are empty; ring callers route such
    /// buffers to the reduce-broadcast path instead.
    pub fn new(count: usize, rank_size: u32) -> Result<Self> {
        if count == 0 || rank_size == 0 {
            return Err(CollectiveError::invalid_argument(format!(
                "Cannot plan chunks for count {} over {} ranks",
                count, rank_size
            )));
        }

        let rank_size = rank_size as usize;
        let chunk_size = count / rank_size;
        let remainder_size = count % rank_size;
        let mut chunk_sizes = vec![chunk_size; rank_size];
        for size in chunk_sizes.iter_mut().take(remainder_size) {
            *size += 1;
        }

        Ok(Self::from_sizes(chunk_sizes))
    }

    /// `rank_size` chunks of exactly `chunk_size` elements, as used by
    /// all-gather where every rank contributes the same amount.
    pub fn uniform(chunk_size: usize, rank_size: u32) -> Result<Self> {
        if rank_size == 0 {
            return Err(CollectiveError::invalid_argument(
                "Rank size should not be 0.",
            ));
        }
        Ok(Self::from_sizes(vec![chunk_size; rank_size as usize]))
    }

    fn from_sizes(chunk_sizes: Vec<usize>) -> Self {
        let chunk_offsets = chunk_sizes
            .iter()
            .scan(0usize, |offset, &size| {
                let start = *offset;
                *offset += size;
                Some(start)
            })
            .collect();

        ChunkPlan {
            chunk_sizes,
            chunk_offsets,
        }
    }

    /// Element count of each chunk.
    pub fn chunk_sizes(&self) -> &[usize] {
        &self.chunk_sizes
    }

    /// Starting element index of each chunk.
    pub fn chunk_offsets(&self) -> &[usize] {
        &self.chunk_offsets
    }

    /// Number of chunks (the group size).
    pub fn len(&self) -> usize {
        self.chunk_sizes.len()
    }

    /// Whether the plan has no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunk_sizes.is_empty()
    }

    /// Total number of elements covered.
    pub fn total(&self) -> usize {
        self.chunk_sizes.iter().sum()
    }

    /// Element range of chunk `index`.
    pub fn range(&self, index: usize) -> Range<usize> {
        let start = self.chunk_offsets[index];
        start..start + self.chunk_sizes[index]
    }

    /// Largest chunk, which is always the first.
    pub fn max_chunk_size(&self) -> usize {
        self.chunk_sizes.first().copied().unwrap_or(0)
    }

    /// Whether any chunk is empty.
    pub fn has_empty_chunk(&self) -> bool {
        self.chunk_sizes.iter().any(|&size| size == 0)
    }
}
