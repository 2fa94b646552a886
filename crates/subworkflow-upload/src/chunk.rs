//! Pure chunk planning over a payload of known size.

/// One contiguous byte range of the source payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based sequence number, ascending with offset.
    pub part_number: u32,
    pub offset: u64,
    pub len: u64,
}

impl Chunk {
    /// The `[offset, offset + len)` range, usable for slicing the payload.
    #[must_use]
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let end = usize::try_from(self.offset + self.len).unwrap_or(usize::MAX);
        start..end
    }
}

/// Split `total_size` bytes into ranges of at most `chunk_size`.
///
/// Produces `ceil(total_size / chunk_size)` contiguous, non-overlapping
/// ranges numbered 1..N in ascending offset order whose union is exactly
/// `[0, total_size)`; the final range holds the remainder. Both sizes must
/// be non-zero; callers reject empty payloads before planning.
#[must_use]
pub fn plan(total_size: u64, chunk_size: u64) -> Vec<Chunk> {
    debug_assert!(total_size > 0, "empty payloads are rejected upstream");
    debug_assert!(chunk_size > 0, "chunk size must be positive");

    let count = total_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(usize::try_from(count).unwrap_or(0));
    let mut offset = 0;
    for index in 0..count {
        let len = chunk_size.min(total_size - offset);
        chunks.push(Chunk {
            part_number: u32::try_from(index + 1).unwrap_or(u32::MAX),
            offset,
            len,
        });
        offset += len;
    }
    chunks
}
