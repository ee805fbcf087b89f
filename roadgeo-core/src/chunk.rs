use std::ops::Range;

/// A contiguous run of rows, identified by its starting row index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk in the plan (0-based)
    pub index: usize,
    /// First row (inclusive)
    pub start: usize,
    /// Last row (exclusive)
    pub end: usize,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Partition `[0, total_rows)` into chunks of `chunk_size` rows.
/// The last chunk is short when `total_rows` is not a multiple of `chunk_size`.
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
pub fn plan_chunks(total_rows: usize, chunk_size: usize) -> Vec<Chunk> {
    (0..chunk_count(total_rows, chunk_size))
        .map(|index| {
            let start = index * chunk_size;
            Chunk {
                index,
                start,
                end: (start + chunk_size).min(total_rows),
            }
        })
        .collect()
}

/// `ceil(total_rows / chunk_size)`
///
/// # Panics
///
/// Panics if `chunk_size` is zero.
pub fn chunk_count(total_rows: usize, chunk_size: usize) -> usize {
    assert!(chunk_size > 0, "chunk size must be positive");
    total_rows.div_ceil(chunk_size)
}
