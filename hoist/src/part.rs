use std::ops::Range;

use serde::Serialize;

/// One contiguous byte range of the source, identified by a 1-based,
/// contiguous part number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Part {
    pub part_number: u32,
    /// Start offset, inclusive.
    pub start: u64,
    /// End offset, exclusive.
    pub end: u64,
}

impl Part {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub(crate) fn byte_range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// A part the backend acknowledged, carrying its integrity tag. The sorted
/// list of these forms the completion manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    pub part_number: u32,
    pub e_tag: String,
}

/// Splits `total_len` bytes into `ceil(total_len / part_size)` parts. Every
/// part but the last is exactly `part_size` long; the last holds the
/// remainder. Pure and deterministic; both arguments must be positive.
pub fn split_into_parts(total_len: u64, part_size: u64) -> Vec<Part> {
    debug_assert!(total_len > 0 && part_size > 0);
    let count = total_len.div_ceil(part_size);
    (0..count)
        .map(|i| {
            let start = i * part_size;
            Part {
                part_number: (i + 1) as u32,
                start,
                end: (start + part_size).min(total_len),
            }
        })
        .collect()
}
