/*!
 * Chunking of the source line sequence.
 *
 * Splits an ordered, 1-indexed sequence of lines into fixed-size chunks with
 * stable index ranges. Chunking is pure and deterministic: resumed sessions
 * key progress by `start_index`, so re-chunking identical input must reproduce
 * identical boundaries.
 */

use crate::errors::ConfigError;

/// One unit of source text, identified by its 1-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// 1-based position in the original sequence, unique and contiguous
    pub index: usize,
    /// Source text; may be empty, and empty input maps to empty output
    pub text: String,
}

impl Line {
    /// Create a line at the given 1-based index
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// A contiguous sub-range of lines dispatched as one translation unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based index of the first line (inclusive)
    pub start_index: usize,
    /// 1-based index of the last line (inclusive)
    pub end_index: usize,
    /// The lines covered by `[start_index, end_index]`, in order
    pub lines: Vec<Line>,
}

impl Chunk {
    /// Number of lines in this chunk
    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    /// Whether the chunk covers no lines (never produced by `chunkify`)
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Source texts in order, borrowed
    pub fn source_texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    /// True when every line in the chunk is blank after trimming
    pub fn is_all_blank(&self) -> bool {
        self.lines.iter().all(|l| l.text.trim().is_empty())
    }
}

impl std::fmt::Display for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{}]", self.start_index, self.end_index)
    }
}

/// Split lines into chunks of at most `chunk_size` lines.
///
/// The produced chunks partition the full sequence exactly: contiguous,
/// non-overlapping, union covering every index. The final chunk may be
/// shorter than `chunk_size`.
pub fn chunkify(lines: &[Line], chunk_size: usize) -> Result<Vec<Chunk>, ConfigError> {
    if chunk_size < 1 {
        return Err(ConfigError::InvalidConfiguration(
            "chunk_size must be >= 1".to_string(),
        ));
    }
    if lines.is_empty() {
        return Err(ConfigError::InvalidConfiguration(
            "cannot chunk an empty line sequence".to_string(),
        ));
    }

    let mut chunks = Vec::with_capacity(lines.len().div_ceil(chunk_size));
    for group in lines.chunks(chunk_size) {
        chunks.push(Chunk {
            start_index: group[0].index,
            end_index: group[group.len() - 1].index,
            lines: group.to_vec(),
        });
    }
    Ok(chunks)
}
