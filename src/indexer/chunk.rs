use std::sync::LazyLock;

use regex::Regex;

/// Minimum number of buffered lines before a boundary line may close a chunk.
pub const MIN_CHUNK_LINES: usize = 10;

/// Language-agnostic structural boundary: a definition, block or control-flow
/// keyword at the start of a line.
static BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(def|class|function|public|private|protected|if|for|while|switch|import|export|return)\b",
    )
    .expect("boundary pattern is valid")
});

/// A contiguous line-range slice of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Path relative to the repository root.
    pub source_path: String,

    /// Position in the produced sequence (0-indexed).
    pub ordinal: usize,

    /// The chunk's lines joined with `\n`.
    pub text: String,
}

/// Splits file text into ordered, non-overlapping chunks along structural
/// boundaries.
///
/// The chunker has no state between calls, so the same text always yields
/// the same chunk sequence.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    min_lines: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            min_lines: MIN_CHUNK_LINES,
        }
    }
}

impl Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `text` into chunk strings.
    ///
    /// A boundary line is kept as the last line of the chunk it closes.
    /// Joining the result with `\n` reproduces `text` exactly.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut buffer: Vec<&str> = Vec::new();

        for line in text.split('\n') {
            buffer.push(line);
            if buffer.len() > self.min_lines && is_boundary(line) {
                chunks.push(buffer.join("\n"));
                buffer.clear();
            }
        }

        if !buffer.is_empty() {
            chunks.push(buffer.join("\n"));
        }

        chunks
    }

    /// Split `text` into [`Chunk`]s tagged with their source path and ordinal.
    pub fn chunk_file(&self, source_path: &str, text: &str) -> Vec<Chunk> {
        self.chunk(text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                source_path: source_path.to_string(),
                ordinal,
                text,
            })
            .collect()
    }
}

/// Returns true if `line` starts with a structural boundary keyword.
pub fn is_boundary(line: &str) -> bool {
    BOUNDARY.is_match(line)
}
