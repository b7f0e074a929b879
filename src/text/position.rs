/// Line start offsets of a text, used to map byte offsets to line numbers.
///
/// Lines are 0-based. A line's end excludes its terminating `\n`.
#[derive(Debug, Clone)]
pub struct LineStarts {
    starts: Vec<usize>,
    text_len: usize,
}

impl LineStarts {
    /// Create a new LineStarts with pre-computed line starts
    pub fn new(text: &str) -> Self {
        Self {
            starts: compute_line_starts(text),
            text_len: text.len(),
        }
    }

    /// Line containing the byte offset. Offsets at a line start belong to that line.
    pub fn line_of(&self, offset: usize) -> usize {
        assert!(
            offset <= self.text_len,
            "offset {} is out of bounds for text of length {}",
            offset,
            self.text_len
        );
        match self.starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        }
    }

    /// Byte offset of the first character of a line
    pub fn line_start(&self, line: usize) -> usize {
        self.starts[line]
    }

    /// Byte offset just before the line's `\n` (or the end of the text)
    pub fn line_end(&self, line: usize) -> usize {
        if line + 1 < self.starts.len() {
            self.starts[line + 1] - 1
        } else {
            self.text_len
        }
    }
}

/// Compute line start offsets for efficient position mapping
pub fn compute_line_starts(text: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    let mut offset = 0;

    for ch in text.chars() {
        offset += ch.len_utf8();
        if ch == '\n' {
            line_starts.push(offset);
        }
    }

    line_starts
}

/// Byte length of the longest common prefix, never splitting a char.
pub fn common_prefix_len(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Byte length of the longest common suffix, never splitting a char.
pub fn common_suffix_len(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}
