use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OffsetRange {
    pub start: usize,
    pub end: usize,
}

impl OffsetRange {
    pub fn new(start: usize, end: usize) -> Self {
        assert!(start <= end, "invalid range [{}, {})", start, end);
        Self { start, end }
    }

    pub fn empty_at(offset: usize) -> Self {
        Self::new(offset, offset)
    }

    pub fn of_start_and_length(start: usize, length: usize) -> Self {
        Self::new(start, start + length)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Shift both ends by a signed offset.
    pub fn delta(&self, offset: isize) -> Self {
        Self::new(shift(self.start, offset), shift(self.end, offset))
    }

    pub fn delta_start(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end)
    }

    pub fn delta_end(&self, offset: isize) -> Self {
        Self::new(self.start, shift(self.end, offset))
    }

    /// Join with a range that starts exactly where this one ends.
    pub fn join_right_touching(&self, other: &OffsetRange) -> Self {
        assert_eq!(
            self.end, other.start,
            "ranges {} and {} do not touch",
            self, other
        );
        Self::new(self.start, other.end)
    }

    /// The part of `text` covered by this range.
    ///
    /// Panics when the range exceeds the text or splits a char.
    pub fn substring<'a>(&self, text: &'a str) -> &'a str {
        match text.get(self.start..self.end) {
            Some(s) => s,
            None => panic!(
                "range {} is not valid for text of length {}",
                self,
                text.len()
            ),
        }
    }
}

impl fmt::Display for OffsetRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Apply a signed delta to an offset. Offsets never go negative in a
/// well-formed edit, so underflow is an invariant violation.
pub(crate) fn shift(offset: usize, delta: isize) -> usize {
    match offset.checked_add_signed(delta) {
        Some(shifted) => shifted,
        None => panic!("offset {} shifted by {} is negative", offset, delta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_and_length() {
        let r = OffsetRange::new(3, 7);
        assert_eq!(r.len(), 4);
        assert_eq!(r.delta(2), OffsetRange::new(5, 9));
        assert_eq!(r.delta(-3), OffsetRange::new(0, 4));
        assert_eq!(r.delta_start(1), OffsetRange::new(4, 7));
        assert_eq!(r.delta_end(-2), OffsetRange::new(3, 5));
    }

    #[test]
    fn test_join_right_touching() {
        let a = OffsetRange::new(0, 3);
        let b = OffsetRange::new(3, 5);
        assert_eq!(a.join_right_touching(&b), OffsetRange::new(0, 5));
    }

    #[test]
    #[should_panic(expected = "invalid range")]
    fn test_reversed_range_panics() {
        OffsetRange::new(4, 2);
    }

    #[test]
    #[should_panic(expected = "is negative")]
    fn test_negative_shift_panics() {
        OffsetRange::new(1, 2).delta(-2);
    }

    #[test]
    fn test_substring() {
        assert_eq!(OffsetRange::new(1, 3).substring("abcd"), "bc");
    }
}
