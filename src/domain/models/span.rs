use serde::{Deserialize, Serialize};

/// Source location of a syntactic entity. Lines are 1-indexed, columns are
/// 0-indexed; the byte range is half-open `[start_byte, end_byte)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Span {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub start_byte: usize,
    pub end_byte: usize,
}

impl Span {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_line: u32,
        start_column: u32,
        end_line: u32,
        end_column: u32,
        start_byte: usize,
        end_byte: usize,
    ) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
            start_byte,
            end_byte,
        }
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn byte_len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// True when `other` lies entirely inside this span.
    pub fn encloses(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count() {
        let span = Span::new(5, 0, 9, 1, 100, 200);
        assert_eq!(span.line_count(), 5);
        assert_eq!(span.byte_len(), 100);
    }

    #[test]
    fn test_encloses() {
        let outer = Span::new(1, 0, 10, 0, 0, 500);
        let inner = Span::new(3, 4, 5, 0, 50, 120);
        assert!(outer.encloses(&inner));
        assert!(!inner.encloses(&outer));
        assert!(outer.contains_line(10));
        assert!(!outer.contains_line(11));
    }
}
