//! Fixed-capacity text buffer for formatted printing

use core::fmt;

use heapless::Vec;

/// Capacity of the formatted-print scratch buffer in bytes
pub const CAPACITY: usize = 256;

/// Fixed-capacity UTF-8 buffer with silent truncation
///
/// Formatted output lands here before going to the display. Once a
/// character no longer fits, the remainder of the output is dropped; a
/// multi-byte character is never split.
pub struct TextBuffer {
    bytes: Vec<u8, CAPACITY>,
    truncated: bool,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self {
            bytes: Vec::new(),
            truncated: false,
        }
    }

    /// The buffered text
    pub fn as_str(&self) -> &str {
        // Only whole characters are ever appended
        core::str::from_utf8(&self.bytes).unwrap_or("")
    }

    /// Whether any output has been dropped
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Write for TextBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.truncated {
            return Ok(());
        }

        for ch in s.chars() {
            let mut utf8 = [0u8; 4];
            let encoded = ch.encode_utf8(&mut utf8);
            if self.bytes.extend_from_slice(encoded.as_bytes()).is_err() {
                self.truncated = true;
                return Ok(());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    #[test]
    fn test_collects_formatted_text() {
        let mut buf = TextBuffer::new();
        write!(buf, "T={}C", 42).unwrap();

        assert_eq!(buf.as_str(), "T=42C");
        assert!(!buf.is_truncated());
    }

    #[test]
    fn test_truncates_at_capacity() {
        let mut buf = TextBuffer::new();
        write!(buf, "{:x<300}", "A").unwrap();

        assert_eq!(buf.as_str().len(), CAPACITY);
        assert!(buf.is_truncated());
        assert!(buf.as_str().starts_with('A'));
    }

    #[test]
    fn test_never_splits_a_character() {
        let mut buf = TextBuffer::new();
        for _ in 0..CAPACITY - 1 {
            write!(buf, "a").unwrap();
        }

        // Two UTF-8 bytes no longer fit in the single remaining slot
        write!(buf, "é").unwrap();
        assert_eq!(buf.as_str().len(), CAPACITY - 1);
        assert!(buf.is_truncated());

        // Once truncated, later output is dropped even if it would fit
        write!(buf, "b").unwrap();
        assert_eq!(buf.as_str().len(), CAPACITY - 1);
    }

    #[test]
    fn test_empty() {
        let buf = TextBuffer::new();
        assert_eq!(buf.as_str(), "");
        assert!(!buf.is_truncated());
    }
}
