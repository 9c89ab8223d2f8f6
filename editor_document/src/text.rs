//! Offset and line helpers over `\n`-terminated text

/// Clamps `offset` into `text` and moves it back to a char boundary
pub fn clamp_to_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Number of lines; empty text has one line
pub fn line_count(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count() + 1
}

/// Byte offset of the start of zero-based `line`, clamped to the last line
pub fn offset_of_line(text: &str, line: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let mut seen = 0;
    let mut last_start = 0;
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            seen += 1;
            last_start = i + 1;
            if seen == line {
                return last_start;
            }
        }
    }
    last_start
}

/// Zero-based line containing `offset`
pub fn line_of_offset(text: &str, offset: usize) -> usize {
    let offset = offset.min(text.len());
    text.as_bytes()[..offset]
        .iter()
        .filter(|b| **b == b'\n')
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count() {
        assert_eq!(line_count(""), 1);
        assert_eq!(line_count("a\nb"), 2);
        assert_eq!(line_count("a\n"), 2);
    }

    #[test]
    fn test_offset_of_line() {
        let text = "ab\ncd\nef";
        assert_eq!(offset_of_line(text, 0), 0);
        assert_eq!(offset_of_line(text, 1), 3);
        assert_eq!(offset_of_line(text, 2), 6);
        assert_eq!(offset_of_line(text, 9), 6);
    }

    #[test]
    fn test_line_of_offset() {
        let text = "ab\ncd\nef";
        assert_eq!(line_of_offset(text, 0), 0);
        assert_eq!(line_of_offset(text, 3), 1);
        assert_eq!(line_of_offset(text, 100), 2);
    }

    #[test]
    fn test_clamp_multibyte() {
        let text = "\u{3042}b";
        assert_eq!(clamp_to_char_boundary(text, 1), 0);
        assert_eq!(clamp_to_char_boundary(text, 3), 3);
        assert_eq!(clamp_to_char_boundary(text, 99), 4);
    }
}
