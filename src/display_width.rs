use unicode_width::UnicodeWidthStr;

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Split a label into display lines on `\n`, also accepting the escaped
/// two-character form `\\n` used in text descriptions.
pub fn split_lines(s: &str) -> Vec<&str> {
    s.split('\n')
        .flat_map(|part| part.split("\\n"))
        .collect()
}

/// Maximum display width among the lines of a label.
pub fn multiline_width(s: &str) -> usize {
    split_lines(s)
        .iter()
        .map(|line| display_width(line))
        .max()
        .unwrap_or(0)
}

pub fn line_count(s: &str) -> usize {
    split_lines(s).len()
}
