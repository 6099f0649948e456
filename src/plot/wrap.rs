//! Fixed-width wrapping of hover labels.

/// Line separator understood by the browser plot widget.
pub const LINE_BREAK: &str = "<br>";

/// Greedy word wrap to at most `width` characters per line. Words longer than
/// `width` are hard-split. A zero width disables wrapping.
pub fn wrap_lines(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.split_whitespace().collect::<Vec<_>>().join(" ")];
    }

    let mut pieces: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let chars: Vec<char> = word.chars().collect();
        if chars.len() > width {
            pieces.extend(chars.chunks(width).map(|c| c.iter().collect::<String>()));
        } else {
            pieces.push(word.to_string());
        }
    }

    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_len = 0;
    for piece in pieces {
        let piece_len = piece.chars().count();
        if line_len > 0 && line_len + 1 + piece_len > width {
            lines.push(std::mem::take(&mut line));
            line_len = 0;
        }
        if line_len > 0 {
            line.push(' ');
            line_len += 1;
        }
        line.push_str(&piece);
        line_len += piece_len;
    }
    lines.push(line);
    lines
}

/// Wrapped label joined with [`LINE_BREAK`].
pub fn display_label(text: &str, width: usize) -> String {
    wrap_lines(text, width).join(LINE_BREAK)
}
