//! Display helpers for table cells

/// Characters of title/content shown in the document list
pub const MAX_CONTENT_LENGTH: usize = 50;

/// Cut `text` to `max` characters, appending `...` only when something was cut.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// Flatten newlines so a value fits in a single table row
pub fn single_line(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
