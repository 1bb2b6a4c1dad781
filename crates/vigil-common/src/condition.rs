use crate::session::{MonitorMode, MonitorSession};

/// Decide whether the watched condition holds for the element's current text.
///
/// `change` compares against the snapshot exactly; the substring modes fold
/// case on both sides. Empty content is a valid input for every mode.
pub fn evaluate(
    current: &str,
    mode: MonitorMode,
    search_text: &str,
    initial_content: &str,
) -> bool {
    match mode {
        MonitorMode::Change => current != initial_content,
        MonitorMode::Contains => contains_folded(current, search_text),
        MonitorMode::NotContains => !contains_folded(current, search_text),
    }
}

/// [`evaluate`] with the parameters taken from a session.
pub fn evaluate_session(current: &str, session: &MonitorSession) -> bool {
    evaluate(
        current,
        session.mode,
        &session.search_text,
        &session.initial_content,
    )
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// First `max_chars` characters of `text`, for log lines.
pub fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
