pub mod identifiers;

/// Truncates a string for single-line display, appending an ellipsis when
/// content was cut.
pub fn truncate_for_display(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        let truncated: String = value.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{truncated}…")
    }
}
