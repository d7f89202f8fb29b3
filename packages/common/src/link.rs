/// Normalise a user- or seed-supplied application link.
///
/// - empty or blank: `#`
/// - already `http://` or `https://`: unchanged (trimmed)
/// - contains a `.` and no whitespace: prefixed with `https://`
/// - anything else (relative paths, anchors): unchanged (trimmed)
pub fn safe_external_link(link: &str) -> String {
    let trimmed = link.trim();
    if trimmed.is_empty() {
        return "#".into();
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }

    if trimmed.contains('.') && !trimmed.chars().any(char::is_whitespace) {
        return format!("https://{trimmed}");
    }

    trimmed.to_string()
}
