use chrono::DateTime;

/// Render a release timestamp (seconds since epoch) for display.
#[must_use]
pub fn format_release_time(ts: i64) -> String {
    if ts <= 0 {
        return "-".into();
    }
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into())
}

/// First line of `text`, cut to `max_len` characters.
#[must_use]
pub fn summary_line(text: &str, max_len: usize) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() <= max_len {
        return line.to_owned();
    }
    let mut cut: String = line.chars().take(max_len.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_release_times() {
        assert_eq!(format_release_time(0), "-");
        assert_eq!(format_release_time(-5), "-");
        assert_eq!(format_release_time(1_710_000_000), "2024-03-09 16:00 UTC");
    }

    #[test]
    fn summarises_descriptions() {
        assert_eq!(summary_line("\n  Fix ads init\nmore", 40), "Fix ads init");
        assert_eq!(summary_line("abcdefghij", 8), "abcde...");
        assert_eq!(summary_line("", 8), "");
    }
}
