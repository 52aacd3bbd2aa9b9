use std::time::Duration;

/// Formatea una duración en formato legible
///
/// `M:SS` below one hour, `H:MM:SS` otherwise, `Unknown` for live or
/// unknown lengths.
pub fn format_duration(duration: Option<Duration>) -> String {
    let Some(duration) = duration else {
        return "Unknown".to_string();
    };

    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Recorta un título largo para que quepa en un campo de embed
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(None), "Unknown");
        assert_eq!(format_duration(Some(Duration::ZERO)), "0:00");
        assert_eq!(format_duration(Some(Duration::from_secs(65))), "1:05");
        assert_eq!(format_duration(Some(Duration::from_secs(3599))), "59:59");
        assert_eq!(format_duration(Some(Duration::from_secs(3600))), "1:00:00");
        assert_eq!(format_duration(Some(Duration::from_secs(3725))), "1:02:05");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("corto", 10), "corto");
        assert_eq!(truncate("canción muy larga", 8), "canción…");
    }
}
