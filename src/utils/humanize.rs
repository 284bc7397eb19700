use humansize::{DECIMAL, format_size};

/// Format a duration in seconds as "1h 23m 45s" (or "23m 45s" under an hour)
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else {
        format!("{}m {}s", minutes, secs)
    }
}

/// Format a byte count for display
pub fn format_file_size(bytes: u64) -> String {
    format_size(bytes, DECIMAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_with_hours() {
        assert_eq!(format_duration(3723.9), "1h 2m 3s");
    }

    #[test]
    fn duration_under_an_hour() {
        assert_eq!(format_duration(125.0), "2m 5s");
    }

    #[test]
    fn duration_negative_clamps_to_zero() {
        assert_eq!(format_duration(-5.0), "0m 0s");
    }
}
