//! Text formatting helpers shared by operation descriptions and answers.

/// Render a number the way it reads in a description: integral values keep
/// one decimal (`2.0`), everything else uses the shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// `[0.1, 0.4]`
pub fn format_pair(low: f64, high: f64) -> String {
    format!("[{}, {}]", format_number(low), format_number(high))
}

/// Value with two decimals and an optional unit suffix.
pub fn with_unit(value: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.2} {}", value, unit)
    }
}

/// Shorten long text for log lines, keeping the head and tail on UTF-8
/// boundaries.
pub fn preview(content: &str, max_chars: usize) -> String {
    let total = content.chars().count();
    if total <= max_chars {
        return content.to_string();
    }
    let half = max_chars / 2;
    let head: String = content.chars().take(half).collect();
    let tail: String = content.chars().skip(total - half).collect();
    format!("{} ... [{} chars truncated] ... {}", head, total - 2 * half, tail)
}

/// "1st", "2nd", "3rd", "4th"...
pub fn ordinal(n: u64) -> String {
    let suffix = match (n % 10, n % 100) {
        (1, 11) | (2, 12) | (3, 13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2.0");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(-3.25), "-3.25");
        assert_eq!(format_pair(0.1, 0.4), "[0.1, 0.4]");
    }

    #[test]
    fn test_with_unit() {
        assert_eq!(with_unit(3.14159, "rpm"), "3.14 rpm");
        assert_eq!(with_unit(1.0, ""), "1.00");
    }

    #[test]
    fn test_preview_respects_utf8() {
        let text = "°C".repeat(50);
        let short = preview(&text, 10);
        assert!(short.contains("chars truncated"));
        assert!(short.starts_with("°C°C°"));
    }

    #[test]
    fn test_ordinal() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(22), "22nd");
    }
}
