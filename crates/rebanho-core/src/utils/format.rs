/// Format an attainment percentage, or "n/a" when there is no goal.
pub fn format_percent(percent: Option<u32>) -> String {
    match percent {
        Some(p) => format!("{}%", p),
        None => "n/a".to_string(),
    }
}

/// "3/2 (150%)" style progress line.
pub fn format_attainment(achieved: u32, goal: u32) -> String {
    let percent = if goal == 0 {
        None
    } else {
        Some(((achieved as u64 * 100) / goal as u64) as u32)
    };
    format!("{}/{} ({})", achieved, goal, format_percent(percent))
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_attainment() {
        assert_eq!(format_attainment(3, 2), "3/2 (150%)");
        assert_eq!(format_attainment(0, 4), "0/4 (0%)");
        assert_eq!(format_attainment(5, 0), "5/0 (n/a)");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("PG Esperança", 20), "PG Esperança");
        assert_eq!(truncate("PG Esperança do Norte", 10), "PG Espe...");
        assert_eq!(truncate("Setor", 2), "Se");
    }
}
