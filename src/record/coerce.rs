use tracing::warn;

/// Strip whitespace and one pair of wrapping quotes.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Largest count accepted from a cell. Anything above is treated as bad input.
pub const MAX_COUNT: u64 = 1_000_000_000_000;

/// Numeric cast of a count cell.
///
/// Empty, non-numeric and non-finite cells become 0. Fractions round to the
/// nearest integer. Negative values and values above [`MAX_COUNT`] become 0.
pub fn coerce_count(raw: &str) -> u64 {
    let s = clean_str(raw);
    if s.is_empty() {
        return 0;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => {
            if v < 0.0 {
                warn!(value = s, "negative count clamped to 0");
                0
            } else if v.round() > MAX_COUNT as f64 {
                warn!(value = s, max = MAX_COUNT, "count out of range, treated as 0");
                0
            } else {
                v.round() as u64
            }
        }
        _ => 0,
    }
}

/// Parse a year cell. `None` when empty or not an integral number.
pub fn parse_year(raw: &str) -> Option<i32> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    if let Ok(y) = s.parse::<i32>() {
        return Some(y);
    }
    // "2019.0" shows up in spreadsheet exports
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() <= i32::MAX as f64 => {
            Some(v as i32)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        assert_eq!(coerce_count("100"), 100);
        assert_eq!(coerce_count(" 42 "), 42);
        assert_eq!(coerce_count("\"7\""), 7);
        assert_eq!(coerce_count(""), 0);
        assert_eq!(coerce_count("n/a"), 0);
        assert_eq!(coerce_count("NaN"), 0);
        assert_eq!(coerce_count("inf"), 0);
        assert_eq!(coerce_count("12.6"), 13);
        assert_eq!(coerce_count("-5"), 0);
    }

    #[test]
    fn oversized_counts_become_zero() {
        assert_eq!(coerce_count("1e12"), MAX_COUNT);
        assert_eq!(coerce_count("1000000000001"), 0);
        assert_eq!(coerce_count("1e20"), 0);
        assert_eq!(coerce_count("1.8e308"), 0);
    }

    #[test]
    fn years() {
        assert_eq!(parse_year("2019"), Some(2019));
        assert_eq!(parse_year(" 2020 "), Some(2020));
        assert_eq!(parse_year("2019.0"), Some(2019));
        assert_eq!(parse_year("2019.5"), None);
        assert_eq!(parse_year(""), None);
        assert_eq!(parse_year("abc"), None);
    }
}
