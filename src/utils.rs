/// Placeholder for a ratio that cannot be computed.
pub const RATIO_SENTINEL: &str = "-";

/// Placeholder for a valuation method without an estimate.
pub const NOT_AVAILABLE: &str = "N/A";

pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// `numerator / denominator * 100`, only for a strictly positive denominator.
pub fn percentage(numerator: i64, denominator: i64) -> Option<f64> {
    if denominator > 0 {
        Some(numerator as f64 / denominator as f64 * 100.0)
    } else {
        None
    }
}

/// Formatted percentage or the sentinel.
pub fn percent_or_sentinel(value: Option<f64>) -> String {
    value
        .map(format_percent)
        .unwrap_or_else(|| RATIO_SENTINEL.to_string())
}

/// Rounds to a whole number and inserts thousands separators (`1234567.8` -> `"1,234,568"`).
pub fn format_thousands(value: f64) -> String {
    let rounded = format!("{:.0}", value);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if grouped == "0" {
        return grouped;
    }
    format!("{}{}", sign, grouped)
}
