// src/traffic.rs
//! Parse human-readable traffic strings ("200K+", "5M", "1,234") into counts.

use once_cell::sync::OnceCell;
use regex::Regex;

fn traffic_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"^\s*([0-9.,]+)\s*([kKmMbB])?").expect("traffic regex"))
}

/// Longest leading `digits[.digits]` run parsed as `f64`; "1.2.3" reads as 1.2.
fn decimal_prefix(s: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    for (i, c) in s.char_indices() {
        match c {
            '0'..='9' => end = i + 1,
            '.' if !seen_dot => seen_dot = true,
            _ => break,
        }
    }
    s[..end].parse::<f64>().ok()
}

/// Convert a formatted traffic string into an integer count.
///
/// Returns 0 for empty, unparsable or non-finite input; never errors.
pub fn parse_traffic(formatted: &str) -> u64 {
    let s = formatted.trim().trim_end_matches('+');
    if s.is_empty() {
        return 0;
    }

    let Some(caps) = traffic_re().captures(s) else {
        return 0;
    };

    let digits = caps
        .get(1)
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_default();
    let Some(num) = decimal_prefix(&digits) else {
        return 0;
    };

    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(u) if u == "k" => 1e3,
        Some(u) if u == "m" => 1e6,
        Some(u) if u == "b" => 1e9,
        _ => 1.0,
    };

    let value = (num * multiplier).round();
    if !value.is_finite() || value < 0.0 {
        return 0;
    }
    // `as` saturates at u64::MAX for oversized values.
    value as u64
}
