//! Number formatting and HTML escaping for text reports.

use std::fmt::Write;

/// Format milliseconds like `###,##0.##`: at most two decimals, no trailing
/// zeros, thousands grouped with `,`. Halves round away from zero.
#[must_use]
pub fn format_ms(value: f64) -> String {
    let hundredths = (value * 100.0).round();
    let negative = hundredths < 0.0;
    // Saturating cast; NaN becomes 0.
    let hundredths = hundredths.abs() as u64;
    let whole = hundredths / 100;
    let fraction = hundredths % 100;

    let mut out = String::new();
    if negative && hundredths != 0 {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if fraction != 0 {
        if fraction % 10 == 0 {
            let _ = write!(out, ".{}", fraction / 10);
        } else {
            let _ = write!(out, ".{fraction:02}");
        }
    }
    out
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Escape text for inclusion in HTML.
#[must_use]
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
