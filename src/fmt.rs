use crate::amount::display_format;

/// Format a float as a currency amount in the configured display format: $1,234.56
pub fn money(val: f64) -> String {
    display_format().format(val)
}

/// Format an integer with thousands separators: 12,345
pub fn number(val: i64) -> String {
    let digits = val.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if val < 0 {
        out.push('-');
    }
    out.chars().rev().collect()
}

/// Compact amount for chart axes: "$2.5k", "$1M", "$300".
pub fn compact(val: f64) -> String {
    let symbol = &display_format().symbol;
    if val >= 1_000_000.0 {
        let m = val / 1_000_000.0;
        if m == m.floor() {
            format!("{symbol}{}M", m as u64)
        } else {
            format!("{symbol}{:.1}M", m)
        }
    } else if val >= 1000.0 {
        let k = val / 1000.0;
        if k == k.floor() {
            format!("{symbol}{}k", k as u64)
        } else {
            format!("{symbol}{:.1}k", k)
        }
    } else {
        format!("{symbol}{}", val as u64)
    }
}

pub fn percent(val: f64) -> String {
    format!("{val:.1}%")
}

/// Human-readable file size: "512 B", "1.5 KB", "2.0 MB".
pub fn format_bytes(size: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{size} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
