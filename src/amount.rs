use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Currency symbols recognised in addition to the configured one.
const KNOWN_SYMBOLS: &[&str] = &["IDR", "Rp", "US$", "$", "€", "£", "¥"];

/// How amounts are written in the spreadsheet and on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountFormat {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    #[serde(default = "default_thousands_sep")]
    pub thousands_sep: char,
    #[serde(default = "default_decimal_sep")]
    pub decimal_sep: char,
}

fn default_symbol() -> String {
    "$".to_string()
}

fn default_thousands_sep() -> char {
    ','
}

fn default_decimal_sep() -> char {
    '.'
}

impl Default for AmountFormat {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            thousands_sep: default_thousands_sep(),
            decimal_sep: default_decimal_sep(),
        }
    }
}

static DISPLAY_FORMAT: OnceLock<AmountFormat> = OnceLock::new();

/// Install the format used by [`crate::fmt::money`]. Only the first call wins.
pub fn set_display_format(format: AmountFormat) {
    let _ = DISPLAY_FORMAT.set(format);
}

pub fn display_format() -> &'static AmountFormat {
    DISPLAY_FORMAT.get_or_init(AmountFormat::default)
}

impl AmountFormat {
    /// Render `value` with grouping and two decimals: `-$1,234.56`.
    pub fn format(&self, value: f64) -> String {
        let negative = value < 0.0 && (value * 100.0).round() != 0.0;
        let fixed = format!("{:.2}", value.abs());
        let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

        let mut grouped = String::new();
        for (i, c) in int_part.chars().rev().enumerate() {
            if i > 0 && i % 3 == 0 {
                grouped.push(self.thousands_sep);
            }
            grouped.push(c);
        }
        let grouped: String = grouped.chars().rev().collect();

        let spacer = if self.symbol.chars().last().is_some_and(char::is_alphabetic) {
            " "
        } else {
            ""
        };
        let sign = if negative { "-" } else { "" };
        format!(
            "{sign}{}{spacer}{grouped}{}{dec_part}",
            self.symbol, self.decimal_sep
        )
    }

    fn is_separator(&self, c: char) -> bool {
        c == '.' || c == ',' || c == self.thousands_sep || c == self.decimal_sep
    }
}

/// Parse a locale-formatted currency string such as `$1,234.56`,
/// `Rp 1.234.567`, `-€12,50` or `(1,000.00)`.
pub fn parse_amount(text: &str, format: &AmountFormat) -> Result<f64> {
    let err = || AppError::parse("amount", text);

    let mut body: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}' && *c != '\'')
        .collect();
    if body.is_empty() {
        return Err(err());
    }

    let mut negative = false;
    if body.starts_with('(') && body.ends_with(')') {
        negative = true;
        body = body[1..body.len() - 1].to_string();
    }
    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.to_string();
    }
    body = strip_symbol(&body, format);
    if let Some(rest) = body.strip_prefix('-') {
        negative = !negative;
        body = rest.to_string();
    }
    if let Some(rest) = body.strip_suffix('-') {
        negative = !negative;
        body = rest.to_string();
    }
    body = strip_symbol(&body, format);

    let number = normalize_digits(&body, format).ok_or_else(err)?;
    let value: f64 = number.parse().map_err(|_| err())?;
    Ok(if negative { -value } else { value })
}

fn strip_symbol(body: &str, format: &AmountFormat) -> String {
    let configured = format.symbol.trim();
    let candidates = std::iter::once(configured)
        .chain(KNOWN_SYMBOLS.iter().copied())
        .filter(|s| !s.is_empty());
    for symbol in candidates {
        let len = symbol.len();
        if body.len() >= len
            && body.is_char_boundary(len)
            && body[..len].eq_ignore_ascii_case(symbol)
        {
            return body[len..].to_string();
        }
        let tail = body.len().saturating_sub(len);
        if body.len() > len
            && body.is_char_boundary(tail)
            && body[tail..].eq_ignore_ascii_case(symbol)
        {
            return body[..tail].to_string();
        }
    }
    body.to_string()
}

/// Reduce grouped digits to a plain `1234.56` string, working out which
/// separator is the decimal point.
fn normalize_digits(body: &str, format: &AmountFormat) -> Option<String> {
    if !body.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if body
        .chars()
        .any(|c| !c.is_ascii_digit() && !format.is_separator(c))
    {
        return None;
    }

    let mut kinds: Vec<char> = Vec::new();
    for c in body.chars().filter(|c| !c.is_ascii_digit()) {
        if !kinds.contains(&c) {
            kinds.push(c);
        }
    }

    let decimal = match kinds.as_slice() {
        [] => None,
        [only] => {
            let count = body.chars().filter(|c| c == only).count();
            let digits_after = body.rsplit(*only).next().map(str::len).unwrap_or(0);
            if count > 1 {
                None
            } else if *only == format.decimal_sep && *only != format.thousands_sep {
                Some(*only)
            } else if digits_after == 3 {
                None
            } else {
                Some(*only)
            }
        }
        [_, _] => body.chars().rev().find(|c| !c.is_ascii_digit()),
        _ => return None,
    };

    let mut out = String::with_capacity(body.len());
    for c in body.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if Some(c) == decimal {
            out.push('.');
        }
    }
    if out.starts_with('.') {
        out.insert(0, '0');
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rupiah() -> AmountFormat {
        AmountFormat {
            symbol: "Rp".to_string(),
            thousands_sep: '.',
            decimal_sep: ',',
        }
    }

    #[test]
    fn test_parse_plain_and_grouped() {
        let f = AmountFormat::default();
        assert_eq!(parse_amount("42", &f).unwrap(), 42.0);
        assert_eq!(parse_amount("1,234.56", &f).unwrap(), 1234.56);
        assert_eq!(parse_amount("$1,234,567.89", &f).unwrap(), 1234567.89);
        assert_eq!(parse_amount("  $ 12.5 ", &f).unwrap(), 12.5);
    }

    #[test]
    fn test_parse_negative_forms() {
        let f = AmountFormat::default();
        assert_eq!(parse_amount("-$500.00", &f).unwrap(), -500.0);
        assert_eq!(parse_amount("$-500.00", &f).unwrap(), -500.0);
        assert_eq!(parse_amount("(1,000.00)", &f).unwrap(), -1000.0);
        assert_eq!(parse_amount("75-", &f).unwrap(), -75.0);
    }

    #[test]
    fn test_parse_rupiah_grouping() {
        let f = rupiah();
        assert_eq!(parse_amount("Rp 1.234.567", &f).unwrap(), 1234567.0);
        assert_eq!(parse_amount("Rp1.500,50", &f).unwrap(), 1500.5);
        assert_eq!(parse_amount("IDR 25.000", &f).unwrap(), 25000.0);
        assert_eq!(parse_amount("12,5", &f).unwrap(), 12.5);
    }

    #[test]
    fn test_single_separator_with_three_digits_is_grouping() {
        let f = AmountFormat::default();
        assert_eq!(parse_amount("1,234", &f).unwrap(), 1234.0);
        assert_eq!(parse_amount("1.5", &f).unwrap(), 1.5);
        let r = rupiah();
        assert_eq!(parse_amount("25.000", &r).unwrap(), 25000.0);
    }

    #[test]
    fn test_mixed_separators_last_one_is_decimal() {
        let r = rupiah();
        assert_eq!(parse_amount("1,234.56", &r).unwrap(), 1234.56);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let f = AmountFormat::default();
        assert!(parse_amount("", &f).is_err());
        assert!(parse_amount("$", &f).is_err());
        assert!(parse_amount("abc", &f).is_err());
        assert!(parse_amount("12a", &f).is_err());
    }

    #[test]
    fn test_format_default() {
        let f = AmountFormat::default();
        assert_eq!(f.format(1234.56), "$1,234.56");
        assert_eq!(f.format(-500.0), "-$500.00");
        assert_eq!(f.format(0.0), "$0.00");
        assert_eq!(f.format(1000000.99), "$1,000,000.99");
        assert_eq!(f.format(-0.001), "$0.00");
    }

    #[test]
    fn test_format_rupiah() {
        assert_eq!(rupiah().format(1234567.0), "Rp 1.234.567,00");
    }
}
