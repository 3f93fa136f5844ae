//! Display formatting for quote fields.

use std::fmt;

/// Read the leading decimal number of `text`, ignoring whatever follows.
///
/// `"12abc"` reads as 12 and `"Infinity"` as infinity; text without a numeric
/// prefix reads as NaN.
pub fn parse_number(text: &str) -> f64 {
    let s = text.trim_start();
    let bytes = s.as_bytes();
    let digit_at = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int_start = end;
    while digit_at(end) {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let mut frac_end = end + 1;
        while digit_at(frac_end) {
            frac_end += 1;
        }
        mantissa_digits += frac_end - end - 1;
        if frac_end > end + 1 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while digit_at(exp_end) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

/// Format a textual USD price as en-US currency.
///
/// Prices below 1 keep 4 to 6 fraction digits, everything else exactly 2.
/// Only the leading numeric prefix is read (see [`parse_number`]); text
/// without one renders as `$NaN`.
pub fn format_currency(value: &str) -> String {
    let number = parse_number(value);
    if number.is_nan() {
        return "$NaN".to_string();
    }

    let sign = if number < 0.0 { "-" } else { "" };
    if number.is_infinite() {
        return format!("{sign}$∞");
    }

    let (min_fraction, max_fraction) = if number < 1.0 { (4, 6) } else { (2, 2) };
    let rounded = format!("{:.*}", max_fraction, number.abs());
    let (integer, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));

    let mut fraction = fraction.to_string();
    while fraction.len() > min_fraction && fraction.ends_with('0') {
        fraction.pop();
    }

    format!("{sign}${}.{fraction}", group_thousands(integer))
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// Direction of a 24h move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn arrow(self) -> char {
        match self {
            Self::Up => '↑',
            Self::Down => '↓',
        }
    }
}

/// 24h change, parsed from its textual percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceChange {
    pub percent: f64,
}

impl PriceChange {
    pub fn parse(value: &str) -> Self {
        Self { percent: parse_number(value) }
    }

    /// Up only for strictly positive moves.
    pub fn direction(&self) -> Direction {
        if self.percent > 0.0 { Direction::Up } else { Direction::Down }
    }

    /// Absolute move with 2 fraction digits, e.g. `1.23%`.
    pub fn magnitude(&self) -> String {
        format!("{:.2}%", self.percent.abs())
    }
}

impl fmt::Display for PriceChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{} {}", self.direction().arrow(), self.magnitude()))
    }
}
