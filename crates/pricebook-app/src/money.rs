// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};

/// The two locales used for currency and receipt labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    Ru,
    En,
}

impl Locale {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ru" => Some(Self::Ru),
            "en" => Some(Self::En),
            _ => None,
        }
    }

    /// Unit printed after prices on a receipt.
    pub const fn receipt_unit(self) -> &'static str {
        match self {
            Self::Ru => "с",
            Self::En => "som",
        }
    }

    /// Unit shown next to prices in the interactive list.
    pub const fn display_unit(self) -> &'static str {
        match self {
            Self::Ru => "сом",
            Self::En => "som",
        }
    }

    pub const fn total_label(self) -> &'static str {
        match self {
            Self::Ru => "Итого",
            Self::En => "Total",
        }
    }

    pub const fn header_placeholder(self) -> &'static str {
        match self {
            Self::Ru => "Без имени",
            Self::En => "Unnamed",
        }
    }

    pub const fn ungrouped_label(self) -> &'static str {
        match self {
            Self::Ru => "Без категории",
            Self::En => "Uncategorized",
        }
    }
}

/// `500.00 с`
pub fn format_receipt_price(cents: i64, locale: Locale) -> String {
    format!("{} {}", format_plain_cents(cents), locale.receipt_unit())
}

/// `500 сом` for whole amounts, `512.50 сом` otherwise.
pub fn format_display_price(cents: i64, locale: Locale) -> String {
    let (sign, abs) = normalize_sign(cents);
    let whole = abs / 100;
    let remainder = abs % 100;
    if remainder == 0 {
        format!("{sign}{whole} {}", locale.display_unit())
    } else {
        format!("{sign}{whole}.{remainder:02} {}", locale.display_unit())
    }
}

/// `1,250.00 сом`
pub fn format_total(cents: i64, locale: Locale) -> String {
    let (sign, abs) = normalize_sign(cents);
    format!(
        "{sign}{}.{:02} {}",
        comma_format(abs / 100),
        abs % 100,
        locale.display_unit()
    )
}

/// Two decimals, no unit, no grouping.
pub fn format_plain_cents(cents: i64) -> String {
    let (sign, abs) = normalize_sign(cents);
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Parses a decimal amount (`250`, `249.5`, `249,50`) into cents.
///
/// Rounds to the nearest cent. Returns `None` for anything that is not a
/// finite decimal number.
pub fn parse_decimal_cents(input: &str) -> Option<i64> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return None;
    }
    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    {
        return None;
    }
    let value: f64 = normalized.parse().ok()?;
    float_to_cents(value)
}

pub fn float_to_cents(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let cents = (value * 100.0).round();
    if cents.abs() > i64::MAX as f64 {
        return None;
    }
    Some(cents as i64)
}

pub fn cents_to_float(cents: i64) -> f64 {
    cents as f64 / 100.0
}

fn normalize_sign(cents: i64) -> (&'static str, i64) {
    if cents < 0 {
        ("-", cents.saturating_abs())
    } else {
        ("", cents)
    }
}

fn comma_format(value: i64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::{
        Locale, format_display_price, format_receipt_price, format_total, parse_decimal_cents,
    };

    #[test]
    fn receipt_price_has_two_decimals_and_short_unit() {
        assert_eq!(format_receipt_price(50_000, Locale::Ru), "500.00 с");
        assert_eq!(format_receipt_price(1_205, Locale::En), "12.05 som");
        assert_eq!(format_receipt_price(-150, Locale::Ru), "-1.50 с");
    }

    #[test]
    fn display_price_drops_zero_decimals() {
        assert_eq!(format_display_price(50_000, Locale::Ru), "500 сом");
        assert_eq!(format_display_price(51_250, Locale::Ru), "512.50 сом");
    }

    #[test]
    fn total_is_thousands_grouped() {
        assert_eq!(format_total(125_000, Locale::Ru), "1,250.00 сом");
        assert_eq!(format_total(123_456_789, Locale::En), "1,234,567.89 som");
        assert_eq!(format_total(0, Locale::Ru), "0.00 сом");
    }

    #[test]
    fn decimal_parsing_accepts_comma_and_rounds() {
        assert_eq!(parse_decimal_cents("250"), Some(25_000));
        assert_eq!(parse_decimal_cents(" 249,5 "), Some(24_950));
        assert_eq!(parse_decimal_cents("0.125"), Some(13));
        assert_eq!(parse_decimal_cents("abc"), None);
        assert_eq!(parse_decimal_cents(""), None);
        assert_eq!(parse_decimal_cents("inf"), None);
        assert_eq!(parse_decimal_cents("e"), None);
    }

    #[test]
    fn decimal_parsing_accepts_exponent_notation() {
        assert_eq!(parse_decimal_cents("1e3"), Some(100_000));
        assert_eq!(parse_decimal_cents("2.5E2"), Some(25_000));
        assert_eq!(parse_decimal_cents("1,5e1"), Some(1_500));
        assert_eq!(parse_decimal_cents("1e400"), None);
        assert_eq!(parse_decimal_cents("1e"), None);
    }

    #[test]
    fn locale_parse_is_case_insensitive() {
        assert_eq!(Locale::parse("RU"), Some(Locale::Ru));
        assert_eq!(Locale::parse(" en "), Some(Locale::En));
        assert_eq!(Locale::parse("kz"), None);
    }
}
