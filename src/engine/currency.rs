// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Brazilian-real money parsing and formatting.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::models::{Adjustment, AdjustmentKind};

/// Rounds to cents, half away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parses what a user typed into a money field.
///
/// Everything except digits and commas is dropped and the first comma becomes
/// the decimal point, so `"R$ 1.234,5"` reads as `1234.5`. Reading stops at a
/// second comma. Never fails: unusable input is zero.
pub fn parse_currency_input(raw: &str) -> Decimal {
    let mut cleaned = String::with_capacity(raw.len());
    let mut seen_separator = false;
    for c in raw.chars() {
        if c.is_ascii_digit() {
            cleaned.push(c);
        } else if c == ',' {
            if seen_separator {
                break;
            }
            seen_separator = true;
            cleaned.push('.');
        }
    }
    let cleaned = cleaned.trim_end_matches('.');
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }
    let normalized = if cleaned.starts_with('.') {
        format!("0{}", cleaned)
    } else {
        cleaned.to_string()
    };
    Decimal::from_str(&normalized).unwrap_or(Decimal::ZERO)
}

/// Two decimals with a comma separator and no grouping: `1234,56`.
pub fn format_currency_display(value: Decimal) -> String {
    let rounded = round_cents(value);
    let rounded = if rounded.is_zero() { Decimal::ZERO } else { rounded };
    format!("{:.2}", rounded).replace('.', ",")
}

/// Value for an editable field: zero renders empty so the placeholder shows.
pub fn format_currency_input(value: Decimal) -> String {
    if round_cents(value).is_zero() {
        String::new()
    } else {
        format_currency_display(value)
    }
}

/// Read-only display with symbol and thousands grouping: `R$ 1.234,56`.
pub fn format_currency_brl(value: Decimal) -> String {
    let rounded = round_cents(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
    format!(
        "{}R$ {},{}",
        if negative { "-" } else { "" },
        group_thousands(int_part),
        frac_part
    )
}

/// One decimal place with a comma separator: `12,5%`.
pub fn format_percent(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.1}%", rounded).replace('.', ",")
}

/// Amount a discount or tax represents against `base`.
pub fn apply_adjustment(base: Decimal, adjustment: &Adjustment) -> Decimal {
    match adjustment.kind {
        AdjustmentKind::Percent => base * adjustment.value / Decimal::ONE_HUNDRED,
        AdjustmentKind::Fixed => adjustment.value,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}
