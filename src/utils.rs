// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local, NaiveDate};
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::engine::currency::parse_currency_input;

const UA: &str = concat!(
    "opsbook/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/opsbook)"
);

pub fn http_client() -> Result<reqwest::blocking::Client> {
    let c = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .user_agent(UA)
        .build()?;
    Ok(c)
}

pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

/// `YYYY-MM` into `(year, month)`.
pub fn parse_month(s: &str) -> Result<(i32, u32)> {
    let d = NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", s))?;
    Ok((d.year(), d.month()))
}

/// Month from `--month`, or the current one.
pub fn month_or_current(m: &clap::ArgMatches) -> Result<(i32, u32)> {
    match m.get_one::<String>("month") {
        Some(s) => parse_month(s),
        None => {
            let t = today();
            Ok((t.year(), t.month()))
        }
    }
}

/// Plain (`1234.56`, `1,234.56`) or Brazilian (`1.234,56`, `R$ 10,00`)
/// notation. When both separators appear, the last one is the decimal point.
pub fn parse_decimal(s: &str) -> Result<Decimal> {
    let t = s.trim();
    if let Ok(d) = t.parse::<Decimal>() {
        return Ok(d);
    }
    if matches!((t.rfind(','), t.rfind('.')), (Some(comma), Some(dot)) if comma < dot) {
        return comma_grouped(t).ok_or_else(|| anyhow!("Invalid decimal '{}'", s));
    }
    if t.contains(',') && t.chars().any(|c| c.is_ascii_digit()) {
        let v = parse_currency_input(t);
        return Ok(if t.starts_with('-') { -v } else { v });
    }
    Err(anyhow!("Invalid decimal '{}'", s))
}

/// `1,234.56`: comma groups of three digits before a single decimal point.
fn comma_grouped(t: &str) -> Option<Decimal> {
    let (int_part, frac) = t.split_once('.')?;
    let digits = int_part.strip_prefix('-').unwrap_or(int_part);
    let mut groups = digits.split(',');
    let head = groups.next()?;
    let head_ok = (1..=3).contains(&head.len()) && head.chars().all(|c| c.is_ascii_digit());
    let rest_ok = groups.all(|g| g.len() == 3 && g.chars().all(|c| c.is_ascii_digit()));
    if !head_ok || !rest_ok {
        return None;
    }
    format!("{}.{}", int_part.replace(',', ""), frac)
        .parse::<Decimal>()
        .ok()
}

/// Value of a required string argument.
pub fn required<'a>(m: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    m.get_one::<String>(name)
        .map(|s| s.as_str())
        .with_context(|| format!("Missing argument '{}'", name))
}

/// Value of an optional string argument, trimmed; blank counts as absent.
pub fn optional(m: &clap::ArgMatches, name: &str) -> Option<String> {
    m.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_id(m: &clap::ArgMatches) -> Result<i64> {
    m.get_one::<i64>("id")
        .copied()
        .context("Missing argument 'id'")
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // arrays stream one element per line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}

pub fn json_flags(m: &clap::ArgMatches) -> (bool, bool) {
    (m.get_flag("json"), m.get_flag("jsonl"))
}

// Settings

pub const REMOTE_URL: &str = "remote.url";
pub const REMOTE_TOKEN: &str = "remote.token";
pub const PROPOSAL_PAYMENT_METHOD: &str = "proposal.payment_method";
pub const BUDGET_TOP_CATEGORIES: &str = "budget.top_categories";

pub const KNOWN_SETTINGS: [&str; 4] = [
    REMOTE_URL,
    REMOTE_TOKEN,
    PROPOSAL_PAYMENT_METHOD,
    BUDGET_TOP_CATEGORIES,
];

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let v: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn unset_setting(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM settings WHERE key=?1", params![key])? > 0)
}

pub fn list_settings(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
    let rows = stmt.query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// How many ranked categories the budget summary shows.
pub fn top_categories_setting(conn: &Connection) -> Result<usize> {
    match get_setting(conn, BUDGET_TOP_CATEGORIES)? {
        Some(v) => v
            .trim()
            .parse::<usize>()
            .with_context(|| format!("Invalid {} '{}'", BUDGET_TOP_CATEGORIES, v)),
        None => Ok(3),
    }
}

pub fn default_payment_method(conn: &Connection) -> Result<crate::models::PaymentMethod> {
    match get_setting(conn, PROPOSAL_PAYMENT_METHOD)? {
        Some(v) => v.parse(),
        None => Ok(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decimal_notations() {
        assert_eq!(parse_decimal("1234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("1,234.56").unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("-12,345,678.9").unwrap(), dec!(-12345678.9));
        assert_eq!(parse_decimal("1.234,56").unwrap(), dec!(1234.56));
        assert_eq!(parse_decimal("10,50").unwrap(), dec!(10.50));
    }

    #[test]
    fn malformed_grouping_is_rejected() {
        assert!(parse_decimal("12,34.56").is_err());
        assert!(parse_decimal("1,2345.6").is_err());
        assert!(parse_decimal("1,234.5.6").is_err());
        assert!(parse_decimal("abc").is_err());
    }
}
