// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::budget::{
    MonthFigures, account_balances, compute_cashflow, decision_base, monthly_history,
};
use crate::engine::currency::{format_currency_brl, format_percent};
use crate::store::{self, TxFilter, month_bounds};
use crate::utils::{json_flags, maybe_print_json, month_or_current, optional, pretty_table};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("balances", sub)) => balances(conn, sub)?,
        Some(("cashflow", sub)) => cashflow(conn, sub)?,
        Some(("history", sub)) => history(conn, sub)?,
        Some(("decisions", sub)) => decisions(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn balances(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let txs = store::list_transactions(conn, &TxFilter::default())?;
    let data = account_balances(&txs);
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .iter()
            .map(|b| {
                vec![
                    b.account.clone(),
                    format_currency_brl(b.balance),
                    b.last_update.map(|d| d.to_string()).unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Account", "Balance", "Last activity"], rows)
        );
    }
    Ok(())
}

fn cashflow(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let (year, month) = month_or_current(sub)?;
    let txs = store::list_transactions(
        conn,
        &TxFilter {
            month: Some((year, month)),
            account: optional(sub, "account"),
            ..Default::default()
        },
    )?;
    let c = compute_cashflow(&txs, month, year)?;
    if !maybe_print_json(json_flag, jsonl_flag, &c)? {
        let rows = c
            .breakdown
            .iter()
            .map(|l| {
                vec![
                    l.category.clone(),
                    l.kind.as_str().to_string(),
                    format_currency_brl(l.amount),
                    format_percent(l.percentage),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Category", "Kind", "Spent", "Share"], rows)
        );
        println!(
            "{:02}/{}: income {}, expenses {}, balance {}, savings rate {}",
            c.month,
            c.year,
            format_currency_brl(c.income),
            format_currency_brl(c.expenses),
            format_currency_brl(c.balance),
            format_percent(c.savings_rate)
        );
        println!(
            "cost of living {}, debt payments {}",
            format_currency_brl(c.cost_of_living),
            format_currency_brl(c.debt_payments)
        );
    }
    Ok(())
}

fn history(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let (year, month) = month_or_current(sub)?;
    let months = sub.get_one::<u32>("months").copied().unwrap_or(6);
    let (_, end) = month_bounds(year, month)?;
    let txs = store::list_transactions(conn, &account_filter(sub))?;
    let data = monthly_history(&txs, end, months)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data
            .into_iter()
            .map(|f| {
                vec![
                    f.month,
                    format_currency_brl(f.income),
                    format_currency_brl(f.expenses),
                    format_currency_brl(f.balance),
                    format_percent(f.savings_rate),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Month", "Income", "Expenses", "Balance", "Savings"],
                rows
            )
        );
    }
    Ok(())
}

fn account_filter(sub: &clap::ArgMatches) -> TxFilter {
    TxFilter {
        account: optional(sub, "account"),
        ..Default::default()
    }
}

fn decisions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let (year, month) = month_or_current(sub)?;
    let txs = store::list_transactions(conn, &account_filter(sub))?;
    let d = decision_base(&txs, month, year)?;
    if maybe_print_json(json_flag, jsonl_flag, &d)? {
        return Ok(());
    }
    let row = |label: &str, f: &MonthFigures| {
        vec![
            label.to_string(),
            format_currency_brl(f.income),
            format_currency_brl(f.expenses),
            format_currency_brl(f.balance),
            format_currency_brl(f.cost_of_living),
            format_percent(f.savings_rate),
        ]
    };
    let rows = vec![
        row(&format!("{:02}/{}", month, year), &d.current),
        row("previous", &d.previous),
        row("3-month avg", &d.average_3_months),
    ];
    println!(
        "{}",
        pretty_table(
            &["Period", "Income", "Expenses", "Balance", "Cost of living", "Savings"],
            rows
        )
    );
    println!(
        "income {}, expenses {}, savings rate {} p.p.",
        signed_pct(d.trends.income_change),
        signed_pct(d.trends.expense_change),
        d.trends.savings_rate_change.normalize()
    );
    Ok(())
}

fn signed_pct(v: rust_decimal::Decimal) -> String {
    if v.is_sign_positive() && !v.is_zero() {
        format!("+{}", format_percent(v))
    } else {
        format_percent(v)
    }
}
