// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::budget::{FinanceSummary, compute_summary};
use crate::engine::currency::{format_currency_brl, format_percent};
use crate::models::BudgetGoal;
use crate::store::{self, TxFilter, month_bounds};
use crate::utils::{
    json_flags, maybe_print_json, month_or_current, optional, parse_decimal, parse_month,
    pretty_table, required, required_id, top_categories_setting,
};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => set(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_budget_goal(conn, id)?;
            println!("Removed budget goal {}", id);
        }
        Some(("summary", sub)) => {
            summary(conn, sub)?;
        }
        _ => {}
    }
    Ok(())
}

fn set(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (year, month) = month_or_current(sub)?;
    let category = required(sub, "category")?.trim().to_string();
    let amount = parse_decimal(required(sub, "amount")?)?;
    let (period_start, period_end) = month_bounds(year, month)?;
    let goal = BudgetGoal {
        id: 0,
        name: optional(sub, "name")
            .unwrap_or_else(|| format!("{} {:02}/{}", category, month, year)),
        category,
        month,
        year,
        budget_amount: amount,
        period_start,
        period_end,
        notes: optional(sub, "notes"),
    };
    let stored = store::upsert_budget_goal(conn, &goal)?;
    println!(
        "Budget set for {:04}-{:02} / {} = {}",
        stored.year,
        stored.month,
        stored.category,
        format_currency_brl(stored.budget_amount)
    );
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let period = sub
        .get_one::<String>("month")
        .map(|m| parse_month(m))
        .transpose()?;
    let goals = store::list_budget_goals(conn, period)?;
    if !maybe_print_json(json_flag, jsonl_flag, &goals)? {
        let data = goals
            .into_iter()
            .map(|g| {
                vec![
                    g.id.to_string(),
                    format!("{:04}-{:02}", g.year, g.month),
                    g.category,
                    format_currency_brl(g.budget_amount),
                    g.notes.unwrap_or_default(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["ID", "Month", "Category", "Budget", "Notes"], data)
        );
    }
    Ok(())
}

/// Budget vs. actual for one month.
pub fn summary(conn: &Connection, sub: &clap::ArgMatches) -> Result<FinanceSummary> {
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
    let goals = store::list_budget_goals(conn, Some((year, month)))?;
    let s = compute_summary(&txs, &goals, month, year)?;
    let top_n = match sub.get_one::<usize>("top") {
        Some(n) => *n,
        None => top_categories_setting(conn)?,
    };

    if !maybe_print_json(json_flag, jsonl_flag, &s)? {
        let data = s
            .category_breakdown
            .iter()
            .map(|c| {
                vec![
                    c.category.clone(),
                    format_currency_brl(c.budgeted),
                    format_currency_brl(c.spent),
                    format_percent(c.percentage),
                    c.status.as_str().to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Category", "Budget", "Spent", "Used", "Status"], data)
        );
        println!(
            "{:02}/{}: budgeted {}, spent {}, available {} ({} used)",
            s.month,
            s.year,
            format_currency_brl(s.total_budgeted),
            format_currency_brl(s.total_spent),
            format_currency_brl(s.available_balance),
            format_percent(s.utilization_percentage)
        );
        let top = s.top(top_n);
        if !top.is_empty() {
            println!("Top spending:");
            for (i, c) in top.iter().enumerate() {
                println!(
                    "  {}. {} {} ({})",
                    i + 1,
                    c.category,
                    format_currency_brl(c.spent),
                    format_percent(c.percentage)
                );
            }
        }
    }
    Ok(s)
}
