// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::kpi::kpi_invariant_violations;
use crate::models::{BudgetGoal, Proposal};
use crate::store;
use crate::utils::pretty_table;
use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

/// One problem found in the stored data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub issue: &'static str,
    pub detail: String,
}

impl Finding {
    fn new(issue: &'static str, detail: impl Into<String>) -> Self {
        Self {
            issue,
            detail: detail.into(),
        }
    }
}

pub fn handle(conn: &Connection) -> Result<()> {
    let findings = diagnose(conn)?;
    if findings.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = findings
            .into_iter()
            .map(|f| vec![f.issue.to_string(), f.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Runs every check. Money columns are scanned raw first; the typed loaders
/// would refuse a row with a bad decimal.
pub fn diagnose(conn: &Connection) -> Result<Vec<Finding>> {
    let mut out = Vec::new();
    let bad_money = check_money_columns(conn, &mut out)?;

    if !bad_money {
        check_transactions(conn, &mut out)?;
        check_budget_goals(&store::list_budget_goals(conn, None)?, &mut out);
        check_proposals(&store::list_proposals(conn)?, &mut out);
    }
    for v in kpi_invariant_violations(&store::list_kpis(conn)?) {
        out.push(Finding::new("kpi_visibility", v));
    }
    Ok(out)
}

fn check_money_columns(conn: &Connection, out: &mut Vec<Finding>) -> Result<bool> {
    const COLUMNS: [(&str, &str); 5] = [
        ("transactions", "amount"),
        ("budget_goals", "budget_amount"),
        ("proposals", "total"),
        ("goals", "actual"),
        ("goals", "target"),
    ];
    let before = out.len();
    for (table, column) in COLUMNS {
        let mut stmt = conn.prepare(&format!("SELECT id, {column} FROM {table}"))?;
        let mut rows = stmt.query([])?;
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let raw: String = r.get(1)?;
            if Decimal::from_str(&raw).is_err() {
                out.push(Finding::new(
                    "bad_decimal",
                    format!("{table}.{column} id {id}: '{raw}'"),
                ));
            }
        }
    }
    Ok(out.len() > before)
}

fn check_transactions(conn: &Connection, out: &mut Vec<Finding>) -> Result<()> {
    let known: Vec<String> = store::list_categories(conn)?
        .into_iter()
        .map(|c| c.name.to_lowercase())
        .collect();
    for t in store::list_transactions(conn, &Default::default())? {
        if t.amount.is_sign_negative() && !t.amount.is_zero() {
            out.push(Finding::new(
                "negative_amount",
                format!("transaction {} '{}': {}", t.id, t.name, t.amount),
            ));
        }
        if let Some(c) = t
            .category
            .as_deref()
            .filter(|c| !c.trim().is_empty() && !known.contains(&c.to_lowercase()))
        {
            out.push(Finding::new(
                "unknown_category",
                format!("transaction {} uses '{}'", t.id, c),
            ));
        }
    }
    Ok(())
}

fn check_budget_goals(goals: &[BudgetGoal], out: &mut Vec<Finding>) {
    for g in goals {
        if let Err(e) = g.validate() {
            out.push(Finding::new("budget_goal", format!("goal {}: {}", g.id, e)));
        }
    }
}

fn check_proposals(proposals: &[Proposal], out: &mut Vec<Finding>) {
    for p in proposals {
        if let Err(e) = p.validate() {
            out.push(Finding::new("proposal", format!("proposal {}: {}", p.id, e)));
        }
        for issue in p.issues() {
            out.push(Finding::new("proposal", format!("proposal {}: {}", p.id, issue)));
        }
    }
}
