// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Local data service: typed reads and writes over the SQLite schema in
//! [`crate::db`]. Every read returns the authoritative stored state; nothing
//! is cached between calls.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, params, params_from_iter};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::str::FromStr;

use crate::engine::kpi::enforce_kpi_visibility;
use crate::models::{
    Adjustment, BudgetGoal, CategorizationRule, Category, Goal, Kpi, NewTransaction, Proposal,
    ProposalTotals, Transaction, TransactionPatch,
};

fn conversion_err(
    idx: usize,
    e: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
}

fn get_dec(r: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = r.get(idx)?;
    s.trim().parse::<Decimal>().map_err(|e| conversion_err(idx, e))
}

fn get_parsed<T: FromStr<Err = anyhow::Error>>(r: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = r.get(idx)?;
    s.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn get_json<T: DeserializeOwned>(r: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = r.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_err(idx, e))
}

fn blank_to_none(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Categories

/// Adds `name` to the central category list if it is not there yet.
pub fn ensure_category(conn: &Connection, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        return Ok(());
    }
    let n = conn.execute(
        "INSERT OR IGNORE INTO categories(name) VALUES (?1)",
        params![name],
    )?;
    if n > 0 {
        log::info!("new category '{}'", name);
    }
    Ok(())
}

pub fn list_categories(conn: &Connection) -> Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
    let rows = stmt.query_map([], |r| {
        Ok(Category {
            id: r.get(0)?,
            name: r.get(1)?,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Removes the name from the list. Records that use it keep their label.
pub fn delete_category(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM categories WHERE name=?1", params![name.trim()])? > 0)
}

/// Renames a category everywhere it is referenced, matching the old name
/// without regard to case like the category list does. Returns the number of
/// transactions relabelled.
pub fn rename_category(conn: &Connection, from: &str, to: &str) -> Result<usize> {
    let (from, to) = (from.trim(), to.trim());
    if to.is_empty() {
        return Err(anyhow!("New category name must not be empty"));
    }
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM categories WHERE name=?1", params![from])?;
    ensure_category(&tx, to)?;
    let n = tx.execute(
        "UPDATE transactions SET category=?1 WHERE trim(category)=?2 COLLATE NOCASE",
        params![to, from],
    )?;
    tx.execute(
        "UPDATE budget_goals SET category=?1 WHERE category=?2 COLLATE NOCASE",
        params![to, from],
    )?;
    tx.execute(
        "UPDATE categorization_rules SET category=?1 WHERE category=?2 COLLATE NOCASE",
        params![to, from],
    )?;
    tx.commit()?;
    Ok(n)
}

// Transactions

const TX_COLS: &str =
    "id, name, date, amount, type, account, category, description, reconciled, imported, file_source";

fn tx_from_row(r: &Row) -> rusqlite::Result<Transaction> {
    Ok(Transaction {
        id: r.get(0)?,
        name: r.get(1)?,
        date: r.get(2)?,
        amount: get_dec(r, 3)?,
        kind: get_parsed(r, 4)?,
        account: r.get(5)?,
        category: r.get(6)?,
        description: r.get(7)?,
        reconciled: r.get(8)?,
        imported: r.get(9)?,
        file_source: r.get(10)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct TxFilter {
    pub month: Option<(i32, u32)>,
    pub account: Option<String>,
    pub category: Option<String>,
    pub uncategorized: bool,
    pub newest_first: bool,
    pub limit: Option<usize>,
}

pub fn list_transactions(conn: &Connection, f: &TxFilter) -> Result<Vec<Transaction>> {
    let mut sql = format!("SELECT {} FROM transactions WHERE 1=1", TX_COLS);
    let mut params_vec: Vec<String> = Vec::new();

    if let Some((y, m)) = f.month {
        sql.push_str(" AND substr(date,1,7)=?");
        params_vec.push(format!("{:04}-{:02}", y, m));
    }
    if let Some(acct) = &f.account {
        sql.push_str(" AND account=?");
        params_vec.push(acct.clone());
    }
    if let Some(cat) = &f.category {
        sql.push_str(" AND category=?");
        params_vec.push(cat.clone());
    }
    if f.uncategorized {
        sql.push_str(" AND (category IS NULL OR trim(category)='')");
    }
    if f.newest_first {
        sql.push_str(" ORDER BY date DESC, id DESC");
    } else {
        sql.push_str(" ORDER BY date, id");
    }
    if let Some(limit) = f.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(params_vec.iter()), tx_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    conn.query_row(
        &format!("SELECT {} FROM transactions WHERE id=?1", TX_COLS),
        params![id],
        tx_from_row,
    )
    .optional()?
    .with_context(|| format!("Transaction {} not found", id))
}

pub fn insert_transaction(conn: &Connection, t: &NewTransaction) -> Result<i64> {
    t.validate()?;
    let category = blank_to_none(t.category.clone());
    if let Some(c) = &category {
        ensure_category(conn, c)?;
    }
    conn.execute(
        "INSERT INTO transactions(name, date, amount, type, account, category, description, imported, file_source)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
        params![
            t.name.trim(),
            t.date,
            t.amount.to_string(),
            t.kind.as_str(),
            t.account.trim(),
            category,
            blank_to_none(t.description.clone()),
            t.imported,
            t.file_source,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts or refreshes a record pulled from the remote service. Returns the
/// local id and whether the row is new.
pub fn upsert_transaction_external(
    conn: &Connection,
    external_id: &str,
    t: &NewTransaction,
) -> Result<(i64, bool)> {
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM transactions WHERE external_id=?1",
            params![external_id],
            |r| r.get(0),
        )
        .optional()?;
    match existing {
        Some(id) => {
            let patch = TransactionPatch {
                name: Some(t.name.clone()),
                date: Some(t.date),
                amount: Some(t.amount),
                kind: Some(t.kind),
                account: Some(t.account.clone()),
                category: Some(t.category.clone().unwrap_or_default()),
                description: Some(t.description.clone().unwrap_or_default()),
                reconciled: None,
            };
            update_transaction(conn, id, &patch)?;
            Ok((id, false))
        }
        None => {
            let id = insert_transaction(conn, t)?;
            conn.execute(
                "UPDATE transactions SET external_id=?1 WHERE id=?2",
                params![external_id, id],
            )?;
            Ok((id, true))
        }
    }
}

/// Writes only the fields present in `patch`. A blank category or
/// description clears the field.
pub fn update_transaction(
    conn: &Connection,
    id: i64,
    patch: &TransactionPatch,
) -> Result<Transaction> {
    let current = get_transaction(conn, id)?;
    if patch.is_empty() {
        return Ok(current);
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(anyhow!("Transaction name must not be empty"));
        }
        sets.push("name=?");
        values.push(Box::new(name.trim().to_string()));
    }
    if let Some(date) = patch.date {
        sets.push("date=?");
        values.push(Box::new(date));
    }
    if let Some(amount) = patch.amount {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(anyhow!("Amount must not be negative; use the type to set direction"));
        }
        sets.push("amount=?");
        values.push(Box::new(amount.to_string()));
    }
    if let Some(kind) = patch.kind {
        sets.push("type=?");
        values.push(Box::new(kind.as_str()));
    }
    if let Some(account) = &patch.account {
        sets.push("account=?");
        values.push(Box::new(account.trim().to_string()));
    }
    if let Some(category) = &patch.category {
        let category = blank_to_none(Some(category.clone()));
        if let Some(c) = &category {
            ensure_category(conn, c)?;
        }
        sets.push("category=?");
        values.push(Box::new(category));
    }
    if let Some(description) = &patch.description {
        sets.push("description=?");
        values.push(Box::new(blank_to_none(Some(description.clone()))));
    }
    if let Some(reconciled) = patch.reconciled {
        sets.push("reconciled=?");
        values.push(Box::new(reconciled));
    }
    values.push(Box::new(id));

    let sql = format!("UPDATE transactions SET {} WHERE id=?", sets.join(", "));
    conn.execute(&sql, params_from_iter(values.iter()))?;
    log::debug!("updated transaction {} ({})", id, sets.join(", "));
    get_transaction(conn, id)
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM transactions WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Transaction {} not found", id));
    }
    Ok(())
}

/// Persists `(id, category)` pairs produced by the rule engine or a bulk
/// override. Callers wrap this in a transaction.
pub fn set_transaction_categories(conn: &Connection, changes: &[(i64, String)]) -> Result<usize> {
    let mut stmt = conn.prepare("UPDATE transactions SET category=?1 WHERE id=?2")?;
    let mut n = 0;
    for (id, category) in changes {
        ensure_category(conn, category)?;
        n += stmt.execute(params![category, id])?;
    }
    Ok(n)
}

// Budget goals

const GOAL_COLS: &str =
    "id, name, category, month, year, budget_amount, period_start, period_end, notes";

fn budget_goal_from_row(r: &Row) -> rusqlite::Result<BudgetGoal> {
    Ok(BudgetGoal {
        id: r.get(0)?,
        name: r.get(1)?,
        category: r.get(2)?,
        month: r.get(3)?,
        year: r.get(4)?,
        budget_amount: get_dec(r, 5)?,
        period_start: r.get(6)?,
        period_end: r.get(7)?,
        notes: r.get(8)?,
    })
}

/// Creates the goal, or replaces the one already set for the same category
/// and month. Returns the stored record.
pub fn upsert_budget_goal(conn: &Connection, g: &BudgetGoal) -> Result<BudgetGoal> {
    g.validate()?;
    ensure_category(conn, &g.category)?;
    conn.execute(
        "INSERT INTO budget_goals(name, category, month, year, budget_amount, period_start, period_end, notes)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
         ON CONFLICT(category, month, year) DO UPDATE SET
            name=excluded.name,
            budget_amount=excluded.budget_amount,
            period_start=excluded.period_start,
            period_end=excluded.period_end,
            notes=excluded.notes",
        params![
            g.name.trim(),
            g.category.trim(),
            g.month,
            g.year,
            g.budget_amount.to_string(),
            g.period_start,
            g.period_end,
            g.notes,
        ],
    )?;
    let stored = conn.query_row(
        &format!(
            "SELECT {} FROM budget_goals WHERE category=?1 AND month=?2 AND year=?3",
            GOAL_COLS
        ),
        params![g.category.trim(), g.month, g.year],
        budget_goal_from_row,
    )?;
    Ok(stored)
}

pub fn budget_goal_id_for_external(conn: &Connection, external_id: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM budget_goals WHERE external_id=?1",
            params![external_id],
            |r| r.get(0),
        )
        .optional()?)
}

/// Id of the goal set for the same category and month, if any.
pub fn budget_goal_id_for_key(conn: &Connection, g: &BudgetGoal) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM budget_goals WHERE category=?1 AND month=?2 AND year=?3",
            params![g.category.trim(), g.month, g.year],
            |r| r.get(0),
        )
        .optional()?)
}

/// Overwrites every field of goal `id`, category and period included.
pub fn replace_budget_goal(conn: &Connection, id: i64, g: &BudgetGoal) -> Result<BudgetGoal> {
    g.validate()?;
    ensure_category(conn, &g.category)?;
    let n = conn.execute(
        "UPDATE budget_goals SET name=?1, category=?2, month=?3, year=?4, budget_amount=?5,
            period_start=?6, period_end=?7, notes=?8
         WHERE id=?9",
        params![
            g.name.trim(),
            g.category.trim(),
            g.month,
            g.year,
            g.budget_amount.to_string(),
            g.period_start,
            g.period_end,
            g.notes,
            id,
        ],
    )?;
    if n == 0 {
        return Err(anyhow!("Budget goal {} not found", id));
    }
    Ok(conn.query_row(
        &format!("SELECT {} FROM budget_goals WHERE id=?1", GOAL_COLS),
        params![id],
        budget_goal_from_row,
    )?)
}

pub fn set_budget_goal_external(conn: &Connection, id: i64, external_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE budget_goals SET external_id=?1 WHERE id=?2",
        params![external_id, id],
    )?;
    Ok(())
}

pub fn list_budget_goals(conn: &Connection, period: Option<(i32, u32)>) -> Result<Vec<BudgetGoal>> {
    let mut out = Vec::new();
    match period {
        Some((y, m)) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM budget_goals WHERE year=?1 AND month=?2 ORDER BY category",
                GOAL_COLS
            ))?;
            for r in stmt.query_map(params![y, m], budget_goal_from_row)? {
                out.push(r?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM budget_goals ORDER BY year, month, category",
                GOAL_COLS
            ))?;
            for r in stmt.query_map([], budget_goal_from_row)? {
                out.push(r?);
            }
        }
    }
    Ok(out)
}

pub fn delete_budget_goal(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM budget_goals WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Budget goal {} not found", id));
    }
    Ok(())
}

// Categorization rules

fn rule_from_row(r: &Row) -> rusqlite::Result<CategorizationRule> {
    Ok(CategorizationRule {
        id: r.get(0)?,
        name: r.get(1)?,
        pattern: r.get(2)?,
        category: r.get(3)?,
        priority: r.get(4)?,
        active: r.get(5)?,
    })
}

/// Rules in evaluation order: highest priority first, then oldest first.
pub fn list_rules(conn: &Connection) -> Result<Vec<CategorizationRule>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, pattern, category, priority, active FROM categorization_rules
         ORDER BY priority DESC, id ASC",
    )?;
    let rows = stmt.query_map([], rule_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn insert_rule(
    conn: &Connection,
    name: &str,
    pattern: &str,
    category: &str,
    priority: i64,
) -> Result<i64> {
    let pattern = pattern.trim();
    let category = category.trim();
    if pattern.is_empty() {
        return Err(anyhow!("Rule pattern must not be empty"));
    }
    if category.is_empty() {
        return Err(anyhow!("Rule category must not be empty"));
    }
    ensure_category(conn, category)?;
    let name = if name.trim().is_empty() { pattern } else { name.trim() };
    conn.execute(
        "INSERT INTO categorization_rules(name, pattern, category, priority, active)
         VALUES (?1,?2,?3,?4,1)",
        params![name, pattern, category, priority],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn upsert_rule_external(
    conn: &Connection,
    external_id: &str,
    rule: &CategorizationRule,
) -> Result<bool> {
    ensure_category(conn, &rule.category)?;
    let n = conn.execute(
        "UPDATE categorization_rules SET name=?1, pattern=?2, category=?3, priority=?4, active=?5
         WHERE external_id=?6",
        params![
            rule.name,
            rule.pattern,
            rule.category,
            rule.priority,
            rule.active,
            external_id
        ],
    )?;
    if n > 0 {
        return Ok(false);
    }
    conn.execute(
        "INSERT INTO categorization_rules(external_id, name, pattern, category, priority, active)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            external_id,
            rule.name,
            rule.pattern,
            rule.category,
            rule.priority,
            rule.active
        ],
    )?;
    Ok(true)
}

pub fn set_rule_active(conn: &Connection, id: i64, active: bool) -> Result<()> {
    let n = conn.execute(
        "UPDATE categorization_rules SET active=?1 WHERE id=?2",
        params![active, id],
    )?;
    if n == 0 {
        return Err(anyhow!("Rule {} not found", id));
    }
    Ok(())
}

pub fn delete_rule(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM categorization_rules WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Rule {} not found", id));
    }
    Ok(())
}

// Proposals

const PROPOSAL_COLS: &str = "id, number, date, valid_until, client, services, discount_kind, discount_value, tax_kind, tax_value, subtotal, discount_amount, tax_amount, total, payment_terms, status, rejection_reason, observations";

fn proposal_from_row(r: &Row) -> rusqlite::Result<Proposal> {
    let discount_kind: String = r.get(6)?;
    let tax_kind: String = r.get(8)?;
    Ok(Proposal {
        id: r.get(0)?,
        number: r.get(1)?,
        date: r.get(2)?,
        valid_until: r.get(3)?,
        client: get_json(r, 4)?,
        services: get_json(r, 5)?,
        discount: Adjustment {
            kind: discount_kind.parse().map_err(|e| conversion_err(6, e))?,
            value: get_dec(r, 7)?,
        },
        tax: Adjustment {
            kind: tax_kind.parse().map_err(|e| conversion_err(8, e))?,
            value: get_dec(r, 9)?,
        },
        totals: ProposalTotals {
            subtotal: get_dec(r, 10)?,
            discount_amount: get_dec(r, 11)?,
            tax_amount: get_dec(r, 12)?,
            total: get_dec(r, 13)?,
        },
        payment_terms: get_json(r, 14)?,
        status: get_parsed(r, 15)?,
        rejection_reason: r.get(16)?,
        observations: r.get(17)?,
    })
}

fn adjustment_kind_str(a: &Adjustment) -> &'static str {
    match a.kind {
        crate::models::AdjustmentKind::Percent => "percent",
        crate::models::AdjustmentKind::Fixed => "fixed",
    }
}

/// Stores a proposal after recomputing its totals. `p.id` is ignored.
pub fn insert_proposal(conn: &Connection, p: &Proposal) -> Result<i64> {
    let mut p = p.clone();
    p.recompute();
    p.validate()?;
    conn.execute(
        "INSERT INTO proposals(number, date, valid_until, client, services, discount_kind, discount_value,
            tax_kind, tax_value, subtotal, discount_amount, tax_amount, total, payment_terms, status,
            rejection_reason, observations)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17)",
        params![
            p.number,
            p.date,
            p.valid_until,
            serde_json::to_string(&p.client)?,
            serde_json::to_string(&p.services)?,
            adjustment_kind_str(&p.discount),
            p.discount.value.to_string(),
            adjustment_kind_str(&p.tax),
            p.tax.value.to_string(),
            p.totals.subtotal.to_string(),
            p.totals.discount_amount.to_string(),
            p.totals.tax_amount.to_string(),
            p.totals.total.to_string(),
            serde_json::to_string(&p.payment_terms)?,
            p.status.as_str(),
            p.rejection_reason,
            p.observations,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites the stored proposal with `p`, recomputing totals first, and
/// returns what was stored.
pub fn save_proposal(conn: &Connection, p: &Proposal) -> Result<Proposal> {
    let mut p = p.clone();
    p.recompute();
    p.validate()?;
    let n = conn.execute(
        "UPDATE proposals SET number=?1, date=?2, valid_until=?3, client=?4, services=?5,
            discount_kind=?6, discount_value=?7, tax_kind=?8, tax_value=?9, subtotal=?10,
            discount_amount=?11, tax_amount=?12, total=?13, payment_terms=?14, status=?15,
            rejection_reason=?16, observations=?17
         WHERE id=?18",
        params![
            p.number,
            p.date,
            p.valid_until,
            serde_json::to_string(&p.client)?,
            serde_json::to_string(&p.services)?,
            adjustment_kind_str(&p.discount),
            p.discount.value.to_string(),
            adjustment_kind_str(&p.tax),
            p.tax.value.to_string(),
            p.totals.subtotal.to_string(),
            p.totals.discount_amount.to_string(),
            p.totals.tax_amount.to_string(),
            p.totals.total.to_string(),
            serde_json::to_string(&p.payment_terms)?,
            p.status.as_str(),
            p.rejection_reason,
            p.observations,
            p.id,
        ],
    )?;
    if n == 0 {
        return Err(anyhow!("Proposal {} not found", p.id));
    }
    get_proposal(conn, p.id)
}

pub fn get_proposal(conn: &Connection, id: i64) -> Result<Proposal> {
    conn.query_row(
        &format!("SELECT {} FROM proposals WHERE id=?1", PROPOSAL_COLS),
        params![id],
        proposal_from_row,
    )
    .optional()?
    .with_context(|| format!("Proposal {} not found", id))
}

pub fn list_proposals(conn: &Connection) -> Result<Vec<Proposal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM proposals ORDER BY date DESC, id DESC",
        PROPOSAL_COLS
    ))?;
    let rows = stmt.query_map([], proposal_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn delete_proposal(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM proposals WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Proposal {} not found", id));
    }
    Ok(())
}

// KPIs and goals

fn kpi_from_row(r: &Row) -> rusqlite::Result<Kpi> {
    Ok(Kpi {
        id: r.get(0)?,
        name: r.get(1)?,
        periodicity: get_parsed(r, 2)?,
        sort_order: r.get(3)?,
        visible_public: r.get(4)?,
        is_financial: r.get(5)?,
        unit: r.get(6)?,
    })
}

pub fn get_kpi(conn: &Connection, id: i64) -> Result<Kpi> {
    conn.query_row(
        "SELECT id, name, periodicity, sort_order, visible_public, is_financial, unit FROM kpis WHERE id=?1",
        params![id],
        kpi_from_row,
    )
    .optional()?
    .with_context(|| format!("KPI {} not found", id))
}

pub fn list_kpis(conn: &Connection) -> Result<Vec<Kpi>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, periodicity, sort_order, visible_public, is_financial, unit FROM kpis
         ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map([], kpi_from_row)?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Inserts (`id == 0`) or updates a KPI. A financial KPI is stored as
/// private whatever the caller asked for; the stored record is returned so
/// callers report the corrected value.
pub fn save_kpi(conn: &Connection, kpi: &Kpi) -> Result<Kpi> {
    if kpi.name.trim().is_empty() {
        return Err(anyhow!("KPI name must not be empty"));
    }
    let mut k = kpi.clone();
    if enforce_kpi_visibility(&mut k) {
        log::warn!("KPI '{}' is financial; stored as not public", k.name);
    }
    let id = if k.id == 0 {
        conn.execute(
            "INSERT INTO kpis(name, periodicity, sort_order, visible_public, is_financial, unit)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                k.name.trim(),
                k.periodicity.as_str(),
                k.sort_order,
                k.visible_public,
                k.is_financial,
                k.unit
            ],
        )?;
        conn.last_insert_rowid()
    } else {
        let n = conn.execute(
            "UPDATE kpis SET name=?1, periodicity=?2, sort_order=?3, visible_public=?4,
                is_financial=?5, unit=?6 WHERE id=?7",
            params![
                k.name.trim(),
                k.periodicity.as_str(),
                k.sort_order,
                k.visible_public,
                k.is_financial,
                k.unit,
                k.id
            ],
        )?;
        if n == 0 {
            return Err(anyhow!("KPI {} not found", k.id));
        }
        k.id
    };
    get_kpi(conn, id)
}

pub fn kpi_id_for_external(conn: &Connection, external_id: &str) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM kpis WHERE external_id=?1",
            params![external_id],
            |r| r.get(0),
        )
        .optional()?)
}

pub fn upsert_kpi_external(conn: &Connection, external_id: &str, kpi: &Kpi) -> Result<(Kpi, bool)> {
    let mut k = kpi.clone();
    let existing = kpi_id_for_external(conn, external_id)?;
    k.id = existing.unwrap_or(0);
    let stored = save_kpi(conn, &k)?;
    if existing.is_none() {
        conn.execute(
            "UPDATE kpis SET external_id=?1 WHERE id=?2",
            params![external_id, stored.id],
        )?;
    }
    Ok((stored, existing.is_none()))
}

pub fn delete_kpi(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM kpis WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("KPI {} not found", id));
    }
    Ok(())
}

fn goal_from_row(r: &Row) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: r.get(0)?,
        kpi_id: r.get(1)?,
        month: r.get(2)?,
        year: r.get(3)?,
        actual: get_dec(r, 4)?,
        target: get_dec(r, 5)?,
        visible_public: r.get(6)?,
    })
}

pub fn list_goals(conn: &Connection, kpi_id: Option<i64>) -> Result<Vec<Goal>> {
    let base = "SELECT id, kpi_id, month, year, actual, target, visible_public FROM goals";
    let mut out = Vec::new();
    match kpi_id {
        Some(k) => {
            let mut stmt = conn.prepare(&format!("{} WHERE kpi_id=?1 ORDER BY id", base))?;
            for r in stmt.query_map(params![k], goal_from_row)? {
                out.push(r?);
            }
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY id", base))?;
            for r in stmt.query_map([], goal_from_row)? {
                out.push(r?);
            }
        }
    }
    Ok(out)
}

pub fn get_goal(conn: &Connection, id: i64) -> Result<Goal> {
    conn.query_row(
        "SELECT id, kpi_id, month, year, actual, target, visible_public FROM goals WHERE id=?1",
        params![id],
        goal_from_row,
    )
    .optional()?
    .with_context(|| format!("Goal {} not found", id))
}

pub fn insert_goal(conn: &Connection, g: &Goal) -> Result<Goal> {
    get_kpi(conn, g.kpi_id)?;
    g.validate()?;
    conn.execute(
        "INSERT INTO goals(kpi_id, month, year, actual, target, visible_public)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            g.kpi_id,
            g.month.filter(|m| *m != 0),
            g.year,
            g.actual.to_string(),
            g.target.to_string(),
            g.visible_public
        ],
    )?;
    get_goal(conn, conn.last_insert_rowid())
}

pub fn upsert_goal_external(conn: &Connection, external_id: &str, g: &Goal) -> Result<bool> {
    g.validate()?;
    let n = conn.execute(
        "UPDATE goals SET kpi_id=?1, month=?2, year=?3, actual=?4, target=?5, visible_public=?6
         WHERE external_id=?7",
        params![
            g.kpi_id,
            g.month.filter(|m| *m != 0),
            g.year,
            g.actual.to_string(),
            g.target.to_string(),
            g.visible_public,
            external_id
        ],
    )?;
    if n > 0 {
        return Ok(false);
    }
    let stored = insert_goal(conn, g)?;
    conn.execute(
        "UPDATE goals SET external_id=?1 WHERE id=?2",
        params![external_id, stored.id],
    )?;
    Ok(true)
}

pub fn update_goal_actual(conn: &Connection, id: i64, actual: Decimal) -> Result<Goal> {
    let n = conn.execute(
        "UPDATE goals SET actual=?1 WHERE id=?2",
        params![actual.to_string(), id],
    )?;
    if n == 0 {
        return Err(anyhow!("Goal {} not found", id));
    }
    get_goal(conn, id)
}

pub fn delete_goal(conn: &Connection, id: i64) -> Result<()> {
    let n = conn.execute("DELETE FROM goals WHERE id=?1", params![id])?;
    if n == 0 {
        return Err(anyhow!("Goal {} not found", id));
    }
    Ok(())
}

/// First and last day of a month, the default period of a budget goal.
pub fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(crate::error::EngineError::InvalidMonth(month))?;
    let end = start
        .checked_add_months(chrono::Months::new(1))
        .and_then(|d| d.pred_opt())
        .ok_or(crate::error::EngineError::InvalidMonth(month))?;
    Ok((start, end))
}
