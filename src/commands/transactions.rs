// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::format_currency_brl;
use crate::engine::rules::{bulk_categorize, match_rule};
use crate::models::{NewTransaction, Transaction, TransactionPatch, TxType};
use crate::store::{self, TxFilter};
use crate::utils::{
    json_flags, maybe_print_json, optional, parse_date, parse_decimal, parse_month, pretty_table,
    required, required_id,
};
use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("edit", sub)) => edit(conn, sub)?,
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_transaction(conn, id)?;
            println!("Removed transaction {}", id);
        }
        Some(("categorize", sub)) => {
            categorize(conn, sub)?;
        }
        _ => {}
    }
    Ok(())
}

/// Direction and magnitude from a signed amount and an optional explicit type.
fn split_amount(raw: &str, kind: Option<&str>) -> Result<(rust_decimal::Decimal, TxType)> {
    let amount = parse_decimal(raw)?;
    let kind = match kind {
        Some(k) => k.parse::<TxType>()?,
        None => TxType::from_signed(amount),
    };
    Ok((amount.abs(), kind))
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(required(sub, "date")?)?;
    let name = required(sub, "name")?.trim().to_string();
    let (amount, kind) = split_amount(required(sub, "amount")?, optional(sub, "type").as_deref())?;
    let account = required(sub, "account")?.trim().to_string();
    let description = optional(sub, "description");
    let mut category = optional(sub, "category");

    if category.is_none() {
        let rules = store::list_rules(conn)?;
        if let Some(rule) = match_rule(&rules, &name, description.as_deref()) {
            println!("Rule '{}' -> {}", rule.name, rule.category);
            category = Some(rule.category.clone());
        }
    }

    let new = NewTransaction {
        name,
        date,
        amount,
        kind,
        account,
        category,
        description,
        imported: false,
        file_source: None,
    };
    let id = store::insert_transaction(conn, &new)?;
    println!(
        "Recorded #{} {} {} on {} '{}' (acct: {})",
        id,
        kind,
        format_currency_brl(amount),
        date,
        new.name,
        new.account
    );
    Ok(())
}

#[derive(Serialize)]
pub struct TransactionRow {
    pub id: i64,
    pub date: String,
    pub name: String,
    pub kind: String,
    pub amount: String,
    pub account: String,
    pub category: String,
    pub reconciled: bool,
}

impl From<&Transaction> for TransactionRow {
    fn from(t: &Transaction) -> Self {
        TransactionRow {
            id: t.id,
            date: t.date.to_string(),
            name: t.name.clone(),
            kind: t.kind.to_string(),
            amount: t.amount.to_string(),
            account: t.account.clone(),
            category: t.category.clone().unwrap_or_default(),
            reconciled: t.reconciled,
        }
    }
}

pub fn filter_from_args(sub: &clap::ArgMatches) -> Result<TxFilter> {
    Ok(TxFilter {
        month: sub
            .get_one::<String>("month")
            .map(|m| parse_month(m))
            .transpose()?,
        account: optional(sub, "account"),
        category: optional(sub, "category"),
        uncategorized: sub.get_flag("uncategorized"),
        newest_first: true,
        limit: sub.get_one::<usize>("limit").copied(),
    })
}

pub fn query_rows(conn: &Connection, sub: &clap::ArgMatches) -> Result<Vec<TransactionRow>> {
    let filter = filter_from_args(sub)?;
    Ok(store::list_transactions(conn, &filter)?
        .iter()
        .map(TransactionRow::from)
        .collect())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let data = query_rows(conn, sub)?;
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows: Vec<Vec<String>> = data
            .into_iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.date,
                    r.name,
                    r.kind,
                    r.amount,
                    r.account,
                    r.category,
                    if r.reconciled { "✓".into() } else { String::new() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Date", "Name", "Type", "Amount", "Account", "Category", "Rec"],
                rows,
            )
        );
    }
    Ok(())
}

pub fn patch_from_args(sub: &clap::ArgMatches) -> Result<TransactionPatch> {
    let mut patch = TransactionPatch {
        name: optional(sub, "name"),
        date: sub
            .get_one::<String>("date")
            .map(|d| parse_date(d))
            .transpose()?,
        account: optional(sub, "account"),
        // an explicit empty value clears these
        category: sub.get_one::<String>("category").cloned(),
        description: sub.get_one::<String>("description").cloned(),
        reconciled: sub.get_one::<bool>("reconciled").copied(),
        ..Default::default()
    };
    if let Some(raw) = sub.get_one::<String>("amount") {
        let (amount, kind) = split_amount(raw, optional(sub, "type").as_deref())?;
        patch.amount = Some(amount);
        if raw.trim().starts_with('-') || optional(sub, "type").is_some() {
            patch.kind = Some(kind);
        }
    } else if let Some(k) = optional(sub, "type") {
        patch.kind = Some(k.parse()?);
    }
    Ok(patch)
}

fn edit(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let id = required_id(sub)?;
    let patch = patch_from_args(sub)?;
    if patch.is_empty() {
        return Err(anyhow!("Nothing to change; pass at least one field"));
    }
    let t = store::update_transaction(conn, id, &patch)?;
    println!(
        "Updated #{}: {} {} {} '{}' [{}]",
        t.id,
        t.date,
        t.kind,
        format_currency_brl(t.amount),
        t.name,
        t.category.as_deref().unwrap_or("-")
    );
    Ok(())
}

pub fn categorize(conn: &Connection, sub: &clap::ArgMatches) -> Result<usize> {
    let category = required(sub, "category")?.trim().to_string();
    if category.is_empty() {
        return Err(anyhow!("Category must not be empty"));
    }
    let mut ids: Vec<i64> = sub
        .get_many::<i64>("ids")
        .map(|v| v.copied().collect())
        .unwrap_or_default();
    ids.sort_unstable();
    ids.dedup();

    let mut txs = Vec::with_capacity(ids.len());
    for id in &ids {
        txs.push(store::get_transaction(conn, *id)?);
    }
    let touched = bulk_categorize(&mut txs, &ids, &category);
    let changes: Vec<(i64, String)> = txs.iter().map(|t| (t.id, category.clone())).collect();

    let tx = conn.unchecked_transaction()?;
    store::set_transaction_categories(&tx, &changes)?;
    tx.commit()?;
    log::info!("bulk categorized {} transactions as {}", touched, category);
    println!("Categorized {} transactions as '{}'", touched, category);
    Ok(touched)
}
