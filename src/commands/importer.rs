// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::format_currency_brl;
use crate::engine::import::{ImportPreview, commit_import, preview_import};
use crate::engine::rules::apply_rules;
use crate::store::{self, TxFilter};
use crate::utils::{json_flags, maybe_print_json, pretty_table, required};
use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => import_transactions(conn, sub),
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub file: String,
    pub account: String,
    pub imported: usize,
    pub duplicates: usize,
    pub categorized: usize,
}

fn print_preview(preview: &ImportPreview) {
    let rows: Vec<Vec<String>> = preview
        .transactions
        .iter()
        .map(|r| {
            vec![
                (r.index + 1).to_string(),
                r.date.to_string(),
                r.description.clone(),
                r.kind.to_string(),
                format_currency_brl(r.amount),
                if r.is_duplicate {
                    "duplicate".into()
                } else {
                    String::new()
                },
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["#", "Date", "Description", "Type", "Amount", ""], rows)
    );
    println!(
        "{} rows, {} duplicates, net {} to import into '{}'",
        preview.total,
        preview.duplicates,
        format_currency_brl(preview.total_amount),
        preview.account
    );
}

/// Parses the whole statement first, then writes every new row and the rule
/// categorization in one SQLite transaction.
pub fn import_transactions(conn: &mut Connection, sub: &clap::ArgMatches) -> Result<()> {
    let path = required(sub, "path")?.trim();
    let account = required(sub, "account")?.trim();
    let (json_flag, jsonl_flag) = json_flags(sub);

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Open statement {}", path))?;
    let existing = store::list_transactions(
        conn,
        &TxFilter {
            account: Some(account.to_string()),
            ..Default::default()
        },
    )?;
    let preview = preview_import(&contents, account, &existing)
        .with_context(|| format!("Parse statement {}", path))?;

    if sub.get_flag("dry_run") {
        if !maybe_print_json(json_flag, jsonl_flag, &preview)? {
            print_preview(&preview);
        }
        return Ok(());
    }

    let file_name = Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    let outcome = commit_import(&preview, Some(&file_name));
    if outcome.duplicates > 0 {
        log::warn!(
            "{}: skipped {} duplicate rows",
            file_name,
            outcome.duplicates
        );
    }

    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(outcome.transactions.len());
    for (i, t) in outcome.transactions.iter().enumerate() {
        let id = store::insert_transaction(&tx, t)
            .with_context(|| format!("Store row {} of {}", i + 1, file_name))?;
        ids.push(id);
    }

    let mut categorized = 0;
    if !sub.get_flag("no_rules") && !ids.is_empty() {
        let rules = store::list_rules(&tx)?;
        let mut fresh = Vec::with_capacity(ids.len());
        for id in &ids {
            fresh.push(store::get_transaction(&tx, *id)?);
        }
        let applied = apply_rules(&mut fresh, &rules);
        store::set_transaction_categories(&tx, &applied.changed)?;
        categorized = applied.updated;
    }
    tx.commit()?;
    log::info!(
        "imported {} rows from {} into {} ({} categorized)",
        outcome.imported,
        file_name,
        account,
        categorized
    );

    let summary = ImportSummary {
        file: file_name,
        account: account.to_string(),
        imported: outcome.imported,
        duplicates: outcome.duplicates,
        categorized,
    };
    if !maybe_print_json(json_flag, jsonl_flag, &summary)? {
        println!(
            "Imported {} transactions from {} into '{}' ({} duplicates skipped, {} categorized by rules)",
            summary.imported, summary.file, summary.account, summary.duplicates, summary.categorized
        );
    }
    Ok(())
}
