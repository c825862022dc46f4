// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::rules::{RuleOutcome, apply_rules, match_rule};
use crate::store::{self, TxFilter};
use crate::utils::{
    json_flags, maybe_print_json, optional, parse_month, pretty_table, required, required_id,
};
use anyhow::Result;
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let pattern = required(sub, "pattern")?;
            let category = required(sub, "category")?;
            let name = optional(sub, "name").unwrap_or_default();
            let priority = sub.get_one::<i64>("priority").copied().unwrap_or(0);
            let id = store::insert_rule(conn, &name, pattern, category, priority)?;
            println!(
                "Added rule {}: '{}' -> {} (priority {})",
                id,
                pattern.trim(),
                category.trim(),
                priority
            );
        }
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_rule(conn, id)?;
            println!("Removed rule {}", id);
        }
        Some(("enable", sub)) => {
            let id = required_id(sub)?;
            store::set_rule_active(conn, id, true)?;
            println!("Enabled rule {}", id);
        }
        Some(("disable", sub)) => {
            let id = required_id(sub)?;
            store::set_rule_active(conn, id, false)?;
            println!("Disabled rule {}", id);
        }
        Some(("apply", sub)) => {
            apply(conn, sub)?;
        }
        Some(("test", sub)) => {
            let name = required(sub, "name")?;
            let description = optional(sub, "description");
            let rules = store::list_rules(conn)?;
            match match_rule(&rules, name, description.as_deref()) {
                Some(r) => println!("Rule {} '{}' -> {}", r.id, r.name, r.category),
                None => println!("No active rule matches"),
            }
        }
        _ => {}
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let rules = store::list_rules(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &rules)? {
        let data = rules
            .into_iter()
            .map(|r| {
                vec![
                    r.id.to_string(),
                    r.name,
                    r.pattern,
                    r.category,
                    r.priority.to_string(),
                    if r.active { "yes".into() } else { "no".into() },
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Name", "Pattern", "Category", "Priority", "Active"],
                data
            )
        );
    }
    Ok(())
}

/// Runs the rules over every uncategorized transaction (optionally one
/// month) and stores the result unless `--dry-run` is given.
pub fn apply(conn: &Connection, sub: &clap::ArgMatches) -> Result<RuleOutcome> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let filter = TxFilter {
        month: sub
            .get_one::<String>("month")
            .map(|m| parse_month(m))
            .transpose()?,
        uncategorized: true,
        ..Default::default()
    };
    let mut txs = store::list_transactions(conn, &filter)?;
    let rules = store::list_rules(conn)?;
    let outcome = apply_rules(&mut txs, &rules);

    if !sub.get_flag("dry_run") {
        let tx = conn.unchecked_transaction()?;
        store::set_transaction_categories(&tx, &outcome.changed)?;
        tx.commit()?;
        log::info!("rules categorized {} transactions", outcome.updated);
    }

    if !maybe_print_json(json_flag, jsonl_flag, &outcome)? {
        let data = outcome
            .changed
            .iter()
            .map(|(id, cat)| vec![id.to_string(), cat.clone()])
            .collect();
        println!("{}", pretty_table(&["Transaction", "Category"], data));
        let verb = if sub.get_flag("dry_run") {
            "Would categorize"
        } else {
            "Categorized"
        };
        println!("{} {} of {} transactions", verb, outcome.updated, txs.len());
    }
    Ok(outcome)
}
