// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::proposal::ProposalDocument;
use crate::store::{self, TxFilter};
use crate::utils::{parse_month, required, required_id};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("transactions", sub)) => export_transactions(conn, sub),
        Some(("proposal", sub)) => export_proposal(conn, sub),
        _ => Ok(()),
    }
}

fn export_transactions(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let fmt = required(sub, "format")?.to_lowercase();
    let out = required(sub, "out")?.trim();
    let filter = TxFilter {
        month: sub
            .get_one::<String>("month")
            .map(|m| parse_month(m))
            .transpose()?,
        ..Default::default()
    };
    let rows = store::list_transactions(conn, &filter)?;

    match fmt.as_str() {
        "csv" => {
            let mut wtr =
                csv::Writer::from_path(out).with_context(|| format!("Create {}", out))?;
            wtr.write_record([
                "id",
                "date",
                "name",
                "type",
                "amount",
                "account",
                "category",
                "description",
                "reconciled",
            ])?;
            for t in &rows {
                wtr.write_record([
                    t.id.to_string(),
                    t.date.to_string(),
                    t.name.clone(),
                    t.kind.to_string(),
                    t.amount.to_string(),
                    t.account.clone(),
                    t.category.clone().unwrap_or_default(),
                    t.description.clone().unwrap_or_default(),
                    t.reconciled.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            let items: Vec<_> = rows
                .iter()
                .map(|t| {
                    json!({
                        "id": t.id, "date": t.date, "name": t.name, "type": t.kind,
                        "amount": t.amount, "account": t.account, "category": t.category,
                        "description": t.description, "reconciled": t.reconciled
                    })
                })
                .collect();
            std::fs::write(out, serde_json::to_string_pretty(&items)?)
                .with_context(|| format!("Write {}", out))?;
        }
        other => return Err(anyhow!("Unknown format: {} (use csv|json)", other)),
    }
    println!("Exported {} transactions to {}", rows.len(), out);
    Ok(())
}

/// Writes the already-computed proposal; no figures are recalculated here.
fn export_proposal(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let p = store::get_proposal(conn, required_id(sub)?)?;
    let fmt = required(sub, "format")?.to_lowercase();
    let out = required(sub, "out")?.trim();
    let doc = ProposalDocument::from_proposal(&p);
    let body = match fmt.as_str() {
        "txt" | "text" => doc.render_text(),
        "json" => serde_json::to_string_pretty(&doc)?,
        other => return Err(anyhow!("Unknown format: {} (use txt|json)", other)),
    };
    std::fs::write(out, body).with_context(|| format!("Write {}", out))?;
    println!("Exported proposal {} to {}", p.id, out);
    Ok(())
}
