// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::remote::{Collection, RemoteConfig, pull};
use crate::utils::{http_client, json_flags, maybe_print_json, pretty_table};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("pull", sub)) => pull_cmd(conn, sub),
        _ => Ok(()),
    }
}

/// Collections named by `--only`, or all of them.
pub fn selected_collections(sub: &clap::ArgMatches) -> Result<Vec<Collection>> {
    match sub.get_many::<String>("only") {
        None => Ok(Collection::ALL.to_vec()),
        Some(names) => names
            .map(|n| {
                Collection::parse(n).ok_or_else(|| {
                    anyhow!(
                        "Unknown collection '{}' (use transactions, budget-goals, rules, kpis, goals)",
                        n
                    )
                })
            })
            .collect(),
    }
}

fn pull_cmd(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let collections = selected_collections(sub)?;
    let cfg = RemoteConfig::from_settings(conn)?;
    let client = http_client()?;
    let reports = pull(conn, &client, &cfg, &collections)?;
    if !maybe_print_json(json_flag, jsonl_flag, &reports)? {
        let rows = reports
            .into_iter()
            .map(|r| {
                vec![
                    r.collection,
                    r.inserted.to_string(),
                    r.updated.to_string(),
                    r.skipped.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Collection", "New", "Updated", "Skipped"], rows)
        );
    }
    Ok(())
}
