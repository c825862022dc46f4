// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::store;
use crate::utils::{json_flags, maybe_print_json, pretty_table, required};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = required(sub, "name")?.trim();
            if name.is_empty() {
                return Err(anyhow!("Category name must not be empty"));
            }
            store::ensure_category(conn, name)?;
            println!("Added category '{}'", name);
        }
        Some(("list", sub)) => {
            let (json_flag, jsonl_flag) = json_flags(sub);
            let cats = store::list_categories(conn)?;
            if !maybe_print_json(json_flag, jsonl_flag, &cats)? {
                let data = cats.into_iter().map(|c| vec![c.name]).collect();
                println!("{}", pretty_table(&["Category"], data));
            }
        }
        Some(("rm", sub)) => {
            let name = required(sub, "name")?;
            if store::delete_category(conn, name)? {
                println!("Removed category '{}'", name);
            } else {
                println!("Category '{}' not found", name);
            }
        }
        Some(("rename", sub)) => {
            let from = required(sub, "from")?;
            let to = required(sub, "to")?;
            let n = store::rename_category(conn, from, to)?;
            println!("Renamed '{}' to '{}' ({} transactions)", from, to.trim(), n);
        }
        _ => {}
    }
    Ok(())
}
