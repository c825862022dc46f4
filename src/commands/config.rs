// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::PaymentMethod;
use crate::utils::{
    BUDGET_TOP_CATEGORIES, KNOWN_SETTINGS, PROPOSAL_PAYMENT_METHOD, REMOTE_TOKEN, REMOTE_URL,
    get_setting, json_flags, list_settings, maybe_print_json, pretty_table, required, set_setting,
    unset_setting,
};
use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set", sub)) => {
            let key = required(sub, "key")?.trim();
            let value = validate(key, required(sub, "value")?)?;
            set_setting(conn, key, &value)?;
            println!("{} = {}", key, display_value(key, &value));
        }
        Some(("get", sub)) => {
            let key = required(sub, "key")?.trim();
            match get_setting(conn, key)? {
                Some(v) => println!("{}", display_value(key, &v)),
                None => println!("{} is not set", key),
            }
        }
        Some(("unset", sub)) => {
            let key = required(sub, "key")?.trim();
            if unset_setting(conn, key)? {
                println!("Removed {}", key);
            } else {
                println!("{} was not set", key);
            }
        }
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

/// Checks a value before it is stored and returns its normalized form.
pub fn validate(key: &str, value: &str) -> Result<String> {
    let value = value.trim();
    match key {
        REMOTE_URL => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(anyhow!("{} must start with http:// or https://", key));
            }
            Ok(value.trim_end_matches('/').to_string())
        }
        REMOTE_TOKEN => Ok(value.to_string()),
        PROPOSAL_PAYMENT_METHOD => Ok(value.parse::<PaymentMethod>()?.as_str().to_string()),
        BUDGET_TOP_CATEGORIES => {
            let n = value
                .parse::<usize>()
                .with_context(|| format!("{} must be a whole number", key))?;
            Ok(n.to_string())
        }
        other => Err(anyhow!(
            "Unknown setting '{}'. Known: {}",
            other,
            KNOWN_SETTINGS.join(", ")
        )),
    }
}

fn display_value(key: &str, value: &str) -> String {
    if key == REMOTE_TOKEN {
        "********".to_string()
    } else {
        value.to_string()
    }
}

#[derive(Serialize)]
struct SettingRow {
    key: String,
    value: String,
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let data: Vec<SettingRow> = list_settings(conn)?
        .into_iter()
        .map(|(key, value)| SettingRow {
            value: display_value(&key, &value),
            key,
        })
        .collect();
    if !maybe_print_json(json_flag, jsonl_flag, &data)? {
        let rows = data.into_iter().map(|r| vec![r.key, r.value]).collect();
        println!("{}", pretty_table(&["Key", "Value"], rows));
    }
    Ok(())
}
