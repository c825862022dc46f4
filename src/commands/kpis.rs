// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::format_percent;
use crate::engine::kpi::{GroupedKpis, group_by_period, public_view};
use crate::models::{Goal, Kpi, Periodicity};
use crate::store;
use crate::utils::{
    json_flags, maybe_print_json, optional, parse_date, parse_decimal, pretty_table, required,
    required_id, today,
};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

pub fn handle_kpi(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let kpi = Kpi {
                id: 0,
                name: required(sub, "name")?.trim().to_string(),
                periodicity: required(sub, "periodicity")?.parse::<Periodicity>()?,
                sort_order: sub.get_one::<i64>("sort_order").copied().unwrap_or(0),
                visible_public: sub.get_flag("public"),
                is_financial: sub.get_flag("financial"),
                unit: optional(sub, "unit"),
            };
            let stored = store::save_kpi(conn, &kpi)?;
            report_kpi("Added", &kpi, &stored);
        }
        Some(("edit", sub)) => {
            let current = store::get_kpi(conn, required_id(sub)?)?;
            let mut kpi = current.clone();
            if let Some(n) = optional(sub, "name") {
                kpi.name = n;
            }
            if let Some(p) = optional(sub, "periodicity") {
                kpi.periodicity = p.parse()?;
            }
            if let Some(o) = sub.get_one::<i64>("sort_order") {
                kpi.sort_order = *o;
            }
            if let Some(v) = sub.get_one::<bool>("public") {
                kpi.visible_public = *v;
            }
            if let Some(f) = sub.get_one::<bool>("financial") {
                kpi.is_financial = *f;
            }
            if let Some(u) = sub.get_one::<String>("unit") {
                kpi.unit = Some(u.trim().to_string()).filter(|u| !u.is_empty());
            }
            let stored = store::save_kpi(conn, &kpi)?;
            report_kpi("Updated", &kpi, &stored);
        }
        Some(("list", sub)) => {
            let (json_flag, jsonl_flag) = json_flags(sub);
            let kpis = store::list_kpis(conn)?;
            if !maybe_print_json(json_flag, jsonl_flag, &kpis)? {
                let rows = kpis
                    .into_iter()
                    .map(|k| {
                        vec![
                            k.id.to_string(),
                            k.name,
                            k.periodicity.to_string(),
                            k.sort_order.to_string(),
                            yes_no(k.visible_public),
                            yes_no(k.is_financial),
                            k.unit.unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "Name", "Periodicity", "Order", "Public", "Financial", "Unit"],
                        rows
                    )
                );
            }
        }
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_kpi(conn, id)?;
            println!("Removed KPI {} and its goals", id);
        }
        _ => {}
    }
    Ok(())
}

fn yes_no(b: bool) -> String {
    if b { "yes".into() } else { "no".into() }
}

/// Reports the stored record, which may differ from what was asked for.
fn report_kpi(verb: &str, requested: &Kpi, stored: &Kpi) {
    println!(
        "{} KPI {} '{}' ({}, public: {})",
        verb,
        stored.id,
        stored.name,
        stored.periodicity,
        yes_no(stored.visible_public)
    );
    if requested.visible_public && !stored.visible_public {
        println!("  financial KPIs are never public; visibility was turned off");
    }
}

pub fn handle_goal(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let month = sub.get_one::<u32>("month").copied();
            if let Some(mo) = month.filter(|m| *m > 12) {
                return Err(anyhow!("Invalid month {}, expected 1-12", mo));
            }
            let goal = Goal {
                id: 0,
                kpi_id: sub
                    .get_one::<i64>("kpi")
                    .copied()
                    .ok_or_else(|| anyhow!("Missing argument 'kpi'"))?,
                month,
                year: sub
                    .get_one::<i32>("year")
                    .copied()
                    .ok_or_else(|| anyhow!("Missing argument 'year'"))?,
                actual: parse_decimal(required(sub, "actual")?)?,
                target: parse_decimal(required(sub, "target")?)?,
                visible_public: sub.get_flag("public"),
            };
            let stored = store::insert_goal(conn, &goal)?;
            println!(
                "Added goal {} for KPI {} ({})",
                stored.id,
                stored.kpi_id,
                period_label(&stored)
            );
        }
        Some(("list", sub)) => {
            let (json_flag, jsonl_flag) = json_flags(sub);
            let goals = store::list_goals(conn, sub.get_one::<i64>("kpi").copied())?;
            if !maybe_print_json(json_flag, jsonl_flag, &goals)? {
                let rows = goals
                    .into_iter()
                    .map(|g| {
                        vec![
                            g.id.to_string(),
                            g.kpi_id.to_string(),
                            period_label(&g),
                            g.actual.normalize().to_string(),
                            g.target.normalize().to_string(),
                            format_percent(g.progress_pct()),
                            yes_no(g.visible_public),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["ID", "KPI", "Period", "Actual", "Target", "Progress", "Public"],
                        rows
                    )
                );
            }
        }
        Some(("actual", sub)) => {
            let id = required_id(sub)?;
            let value = parse_decimal(required(sub, "value")?)?;
            let g = store::update_goal_actual(conn, id, value)?;
            println!(
                "Goal {}: {} of {} ({})",
                g.id,
                g.actual.normalize(),
                g.target.normalize(),
                format_percent(g.progress_pct())
            );
        }
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_goal(conn, id)?;
            println!("Removed goal {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn period_label(g: &Goal) -> String {
    match g.month.filter(|m| *m != 0) {
        Some(m) => format!("{:02}/{}", m, g.year),
        None => g.year.to_string(),
    }
}

/// Loads KPIs and goals and groups them for `--date` (or today).
pub fn dashboard_data(conn: &Connection, sub: &clap::ArgMatches) -> Result<GroupedKpis> {
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => today(),
    };
    let kpis = store::list_kpis(conn)?;
    let goals = store::list_goals(conn, None)?;
    Ok(if sub.get_flag("public") {
        public_view(&kpis, &goals, date)
    } else {
        group_by_period(&kpis, &goals, date)
    })
}

pub fn dashboard(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let grouped = dashboard_data(conn, sub)?;
    if maybe_print_json(json_flag, jsonl_flag, &grouped)? {
        return Ok(());
    }
    for (periodicity, bucket) in &grouped {
        if bucket.is_empty() {
            continue;
        }
        println!("{}", periodicity);
        let rows = bucket
            .iter()
            .map(|kg| match &kg.goal {
                Some(g) => vec![
                    kg.kpi.name.clone(),
                    period_label(g),
                    g.actual.normalize().to_string(),
                    g.target.normalize().to_string(),
                    format_percent(g.progress_pct()),
                    kg.kpi.unit.clone().unwrap_or_default(),
                ],
                None => vec![
                    kg.kpi.name.clone(),
                    "-".into(),
                    String::new(),
                    String::new(),
                    String::new(),
                    kg.kpi.unit.clone().unwrap_or_default(),
                ],
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["KPI", "Period", "Actual", "Target", "Progress", "Unit"],
                rows
            )
        );
    }
    Ok(())
}
