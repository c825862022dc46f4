// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::format_currency_brl;
use crate::engine::proposal::{ProposalDocument, calculate_installments, proposal_number};
use crate::models::{
    Adjustment, AdjustmentKind, Client, PaymentMethod, Proposal, ProposalService, ProposalStatus,
    ProposalTotals,
};
use crate::store;
use crate::utils::{
    default_payment_method, json_flags, maybe_print_json, optional, parse_date, parse_decimal,
    pretty_table, required, required_id, today,
};
use anyhow::{Result, anyhow};
use chrono::{Datelike, Duration, Utc};
use rusqlite::Connection;

/// Days a new proposal stays valid when no date is given.
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("new", sub)) => {
            new(conn, sub)?;
        }
        Some(("service", sub)) => add_service(conn, sub)?,
        Some(("service-rm", sub)) => remove_service(conn, sub)?,
        Some(("discount", sub)) => set_adjustment(conn, sub, Which::Discount)?,
        Some(("tax", sub)) => set_adjustment(conn, sub, Which::Tax)?,
        Some(("installments", sub)) => installments(conn, sub)?,
        Some(("status", sub)) => status(conn, sub)?,
        Some(("show", sub)) => show(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let id = required_id(sub)?;
            store::delete_proposal(conn, id)?;
            println!("Removed proposal {}", id);
        }
        _ => {}
    }
    Ok(())
}

pub fn new(conn: &Connection, sub: &clap::ArgMatches) -> Result<i64> {
    let date = match sub.get_one::<String>("date") {
        Some(d) => parse_date(d)?,
        None => today(),
    };
    let valid_until = match sub.get_one::<String>("valid_until") {
        Some(d) => parse_date(d)?,
        None => date + Duration::days(DEFAULT_VALIDITY_DAYS),
    };
    let number = optional(sub, "number")
        .unwrap_or_else(|| proposal_number(today().year(), Utc::now().timestamp_millis()));
    let p = Proposal {
        id: 0,
        number: Some(number),
        date,
        valid_until: Some(valid_until),
        client: Client {
            name: required(sub, "client")?.trim().to_string(),
            company: optional(sub, "company"),
            document: optional(sub, "document"),
            email: optional(sub, "email"),
            phone: optional(sub, "phone"),
            city: optional(sub, "city"),
        },
        services: Vec::new(),
        discount: Adjustment::none(),
        tax: Adjustment::none(),
        totals: ProposalTotals::default(),
        payment_terms: Vec::new(),
        status: ProposalStatus::EmCriacao,
        rejection_reason: None,
        observations: optional(sub, "observations"),
    };
    let id = store::insert_proposal(conn, &p)?;
    println!(
        "Created proposal {} ({}) for {}",
        id,
        p.number.as_deref().unwrap_or_default(),
        p.client.name
    );
    Ok(id)
}

fn report_saved(p: &Proposal) {
    println!(
        "Proposal {}: subtotal {}, total {}",
        p.id,
        format_currency_brl(p.totals.subtotal),
        format_currency_brl(p.totals.total)
    );
    for issue in p.issues() {
        println!("  ! {}", issue);
    }
}

fn add_service(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut p = store::get_proposal(conn, required_id(sub)?)?;
    let mut service = ProposalService::new(
        required(sub, "name")?.trim(),
        sub.get_one::<u32>("quantity").copied().unwrap_or(1),
        parse_decimal(required(sub, "unit_value")?)?,
    );
    service.description = optional(sub, "description");
    service.procedures = optional(sub, "procedures");
    service.materials_included = optional(sub, "materials");
    service.validate()?;
    p.services.push(service);
    let stored = store::save_proposal(conn, &p)?;
    report_saved(&stored);
    Ok(())
}

fn remove_service(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut p = store::get_proposal(conn, required_id(sub)?)?;
    let line = sub.get_one::<usize>("line").copied().unwrap_or(0);
    if line == 0 || line > p.services.len() {
        return Err(anyhow!(
            "Proposal {} has no service line {} (it has {})",
            p.id,
            line,
            p.services.len()
        ));
    }
    let removed = p.services.remove(line - 1);
    let stored = store::save_proposal(conn, &p)?;
    println!("Removed '{}'", removed.name);
    report_saved(&stored);
    Ok(())
}

enum Which {
    Discount,
    Tax,
}

fn set_adjustment(conn: &Connection, sub: &clap::ArgMatches, which: Which) -> Result<()> {
    let mut p = store::get_proposal(conn, required_id(sub)?)?;
    let kind = required(sub, "kind")?.parse::<AdjustmentKind>()?;
    let adj = Adjustment {
        kind,
        value: parse_decimal(required(sub, "value")?)?,
    };
    match which {
        Which::Discount => p.discount = adj,
        Which::Tax => p.tax = adj,
    }
    let stored = store::save_proposal(conn, &p)?;
    report_saved(&stored);
    Ok(())
}

fn installments(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut p = store::get_proposal(conn, required_id(sub)?)?;
    let count = sub.get_one::<i64>("count").copied().unwrap_or(1);
    let first_due = parse_date(required(sub, "first_due")?)?;
    let method = match sub.get_one::<String>("method") {
        Some(m) => m.parse::<PaymentMethod>()?,
        None => default_payment_method(conn)?,
    };
    p.recompute();
    p.payment_terms = calculate_installments(p.totals.total, count, first_due, method)?;
    let stored = store::save_proposal(conn, &p)?;
    let rows = stored
        .payment_terms
        .iter()
        .enumerate()
        .map(|(i, t)| {
            vec![
                (i + 1).to_string(),
                t.due_date.to_string(),
                format_currency_brl(t.amount),
                t.payment_method.to_string(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["#", "Due", "Amount", "Method"], rows)
    );
    report_saved(&stored);
    Ok(())
}

fn status(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let mut p = store::get_proposal(conn, required_id(sub)?)?;
    let status = required(sub, "status")?.parse::<ProposalStatus>()?;
    p.set_status(status, optional(sub, "reason"))?;
    let stored = store::save_proposal(conn, &p)?;
    match &stored.rejection_reason {
        Some(r) => println!("Proposal {} is now {} ({})", stored.id, stored.status, r),
        None => println!("Proposal {} is now {}", stored.id, stored.status),
    }
    Ok(())
}

fn show(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let p = store::get_proposal(conn, required_id(sub)?)?;
    if !maybe_print_json(json_flag, jsonl_flag, &p)? {
        print!("{}", ProposalDocument::from_proposal(&p).render_text());
        for issue in p.issues() {
            println!("! {}", issue);
        }
    }
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let proposals = store::list_proposals(conn)?;
    if !maybe_print_json(json_flag, jsonl_flag, &proposals)? {
        let rows = proposals
            .into_iter()
            .map(|p| {
                vec![
                    p.id.to_string(),
                    p.number.unwrap_or_default(),
                    p.date.to_string(),
                    p.client.name,
                    format_currency_brl(p.totals.total),
                    p.payment_terms.len().to_string(),
                    p.status.to_string(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["ID", "Number", "Date", "Client", "Total", "Installments", "Status"],
                rows
            )
        );
    }
    Ok(())
}
