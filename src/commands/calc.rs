// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::engine::currency::{
    format_currency_brl, format_currency_display, format_currency_input, parse_currency_input,
};
use crate::engine::proposal::{calculate_installments, terms_total};
use crate::models::PaymentMethod;
use crate::utils::{json_flags, maybe_print_json, parse_date, parse_decimal, pretty_table, required};
use anyhow::Result;

pub fn handle(m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("installments", sub)) => installments(sub),
        Some(("money", sub)) => {
            let raw = required(sub, "raw")?;
            let value = parse_currency_input(raw);
            let rows = vec![
                vec!["value".into(), value.to_string()],
                vec!["display".into(), format_currency_display(value)],
                vec!["input".into(), format_currency_input(value)],
                vec!["brl".into(), format_currency_brl(value)],
            ];
            println!("{}", pretty_table(&["Format", "Text"], rows));
            Ok(())
        }
        _ => Ok(()),
    }
}

fn installments(sub: &clap::ArgMatches) -> Result<()> {
    let (json_flag, jsonl_flag) = json_flags(sub);
    let total = parse_decimal(required(sub, "total")?)?;
    let count = sub.get_one::<i64>("count").copied().unwrap_or(1);
    let first_due = parse_date(required(sub, "first_due")?)?;
    let method = match sub.get_one::<String>("method") {
        Some(m) => m.parse::<PaymentMethod>()?,
        None => PaymentMethod::default(),
    };
    let terms = calculate_installments(total, count, first_due, method)?;
    if !maybe_print_json(json_flag, jsonl_flag, &terms)? {
        let rows = terms
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
        println!("{}", pretty_table(&["#", "Due", "Amount", "Method"], rows));
        println!("Total: {}", format_currency_brl(terms_total(&terms)));
    }
    Ok(())
}
