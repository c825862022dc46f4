// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use opsbook::engine::currency::{
    format_currency_brl, format_currency_display, parse_currency_input, round_cents,
};
use opsbook::engine::import::{commit_import, preview_import};
use opsbook::engine::proposal::compute_totals;
use opsbook::models::{Adjustment, ProposalService, Transaction};
use proptest::prelude::*;
use rust_decimal::Decimal;

proptest! {
    #[test]
    fn display_format_reads_back(cents in 0i64..10_000_000_000) {
        let value = Decimal::new(cents, 2);
        prop_assert_eq!(parse_currency_input(&format_currency_display(value)), value);
    }

    #[test]
    fn brl_format_has_symbol_and_two_decimals(cents in -1_000_000_000i64..1_000_000_000) {
        let text = format_currency_brl(Decimal::new(cents, 2));
        prop_assert!(text.contains("R$ "));
        let (_, frac) = text.rsplit_once(',').unwrap();
        prop_assert_eq!(frac.len(), 2);
        prop_assert_eq!(text.starts_with('-'), cents < 0);
    }

    #[test]
    fn totals_are_deterministic(
        prices in proptest::collection::vec((1u32..10, 0i64..1_000_000), 0..6),
        discount in (any::<bool>(), 0i64..5_000_000),
        tax in (any::<bool>(), 0i64..3_000),
    ) {
        let services: Vec<ProposalService> = prices
            .iter()
            .map(|(q, c)| ProposalService::new("s", *q, Decimal::new(*c, 2)))
            .collect();
        let adjustment = |(fixed, cents): (bool, i64)| {
            if fixed {
                Adjustment::fixed(Decimal::new(cents, 2))
            } else {
                Adjustment::percent(Decimal::new(cents % 10_000, 2))
            }
        };
        let d = adjustment(discount);
        let t = adjustment(tax);
        let a = compute_totals(&services, &d, &t);
        let b = compute_totals(&services, &d, &t);
        prop_assert_eq!(a, b);
        prop_assert_eq!(a.total, a.subtotal - a.discount_amount + a.tax_amount);
        if !discount.0 {
            prop_assert!(a.total >= Decimal::ZERO);
        }
    }

    #[test]
    fn reimporting_a_statement_finds_only_duplicates(
        rows in proptest::collection::vec((1u32..28, 1i64..1_000_000), 1..20),
    ) {
        let mut csv = String::from("date,description,amount\n");
        for (day, cents) in &rows {
            csv.push_str(&format!(
                "2026-01-{:02},row,-{}\n",
                day,
                Decimal::new(*cents, 2)
            ));
        }
        let first = preview_import(&csv, "Nubank", &[]).unwrap();
        let stored: Vec<Transaction> = commit_import(&first, None)
            .transactions
            .into_iter()
            .enumerate()
            .map(|(i, t)| Transaction {
                id: i as i64 + 1,
                name: t.name,
                date: t.date,
                amount: t.amount,
                kind: t.kind,
                account: t.account,
                category: t.category,
                description: t.description,
                reconciled: false,
                imported: t.imported,
                file_source: t.file_source,
            })
            .collect();

        let again = preview_import(&csv, "Nubank", &stored).unwrap();
        prop_assert_eq!(again.duplicates, again.total);
        prop_assert_eq!(commit_import(&again, None).imported, 0);
        prop_assert_eq!(first.total - first.duplicates, stored.len());
    }
}

#[test]
fn rounding_is_half_away_from_zero() {
    assert_eq!(round_cents(Decimal::new(125, 3)), Decimal::new(13, 2));
    assert_eq!(round_cents(Decimal::new(-125, 3)), Decimal::new(-13, 2));
}
