// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Ordered, text-only categorization rules. First match wins.

use serde::Serialize;
use std::collections::HashSet;

use crate::models::{CategorizationRule, Transaction};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub updated: usize,
    /// `(transaction id, applied category)` in input order.
    pub changed: Vec<(i64, String)>,
}

/// A rule reduced to its predicate: a lowercase needle looked up in the
/// transaction's name and description.
#[derive(Debug, Clone)]
struct Matcher<'a> {
    needle: String,
    rule: &'a CategorizationRule,
}

impl<'a> Matcher<'a> {
    fn compile(rules: &'a [CategorizationRule]) -> Vec<Matcher<'a>> {
        rules
            .iter()
            .filter(|r| r.active)
            .filter_map(|rule| {
                let needle = rule.pattern.trim().to_lowercase();
                (!needle.is_empty()).then_some(Matcher { needle, rule })
            })
            .collect()
    }

    fn matches(&self, name: &str, description: Option<&str>) -> bool {
        name.to_lowercase().contains(&self.needle)
            || description.is_some_and(|d| d.to_lowercase().contains(&self.needle))
    }
}

/// First active rule (in list order) whose pattern appears in `name` or
/// `description`, ignoring case.
pub fn match_rule<'a>(
    rules: &'a [CategorizationRule],
    name: &str,
    description: Option<&str>,
) -> Option<&'a CategorizationRule> {
    Matcher::compile(rules)
        .into_iter()
        .find(|m| m.matches(name, description))
        .map(|m| m.rule)
}

/// Categorizes every transaction that has no category yet. Categorized
/// transactions are left alone.
pub fn apply_rules(transactions: &mut [Transaction], rules: &[CategorizationRule]) -> RuleOutcome {
    let matchers = Matcher::compile(rules);
    let mut outcome = RuleOutcome::default();
    if matchers.is_empty() {
        return outcome;
    }
    for tx in transactions.iter_mut().filter(|t| t.is_uncategorized()) {
        if let Some(m) = matchers
            .iter()
            .find(|m| m.matches(&tx.name, tx.description.as_deref()))
        {
            log::debug!(
                "rule '{}' categorized transaction {} as {}",
                m.rule.name,
                tx.id,
                m.rule.category
            );
            tx.category = Some(m.rule.category.clone());
            outcome.changed.push((tx.id, m.rule.category.clone()));
        }
    }
    outcome.updated = outcome.changed.len();
    outcome
}

/// Manual override: sets `category` on every listed transaction, whatever it
/// had before. Returns how many transactions were touched.
pub fn bulk_categorize(transactions: &mut [Transaction], ids: &[i64], category: &str) -> usize {
    let wanted: HashSet<i64> = ids.iter().copied().collect();
    let mut touched = 0;
    for tx in transactions.iter_mut().filter(|t| wanted.contains(&t.id)) {
        tx.category = Some(category.to_string());
        touched += 1;
    }
    touched
}
