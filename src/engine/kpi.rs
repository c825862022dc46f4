// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! KPI dashboard grouping: one bucket per periodicity, each KPI paired with
//! the goal that applies to the current period.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::models::{Goal, Kpi, Periodicity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KpiGoal {
    pub kpi: Kpi,
    pub goal: Option<Goal>,
}

/// Always holds all four periodicities, possibly with empty buckets.
pub type GroupedKpis = BTreeMap<Periodicity, Vec<KpiGoal>>;

/// Drops KPIs whose trimmed, lowercased name was already seen. Among
/// duplicates the higher sort order wins; ties keep the first one.
pub fn dedup_kpis(kpis: &[Kpi]) -> Vec<Kpi> {
    let mut slot: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Kpi> = Vec::new();
    for kpi in kpis {
        let key = kpi.name.trim().to_lowercase();
        match slot.get(&key) {
            Some(&i) => {
                if kpi.sort_order > out[i].sort_order {
                    out[i] = kpi.clone();
                }
            }
            None => {
                slot.insert(key, out.len());
                out.push(kpi.clone());
            }
        }
    }
    out
}

fn goal_for<'a>(kpi: &Kpi, goals: &'a [Goal], today: NaiveDate) -> Option<&'a Goal> {
    let year = today.year();
    let mut own = goals.iter().filter(|g| g.kpi_id == kpi.id);
    let current = match kpi.periodicity {
        Periodicity::Mensal => own
            .clone()
            .find(|g| g.year == year && g.month == Some(today.month())),
        _ => own.clone().find(|g| g.year == year && g.is_whole_period()),
    };
    current.or_else(|| own.next())
}

/// Groups KPIs by periodicity and matches each with its current goal.
///
/// Monthly KPIs look for the goal of the current year and month, the other
/// periodicities for the current year's whole-period goal (month absent or
/// 0). Either way a KPI with goals but none for the current period falls back
/// to its first goal. Buckets are ordered by ascending sort order.
pub fn group_by_period(kpis: &[Kpi], goals: &[Goal], today: NaiveDate) -> GroupedKpis {
    let mut grouped: GroupedKpis = Periodicity::ALL.iter().map(|p| (*p, Vec::new())).collect();
    for kpi in dedup_kpis(kpis) {
        let goal = goal_for(&kpi, goals, today).cloned();
        grouped
            .entry(kpi.periodicity)
            .or_default()
            .push(KpiGoal { kpi, goal });
    }
    for bucket in grouped.values_mut() {
        bucket.sort_by_key(|kg| kg.kpi.sort_order);
    }
    grouped
}

/// A financial KPI is never public. Returns true when `kpi` was corrected.
pub fn enforce_kpi_visibility(kpi: &mut Kpi) -> bool {
    if kpi.is_financial && kpi.visible_public {
        kpi.visible_public = false;
        true
    } else {
        false
    }
}

/// KPIs that break the visibility rule, as human-readable lines.
pub fn kpi_invariant_violations(kpis: &[Kpi]) -> Vec<String> {
    kpis.iter()
        .filter(|k| k.is_financial && k.visible_public)
        .map(|k| format!("KPI {} '{}' is financial but publicly visible", k.id, k.name))
        .collect()
}

/// The grouping shown on the public dashboard: only public, non-financial
/// KPIs and public goals. Visibility is re-checked here rather than trusted
/// from storage.
pub fn public_view(kpis: &[Kpi], goals: &[Goal], today: NaiveDate) -> GroupedKpis {
    let visible: Vec<Kpi> = kpis
        .iter()
        .filter(|k| k.visible_public && !k.is_financial)
        .cloned()
        .collect();
    let public_goals: Vec<Goal> = goals.iter().filter(|g| g.visible_public).cloned().collect();
    group_by_period(&visible, &public_goals, today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn kpi(id: i64, name: &str, periodicity: Periodicity, sort_order: i64) -> Kpi {
        Kpi {
            id,
            name: name.into(),
            periodicity,
            sort_order,
            visible_public: true,
            is_financial: false,
            unit: None,
        }
    }

    fn goal(id: i64, kpi_id: i64, month: Option<u32>, year: i32) -> Goal {
        Goal {
            id,
            kpi_id,
            month,
            year,
            actual: dec!(10),
            target: dec!(20),
            visible_public: true,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
    }

    #[test]
    fn duplicate_names_keep_higher_sort_order() {
        let kpis = vec![
            kpi(1, "Leads", Periodicity::Mensal, 1),
            kpi(2, " leads ", Periodicity::Mensal, 5),
            kpi(3, "LEADS", Periodicity::Mensal, 5),
        ];
        let out = dedup_kpis(&kpis);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 2);
    }

    #[test]
    fn monthly_goal_prefers_current_month() {
        let kpis = vec![kpi(1, "Leads", Periodicity::Mensal, 1)];
        let goals = vec![goal(10, 1, Some(2), 2026), goal(11, 1, Some(3), 2026)];
        let grouped = group_by_period(&kpis, &goals, today());
        assert_eq!(grouped[&Periodicity::Mensal][0].goal.as_ref().unwrap().id, 11);
    }

    #[test]
    fn falls_back_to_first_goal() {
        let kpis = vec![
            kpi(1, "Receita", Periodicity::Anual, 2),
            kpi(2, "NPS", Periodicity::Trimestral, 1),
        ];
        let goals = vec![goal(20, 1, Some(4), 2025), goal(21, 1, Some(0), 2025)];
        let grouped = group_by_period(&kpis, &goals, today());
        assert_eq!(grouped.len(), 4);
        assert_eq!(grouped[&Periodicity::Anual][0].goal.as_ref().unwrap().id, 20);
        assert!(grouped[&Periodicity::Trimestral][0].goal.is_none());
        assert!(grouped[&Periodicity::Semestral].is_empty());
    }

    #[test]
    fn whole_period_goal_matches_none_or_zero_month() {
        let kpis = vec![kpi(1, "Clientes", Periodicity::Semestral, 1)];
        let goals = vec![goal(30, 1, Some(6), 2026), goal(31, 1, None, 2026)];
        let grouped = group_by_period(&kpis, &goals, today());
        assert_eq!(grouped[&Periodicity::Semestral][0].goal.as_ref().unwrap().id, 31);
    }

    #[test]
    fn public_view_hides_financial_kpis() {
        let mut money = kpi(1, "Faturamento", Periodicity::Mensal, 1);
        money.is_financial = true;
        let kpis = vec![money.clone(), kpi(2, "Leads", Periodicity::Mensal, 2)];
        assert_eq!(kpi_invariant_violations(&kpis).len(), 1);
        let view = public_view(&kpis, &[], today());
        assert_eq!(view[&Periodicity::Mensal].len(), 1);
        assert_eq!(view[&Periodicity::Mensal][0].kpi.id, 2);

        assert!(enforce_kpi_visibility(&mut money));
        assert!(!money.visible_public);
        assert!(!enforce_kpi_visibility(&mut money));
    }
}
