// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Budget-vs-actual aggregation and monthly cash-flow figures.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

use crate::engine::currency::round_cents;
use crate::error::EngineError;
use crate::models::{BudgetGoal, Transaction, TxType};

/// Bucket for spending with no category.
pub const UNCATEGORIZED: &str = "Sem Categoria";

/// Longest history `monthly_history` will build.
pub const MAX_HISTORY_MONTHS: u32 = 120;

const DEBT_KEYWORDS: &[&str] = &[
    "dívida",
    "divida",
    "cartão",
    "cartao",
    "empréstimo",
    "emprestimo",
    "financiamento",
];
const ESSENTIAL_KEYWORDS: &[&str] = &[
    "moradia",
    "alimentação",
    "alimentacao",
    "transporte",
    "saúde",
    "saude",
    "educação",
    "educacao",
    "essencial",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GoalStatus {
    #[serde(rename = "Não iniciado")]
    NaoIniciado,
    #[serde(rename = "Em andamento")]
    EmAndamento,
    #[serde(rename = "Atingido")]
    Atingido,
    #[serde(rename = "Excedido")]
    Excedido,
}

impl GoalStatus {
    pub fn from_amounts(budgeted: Decimal, spent: Decimal) -> Self {
        if spent.is_zero() {
            GoalStatus::NaoIniciado
        } else if spent > budgeted {
            GoalStatus::Excedido
        } else if spent == budgeted {
            GoalStatus::Atingido
        } else {
            GoalStatus::EmAndamento
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::NaoIniciado => "Não iniciado",
            GoalStatus::EmAndamento => "Em andamento",
            GoalStatus::Atingido => "Atingido",
            GoalStatus::Excedido => "Excedido",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub budgeted: Decimal,
    pub spent: Decimal,
    /// Spent as a share of budgeted, in percent.
    pub percentage: Decimal,
    pub status: GoalStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub spent: Decimal,
    /// Share of the period's total spend, in percent.
    pub percentage: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinanceSummary {
    pub month: u32,
    pub year: i32,
    pub total_budgeted: Decimal,
    pub total_spent: Decimal,
    /// Budget minus spend. Negative when over budget.
    pub available_balance: Decimal,
    pub utilization_percentage: Decimal,
    pub category_breakdown: Vec<CategoryBreakdown>,
    /// Every spending category, largest first. Use [`FinanceSummary::top`]
    /// to truncate for display.
    pub top_categories: Vec<CategorySpend>,
}

impl FinanceSummary {
    pub fn top(&self, n: usize) -> &[CategorySpend] {
        &self.top_categories[..n.min(self.top_categories.len())]
    }
}

fn check_month(month: u32) -> Result<(), EngineError> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(EngineError::InvalidMonth(month))
    }
}

fn in_month(date: NaiveDate, month: u32, year: i32) -> bool {
    date.month() == month && date.year() == year
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        round_cents(part / whole * Decimal::ONE_HUNDRED)
    }
}

/// `None` is the uncategorized bucket, kept apart from any real category
/// that happens to share its label.
fn category_key(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn category_label(key: Option<&str>) -> String {
    key.unwrap_or(UNCATEGORIZED).to_string()
}

/// Sums `(label, amount)` pairs keeping first-seen order, then ranks them
/// largest first. Equal sums keep discovery order.
fn ranked_totals<K, I>(items: I) -> Vec<(K, Decimal)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, Decimal)>,
{
    let mut order: Vec<(K, Decimal)> = Vec::new();
    let mut index: HashMap<K, usize> = HashMap::new();
    for (label, amount) in items {
        match index.get(&label) {
            Some(&i) => order[i].1 += amount,
            None => {
                index.insert(label.clone(), order.len());
                order.push((label, amount));
            }
        }
    }
    order.sort_by(|a, b| b.1.cmp(&a.1));
    order
}

/// Budget-vs-actual for one calendar month. Pure.
pub fn compute_summary(
    transactions: &[Transaction],
    goals: &[BudgetGoal],
    month: u32,
    year: i32,
) -> Result<FinanceSummary, EngineError> {
    check_month(month)?;

    let period_goals: Vec<&BudgetGoal> = goals
        .iter()
        .filter(|g| g.month == month && g.year == year)
        .collect();
    let spending: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.kind == TxType::Saida && in_month(t.date, month, year))
        .collect();

    let total_budgeted: Decimal = period_goals.iter().map(|g| g.budget_amount).sum();
    let total_spent: Decimal = spending.iter().map(|t| t.amount).sum();

    let ranked = ranked_totals(
        spending
            .iter()
            .map(|t| (category_key(t.category.as_deref()), t.amount)),
    );

    let mut breakdown: Vec<CategoryBreakdown> = Vec::new();
    let mut budgeted_by_category: Vec<(Option<String>, Decimal)> = Vec::new();
    for g in &period_goals {
        let key = category_key(Some(&g.category));
        match budgeted_by_category.iter_mut().find(|(c, _)| *c == key) {
            Some((_, amt)) => *amt += g.budget_amount,
            None => budgeted_by_category.push((key, g.budget_amount)),
        }
    }
    for (category, budgeted) in &budgeted_by_category {
        let spent = ranked
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, a)| *a)
            .unwrap_or(Decimal::ZERO);
        breakdown.push(CategoryBreakdown {
            category: category_label(category.as_deref()),
            budgeted: *budgeted,
            spent,
            percentage: percent_of(spent, *budgeted),
            status: GoalStatus::from_amounts(*budgeted, spent),
        });
    }
    for (category, spent) in &ranked {
        if !budgeted_by_category.iter().any(|(c, _)| c == category) {
            breakdown.push(CategoryBreakdown {
                category: category_label(category.as_deref()),
                budgeted: Decimal::ZERO,
                spent: *spent,
                percentage: Decimal::ZERO,
                status: GoalStatus::from_amounts(Decimal::ZERO, *spent),
            });
        }
    }

    let top_categories = ranked
        .into_iter()
        .map(|(key, spent)| CategorySpend {
            category: category_label(key.as_deref()),
            percentage: percent_of(spent, total_spent),
            spent,
        })
        .collect();

    Ok(FinanceSummary {
        month,
        year,
        total_budgeted,
        total_spent,
        available_balance: total_budgeted - total_spent,
        utilization_percentage: percent_of(total_spent, total_budgeted),
        category_breakdown: breakdown,
        top_categories,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    Essential,
    Variable,
    Debt,
}

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpenseKind::Essential => "essential",
            ExpenseKind::Variable => "variable",
            ExpenseKind::Debt => "debt",
        }
    }
}

/// Debt wins over essential when a category name hits both keyword lists.
pub fn classify_expense(category: Option<&str>) -> ExpenseKind {
    let Some(category) = category.map(str::to_lowercase) else {
        return ExpenseKind::Variable;
    };
    if DEBT_KEYWORDS.iter().any(|k| category.contains(k)) {
        ExpenseKind::Debt
    } else if ESSENTIAL_KEYWORDS.iter().any(|k| category.contains(k)) {
        ExpenseKind::Essential
    } else {
        ExpenseKind::Variable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpenseLine {
    pub category: String,
    pub amount: Decimal,
    pub percentage: Decimal,
    pub kind: ExpenseKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashflowSummary {
    pub month: u32,
    pub year: i32,
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    /// (income - expenses) / income, in percent; 0 without income.
    pub savings_rate: Decimal,
    pub cost_of_living: Decimal,
    pub debt_payments: Decimal,
    pub breakdown: Vec<ExpenseLine>,
}

/// Income, expenses and derived ratios for one calendar month.
pub fn compute_cashflow(
    transactions: &[Transaction],
    month: u32,
    year: i32,
) -> Result<CashflowSummary, EngineError> {
    check_month(month)?;
    let period: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| in_month(t.date, month, year))
        .collect();

    let income: Decimal = period
        .iter()
        .filter(|t| t.kind == TxType::Entrada)
        .map(|t| t.amount)
        .sum();
    let expenses_iter = || period.iter().filter(|t| t.kind == TxType::Saida);
    let expenses: Decimal = expenses_iter().map(|t| t.amount).sum();

    let mut cost_of_living = Decimal::ZERO;
    let mut debt_payments = Decimal::ZERO;
    for t in expenses_iter() {
        match classify_expense(t.category.as_deref()) {
            ExpenseKind::Essential => cost_of_living += t.amount,
            ExpenseKind::Debt => debt_payments += t.amount,
            ExpenseKind::Variable => {}
        }
    }

    let breakdown = ranked_totals(
        expenses_iter().map(|t| (category_key(t.category.as_deref()), t.amount)),
    )
    .into_iter()
    .map(|(key, amount)| ExpenseLine {
        kind: classify_expense(key.as_deref()),
        percentage: percent_of(amount, expenses),
        category: category_label(key.as_deref()),
        amount,
    })
    .collect();

    Ok(CashflowSummary {
        month,
        year,
        income,
        expenses,
        balance: income - expenses,
        savings_rate: percent_of(income - expenses, income),
        cost_of_living,
        debt_payments,
        breakdown,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthFlow {
    /// `YYYY-MM`
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    pub savings_rate: Decimal,
}

/// Cash flow for the `months` calendar months ending at `end`, oldest first.
/// At most [`MAX_HISTORY_MONTHS`] are returned.
pub fn monthly_history(
    transactions: &[Transaction],
    end: NaiveDate,
    months: u32,
) -> Result<Vec<MonthFlow>, EngineError> {
    let months = months.min(MAX_HISTORY_MONTHS);
    let first_of_end = end.with_day(1).unwrap_or(end);
    let mut out = Vec::new();
    for back in (0..months).rev() {
        let Some(start) = first_of_end.checked_sub_months(Months::new(back)) else {
            continue;
        };
        let c = compute_cashflow(transactions, start.month(), start.year())?;
        out.push(MonthFlow {
            month: format!("{:04}-{:02}", start.year(), start.month()),
            income: c.income,
            expenses: c.expenses,
            balance: c.balance,
            savings_rate: c.savings_rate,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthFigures {
    pub income: Decimal,
    pub expenses: Decimal,
    pub balance: Decimal,
    pub cost_of_living: Decimal,
    pub savings_rate: Decimal,
}

impl From<&CashflowSummary> for MonthFigures {
    fn from(c: &CashflowSummary) -> Self {
        MonthFigures {
            income: c.income,
            expenses: c.expenses,
            balance: c.balance,
            cost_of_living: c.cost_of_living,
            savings_rate: c.savings_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trends {
    /// Percent change of income against the previous month; 0 without
    /// previous income.
    pub income_change: Decimal,
    pub expense_change: Decimal,
    /// Difference in percentage points.
    pub savings_rate_change: Decimal,
}

/// Figures behind spending decisions for one month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionBase {
    pub current: MonthFigures,
    pub previous: MonthFigures,
    /// Mean of the month and the two before it.
    pub average_3_months: MonthFigures,
    pub trends: Trends,
}

fn change_pct(current: Decimal, previous: Decimal) -> Decimal {
    if previous > Decimal::ZERO {
        percent_of(current - previous, previous)
    } else {
        Decimal::ZERO
    }
}

pub fn decision_base(
    transactions: &[Transaction],
    month: u32,
    year: i32,
) -> Result<DecisionBase, EngineError> {
    check_month(month)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or(EngineError::InvalidMonth(month))?;
    let mut window = Vec::with_capacity(3);
    for back in 0..3 {
        let start = first
            .checked_sub_months(Months::new(back))
            .ok_or(EngineError::InvalidMonth(month))?;
        window.push(compute_cashflow(transactions, start.month(), start.year())?);
    }

    let current = MonthFigures::from(&window[0]);
    let previous = MonthFigures::from(&window[1]);
    let three = Decimal::from(3);
    let mean = |f: fn(&CashflowSummary) -> Decimal| {
        round_cents(window.iter().map(f).sum::<Decimal>() / three)
    };
    let average_3_months = MonthFigures {
        income: mean(|c| c.income),
        expenses: mean(|c| c.expenses),
        balance: mean(|c| c.balance),
        cost_of_living: mean(|c| c.cost_of_living),
        savings_rate: mean(|c| c.savings_rate),
    };
    let trends = Trends {
        income_change: change_pct(current.income, previous.income),
        expense_change: change_pct(current.expenses, previous.expenses),
        savings_rate_change: current.savings_rate - previous.savings_rate,
    };
    Ok(DecisionBase {
        current,
        previous,
        average_3_months,
        trends,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountBalance {
    pub account: String,
    pub balance: Decimal,
    pub last_update: Option<NaiveDate>,
}

/// Signed running balance per account over all transactions, largest first.
pub fn account_balances(transactions: &[Transaction]) -> Vec<AccountBalance> {
    let mut out: Vec<AccountBalance> = Vec::new();
    for t in transactions {
        match out.iter_mut().find(|b| b.account == t.account) {
            Some(b) => {
                b.balance += t.signed_amount();
                b.last_update = b.last_update.max(Some(t.date));
            }
            None => out.push(AccountBalance {
                account: t.account.clone(),
                balance: t.signed_amount(),
                last_update: Some(t.date),
            }),
        }
    }
    out.sort_by(|a, b| b.balance.cmp(&a.balance));
    out
}
