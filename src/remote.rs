// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Pull client for the upstream data service.
//!
//! Each collection is one `GET {url}/{collection}` returning a JSON array of
//! records with the service's field names. Records are upserted into the
//! local store by their external id. Transport and HTTP failures come back
//! as [`ServiceError`]; nothing is retried.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::currency::round_cents;
use crate::error::ServiceError;
use crate::models::{BudgetGoal, CategorizationRule, Goal, Kpi, NewTransaction, TxType};
use crate::store;
use crate::utils::{REMOTE_TOKEN, REMOTE_URL, get_setting};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub token: Option<String>,
}

impl RemoteConfig {
    pub fn from_settings(conn: &Connection) -> Result<Self, ServiceError> {
        let url = get_setting(conn, REMOTE_URL)
            .map_err(|e| ServiceError::Misconfigured(e.to_string()))?
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                ServiceError::Misconfigured(format!(
                    "{} is not set; run `opsbook config set {} <url>`",
                    REMOTE_URL, REMOTE_URL
                ))
            })?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ServiceError::Misconfigured(format!(
                "{} must start with http:// or https:// (got '{}')",
                REMOTE_URL, url
            )));
        }
        let token = get_setting(conn, REMOTE_TOKEN)
            .map_err(|e| ServiceError::Misconfigured(e.to_string()))?
            .filter(|t| !t.trim().is_empty());
        Ok(RemoteConfig { url, token })
    }

    pub fn collection_url(&self, collection: Collection) -> String {
        format!("{}/{}", self.url, collection.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Collection {
    Transactions,
    BudgetGoals,
    Rules,
    Kpis,
    Goals,
}

impl Collection {
    /// Pull order: goals reference KPIs, so KPIs come first.
    pub const ALL: [Collection; 5] = [
        Collection::Transactions,
        Collection::BudgetGoals,
        Collection::Rules,
        Collection::Kpis,
        Collection::Goals,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Collection::Transactions => "transactions",
            Collection::BudgetGoals => "budget-goals",
            Collection::Rules => "rules",
            Collection::Kpis => "kpis",
            Collection::Goals => "goals",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Collection::ALL
            .into_iter()
            .find(|c| c.path() == s.trim().to_lowercase())
    }
}

/// Fetches and decodes one collection.
pub fn fetch_collection<T: DeserializeOwned>(
    client: &reqwest::blocking::Client,
    cfg: &RemoteConfig,
    collection: Collection,
) -> Result<Vec<T>, ServiceError> {
    let url = cfg.collection_url(collection);
    log::info!("pulling {}", url);
    let mut req = client.get(&url);
    if let Some(token) = &cfg.token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().map_err(|e| ServiceError::Connection {
        url: url.clone(),
        detail: e.to_string(),
    })?;
    let status = resp.status();
    if !status.is_success() {
        return Err(ServiceError::from_status(status.as_u16(), &url));
    }
    let body = resp.text().map_err(|e| ServiceError::Connection {
        url: url.clone(),
        detail: e.to_string(),
    })?;
    decode_records(collection, &body)
}

/// Accepts a bare JSON array or an object wrapping it under `data` or
/// `results`.
pub fn decode_records<T: DeserializeOwned>(
    collection: Collection,
    body: &str,
) -> Result<Vec<T>, ServiceError> {
    let decode_err = |detail: String| ServiceError::Decode {
        collection: collection.path().to_string(),
        detail,
    };
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| decode_err(e.to_string()))?;
    let array = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut obj) => obj
            .remove("data")
            .or_else(|| obj.remove("results"))
            .ok_or_else(|| decode_err("expected a JSON array of records".into()))?,
        _ => return Err(decode_err("expected a JSON array of records".into())),
    };
    serde_json::from_value(array).map_err(|e| decode_err(e.to_string()))
}

fn money(v: f64) -> Result<Decimal> {
    let d = Decimal::try_from(v).with_context(|| format!("Invalid amount {}", v))?;
    Ok(round_cents(d))
}

fn remote_date(s: &str) -> Result<NaiveDate> {
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").with_context(|| format!("Invalid date '{}'", s))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteTransaction {
    #[serde(rename = "id")]
    pub id: String,
    pub name: String,
    pub date: String,
    pub amount: f64,
    #[serde(rename = "Type")]
    pub kind: TxType,
    #[serde(default)]
    pub category: Option<String>,
    pub account: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub imported: bool,
    #[serde(default)]
    pub file_source: Option<String>,
}

impl RemoteTransaction {
    /// Negative upstream amounts keep their magnitude; direction comes from
    /// `Type`.
    pub fn to_new(&self) -> Result<NewTransaction> {
        Ok(NewTransaction {
            name: self.name.clone(),
            date: remote_date(&self.date)?,
            amount: money(self.amount)?.abs(),
            kind: self.kind,
            account: self.account.clone(),
            category: self.category.clone(),
            description: self.description.clone(),
            imported: self.imported,
            file_source: self.file_source.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteBudgetGoal {
    #[serde(rename = "id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub month: u32,
    pub year: i32,
    pub budget_amount: f64,
    pub period_start: String,
    pub period_end: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RemoteBudgetGoal {
    pub fn to_goal(&self) -> Result<BudgetGoal> {
        Ok(BudgetGoal {
            id: 0,
            name: self.name.clone(),
            category: self.category.clone(),
            month: self.month,
            year: self.year,
            budget_amount: money(self.budget_amount)?,
            period_start: remote_date(&self.period_start)?,
            period_end: remote_date(&self.period_end)?,
            notes: self.notes.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteRule {
    #[serde(rename = "id")]
    pub id: String,
    pub name: String,
    pub pattern: String,
    pub category: String,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteKpi {
    #[serde(rename = "id")]
    pub id: String,
    pub name: String,
    pub periodicity: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub visible_public: bool,
    #[serde(default)]
    pub is_financial: bool,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteGoal {
    #[serde(rename = "id")]
    pub id: String,
    #[serde(rename = "KPI")]
    pub kpi: String,
    #[serde(default)]
    pub month: Option<u32>,
    pub year: i32,
    #[serde(default)]
    pub actual: f64,
    #[serde(default)]
    pub target: f64,
    #[serde(default)]
    pub visible_public: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub collection: String,
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl PullReport {
    fn new(collection: Collection) -> Self {
        PullReport {
            collection: collection.path().to_string(),
            ..Default::default()
        }
    }

    fn count(&mut self, inserted: bool) {
        if inserted {
            self.inserted += 1;
        } else {
            self.updated += 1;
        }
    }
}

pub fn apply_transactions(conn: &Connection, records: &[RemoteTransaction]) -> Result<PullReport> {
    let mut report = PullReport::new(Collection::Transactions);
    let tx = conn.unchecked_transaction()?;
    for r in records {
        let new = match r.to_new().and_then(|n| {
            n.validate()?;
            Ok(n)
        }) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("skipping transaction {}: {:#}", r.id, e);
                report.skipped += 1;
                continue;
            }
        };
        let (_, inserted) = store::upsert_transaction_external(&tx, &r.id, &new)
            .with_context(|| format!("Store transaction {}", r.id))?;
        report.count(inserted);
    }
    tx.commit()?;
    Ok(report)
}

pub fn apply_budget_goals(conn: &Connection, records: &[RemoteBudgetGoal]) -> Result<PullReport> {
    let mut report = PullReport::new(Collection::BudgetGoals);
    let tx = conn.unchecked_transaction()?;
    for r in records {
        let goal = match r.to_goal().and_then(|g| {
            g.validate()?;
            Ok(g)
        }) {
            Ok(g) => g,
            Err(e) => {
                log::warn!("skipping budget goal {}: {:#}", r.id, e);
                report.skipped += 1;
                continue;
            }
        };
        if let Some(id) = store::budget_goal_id_for_external(&tx, &r.id)? {
            if let Some(other) = store::budget_goal_id_for_key(&tx, &goal)?.filter(|o| *o != id) {
                log::warn!(
                    "skipping budget goal {}: goal {} already covers {} {:02}/{}",
                    r.id,
                    other,
                    goal.category.trim(),
                    goal.month,
                    goal.year
                );
                report.skipped += 1;
                continue;
            }
            store::replace_budget_goal(&tx, id, &goal)?;
            report.count(false);
            continue;
        }
        let existing = store::budget_goal_id_for_key(&tx, &goal)?;
        let stored = store::upsert_budget_goal(&tx, &goal)?;
        store::set_budget_goal_external(&tx, stored.id, &r.id)?;
        report.count(existing.is_none());
    }
    tx.commit()?;
    Ok(report)
}

pub fn apply_rules(conn: &Connection, records: &[RemoteRule]) -> Result<PullReport> {
    let mut report = PullReport::new(Collection::Rules);
    let tx = conn.unchecked_transaction()?;
    for r in records {
        if r.pattern.trim().is_empty() || r.category.trim().is_empty() {
            log::warn!("skipping rule {}: empty pattern or category", r.id);
            report.skipped += 1;
            continue;
        }
        let rule = CategorizationRule {
            id: 0,
            name: r.name.clone(),
            pattern: r.pattern.trim().to_string(),
            category: r.category.trim().to_string(),
            priority: r.priority,
            active: r.active,
        };
        report.count(store::upsert_rule_external(&tx, &r.id, &rule)?);
    }
    tx.commit()?;
    Ok(report)
}

pub fn apply_kpis(conn: &Connection, records: &[RemoteKpi]) -> Result<PullReport> {
    let mut report = PullReport::new(Collection::Kpis);
    let tx = conn.unchecked_transaction()?;
    for r in records {
        let periodicity = match r.periodicity.parse() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("skipping KPI {}: {}", r.id, e);
                report.skipped += 1;
                continue;
            }
        };
        let kpi = Kpi {
            id: 0,
            name: r.name.clone(),
            periodicity,
            sort_order: r.sort_order,
            visible_public: r.visible_public,
            is_financial: r.is_financial,
            unit: r.unit.clone(),
        };
        let (_, inserted) = store::upsert_kpi_external(&tx, &r.id, &kpi)?;
        report.count(inserted);
    }
    tx.commit()?;
    Ok(report)
}

fn goal_from_remote(r: &RemoteGoal, kpi_id: i64) -> Result<Goal> {
    let goal = Goal {
        id: 0,
        kpi_id,
        month: r.month,
        year: r.year,
        actual: money(r.actual)?,
        target: money(r.target)?,
        visible_public: r.visible_public,
    };
    goal.validate()?;
    Ok(goal)
}

/// Goals whose KPI has not been pulled, or whose month is out of range, are
/// skipped.
pub fn apply_goals(conn: &Connection, records: &[RemoteGoal]) -> Result<PullReport> {
    let mut report = PullReport::new(Collection::Goals);
    let tx = conn.unchecked_transaction()?;
    for r in records {
        let Some(kpi_id) = store::kpi_id_for_external(&tx, &r.kpi)? else {
            log::warn!("skipping goal {}: unknown KPI {}", r.id, r.kpi);
            report.skipped += 1;
            continue;
        };
        let goal = match goal_from_remote(r, kpi_id) {
            Ok(g) => g,
            Err(e) => {
                log::warn!("skipping goal {}: {:#}", r.id, e);
                report.skipped += 1;
                continue;
            }
        };
        report.count(store::upsert_goal_external(&tx, &r.id, &goal)?);
    }
    tx.commit()?;
    Ok(report)
}

/// Pulls the requested collections in order and applies each one. Stops at
/// the first service error; collections already applied stay applied.
pub fn pull(
    conn: &Connection,
    client: &reqwest::blocking::Client,
    cfg: &RemoteConfig,
    collections: &[Collection],
) -> Result<Vec<PullReport>> {
    let mut ordered: Vec<Collection> = Collection::ALL
        .into_iter()
        .filter(|c| collections.contains(c))
        .collect();
    ordered.dedup();
    let mut reports = Vec::new();
    for c in ordered {
        let report = match c {
            Collection::Transactions => apply_transactions(conn, &fetch_collection(client, cfg, c)?)?,
            Collection::BudgetGoals => apply_budget_goals(conn, &fetch_collection(client, cfg, c)?)?,
            Collection::Rules => apply_rules(conn, &fetch_collection(client, cfg, c)?)?,
            Collection::Kpis => apply_kpis(conn, &fetch_collection(client, cfg, c)?)?,
            Collection::Goals => apply_goals(conn, &fetch_collection(client, cfg, c)?)?,
        };
        log::info!(
            "{}: {} new, {} updated, {} skipped",
            report.collection,
            report.inserted,
            report.updated,
            report.skipped
        );
        reports.push(report);
    }
    Ok(reports)
}
