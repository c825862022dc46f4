// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error types shared by the calculation engine and the data service layers.

use rust_decimal::Decimal;
use thiserror::Error;

/// Validation failures raised by the pure calculation engine.
///
/// Every variant is user-correctable; the operation that raised it has no
/// side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Invalid month {0}, expected 1-12")]
    InvalidMonth(u32),
    #[error("Installment count must be greater than zero (got {0})")]
    InvalidInstallmentCount(i64),
    #[error("Total must be greater than zero to calculate installments (got {0})")]
    NonPositiveTotal(Decimal),
    #[error("Total {total} cannot be split into {count} positive installments")]
    DegenerateInstallments { total: Decimal, count: u32 },
    #[error("Missing required field '{0}'")]
    MissingField(&'static str),
    #[error("Period start {start} must be before period end {end}")]
    InvalidPeriod { start: String, end: String },
    #[error("{field} must not be negative (got {value})")]
    NegativeAmount { field: &'static str, value: Decimal },
    #[error("Quantity must be at least 1 (got {0})")]
    InvalidQuantity(u32),
    #[error("A rejection reason is required when a proposal is refused")]
    MissingRejectionReason,
}

/// Statement parsing failures. A file that fails to parse imports nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("Statement is empty or has no transactions")]
    Empty,
    #[error("An account label is required to import a statement")]
    MissingAccount,
    #[error("Could not detect required columns in CSV. Expected: date, description, value")]
    MissingColumns,
    #[error("Line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error("Invalid CSV: {0}")]
    Csv(String),
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}

/// Failures talking to the remote data service.
///
/// Each variant renders a distinct message so the user can tell a dead
/// connection from throttling or a broken setup. Nothing is retried.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Could not connect to the data service at {url}: {detail}")]
    Connection { url: String, detail: String },
    #[error("The data service is rate limiting requests; wait a few seconds and try again")]
    RateLimited,
    #[error("The data service is misconfigured: {0}")]
    Misconfigured(String),
    #[error("The data service answered {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Unexpected response from the data service for {collection}: {detail}")]
    Decode { collection: String, detail: String },
}

impl ServiceError {
    /// Maps an HTTP status to the matching variant.
    pub fn from_status(status: u16, url: &str) -> Self {
        match status {
            429 => ServiceError::RateLimited,
            401 | 403 => ServiceError::Misconfigured(format!(
                "access denied ({}) for {}; check remote.token",
                status, url
            )),
            404 => ServiceError::Misconfigured(format!(
                "collection not found at {}; check remote.url",
                url
            )),
            _ => ServiceError::Status {
                status,
                url: url.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_distinguishes_rate_limit_and_config() {
        assert!(matches!(
            ServiceError::from_status(429, "http://x/kpis"),
            ServiceError::RateLimited
        ));
        assert!(matches!(
            ServiceError::from_status(404, "http://x/kpis"),
            ServiceError::Misconfigured(_)
        ));
        assert!(matches!(
            ServiceError::from_status(500, "http://x/kpis"),
            ServiceError::Status { status: 500, .. }
        ));
    }
}
