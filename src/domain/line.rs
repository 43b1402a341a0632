use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A currency-tagged, strictly positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so amounts are exact fixed-point values and
/// cannot be constructed negative or zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub value: Decimal,
    pub currency: String,
}

impl Money {
    pub fn new(value: Decimal, currency: impl Into<String>) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(PipelineError::ValidationError(
                "amount must be positive".to_string(),
            ));
        }
        let currency = currency.into();
        if currency.trim().is_empty() {
            return Err(PipelineError::ValidationError(
                "currency must be non-empty".to_string(),
            ));
        }
        Ok(Self { value, currency })
    }
}

/// Identifies a line across every record the pipeline produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub batch_id: String,
    pub line_id: String,
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.batch_id, self.line_id)
    }
}

/// The ordering party of a line. `kyc_ref` is optional at the type level;
/// its absence is a compliance outcome, not a malformed input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub account: String,
    pub kyc_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beneficiary {
    pub name: String,
    pub account: String,
    pub bank_code: String,
}

/// A single payment instruction within a batch. Immutable once admitted;
/// every downstream stage only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLine {
    pub batch_id: String,
    pub line_id: String,
    pub sender: Party,
    pub beneficiary: Beneficiary,
    pub amount: Money,
    pub purpose: String,
    pub schedule_time: DateTime<Utc>,
}

impl TransactionLine {
    pub fn key(&self) -> LineKey {
        LineKey {
            batch_id: self.batch_id.clone(),
            line_id: self.line_id.clone(),
        }
    }
}

/// Wire shape of one batch CSV row, before admission checks.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLineRecord {
    pub batch_id: String,
    pub line_id: String,
    pub sender_name: String,
    pub sender_account: String,
    pub sender_kyc_ref: Option<String>,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub beneficiary_bank_code: String,
    pub amount: Decimal,
    pub currency: String,
    pub purpose: String,
    pub schedule_time: DateTime<Utc>,
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(PipelineError::ValidationError(format!(
            "missing required field: {field}"
        )));
    }
    Ok(trimmed.to_string())
}

impl TryFrom<RawLineRecord> for TransactionLine {
    type Error = PipelineError;

    /// Admission check: every required field present and non-empty, amount
    /// strictly positive. Malformed rows never enter the pipeline.
    fn try_from(raw: RawLineRecord) -> Result<Self> {
        let kyc_ref = raw
            .sender_kyc_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        Ok(Self {
            batch_id: required("batch_id", &raw.batch_id)?,
            line_id: required("line_id", &raw.line_id)?,
            sender: Party {
                name: required("sender_name", &raw.sender_name)?,
                account: required("sender_account", &raw.sender_account)?,
                kyc_ref,
            },
            beneficiary: Beneficiary {
                name: required("beneficiary_name", &raw.beneficiary_name)?,
                account: required("beneficiary_account", &raw.beneficiary_account)?,
                bank_code: required("beneficiary_bank_code", &raw.beneficiary_bank_code)?,
            },
            amount: Money::new(raw.amount, required("currency", &raw.currency)?)?,
            purpose: required("purpose", &raw.purpose)?,
            schedule_time: raw.schedule_time,
        })
    }
}
