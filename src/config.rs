use crate::domain::decision::Channel;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Which evaluator is the system of record for compliance rules.
///
/// Local rule evaluation is the default; `Delegated` hands the whole verdict
/// to the external policy engine and maps its violation codes back. The two
/// paths are never mixed for a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    Local,
    Delegated,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    pub policy_version: String,
    pub policy_mode: PolicyMode,
    /// Sanctioned party names, matched case-insensitively by containment.
    pub sanction_list: Vec<String>,
    pub max_amount: Decimal,
    pub evidence_root: String,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            policy_version: "2026.1".to_string(),
            policy_mode: PolicyMode::Local,
            sanction_list: vec!["Beta Corp".to_string(), "Darkwater Holdings".to_string()],
            max_amount: dec!(250000),
            evidence_root: "evidence".to_string(),
        }
    }
}

/// Timeout and bounded-retry budget for collaborator calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub timeout_ms: u64,
    /// Retries after the first attempt; 2 means at most 3 attempts.
    pub retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: 800,
            retries: 2,
            backoff_base_ms: 50,
        }
    }
}

impl RetryPolicy {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Exponential backoff before retry `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_base_ms.saturating_mul(1 << attempt.min(16)))
    }
}

/// Scoring weights for rail selection. Business configuration, not code;
/// must sum to 1.0.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub cost: f64,
    pub latency: f64,
    pub success_rate: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            cost: 0.4,
            latency: 0.35,
            success_rate: 0.25,
        }
    }
}

impl ScoringWeights {
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("cost", self.cost),
            ("latency", self.latency),
            ("success_rate", self.success_rate),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(PipelineError::ConfigError(format!(
                    "weight {name} out of range: {w}"
                )));
            }
        }
        let sum = self.cost + self.latency + self.success_rate;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(PipelineError::ConfigError(format!(
                "scoring weights must sum to 1.0, got {sum}"
            )));
        }
        Ok(())
    }
}

/// Static constraints and scoring inputs for one configured rail.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSpec {
    pub channel: Channel,
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    /// Fee in basis points of the transferred amount.
    pub fee_bps: f64,
    pub expected_latency_secs: u64,
    /// Historical success rate in [0, 1]; absent means no history yet.
    pub success_rate: Option<f64>,
    /// Operating window in whole UTC hours, [open, close).
    pub open_hour: u32,
    pub close_hour: u32,
    /// Submissions stop this many minutes before close.
    pub cutoff_minutes: u32,
    #[serde(default)]
    pub suspended: bool,
}

impl ChannelSpec {
    /// True when `now` falls inside the operating window, cutoff included.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let minute_of_day = now.hour() * 60 + now.minute();
        let open = self.open_hour * 60;
        let close = (self.close_hour * 60).saturating_sub(self.cutoff_minutes);
        minute_of_day >= open && minute_of_day < close
    }
}

/// One immutable snapshot of everything the pipeline's decisions depend on.
/// Passed explicitly into each stage so identical inputs always produce
/// identical decisions; nothing is read from ambient global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub compliance: ComplianceConfig,
    pub channels: Vec<ChannelSpec>,
    pub weights: ScoringWeights,
    pub retry: RetryPolicy,
    /// How long reconciliation waits for a rail confirmation.
    pub settlement_sla_ms: u64,
    pub confirmation_poll_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            compliance: ComplianceConfig::default(),
            channels: vec![
                ChannelSpec {
                    channel: Channel::Immediate,
                    min_amount: dec!(1),
                    max_amount: dec!(200000),
                    fee_bps: 9.0,
                    expected_latency_secs: 30,
                    success_rate: None,
                    open_hour: 0,
                    close_hour: 24,
                    cutoff_minutes: 0,
                    suspended: false,
                },
                ChannelSpec {
                    channel: Channel::Express,
                    min_amount: dec!(1),
                    max_amount: dec!(500000),
                    fee_bps: 6.0,
                    expected_latency_secs: 1800,
                    success_rate: Some(0.98),
                    open_hour: 8,
                    close_hour: 20,
                    cutoff_minutes: 30,
                    suspended: false,
                },
                ChannelSpec {
                    channel: Channel::Batched,
                    min_amount: dec!(10000),
                    max_amount: dec!(10000000),
                    fee_bps: 2.0,
                    expected_latency_secs: 14400,
                    success_rate: Some(0.995),
                    open_hour: 9,
                    close_hour: 17,
                    cutoff_minutes: 60,
                    suspended: false,
                },
            ],
            weights: ScoringWeights::default(),
            retry: RetryPolicy::default(),
            settlement_sla_ms: 2000,
            confirmation_poll_ms: 50,
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PipelineError::ConfigError(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        let mut seen = Vec::new();
        for spec in &self.channels {
            if seen.contains(&spec.channel) {
                return Err(PipelineError::ConfigError(format!(
                    "duplicate channel spec: {}",
                    spec.channel
                )));
            }
            seen.push(spec.channel);
            if spec.min_amount > spec.max_amount {
                return Err(PipelineError::ConfigError(format!(
                    "{}: min_amount exceeds max_amount",
                    spec.channel
                )));
            }
            if spec.open_hour >= spec.close_hour || spec.close_hour > 24 {
                return Err(PipelineError::ConfigError(format!(
                    "{}: invalid operating window {}-{}",
                    spec.channel, spec.open_hour, spec.close_hour
                )));
            }
            if let Some(rate) = spec.success_rate
                && !(0.0..=1.0).contains(&rate)
            {
                return Err(PipelineError::ConfigError(format!(
                    "{}: success_rate out of range: {rate}",
                    spec.channel
                )));
            }
        }
        Ok(())
    }
}
