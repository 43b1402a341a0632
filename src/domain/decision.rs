use crate::domain::line::{LineKey, Money};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rule-violation and exception codes shared across the pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    // Compliance Gate
    SanctionListMatch,
    AmountLimitExceeded,
    KycValidationFailed,
    IfscValidationFailed,
    PolicyEngineUnavailable,
    // Rail Router
    NoEligibleRail,
    RailExhausted,
    // Reconciliation
    TransactionTimeout,
    SettlementMismatch,
}

/// Stage a failing reason originates from. Ordering is the triage priority:
/// compliance before routing before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailingStage {
    Compliance,
    Routing,
    Reconciliation,
}

impl ReasonCode {
    pub fn stage(&self) -> FailingStage {
        match self {
            Self::SanctionListMatch
            | Self::AmountLimitExceeded
            | Self::KycValidationFailed
            | Self::IfscValidationFailed
            | Self::PolicyEngineUnavailable => FailingStage::Compliance,
            Self::NoEligibleRail | Self::RailExhausted => FailingStage::Routing,
            Self::TransactionTimeout | Self::SettlementMismatch => FailingStage::Reconciliation,
        }
    }

    /// Evidence artifact basename for compliance checks.
    pub fn check_name(&self) -> &'static str {
        match self {
            Self::SanctionListMatch => "sanction_match",
            Self::AmountLimitExceeded => "amount_limit",
            Self::KycValidationFailed => "kyc_check",
            Self::IfscValidationFailed => "bank_code_format",
            Self::PolicyEngineUnavailable => "policy_engine",
            Self::NoEligibleRail => "no_eligible_rail",
            Self::RailExhausted => "rail_exhausted",
            Self::TransactionTimeout => "transaction_timeout",
            Self::SettlementMismatch => "settlement_mismatch",
        }
    }

    /// Wire name, matching what an external policy engine reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SanctionListMatch => "SANCTION_LIST_MATCH",
            Self::AmountLimitExceeded => "AMOUNT_LIMIT_EXCEEDED",
            Self::KycValidationFailed => "KYC_VALIDATION_FAILED",
            Self::IfscValidationFailed => "IFSC_VALIDATION_FAILED",
            Self::PolicyEngineUnavailable => "POLICY_ENGINE_UNAVAILABLE",
            Self::NoEligibleRail => "NO_ELIGIBLE_RAIL",
            Self::RailExhausted => "RAIL_EXHAUSTED",
            Self::TransactionTimeout => "TRANSACTION_TIMEOUT",
            Self::SettlementMismatch => "SETTLEMENT_MISMATCH",
        }
    }

    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "SANCTION_LIST_MATCH" => Some(Self::SanctionListMatch),
            "AMOUNT_LIMIT_EXCEEDED" => Some(Self::AmountLimitExceeded),
            "KYC_VALIDATION_FAILED" => Some(Self::KycValidationFailed),
            "IFSC_VALIDATION_FAILED" => Some(Self::IfscValidationFailed),
            "POLICY_ENGINE_UNAVAILABLE" => Some(Self::PolicyEngineUnavailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable pointer to a stored artifact substantiating a decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EvidenceRef(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Outcome of the Compliance Gate for one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceDecision {
    pub line: LineKey,
    pub decision: Verdict,
    pub reasons: Vec<ReasonCode>,
    pub evidence_refs: Vec<EvidenceRef>,
    pub policy_version: String,
    pub override_applied: bool,
    pub decided_at: DateTime<Utc>,
}

impl ComplianceDecision {
    /// Builds a decision, enforcing FAIL ⇔ reasons non-empty and one
    /// evidence ref per reason, in the same order.
    pub fn new(
        line: LineKey,
        reasons: Vec<ReasonCode>,
        evidence_refs: Vec<EvidenceRef>,
        policy_version: String,
        decided_at: DateTime<Utc>,
    ) -> Result<Self> {
        if reasons.len() != evidence_refs.len() {
            return Err(PipelineError::ValidationError(format!(
                "evidence refs ({}) must pair reasons ({})",
                evidence_refs.len(),
                reasons.len()
            )));
        }
        let decision = if reasons.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        Ok(Self {
            line,
            decision,
            reasons,
            evidence_refs,
            policy_version,
            override_applied: false,
            decided_at,
        })
    }

    /// Manual override: forces PASS while preserving the original reasons
    /// and evidence for the audit trail. Produces a superseding record.
    pub fn with_override(&self, decided_at: DateTime<Utc>) -> Self {
        Self {
            decision: Verdict::Pass,
            override_applied: true,
            decided_at,
            ..self.clone()
        }
    }
}

/// Settlement rails, in fixed tie-break priority order (real-time first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Immediate,
    Express,
    Batched,
}

impl Channel {
    /// Descending tie-break priority. Equal scores always resolve in this
    /// order, never arbitrarily.
    pub const PRIORITY: [Channel; 3] = [Channel::Immediate, Channel::Express, Channel::Batched];

    pub fn priority_rank(&self) -> usize {
        Self::PRIORITY
            .iter()
            .position(|c| c == self)
            .unwrap_or(Self::PRIORITY.len())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Immediate => "IMMEDIATE",
            Channel::Express => "EXPRESS",
            Channel::Batched => "BATCHED",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IneligibilityReason {
    BelowMinimum,
    AboveMaximum,
    OutsideWindow,
    Suspended,
}

/// Per-channel scoring result for one routing attempt. Transient; kept only
/// inside the RoutingDecision's breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailCandidate {
    pub channel: Channel,
    pub eligible: bool,
    pub score: f64,
    pub ineligibility_reason: Option<IneligibilityReason>,
}

/// Outcome of the Rail Router. `primary_channel == None` means no eligible
/// rail existed; the caller must send the line to triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub line: LineKey,
    pub primary_channel: Option<Channel>,
    pub fallback_channels: Vec<Channel>,
    pub score_breakdown: Vec<RailCandidate>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconStatus {
    Reconciled,
    Exception,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionEntry {
    pub code: ReasonCode,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntrySide {
    Debit,
    Credit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub side: EntrySide,
    pub account: String,
    pub amount: Money,
}

/// Outcome of matching expected settlement against rail confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRecord {
    pub line: LineKey,
    pub status: ReconStatus,
    pub matched_reference: Option<String>,
    pub exceptions: Vec<ExceptionEntry>,
    pub journal_entries: Vec<JournalEntry>,
}

impl ReconciliationRecord {
    pub fn reconciled(
        line: LineKey,
        reference: String,
        debit: JournalEntry,
        credit: JournalEntry,
    ) -> Self {
        Self {
            line,
            status: ReconStatus::Reconciled,
            matched_reference: Some(reference),
            exceptions: Vec::new(),
            journal_entries: vec![debit, credit],
        }
    }

    pub fn exception(line: LineKey, exceptions: Vec<ExceptionEntry>) -> Self {
        Self {
            line,
            status: ReconStatus::Exception,
            matched_reference: None,
            exceptions,
            journal_entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultParty {
    SenderBank,
    ReceiverBank,
    System,
    Regulator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    pub code: ReasonCode,
    pub detail: String,
}

/// Outcome of Failure Triage for one failed line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseRecord {
    pub line: LineKey,
    pub root_cause: RootCause,
    pub fault_party: FaultParty,
    pub retry_eligible: bool,
    pub recommended_actions: Vec<String>,
    pub evidence_refs: Vec<EvidenceRef>,
    pub analyzed_at: DateTime<Utc>,
}

/// Per-line lifecycle. SETTLED and TRIAGED are the only terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineState {
    Admitted,
    CompliancePass,
    ComplianceFail,
    Routed,
    Settled,
    RoutingExhausted,
    Triaged,
}

impl LineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LineState::Settled | LineState::Triaged)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineState::Admitted => "ADMITTED",
            LineState::CompliancePass => "COMPLIANCE_PASS",
            LineState::ComplianceFail => "COMPLIANCE_FAIL",
            LineState::Routed => "ROUTED",
            LineState::Settled => "SETTLED",
            LineState::RoutingExhausted => "ROUTING_EXHAUSTED",
            LineState::Triaged => "TRIAGED",
        }
    }
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn key() -> LineKey {
        LineKey {
            batch_id: "B-1".to_string(),
            line_id: "L-1".to_string(),
        }
    }

    #[test]
    fn test_decision_invariant_fail_iff_reasons() {
        let pass = ComplianceDecision::new(
            key(),
            vec![],
            vec![],
            "v1".to_string(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(pass.decision, Verdict::Pass);

        let fail = ComplianceDecision::new(
            key(),
            vec![ReasonCode::SanctionListMatch],
            vec![EvidenceRef("e/B-1/L-1/sanction_match.pdf".to_string())],
            "v1".to_string(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(fail.decision, Verdict::Fail);
    }

    #[test]
    fn test_decision_rejects_mismatched_evidence() {
        let result = ComplianceDecision::new(
            key(),
            vec![ReasonCode::SanctionListMatch],
            vec![],
            "v1".to_string(),
            Utc::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_override_preserves_reasons() {
        let fail = ComplianceDecision::new(
            key(),
            vec![ReasonCode::KycValidationFailed],
            vec![EvidenceRef("e/B-1/L-1/kyc_check.pdf".to_string())],
            "v1".to_string(),
            Utc::now(),
        )
        .unwrap();

        let overridden = fail.with_override(Utc::now());
        assert_eq!(overridden.decision, Verdict::Pass);
        assert!(overridden.override_applied);
        assert_eq!(overridden.reasons, fail.reasons);
        assert_eq!(overridden.evidence_refs, fail.evidence_refs);
    }

    #[test]
    fn test_reconciled_record_shape() {
        let amount = Money::new(dec!(100), "INR").unwrap();
        let record = ReconciliationRecord::reconciled(
            key(),
            "CONF-9".to_string(),
            JournalEntry {
                side: EntrySide::Debit,
                account: "A".to_string(),
                amount: amount.clone(),
            },
            JournalEntry {
                side: EntrySide::Credit,
                account: "B".to_string(),
                amount,
            },
        );
        assert_eq!(record.status, ReconStatus::Reconciled);
        assert_eq!(record.journal_entries.len(), 2);
        assert!(record.exceptions.is_empty());

        let exception = ReconciliationRecord::exception(
            key(),
            vec![ExceptionEntry {
                code: ReasonCode::TransactionTimeout,
                detail: "no confirmation within SLA".to_string(),
            }],
        );
        assert!(exception.journal_entries.is_empty());
        assert!(exception.matched_reference.is_none());
    }

    #[test]
    fn test_channel_priority_is_fixed() {
        assert!(Channel::Immediate.priority_rank() < Channel::Express.priority_rank());
        assert!(Channel::Express.priority_rank() < Channel::Batched.priority_rank());
    }

    #[test]
    fn test_reason_stage_priority() {
        assert!(ReasonCode::SanctionListMatch.stage() < ReasonCode::NoEligibleRail.stage());
        assert!(ReasonCode::RailExhausted.stage() < ReasonCode::TransactionTimeout.stage());
    }
}
