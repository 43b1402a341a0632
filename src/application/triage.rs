use crate::domain::decision::{
    EvidenceRef, FailingStage, FaultParty, ReasonCode, RootCause, RootCauseRecord,
};
use crate::domain::line::LineKey;
use chrono::{DateTime, Utc};

/// Failure Triage: derives the root cause, the party at fault and the
/// remediation guidance for a failed line.
///
/// Pure function of its inputs, no collaborator calls, so triage can never
/// block pipeline throughput.
pub fn analyze(
    line: LineKey,
    failing_stage: FailingStage,
    reasons: &[ReasonCode],
    evidence_refs: &[EvidenceRef],
    now: DateTime<Utc>,
) -> RootCauseRecord {
    let primary = primary_reason(failing_stage, reasons);

    RootCauseRecord {
        line,
        root_cause: RootCause {
            code: primary,
            detail: detail_for(primary),
        },
        fault_party: fault_party(primary),
        retry_eligible: retry_eligible(primary),
        recommended_actions: recommended_actions(primary),
        evidence_refs: evidence_refs.to_vec(),
        analyzed_at: now,
    }
}

/// Compliance reasons outrank routing reasons outrank reconciliation
/// reasons; within a stage the caller's order is kept.
fn primary_reason(failing_stage: FailingStage, reasons: &[ReasonCode]) -> ReasonCode {
    reasons
        .iter()
        .copied()
        .enumerate()
        .min_by_key(|(position, r)| (r.stage(), *position))
        .map(|(_, r)| r)
        .unwrap_or(match failing_stage {
            FailingStage::Compliance => ReasonCode::PolicyEngineUnavailable,
            FailingStage::Routing => ReasonCode::NoEligibleRail,
            FailingStage::Reconciliation => ReasonCode::TransactionTimeout,
        })
}

fn fault_party(code: ReasonCode) -> FaultParty {
    match code {
        ReasonCode::SanctionListMatch => FaultParty::Regulator,
        ReasonCode::AmountLimitExceeded | ReasonCode::KycValidationFailed => {
            FaultParty::SenderBank
        }
        ReasonCode::IfscValidationFailed => FaultParty::ReceiverBank,
        ReasonCode::PolicyEngineUnavailable
        | ReasonCode::NoEligibleRail
        | ReasonCode::RailExhausted => FaultParty::System,
        ReasonCode::TransactionTimeout | ReasonCode::SettlementMismatch => {
            FaultParty::ReceiverBank
        }
    }
}

/// Sanction and KYC failures are never auto-retried; only transient
/// infrastructure outcomes are.
fn retry_eligible(code: ReasonCode) -> bool {
    matches!(
        code,
        ReasonCode::TransactionTimeout | ReasonCode::PolicyEngineUnavailable
    )
}

fn detail_for(code: ReasonCode) -> String {
    let text = match code {
        ReasonCode::SanctionListMatch => "beneficiary name matched a sanction list entry",
        ReasonCode::AmountLimitExceeded => "line amount exceeds the configured limit",
        ReasonCode::KycValidationFailed => "sender record carries no KYC reference",
        ReasonCode::IfscValidationFailed => "beneficiary bank code is malformed",
        ReasonCode::PolicyEngineUnavailable => "policy engine unreachable within retry budget",
        ReasonCode::NoEligibleRail => "no configured rail was eligible for the line",
        ReasonCode::RailExhausted => "primary and all fallback rails reported hard failures",
        ReasonCode::TransactionTimeout => "no settlement confirmation within the SLA window",
        ReasonCode::SettlementMismatch => "rail confirmation disagrees with expected settlement",
    };
    text.to_string()
}

fn recommended_actions(code: ReasonCode) -> Vec<String> {
    let actions: &[&str] = match code {
        ReasonCode::SanctionListMatch => &[
            "freeze the line pending manual review",
            "file the match with the compliance desk",
        ],
        ReasonCode::AmountLimitExceeded => &[
            "split the instruction below the configured limit",
            "request a limit exception from the sender bank",
        ],
        ReasonCode::KycValidationFailed => &[
            "request an up-to-date KYC reference from the sender bank",
            "resubmit the batch once the sender record is complete",
        ],
        ReasonCode::IfscValidationFailed => &[
            "verify the beneficiary bank code with the receiver bank",
            "correct the code and resubmit the line",
        ],
        ReasonCode::PolicyEngineUnavailable => &[
            "check policy engine health and connectivity",
            "re-run the compliance gate once the engine answers",
        ],
        ReasonCode::NoEligibleRail => &[
            "review channel limits and operating windows against the line",
            "re-route once a rail opens or limits are raised",
        ],
        ReasonCode::RailExhausted => &[
            "inspect rail rejection details with the operators",
            "escalate to the execution layer before resubmitting",
        ],
        ReasonCode::TransactionTimeout => &[
            "query the rail for late confirmation",
            "retry the line after the rail recovers",
        ],
        ReasonCode::SettlementMismatch => &[
            "open an exception case with the receiver bank",
            "hold the journal until amounts are agreed",
        ],
    };
    actions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> LineKey {
        LineKey {
            batch_id: "B-1".to_string(),
            line_id: "L-1".to_string(),
        }
    }

    #[test]
    fn test_compliance_reason_outranks_later_stages() {
        let record = analyze(
            key(),
            FailingStage::Reconciliation,
            &[
                ReasonCode::TransactionTimeout,
                ReasonCode::SanctionListMatch,
            ],
            &[],
            Utc::now(),
        );
        assert_eq!(record.root_cause.code, ReasonCode::SanctionListMatch);
        assert_eq!(record.fault_party, FaultParty::Regulator);
        assert!(!record.retry_eligible);
    }

    #[test]
    fn test_timeout_is_retry_eligible() {
        let record = analyze(
            key(),
            FailingStage::Reconciliation,
            &[ReasonCode::TransactionTimeout],
            &[],
            Utc::now(),
        );
        assert!(record.retry_eligible);
        assert_eq!(record.fault_party, FaultParty::ReceiverBank);
        assert!(!record.recommended_actions.is_empty());
    }

    #[test]
    fn test_compliance_failures_never_retry() {
        for code in [
            ReasonCode::SanctionListMatch,
            ReasonCode::KycValidationFailed,
            ReasonCode::AmountLimitExceeded,
            ReasonCode::IfscValidationFailed,
        ] {
            let record = analyze(key(), FailingStage::Compliance, &[code], &[], Utc::now());
            assert!(!record.retry_eligible, "{code} must not auto-retry");
        }
    }

    #[test]
    fn test_no_eligible_rail_faults_the_system() {
        let record = analyze(
            key(),
            FailingStage::Routing,
            &[ReasonCode::NoEligibleRail],
            &[],
            Utc::now(),
        );
        assert_eq!(record.fault_party, FaultParty::System);
        assert!(!record.retry_eligible);
    }

    #[test]
    fn test_evidence_refs_carried_through() {
        let refs = vec![EvidenceRef("evidence/B-1/L-1/kyc_check.pdf".to_string())];
        let record = analyze(
            key(),
            FailingStage::Compliance,
            &[ReasonCode::KycValidationFailed],
            &refs,
            Utc::now(),
        );
        assert_eq!(record.evidence_refs, refs);
    }

    #[test]
    fn test_triage_is_deterministic() {
        let now = Utc::now();
        let a = analyze(
            key(),
            FailingStage::Routing,
            &[ReasonCode::RailExhausted],
            &[],
            now,
        );
        let b = analyze(
            key(),
            FailingStage::Routing,
            &[ReasonCode::RailExhausted],
            &[],
            now,
        );
        assert_eq!(a, b);
    }
}
