use crate::application::retry::call_with_retry;
use crate::config::{ComplianceConfig, PolicyMode, RetryPolicy};
use crate::domain::decision::{ComplianceDecision, EvidenceRef, ReasonCode};
use crate::domain::line::TransactionLine;
use crate::domain::ports::{EvidenceStoreBox, PolicyEngineBox, PolicyRequest};
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};

/// Compliance Gate: evaluates one line against the regulatory rule set and
/// emits a PASS/FAIL decision with evidence.
///
/// Local rule evaluation is the system of record; `PolicyMode::Delegated`
/// hands the verdict to the external policy engine instead. Either way the
/// gate fails closed: if the engine cannot answer within the retry budget the
/// line FAILs with `POLICY_ENGINE_UNAVAILABLE`, it never silently passes.
pub struct ComplianceGate {
    config: ComplianceConfig,
    retry: RetryPolicy,
    policy_engine: PolicyEngineBox,
    evidence: EvidenceStoreBox,
}

impl ComplianceGate {
    pub fn new(
        config: ComplianceConfig,
        retry: RetryPolicy,
        policy_engine: PolicyEngineBox,
        evidence: EvidenceStoreBox,
    ) -> Self {
        Self {
            config,
            retry,
            policy_engine,
            evidence,
        }
    }

    /// Evaluates `line` and returns a fully assembled decision. Deterministic
    /// for a fixed (line, config, now); re-running writes no duplicate
    /// evidence because the store is idempotent on path.
    pub async fn evaluate(
        &self,
        line: &TransactionLine,
        now: DateTime<Utc>,
    ) -> Result<ComplianceDecision> {
        let reasons = match self.config.policy_mode {
            PolicyMode::Local => self.local_reasons(line).await,
            PolicyMode::Delegated => self.delegated_reasons(line).await,
        };

        let mut evidence_refs = Vec::with_capacity(reasons.len());
        for code in &reasons {
            evidence_refs.push(self.write_evidence(line, *code).await?);
        }

        ComplianceDecision::new(
            line.key(),
            reasons,
            evidence_refs,
            self.config.policy_version.clone(),
            now,
        )
    }

    /// The four rule checks run concurrently; each only reads the line. The
    /// merge below fixes the reason order (sanction, amount, kyc, bank code)
    /// regardless of completion order.
    async fn local_reasons(&self, line: &TransactionLine) -> Vec<ReasonCode> {
        let (sanction, amount, kyc, bank_code) = tokio::join!(
            self.check_sanction(line),
            self.check_amount(line),
            self.check_kyc(line),
            self.check_bank_code(line),
        );
        [sanction, amount, kyc, bank_code]
            .into_iter()
            .flatten()
            .collect()
    }

    async fn check_sanction(&self, line: &TransactionLine) -> Option<ReasonCode> {
        let name = line.beneficiary.name.to_lowercase();
        self.config
            .sanction_list
            .iter()
            .any(|entry| name.contains(&entry.to_lowercase()))
            .then_some(ReasonCode::SanctionListMatch)
    }

    async fn check_amount(&self, line: &TransactionLine) -> Option<ReasonCode> {
        (line.amount.value > self.config.max_amount).then_some(ReasonCode::AmountLimitExceeded)
    }

    async fn check_kyc(&self, line: &TransactionLine) -> Option<ReasonCode> {
        line.sender
            .kyc_ref
            .is_none()
            .then_some(ReasonCode::KycValidationFailed)
    }

    /// Bank code format: 4 letters followed by 7 alphanumerics, 11 total.
    async fn check_bank_code(&self, line: &TransactionLine) -> Option<ReasonCode> {
        let code = line.beneficiary.bank_code.as_str();
        let well_formed = code.len() == 11
            && code.is_ascii()
            && code.as_bytes()[..4].iter().all(u8::is_ascii_alphabetic)
            && code.as_bytes()[4..].iter().all(u8::is_ascii_alphanumeric);
        (!well_formed).then_some(ReasonCode::IfscValidationFailed)
    }

    async fn delegated_reasons(&self, line: &TransactionLine) -> Vec<ReasonCode> {
        let request = PolicyRequest {
            policy_version: self.config.policy_version.clone(),
            transaction: serde_json::to_value(line).unwrap_or_default(),
            verifications: line
                .sender
                .kyc_ref
                .as_ref()
                .map(|r| serde_json::json!({ "kyc_ref": r })),
        };

        let verdict =
            call_with_retry(&self.retry, || self.policy_engine.evaluate(&request)).await;

        match verdict {
            Ok(verdict) if verdict.allow => Vec::new(),
            Ok(verdict) => {
                let reasons: Vec<ReasonCode> = verdict
                    .violations
                    .iter()
                    .filter_map(|v| {
                        let code = ReasonCode::from_wire(v);
                        if code.is_none() {
                            tracing::warn!(violation = %v, "unknown policy violation code");
                        }
                        code
                    })
                    .collect();
                if reasons.is_empty() {
                    // Deny with no vocabulary we understand: fail closed.
                    vec![ReasonCode::PolicyEngineUnavailable]
                } else {
                    reasons
                }
            }
            Err(e) => {
                tracing::warn!(line = %line.key(), error = %e, "policy engine unreachable");
                vec![ReasonCode::PolicyEngineUnavailable]
            }
        }
    }

    /// One artifact per triggered check, namespaced by (batch, line) so
    /// concurrent lines never interfere.
    async fn write_evidence(
        &self,
        line: &TransactionLine,
        code: ReasonCode,
    ) -> Result<EvidenceRef> {
        let path = format!(
            "{}/{}/{}/{}.pdf",
            self.config.evidence_root,
            line.batch_id,
            line.line_id,
            code.check_name()
        );
        let content = serde_json::json!({
            "line": line.key(),
            "check": code.as_str(),
            "policy_version": self.config.policy_version,
        })
        .to_string();

        call_with_retry(&self.retry, || self.evidence.put(&path, content.as_bytes()))
            .await
            .map_err(|e| {
                PipelineError::CollaboratorError(format!("evidence store put {path}: {e}"))
            })
    }
}
