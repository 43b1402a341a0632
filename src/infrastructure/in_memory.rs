use crate::domain::decision::{
    Channel, ComplianceDecision, EvidenceRef, ReconciliationRecord, RootCauseRecord,
    RoutingDecision,
};
use crate::domain::line::{LineKey, TransactionLine};
use crate::domain::ports::{
    EvidenceStore, ExecutionClient, ExecutionReport, PolicyEngine, PolicyRequest, PolicyVerdict,
    RailConfirmation, RecordStore, SettlementFeed,
};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory evidence store. `put` is idempotent on path: a second write to
/// the same path keeps the first artifact and returns the same ref.
#[derive(Default, Clone)]
pub struct InMemoryEvidenceStore {
    artifacts: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryEvidenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn artifact_count(&self) -> usize {
        self.artifacts.read().await.len()
    }
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn put(&self, path: &str, content: &[u8]) -> Result<EvidenceRef> {
        let mut artifacts = self.artifacts.write().await;
        artifacts
            .entry(path.to_string())
            .or_insert_with(|| content.to_vec());
        Ok(EvidenceRef(path.to_string()))
    }

    async fn get(&self, evidence: &EvidenceRef) -> Result<Option<Vec<u8>>> {
        let artifacts = self.artifacts.read().await;
        Ok(artifacts.get(&evidence.0).cloned())
    }
}

/// Scripted step for the test policy engine.
#[derive(Debug, Clone)]
pub enum PolicyScript {
    Verdict(PolicyVerdict),
    /// Answers far outside any reasonable timeout, so the caller's deadline
    /// fires first.
    Hang,
    Unreachable,
}

/// Policy engine double driven by a queue of scripted steps; an empty queue
/// allows everything.
#[derive(Default, Clone)]
pub struct ScriptedPolicyEngine {
    script: Arc<RwLock<VecDeque<PolicyScript>>>,
}

impl ScriptedPolicyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, step: PolicyScript) {
        self.script.write().await.push_back(step);
    }
}

#[async_trait]
impl PolicyEngine for ScriptedPolicyEngine {
    async fn evaluate(&self, _request: &PolicyRequest) -> Result<PolicyVerdict> {
        let step = self.script.write().await.pop_front();
        match step {
            None => Ok(PolicyVerdict {
                allow: true,
                violations: vec![],
            }),
            Some(PolicyScript::Verdict(verdict)) => Ok(verdict),
            Some(PolicyScript::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(PipelineError::CollaboratorError(
                    "policy engine hung".to_string(),
                ))
            }
            Some(PolicyScript::Unreachable) => Err(PipelineError::CollaboratorError(
                "policy engine unreachable".to_string(),
            )),
        }
    }
}

/// Scripted behavior for one rail submission.
#[derive(Debug, Clone)]
pub enum RailBehavior {
    /// Accept and publish a matching confirmation.
    Accept,
    /// Accept but never confirm; the SLA window will expire.
    AcceptUnconfirmed,
    /// Accept and confirm a different amount.
    AcceptMismatched(Decimal),
    HardFailure,
    Timeout,
}

/// Execution layer and settlement feed in one: accepted submissions publish
/// their confirmations into the shared feed, the way the real rail reports
/// asynchronously. Cloneable so one instance can back both ports.
#[derive(Default, Clone)]
pub struct InMemoryRail {
    scripts: Arc<RwLock<HashMap<Channel, VecDeque<RailBehavior>>>>,
    confirmations: Arc<RwLock<HashMap<String, RailConfirmation>>>,
}

impl InMemoryRail {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script(&self, channel: Channel, behavior: RailBehavior) {
        self.scripts
            .write()
            .await
            .entry(channel)
            .or_default()
            .push_back(behavior);
    }

    fn reference_for(line: &TransactionLine, channel: Channel) -> String {
        format!("{}-{}-{}", channel, line.batch_id, line.line_id)
    }
}

#[async_trait]
impl ExecutionClient for InMemoryRail {
    async fn submit(&self, line: &TransactionLine, channel: Channel) -> Result<ExecutionReport> {
        let behavior = self
            .scripts
            .write()
            .await
            .get_mut(&channel)
            .and_then(VecDeque::pop_front)
            .unwrap_or(RailBehavior::Accept);
        let reference = Self::reference_for(line, channel);

        match behavior {
            RailBehavior::Accept => {
                self.confirmations.write().await.insert(
                    reference.clone(),
                    RailConfirmation {
                        reference: reference.clone(),
                        amount: line.amount.clone(),
                    },
                );
                Ok(ExecutionReport::Accepted {
                    confirmation_ref: reference,
                })
            }
            RailBehavior::AcceptUnconfirmed => Ok(ExecutionReport::Accepted {
                confirmation_ref: reference,
            }),
            RailBehavior::AcceptMismatched(amount) => {
                let mut mismatched = line.amount.clone();
                mismatched.value = amount;
                self.confirmations.write().await.insert(
                    reference.clone(),
                    RailConfirmation {
                        reference: reference.clone(),
                        amount: mismatched,
                    },
                );
                Ok(ExecutionReport::Accepted {
                    confirmation_ref: reference,
                })
            }
            RailBehavior::HardFailure => Ok(ExecutionReport::HardFailure {
                detail: format!("{channel} rejected the instruction"),
            }),
            RailBehavior::Timeout => Ok(ExecutionReport::Timeout),
        }
    }
}

#[async_trait]
impl SettlementFeed for InMemoryRail {
    async fn confirmation(&self, reference: &str) -> Result<Option<RailConfirmation>> {
        Ok(self.confirmations.read().await.get(reference).cloned())
    }
}

/// Append-only in-memory record log. Later records supersede earlier ones
/// but the full history stays readable for audit.
#[derive(Default, Clone)]
pub struct InMemoryRecordStore {
    compliance: Arc<RwLock<HashMap<LineKey, Vec<ComplianceDecision>>>>,
    routing: Arc<RwLock<HashMap<LineKey, Vec<RoutingDecision>>>>,
    reconciliation: Arc<RwLock<HashMap<LineKey, Vec<ReconciliationRecord>>>>,
    root_causes: Arc<RwLock<HashMap<LineKey, Vec<RootCauseRecord>>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn compliance_history(&self, line: &LineKey) -> Vec<ComplianceDecision> {
        self.compliance
            .read()
            .await
            .get(line)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append_compliance(&self, decision: ComplianceDecision) -> Result<()> {
        self.compliance
            .write()
            .await
            .entry(decision.line.clone())
            .or_default()
            .push(decision);
        Ok(())
    }

    async fn append_routing(&self, decision: RoutingDecision) -> Result<()> {
        self.routing
            .write()
            .await
            .entry(decision.line.clone())
            .or_default()
            .push(decision);
        Ok(())
    }

    async fn append_reconciliation(&self, record: ReconciliationRecord) -> Result<()> {
        self.reconciliation
            .write()
            .await
            .entry(record.line.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn append_root_cause(&self, record: RootCauseRecord) -> Result<()> {
        self.root_causes
            .write()
            .await
            .entry(record.line.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn latest_compliance(&self, line: &LineKey) -> Result<Option<ComplianceDecision>> {
        Ok(self
            .compliance
            .read()
            .await
            .get(line)
            .and_then(|v| v.last().cloned()))
    }

    async fn latest_routing(&self, line: &LineKey) -> Result<Option<RoutingDecision>> {
        Ok(self
            .routing
            .read()
            .await
            .get(line)
            .and_then(|v| v.last().cloned()))
    }

    async fn latest_reconciliation(&self, line: &LineKey) -> Result<Option<ReconciliationRecord>> {
        Ok(self
            .reconciliation
            .read()
            .await
            .get(line)
            .and_then(|v| v.last().cloned()))
    }

    async fn latest_root_cause(&self, line: &LineKey) -> Result<Option<RootCauseRecord>> {
        Ok(self
            .root_causes
            .read()
            .await
            .get(line)
            .and_then(|v| v.last().cloned()))
    }
}
