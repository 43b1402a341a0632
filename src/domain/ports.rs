use crate::domain::decision::{
    Channel, ComplianceDecision, EvidenceRef, ReconciliationRecord, RootCauseRecord,
    RoutingDecision,
};
use crate::domain::line::{LineKey, Money, TransactionLine};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request document sent to the external policy engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub policy_version: String,
    pub transaction: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verifications: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVerdict {
    pub allow: bool,
    pub violations: Vec<String>,
}

/// Typed outcome reported by the execution layer for one rail submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    /// Rail accepted the instruction and assigned a confirmation reference.
    Accepted { confirmation_ref: String },
    /// Rail definitively rejected the instruction; the caller must fall back.
    HardFailure { detail: String },
    /// No answer in time; handled through the reconciliation SLA path.
    Timeout,
}

/// Settlement data delivered asynchronously by the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RailConfirmation {
    pub reference: String,
    pub amount: Money,
}

/// What reconciliation expects to see confirmed for a line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedSettlement {
    pub reference: String,
    pub amount: Money,
}

/// Stateless external rule evaluator. Calls may block on I/O; the gate wraps
/// them in its timeout/retry budget.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    async fn evaluate(&self, request: &PolicyRequest) -> Result<PolicyVerdict>;
}

/// Content-addressable artifact store. `put` is idempotent on path: writing
/// the same path twice yields the same ref and no duplicate artifact.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn put(&self, path: &str, content: &[u8]) -> Result<EvidenceRef>;
    async fn get(&self, evidence: &EvidenceRef) -> Result<Option<Vec<u8>>>;
}

/// Downstream execution layer that submits a line to a concrete rail.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn submit(&self, line: &TransactionLine, channel: Channel) -> Result<ExecutionReport>;
}

/// Source of rail confirmations, polled under the reconciliation SLA window.
#[async_trait]
pub trait SettlementFeed: Send + Sync {
    async fn confirmation(&self, reference: &str) -> Result<Option<RailConfirmation>>;
}

/// Append-only record log keyed by `(batch_id, line_id)`. A later record of
/// the same kind supersedes but never deletes an earlier one; the `latest_*`
/// accessors are the status-query surface for operator tooling.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append_compliance(&self, decision: ComplianceDecision) -> Result<()>;
    async fn append_routing(&self, decision: RoutingDecision) -> Result<()>;
    async fn append_reconciliation(&self, record: ReconciliationRecord) -> Result<()>;
    async fn append_root_cause(&self, record: RootCauseRecord) -> Result<()>;

    async fn latest_compliance(&self, line: &LineKey) -> Result<Option<ComplianceDecision>>;
    async fn latest_routing(&self, line: &LineKey) -> Result<Option<RoutingDecision>>;
    async fn latest_reconciliation(&self, line: &LineKey) -> Result<Option<ReconciliationRecord>>;
    async fn latest_root_cause(&self, line: &LineKey) -> Result<Option<RootCauseRecord>>;
}

pub type PolicyEngineBox = Box<dyn PolicyEngine>;
pub type EvidenceStoreBox = Box<dyn EvidenceStore>;
pub type ExecutionClientBox = Box<dyn ExecutionClient>;
pub type SettlementFeedBox = Box<dyn SettlementFeed>;
pub type RecordStoreBox = Box<dyn RecordStore>;
