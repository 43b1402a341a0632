use crate::application::gate::ComplianceGate;
use crate::application::router::RailRouter;
use crate::application::{recon, triage};
use crate::config::PipelineConfig;
use crate::domain::decision::{
    EvidenceRef, FailingStage, LineState, ReasonCode, ReconStatus, Verdict,
};
use crate::domain::line::{LineKey, RawLineRecord, TransactionLine};
use crate::domain::ports::{
    EvidenceStoreBox, ExecutionClientBox, ExecutionReport, ExpectedSettlement, PolicyEngineBox,
    RailConfirmation, RecordStoreBox, SettlementFeedBox,
};
use crate::error::Result;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;

/// Terminal result for one admitted line.
#[derive(Debug, Clone, PartialEq)]
pub struct LineOutcome {
    pub line: LineKey,
    pub state: LineState,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedLine {
    pub line_id: String,
    pub error: String,
}

/// What a batch run produced: terminal outcomes for admitted lines, boundary
/// rejections, infrastructure faults, and lines skipped by cancellation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<LineOutcome>,
    pub rejected: Vec<RejectedLine>,
    pub faults: Vec<String>,
    pub skipped: usize,
}

/// Cooperative batch cancellation. Cancelling stops admitting new lines;
/// lines already admitted run to their terminal state.
#[derive(Debug, Default, Clone)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ports the pipeline is wired with.
pub struct PipelinePorts {
    pub policy_engine: PolicyEngineBox,
    pub evidence: EvidenceStoreBox,
    pub execution: ExecutionClientBox,
    pub settlement_feed: SettlementFeedBox,
    pub records: RecordStoreBox,
}

/// Drives one line through compliance, routing, execution with fallback, and
/// reconciliation; any failure ends in triage. Every admitted line terminates
/// in SETTLED or TRIAGED.
pub struct Pipeline {
    config: PipelineConfig,
    gate: ComplianceGate,
    router: RailRouter,
    execution: ExecutionClientBox,
    settlement_feed: SettlementFeedBox,
    records: RecordStoreBox,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, ports: PipelinePorts) -> Result<Self> {
        config.validate()?;
        let gate = ComplianceGate::new(
            config.compliance.clone(),
            config.retry.clone(),
            ports.policy_engine,
            ports.evidence,
        );
        let router = RailRouter::new(&config);
        Ok(Self {
            config,
            gate,
            router,
            execution: ports.execution,
            settlement_feed: ports.settlement_feed,
            records: ports.records,
        })
    }

    pub async fn run_line(&self, line: &TransactionLine) -> Result<LineOutcome> {
        let key = line.key();
        tracing::info!(line = %key, state = %LineState::Admitted, "line admitted");

        let now = Utc::now();
        let compliance = self.gate.evaluate(line, now).await?;
        self.records.append_compliance(compliance.clone()).await?;

        if compliance.decision == Verdict::Fail {
            tracing::info!(line = %key, state = %LineState::ComplianceFail, reasons = ?compliance.reasons, "compliance fail");
            return self
                .triage(
                    &key,
                    FailingStage::Compliance,
                    compliance.reasons,
                    compliance.evidence_refs,
                )
                .await;
        }
        tracing::info!(line = %key, state = %LineState::CompliancePass, "compliance pass");

        let routing = self.router.route(line, &compliance, now)?;
        self.records.append_routing(routing.clone()).await?;

        let Some(primary) = routing.primary_channel else {
            tracing::warn!(line = %key, "no eligible rail");
            return self
                .triage(&key, FailingStage::Routing, vec![ReasonCode::NoEligibleRail], vec![])
                .await;
        };
        tracing::info!(line = %key, state = %LineState::Routed, primary = %primary, fallbacks = ?routing.fallback_channels, "routed");

        // Bounded fallback traversal: primary first, then each fallback in
        // descending-score order, until success or exhaustion.
        let attempts =
            std::iter::once(primary).chain(routing.fallback_channels.iter().copied());
        for channel in attempts {
            match self.execution.submit(line, channel).await? {
                ExecutionReport::Accepted { confirmation_ref } => {
                    return self.settle(line, &key, confirmation_ref).await;
                }
                ExecutionReport::HardFailure { detail } => {
                    tracing::warn!(line = %key, channel = %channel, detail = %detail, "hard failure, falling back");
                }
                ExecutionReport::Timeout => {
                    tracing::warn!(line = %key, channel = %channel, "execution timeout");
                    let record = recon::reconcile(
                        line,
                        &ExpectedSettlement {
                            reference: format!("{channel}-{key}"),
                            amount: line.amount.clone(),
                        },
                        None,
                    );
                    self.records.append_reconciliation(record.clone()).await?;
                    return self
                        .triage(
                            &key,
                            FailingStage::Reconciliation,
                            vec![ReasonCode::TransactionTimeout],
                            vec![],
                        )
                        .await;
                }
            }
        }

        tracing::warn!(line = %key, state = %LineState::RoutingExhausted, "all rails exhausted");
        self.triage(&key, FailingStage::Routing, vec![ReasonCode::RailExhausted], vec![])
            .await
    }

    /// Awaits the rail confirmation under the SLA window and reconciles.
    async fn settle(
        &self,
        line: &TransactionLine,
        key: &LineKey,
        confirmation_ref: String,
    ) -> Result<LineOutcome> {
        let expected = ExpectedSettlement {
            reference: confirmation_ref.clone(),
            amount: line.amount.clone(),
        };
        let confirmation = self.await_confirmation(&confirmation_ref).await?;
        let record = recon::reconcile(line, &expected, confirmation);
        self.records.append_reconciliation(record.clone()).await?;

        match record.status {
            ReconStatus::Reconciled => {
                tracing::info!(line = %key, state = %LineState::Settled, reference = %confirmation_ref, "settled");
                Ok(LineOutcome {
                    line: key.clone(),
                    state: LineState::Settled,
                    detail: format!("settled via {confirmation_ref}"),
                })
            }
            ReconStatus::Exception => {
                let reasons: Vec<ReasonCode> =
                    record.exceptions.iter().map(|e| e.code).collect();
                self.triage(key, FailingStage::Reconciliation, reasons, vec![])
                    .await
            }
        }
    }

    async fn await_confirmation(&self, reference: &str) -> Result<Option<RailConfirmation>> {
        let sla = Duration::from_millis(self.config.settlement_sla_ms);
        let poll = Duration::from_millis(self.config.confirmation_poll_ms.max(1));
        let wait = async {
            loop {
                if let Some(confirmation) = self.settlement_feed.confirmation(reference).await? {
                    return Ok(Some(confirmation));
                }
                tokio::time::sleep(poll).await;
            }
        };
        match tokio::time::timeout(sla, wait).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    async fn triage(
        &self,
        key: &LineKey,
        stage: FailingStage,
        reasons: Vec<ReasonCode>,
        evidence_refs: Vec<EvidenceRef>,
    ) -> Result<LineOutcome> {
        let record = triage::analyze(key.clone(), stage, &reasons, &evidence_refs, Utc::now());
        let code = record.root_cause.code;
        self.records.append_root_cause(record).await?;
        tracing::info!(line = %key, state = %LineState::Triaged, root_cause = %code, "triaged");
        Ok(LineOutcome {
            line: key.clone(),
            state: LineState::Triaged,
            detail: code.to_string(),
        })
    }

    /// Runs a whole batch. Rows failing admission are reported and never
    /// enter the pipeline; admitted lines are evaluated fully in parallel.
    pub async fn run_batch(
        self: Arc<Self>,
        rows: Vec<RawLineRecord>,
        cancel: &CancelFlag,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut tasks = JoinSet::new();

        for raw in rows {
            if cancel.is_cancelled() {
                report.skipped += 1;
                continue;
            }
            let line_id = raw.line_id.clone();
            match TransactionLine::try_from(raw) {
                Ok(line) => {
                    let pipeline = Arc::clone(&self);
                    tasks.spawn(async move { pipeline.run_line(&line).await });
                }
                Err(e) => {
                    tracing::warn!(line_id = %line_id, error = %e, "row rejected at admission");
                    report.rejected.push(RejectedLine {
                        line_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(outcome)) => report.outcomes.push(outcome),
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "line failed on infrastructure fault");
                    report.faults.push(e.to_string());
                }
                Err(e) => report.faults.push(format!("task join error: {e}")),
            }
        }
        report
    }

    /// Status-query surface for operator tooling.
    pub fn records(&self) -> &RecordStoreBox {
        &self.records
    }
}
