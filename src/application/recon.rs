use crate::domain::decision::{
    EntrySide, ExceptionEntry, JournalEntry, ReasonCode, ReconciliationRecord,
};
use crate::domain::line::TransactionLine;
use crate::domain::ports::{ExpectedSettlement, RailConfirmation};

/// Matches the expected settlement against what the rail actually confirmed.
///
/// `confirmation` is whatever the settlement feed produced inside the SLA
/// window; `None` means the window expired, which is itself an exception and
/// never an indefinite wait. Pure over its inputs; the SLA wait lives in the
/// pipeline.
pub fn reconcile(
    line: &TransactionLine,
    expected: &ExpectedSettlement,
    confirmation: Option<RailConfirmation>,
) -> ReconciliationRecord {
    let Some(actual) = confirmation else {
        return ReconciliationRecord::exception(
            line.key(),
            vec![ExceptionEntry {
                code: ReasonCode::TransactionTimeout,
                detail: format!("no confirmation for {} within SLA", expected.reference),
            }],
        );
    };

    if actual.reference != expected.reference {
        return ReconciliationRecord::exception(
            line.key(),
            vec![ExceptionEntry {
                code: ReasonCode::SettlementMismatch,
                detail: format!(
                    "confirmation reference {} does not match expected {}",
                    actual.reference, expected.reference
                ),
            }],
        );
    }
    if actual.amount != expected.amount {
        return ReconciliationRecord::exception(
            line.key(),
            vec![ExceptionEntry {
                code: ReasonCode::SettlementMismatch,
                detail: format!(
                    "settled {} {} against expected {} {}",
                    actual.amount.value,
                    actual.amount.currency,
                    expected.amount.value,
                    expected.amount.currency
                ),
            }],
        );
    }

    // No partial settlement: both legs carry exactly the line amount.
    ReconciliationRecord::reconciled(
        line.key(),
        actual.reference,
        JournalEntry {
            side: EntrySide::Debit,
            account: line.sender.account.clone(),
            amount: line.amount.clone(),
        },
        JournalEntry {
            side: EntrySide::Credit,
            account: line.beneficiary.account.clone(),
            amount: line.amount.clone(),
        },
    )
}
