use crate::config::{ChannelSpec, PipelineConfig, ScoringWeights};
use crate::domain::decision::{
    ComplianceDecision, IneligibilityReason, RailCandidate, RoutingDecision, Verdict,
};
use crate::domain::line::TransactionLine;
use crate::error::{PipelineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;

const NEUTRAL_SUCCESS_RATE: f64 = 0.5;

/// Rail Router: scores the configured channels for a compliance-PASS line and
/// fixes the primary rail plus the ordered fallback sequence.
///
/// Pure over (line, channel configuration, weights, now): identical inputs
/// always yield the identical decision.
pub struct RailRouter {
    channels: Vec<ChannelSpec>,
    weights: ScoringWeights,
}

impl RailRouter {
    pub fn new(config: &PipelineConfig) -> Self {
        let mut channels = config.channels.clone();
        // Fixed priority order keeps candidate iteration, and therefore any
        // tie-break, deterministic.
        channels.sort_by_key(|s| s.channel.priority_rank());
        Self {
            channels,
            weights: config.weights.clone(),
        }
    }

    /// Routes a line. Calling with a FAIL decision is a precondition
    /// violation and is reported as an error, never silently ignored.
    pub fn route(
        &self,
        line: &TransactionLine,
        compliance: &ComplianceDecision,
        now: DateTime<Utc>,
    ) -> Result<RoutingDecision> {
        if compliance.line != line.key() {
            return Err(PipelineError::PreconditionError(format!(
                "compliance decision for {} routed with line {}",
                compliance.line,
                line.key()
            )));
        }
        if compliance.decision != Verdict::Pass {
            return Err(PipelineError::PreconditionError(format!(
                "line {} routed without a compliance PASS",
                line.key()
            )));
        }

        let mut candidates: Vec<RailCandidate> = self
            .channels
            .iter()
            .map(|spec| {
                let ineligibility = self.eligibility(spec, line, now);
                RailCandidate {
                    channel: spec.channel,
                    eligible: ineligibility.is_none(),
                    score: 0.0,
                    ineligibility_reason: ineligibility,
                }
            })
            .collect();

        self.score_eligible(&mut candidates);

        let mut ranked: Vec<&RailCandidate> =
            candidates.iter().filter(|c| c.eligible).collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.channel.priority_rank().cmp(&b.channel.priority_rank()))
        });

        let primary_channel = ranked.first().map(|c| c.channel);
        let fallback_channels = ranked.iter().skip(1).map(|c| c.channel).collect();

        Ok(RoutingDecision {
            line: line.key(),
            primary_channel,
            fallback_channels,
            score_breakdown: candidates,
            decided_at: now,
        })
    }

    fn eligibility(
        &self,
        spec: &ChannelSpec,
        line: &TransactionLine,
        now: DateTime<Utc>,
    ) -> Option<IneligibilityReason> {
        if spec.suspended {
            Some(IneligibilityReason::Suspended)
        } else if line.amount.value < spec.min_amount {
            Some(IneligibilityReason::BelowMinimum)
        } else if line.amount.value > spec.max_amount {
            Some(IneligibilityReason::AboveMaximum)
        } else if !spec.is_open(now) {
            Some(IneligibilityReason::OutsideWindow)
        } else {
            None
        }
    }

    /// Weighted sum of cost, latency and historical success rate, each
    /// normalized to 0-100 across the eligible set. Channels without history
    /// score with a neutral rate.
    fn score_eligible(&self, candidates: &mut [RailCandidate]) {
        let eligible: Vec<&ChannelSpec> = self
            .channels
            .iter()
            .zip(candidates.iter())
            .filter(|(_, c)| c.eligible)
            .map(|(s, _)| s)
            .collect();
        if eligible.is_empty() {
            return;
        }

        let fees: Vec<f64> = eligible.iter().map(|s| s.fee_bps).collect();
        let latencies: Vec<f64> = eligible
            .iter()
            .map(|s| s.expected_latency_secs.to_f64().unwrap_or(f64::MAX))
            .collect();
        let rates: Vec<f64> = eligible
            .iter()
            .map(|s| s.success_rate.unwrap_or(NEUTRAL_SUCCESS_RATE))
            .collect();

        let mut index = 0;
        for candidate in candidates.iter_mut().filter(|c| c.eligible) {
            let cost_score = normalized(fees[index], &fees, true);
            let latency_score = normalized(latencies[index], &latencies, true);
            let success_score = normalized(rates[index], &rates, false);
            candidate.score = self.weights.cost * cost_score
                + self.weights.latency * latency_score
                + self.weights.success_rate * success_score;
            index += 1;
        }
    }
}

/// Maps `value` into 0-100 against the spread of `all`; `invert` for metrics
/// where lower is better. A degenerate spread scores everyone 100.
fn normalized(value: f64, all: &[f64], invert: bool) -> f64 {
    let min = all.iter().copied().fold(f64::INFINITY, f64::min);
    let max = all.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return 100.0;
    }
    let t = (value - min) / (max - min);
    100.0 * if invert { 1.0 - t } else { t }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::decision::{Channel, ReasonCode};
    use crate::domain::line::{Beneficiary, LineKey, Money, Party};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn line(amount: Decimal) -> TransactionLine {
        TransactionLine {
            batch_id: "B-1".to_string(),
            line_id: "L-1".to_string(),
            sender: Party {
                name: "Acme".to_string(),
                account: "111".to_string(),
                kyc_ref: Some("K".to_string()),
            },
            beneficiary: Beneficiary {
                name: "Globex".to_string(),
                account: "222".to_string(),
                bank_code: "HDFC0001234".to_string(),
            },
            amount: Money::new(amount, "INR").unwrap(),
            purpose: "invoice".to_string(),
            schedule_time: "2026-08-27T10:00:00Z".parse().unwrap(),
        }
    }

    fn pass_decision(line: &TransactionLine) -> ComplianceDecision {
        ComplianceDecision::new(
            line.key(),
            vec![],
            vec![],
            "v1".to_string(),
            Utc::now(),
        )
        .unwrap()
    }

    fn fail_decision(line: &TransactionLine) -> ComplianceDecision {
        ComplianceDecision::new(
            line.key(),
            vec![ReasonCode::KycValidationFailed],
            vec![crate::domain::decision::EvidenceRef("e".to_string())],
            "v1".to_string(),
            Utc::now(),
        )
        .unwrap()
    }

    fn noon() -> DateTime<Utc> {
        "2026-08-27T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_route_requires_pass() {
        let router = RailRouter::new(&PipelineConfig::default());
        let input = line(dec!(1000));
        let result = router.route(&input, &fail_decision(&input), noon());
        assert!(matches!(result, Err(PipelineError::PreconditionError(_))));
    }

    #[test]
    fn test_route_rejects_foreign_decision() {
        let router = RailRouter::new(&PipelineConfig::default());
        let input = line(dec!(1000));
        let mut foreign = pass_decision(&input);
        foreign.line = LineKey {
            batch_id: "B-9".to_string(),
            line_id: "L-9".to_string(),
        };
        assert!(router.route(&input, &foreign, noon()).is_err());
    }

    #[test]
    fn test_primary_is_never_ineligible() {
        let config = PipelineConfig::default();
        let router = RailRouter::new(&config);
        // 400000 exceeds IMMEDIATE's ceiling and BATCHED's window is open at
        // noon, so only EXPRESS and BATCHED compete.
        let input = line(dec!(400000));
        let decision = router.route(&input, &pass_decision(&input), noon()).unwrap();

        let primary = decision.primary_channel.unwrap();
        let candidate = decision
            .score_breakdown
            .iter()
            .find(|c| c.channel == primary)
            .unwrap();
        assert!(candidate.eligible);
        assert_ne!(primary, Channel::Immediate);
    }

    #[test]
    fn test_no_eligible_rail_yields_none() {
        let mut config = PipelineConfig::default();
        for spec in &mut config.channels {
            spec.max_amount = dec!(10);
        }
        let router = RailRouter::new(&config);
        let input = line(dec!(1000));
        let decision = router.route(&input, &pass_decision(&input), noon()).unwrap();

        assert_eq!(decision.primary_channel, None);
        assert!(decision.fallback_channels.is_empty());
        assert!(decision.score_breakdown.iter().all(|c| !c.eligible));
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let config = PipelineConfig::default();
        let router = RailRouter::new(&config);
        let input = line(dec!(50000));
        let now = noon();

        let first = router.route(&input, &pass_decision(&input), now).unwrap();
        let second = router.route(&input, &pass_decision(&input), now).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fallbacks_sorted_by_descending_score() {
        let config = PipelineConfig::default();
        let router = RailRouter::new(&config);
        let input = line(dec!(50000));
        let decision = router.route(&input, &pass_decision(&input), noon()).unwrap();

        let score_of = |channel: Channel| {
            decision
                .score_breakdown
                .iter()
                .find(|c| c.channel == channel)
                .unwrap()
                .score
        };
        let primary = decision.primary_channel.unwrap();
        let mut previous = score_of(primary);
        for fallback in &decision.fallback_channels {
            let score = score_of(*fallback);
            assert!(score <= previous);
            previous = score;
        }
        assert!(!decision.fallback_channels.contains(&primary));
    }

    #[test]
    fn test_ties_break_by_channel_priority() {
        let mut config = PipelineConfig::default();
        // Identical scoring inputs for every channel force a three-way tie.
        for spec in &mut config.channels {
            spec.min_amount = dec!(1);
            spec.max_amount = dec!(1000000);
            spec.fee_bps = 5.0;
            spec.expected_latency_secs = 60;
            spec.success_rate = Some(0.9);
            spec.open_hour = 0;
            spec.close_hour = 24;
            spec.cutoff_minutes = 0;
        }
        let router = RailRouter::new(&config);
        let input = line(dec!(50000));
        let decision = router.route(&input, &pass_decision(&input), noon()).unwrap();

        assert_eq!(decision.primary_channel, Some(Channel::Immediate));
        assert_eq!(
            decision.fallback_channels,
            vec![Channel::Express, Channel::Batched]
        );
    }

    #[test]
    fn test_suspended_channel_is_ineligible() {
        let mut config = PipelineConfig::default();
        config.channels[0].suspended = true;
        let router = RailRouter::new(&config);
        let input = line(dec!(50000));
        let decision = router.route(&input, &pass_decision(&input), noon()).unwrap();

        let immediate = decision
            .score_breakdown
            .iter()
            .find(|c| c.channel == Channel::Immediate)
            .unwrap();
        assert!(!immediate.eligible);
        assert_eq!(
            immediate.ineligibility_reason,
            Some(IneligibilityReason::Suspended)
        );
        assert_ne!(decision.primary_channel, Some(Channel::Immediate));
    }
}
