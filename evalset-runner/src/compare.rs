// Copyright 2025 Evalset (https://github.com/evalset/evalset)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Baseline-vs-candidate comparison over one dataset snapshot.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use uuid::Uuid;

use evalset_core::{
    CaseComparison, CaseOutcome, CaseResult, CaseStanding, CompareDelta, CompareIdentity,
    CompareReport, RunTotals, Variant, COMPARE_REPORT_KIND,
};

use crate::backend::CompletionBackend;
use crate::executor::{DatasetSnapshot, ExecutorOptions, VariantExecutor};

/// Run both variants over the same snapshot and join the results.
///
/// The baseline arm runs to completion before the candidate arm starts, so
/// the two never compete for the same rate limits. Both run reports are
/// embedded whole in the returned comparison.
pub async fn run_comparison(
    backend: &dyn CompletionBackend,
    options: &ExecutorOptions,
    snapshot: &DatasetSnapshot,
    baseline_variant: &Variant,
    candidate_variant: &Variant,
) -> CompareReport {
    let run_id = Uuid::new_v4().to_string();
    let started_at = Utc::now();

    tracing::info!(
        run_id = %run_id,
        dataset = %snapshot.dataset_name,
        baseline = %baseline_variant.name,
        candidate = %candidate_variant.name,
        "starting comparison"
    );

    let executor = VariantExecutor::new(backend, options.clone());
    let baseline = executor.execute(snapshot, baseline_variant).await;
    let candidate = executor.execute(snapshot, candidate_variant).await;

    let cases = join_case_outcomes(&baseline.cases, &candidate.cases);
    let delta = delta_between(&baseline.totals, &candidate.totals);
    let finished_at = Utc::now();

    tracing::info!(
        run_id = %run_id,
        improved = cases.iter().filter(|c| c.outcome == CaseOutcome::Improved).count(),
        regressed = cases.iter().filter(|c| c.outcome == CaseOutcome::Regressed).count(),
        "comparison finished"
    );

    CompareReport {
        kind: COMPARE_REPORT_KIND.to_string(),
        created_at: finished_at,
        run: CompareIdentity {
            run_id,
            started_at,
            finished_at,
            model_key: backend.model().model_key(),
            temperature: options.temperature,
            dataset_hash: snapshot.dataset_hash.clone(),
            cases_hash: snapshot.cases_hash.clone(),
            baseline_run_id: baseline.run.run_id.clone(),
            candidate_run_id: candidate.run.run_id.clone(),
            baseline_variant_hash: baseline.run.variant_hash.clone(),
            candidate_variant_hash: candidate.run.variant_hash.clone(),
        },
        dataset: snapshot.descriptor(),
        model: backend.model().clone(),
        baseline,
        candidate,
        cases,
        delta,
    }
}

/// Join the two arms by display id, baseline order first, then any
/// candidate-only ids in candidate order. Both arms run the same snapshot
/// so the lists normally match one to one; a missing side still joins as
/// a no-change entry rather than being dropped.
fn join_case_outcomes(baseline: &[CaseResult], candidate: &[CaseResult]) -> Vec<CaseComparison> {
    let by_id: HashMap<&str, &CaseResult> = candidate
        .iter()
        .map(|case| (case.id.as_str(), case))
        .collect();

    let mut joined: Vec<CaseComparison> = baseline
        .iter()
        .map(|case| {
            let baseline_standing = Some(CaseStanding::of(case));
            let candidate_standing = by_id.get(case.id.as_str()).map(|c| CaseStanding::of(c));
            CaseComparison {
                id: case.id.clone(),
                baseline: baseline_standing,
                candidate: candidate_standing,
                outcome: CaseOutcome::classify(baseline_standing, candidate_standing),
            }
        })
        .collect();

    let seen: HashSet<&str> = baseline.iter().map(|case| case.id.as_str()).collect();
    for case in candidate {
        if seen.contains(case.id.as_str()) {
            continue;
        }
        let candidate_standing = Some(CaseStanding::of(case));
        joined.push(CaseComparison {
            id: case.id.clone(),
            baseline: None,
            candidate: candidate_standing,
            outcome: CaseOutcome::classify(None, candidate_standing),
        });
    }

    joined
}

/// Candidate minus baseline. The pass-rate delta stays undefined unless
/// both arms scored something; latency and cost deltas are always defined.
fn delta_between(baseline: &RunTotals, candidate: &RunTotals) -> CompareDelta {
    let pass_rate = match (baseline.pass_rate, candidate.pass_rate) {
        (Some(base), Some(cand)) => Some(cand - base),
        _ => None,
    };

    CompareDelta {
        pass_rate,
        avg_latency_ms: candidate.avg_latency_ms - baseline.avg_latency_ms,
        total_cost: candidate.usage.cost.total - baseline.usage.cost.total,
    }
}

#[cfg(test)]
mod tests {
    use evalset_core::{CaseScore, CheckKind, CheckResult, Usage};

    use super::*;

    fn case(id: &str, scored: bool, pass: bool) -> CaseResult {
        let checks = if scored {
            vec![CheckResult {
                check: CheckKind::ExpectContains,
                pass,
                details: "contains \"x\"".to_string(),
            }]
        } else {
            Vec::new()
        };
        CaseResult::completed(
            id.to_string(),
            "input".to_string(),
            CaseScore {
                scored,
                pass: if scored { pass } else { true },
                checks,
            },
            "output",
            5,
            "end_turn".to_string(),
            Usage::zero(),
        )
    }

    #[test]
    fn test_join_classifies_each_direction() {
        let baseline = vec![
            case("fixed", true, false),
            case("broken", true, true),
            case("steady", true, true),
            case("loose", false, true),
        ];
        let candidate = vec![
            case("fixed", true, true),
            case("broken", true, false),
            case("steady", true, true),
            case("loose", false, true),
        ];

        let joined = join_case_outcomes(&baseline, &candidate);
        assert_eq!(joined.len(), 4);
        assert_eq!(joined[0].outcome, CaseOutcome::Improved);
        assert_eq!(joined[1].outcome, CaseOutcome::Regressed);
        assert_eq!(joined[2].outcome, CaseOutcome::NoChange);
        assert_eq!(joined[3].outcome, CaseOutcome::NoChange);
        // Baseline order is preserved.
        let ids: Vec<&str> = joined.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["fixed", "broken", "steady", "loose"]);
    }

    #[test]
    fn test_join_keeps_one_sided_cases() {
        let baseline = vec![case("shared", true, true), case("only-base", true, false)];
        let candidate = vec![case("shared", true, true), case("only-cand", true, true)];

        let joined = join_case_outcomes(&baseline, &candidate);
        assert_eq!(joined.len(), 3);

        assert_eq!(joined[1].id, "only-base");
        assert!(joined[1].candidate.is_none());
        assert_eq!(joined[1].outcome, CaseOutcome::NoChange);

        assert_eq!(joined[2].id, "only-cand");
        assert!(joined[2].baseline.is_none());
        assert_eq!(joined[2].outcome, CaseOutcome::NoChange);
    }

    #[test]
    fn test_delta_requires_both_pass_rates() {
        let scored = RunTotals::from_cases(&[case("a", true, true), case("b", true, false)]);
        let unscored = RunTotals::from_cases(&[case("a", false, true), case("b", false, true)]);

        assert_eq!(delta_between(&scored, &unscored).pass_rate, None);
        assert_eq!(delta_between(&unscored, &scored).pass_rate, None);

        let improved = RunTotals::from_cases(&[case("a", true, true), case("b", true, true)]);
        let delta = delta_between(&scored, &improved);
        assert_eq!(delta.pass_rate, Some(0.5));
    }

    #[test]
    fn test_delta_latency_and_cost_always_defined() {
        let mut slow = case("a", false, true);
        slow.latency_ms = 300;
        slow.usage.cost.total = 0.02;
        let mut fast = case("a", false, true);
        fast.latency_ms = 100;
        fast.usage.cost.total = 0.005;

        let baseline = RunTotals::from_cases(&[slow]);
        let candidate = RunTotals::from_cases(&[fast]);
        let delta = delta_between(&baseline, &candidate);

        assert_eq!(delta.pass_rate, None);
        assert!((delta.avg_latency_ms + 200.0).abs() < 1e-9);
        assert!((delta.total_cost + 0.015).abs() < 1e-9);
    }
}
