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

//! Human-readable summary blocks printed after runs and comparisons.
//!
//! Every number here also lives in the persisted report; the summary is a
//! digest, not the source of truth.

use std::path::Path;

use evalset_core::hash::short_hash;
use evalset_core::{CaseOutcome, CompareReport, RunReport};

/// `n/a` for an undefined rate, else one decimal place.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(rate) => format!("{:.1}%", rate * 100.0),
    }
}

pub fn format_currency(value: f64) -> String {
    format!("${value:.4}")
}

pub fn run_summary(report: &RunReport, report_path: &Path) -> String {
    let mut lines = vec![
        "evalset run completed".to_string(),
        String::new(),
        format!("dataset: {}", report.dataset.name),
        format!("dataset path: {}", report.dataset.path),
        format!("model: {}", report.run.model_key),
        format!("variant: {}", report.variant.name),
        format!(
            "run: {} (dataset {}, variant {})",
            report.run.run_id,
            short_hash(&report.run.dataset_hash),
            short_hash(&report.run.variant_hash)
        ),
        format!(
            "cases: {} total, {} scored",
            report.totals.cases, report.totals.scored_cases
        ),
        format!(
            "pass: {}/{} ({})",
            report.totals.passed_cases,
            report.totals.scored_cases,
            format_percent(report.totals.pass_rate)
        ),
        format!(
            "latency: {:.0}ms avg, {:.2}s total",
            report.totals.avg_latency_ms,
            report.totals.total_latency_ms as f64 / 1000.0
        ),
        format!(
            "tokens: in={}, out={}, total={}",
            report.totals.usage.input, report.totals.usage.output, report.totals.usage.total_tokens
        ),
        format!("cost: {}", format_currency(report.totals.usage.cost.total)),
        format!("report: {}", report_path.display()),
    ];

    let failed = report.failed_case_ids();
    if !failed.is_empty() {
        lines.push(format!("failed cases: {}", failed.join(", ")));
    }

    lines.join("\n")
}

pub fn compare_summary(report: &CompareReport, report_path: &Path) -> String {
    let improved = report
        .cases
        .iter()
        .filter(|case| case.outcome == CaseOutcome::Improved)
        .count();
    let regressed = report
        .cases
        .iter()
        .filter(|case| case.outcome == CaseOutcome::Regressed)
        .count();

    [
        "evalset compare completed".to_string(),
        String::new(),
        format!("dataset: {}", report.dataset.name),
        format!("model: {}", report.run.model_key),
        format!(
            "run: {} (dataset {})",
            report.run.run_id,
            short_hash(&report.run.dataset_hash)
        ),
        format!(
            "baseline: {} -> {} (run {})",
            report.baseline.variant.name,
            format_percent(report.baseline.totals.pass_rate),
            report.run.baseline_run_id
        ),
        format!(
            "candidate: {} -> {} (run {})",
            report.candidate.variant.name,
            format_percent(report.candidate.totals.pass_rate),
            report.run.candidate_run_id
        ),
        format!("cases: {improved} improved, {regressed} regressed"),
        format!("delta pass rate: {}", format_percent(report.delta.pass_rate)),
        format!("delta avg latency: {:.0}ms", report.delta.avg_latency_ms),
        format!("delta total cost: {}", format_currency(report.delta.total_cost)),
        format!("report: {}", report_path.display()),
    ]
    .join("\n")
}
