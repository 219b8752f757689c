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

//! Persisted report documents.
//!
//! Everything here serializes with camelCase field names; these shapes are
//! the on-disk contract read by downstream tooling. Aggregation rules:
//! pass rates divide passed by scored cases and stay `null` when nothing
//! was scored, latency and usage sum over every case including failed
//! requests, and failed requests contribute an all-zero usage record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::score::{CaseScore, CheckKind, CheckResult};
use crate::variant::Variant;

/// Document kind tag of a persisted run report.
pub const RUN_REPORT_KIND: &str = "evalset-run";
/// Document kind tag of a persisted comparison report.
pub const COMPARE_REPORT_KIND: &str = "evalset-compare";

/// Characters of model output retained in a case result.
const PREVIEW_LIMIT: usize = 280;

/// Token usage and cost for a single completion or a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
    pub total_tokens: u64,
    pub cost: UsageCost,
}

/// Dollar cost breakdown attached to a usage record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCost {
    pub input: f64,
    pub output: f64,
    pub cache_read: f64,
    pub cache_write: f64,
    pub total: f64,
}

impl Usage {
    /// All-zero record; failed requests contribute this to run totals.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Add another usage record into this one, field by field.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input += other.input;
        self.output += other.output;
        self.cache_read += other.cache_read;
        self.cache_write += other.cache_write;
        self.total_tokens += other.total_tokens;
        self.cost.input += other.cost.input;
        self.cost.output += other.cost.output;
        self.cost.cache_read += other.cost.cache_read;
        self.cost.cache_write += other.cost.cache_write;
        self.cost.total += other.cost.total;
    }
}

/// The model a run executed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub provider: String,
    pub id: String,
    /// Wire protocol label, e.g. `anthropic-messages` or `openai-chat`.
    pub api: String,
}

impl ModelSpec {
    pub fn new(
        provider: impl Into<String>,
        id: impl Into<String>,
        api: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
            api: api.into(),
        }
    }

    /// `provider/id`, the key recorded in run identity.
    pub fn model_key(&self) -> String {
        format!("{}/{}", self.provider, self.id)
    }
}

/// Name and path of the dataset a report was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDescriptor {
    pub name: String,
    pub path: String,
}

/// Result of one case under one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub id: String,
    pub input: String,
    pub scored: bool,
    pub pass: bool,
    pub checks: Vec<CheckResult>,
    /// Details of every failing check, in check order.
    pub failed_checks: Vec<String>,
    pub output_preview: String,
    pub latency_ms: u64,
    pub stop_reason: String,
    pub usage: Usage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseResult {
    /// Record a completed request scored against the case's checks.
    pub fn completed(
        id: String,
        input: String,
        score: CaseScore,
        output: &str,
        latency_ms: u64,
        stop_reason: String,
        usage: Usage,
    ) -> Self {
        let failed_checks = score
            .checks
            .iter()
            .filter(|check| !check.pass)
            .map(|check| check.details.clone())
            .collect();

        Self {
            id,
            input,
            scored: score.scored,
            pass: score.pass,
            checks: score.checks,
            failed_checks,
            output_preview: clip_preview(output),
            latency_ms,
            stop_reason,
            usage,
            error: None,
        }
    }

    /// Record a request that never produced output. The failure is scored:
    /// a single synthetic `request` check fails with the error message, and
    /// usage is zeroed.
    pub fn request_failed(id: String, input: String, message: String, latency_ms: u64) -> Self {
        Self {
            id,
            input,
            scored: true,
            pass: false,
            checks: vec![CheckResult {
                check: CheckKind::Request,
                pass: false,
                details: message.clone(),
            }],
            failed_checks: vec![message.clone()],
            output_preview: String::new(),
            latency_ms,
            stop_reason: "error".to_string(),
            usage: Usage::zero(),
            error: Some(message),
        }
    }

    /// Scored and not passing.
    pub fn failed(&self) -> bool {
        self.scored && !self.pass
    }
}

/// Aggregate totals for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTotals {
    pub cases: usize,
    pub scored_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    /// `None` when no case was scored; never coerced to zero.
    pub pass_rate: Option<f64>,
    pub total_latency_ms: u64,
    pub avg_latency_ms: f64,
    pub usage: Usage,
}

impl RunTotals {
    /// Aggregate case results. Latency and usage sum over every case;
    /// pass counts only consider scored cases.
    pub fn from_cases(cases: &[CaseResult]) -> Self {
        let scored_cases = cases.iter().filter(|case| case.scored).count();
        let passed_cases = cases.iter().filter(|case| case.scored && case.pass).count();
        let total_latency_ms: u64 = cases.iter().map(|case| case.latency_ms).sum();

        let mut usage = Usage::zero();
        for case in cases {
            usage.accumulate(&case.usage);
        }

        let pass_rate = (scored_cases > 0).then(|| passed_cases as f64 / scored_cases as f64);
        let avg_latency_ms = if cases.is_empty() {
            0.0
        } else {
            total_latency_ms as f64 / cases.len() as f64
        };

        Self {
            cases: cases.len(),
            scored_cases,
            passed_cases,
            failed_cases: scored_cases - passed_cases,
            pass_rate,
            total_latency_ms,
            avg_latency_ms,
            usage,
        }
    }
}

/// Identity fields of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunIdentity {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model_key: String,
    pub temperature: Option<f64>,
    pub dataset_hash: String,
    pub cases_hash: String,
    pub variant_hash: String,
}

/// Complete persisted output of one variant run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub run: RunIdentity,
    pub dataset: DatasetDescriptor,
    pub model: ModelSpec,
    pub variant: Variant,
    pub totals: RunTotals,
    /// One entry per case, in dataset order.
    pub cases: Vec<CaseResult>,
}

impl RunReport {
    /// Display ids of scored cases that did not pass.
    pub fn failed_case_ids(&self) -> Vec<&str> {
        self.cases
            .iter()
            .filter(|case| case.failed())
            .map(|case| case.id.as_str())
            .collect()
    }
}

/// Standing of one case inside one arm of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseStanding {
    pub scored: bool,
    pub pass: bool,
}

impl CaseStanding {
    pub fn of(case: &CaseResult) -> Self {
        Self {
            scored: case.scored,
            pass: case.pass,
        }
    }

    fn failed(&self) -> bool {
        self.scored && !self.pass
    }
}

/// Direction of change for one case between baseline and candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaseOutcome {
    Improved,
    Regressed,
    NoChange,
}

impl CaseOutcome {
    /// Classify a case across two arms. Failing means scored and not
    /// passing; an unscored case passes vacuously. A case missing from
    /// either arm is never a change.
    pub fn classify(baseline: Option<CaseStanding>, candidate: Option<CaseStanding>) -> Self {
        match (baseline, candidate) {
            (Some(b), Some(c)) if b.failed() && c.pass => CaseOutcome::Improved,
            (Some(b), Some(c)) if b.pass && c.failed() => CaseOutcome::Regressed,
            _ => CaseOutcome::NoChange,
        }
    }
}

/// Per-case join of the two arms of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseComparison {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub baseline: Option<CaseStanding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CaseStanding>,
    pub outcome: CaseOutcome,
}

/// Candidate-minus-baseline differences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareDelta {
    /// `None` unless both arms have a defined pass rate.
    pub pass_rate: Option<f64>,
    pub avg_latency_ms: f64,
    pub total_cost: f64,
}

/// Identity fields of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareIdentity {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub model_key: String,
    pub temperature: Option<f64>,
    pub dataset_hash: String,
    pub cases_hash: String,
    pub baseline_run_id: String,
    pub candidate_run_id: String,
    pub baseline_variant_hash: String,
    pub candidate_variant_hash: String,
}

/// Complete persisted output of a baseline-vs-candidate comparison. Both
/// run reports are embedded whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareReport {
    pub kind: String,
    pub created_at: DateTime<Utc>,
    pub run: CompareIdentity,
    pub dataset: DatasetDescriptor,
    pub model: ModelSpec,
    pub baseline: RunReport,
    pub candidate: RunReport,
    /// Per-case outcomes joined by display id, in baseline order.
    pub cases: Vec<CaseComparison>,
    pub delta: CompareDelta,
}

/// Truncate model output for report previews, appending `...` past the
/// limit. Counts characters, not bytes.
pub fn clip_preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_LIMIT {
        return text.to_string();
    }
    let clipped: String = text.chars().take(PREVIEW_LIMIT).collect();
    format!("{clipped}...")
}
