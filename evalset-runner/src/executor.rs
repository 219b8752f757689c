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

//! Variant execution over a pinned dataset snapshot.
//!
//! [`VariantExecutor::execute`] is infallible: a backend failure is scored
//! as a failed case and the run keeps going. Case results come back in
//! dataset order even when requests run concurrently.

use std::num::NonZeroUsize;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use uuid::Uuid;

use evalset_core::hash::hash_value;
use evalset_core::{
    score_output, CaseDefinition, CaseResult, DatasetDescriptor, RunIdentity, RunReport,
    RunTotals, Variant, RUN_REPORT_KIND,
};

use crate::backend::{CompletionBackend, CompletionRequest};
use crate::store::{sanitize_slug, LoadedDataset};

/// Dataset content pinned for execution. Both arms of a comparison share
/// one snapshot, so their dataset and case hashes are identical by
/// construction.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    /// Trimmed dataset name, or a slug of the given path when unnamed.
    pub dataset_name: String,
    /// Absolute path the dataset was loaded from.
    pub dataset_path: String,
    /// Hash of the raw dataset file bytes.
    pub dataset_hash: String,
    /// Canonical hash of the cases that will actually run.
    pub cases_hash: String,
    pub cases: Vec<CaseDefinition>,
}

impl DatasetSnapshot {
    /// Pin a loaded dataset, keeping at most `max_cases` cases.
    ///
    /// `given_path` is the dataset path as the user wrote it; its slug
    /// names the snapshot when the dataset file carries no name. The case
    /// hash is computed after truncation so it covers exactly the cases
    /// that run.
    pub fn pin(loaded: &LoadedDataset, given_path: &str, max_cases: Option<usize>) -> Self {
        let mut cases = loaded.dataset.cases.clone();
        if let Some(limit) = max_cases {
            cases.truncate(limit);
        }

        let dataset_name = loaded
            .dataset
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| sanitize_slug(given_path));

        Self {
            dataset_name,
            dataset_path: loaded.path.display().to_string(),
            dataset_hash: loaded.raw_hash.clone(),
            cases_hash: hash_value(&cases),
            cases,
        }
    }

    pub fn descriptor(&self) -> DatasetDescriptor {
        DatasetDescriptor {
            name: self.dataset_name.clone(),
            path: self.dataset_path.clone(),
        }
    }
}

/// Execution knobs shared by every case in a run.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub temperature: Option<f64>,
    /// API key forwarded to the backend with every request.
    pub credential: Option<String>,
    /// In-flight request cap. Results keep dataset order regardless.
    pub concurrency: NonZeroUsize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            temperature: None,
            credential: None,
            concurrency: NonZeroUsize::MIN,
        }
    }
}

/// Runs every case of a snapshot against one backend under one variant.
pub struct VariantExecutor<'a> {
    backend: &'a dyn CompletionBackend,
    options: ExecutorOptions,
}

impl<'a> VariantExecutor<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, options: ExecutorOptions) -> Self {
        Self { backend, options }
    }

    /// Evaluate one variant over the snapshot.
    ///
    /// Cases dispatch through a bounded buffer of `concurrency` in-flight
    /// requests; the buffer yields results in dataset order, so aggregation
    /// runs serially on the collecting side. Request errors downgrade to
    /// scored case failures and never abort the run.
    pub async fn execute(&self, snapshot: &DatasetSnapshot, variant: &Variant) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let variant_hash = variant.content_hash();
        let total = snapshot.cases.len();

        tracing::info!(
            run_id = %run_id,
            variant = %variant.name,
            dataset = %snapshot.dataset_name,
            cases = total,
            concurrency = self.options.concurrency.get(),
            "starting variant run"
        );

        let cases: Vec<CaseResult> = stream::iter(snapshot.cases.iter().enumerate())
            .map(|(index, case)| self.run_case(index, total, case, variant))
            .buffered(self.options.concurrency.get())
            .collect()
            .await;

        let totals = RunTotals::from_cases(&cases);
        let finished_at = Utc::now();

        tracing::info!(
            run_id = %run_id,
            variant = %variant.name,
            passed = totals.passed_cases,
            scored = totals.scored_cases,
            "variant run finished"
        );

        RunReport {
            kind: RUN_REPORT_KIND.to_string(),
            created_at: finished_at,
            run: RunIdentity {
                run_id,
                started_at,
                finished_at,
                model_key: self.backend.model().model_key(),
                temperature: self.options.temperature,
                dataset_hash: snapshot.dataset_hash.clone(),
                cases_hash: snapshot.cases_hash.clone(),
                variant_hash,
            },
            dataset: snapshot.descriptor(),
            model: self.backend.model().clone(),
            variant: variant.clone(),
            totals,
            cases,
        }
    }

    async fn run_case(
        &self,
        index: usize,
        total: usize,
        case: &CaseDefinition,
        variant: &Variant,
    ) -> CaseResult {
        let id = case.display_id(index);
        tracing::info!(case = %id, index = index + 1, total, variant = %variant.name, "evaluating case");

        let request = CompletionRequest {
            system_prompt: variant.system_prompt.clone(),
            input: case.input.clone(),
            temperature: self.options.temperature,
            api_key: self.options.credential.clone(),
        };

        let clock = Instant::now();
        match self.backend.complete(request).await {
            Ok(outcome) => {
                let latency_ms = clock.elapsed().as_millis() as u64;
                let output = outcome.joined_text();
                let score = score_output(case, &output);
                if score.scored && !score.pass {
                    tracing::debug!(case = %id, checks = score.checks.len(), "checks failed");
                }
                CaseResult::completed(
                    id,
                    case.input.clone(),
                    score,
                    &output,
                    latency_ms,
                    outcome.stop_reason,
                    outcome.usage,
                )
            }
            Err(error) => {
                let latency_ms = clock.elapsed().as_millis() as u64;
                tracing::warn!(case = %id, error = %error, "completion request failed");
                CaseResult::request_failed(id, case.input.clone(), error.to_string(), latency_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use evalset_core::hash::hash_bytes;
    use evalset_core::EvalDataset;

    use super::*;

    fn loaded(raw: &str) -> LoadedDataset {
        LoadedDataset {
            path: PathBuf::from("/work/data/tasks.json"),
            raw_hash: hash_bytes(raw.as_bytes()),
            dataset: EvalDataset::parse(raw).expect("valid dataset"),
        }
    }

    const THREE_CASES: &str = r#"{
        "name": "  Smoke Suite  ",
        "cases": [
            { "id": "a", "input": "one", "expectContains": ["1"] },
            { "id": "b", "input": "two" },
            { "id": "c", "input": "three" }
        ]
    }"#;

    #[test]
    fn test_pin_trims_dataset_name() {
        let snapshot = DatasetSnapshot::pin(&loaded(THREE_CASES), "data/tasks.json", None);
        assert_eq!(snapshot.dataset_name, "Smoke Suite");
        assert_eq!(snapshot.dataset_path, "/work/data/tasks.json");
        assert_eq!(snapshot.cases.len(), 3);
    }

    #[test]
    fn test_pin_falls_back_to_path_slug_when_unnamed() {
        let raw = r#"{ "cases": [ { "input": "one" } ] }"#;
        let snapshot = DatasetSnapshot::pin(&loaded(raw), "data/Tasks v2.json", None);
        assert_eq!(snapshot.dataset_name, "data-tasks-v2-json");
    }

    #[test]
    fn test_pin_blank_name_falls_back_too() {
        let raw = r#"{ "name": "   ", "cases": [ { "input": "one" } ] }"#;
        let snapshot = DatasetSnapshot::pin(&loaded(raw), "suite.json", None);
        assert_eq!(snapshot.dataset_name, "suite-json");
    }

    #[test]
    fn test_truncation_happens_before_case_hash() {
        let full = DatasetSnapshot::pin(&loaded(THREE_CASES), "t.json", None);
        let limited = DatasetSnapshot::pin(&loaded(THREE_CASES), "t.json", Some(2));

        assert_eq!(limited.cases.len(), 2);
        assert_eq!(limited.cases[0].display_id(0), "a");
        assert_eq!(limited.cases[1].display_id(1), "b");
        assert_ne!(limited.cases_hash, full.cases_hash);
        assert_eq!(limited.cases_hash, hash_value(&full.cases[..2].to_vec()));
        // The file itself did not change.
        assert_eq!(limited.dataset_hash, full.dataset_hash);
    }

    #[test]
    fn test_generous_limit_keeps_every_case() {
        let snapshot = DatasetSnapshot::pin(&loaded(THREE_CASES), "t.json", Some(10));
        let full = DatasetSnapshot::pin(&loaded(THREE_CASES), "t.json", None);
        assert_eq!(snapshot.cases.len(), 3);
        assert_eq!(snapshot.cases_hash, full.cases_hash);
    }

    #[test]
    fn test_default_options_run_sequentially() {
        let options = ExecutorOptions::default();
        assert_eq!(options.concurrency.get(), 1);
        assert!(options.temperature.is_none());
        assert!(options.credential.is_none());
    }
}
