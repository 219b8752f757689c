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

//! # Evalset Core
//!
//! Data model and pure logic for fixed-task-set prompt evaluation:
//!
//! - **Datasets**: JSON wire-format validation that reports every issue in
//!   one pass, folded into an ordered check list per case
//! - **Hashing**: canonical blake3 content hashes for datasets, case
//!   subsets, and variants
//! - **Scoring**: case-insensitive containment, exclusion, and multi-line
//!   pattern checks with exact pass/unscored semantics
//! - **Reports**: the camelCase document shapes persisted by runs and
//!   comparisons
//!
//! Everything in this crate is synchronous and side-effect free; execution
//! against a model backend lives in `evalset-runner`.

pub mod dataset;
pub mod hash;
pub mod report;
pub mod score;
pub mod variant;

pub use dataset::{CaseDefinition, CheckSpec, DatasetError, EvalDataset, ValidationIssue};
pub use report::{
    CaseComparison, CaseOutcome, CaseResult, CaseStanding, CompareDelta, CompareIdentity,
    CompareReport, DatasetDescriptor, ModelSpec, RunIdentity, RunReport, RunTotals, Usage,
    UsageCost, COMPARE_REPORT_KIND, RUN_REPORT_KIND,
};
pub use score::{score_output, CaseScore, CheckKind, CheckResult};
pub use variant::{merge_system_prompt, Variant};
