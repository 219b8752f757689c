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

//! # Evalset Runner
//!
//! Everything between a parsed dataset and a persisted report:
//!
//! - **Backends**: single-turn completion clients for Anthropic and
//!   OpenAI-compatible endpoints behind one trait
//! - **Executor**: runs every case of a pinned snapshot under one variant,
//!   isolating request failures to the case they belong to
//! - **Compare**: baseline-then-candidate runs over the same snapshot,
//!   joined per case
//! - **Store**: dataset loading with raw-byte provenance hashes, and
//!   atomic report writes
//! - **Credentials**: provider API keys from the environment
//!
//! The pure data model these parts operate on lives in `evalset-core`.

pub mod backend;
pub mod compare;
pub mod credentials;
pub mod executor;
pub mod store;

pub use backend::{
    AnthropicBackend, BackendError, CompletionBackend, CompletionOutcome, CompletionRequest,
    ContentBlock, OpenAiBackend,
};
pub use compare::run_comparison;
pub use credentials::{CredentialError, CredentialResolver, EnvCredentials};
pub use executor::{DatasetSnapshot, ExecutorOptions, VariantExecutor};
pub use store::{
    default_compare_report_path, default_run_report_path, load_dataset, read_prompt_file,
    sanitize_slug, write_report, LoadedDataset, PromptFile, StoreError,
};
