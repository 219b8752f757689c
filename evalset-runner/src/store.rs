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

//! Dataset loading and report persistence.
//!
//! All filesystem work is synchronous and happens before or after
//! evaluation, never during it. Reports are written whole and renamed into
//! place so a crash mid-write cannot leave a truncated document at the
//! final path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use evalset_core::hash::hash_bytes;
use evalset_core::{DatasetError, EvalDataset};

/// Errors from dataset loading and report persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A dataset file read from disk, with provenance.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    /// Absolute path the file was read from.
    pub path: PathBuf,
    /// Hash of the raw file bytes, before parsing.
    pub raw_hash: String,
    pub dataset: EvalDataset,
}

/// Read, hash, and parse a dataset file.
///
/// The hash covers the bytes on disk, so reformatting the file changes it
/// even when the parsed content is identical. Catching that is the point:
/// the dataset hash answers "same file?", the case hash answers "same
/// tasks?".
pub fn load_dataset(path: impl AsRef<Path>) -> Result<LoadedDataset, StoreError> {
    let path = absolute(path.as_ref());
    let raw = fs::read_to_string(&path).map_err(|source| StoreError::Read {
        path: path.clone(),
        source,
    })?;

    Ok(LoadedDataset {
        raw_hash: hash_bytes(raw.as_bytes()),
        dataset: EvalDataset::parse(&raw)?,
        path,
    })
}

/// A system-prompt file read from disk.
#[derive(Debug, Clone)]
pub struct PromptFile {
    /// Absolute path, recorded in variant provenance.
    pub path: PathBuf,
    pub text: String,
}

/// Read a system-prompt override file.
pub fn read_prompt_file(path: impl AsRef<Path>) -> Result<PromptFile, StoreError> {
    let path = absolute(path.as_ref());
    let text = fs::read_to_string(&path).map_err(|source| StoreError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(PromptFile { path, text })
}

/// Persist a report as pretty-printed JSON with a trailing newline.
///
/// Creates parent directories, writes the whole document to `<path>.tmp`,
/// then renames it over the target. Returns the absolute path written.
pub fn write_report<T: Serialize>(
    path: impl AsRef<Path>,
    report: &T,
) -> Result<PathBuf, StoreError> {
    let path = absolute(path.as_ref());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut body = serde_json::to_string_pretty(report)?;
    body.push('\n');

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, body).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, &path).map_err(|source| StoreError::Write {
        path: path.clone(),
        source,
    })?;

    Ok(path)
}

/// Lowercase alphanumeric runs joined by `-`; `"evalset"` when nothing
/// survives. Used for default report names and unnamed datasets.
pub fn sanitize_slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut gap = false;
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            gap = true;
        }
    }

    if slug.is_empty() {
        "evalset".to_string()
    } else {
        slug
    }
}

/// Default run report location under the working directory:
/// `.evalset/reports/run-<dataset>-<variant>-<timestamp>.json`.
pub fn default_run_report_path(dataset_name: &str, variant_name: &str) -> PathBuf {
    reports_dir().join(format!(
        "run-{}-{}-{}.json",
        sanitize_slug(dataset_name),
        sanitize_slug(variant_name),
        timestamp_slug()
    ))
}

/// Default compare report location under the working directory:
/// `.evalset/reports/compare-<dataset>-<timestamp>.json`.
pub fn default_compare_report_path(dataset_name: &str) -> PathBuf {
    reports_dir().join(format!(
        "compare-{}-{}.json",
        sanitize_slug(dataset_name),
        timestamp_slug()
    ))
}

fn reports_dir() -> PathBuf {
    PathBuf::from(".evalset").join("reports")
}

/// Local-time `yyyymmddThhmmss`, embedded in default report names.
fn timestamp_slug() -> String {
    chrono::Local::now().format("%Y%m%dT%H%M%S").to_string()
}

/// Resolve against the current directory without touching the filesystem.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const DATASET: &str = r#"{
        "name": "smoke",
        "systemPrompt": "Answer briefly.",
        "cases": [
            { "id": "greet", "input": "Say hi", "expectContains": ["hi"] }
        ]
    }"#;

    #[test]
    fn test_load_dataset_records_provenance() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("tasks.json");
        fs::write(&file, DATASET).expect("write dataset");

        let loaded = load_dataset(&file).expect("load");
        assert!(loaded.path.is_absolute());
        assert_eq!(loaded.raw_hash, hash_bytes(DATASET.as_bytes()));
        assert_eq!(loaded.dataset.name.as_deref(), Some("smoke"));
        assert_eq!(loaded.dataset.cases.len(), 1);
    }

    #[test]
    fn test_load_dataset_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_dataset(dir.path().join("absent.json")).expect_err("missing");
        assert!(matches!(err, StoreError::Read { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_load_dataset_surfaces_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("bad.json");
        fs::write(&file, r#"{ "cases": [] }"#).expect("write dataset");

        let err = load_dataset(&file).expect_err("invalid");
        assert!(matches!(err, StoreError::Dataset(_)));
    }

    #[test]
    fn test_read_prompt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("system.txt");
        fs::write(&file, "Be terse.\n").expect("write prompt");

        let prompt = read_prompt_file(&file).expect("read");
        assert!(prompt.path.is_absolute());
        assert_eq!(prompt.text, "Be terse.\n");
    }

    #[test]
    fn test_write_report_creates_parents_and_cleans_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("nested").join("deep").join("report.json");

        let written = write_report(&target, &json!({ "kind": "evalset-run", "n": 1 }))
            .expect("write report");
        assert_eq!(written, target);

        let body = fs::read_to_string(&target).expect("read back");
        assert!(body.ends_with('\n'));
        // Pretty-printed, not compact.
        assert!(body.contains("\n  \"kind\""));
        let value: serde_json::Value = serde_json::from_str(&body).expect("valid json");
        assert_eq!(value["kind"], "evalset-run");

        let mut tmp = target.as_os_str().to_owned();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }

    #[test]
    fn test_write_report_replaces_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("report.json");

        write_report(&target, &json!({ "n": 1 })).expect("first write");
        write_report(&target, &json!({ "n": 2 })).expect("second write");

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&target).expect("read back"))
                .expect("valid json");
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn test_sanitize_slug() {
        assert_eq!(sanitize_slug("Smoke Suite"), "smoke-suite");
        assert_eq!(sanitize_slug("data/Tasks v2.json"), "data-tasks-v2-json");
        assert_eq!(sanitize_slug("--weird--"), "weird");
        assert_eq!(sanitize_slug("!!!"), "evalset");
        assert_eq!(sanitize_slug(""), "evalset");
    }

    #[test]
    fn test_default_report_paths() {
        let run = default_run_report_path("Smoke Suite", "candidate");
        let name = run.file_name().expect("file name").to_string_lossy().into_owned();
        assert!(run.starts_with(".evalset/reports"));
        assert!(name.starts_with("run-smoke-suite-candidate-"));
        assert!(name.ends_with(".json"));

        let stamp = name
            .strip_prefix("run-smoke-suite-candidate-")
            .and_then(|rest| rest.strip_suffix(".json"))
            .expect("timestamp");
        assert_eq!(stamp.len(), 15);
        assert_eq!(stamp.as_bytes()[8], b'T');

        let compare = default_compare_report_path("Smoke Suite");
        let name = compare
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with("compare-smoke-suite-"));
        assert!(name.ends_with(".json"));
    }
}
