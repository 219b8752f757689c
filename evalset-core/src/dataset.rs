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

//! Dataset model and wire-format validation.
//!
//! Datasets arrive as JSON documents:
//!
//! ```json
//! {
//!   "name": "maintainer-clarity-smoke",
//!   "systemPrompt": "Answer concisely.",
//!   "cases": [
//!     {
//!       "id": "greeting",
//!       "input": "Say hello.",
//!       "expectContains": ["hello"],
//!       "expectNotContains": ["goodbye"],
//!       "expectRegex": "^h"
//!     }
//!   ]
//! }
//! ```
//!
//! Validation walks the whole document and accumulates every problem as a
//! [`ValidationIssue`] before reporting, so one pass surfaces all defects.
//! Unknown fields are ignored. The wire expectation fields are folded into
//! an ordered [`CheckSpec`] list: contains terms first, then not-contains
//! terms, then the pattern.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// One declarative expectation applied to a model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CheckSpec {
    /// Response must contain the term (case-insensitive).
    Contains { term: String },
    /// Response must not contain the term (case-insensitive).
    NotContains { term: String },
    /// Response must match the pattern (multi-line mode).
    Matches { pattern: String },
}

/// A single prompt plus its declared expectations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub input: String,
    #[serde(default)]
    pub checks: Vec<CheckSpec>,
}

impl CaseDefinition {
    /// Identifier shown in reports: the trimmed explicit id when non-blank,
    /// otherwise `case-<n>` from the 1-based position.
    pub fn display_id(&self, index: usize) -> String {
        match self.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("case-{}", index + 1),
        }
    }

    /// A case with no checks is unscored; it runs but never counts toward
    /// pass rates.
    pub fn is_scored(&self) -> bool {
        !self.checks.is_empty()
    }
}

/// An immutable, validated set of evaluation cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalDataset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub cases: Vec<CaseDefinition>,
}

impl EvalDataset {
    /// Parse and validate dataset JSON.
    pub fn parse(raw: &str) -> Result<Self, DatasetError> {
        let value: Value = serde_json::from_str(raw)?;
        validate(&value).map_err(|issues| DatasetError::Shape { issues })
    }

    pub fn case_count(&self) -> usize {
        self.cases.len()
    }
}

/// One problem found while validating dataset JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Location of the offending value, e.g. `$.cases[2].input`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors from dataset parsing.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("dataset validation failed ({} issue(s)): {}", .issues.len(), join_issues(.issues))]
    Shape { issues: Vec<ValidationIssue> },
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a parsed dataset document. Total and side-effect free: every
/// issue in the document is collected before the verdict.
fn validate(value: &Value) -> Result<EvalDataset, Vec<ValidationIssue>> {
    let Some(root) = value.as_object() else {
        return Err(vec![issue("$", "dataset must be a JSON object")]);
    };

    let mut issues = Vec::new();

    let name = optional_string(root, "name", "$.name", &mut issues);
    let system_prompt = optional_string(root, "systemPrompt", "$.systemPrompt", &mut issues);

    let mut cases = Vec::new();
    match root.get("cases").and_then(Value::as_array) {
        Some(entries) if !entries.is_empty() => {
            for (index, entry) in entries.iter().enumerate() {
                if let Some(case) = validate_case(entry, index, &mut issues) {
                    cases.push(case);
                }
            }
        }
        _ => issues.push(issue("$.cases", "must be a non-empty array of cases")),
    }

    if issues.is_empty() {
        Ok(EvalDataset {
            name,
            system_prompt,
            cases,
        })
    } else {
        Err(issues)
    }
}

fn validate_case(
    entry: &Value,
    index: usize,
    issues: &mut Vec<ValidationIssue>,
) -> Option<CaseDefinition> {
    let path = format!("$.cases[{index}]");
    let Some(case) = entry.as_object() else {
        issues.push(issue(&path, "must be an object"));
        return None;
    };

    let before = issues.len();

    let input = match case.get("input").and_then(Value::as_str) {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => {
            issues.push(issue(
                &format!("{path}.input"),
                "must be a non-empty string",
            ));
            String::new()
        }
    };

    let id = optional_string(case, "id", &format!("{path}.id"), issues);

    let mut checks = Vec::new();
    for term in string_list(case, "expectContains", &path, issues) {
        checks.push(CheckSpec::Contains { term });
    }
    for term in string_list(case, "expectNotContains", &path, issues) {
        checks.push(CheckSpec::NotContains { term });
    }
    match case.get("expectRegex") {
        None => {}
        // An empty pattern declares nothing; it produces no check.
        Some(Value::String(pattern)) if pattern.is_empty() => {}
        Some(Value::String(pattern)) => checks.push(CheckSpec::Matches {
            pattern: pattern.clone(),
        }),
        Some(_) => issues.push(issue(
            &format!("{path}.expectRegex"),
            "must be a string when provided",
        )),
    }

    (issues.len() == before).then_some(CaseDefinition { id, input, checks })
}

fn optional_string(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match map.get(key) {
        None => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            issues.push(issue(path, "must be a string when provided"));
            None
        }
    }
}

fn string_list(
    map: &Map<String, Value>,
    key: &str,
    case_path: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<String> {
    match map.get(key) {
        None => Vec::new(),
        Some(Value::Array(items)) => {
            let mut terms = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(text) => terms.push(text.to_string()),
                    None => {
                        issues.push(issue(
                            &format!("{case_path}.{key}"),
                            "must be an array of strings when provided",
                        ));
                        return Vec::new();
                    }
                }
            }
            terms
        }
        Some(_) => {
            issues.push(issue(
                &format!("{case_path}.{key}"),
                "must be an array of strings when provided",
            ));
            Vec::new()
        }
    }
}

fn issue(path: &str, message: &str) -> ValidationIssue {
    ValidationIssue {
        path: path.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape_issues(err: DatasetError) -> Vec<ValidationIssue> {
        match err {
            DatasetError::Shape { issues } => issues,
            other => panic!("expected shape error, got: {other}"),
        }
    }

    #[test]
    fn test_parse_full_dataset() {
        let raw = r#"{
            "name": "smoke",
            "systemPrompt": "Answer concisely.",
            "cases": [
                {
                    "id": "greeting",
                    "input": "Say hello.",
                    "expectContains": ["hello", "hi"],
                    "expectNotContains": ["goodbye"],
                    "expectRegex": "^h"
                }
            ]
        }"#;

        let dataset = EvalDataset::parse(raw).expect("valid dataset");
        assert_eq!(dataset.name.as_deref(), Some("smoke"));
        assert_eq!(dataset.system_prompt.as_deref(), Some("Answer concisely."));
        assert_eq!(dataset.case_count(), 1);

        let case = &dataset.cases[0];
        assert_eq!(case.id.as_deref(), Some("greeting"));
        assert_eq!(
            case.checks,
            vec![
                CheckSpec::Contains {
                    term: "hello".to_string()
                },
                CheckSpec::Contains {
                    term: "hi".to_string()
                },
                CheckSpec::NotContains {
                    term: "goodbye".to_string()
                },
                CheckSpec::Matches {
                    pattern: "^h".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_minimal_case_is_unscored() {
        let dataset = EvalDataset::parse(r#"{"cases": [{"input": "Say hello."}]}"#)
            .expect("valid dataset");
        assert!(!dataset.cases[0].is_scored());
        assert!(dataset.cases[0].id.is_none());
    }

    #[test]
    fn test_empty_pattern_produces_no_check() {
        let dataset =
            EvalDataset::parse(r#"{"cases": [{"input": "x", "expectRegex": ""}]}"#)
                .expect("valid dataset");
        assert!(dataset.cases[0].checks.is_empty());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = EvalDataset::parse("{not json").expect_err("must fail");
        assert!(matches!(err, DatasetError::Json(_)));
    }

    #[test]
    fn test_rejects_non_object_dataset() {
        let issues = shape_issues(EvalDataset::parse("[1, 2]").expect_err("must fail"));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "$");
    }

    #[test]
    fn test_rejects_missing_or_empty_cases() {
        for raw in [r#"{}"#, r#"{"cases": []}"#, r#"{"cases": "nope"}"#] {
            let issues = shape_issues(EvalDataset::parse(raw).expect_err("must fail"));
            assert_eq!(issues.len(), 1, "raw: {raw}");
            assert_eq!(issues[0].path, "$.cases");
        }
    }

    #[test]
    fn test_rejects_blank_input() {
        let issues = shape_issues(
            EvalDataset::parse(r#"{"cases": [{"input": "   "}]}"#).expect_err("must fail"),
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "$.cases[0].input");
    }

    #[test]
    fn test_collects_every_issue_in_one_pass() {
        let raw = r#"{
            "name": 7,
            "cases": [
                {"input": ""},
                "not an object",
                {"input": "ok", "expectContains": [1], "expectRegex": 9}
            ]
        }"#;

        let issues = shape_issues(EvalDataset::parse(raw).expect_err("must fail"));
        let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "$.name",
                "$.cases[0].input",
                "$.cases[1]",
                "$.cases[2].expectContains",
                "$.cases[2].expectRegex",
            ]
        );
    }

    #[test]
    fn test_rejects_non_string_id() {
        let issues = shape_issues(
            EvalDataset::parse(r#"{"cases": [{"id": 4, "input": "x"}]}"#).expect_err("must fail"),
        );
        assert_eq!(issues[0].path, "$.cases[0].id");
    }

    #[test]
    fn test_ignores_unknown_fields() {
        let dataset = EvalDataset::parse(
            r#"{"cases": [{"input": "x", "notes": "extra"}], "owner": "qa"}"#,
        )
        .expect("valid dataset");
        assert_eq!(dataset.case_count(), 1);
    }

    #[test]
    fn test_display_id_prefers_trimmed_explicit_id() {
        let case = CaseDefinition {
            id: Some("  greeting  ".to_string()),
            input: "x".to_string(),
            checks: Vec::new(),
        };
        assert_eq!(case.display_id(0), "greeting");
    }

    #[test]
    fn test_display_id_synthesized_for_blank_id() {
        let case = CaseDefinition {
            id: Some("   ".to_string()),
            input: "x".to_string(),
            checks: Vec::new(),
        };
        assert_eq!(case.display_id(1), "case-2");
    }

    #[test]
    fn test_check_spec_wire_tags() {
        let check = CheckSpec::NotContains {
            term: "x".to_string(),
        };
        let value = serde_json::to_value(&check).expect("serializable");
        assert_eq!(value["kind"], "notContains");
        assert_eq!(value["term"], "x");
    }

    #[test]
    fn test_shape_error_lists_paths() {
        let err = EvalDataset::parse(r#"{"cases": [{"input": 1}]}"#).expect_err("must fail");
        let text = err.to_string();
        assert!(text.contains("$.cases[0].input"), "got: {text}");
    }
}
