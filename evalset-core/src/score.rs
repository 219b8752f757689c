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

//! Pure scoring of model output against a case's declared checks.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::dataset::{CaseDefinition, CheckSpec};

/// Wire identifier of a check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckKind {
    #[serde(rename = "expectContains")]
    ExpectContains,
    #[serde(rename = "expectNotContains")]
    ExpectNotContains,
    #[serde(rename = "expectRegex")]
    ExpectRegex,
    /// Synthetic check recording a failed completion request.
    #[serde(rename = "request")]
    Request,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::ExpectContains => "expectContains",
            CheckKind::ExpectNotContains => "expectNotContains",
            CheckKind::ExpectRegex => "expectRegex",
            CheckKind::Request => "request",
        }
    }
}

/// Outcome of one check against one response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: CheckKind,
    pub pass: bool,
    pub details: String,
}

/// Scored view of a single case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseScore {
    /// False when the case declares no checks.
    pub scored: bool,
    /// All checks passed; vacuously true for unscored cases.
    pub pass: bool,
    pub checks: Vec<CheckResult>,
}

/// Apply every declared check to `output`, never short-circuiting.
///
/// Containment checks compare lowercased text. Patterns compile lazily in
/// multi-line mode; an unparseable pattern becomes a failed check carrying
/// the compiler's message rather than an error.
pub fn score_output(case: &CaseDefinition, output: &str) -> CaseScore {
    let lowered = output.to_lowercase();
    let mut checks = Vec::with_capacity(case.checks.len());

    for spec in &case.checks {
        checks.push(match spec {
            CheckSpec::Contains { term } => CheckResult {
                check: CheckKind::ExpectContains,
                pass: lowered.contains(&term.to_lowercase()),
                details: format!("contains {term:?}"),
            },
            CheckSpec::NotContains { term } => CheckResult {
                check: CheckKind::ExpectNotContains,
                pass: !lowered.contains(&term.to_lowercase()),
                details: format!("does not contain {term:?}"),
            },
            CheckSpec::Matches { pattern } => match_pattern(pattern, output),
        });
    }

    let scored = !checks.is_empty();
    let pass = !scored || checks.iter().all(|check| check.pass);

    CaseScore {
        scored,
        pass,
        checks,
    }
}

fn match_pattern(pattern: &str, output: &str) -> CheckResult {
    match RegexBuilder::new(pattern).multi_line(true).build() {
        Ok(regex) => CheckResult {
            check: CheckKind::ExpectRegex,
            pass: regex.is_match(output),
            details: format!("matches /{pattern}/m"),
        },
        Err(err) => CheckResult {
            check: CheckKind::ExpectRegex,
            pass: false,
            details: format!("invalid regex {pattern:?}: {err}"),
        },
    }
}
