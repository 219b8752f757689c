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

//! Prompt variant assembly.

use serde::{Deserialize, Serialize};

use crate::hash;

/// A named system-prompt configuration evaluated against a dataset.
///
/// The variant hash covers all three fields, so renaming a variant or
/// changing where its prompt came from yields a distinct identity even
/// when the prompt text is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub name: String,
    /// Fully resolved system prompt sent with every case.
    pub system_prompt: String,
    /// Provenance of the prompt, e.g. `dataset.systemPrompt + file:/abs/p.txt`.
    pub source: String,
}

impl Variant {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: system_prompt.into(),
            source: source.into(),
        }
    }

    /// Content hash over the canonical variant object.
    pub fn content_hash(&self) -> String {
        hash::hash_value(self)
    }
}

/// Join a dataset's base prompt with an override, separated by a blank
/// line. Blank parts are dropped after trimming.
pub fn merge_system_prompt(base: Option<&str>, extra: Option<&str>) -> String {
    [base, extra]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_joins_with_blank_line() {
        let merged = merge_system_prompt(Some("Base rules."), Some("Extra rules."));
        assert_eq!(merged, "Base rules.\n\nExtra rules.");
    }

    #[test]
    fn test_merge_trims_and_drops_blank_parts() {
        assert_eq!(merge_system_prompt(Some("  Base.  "), Some("   ")), "Base.");
        assert_eq!(merge_system_prompt(None, Some("Extra.")), "Extra.");
        assert_eq!(merge_system_prompt(None, None), "");
    }

    #[test]
    fn test_content_hash_covers_every_field() {
        let base = Variant::new("candidate", "Answer concisely.", "dataset.systemPrompt");
        let renamed = Variant::new("baseline", "Answer concisely.", "dataset.systemPrompt");
        let resourced = Variant::new(
            "candidate",
            "Answer concisely.",
            "dataset.systemPrompt + --system-text",
        );

        assert_eq!(base.content_hash(), base.clone().content_hash());
        assert_ne!(base.content_hash(), renamed.content_hash());
        assert_ne!(base.content_hash(), resourced.content_hash());
    }
}
