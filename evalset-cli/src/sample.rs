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

//! Starter dataset template written by `evalset init`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

/// A small two-case dataset that exercises both a passing and a likely
/// failing containment check out of the box.
pub const STARTER_DATASET: &str = r#"{
  "name": "maintainer-clarity-smoke",
  "systemPrompt": "Answer concisely and explicitly.",
  "cases": [
    {
      "id": "fixed-task-set-definition",
      "input": "In one sentence: what does fixed task set mean for evals?",
      "expectContains": ["same tasks"]
    },
    {
      "id": "harness-gaps",
      "input": "List two things an eval harness may still need for reproducible workflows.",
      "expectContains": ["dataset", "reproducibility"]
    }
  ]
}
"#;

/// Write the starter template. Refuses to clobber an existing file unless
/// `force` is set.
pub fn write_template(path: &Path, force: bool) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).truncate(true);
    if force {
        options.create(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|err| {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            anyhow!(
                "{} already exists (pass --force to overwrite)",
                path.display()
            )
        } else {
            anyhow!("failed to create {}: {err}", path.display())
        }
    })?;
    file.write_all(STARTER_DATASET.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use evalset_core::EvalDataset;

    use super::*;

    #[test]
    fn test_template_is_a_valid_dataset() {
        let dataset = EvalDataset::parse(STARTER_DATASET).expect("template parses");
        assert_eq!(dataset.name.as_deref(), Some("maintainer-clarity-smoke"));
        assert_eq!(dataset.cases.len(), 2);
        assert!(dataset.cases.iter().all(|case| case.is_scored()));
    }

    #[test]
    fn test_write_template_creates_parents() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("demos").join("fixed-task-set.json");

        let written = write_template(&target, false).expect("writes");
        assert_eq!(written, target);
        assert_eq!(
            fs::read_to_string(&target).expect("read back"),
            STARTER_DATASET
        );
    }

    #[test]
    fn test_write_template_refuses_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("suite.json");

        write_template(&target, false).expect("first write");
        let err = write_template(&target, false).expect_err("second write");
        assert!(err.to_string().contains("already exists"));

        // --force replaces the file.
        fs::write(&target, "{}").expect("scribble");
        write_template(&target, true).expect("forced write");
        assert_eq!(
            fs::read_to_string(&target).expect("read back"),
            STARTER_DATASET
        );
    }
}
