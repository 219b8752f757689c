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

//! Canonical content hashing for report identity.
//!
//! Structural hashes (case subsets, variants) are blake3 digests over a
//! canonical JSON form: mapping keys sorted lexicographically, sequence
//! order preserved, primitives untouched. Key insertion order never changes
//! a digest; reordering a sequence such as the case list always does.
//! Dataset source fingerprints hash the raw bytes instead, so whitespace
//! edits are visible.

use serde::Serialize;
use serde_json::Value;

/// Hex characters of a digest shown in logs and summaries.
const SHORT_HASH_LEN: usize = 12;

/// Rewrite `value` into canonical form: object keys sorted, array order
/// preserved, primitives passed through.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut canonical = serde_json::Map::with_capacity(entries.len());
            for (key, entry) in entries {
                canonical.insert(key.clone(), canonicalize(entry));
            }
            Value::Object(canonical)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hex blake3 digest of the canonical JSON serialization of `value`.
pub fn hash_value<T: Serialize>(value: &T) -> String {
    let canonical = canonicalize(&serde_json::to_value(value).unwrap_or(Value::Null));
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

/// Hex blake3 digest of raw bytes.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Leading 12 characters of a hex digest, for human-facing output.
pub fn short_hash(digest: &str) -> &str {
    &digest[..digest.len().min(SHORT_HASH_LEN)]
}
