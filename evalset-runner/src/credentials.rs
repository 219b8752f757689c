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

//! API key resolution for completion backends.

use thiserror::Error;

use evalset_core::ModelSpec;

/// Errors from credential resolution.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No API key for {provider}: set {var}")]
    NoCredential { provider: String, var: &'static str },

    #[error("No credential source for provider {provider}")]
    UnsupportedProvider { provider: String },
}

/// Maps a model to the API key its backend should send.
pub trait CredentialResolver {
    fn resolve(&self, model: &ModelSpec) -> Result<String, CredentialError>;
}

/// Resolves keys from the provider's conventional environment variable.
/// Endpoints that skip auth (local OpenAI-compatible servers) can set the
/// variable to any placeholder value.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvCredentials;

impl EnvCredentials {
    /// Environment variable holding the key for a provider, if one is known.
    pub fn var_for(provider: &str) -> Option<&'static str> {
        match provider {
            "anthropic" => Some("ANTHROPIC_API_KEY"),
            "openai" => Some("OPENAI_API_KEY"),
            _ => None,
        }
    }
}

impl CredentialResolver for EnvCredentials {
    fn resolve(&self, model: &ModelSpec) -> Result<String, CredentialError> {
        let var = Self::var_for(&model.provider).ok_or_else(|| {
            CredentialError::UnsupportedProvider {
                provider: model.provider.clone(),
            }
        })?;

        std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| CredentialError::NoCredential {
                provider: model.provider.clone(),
                var,
            })
    }
}
