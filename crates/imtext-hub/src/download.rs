//! Tokenizer downloading from HuggingFace Hub.

use hf_hub::api::tokio::{Api, ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use imtext_core::{ImTextError, Result, SecretString};
use std::path::PathBuf;

/// File every fast tokenizer repository ships.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Companion files fetched when present.
pub const TOKENIZER_EXTRA_FILES: &[&str] = &["tokenizer_config.json", "special_tokens_map.json"];

/// Build API with optional token authentication.
fn build_api(token: Option<&SecretString>) -> Result<Api> {
    let mut builder = ApiBuilder::new();

    if let Some(secret) = token {
        builder = builder.with_token(Some(secret.expose_secret().to_string()));
    }

    builder.build().map_err(|e| ImTextError::Hub(e.to_string()))
}

fn model_repo(api: &Api, model_id: &str, revision: Option<&str>) -> ApiRepo {
    match revision {
        Some(rev) => api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            rev.to_string(),
        )),
        None => api.model(model_id.to_string()),
    }
}

/// Paths of a downloaded tokenizer inside the hub's own cache.
#[derive(Debug, Clone)]
pub struct TokenizerFiles {
    /// Path to `tokenizer.json`.
    pub tokenizer: PathBuf,
    /// Companion files that were available.
    pub extras: Vec<PathBuf>,
}

/// Download a pretrained tokenizer from HuggingFace Hub.
///
/// # Arguments
/// * `model_id` - Model identifier (e.g., "bert-base-uncased")
/// * `revision` - Optional revision/branch (e.g., "main")
/// * `token` - Optional authentication token
pub async fn download_tokenizer(
    model_id: &str,
    revision: Option<&str>,
    token: Option<&SecretString>,
) -> Result<TokenizerFiles> {
    let api = build_api(token)?;
    let repo = model_repo(&api, model_id, revision);

    tracing::info!(model = %model_id, "Fetching tokenizer from hub");
    let tokenizer = repo.get(TOKENIZER_FILE).await.map_err(|e| {
        ImTextError::Hub(format!(
            "{} unavailable for '{}': {}",
            TOKENIZER_FILE, model_id, e
        ))
    })?;

    let mut extras = Vec::new();
    for name in TOKENIZER_EXTRA_FILES {
        match repo.get(name).await {
            Ok(path) => extras.push(path),
            Err(e) => tracing::debug!(file = %name, "Optional tokenizer file skipped: {}", e),
        }
    }

    Ok(TokenizerFiles { tokenizer, extras })
}
