//! Tokenizer integration and the local tokenizer cache.
//!
//! Tokenizers are cached as `tokenizer.json` under a cache root. A request
//! for a model whose cache directory is missing fetches the tokenizer from
//! the hub and persists it; a request whose directory exists loads it from
//! disk without contacting the hub.

use async_trait::async_trait;
use imtext_core::{CacheLayout, ImTextError, Result, SecretString, TokenizerConfig};
use imtext_hub::{tokenizer_cache_dir, TokenizerFiles, TOKENIZER_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metadata file written next to a cached tokenizer.
pub const CACHE_META_FILE: &str = "imtext_cache.json";

/// Wrapper around the tokenizers library.
pub struct Tokenizer {
    inner: tokenizers::Tokenizer,
}

impl Tokenizer {
    /// Load a tokenizer from a local file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path)
            .map_err(|e| ImTextError::Tokenizer(format!("{}: {}", path.display(), e)))?;
        Ok(Self { inner })
    }

    /// Load a tokenizer from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| ImTextError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Encode text to token IDs.
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ImTextError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encode many texts at once, with special tokens.
    pub fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<u32>>> {
        let encodings = self
            .inner
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ImTextError::Tokenizer(e.to_string()))?;
        Ok(encodings.iter().map(|e| e.get_ids().to_vec()).collect())
    }

    /// Decode token IDs to text.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        self.inner
            .decode(ids, true)
            .map_err(|e| ImTextError::Tokenizer(e.to_string()))
    }

    /// Get vocabulary size.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    /// Write the tokenizer as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.inner
            .save(path, false)
            .map_err(|e| ImTextError::Tokenizer(format!("{}: {}", path.display(), e)))
    }

    /// Get the underlying tokenizer.
    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

impl std::fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokenizer")
            .field("vocab_size", &self.vocab_size())
            .finish()
    }
}

/// Source of tokenizers that are not cached yet.
#[async_trait]
pub trait TokenizerFetcher: Send + Sync {
    /// Fetch the tokenizer files for `model_id`.
    async fn fetch(&self, model_id: &str) -> Result<TokenizerFiles>;
}

/// Fetches tokenizers from HuggingFace Hub.
#[derive(Debug, Clone, Default)]
pub struct HubFetcher {
    revision: Option<String>,
    token: Option<SecretString>,
}

impl HubFetcher {
    /// Create a fetcher for a revision, authenticated with `token` if given.
    pub fn new(revision: Option<String>, token: Option<SecretString>) -> Self {
        Self { revision, token }
    }
}

#[async_trait]
impl TokenizerFetcher for HubFetcher {
    async fn fetch(&self, model_id: &str) -> Result<TokenizerFiles> {
        imtext_hub::download_tokenizer(model_id, self.revision.as_deref(), self.token.as_ref())
            .await
    }
}

/// Bookkeeping stored next to a cached tokenizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    /// Model the tokenizer was fetched for.
    pub model_id: String,
    /// Rows seen by the most recent update pass.
    #[serde(default)]
    pub rows_seen: Option<usize>,
}

/// Local tokenizer cache.
pub struct TokenizerCache {
    root: PathBuf,
    layout: CacheLayout,
    fetcher: Box<dyn TokenizerFetcher>,
}

impl TokenizerCache {
    /// Create a cache that fetches missing tokenizers from the hub.
    pub fn new(config: &TokenizerConfig) -> Self {
        let token = SecretString::hub_token(config.hf_token.as_deref());
        Self::with_fetcher(
            &config.cache_dir,
            config.layout,
            HubFetcher::new(config.revision.clone(), token),
        )
    }

    /// Create a cache with a custom fetcher.
    pub fn with_fetcher<F: TokenizerFetcher + 'static>(
        root: impl Into<PathBuf>,
        layout: CacheLayout,
        fetcher: F,
    ) -> Self {
        Self {
            root: root.into(),
            layout,
            fetcher: Box::new(fetcher),
        }
    }

    /// Cache root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory used for `model_id`.
    pub fn dir_for(&self, model_id: &str) -> Result<PathBuf> {
        tokenizer_cache_dir(&self.root, model_id, self.layout)
    }

    /// Check whether `model_id` would be served from disk.
    pub fn is_cached(&self, model_id: &str) -> bool {
        self.dir_for(model_id).is_ok_and(|dir| dir.exists())
    }

    /// Read the metadata of the cache entry for `model_id`, if any.
    pub fn meta(&self, model_id: &str) -> Option<CacheMeta> {
        let dir = self.dir_for(model_id).ok()?;
        let content = std::fs::read_to_string(dir.join(CACHE_META_FILE)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Load the tokenizer for `model_id`, fetching it if it is not cached.
    ///
    /// A fetched entry is assembled in a staging directory beside its final
    /// location and renamed into place once complete, so a failed fetch
    /// leaves nothing behind.
    pub async fn load(&self, model_id: &str) -> Result<Tokenizer> {
        let dir = self.dir_for(model_id)?;

        if dir.exists() {
            if let Some(meta) = self.meta(model_id) {
                if meta.model_id != model_id {
                    tracing::warn!(
                        requested = %model_id,
                        cached = %meta.model_id,
                        "Shared tokenizer cache holds a different model; using the cached one"
                    );
                }
            }
            tracing::debug!(path = %dir.display(), "Loading cached tokenizer");
            return Tokenizer::from_file(dir.join(TOKENIZER_FILE));
        }

        let files = self.fetcher.fetch(model_id).await?;
        let tokenizer = Tokenizer::from_file(&files.tokenizer)?;

        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let staging = tempfile::Builder::new()
            .prefix(".imtext-staging-")
            .tempdir_in(parent)?;

        for extra in &files.extras {
            if let Some(name) = extra.file_name() {
                std::fs::copy(extra, staging.path().join(name))?;
            }
        }
        let meta = CacheMeta {
            model_id: model_id.to_string(),
            rows_seen: None,
        };
        write_entry(staging.path(), &tokenizer, &meta)?;

        // `staging` is gone after the rename; dropping it is a no-op.
        std::fs::rename(staging.path(), &dir)?;
        tracing::info!(model = %model_id, path = %dir.display(), "Cached tokenizer");

        Ok(tokenizer)
    }

    /// Persist `tokenizer` as the cache entry for `model_id`.
    ///
    /// In a shared cache the recorded model is kept, since the entry still
    /// holds the tokenizer that was originally fetched.
    pub fn save(
        &self,
        tokenizer: &Tokenizer,
        model_id: &str,
        rows_seen: Option<usize>,
    ) -> Result<PathBuf> {
        let dir = self.dir_for(model_id)?;
        std::fs::create_dir_all(&dir)?;

        let meta = CacheMeta {
            model_id: self
                .meta(model_id)
                .map(|m| m.model_id)
                .unwrap_or_else(|| model_id.to_string()),
            rows_seen,
        };
        write_entry(&dir, tokenizer, &meta)
    }
}

fn write_entry(dir: &Path, tokenizer: &Tokenizer, meta: &CacheMeta) -> Result<PathBuf> {
    let path = dir.join(TOKENIZER_FILE);
    tokenizer.save(&path)?;

    let json = serde_json::to_string_pretty(meta)
        .map_err(|e| ImTextError::Serialization(e.to_string()))?;
    std::fs::write(dir.join(CACHE_META_FILE), json)?;

    Ok(path)
}

impl std::fmt::Debug for TokenizerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenizerCache")
            .field("root", &self.root)
            .field("layout", &self.layout)
            .finish()
    }
}

/// Outcome of a tokenizer update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Labels encoded.
    pub rows: usize,
    /// Tokens produced across all labels.
    pub tokens: usize,
}

/// Run the tokenizer over every label and persist it back to the cache.
///
/// The encodings are only counted. A pretrained tokenizer has a fixed
/// vocabulary, so the saved file is unchanged apart from cache metadata.
pub async fn update_tokenizer(
    cache: &TokenizerCache,
    model_id: &str,
    labels: &[&str],
) -> Result<UpdateSummary> {
    let tokenizer = cache.load(model_id).await?;
    let encodings = tokenizer.encode_batch(labels)?;
    let summary = UpdateSummary {
        rows: labels.len(),
        tokens: encodings.iter().map(Vec::len).sum(),
    };

    tracing::info!("Updated tokens from {} rows of data", summary.rows);
    cache.save(&tokenizer, model_id, Some(summary.rows))?;

    Ok(summary)
}
