//! Configuration types for imtext.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Dataset configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Directory holding the index files and the image subdirectory.
    pub data_dir: PathBuf,

    /// Image subdirectory, relative to `data_dir`.
    #[serde(default)]
    pub img_dir: String,

    /// Index file name relative to `data_dir`.
    /// When unset, the CSV with the most rows is selected.
    #[serde(default)]
    pub index_file: Option<String>,

    /// Square edge length images are resized to.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Apply the default augmentation pipeline.
    #[serde(default = "default_true")]
    pub augment: bool,

    /// Tokenizer model identifier (HuggingFace repo ID).
    #[serde(default = "default_tokenizer_model")]
    pub tokenizer_model: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./dataset"),
            img_dir: String::new(),
            index_file: None,
            image_size: default_image_size(),
            augment: true,
            tokenizer_model: default_tokenizer_model(),
        }
    }
}

/// How tokenizers are laid out inside the cache directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheLayout {
    /// One subdirectory per model identifier.
    #[default]
    PerModel,
    /// A single directory shared by every model identifier.
    ///
    /// Whatever tokenizer was cached first is returned for all requests.
    Shared,
}

/// Tokenizer cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Root of the local tokenizer cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Cache layout.
    #[serde(default)]
    pub layout: CacheLayout,

    /// Hub revision/branch to fetch.
    #[serde(default)]
    pub revision: Option<String>,

    /// HuggingFace token for private models.
    #[serde(default)]
    pub hf_token: Option<String>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            layout: CacheLayout::default(),
            revision: None,
            hf_token: None,
        }
    }
}

/// Batch loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Batch size.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Shuffle item order.
    #[serde(default)]
    pub shuffle: bool,

    /// Random seed for shuffling.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Drop the last incomplete batch.
    #[serde(default)]
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            shuffle: false,
            seed: default_seed(),
            drop_last: false,
        }
    }
}

// Default value functions
fn default_image_size() -> u32 {
    300
}
fn default_true() -> bool {
    true
}
fn default_tokenizer_model() -> String {
    "medicalai/ClinicalBERT".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("data/tokenizer")
}
fn default_batch_size() -> usize {
    5
}
fn default_seed() -> u64 {
    42
}
