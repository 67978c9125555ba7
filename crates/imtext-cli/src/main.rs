//! imtext CLI - inspect image/label datasets and manage the tokenizer cache.

use std::path::{Component, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use imtext_core::{CacheLayout, DatasetConfig, LoaderConfig, TokenizerConfig};
use imtext_data::{tensor_to_image, DataLoader, Dataset, StreamDataset, TokenizerCache};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

/// Combined configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FullConfig {
    /// Dataset configuration.
    #[serde(default)]
    pub dataset: DatasetConfig,

    /// Tokenizer cache configuration.
    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    /// Batch loader configuration.
    #[serde(default)]
    pub loader: LoaderConfig,
}

#[derive(Parser)]
#[command(name = "imtext")]
#[command(author, version, about = "Image/label dataset loader with tokenizer caching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a dataset, print its summary, and draw one batch
    Inspect {
        /// Path to configuration file (YAML)
        #[arg(short, long)]
        config: Option<String>,

        /// Directory holding the index files
        #[arg(short, long)]
        data_dir: Option<String>,

        /// Image subdirectory relative to the data directory
        #[arg(long)]
        img_dir: Option<String>,

        /// Index file name; defaults to the CSV with the most rows
        #[arg(long)]
        index_file: Option<String>,

        /// Edge length images are resized to
        #[arg(long)]
        size: Option<u32>,

        /// Disable augmentation
        #[arg(long)]
        no_augment: bool,

        /// Tokenizer model ID
        #[arg(long)]
        tokenizer_model: Option<String>,

        /// Skip the tokenizer update pass (no network access)
        #[arg(long)]
        no_tokenizer: bool,

        /// Batch size
        #[arg(long)]
        batch_size: Option<usize>,

        /// Shuffle with the given seed
        #[arg(long)]
        shuffle_seed: Option<u64>,

        /// Write the first item of the batch as a PNG
        #[arg(long)]
        preview: Option<String>,
    },

    /// Fetch a tokenizer into the local cache
    Tokenizer {
        /// Tokenizer model ID
        #[arg(default_value = "medicalai/ClinicalBERT")]
        model: String,

        /// Cache directory
        #[arg(long)]
        cache_dir: Option<String>,

        /// Use one shared cache directory for every model
        #[arg(long)]
        shared: bool,

        /// Hub revision
        #[arg(long)]
        revision: Option<String>,
    },

    /// Show or clear the tokenizer cache
    Cache {
        /// Cache directory
        #[arg(long, default_value = "data/tokenizer")]
        cache_dir: String,

        /// Remove the cache directory
        #[arg(long)]
        clear: bool,
    },

    /// Write a sample configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "imtext.yaml")]
        output: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect {
            config,
            data_dir,
            img_dir,
            index_file,
            size,
            no_augment,
            tokenizer_model,
            no_tokenizer,
            batch_size,
            shuffle_seed,
            preview,
        } => {
            let mut config = load_config(config.as_deref())?;

            if let Some(dir) = data_dir {
                config.dataset.data_dir = PathBuf::from(dir);
            }
            if let Some(dir) = img_dir {
                config.dataset.img_dir = dir;
            }
            if index_file.is_some() {
                config.dataset.index_file = index_file;
            }
            if let Some(size) = size {
                config.dataset.image_size = size;
            }
            if no_augment {
                config.dataset.augment = false;
            }
            if let Some(model) = tokenizer_model {
                config.dataset.tokenizer_model = model;
            }
            if let Some(batch_size) = batch_size {
                config.loader.batch_size = batch_size;
            }
            if let Some(seed) = shuffle_seed {
                config.loader.shuffle = true;
                config.loader.seed = seed;
            }

            run_inspect(config, no_tokenizer, preview).await?;
        }
        Commands::Tokenizer {
            model,
            cache_dir,
            shared,
            revision,
        } => {
            let mut config = TokenizerConfig {
                revision,
                ..Default::default()
            };
            if let Some(dir) = cache_dir {
                config.cache_dir = PathBuf::from(dir);
            }
            if shared {
                config.layout = CacheLayout::Shared;
            }

            let cache = TokenizerCache::new(&config);
            let spinner = spinner(&format!("Loading tokenizer {}", model))?;
            let tokenizer = cache.load(&model).await;
            spinner.finish_and_clear();
            let tokenizer = tokenizer?;

            println!("Tokenizer: {}", model);
            println!("  Cache:      {}", cache.dir_for(&model)?.display());
            println!("  Vocab size: {}", tokenizer.vocab_size());
        }
        Commands::Cache { cache_dir, clear } => {
            let root = PathBuf::from(cache_dir);
            if clear {
                imtext_hub::clear_cache(&root)?;
                println!("Cleared tokenizer cache: {}", root.display());
            } else {
                let size = imtext_hub::cache_size(&root)?;
                println!("Tokenizer cache: {}", root.display());
                println!("  Size: {}", format_size(size));
            }
        }
        Commands::Init { output } => {
            let output = validate_output_path(&output, "config file")?;
            generate_sample_config(&output)?;
        }
    }

    Ok(())
}

/// Load the configuration file, or defaults when none is given.
fn load_config(path: Option<&str>) -> anyhow::Result<FullConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&content)?)
        }
        None => Ok(FullConfig::default()),
    }
}

async fn run_inspect(
    config: FullConfig,
    no_tokenizer: bool,
    preview: Option<String>,
) -> anyhow::Result<()> {
    let dataset = if no_tokenizer {
        StreamDataset::build(&config.dataset)?
    } else {
        let cache = TokenizerCache::new(&config.tokenizer);
        let spinner = spinner(&format!(
            "Updating tokenizer {}",
            config.dataset.tokenizer_model
        ))?;
        let dataset = StreamDataset::open(&config.dataset, &cache).await;
        spinner.finish_and_clear();
        dataset?
    };

    println!("{}", dataset);

    if dataset.is_empty() {
        println!("Dataset is empty, nothing to load");
        return Ok(());
    }

    let mut loader = DataLoader::new(&dataset, config.loader.clone())?;
    println!(
        "Batches: {} (batch size {})",
        loader.num_batches(),
        config.loader.batch_size
    );

    if let Some(batch) = loader.next_batch() {
        let batch = batch?;
        println!("Batch shape: {:?}", batch.images.shape());
        for (index, label) in batch.indices.iter().zip(&batch.labels) {
            println!("  [{}] {}", index, label);
        }
    }

    if let Some(path) = preview {
        let path = validate_output_path(&path, "preview image")?;
        let sample = dataset.get(0)?;
        tensor_to_image(&sample.image)?.save(&path)?;
        println!("Preview written to: {}", path.display());
    }

    Ok(())
}

fn spinner(message: &str) -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

/// Generate a sample configuration file.
fn generate_sample_config(output: &std::path::Path) -> anyhow::Result<()> {
    let config = FullConfig {
        dataset: DatasetConfig {
            data_dir: PathBuf::from("./dataset"),
            img_dir: "images".to_string(),
            ..Default::default()
        },
        tokenizer: TokenizerConfig::default(),
        loader: LoaderConfig::default(),
    };

    let yaml = serde_yaml::to_string(&config)?;
    std::fs::write(output, yaml)?;

    println!("Sample configuration written to: {}", output.display());
    println!("\nYou can edit this file and inspect the dataset with:");
    println!("  imtext inspect --config {}", output.display());

    Ok(())
}

/// Format a byte count with a binary suffix.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Validate an output path, rejecting `..` components and locations outside
/// the current directory or the system temp directory.
fn validate_output_path(path: &str, context: &str) -> anyhow::Result<PathBuf> {
    let path = PathBuf::from(path);

    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        anyhow::bail!(
            "Path traversal detected in {}: '{}' contains '..' component",
            context,
            path.display()
        );
    }

    let cwd = std::env::current_dir()?;
    let resolved = if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    };

    if let Some(parent) = resolved.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let canonical = match (resolved.parent(), resolved.file_name()) {
        (Some(parent), Some(name)) => parent.canonicalize()?.join(name),
        _ => resolved.clone(),
    };

    let cwd_canonical = cwd.canonicalize()?;
    let temp_dir = std::env::temp_dir().canonicalize().ok();
    let is_safe = canonical.starts_with(&cwd_canonical)
        || temp_dir
            .as_ref()
            .is_some_and(|t| canonical.starts_with(t));

    if !is_safe {
        anyhow::bail!(
            "Invalid {} path '{}': must be within the current directory or the temp directory",
            context,
            canonical.display()
        );
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn test_rejects_parent_components() {
        assert!(validate_output_path("../escape.yaml", "config file").is_err());
    }

    #[test]
    fn test_sample_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("imtext.yaml");

        generate_sample_config(&path).unwrap();
        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.dataset.img_dir, "images");
        assert_eq!(config.dataset.image_size, 300);
        assert_eq!(config.loader.batch_size, 5);
        assert_eq!(config.tokenizer.layout, CacheLayout::PerModel);
    }
}
