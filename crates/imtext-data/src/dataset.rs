//! Image/label datasets.

use crate::image_processing::{ImageProcessor, ImageTensor};
use crate::index::{resolve_index_file, IndexRow, IndexTable};
use crate::tokenizer::{update_tokenizer, TokenizerCache, UpdateSummary};
use crate::transforms::{default_pipeline, Compose, Transform};
use imtext_core::{DatasetConfig, ImTextError, Result};
use rand::RngCore;
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// An image and its text label.
#[derive(Debug, Clone)]
pub struct Sample {
    /// Image tensor of shape `(channels, size, size)`.
    pub image: ImageTensor,
    /// Label with surrounding whitespace removed.
    pub label: String,
}

/// A fixed-length, randomly-indexable collection of samples.
pub trait Dataset: Send + Sync {
    /// Number of samples.
    fn len(&self) -> usize;

    /// Check if the dataset is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize sample `index`, drawing augmentation randomness from `rng`.
    fn get_with_rng(&self, index: usize, rng: &mut dyn RngCore) -> Result<Sample>;

    /// Materialize sample `index` using the thread-local RNG.
    fn get(&self, index: usize) -> Result<Sample> {
        self.get_with_rng(index, &mut rand::thread_rng())
    }
}

/// Dataset reading images from disk on every access.
///
/// Nothing is cached: each `get` re-reads, re-decodes, resizes and
/// re-augments the image.
pub struct StreamDataset {
    data_dir: PathBuf,
    img_dir: String,
    index: IndexTable,
    processor: ImageProcessor,
    transforms: Option<Compose>,
    tokenizer_model: String,
}

impl StreamDataset {
    /// Build the dataset index, using the default pipeline when
    /// `config.augment` is set.
    ///
    /// The tokenizer is not touched; see [`StreamDataset::open`].
    pub fn build(config: &DatasetConfig) -> Result<Self> {
        let transforms = config.augment.then(default_pipeline);
        Self::build_with_transforms(config, transforms)
    }

    /// Build the dataset index with an explicit pipeline, or none.
    pub fn build_with_transforms(
        config: &DatasetConfig,
        transforms: Option<Compose>,
    ) -> Result<Self> {
        if config.image_size == 0 {
            return Err(ImTextError::Config(
                "image_size must be greater than zero".to_string(),
            ));
        }

        let index_path = resolve_index_file(&config.data_dir, config.index_file.as_deref())?;
        let index = IndexTable::from_csv(&index_path)?;

        tracing::info!(
            index = %index_path.display(),
            rows = index.len(),
            image_size = config.image_size,
            "Loaded dataset index"
        );

        Ok(Self {
            data_dir: config.data_dir.clone(),
            img_dir: config.img_dir.clone(),
            index,
            processor: ImageProcessor::with_size(config.image_size),
            transforms,
            tokenizer_model: config.tokenizer_model.clone(),
        })
    }

    /// Build the dataset and run the tokenizer update pass over its labels.
    pub async fn open(config: &DatasetConfig, cache: &TokenizerCache) -> Result<Self> {
        let dataset = Self::build(config)?;
        dataset.update_tokenizer(cache).await?;
        Ok(dataset)
    }

    /// Encode the last index column with the configured tokenizer and
    /// re-save it.
    ///
    /// Items read their label from the second column; the two only differ
    /// for index files with more than two columns.
    pub async fn update_tokenizer(&self, cache: &TokenizerCache) -> Result<UpdateSummary> {
        update_tokenizer(cache, &self.tokenizer_model, &self.index.texts()).await
    }

    /// Path of the image for row `index`.
    ///
    /// Image names and the image directory are relative to the data
    /// directory. Absolute names and `..` components never resolve.
    pub fn image_path(&self, index: usize) -> Result<PathBuf> {
        self.resolve_image(self.row(index)?)
    }

    fn resolve_image(&self, row: &IndexRow) -> Result<PathBuf> {
        let img_dir = Path::new(&self.img_dir);
        let image = Path::new(&row.image);
        let escapes = img_dir.components().chain(image.components()).any(|c| {
            matches!(c, Component::RootDir | Component::Prefix(_) | Component::ParentDir)
        });
        if escapes || row.image.is_empty() {
            return Err(ImTextError::ImageNotFound(PathBuf::from(&row.image)));
        }
        Ok(self.data_dir.join(img_dir).join(image))
    }

    fn row(&self, index: usize) -> Result<&IndexRow> {
        self.index.get(index).ok_or(ImTextError::IndexOutOfRange {
            index,
            len: self.index.len(),
        })
    }

    /// The loaded index table.
    pub fn index(&self) -> &IndexTable {
        &self.index
    }

    /// Index file the dataset was built from.
    pub fn index_path(&self) -> &Path {
        self.index.path()
    }

    /// Edge length of produced images.
    pub fn image_size(&self) -> u32 {
        self.processor.config().size
    }

    /// Augmentation pipeline, if any.
    pub fn transforms(&self) -> Option<&Compose> {
        self.transforms.as_ref()
    }

    /// Tokenizer model used by the update pass.
    pub fn tokenizer_model(&self) -> &str {
        &self.tokenizer_model
    }
}

impl Dataset for StreamDataset {
    fn len(&self) -> usize {
        self.index.len()
    }

    fn get_with_rng(&self, index: usize, rng: &mut dyn RngCore) -> Result<Sample> {
        let row = self.row(index)?;
        let path = self.resolve_image(row)?;

        let mut image = self.processor.preprocess(&path)?;
        if let Some(ref transforms) = self.transforms {
            image = transforms.apply(image, rng)?;
        }

        Ok(Sample {
            image,
            label: row.label.trim().to_string(),
        })
    }
}

impl fmt::Display for StreamDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamDataset(index={}, rows={}, images={}, size={}x{}, transforms={}, tokenizer={})",
            self.index.path().display(),
            self.index.len(),
            self.data_dir.join(&self.img_dir).display(),
            self.image_size(),
            self.image_size(),
            self.transforms.as_ref().map_or(0, Compose::len),
            self.tokenizer_model
        )
    }
}

impl fmt::Debug for StreamDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDataset")
            .field("data_dir", &self.data_dir)
            .field("img_dir", &self.img_dir)
            .field("rows", &self.index.len())
            .field("image_size", &self.image_size())
            .field("transforms", &self.transforms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tests::CountingFetcher;
    use imtext_core::CacheLayout;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn xray_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("images")).unwrap();
        std::fs::write(
            dir.path().join("labels.csv"),
            "image,finding\na.png,pneumonia\nb.png,  normal\n",
        )
        .unwrap();
        image::RgbImage::from_fn(40, 20, |x, _| image::Rgb([x as u8 * 5, 30, 60]))
            .save(dir.path().join("images/a.png"))
            .unwrap();
        image::GrayImage::from_fn(10, 10, |x, y| image::Luma([(x + y) as u8 * 10]))
            .save(dir.path().join("images/b.png"))
            .unwrap();
        dir
    }

    fn config(dir: &Path, augment: bool) -> DatasetConfig {
        DatasetConfig {
            data_dir: dir.to_path_buf(),
            img_dir: "images".to_string(),
            index_file: None,
            image_size: 32,
            augment,
            tokenizer_model: "org/model".to_string(),
        }
    }

    #[test]
    fn test_len_and_items() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), true)).unwrap();
        assert_eq!(dataset.len(), 2);

        let a = dataset.get(0).unwrap();
        assert_eq!(a.image.shape(), &[3, 32, 32]);
        assert_eq!(a.label, "pneumonia");

        let b = dataset.get(1).unwrap();
        assert_eq!(b.image.shape(), &[1, 32, 32]);
        assert_eq!(b.label, "normal");
    }

    #[test]
    fn test_out_of_range() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();
        let err = dataset.get(2).unwrap_err();
        assert!(matches!(
            err,
            ImTextError::IndexOutOfRange { index: 2, len: 2 }
        ));
    }

    #[test]
    fn test_without_augmentation_is_deterministic() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();
        assert!(dataset.transforms().is_none());
        assert_eq!(dataset.get(0).unwrap().image, dataset.get(0).unwrap().image);
    }

    #[test]
    fn test_seeded_augmentation_repeats() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), true)).unwrap();
        let a = dataset
            .get_with_rng(0, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = dataset
            .get_with_rng(0, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_missing_image() {
        let dir = xray_dir();
        std::fs::remove_file(dir.path().join("images/b.png")).unwrap();
        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();

        assert!(dataset.get(0).is_ok());
        let err = dataset.get(1).unwrap_err();
        assert!(matches!(err, ImTextError::ImageNotFound(_)));
    }

    #[test]
    fn test_image_path_joins_dirs() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();
        assert_eq!(
            dataset.image_path(1).unwrap(),
            dir.path().join("images").join("b.png")
        );
    }

    #[test]
    fn test_image_outside_data_dir_not_found() {
        let dir = xray_dir();
        let outside = tempfile::tempdir().unwrap();
        let stray = outside.path().join("stray.png");
        image::RgbImage::new(8, 8).save(&stray).unwrap();
        std::fs::write(
            dir.path().join("labels.csv"),
            format!(
                "image,finding\n{},pneumonia\n../labels.csv,normal\n",
                stray.display()
            ),
        )
        .unwrap();

        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();
        for index in 0..2 {
            assert!(matches!(
                dataset.get(index).unwrap_err(),
                ImTextError::ImageNotFound(_)
            ));
            assert!(dataset.image_path(index).is_err());
        }
    }

    #[test]
    fn test_absolute_img_dir_not_found() {
        let dir = xray_dir();
        let mut cfg = config(dir.path(), false);
        cfg.img_dir = dir.path().join("images").display().to_string();

        let dataset = StreamDataset::build(&cfg).unwrap();
        assert!(matches!(
            dataset.get(0).unwrap_err(),
            ImTextError::ImageNotFound(_)
        ));
    }

    #[test]
    fn test_zero_image_size_rejected() {
        let dir = xray_dir();
        let mut cfg = config(dir.path(), false);
        cfg.image_size = 0;
        assert!(matches!(
            StreamDataset::build(&cfg).unwrap_err(),
            ImTextError::Config(_)
        ));
    }

    #[test]
    fn test_display_summary() {
        let dir = xray_dir();
        let dataset = StreamDataset::build(&config(dir.path(), true)).unwrap();
        let text = dataset.to_string();
        assert!(text.contains("rows=2"));
        assert!(text.contains("size=32x32"));
        assert!(text.contains("transforms=5"));
    }

    #[tokio::test]
    async fn test_open_updates_tokenizer() {
        let dir = xray_dir();
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = TokenizerCache::with_fetcher(
            dir.path().join("tokenizer"),
            CacheLayout::PerModel,
            CountingFetcher {
                dir: dir.path().to_path_buf(),
                calls: calls.clone(),
            },
        );

        let dataset = StreamDataset::open(&config(dir.path(), false), &cache)
            .await
            .unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.meta("org/model").unwrap().rows_seen, Some(2));

        StreamDataset::open(&config(dir.path(), false), &cache)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_reads_last_column() {
        let dir = xray_dir();
        std::fs::write(
            dir.path().join("labels.csv"),
            "image,finding,notes\na.png,pneumonia,left lobe\nb.png,normal,lobe\n",
        )
        .unwrap();
        let cache = TokenizerCache::with_fetcher(
            dir.path().join("tokenizer"),
            CacheLayout::PerModel,
            CountingFetcher {
                dir: dir.path().to_path_buf(),
                calls: Arc::new(AtomicUsize::new(0)),
            },
        );

        let dataset = StreamDataset::build(&config(dir.path(), false)).unwrap();
        let summary = dataset.update_tokenizer(&cache).await.unwrap();
        assert_eq!(summary.rows, 2);
        assert_eq!(summary.tokens, 3);
        assert_eq!(dataset.get(0).unwrap().label, "pneumonia");
    }
}
