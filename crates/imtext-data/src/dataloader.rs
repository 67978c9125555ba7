//! DataLoader for creating batches.

use imtext_core::{ImTextError, LoaderConfig, Result};
use ndarray::{Array4, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::{Dataset, Sample};

/// A batch of samples.
#[derive(Debug)]
pub struct Batch {
    /// Images stacked as `[batch_size, channels, height, width]`.
    pub images: Array4<u8>,
    /// Labels, one per image.
    pub labels: Vec<String>,
    /// Dataset indices the batch was drawn from.
    pub indices: Vec<usize>,
}

impl Batch {
    /// Number of samples in this batch.
    pub fn batch_size(&self) -> usize {
        self.labels.len()
    }

    /// Stack samples into a batch.
    ///
    /// All images must share one shape; a grayscale image next to an RGB
    /// one is a shape mismatch.
    pub fn collate(samples: Vec<Sample>, indices: Vec<usize>) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| ImTextError::InvalidArgument("Empty batch".to_string()))?;
        let expected = first.image.shape().to_vec();

        if let Some(other) = samples.iter().find(|s| s.image.shape() != expected.as_slice()) {
            return Err(ImTextError::ShapeMismatch {
                expected,
                actual: other.image.shape().to_vec(),
            });
        }

        let views: Vec<ArrayView3<u8>> = samples.iter().map(|s| s.image.view()).collect();
        let images = ndarray::stack(Axis(0), &views)
            .map_err(|e| ImTextError::InvalidArgument(format!("Failed to stack batch: {}", e)))?;

        let labels = samples.into_iter().map(|s| s.label).collect();

        Ok(Self {
            images,
            labels,
            indices,
        })
    }
}

/// DataLoader that yields batches from a dataset.
pub struct DataLoader<'a, D: Dataset + ?Sized> {
    /// The dataset.
    dataset: &'a D,
    /// Configuration.
    config: LoaderConfig,
    /// Current index permutation.
    indices: Vec<usize>,
    /// Current position in the permutation.
    position: usize,
    /// Drives shuffling and augmentation.
    rng: StdRng,
}

impl<'a, D: Dataset + ?Sized> DataLoader<'a, D> {
    /// Create a new DataLoader.
    pub fn new(dataset: &'a D, config: LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(ImTextError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        if config.shuffle {
            indices.shuffle(&mut rng);
        }

        Ok(Self {
            dataset,
            config,
            indices,
            position: 0,
            rng,
        })
    }

    /// Reset the DataLoader for a new epoch.
    pub fn reset(&mut self, new_seed: Option<u64>) {
        self.position = 0;
        if let Some(seed) = new_seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        if self.config.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    /// Get the number of batches.
    pub fn num_batches(&self) -> usize {
        let n = self.dataset.len();
        if self.config.drop_last {
            n / self.config.batch_size
        } else {
            n.div_ceil(self.config.batch_size)
        }
    }

    /// Get the total number of samples.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// Check if the loader is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Get the next batch.
    pub fn next_batch(&mut self) -> Option<Result<Batch>> {
        if self.position >= self.indices.len() {
            return None;
        }

        let batch_end = (self.position + self.config.batch_size).min(self.indices.len());
        let batch_indices = self.indices[self.position..batch_end].to_vec();

        if self.config.drop_last && batch_indices.len() < self.config.batch_size {
            return None;
        }
        self.position = batch_end;

        Some(self.create_batch(batch_indices))
    }

    fn create_batch(&mut self, indices: Vec<usize>) -> Result<Batch> {
        let samples = indices
            .iter()
            .map(|&i| self.dataset.get_with_rng(i, &mut self.rng))
            .collect::<Result<Vec<_>>>()?;
        Batch::collate(samples, indices)
    }
}

impl<D: Dataset + ?Sized> Iterator for DataLoader<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch()
    }
}
