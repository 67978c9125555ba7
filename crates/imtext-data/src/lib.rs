//! Dataset handling and preprocessing for imtext.
//!
//! This crate provides:
//! - Index table loading from CSV files, with default file selection
//! - Image decoding and resizing into `(channels, size, size)` tensors
//! - Randomized augmentation transforms and the default pipeline
//! - A randomly-indexable image/label dataset
//! - DataLoader for creating batches
//! - Tokenizer integration with a local cache

#![warn(missing_docs)]

pub mod dataloader;
pub mod dataset;
pub mod image_processing;
pub mod index;
pub mod tokenizer;
pub mod transforms;

pub use dataloader::*;
pub use dataset::*;
pub use image_processing::*;
pub use index::*;
pub use tokenizer::*;
pub use transforms::{default_pipeline, Compose, Transform};
