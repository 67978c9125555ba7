//! HuggingFace Hub integration for imtext.
//!
//! This crate provides:
//! - Tokenizer file downloading from HuggingFace Hub
//! - Local tokenizer cache layout and maintenance

#![warn(missing_docs)]

mod cache;
mod download;

pub use cache::*;
pub use download::*;
