//! Core types, configuration, and errors for imtext.
//!
//! This crate provides the foundations shared by the other imtext crates:
//!
//! - Configuration types for the dataset, tokenizer cache, and batch loader
//! - The [`ImTextError`] error type and crate-wide [`Result`] alias
//! - Secure handling of hub tokens

#![warn(missing_docs)]

mod config;
mod error;
mod secrets;

pub use config::*;
pub use error::*;
pub use secrets::SecretString;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{ImTextError, Result};
    pub use crate::secrets::SecretString;
}
