//! Core types and traits for the shorty URL shortener.
//!
//! This crate provides the record model, the store contract and the
//! engine contract shared by the storage backends, the shortening engine
//! and the gateway.

pub mod error;
pub mod repository;
pub mod shortcode;
pub mod shortener;

pub use error::{ShortenerError, StorageError};
pub use repository::{CodeKind, ReadRepository, Repository, UrlRecord};
pub use shortcode::ShortCode;
pub use shortener::{ShortenParams, Shortener};
