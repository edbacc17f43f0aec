//! URL shortening engine.
//!
//! This crate provides [`ShortenerService`], the implementation of the
//! `Shortener` trait, together with the pieces it is made of: URL
//! canonicalization, the acceleration index and the per-key lock table.
//! Core types are re-exported from `shorty_core`.

pub mod index;
pub mod lock;
pub mod normalize;
pub mod service;
pub mod settings;

pub use index::AccelerationIndex;
pub use lock::{KeyGuard, KeyedLock};
pub use normalize::{is_valid, normalize};
pub use service::ShortenerService;
pub use settings::{ShortenerSettings, DEFAULT_MAX_GENERATION_ATTEMPTS};
pub use shorty_core::{ShortCode, ShortenParams, Shortener, ShortenerError, UrlRecord};
