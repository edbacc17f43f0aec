use typed_builder::TypedBuilder;

/// Default budget for the rejection-sampling loop.
pub const DEFAULT_MAX_GENERATION_ATTEMPTS: usize = 64;

/// Configures a [`ShortenerService`](crate::ShortenerService).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct ShortenerSettings {
    /// Candidate codes tried before giving up with `GenerationExhausted`.
    #[builder(default = DEFAULT_MAX_GENERATION_ATTEMPTS)]
    pub max_generation_attempts: usize,
    /// Look the canonical URL up in the store when the index misses.
    #[builder(default = true)]
    pub reuse_from_store: bool,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}
