//! Utility functions shared across the codebase

pub mod math;
pub mod text;

// Re-export commonly used utilities
pub use math::cosine_similarity;
pub use text::split_sentences;
