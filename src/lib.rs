pub mod bench;
pub mod cache;
pub mod comparator;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod gateway;
pub mod harness;
pub mod prompts;
pub mod sanitize;
pub mod scorer;
pub mod topics;
pub mod tracker;
pub mod utils;

// Load env from a simple, standardized location resolution.
// This uses dotenvy::dotenv().ok() which loads .env if present and silently ignores if missing.
pub fn load_env() {
    let _ = dotenvy::dotenv();
}
