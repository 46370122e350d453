// src/api/mod.rs
pub mod jobs;

// Re-export all route functions
pub use jobs::*;
