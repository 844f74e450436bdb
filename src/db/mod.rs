//! Vector index backends.
//!
//! - [`vectorstore`] - The [`VectorIndex`] trait and backend selection
//! - [`local`] - Embedded index on top of `rag-vector`, in memory or on disk

#![allow(missing_docs)]

// Vector index abstraction layer
pub mod vectorstore;

// Provider implementations
pub mod local;

// Re-exports
pub use local::LocalVectorIndex;
pub use vectorstore::{VectorIndex, VectorIndexProvider};
