//! Vellum - Multi-tenant document ingestion and retrieval pipeline
//!
//! Vellum turns raw document text into a partitioned vector index and answers
//! questions against it: normalization and chunking, namespace derivation for
//! tenant isolation, pluggable embedding providers, resilient batched upserts,
//! and tenant-scoped retrieval composed into a generation prompt.

pub mod chat;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod partition;
pub mod retrieval;
pub mod store;

pub use error::{Result, VellumError};
