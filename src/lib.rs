//! Deduplicating batch file-ingestion service.
//!
//! Uploaded batches are fingerprinted with streaming SHA-256, checked
//! against a durable SQLite dedup index, and unique content is persisted to
//! a filesystem blob store. Files are processed in fixed-size groups with
//! bounded concurrency; after each group the shared progress counters
//! advance and a snapshot is broadcast to every connected WebSocket
//! observer.

pub mod broadcast;
pub mod hash;
pub mod index;
pub mod ingest;
pub mod progress;
pub mod routes;
pub mod state;
pub mod store;
pub mod ws;
