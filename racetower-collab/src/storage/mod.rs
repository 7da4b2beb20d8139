//! Persistent storage for roster snapshots.
//!
//! ```text
//! ┌─────────────┐   save(snapshot)   ┌────────────────────┐
//! │ Session     │ ─────────────────► │ RocksSnapshotStore │
//! │ (controller)│ ◄───────────────── │ (RocksDB)          │
//! └─────────────┘   load() on open   └─────────┬──────────┘
//!                                              │ column families
//!                                              ▼
//!                          ┌──────────────────────────────────────┐
//!                          │ CF "slots"    — LZ4 JSON per slot    │
//!                          │ CF "metadata" — save count and sizes │
//!                          └──────────────────────────────────────┘
//! ```

pub mod rocks;

pub use rocks::{RocksSnapshotStore, SnapshotMetadata, StoreConfig, StoreError};
