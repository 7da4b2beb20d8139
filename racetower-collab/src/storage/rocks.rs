//! RocksDB-backed roster snapshot store.
//!
//! Column families:
//! - `slots`: one key per snapshot slot (`roster`, `heats`, `currentHeat`),
//!   JSON values LZ4 compressed
//! - `metadata`: a single bincode `SnapshotMetadata` record
//!
//! Every save writes all slots and the metadata in one `WriteBatch`, so a
//! crash never leaves a roster from one save next to heats from another.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use racetower_core::{RosterSnapshot, SnapshotError, SnapshotStore, SLOTS};
use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    Options, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{Deserialize, Serialize};

/// Column family names.
const CF_SLOTS: &str = "slots";
const CF_METADATA: &str = "metadata";

const COLUMN_FAMILIES: &[&str] = &[CF_SLOTS, CF_METADATA];

const METADATA_KEY: &[u8] = b"snapshot";

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
    /// Block cache size in bytes (default: 8MB)
    pub block_cache_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("racetower_data"),
            sync_writes: false,
            block_cache_size: 8 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Create config for testing (small cache, given directory).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sync_writes: false,
            block_cache_size: 1024 * 1024,
        }
    }
}

/// Bookkeeping written with every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Number of saves since the store was created
    pub save_count: u64,
    /// Uncompressed JSON bytes across all slots
    pub raw_bytes: u64,
    /// Compressed bytes across all slots
    pub compressed_bytes: u64,
    /// Last save timestamp (seconds since epoch)
    pub saved_at: u64,
}

impl SnapshotMetadata {
    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let (meta, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        Ok(meta)
    }
}

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    DatabaseError(String),
    /// Serialization failed
    SerializationError(String),
    /// Deserialization failed
    DeserializationError(String),
    /// Compression error
    CompressionError(String),
    /// Slot encoding or decoding failed
    Snapshot(SnapshotError),
    /// Store lock poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(e) => write!(f, "Database error: {e}"),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
            StoreError::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            StoreError::CompressionError(e) => write!(f, "Compression error: {e}"),
            StoreError::Snapshot(e) => write!(f, "{e}"),
            StoreError::Poisoned => write!(f, "Store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl From<SnapshotError> for StoreError {
    fn from(e: SnapshotError) -> Self {
        StoreError::Snapshot(e)
    }
}

impl From<StoreError> for SnapshotError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Snapshot(inner) => inner,
            other => SnapshotError::Backend(other.to_string()),
        }
    }
}

/// RocksDB-backed snapshot store.
pub struct RocksSnapshotStore {
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
    /// Serializes read-modify-write of the metadata record
    write_lock: Mutex<()>,
}

impl RocksSnapshotStore {
    /// Open the store at the configured path.
    ///
    /// Creates the database and column families if they don't exist.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_keep_log_file_num(2);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(&config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;
        log::info!("Opened snapshot store at {}", config.path.display());

        Ok(Self {
            db,
            config,
            write_lock: Mutex::new(()),
        })
    }

    fn cf_options(config: &StoreConfig) -> Options {
        let mut opts = Options::default();
        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        opts.set_block_based_table_factory(&block_opts);
        // Values are already LZ4 framed
        opts.set_compression_type(DBCompressionType::None);
        opts.optimize_for_point_lookup(config.block_cache_size as u64);
        opts
    }

    /// Write every slot plus updated metadata atomically.
    pub fn save_snapshot(&self, snapshot: &RosterSnapshot) -> Result<SnapshotMetadata, StoreError> {
        let encoded = snapshot.encode_slots()?;
        let cf_slots = self.cf(CF_SLOTS)?;
        let cf_meta = self.cf(CF_METADATA)?;

        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut batch = WriteBatch::default();
        let mut raw_bytes = 0u64;
        let mut compressed_bytes = 0u64;
        for (slot, json) in &encoded {
            let compressed = lz4_flex::compress_prepend_size(json);
            raw_bytes += json.len() as u64;
            compressed_bytes += compressed.len() as u64;
            batch.put_cf(&cf_slots, slot.as_bytes(), &compressed);
        }

        let previous = self.metadata()?.map_or(0, |m| m.save_count);
        let meta = SnapshotMetadata {
            save_count: previous + 1,
            raw_bytes,
            compressed_bytes,
            saved_at: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        };
        batch.put_cf(&cf_meta, METADATA_KEY, &meta.encode()?);

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        log::debug!(
            "Saved snapshot #{} ({} racers, {raw_bytes} → {compressed_bytes} bytes)",
            meta.save_count,
            snapshot.roster.len()
        );
        Ok(meta)
    }

    /// Read the slots back; `None` when no roster was ever saved.
    pub fn load_snapshot(&self) -> Result<Option<RosterSnapshot>, StoreError> {
        let cf = self.cf(CF_SLOTS)?;
        let mut slots: HashMap<&'static str, Vec<u8>> = HashMap::new();
        for slot in SLOTS {
            if let Some(compressed) = self.db.get_cf(&cf, slot.as_bytes())? {
                let json = lz4_flex::decompress_size_prepended(&compressed)
                    .map_err(|e| StoreError::CompressionError(e.to_string()))?;
                slots.insert(*slot, json);
            }
        }
        Ok(RosterSnapshot::decode_slots(|name| slots.remove(name))?)
    }

    /// Load the metadata record, if any save happened.
    pub fn metadata(&self) -> Result<Option<SnapshotMetadata>, StoreError> {
        let cf = self.cf(CF_METADATA)?;
        match self.db.get_cf(&cf, METADATA_KEY)? {
            Some(bytes) => Ok(Some(SnapshotMetadata::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete all slots and metadata.
    pub fn clear(&self) -> Result<(), StoreError> {
        let cf_slots = self.cf(CF_SLOTS)?;
        let cf_meta = self.cf(CF_METADATA)?;
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let mut batch = WriteBatch::default();
        for slot in SLOTS {
            batch.delete_cf(&cf_slots, slot.as_bytes());
        }
        batch.delete_cf(&cf_meta, METADATA_KEY);
        self.db.write(batch)?;
        Ok(())
    }

    /// Flush memtables to disk.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::DatabaseError(format!("Column family '{name}' not found")))
    }
}

impl SnapshotStore for RocksSnapshotStore {
    fn load(&self) -> Result<Option<RosterSnapshot>, SnapshotError> {
        Ok(self.load_snapshot()?)
    }

    fn save(&self, snapshot: &RosterSnapshot) -> Result<(), SnapshotError> {
        self.save_snapshot(snapshot)?;
        Ok(())
    }
}
