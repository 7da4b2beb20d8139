//! Best-effort roster snapshots.
//!
//! A snapshot is stored as three named slots, each JSON-encoded with the
//! field names of the data model:
//!
//! | Slot          | Contents              |
//! |---------------|-----------------------|
//! | `roster`      | `Vec<Racer>`          |
//! | `heats`       | `Vec<Heat>`           |
//! | `currentHeat` | `Option<u32>`         |
//!
//! A store without a `roster` slot loads as absent. Missing `heats` or
//! `currentHeat` slots load as empty.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Heat, Racer};

pub const SLOT_ROSTER: &str = "roster";
pub const SLOT_HEATS: &str = "heats";
pub const SLOT_CURRENT_HEAT: &str = "currentHeat";

/// All slot names, in write order.
pub const SLOTS: &[&str] = &[SLOT_ROSTER, SLOT_HEATS, SLOT_CURRENT_HEAT];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot encode error: {0}")]
    Encode(String),
    #[error("Snapshot decode error in slot '{slot}': {reason}")]
    Decode { slot: &'static str, reason: String },
    #[error("Snapshot backend error: {0}")]
    Backend(String),
}

/// Everything needed to restore a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSnapshot {
    pub roster: Vec<Racer>,
    pub heats: Vec<Heat>,
    pub current_heat: Option<u32>,
}

impl RosterSnapshot {
    /// Encode each slot as JSON bytes, in [`SLOTS`] order.
    pub fn encode_slots(&self) -> Result<Vec<(&'static str, Vec<u8>)>, SnapshotError> {
        let encode = |value: Result<Vec<u8>, serde_json::Error>| {
            value.map_err(|e| SnapshotError::Encode(e.to_string()))
        };
        Ok(vec![
            (SLOT_ROSTER, encode(serde_json::to_vec(&self.roster))?),
            (SLOT_HEATS, encode(serde_json::to_vec(&self.heats))?),
            (SLOT_CURRENT_HEAT, encode(serde_json::to_vec(&self.current_heat))?),
        ])
    }

    /// Rebuild a snapshot from slot bytes looked up by name.
    pub fn decode_slots<F>(mut lookup: F) -> Result<Option<Self>, SnapshotError>
    where
        F: FnMut(&'static str) -> Option<Vec<u8>>,
    {
        let Some(roster) = lookup(SLOT_ROSTER) else {
            return Ok(None);
        };
        let roster = decode_slot(SLOT_ROSTER, &roster)?;
        let heats = match lookup(SLOT_HEATS) {
            Some(bytes) => decode_slot(SLOT_HEATS, &bytes)?,
            None => Vec::new(),
        };
        let current_heat = match lookup(SLOT_CURRENT_HEAT) {
            Some(bytes) => decode_slot(SLOT_CURRENT_HEAT, &bytes)?,
            None => None,
        };
        Ok(Some(Self { roster, heats, current_heat }))
    }
}

fn decode_slot<T: for<'de> Deserialize<'de>>(
    slot: &'static str,
    bytes: &[u8],
) -> Result<T, SnapshotError> {
    serde_json::from_slice(bytes).map_err(|e| SnapshotError::Decode {
        slot,
        reason: e.to_string(),
    })
}

/// Persistence collaborator.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<RosterSnapshot>, SnapshotError>;
    fn save(&self, snapshot: &RosterSnapshot) -> Result<(), SnapshotError>;
}

/// Slot store kept in process memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    slots: Mutex<HashMap<&'static str, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw JSON of a slot, if it has been written.
    pub fn slot(&self, name: &str) -> Option<String> {
        let slots = self.slots.lock().ok()?;
        slots.get(name).map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<RosterSnapshot>, SnapshotError> {
        let slots = self
            .slots
            .lock()
            .map_err(|e| SnapshotError::Backend(e.to_string()))?;
        RosterSnapshot::decode_slots(|name| slots.get(name).cloned())
    }

    fn save(&self, snapshot: &RosterSnapshot) -> Result<(), SnapshotError> {
        let encoded = snapshot.encode_slots()?;
        let mut slots = self
            .slots
            .lock()
            .map_err(|e| SnapshotError::Backend(e.to_string()))?;
        slots.extend(encoded);
        Ok(())
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for std::sync::Arc<S> {
    fn load(&self) -> Result<Option<RosterSnapshot>, SnapshotError> {
        (**self).load()
    }

    fn save(&self, snapshot: &RosterSnapshot) -> Result<(), SnapshotError> {
        (**self).save(snapshot)
    }
}
