//! Ordered position projections and the receiver-side board.
//!
//! A `PositionsUpdate` is the full ordered list for one scope. Receivers
//! replace their copy of that scope wholesale (last write wins).

use serde::{Deserialize, Serialize};

use crate::model::{Racer, RacerId};
use crate::roster::RosterStore;

/// Which ordering an update describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionScope {
    /// All active racers, ranked by global rank.
    Global,
    /// Members of the current heat, ranked by heat rank. `None` when no heat
    /// is selected.
    Heat { number: Option<u32> },
}

/// One row of a position list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionEntry {
    pub id: RacerId,
    pub name: String,
    pub number: String,
    pub team: String,
    pub color: String,
    /// Global rank or heat rank, depending on the update's scope.
    pub rank: u32,
}

impl PositionEntry {
    fn from_racer(racer: &Racer, rank: u32) -> Self {
        Self {
            id: racer.id,
            name: racer.name.clone(),
            number: racer.number.clone(),
            team: racer.team.clone(),
            color: racer.color.clone(),
            rank,
        }
    }
}

/// The `update_positions` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionsUpdate {
    pub scope: PositionScope,
    pub entries: Vec<PositionEntry>,
}

impl PositionsUpdate {
    pub fn ids(&self) -> Vec<RacerId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

/// Active racers ordered by global rank.
pub fn global_positions(store: &RosterStore) -> PositionsUpdate {
    let mut active: Vec<&Racer> = store.racers().iter().filter(|r| r.active).collect();
    active.sort_by_key(|r| r.global_rank);
    PositionsUpdate {
        scope: PositionScope::Global,
        entries: active
            .into_iter()
            .map(|r| PositionEntry::from_racer(r, r.global_rank))
            .collect(),
    }
}

/// Members of heat `number` ordered by heat rank (unranked last).
///
/// An unknown or absent heat yields an empty list.
pub fn heat_positions(store: &RosterStore, number: Option<u32>) -> PositionsUpdate {
    let scope = PositionScope::Heat { number };
    let Some(heat) = number.and_then(|n| store.heat(n)) else {
        return PositionsUpdate { scope, entries: Vec::new() };
    };

    let mut members: Vec<&Racer> = heat
        .member_ids
        .iter()
        .filter_map(|id| store.racer(id))
        .collect();
    members.sort_by_key(|r| if r.heat_rank == 0 { u32::MAX } else { r.heat_rank });

    PositionsUpdate {
        scope,
        entries: members
            .into_iter()
            .map(|r| PositionEntry::from_racer(r, r.heat_rank))
            .collect(),
    }
}

/// Display-only copy of the latest positions, as held by a viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionBoard {
    global: Vec<PositionEntry>,
    heat_number: Option<u32>,
    heat: Vec<PositionEntry>,
    applied: u64,
}

impl PositionBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scope's list with the update's entries.
    pub fn apply(&mut self, update: PositionsUpdate) {
        match update.scope {
            PositionScope::Global => self.global = update.entries,
            PositionScope::Heat { number } => {
                self.heat_number = number;
                self.heat = update.entries;
            }
        }
        self.applied += 1;
    }

    pub fn global(&self) -> &[PositionEntry] {
        &self.global
    }

    pub fn heat(&self) -> &[PositionEntry] {
        &self.heat
    }

    pub fn heat_number(&self) -> Option<u32> {
        self.heat_number
    }

    /// Number of updates applied so far.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}
