//! Racer and heat records.
//!
//! Serialized field names follow the snapshot format (`globalRank`,
//! `heatId`, `memberIds`, ...), so the same structs are used for the
//! persisted `roster` / `heats` slots.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RosterError;

/// Racer identifier (opaque, assigned at creation).
pub type RacerId = Uuid;

/// Heat identifier.
pub type HeatId = Uuid;

/// Default racer color (F1 red).
pub const DEFAULT_COLOR: &str = "#ff1801";

/// Mutable display fields of a racer, used by create and edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RacerFields {
    pub name: String,
    pub number: String,
    pub team: String,
    pub city: String,
    pub color: String,
}

impl RacerFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn number(mut self, number: impl Into<String>) -> Self {
        self.number = number.into();
        self
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = team.into();
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// Reject an empty (or whitespace-only) name.
    pub fn validate(&self) -> Result<(), RosterError> {
        if self.name.trim().is_empty() {
            return Err(RosterError::Validation { field: "name" });
        }
        Ok(())
    }
}

impl Default for RacerFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            number: String::new(),
            team: String::new(),
            city: String::new(),
            color: DEFAULT_COLOR.to_string(),
        }
    }
}

/// A competitor tracked by the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Racer {
    pub id: RacerId,
    pub name: String,
    pub number: String,
    pub team: String,
    pub city: String,
    pub color: String,
    pub active: bool,
    /// Position among active racers; 0 = unranked (inactive).
    pub global_rank: u32,
    pub heat_id: Option<HeatId>,
    /// Position within `heat_id`; 0 = unranked.
    pub heat_rank: u32,
}

impl Racer {
    /// Build a fresh active racer with the given rank and no heat.
    pub(crate) fn new(fields: RacerFields, global_rank: u32) -> Self {
        let RacerFields { name, number, team, city, color } = fields;
        Self {
            id: Uuid::new_v4(),
            name,
            number,
            team,
            city,
            color,
            active: true,
            global_rank,
            heat_id: None,
            heat_rank: 0,
        }
    }

    /// Replace the display fields, leaving rank and heat fields alone.
    pub(crate) fn apply_fields(&mut self, fields: RacerFields) {
        self.name = fields.name;
        self.number = fields.number;
        self.team = fields.team;
        self.city = fields.city;
        self.color = fields.color;
    }

    pub(crate) fn clear_heat(&mut self) {
        self.heat_id = None;
        self.heat_rank = 0;
    }

    pub fn fields(&self) -> RacerFields {
        RacerFields {
            name: self.name.clone(),
            number: self.number.clone(),
            team: self.team.clone(),
            city: self.city.clone(),
            color: self.color.clone(),
        }
    }
}

/// A sub-group ("manga") produced by a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heat {
    pub id: HeatId,
    /// 1-based, sequential within one draw.
    pub number: u32,
    /// Members in draw order (not necessarily current heat rank order).
    pub member_ids: Vec<RacerId>,
    pub completed: bool,
}

impl Heat {
    pub fn new(number: u32, member_ids: Vec<RacerId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            number,
            member_ids,
            completed: false,
        }
    }

    pub fn contains(&self, racer_id: &RacerId) -> bool {
        self.member_ids.contains(racer_id)
    }

    pub fn len(&self) -> usize {
        self.member_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.member_ids.is_empty()
    }
}
