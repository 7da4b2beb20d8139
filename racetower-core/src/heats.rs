//! Heat draw engine.
//!
//! A draw shuffles the active racers uniformly (Fisher–Yates via
//! `SliceRandom::shuffle`) and chunks them into heats of `heat_size`.
//! The draw is computed in full before the store is touched.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::RosterError;
use crate::model::{Heat, Racer, RacerId};
use crate::roster::RosterStore;

/// Default number of racers per heat.
pub const DEFAULT_HEAT_SIZE: usize = 4;

/// Result of a draw, ready to be applied to a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeatDraw {
    pub heats: Vec<Heat>,
}

impl HeatDraw {
    /// Total racers across all heats.
    pub fn member_count(&self) -> usize {
        self.heats.iter().map(Heat::len).sum()
    }
}

/// Partition the active racers into randomly drawn heats.
///
/// Returns `Ok(None)` when there are no active racers.
pub fn draw<R: Rng + ?Sized>(
    racers: &[Racer],
    heat_size: usize,
    rng: &mut R,
) -> Result<Option<HeatDraw>, RosterError> {
    if heat_size == 0 {
        return Err(RosterError::Validation { field: "heat_size" });
    }

    let mut selected: Vec<RacerId> = racers.iter().filter(|r| r.active).map(|r| r.id).collect();
    if selected.is_empty() {
        return Ok(None);
    }
    selected.shuffle(rng);

    let heats = selected
        .chunks(heat_size)
        .enumerate()
        .map(|(k, chunk)| Heat::new(k as u32 + 1, chunk.to_vec()))
        .collect();

    Ok(Some(HeatDraw { heats }))
}

impl RosterStore {
    /// Replace the heat set with `draw`.
    ///
    /// Members get `heat_rank = 1 + index` within their heat; everyone else
    /// is cleared. A draw whose heats are not numbered `1..=n`, that names an
    /// unknown racer, or that places a racer twice is rejected and the store
    /// is left as it was.
    pub fn apply_draw(&mut self, draw: HeatDraw) -> Result<(), RosterError> {
        self.check_draw(&draw)?;

        for racer in self.racers.iter_mut() {
            racer.clear_heat();
        }
        for heat in &draw.heats {
            for (index, member) in heat.member_ids.iter().enumerate() {
                if let Some(racer) = self.racers.iter_mut().find(|r| r.id == *member) {
                    racer.heat_id = Some(heat.id);
                    racer.heat_rank = index as u32 + 1;
                }
            }
        }
        log::info!(
            "Drew {} heats for {} racers",
            draw.heats.len(),
            draw.member_count()
        );
        self.heats = draw.heats;
        Ok(())
    }

    fn check_draw(&self, draw: &HeatDraw) -> Result<(), RosterError> {
        let mut heat_ids = HashSet::with_capacity(draw.heats.len());
        let mut placed = HashSet::with_capacity(draw.member_count());

        for (index, heat) in draw.heats.iter().enumerate() {
            let expected = index as u32 + 1;
            if heat.number != expected {
                return Err(RosterError::InvalidOrder(format!(
                    "heat {} drawn where heat {expected} was expected",
                    heat.number
                )));
            }
            if !heat_ids.insert(heat.id) {
                return Err(RosterError::InvalidOrder(format!(
                    "heat id {} is used twice",
                    heat.id
                )));
            }
            for member in &heat.member_ids {
                if self.racer(member).is_none() {
                    return Err(RosterError::RacerNotFound(*member));
                }
                if !placed.insert(*member) {
                    return Err(RosterError::InvalidOrder(format!(
                        "{member} is drawn into more than one heat"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Drop every heat and clear every racer's heat fields.
    pub fn reset_heats(&mut self) {
        self.heats.clear();
        for racer in self.racers.iter_mut() {
            racer.clear_heat();
        }
    }

    /// Flip a heat's `completed` flag and return the new value.
    pub fn toggle_completed(&mut self, number: u32) -> Result<bool, RosterError> {
        let heat = self
            .heats
            .iter_mut()
            .find(|h| h.number == number)
            .ok_or(RosterError::HeatNotFound(number))?;
        heat.completed = !heat.completed;
        Ok(heat.completed)
    }
}
