//! In-memory roster store.
//!
//! Owns every racer and heat record. The racer sequence is kept in ranking
//! order (active racers by rank, then inactive ones), so recompaction after
//! membership changes always starts from the current ranking.

use crate::error::RosterError;
use crate::model::{Heat, Racer, RacerFields, RacerId};
use crate::ranking::recompact;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterStore {
    pub(crate) racers: Vec<Racer>,
    pub(crate) heats: Vec<Heat>,
}

impl RosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously saved records.
    ///
    /// Saved records may come in any order; they are put back into ranking
    /// order so later recompaction starts from the saved ranks.
    pub fn from_parts(mut racers: Vec<Racer>, heats: Vec<Heat>) -> Self {
        racers.sort_by_key(|r| if r.active { (0, r.global_rank) } else { (1, 0) });
        Self { racers, heats }
    }

    // ─── Queries ──────────────────────────────────────────────────────

    /// Snapshot copy of all racers, in store order.
    pub fn list_all(&self) -> Vec<Racer> {
        self.racers.clone()
    }

    pub fn racers(&self) -> &[Racer] {
        &self.racers
    }

    pub fn racer(&self, id: &RacerId) -> Option<&Racer> {
        self.racers.iter().find(|r| r.id == *id)
    }

    pub fn heats(&self) -> &[Heat] {
        &self.heats
    }

    pub fn heat(&self, number: u32) -> Option<&Heat> {
        self.heats.iter().find(|h| h.number == number)
    }

    pub fn count_active(&self) -> usize {
        self.racers.iter().filter(|r| r.active).count()
    }

    pub fn len(&self) -> usize {
        self.racers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.racers.is_empty()
    }

    /// Number of the heat the racer is assigned to, if any.
    pub fn heat_number_of(&self, id: &RacerId) -> Option<u32> {
        let heat_id = self.racer(id)?.heat_id?;
        self.heats.iter().find(|h| h.id == heat_id).map(|h| h.number)
    }

    pub(crate) fn index_of(&self, id: &RacerId) -> Result<usize, RosterError> {
        self.racers
            .iter()
            .position(|r| r.id == *id)
            .ok_or(RosterError::RacerNotFound(*id))
    }

    // ─── Mutations ────────────────────────────────────────────────────

    /// Create an active racer ranked after every current active racer.
    pub fn add_racer(&mut self, fields: RacerFields) -> Result<Racer, RosterError> {
        fields.validate()?;
        let rank = self.count_active() as u32 + 1;
        let racer = Racer::new(fields, rank);
        let at = self.racers.iter().rposition(|r| r.active).map_or(0, |i| i + 1);
        self.racers.insert(at, racer.clone());
        log::debug!("Added racer {} ({}) at rank {rank}", racer.name, racer.id);
        Ok(racer)
    }

    /// Replace the display fields of a racer. Ranks are untouched.
    pub fn update_racer(
        &mut self,
        id: &RacerId,
        fields: RacerFields,
    ) -> Result<Racer, RosterError> {
        let index = self.index_of(id)?;
        fields.validate()?;
        let racer = &mut self.racers[index];
        racer.apply_fields(fields);
        Ok(racer.clone())
    }

    /// Delete a racer, scrub it from every heat, then recompact.
    pub fn remove_racer(&mut self, id: &RacerId) -> Result<Racer, RosterError> {
        let index = self.index_of(id)?;
        let removed = self.racers.remove(index);

        let touched: Vec<u32> = self
            .heats
            .iter_mut()
            .filter(|h| h.contains(id))
            .map(|h| {
                h.member_ids.retain(|m| m != id);
                h.number
            })
            .collect();
        for number in touched {
            self.repack_heat_ranks(number);
        }

        self.recompact();
        log::debug!("Removed racer {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    /// Set the active flag, then recompact.
    ///
    /// A reactivated racer lands at the end of the active order.
    pub fn set_active(&mut self, id: &RacerId, active: bool) -> Result<(), RosterError> {
        let index = self.index_of(id)?;
        self.racers[index].active = active;
        self.recompact();
        Ok(())
    }

    /// Flip the active flag and return the new value.
    pub fn toggle_active(&mut self, id: &RacerId) -> Result<bool, RosterError> {
        let index = self.index_of(id)?;
        let active = !self.racers[index].active;
        self.set_active(id, active)?;
        Ok(active)
    }

    fn recompact(&mut self) {
        let racers = std::mem::take(&mut self.racers);
        self.racers = recompact(racers);
    }

    /// Renumber heat ranks of a heat's members to `1..=k`, keeping their order.
    fn repack_heat_ranks(&mut self, number: u32) {
        let Some(heat) = self.heats.iter().find(|h| h.number == number) else {
            return;
        };
        let heat_id = heat.id;

        let mut members: Vec<&mut Racer> = self
            .racers
            .iter_mut()
            .filter(|r| r.heat_id == Some(heat_id))
            .collect();
        members.sort_by_key(|r| if r.heat_rank == 0 { u32::MAX } else { r.heat_rank });
        for (index, racer) in members.into_iter().enumerate() {
            racer.heat_rank = index as u32 + 1;
        }
    }
}
