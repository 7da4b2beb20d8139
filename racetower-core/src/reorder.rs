//! Manual reorder handling.
//!
//! A reorder carries the complete new order of one scope. It must be an exact
//! permutation of the ids currently in that scope; anything else is rejected
//! before the store is modified.

use std::collections::{HashMap, HashSet};

use crate::error::RosterError;
use crate::model::{Racer, RacerId};
use crate::projection::{global_positions, heat_positions, PositionsUpdate};
use crate::roster::RosterStore;

/// Target of a manual reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderScope {
    /// All active racers.
    Global,
    /// Members of the currently selected heat.
    CurrentHeat,
}

/// Check that `given` is a permutation of `expected`.
pub fn validate_permutation(expected: &[RacerId], given: &[RacerId]) -> Result<(), RosterError> {
    let expected_set: HashSet<&RacerId> = expected.iter().collect();
    let mut seen = HashSet::with_capacity(given.len());

    for id in given {
        if !expected_set.contains(id) {
            return Err(RosterError::InvalidOrder(format!("{id} is not in scope")));
        }
        if !seen.insert(id) {
            return Err(RosterError::InvalidOrder(format!("{id} appears more than once")));
        }
    }
    if let Some(missing) = expected.iter().find(|id| !seen.contains(id)) {
        return Err(RosterError::InvalidOrder(format!("{missing} is missing")));
    }
    Ok(())
}

impl RosterStore {
    /// Assign `global_rank = index + 1` in the given order.
    ///
    /// `order` must list every active racer exactly once. Inactive racers keep
    /// rank 0 and their place after the active block.
    pub fn reorder_global(
        &mut self,
        order: &[RacerId],
    ) -> Result<PositionsUpdate, RosterError> {
        let expected: Vec<RacerId> =
            self.racers.iter().filter(|r| r.active).map(|r| r.id).collect();
        validate_permutation(&expected, order)?;

        let (active, inactive): (Vec<Racer>, Vec<Racer>) =
            std::mem::take(&mut self.racers).into_iter().partition(|r| r.active);
        let mut by_id: HashMap<RacerId, Racer> = active.into_iter().map(|r| (r.id, r)).collect();

        let mut reordered = Vec::with_capacity(order.len() + inactive.len());
        for (index, id) in order.iter().enumerate() {
            if let Some(mut racer) = by_id.remove(id) {
                racer.global_rank = index as u32 + 1;
                reordered.push(racer);
            }
        }
        reordered.extend(inactive);
        self.racers = reordered;

        Ok(global_positions(self))
    }

    /// Assign `heat_rank = index + 1` within heat `number`.
    pub fn reorder_heat(
        &mut self,
        number: u32,
        order: &[RacerId],
    ) -> Result<PositionsUpdate, RosterError> {
        let heat = self
            .heat(number)
            .ok_or_else(|| RosterError::InvalidOrder(format!("heat {number} does not exist")))?;
        validate_permutation(&heat.member_ids, order)?;

        let ranks: HashMap<&RacerId, u32> = order
            .iter()
            .enumerate()
            .map(|(index, id)| (id, index as u32 + 1))
            .collect();
        for racer in self.racers.iter_mut() {
            if let Some(rank) = ranks.get(&racer.id) {
                racer.heat_rank = *rank;
            }
        }

        Ok(heat_positions(self, Some(number)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heats::HeatDraw;
    use crate::model::{Heat, RacerFields};
    use crate::error::ErrorKind;

    fn store_with(names: &[&str]) -> (RosterStore, Vec<RacerId>) {
        let mut store = RosterStore::new();
        let ids = names
            .iter()
            .map(|n| store.add_racer(RacerFields::new(*n)).unwrap().id)
            .collect();
        (store, ids)
    }

    fn rank(store: &RosterStore, id: &RacerId) -> u32 {
        store.racer(id).unwrap().global_rank
    }

    #[test]
    fn test_validate_permutation() {
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        let c = uuid::Uuid::new_v4();
        assert!(validate_permutation(&[a, b], &[b, a]).is_ok());
        assert!(validate_permutation(&[], &[]).is_ok());
        assert!(validate_permutation(&[a, b], &[a]).is_err());
        assert!(validate_permutation(&[a, b], &[a, b, c]).is_err());
        assert!(validate_permutation(&[a, b], &[a, a]).is_err());
        assert!(validate_permutation(&[a, b], &[a, c]).is_err());
    }

    #[test]
    fn test_reorder_global_scenario() {
        let (mut store, ids) = store_with(&["A", "B", "C", "D", "E"]);
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        store.set_active(&c, false).unwrap();

        let update = store.reorder_global(&[e, a, b, d]).unwrap();

        assert_eq!(rank(&store, &e), 1);
        assert_eq!(rank(&store, &a), 2);
        assert_eq!(rank(&store, &b), 3);
        assert_eq!(rank(&store, &d), 4);
        assert_eq!(rank(&store, &c), 0);
        assert_eq!(update.ids(), vec![e, a, b, d]);
        let ranks: Vec<u32> = update.entries.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_reorder_survives_later_recompaction() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        store.reorder_global(&[ids[2], ids[0], ids[1]]).unwrap();
        store.add_racer(RacerFields::new("D")).unwrap();
        store.remove_racer(&ids[0]).unwrap();
        assert_eq!(rank(&store, &ids[2]), 1);
        assert_eq!(rank(&store, &ids[1]), 2);
    }

    #[test]
    fn test_reorder_global_keeps_heat_fields() {
        let (mut store, ids) = store_with(&["A", "B", "C", "D", "E"]);
        let h1 = Heat::new(1, vec![ids[3], ids[0], ids[4]]);
        let h2 = Heat::new(2, vec![ids[1], ids[2]]);
        store.apply_draw(HeatDraw { heats: vec![h1, h2] }).unwrap();
        let heat_fields = |store: &RosterStore| -> Vec<(RacerId, Option<uuid::Uuid>, u32)> {
            let mut fields: Vec<_> = store
                .racers()
                .iter()
                .map(|r| (r.id, r.heat_id, r.heat_rank))
                .collect();
            fields.sort_by_key(|(id, _, _)| *id);
            fields
        };
        let before = heat_fields(&store);
        let heats_before = store.heats().to_vec();

        store.reorder_global(&[ids[4], ids[2], ids[0], ids[3], ids[1]]).unwrap();

        assert_eq!(rank(&store, &ids[4]), 1);
        assert_eq!(rank(&store, &ids[1]), 5);
        assert_eq!(heat_fields(&store), before);
        assert_eq!(store.heats(), heats_before.as_slice());
        assert_eq!(store.racer(&ids[3]).unwrap().heat_rank, 1);
        assert_eq!(store.racer(&ids[2]).unwrap().heat_rank, 2);
    }

    #[test]
    fn test_reorder_global_rejects_bad_input() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        store.set_active(&ids[2], false).unwrap();
        let before = store.clone();

        let missing = store.reorder_global(&[ids[1]]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::InvalidOrder);

        let stranger = uuid::Uuid::new_v4();
        let unknown = store.reorder_global(&[ids[1], ids[0], stranger]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::InvalidOrder);

        // inactive racer is out of scope
        let inactive = store.reorder_global(&[ids[1], ids[0], ids[2]]).unwrap_err();
        assert_eq!(inactive.kind(), ErrorKind::InvalidOrder);

        assert_eq!(store, before);
    }

    #[test]
    fn test_reorder_heat() {
        let (mut store, ids) = store_with(&["A", "B", "C", "D", "E"]);
        let h1 = Heat::new(1, vec![ids[0], ids[1], ids[2]]);
        let h2 = Heat::new(2, vec![ids[3], ids[4]]);
        store.apply_draw(HeatDraw { heats: vec![h1, h2] }).unwrap();

        let update = store.reorder_heat(1, &[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(update.ids(), vec![ids[2], ids[0], ids[1]]);
        assert_eq!(store.racer(&ids[2]).unwrap().heat_rank, 1);
        assert_eq!(store.racer(&ids[0]).unwrap().heat_rank, 2);
        assert_eq!(store.racer(&ids[1]).unwrap().heat_rank, 3);
        // other heat untouched
        assert_eq!(store.racer(&ids[3]).unwrap().heat_rank, 1);
        assert_eq!(store.racer(&ids[4]).unwrap().heat_rank, 2);
        // global ranks untouched
        assert_eq!(rank(&store, &ids[0]), 1);
        // draw order is kept on the heat itself
        assert_eq!(store.heat(1).unwrap().member_ids, vec![ids[0], ids[1], ids[2]]);
    }

    #[test]
    fn test_reorder_heat_rejects_other_heat_members() {
        let (mut store, ids) = store_with(&["A", "B", "C"]);
        let h1 = Heat::new(1, vec![ids[0], ids[1]]);
        let h2 = Heat::new(2, vec![ids[2]]);
        store.apply_draw(HeatDraw { heats: vec![h1, h2] }).unwrap();
        let before = store.clone();

        assert!(store.reorder_heat(1, &[ids[0], ids[2]]).is_err());
        assert!(store.reorder_heat(3, &[]).is_err());
        assert_eq!(store, before);
    }

    #[test]
    fn test_stale_heat_reorder_after_removal() {
        let (mut store, ids) = store_with(&["A", "B"]);
        let heat = Heat::new(1, vec![ids[0], ids[1]]);
        store.apply_draw(HeatDraw { heats: vec![heat] }).unwrap();
        store.remove_racer(&ids[0]).unwrap();

        let err = store.reorder_heat(1, &[ids[1], ids[0]]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOrder);
        assert!(store.reorder_heat(1, &[ids[1]]).is_ok());
    }
}
