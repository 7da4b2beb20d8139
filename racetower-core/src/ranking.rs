//! Position recalculation and display ordering.
//!
//! `recompact` is the only place global ranks are derived from membership;
//! manual reorders assign ranks directly (see `reorder`).

use std::cmp::Ordering;

use crate::model::Racer;

/// Reassign contiguous global ranks.
///
/// Active racers keep their relative order and get `1..=n`; inactive racers
/// get 0 and move after the active block. Only `global_rank` changes.
pub fn recompact(racers: Vec<Racer>) -> Vec<Racer> {
    let (mut active, mut inactive): (Vec<Racer>, Vec<Racer>) =
        racers.into_iter().partition(|r| r.active);

    for (index, racer) in active.iter_mut().enumerate() {
        racer.global_rank = index as u32 + 1;
    }
    for racer in inactive.iter_mut() {
        racer.global_rank = 0;
    }

    active.extend(inactive);
    active
}

/// Display ordering for the "all racers" view.
///
/// Ranked racers first by ascending rank; unranked racers (rank 0) last,
/// ordered by name.
pub fn display_cmp(a: &Racer, b: &Racer) -> Ordering {
    match (a.global_rank, b.global_rank) {
        (0, 0) => a.name.cmp(&b.name),
        (0, _) => Ordering::Greater,
        (_, 0) => Ordering::Less,
        (ra, rb) => ra.cmp(&rb),
    }
}

/// Sorted copy of `racers` under [`display_cmp`].
pub fn display_order(racers: &[Racer]) -> Vec<Racer> {
    let mut sorted = racers.to_vec();
    sorted.sort_by(display_cmp);
    sorted
}

/// Status filter for the roster view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RosterFilter {
    #[default]
    All,
    Active,
    Inactive,
}

impl RosterFilter {
    pub fn matches(&self, racer: &Racer) -> bool {
        match self {
            Self::All => true,
            Self::Active => racer.active,
            Self::Inactive => !racer.active,
        }
    }
}

/// Read-only projection of the roster: status filter, number search, then
/// display ordering.
#[derive(Debug, Clone, Default)]
pub struct RosterView {
    pub filter: RosterFilter,
    /// Case-insensitive substring match on the racer number; empty matches all.
    pub number_query: String,
}

impl RosterView {
    pub fn new(filter: RosterFilter, number_query: impl Into<String>) -> Self {
        Self {
            filter,
            number_query: number_query.into(),
        }
    }

    pub fn apply(&self, racers: &[Racer]) -> Vec<Racer> {
        let query = self.number_query.to_lowercase();
        let mut view: Vec<Racer> = racers
            .iter()
            .filter(|r| self.filter.matches(r))
            .filter(|r| query.is_empty() || r.number.to_lowercase().contains(&query))
            .cloned()
            .collect();
        view.sort_by(display_cmp);
        view
    }
}
