//! Session controller.
//!
//! `Session` owns the roster store, the current-heat pointer and the two
//! collaborators (publisher + snapshot store). Every mutation runs to
//! completion in one call:
//!
//! ```text
//! validate ─► commit to RosterStore ─► recompute projection(s)
//!                                          │
//!                                          ├─► PositionPublisher::publish
//!                                          └─► SnapshotStore::save
//! ```
//!
//! A failed validation returns `RosterError` and touches nothing. Publish and
//! save failures never undo a committed mutation; they are logged and handed
//! back in [`Committed::failures`].

use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use crate::error::RosterError;
use crate::heats::{self, DEFAULT_HEAT_SIZE};
use crate::model::{Heat, Racer, RacerFields, RacerId};
use crate::projection::{global_positions, heat_positions, PositionScope, PositionsUpdate};
use crate::ranking::RosterView;
use crate::reorder::ReorderScope;
use crate::roster::RosterStore;
use crate::snapshot::{RosterSnapshot, SnapshotError, SnapshotStore};

/// Errors from the fan-out transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Publish queue full, update dropped")]
    QueueFull,
    #[error("Publish channel closed")]
    Closed,
    #[error("Publish encode error: {0}")]
    Encode(String),
}

/// Fan-out collaborator. Must not block the caller.
pub trait PositionPublisher: Send + Sync {
    fn publish(&self, update: &PositionsUpdate) -> Result<(), PublishError>;
}

impl<P: PositionPublisher + ?Sized> PositionPublisher for Arc<P> {
    fn publish(&self, update: &PositionsUpdate) -> Result<(), PublishError> {
        (**self).publish(update)
    }
}

/// A side effect that failed after the mutation was committed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SideEffectError {
    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Outcome of a committed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub value: T,
    /// Publish/snapshot failures that happened after the commit.
    pub failures: Vec<SideEffectError>,
}

impl<T> Committed<T> {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Racers per heat for draws.
    pub heat_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { heat_size: DEFAULT_HEAT_SIZE }
    }
}

/// Single-writer controller for one roster.
pub struct Session<P, S> {
    config: SessionConfig,
    store: RosterStore,
    current_heat: Option<u32>,
    publisher: P,
    snapshots: S,
}

impl<P: PositionPublisher, S: SnapshotStore> Session<P, S> {
    /// Start with an empty roster.
    pub fn new(config: SessionConfig, publisher: P, snapshots: S) -> Self {
        Self {
            config,
            store: RosterStore::new(),
            current_heat: None,
            publisher,
            snapshots,
        }
    }

    /// Start from the last saved snapshot, or empty if there is none.
    ///
    /// A snapshot that fails to load is logged and ignored.
    pub fn open(config: SessionConfig, publisher: P, snapshots: S) -> Self {
        let mut session = Self::new(config, publisher, snapshots);
        match session.snapshots.load() {
            Ok(Some(snapshot)) => {
                log::info!(
                    "Restored {} racers and {} heats from snapshot",
                    snapshot.roster.len(),
                    snapshot.heats.len()
                );
                session.store = RosterStore::from_parts(snapshot.roster, snapshot.heats);
                session.current_heat = snapshot.current_heat;
            }
            Ok(None) => log::debug!("No snapshot found, starting empty"),
            Err(e) => log::warn!("Ignoring unreadable snapshot: {e}"),
        }
        session
    }

    // ─── Queries ──────────────────────────────────────────────────────

    pub fn store(&self) -> &RosterStore {
        &self.store
    }

    pub fn racers(&self) -> Vec<Racer> {
        self.store.list_all()
    }

    pub fn heats(&self) -> &[Heat] {
        self.store.heats()
    }

    pub fn current_heat(&self) -> Option<u32> {
        self.current_heat
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Filtered, display-ordered copy of the roster.
    pub fn view(&self, view: &RosterView) -> Vec<Racer> {
        view.apply(self.store.racers())
    }

    pub fn global_positions(&self) -> PositionsUpdate {
        global_positions(&self.store)
    }

    pub fn heat_positions(&self) -> PositionsUpdate {
        heat_positions(&self.store, self.current_heat)
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            roster: self.store.list_all(),
            heats: self.store.heats().to_vec(),
            current_heat: self.current_heat,
        }
    }

    // ─── Roster ───────────────────────────────────────────────────────

    pub fn add_racer(&mut self, fields: RacerFields) -> Result<Committed<Racer>, RosterError> {
        let racer = self.store.add_racer(fields)?;
        Ok(self.commit(racer, &[PositionScope::Global]))
    }

    pub fn update_racer(
        &mut self,
        id: &RacerId,
        fields: RacerFields,
    ) -> Result<Committed<Racer>, RosterError> {
        let in_current = self.in_current_heat(id);
        let racer = self.store.update_racer(id, fields)?;
        let scopes = self.scopes_for_racer(in_current);
        Ok(self.commit(racer, &scopes))
    }

    pub fn remove_racer(&mut self, id: &RacerId) -> Result<Committed<Racer>, RosterError> {
        let in_current = self.in_current_heat(id);
        let racer = self.store.remove_racer(id)?;
        let scopes = self.scopes_for_racer(in_current);
        Ok(self.commit(racer, &scopes))
    }

    pub fn set_active(&mut self, id: &RacerId, active: bool) -> Result<Committed<()>, RosterError> {
        self.store.set_active(id, active)?;
        Ok(self.commit((), &[PositionScope::Global]))
    }

    pub fn toggle_active(&mut self, id: &RacerId) -> Result<Committed<bool>, RosterError> {
        let active = self.store.toggle_active(id)?;
        Ok(self.commit(active, &[PositionScope::Global]))
    }

    // ─── Reorder ──────────────────────────────────────────────────────

    /// Apply a manual order to `scope` and publish the resulting positions.
    pub fn reorder(
        &mut self,
        scope: ReorderScope,
        order: &[RacerId],
    ) -> Result<Committed<PositionsUpdate>, RosterError> {
        let update = match scope {
            ReorderScope::Global => self.store.reorder_global(order)?,
            ReorderScope::CurrentHeat => {
                let number = self
                    .current_heat
                    .ok_or_else(|| RosterError::InvalidOrder("no current heat selected".into()))?;
                self.store.reorder_heat(number, order)?
            }
        };

        let mut failures = Vec::new();
        self.publish_update(&update, &mut failures);
        self.save_snapshot(&mut failures);
        Ok(Committed { value: update, failures })
    }

    // ─── Heats ────────────────────────────────────────────────────────

    /// Draw heats from the active racers using the thread RNG.
    pub fn draw_heats(&mut self) -> Result<Committed<Vec<Heat>>, RosterError> {
        self.draw_heats_with(&mut rand::thread_rng())
    }

    /// Draw heats using the given RNG.
    ///
    /// With no active racers nothing changes and nothing is published.
    pub fn draw_heats_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<Committed<Vec<Heat>>, RosterError> {
        let Some(draw) = heats::draw(self.store.racers(), self.config.heat_size, rng)? else {
            log::debug!("Draw skipped: no active racers");
            return Ok(Committed { value: Vec::new(), failures: Vec::new() });
        };

        self.store.apply_draw(draw)?;
        let current_is_valid = self
            .current_heat
            .is_some_and(|n| self.store.heat(n).is_some());
        if !current_is_valid {
            self.current_heat = Some(1);
        }

        let heats = self.store.heats().to_vec();
        Ok(self.commit(heats, &[PositionScope::Heat { number: self.current_heat }]))
    }

    pub fn reset_heats(&mut self) -> Committed<()> {
        self.store.reset_heats();
        self.current_heat = None;
        log::info!("Heats reset");
        self.commit((), &[PositionScope::Heat { number: None }])
    }

    pub fn toggle_heat_completed(&mut self, number: u32) -> Result<Committed<bool>, RosterError> {
        let completed = self.store.toggle_completed(number)?;
        Ok(self.commit(completed, &[]))
    }

    /// Make heat `number` the one subject to live reordering.
    pub fn select_heat(&mut self, number: u32) -> Result<Committed<()>, RosterError> {
        if self.store.heat(number).is_none() {
            return Err(RosterError::HeatNotFound(number));
        }
        self.current_heat = Some(number);
        Ok(self.commit((), &[PositionScope::Heat { number: Some(number) }]))
    }

    /// Publish both scopes again, e.g. after a viewer reconnects.
    pub fn resync(&self) -> Vec<SideEffectError> {
        let mut failures = Vec::new();
        self.publish_update(&self.global_positions(), &mut failures);
        self.publish_update(&self.heat_positions(), &mut failures);
        failures
    }

    // ─── Side effects ─────────────────────────────────────────────────

    fn in_current_heat(&self, id: &RacerId) -> bool {
        self.current_heat.is_some() && self.store.heat_number_of(id) == self.current_heat
    }

    fn scopes_for_racer(&self, in_current: bool) -> Vec<PositionScope> {
        let mut scopes = vec![PositionScope::Global];
        if in_current {
            scopes.push(PositionScope::Heat { number: self.current_heat });
        }
        scopes
    }

    fn commit<T>(&self, value: T, scopes: &[PositionScope]) -> Committed<T> {
        let mut failures = Vec::new();
        for scope in scopes {
            let update = match scope {
                PositionScope::Global => self.global_positions(),
                PositionScope::Heat { .. } => self.heat_positions(),
            };
            self.publish_update(&update, &mut failures);
        }
        self.save_snapshot(&mut failures);
        Committed { value, failures }
    }

    fn publish_update(&self, update: &PositionsUpdate, failures: &mut Vec<SideEffectError>) {
        if let Err(e) = self.publisher.publish(update) {
            log::warn!("Failed to publish {:?} positions: {e}", update.scope);
            failures.push(e.into());
        }
    }

    fn save_snapshot(&self, failures: &mut Vec<SideEffectError>) {
        if let Err(e) = self.snapshots.save(&self.snapshot()) {
            log::warn!("Failed to save roster snapshot: {e}");
            failures.push(e.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::projection::PositionBoard;
    use crate::snapshot::MemorySnapshotStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingPublisher {
        updates: Mutex<Vec<PositionsUpdate>>,
    }

    impl RecordingPublisher {
        fn take(&self) -> Vec<PositionsUpdate> {
            std::mem::take(&mut *self.updates.lock().unwrap())
        }
    }

    impl PositionPublisher for RecordingPublisher {
        fn publish(&self, update: &PositionsUpdate) -> Result<(), PublishError> {
            self.updates.lock().unwrap().push(update.clone());
            Ok(())
        }
    }

    struct ClosedPublisher;

    impl PositionPublisher for ClosedPublisher {
        fn publish(&self, _update: &PositionsUpdate) -> Result<(), PublishError> {
            Err(PublishError::Closed)
        }
    }

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn load(&self) -> Result<Option<RosterSnapshot>, SnapshotError> {
            Err(SnapshotError::Backend("disk gone".into()))
        }

        fn save(&self, _snapshot: &RosterSnapshot) -> Result<(), SnapshotError> {
            Err(SnapshotError::Backend("disk gone".into()))
        }
    }

    type TestSession = Session<Arc<RecordingPublisher>, Arc<MemorySnapshotStore>>;

    fn session() -> (TestSession, Arc<RecordingPublisher>, Arc<MemorySnapshotStore>) {
        let publisher = Arc::new(RecordingPublisher::default());
        let store = Arc::new(MemorySnapshotStore::new());
        let session = Session::new(SessionConfig::default(), publisher.clone(), store.clone());
        (session, publisher, store)
    }

    fn add(session: &mut TestSession, name: &str) -> RacerId {
        session.add_racer(RacerFields::new(name)).unwrap().value.id
    }

    fn rank(session: &TestSession, id: &RacerId) -> u32 {
        session.store().racer(id).unwrap().global_rank
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (mut s, _, _) = session();
        let ids: Vec<RacerId> = ["A", "B", "C", "D", "E"].iter().map(|n| add(&mut s, n)).collect();
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(rank(&s, id), i as u32 + 1);
        }

        s.set_active(&c, false).unwrap();
        assert_eq!(
            [a, b, d, e, c].map(|id| rank(&s, &id)),
            [1, 2, 3, 4, 0]
        );

        let mut rng = StdRng::seed_from_u64(11);
        let heats = s.draw_heats_with(&mut rng).unwrap().value;
        assert_eq!(heats.len(), 1);
        let heat = &heats[0];
        assert_eq!(heat.number, 1);
        assert!(!heat.completed);
        assert_eq!(heat.len(), 4);
        assert!(!heat.contains(&c));
        for (i, id) in heat.member_ids.iter().enumerate() {
            assert_eq!(s.store().racer(id).unwrap().heat_rank, i as u32 + 1);
        }
        assert_eq!(s.current_heat(), Some(1));
    }

    #[test]
    fn test_reorder_scenario_publishes_new_order() {
        let (mut s, publisher, _) = session();
        let ids: Vec<RacerId> = ["A", "B", "C", "D", "E"].iter().map(|n| add(&mut s, n)).collect();
        let (a, b, c, d, e) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        s.set_active(&c, false).unwrap();
        publisher.take();

        let update = s.reorder(ReorderScope::Global, &[e, a, b, d]).unwrap().value;
        assert_eq!([e, a, b, d, c].map(|id| rank(&s, &id)), [1, 2, 3, 4, 0]);

        let published = publisher.take();
        assert_eq!(published, vec![update]);
        assert_eq!(published[0].ids(), vec![e, a, b, d]);
    }

    #[test]
    fn test_invalid_reorder_changes_nothing() {
        let (mut s, publisher, _) = session();
        let a = add(&mut s, "A");
        let b = add(&mut s, "B");
        let before = s.snapshot();
        publisher.take();

        let err = s.reorder(ReorderScope::Global, &[b]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOrder);
        let err = s.reorder(ReorderScope::Global, &[b, a, uuid::Uuid::new_v4()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOrder);

        assert_eq!(s.snapshot(), before);
        assert!(publisher.take().is_empty());
    }

    #[test]
    fn test_heat_reorder_requires_current_heat() {
        let (mut s, _, _) = session();
        let a = add(&mut s, "A");
        let err = s.reorder(ReorderScope::CurrentHeat, &[a]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOrder);
    }

    #[test]
    fn test_heat_reorder_and_selection() {
        let (mut s, publisher, _) = session();
        for i in 0..6 {
            add(&mut s, &format!("R{i}"));
        }
        let mut rng = StdRng::seed_from_u64(3);
        s.draw_heats_with(&mut rng).unwrap();
        assert_eq!(s.heats().len(), 2);

        s.select_heat(2).unwrap();
        assert_eq!(s.current_heat(), Some(2));
        let mut order = s.heats()[1].member_ids.clone();
        order.reverse();
        publisher.take();

        let update = s.reorder(ReorderScope::CurrentHeat, &order).unwrap().value;
        assert_eq!(update.scope, PositionScope::Heat { number: Some(2) });
        assert_eq!(update.ids(), order);
        assert_eq!(publisher.take(), vec![update]);

        // heat 1 untouched
        for (i, id) in s.heats()[0].member_ids.iter().enumerate() {
            assert_eq!(s.store().racer(id).unwrap().heat_rank, i as u32 + 1);
        }

        assert_eq!(s.select_heat(5).unwrap_err(), RosterError::HeatNotFound(5));
        assert_eq!(s.current_heat(), Some(2));
    }

    #[test]
    fn test_redraw_keeps_valid_current_heat() {
        let (mut s, _, _) = session();
        for i in 0..8 {
            add(&mut s, &format!("R{i}"));
        }
        let mut rng = StdRng::seed_from_u64(5);
        s.draw_heats_with(&mut rng).unwrap();
        s.select_heat(2).unwrap();
        s.draw_heats_with(&mut rng).unwrap();
        assert_eq!(s.current_heat(), Some(2));

        // shrink to one heat: pointer falls back to 1
        let ids: Vec<RacerId> = s.racers().iter().map(|r| r.id).collect();
        for id in &ids[..5] {
            s.set_active(id, false).unwrap();
        }
        s.draw_heats_with(&mut rng).unwrap();
        assert_eq!(s.heats().len(), 1);
        assert_eq!(s.current_heat(), Some(1));
    }

    #[test]
    fn test_draw_without_active_is_noop() {
        let (mut s, publisher, _) = session();
        let a = add(&mut s, "A");
        s.set_active(&a, false).unwrap();
        publisher.take();

        let drawn = s.draw_heats().unwrap();
        assert!(drawn.value.is_empty());
        assert!(s.heats().is_empty());
        assert_eq!(s.current_heat(), None);
        assert!(publisher.take().is_empty());
    }

    #[test]
    fn test_reset_clears_heats_and_pointer() {
        let (mut s, publisher, _) = session();
        for i in 0..5 {
            add(&mut s, &format!("R{i}"));
        }
        s.draw_heats().unwrap();
        s.toggle_heat_completed(1).unwrap();
        publisher.take();

        let reset = s.reset_heats();
        assert!(reset.is_clean());
        assert!(s.heats().is_empty());
        assert_eq!(s.current_heat(), None);
        assert!(s.racers().iter().all(|r| r.heat_id.is_none() && r.heat_rank == 0));

        let published = publisher.take();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].scope, PositionScope::Heat { number: None });
        assert!(published[0].entries.is_empty());
    }

    #[test]
    fn test_toggle_completed_does_not_publish() {
        let (mut s, publisher, _) = session();
        add(&mut s, "A");
        s.draw_heats().unwrap();
        publisher.take();

        assert!(s.toggle_heat_completed(1).unwrap().value);
        assert!(publisher.take().is_empty());
        assert_eq!(s.toggle_heat_completed(4).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_in_current_heat_publishes_both_scopes() {
        let (mut s, publisher, _) = session();
        let a = add(&mut s, "A");
        add(&mut s, "B");
        s.draw_heats().unwrap();
        publisher.take();

        s.remove_racer(&a).unwrap();
        let published = publisher.take();
        let scopes: Vec<PositionScope> = published.iter().map(|u| u.scope).collect();
        assert_eq!(scopes, vec![PositionScope::Global, PositionScope::Heat { number: Some(1) }]);
        assert_eq!(published[1].entries.len(), 1);
        assert_eq!(published[1].entries[0].rank, 1);
    }

    #[test]
    fn test_mutations_publish_global() {
        let (mut s, publisher, _) = session();
        let a = add(&mut s, "A");
        add(&mut s, "B");
        s.toggle_active(&a).unwrap();
        s.update_racer(&a, RacerFields::new("Alpha")).unwrap();

        let published = publisher.take();
        assert_eq!(published.len(), 4);
        assert!(published.iter().all(|u| u.scope == PositionScope::Global));
        assert_eq!(published[2].entries.len(), 1);
    }

    #[test]
    fn test_failed_mutation_publishes_nothing() {
        let (mut s, publisher, store) = session();
        assert!(s.add_racer(RacerFields::new("")).is_err());
        assert!(s.set_active(&uuid::Uuid::new_v4(), false).is_err());
        assert!(publisher.take().is_empty());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_snapshot_saved_and_reopened() {
        let (mut s, _, store) = session();
        let a = add(&mut s, "A");
        let b = add(&mut s, "B");
        s.reorder(ReorderScope::Global, &[b, a]).unwrap();
        s.draw_heats().unwrap();
        let expected = s.snapshot();

        assert_eq!(store.load().unwrap(), Some(expected.clone()));

        let reopened =
            Session::open(SessionConfig::default(), RecordingPublisher::default(), store);
        assert_eq!(reopened.snapshot(), expected);
        assert_eq!(reopened.current_heat(), Some(1));
    }

    #[test]
    fn test_open_restores_saved_ranking_order() {
        let (mut s, _, store) = session();
        let a = add(&mut s, "A");
        let b = add(&mut s, "B");
        let c = add(&mut s, "C");
        s.reorder(ReorderScope::Global, &[b, a, c]).unwrap();

        // Records saved in insertion order rather than ranking order
        let mut saved = s.snapshot();
        saved.roster.sort_by_key(|r| [a, b, c].iter().position(|id| *id == r.id));
        store.save(&saved).unwrap();

        let mut reopened =
            Session::open(SessionConfig::default(), RecordingPublisher::default(), store);
        reopened.set_active(&c, false).unwrap();
        let ranks: Vec<(RacerId, u32)> = reopened
            .racers()
            .iter()
            .map(|r| (r.id, r.global_rank))
            .collect();
        assert_eq!(ranks, vec![(b, 1), (a, 2), (c, 0)]);
    }

    #[test]
    fn test_open_ignores_unreadable_snapshot() {
        let s = Session::open(SessionConfig::default(), RecordingPublisher::default(), BrokenStore);
        assert!(s.racers().is_empty());
    }

    #[test]
    fn test_side_effect_failures_do_not_roll_back() {
        let mut s = Session::new(SessionConfig::default(), ClosedPublisher, BrokenStore);
        let committed = s.add_racer(RacerFields::new("A")).unwrap();
        assert!(!committed.is_clean());
        assert_eq!(
            committed.failures,
            vec![
                SideEffectError::Publish(PublishError::Closed),
                SideEffectError::Snapshot(SnapshotError::Backend("disk gone".into())),
            ]
        );
        assert_eq!(s.racers().len(), 1);
        assert_eq!(committed.value.global_rank, 1);
    }

    #[test]
    fn test_board_follows_session() {
        let (mut s, publisher, _) = session();
        let a = add(&mut s, "A");
        let b = add(&mut s, "B");
        s.reorder(ReorderScope::Global, &[b, a]).unwrap();

        let mut board = PositionBoard::new();
        for update in publisher.take() {
            board.apply(update);
        }
        let ids: Vec<RacerId> = board.global().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b, a]);
    }

    #[test]
    fn test_resync_publishes_both_scopes() {
        let (mut s, publisher, _) = session();
        add(&mut s, "A");
        publisher.take();
        assert!(s.resync().is_empty());
        assert_eq!(publisher.take().len(), 2);
    }

    #[test]
    fn test_random_operations_keep_ranks_contiguous() {
        let (mut s, _, _) = session();
        let mut rng = StdRng::seed_from_u64(2024);
        for step in 0..300 {
            let ids: Vec<RacerId> = s.racers().iter().map(|r| r.id).collect();
            match rng.gen_range(0..5) {
                0 | 1 => {
                    s.add_racer(RacerFields::new(format!("R{step}"))).unwrap();
                }
                2 if !ids.is_empty() => {
                    let id = ids[rng.gen_range(0..ids.len())];
                    s.remove_racer(&id).unwrap();
                }
                3 if !ids.is_empty() => {
                    let id = ids[rng.gen_range(0..ids.len())];
                    s.set_active(&id, rng.gen_bool(0.5)).unwrap();
                }
                4 => {
                    s.draw_heats_with(&mut rng).unwrap();
                }
                _ => {}
            }

            let racers = s.racers();
            let mut ranks: Vec<u32> =
                racers.iter().filter(|r| r.active).map(|r| r.global_rank).collect();
            ranks.sort_unstable();
            let expected: Vec<u32> = (1..=ranks.len() as u32).collect();
            assert_eq!(ranks, expected, "step {step}");
            assert!(racers.iter().filter(|r| !r.active).all(|r| r.global_rank == 0));

            for racer in racers.iter().filter(|r| r.heat_id.is_some()) {
                let heat = s.heats().iter().find(|h| Some(h.id) == racer.heat_id).unwrap();
                assert!(heat.contains(&racer.id));
            }
        }
    }
}
