//! # racetower-core: roster and position consistency engine
//!
//! Keeps racers' global ranks and heat ranks consistent through adds,
//! removals, activation changes, manual reorders and random heat draws, and
//! hands every resulting order to a publisher.
//!
//! ## Architecture
//!
//! ```text
//!  Reorder input ──┐      ┌───────────────┐
//!  Heat draw ──────┼────► │  RosterStore  │ ──► recompact (ranking)
//!  Add/remove ─────┘      └───────┬───────┘
//!                                 │
//!                                 ▼
//!                        ┌─────────────────┐     PositionsUpdate
//!                        │     Session     │ ──────────────────► PositionPublisher
//!                        │ (current heat)  │ ──────────────────► SnapshotStore
//!                        └─────────────────┘     RosterSnapshot
//! ```
//!
//! ## Modules
//!
//! - [`model`]: `Racer`, `Heat`, `RacerFields`
//! - [`roster`]: in-memory `RosterStore`
//! - [`ranking`]: recompaction and display ordering
//! - [`heats`]: randomized heat draw, reset, completion flag
//! - [`reorder`]: manual reorder validation and application
//! - [`projection`]: `update_positions` payloads and the viewer board
//! - [`snapshot`]: slot-based snapshot format and store trait
//! - [`session`]: single-writer controller tying it all together

pub mod error;
pub mod model;
pub mod roster;
pub mod ranking;
pub mod heats;
pub mod reorder;
pub mod projection;
pub mod snapshot;
pub mod session;

pub use error::{ErrorKind, RosterError};
pub use model::{Heat, HeatId, Racer, RacerFields, RacerId, DEFAULT_COLOR};
pub use roster::RosterStore;
pub use ranking::{display_cmp, display_order, recompact, RosterFilter, RosterView};
pub use heats::{draw, HeatDraw, DEFAULT_HEAT_SIZE};
pub use reorder::{validate_permutation, ReorderScope};
pub use projection::{
    global_positions, heat_positions, PositionBoard, PositionEntry, PositionScope,
    PositionsUpdate,
};
pub use snapshot::{
    MemorySnapshotStore, RosterSnapshot, SnapshotError, SnapshotStore, SLOTS, SLOT_CURRENT_HEAT,
    SLOT_HEATS, SLOT_ROSTER,
};
pub use session::{
    Committed, PositionPublisher, PublishError, Session, SessionConfig, SideEffectError,
};
