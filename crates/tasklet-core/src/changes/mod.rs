//! Change tracking for ordered task lists
//!
//! Store mutations are described as a stream of positional [`ChangeEvent`]s.
//! A [`ChangeAggregator`] folds the events of one batch (between `begin` and
//! `end`) into a single immutable diff value, generic over the diff shape via
//! [`BatchUpdate`] and [`MovePair`].

mod aggregator;
mod snapshot;

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

pub use aggregator::{AggregatorState, ChangeAggregator};
pub use snapshot::diff_snapshots;

/// A relocation of one item inside the ordered projection.
///
/// Implementations are deduplicated by structural equality.
pub trait MovePair: Eq + Hash {
    /// Build the pair from its old and new positions
    fn new(old_index: usize, new_index: usize) -> Self;
}

/// A diff value built once per change batch.
pub trait BatchUpdate {
    /// Shape of the move pairs carried by this diff
    type Move: MovePair;

    /// Canonical constructor from the four accumulated sets
    fn from_changes(
        inserted: BTreeSet<usize>,
        deleted: BTreeSet<usize>,
        updated: BTreeSet<usize>,
        moved: HashSet<Self::Move>,
    ) -> Self;
}

/// Kind of a raw structural change.
///
/// Discriminants follow the usual live-query numbering so raw codes from an
/// external event source can be converted with [`TryFrom<u8>`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeKind {
    Insert = 1,
    Delete = 2,
    Move = 3,
    Update = 4,
}

impl TryFrom<u8> for ChangeKind {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Insert),
            2 => Ok(Self::Delete),
            3 => Ok(Self::Move),
            4 => Ok(Self::Update),
            other => Err(other),
        }
    }
}

/// A well-formed positional change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeEvent {
    /// Item appeared at `new` (position in the new ordering)
    Insert { new: usize },
    /// Item at `old` (position in the old ordering) disappeared
    Delete { old: usize },
    /// Item at `old` changed content in place
    Update { old: usize },
    /// Item moved from `old` to `new`
    Move { old: usize, new: usize },
}

impl ChangeEvent {
    /// Assemble an event from a kind and optional positions.
    ///
    /// Returns `None` when the position the kind requires is missing.
    pub const fn from_parts(
        kind: ChangeKind,
        old: Option<usize>,
        new: Option<usize>,
    ) -> Option<Self> {
        match (kind, old, new) {
            (ChangeKind::Insert, _, Some(new)) => Some(Self::Insert { new }),
            (ChangeKind::Delete, Some(old), _) => Some(Self::Delete { old }),
            (ChangeKind::Update, Some(old), _) => Some(Self::Update { old }),
            (ChangeKind::Move, Some(old), Some(new)) => Some(Self::Move { old, new }),
            _ => None,
        }
    }

    /// The kind of this event
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Delete { .. } => ChangeKind::Delete,
            Self::Update { .. } => ChangeKind::Update,
            Self::Move { .. } => ChangeKind::Move,
        }
    }
}

/// Move pair used by [`StoreUpdate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Move {
    pub old_index: usize,
    pub new_index: usize,
}

impl MovePair for Move {
    fn new(old_index: usize, new_index: usize) -> Self {
        Self {
            old_index,
            new_index,
        }
    }
}

/// Diff of the ascending-id task list produced by one store mutation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreUpdate {
    inserted: BTreeSet<usize>,
    deleted: BTreeSet<usize>,
    updated: BTreeSet<usize>,
    moved: HashSet<Move>,
}

impl StoreUpdate {
    /// Positions inserted, relative to the new ordering
    pub const fn inserted(&self) -> &BTreeSet<usize> {
        &self.inserted
    }

    /// Positions deleted, relative to the old ordering
    pub const fn deleted(&self) -> &BTreeSet<usize> {
        &self.deleted
    }

    /// Positions updated in place, relative to the old ordering
    pub const fn updated(&self) -> &BTreeSet<usize> {
        &self.updated
    }

    /// Deduplicated move pairs
    pub const fn moved(&self) -> &HashSet<Move> {
        &self.moved
    }

    /// Move pairs sorted by old then new position
    pub fn sorted_moves(&self) -> Vec<Move> {
        let mut moves = self.moved.iter().copied().collect::<Vec<_>>();
        moves.sort_unstable();
        moves
    }

    /// Whether the batch carried no changes at all
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty()
            && self.deleted.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
    }
}

impl BatchUpdate for StoreUpdate {
    type Move = Move;

    fn from_changes(
        inserted: BTreeSet<usize>,
        deleted: BTreeSet<usize>,
        updated: BTreeSet<usize>,
        moved: HashSet<Move>,
    ) -> Self {
        Self {
            inserted,
            deleted,
            updated,
            moved,
        }
    }
}
