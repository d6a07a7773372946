//! Batch aggregator turning change events into one diff per window

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::{BatchUpdate, ChangeEvent, ChangeKind, MovePair};

/// Whether the aggregator is inside a `begin`/`end` window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    Idle,
    Accumulating,
}

struct Accumulators<M> {
    inserted: BTreeSet<usize>,
    deleted: BTreeSet<usize>,
    updated: BTreeSet<usize>,
    moved: HashSet<M>,
}

impl<M> Default for Accumulators<M> {
    fn default() -> Self {
        Self {
            inserted: BTreeSet::new(),
            deleted: BTreeSet::new(),
            updated: BTreeSet::new(),
            moved: HashSet::new(),
        }
    }
}

/// Folds the change events of one batch into a single `U` value.
///
/// Events are only accumulated between [`begin`](Self::begin) and
/// [`end`](Self::end); anything recorded outside a window is dropped so it
/// can never leak into a later batch. Each `end` hands exactly one value to
/// the consumer.
pub struct ChangeAggregator<U: BatchUpdate> {
    owner_name: String,
    consumer: Box<dyn FnMut(U) + Send>,
    window: Option<Accumulators<U::Move>>,
}

impl<U: BatchUpdate> ChangeAggregator<U> {
    /// Create an idle aggregator delivering diffs to `consumer`.
    ///
    /// `owner_name` only appears in log messages.
    pub fn new(owner_name: impl Into<String>, consumer: impl FnMut(U) + Send + 'static) -> Self {
        Self {
            owner_name: owner_name.into(),
            consumer: Box::new(consumer),
            window: None,
        }
    }

    /// Current window state
    pub const fn state(&self) -> AggregatorState {
        if self.window.is_some() {
            AggregatorState::Accumulating
        } else {
            AggregatorState::Idle
        }
    }

    /// Open a new window, discarding anything left from an unterminated one
    pub fn begin(&mut self) {
        if self.window.is_some() {
            tracing::debug!(
                "{}: begin() inside an open window, discarding pending changes",
                self.owner_name
            );
        }
        self.window = Some(Accumulators::default());
    }

    /// Record a change given its kind and the positions it carries.
    ///
    /// Calls missing the position their kind requires are ignored.
    pub fn record(&mut self, kind: ChangeKind, old: Option<usize>, new: Option<usize>) {
        if let Some(event) = ChangeEvent::from_parts(kind, old, new) {
            self.apply(event);
        }
    }

    /// Record a change coming from an external source as a raw kind code.
    pub fn record_raw(&mut self, code: u8, old: Option<usize>, new: Option<usize>) {
        match ChangeKind::try_from(code) {
            Ok(kind) => self.record(kind, old, new),
            Err(code) => {
                tracing::warn!("{}: unrecognized change kind {}", self.owner_name, code);
            }
        }
    }

    /// Accumulate a typed event into the open window
    pub fn apply(&mut self, event: ChangeEvent) {
        let Some(window) = self.window.as_mut() else {
            tracing::debug!(
                "{}: {:?} recorded outside a window, ignoring",
                self.owner_name,
                event
            );
            return;
        };

        match event {
            ChangeEvent::Insert { new } => {
                window.inserted.insert(new);
            }
            ChangeEvent::Delete { old } => {
                window.deleted.insert(old);
            }
            ChangeEvent::Update { old } => {
                window.updated.insert(old);
            }
            ChangeEvent::Move { old, new } => {
                window.moved.insert(U::Move::new(old, new));
            }
        }
    }

    /// Close the window, deliver one diff, and return to idle.
    ///
    /// Without a preceding `begin` the delivered diff is empty.
    pub fn end(&mut self) {
        let window = self.window.take().unwrap_or_default();
        tracing::debug!(
            "{}: emitting diff (+{} -{} ~{} moves={})",
            self.owner_name,
            window.inserted.len(),
            window.deleted.len(),
            window.updated.len(),
            window.moved.len()
        );
        let update = U::from_changes(
            window.inserted,
            window.deleted,
            window.updated,
            window.moved,
        );
        (self.consumer)(update);
    }

    /// Run one full window over `events`
    pub fn emit_batch(&mut self, events: impl IntoIterator<Item = ChangeEvent>) {
        self.begin();
        for event in events {
            self.apply(event);
        }
        self.end();
    }
}

impl<U: BatchUpdate> fmt::Debug for ChangeAggregator<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeAggregator")
            .field("owner_name", &self.owner_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
