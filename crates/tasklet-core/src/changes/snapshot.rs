//! Deriving change events from two ordered key snapshots

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use super::ChangeEvent;

/// Compute the events turning the `before` ordering into `after`.
///
/// Keys must be unique within each snapshot. `touched` names keys whose
/// content changed; a touched key present on both sides is reported as an
/// update at its old position unless it also changed relative order, in
/// which case only the move is reported.
pub fn diff_snapshots<K>(before: &[K], after: &[K], touched: &HashSet<K>) -> Vec<ChangeEvent>
where
    K: Eq + Hash + Copy,
{
    let old_positions = positions(before);
    let new_positions = positions(after);
    let mut events = Vec::new();

    for (old, key) in before.iter().enumerate() {
        if !new_positions.contains_key(key) {
            events.push(ChangeEvent::Delete { old });
        }
    }

    for (new, key) in after.iter().enumerate() {
        if !old_positions.contains_key(key) {
            events.push(ChangeEvent::Insert { new });
        }
    }

    // Relative order among keys present on both sides decides moves.
    let survivors_before = before
        .iter()
        .filter(|key| new_positions.contains_key(*key))
        .copied()
        .collect::<Vec<_>>();
    let survivor_rank_after = positions(
        &after
            .iter()
            .filter(|key| old_positions.contains_key(*key))
            .copied()
            .collect::<Vec<_>>(),
    );

    for (rank_before, key) in survivors_before.iter().enumerate() {
        let old = old_positions[key];
        let moved = survivor_rank_after.get(key) != Some(&rank_before);
        if moved {
            events.push(ChangeEvent::Move {
                old,
                new: new_positions[key],
            });
        } else if touched.contains(key) {
            events.push(ChangeEvent::Update { old });
        }
    }

    events
}

fn positions<K: Eq + Hash + Copy>(keys: &[K]) -> HashMap<K, usize> {
    keys.iter()
        .enumerate()
        .map(|(index, key)| (*key, index))
        .collect()
}
