use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use voxeld_types::{ChunkCoord, ConnectionId};

/// `membership`: the chunk a session currently stands in.
/// `subscriptions`: the chunks a session is interested in receiving updates
/// about. Both maps share a single coarse lock so a caller can compose a
/// membership mutation with a subscriber snapshot atomically.
#[derive(Default)]
struct TrackerState {
    membership: HashMap<ChunkCoord, HashSet<ConnectionId>>,
    subscriptions: HashMap<ChunkCoord, HashSet<ConnectionId>>,
}

#[derive(Default)]
pub struct PlayerTracker {
    state: Mutex<TrackerState>,
}

impl PlayerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().expect("player tracker lock poisoned")
    }

    pub fn enter(&self, coord: ChunkCoord, vd: i32, p: ConnectionId) {
        let mut state = self.lock();
        state.membership.entry(coord).or_default().insert(p);
        for c in coord.square(vd) {
            state.subscriptions.entry(c).or_default().insert(p);
        }
    }

    pub fn leave(&self, coord: ChunkCoord, vd: i32, p: ConnectionId) {
        let mut state = self.lock();
        remove_and_prune(&mut state.membership, coord, p);
        for c in coord.square(vd) {
            remove_and_prune(&mut state.subscriptions, c, p);
        }
    }

    pub fn move_member(&self, from: ChunkCoord, to: ChunkCoord, p: ConnectionId) {
        let mut state = self.lock();
        remove_and_prune(&mut state.membership, from, p);
        state.membership.entry(to).or_default().insert(p);
    }

    pub fn subscribe(&self, chunks: impl IntoIterator<Item = ChunkCoord>, p: ConnectionId) {
        let mut state = self.lock();
        for c in chunks {
            state.subscriptions.entry(c).or_default().insert(p);
        }
    }

    pub fn unsubscribe(&self, chunks: impl IntoIterator<Item = ChunkCoord>, p: ConnectionId) {
        let mut state = self.lock();
        for c in chunks {
            remove_and_prune(&mut state.subscriptions, c, p);
        }
    }

    /// Adds/removes `p` to/from subscription rings so the subscribed set
    /// matches exactly the `(2*new+1)^2` square centred on `coord` — the
    /// symmetric difference of the old and new squares.
    pub fn update_view_distance(&self, coord: ChunkCoord, old: i32, new: i32, p: ConnectionId) {
        let old_set: HashSet<ChunkCoord> = coord.square(old).collect();
        let new_set: HashSet<ChunkCoord> = coord.square(new).collect();
        let mut state = self.lock();
        for c in old_set.difference(&new_set) {
            remove_and_prune(&mut state.subscriptions, *c, p);
        }
        for c in new_set.difference(&old_set) {
            state.subscriptions.entry(*c).or_default().insert(p);
        }
    }

    /// A copy of the subscriber set, safe to use outside the lock.
    pub fn subscribers(&self, coord: ChunkCoord) -> HashSet<ConnectionId> {
        self.lock().subscriptions.get(&coord).cloned().unwrap_or_default()
    }

    /// A copy of the membership set, safe to use outside the lock.
    pub fn members(&self, coord: ChunkCoord) -> HashSet<ConnectionId> {
        self.lock().membership.get(&coord).cloned().unwrap_or_default()
    }
}

fn remove_and_prune(map: &mut HashMap<ChunkCoord, HashSet<ConnectionId>>, coord: ChunkCoord, p: ConnectionId) {
    if let Some(set) = map.get_mut(&coord) {
        set.remove(&p);
        if set.is_empty() {
            map.remove(&coord);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_populates_membership_and_subscription_square() {
        let tracker = PlayerTracker::new();
        let p = ConnectionId(1);
        let center = ChunkCoord::new(0, 0);
        tracker.enter(center, 2, p);

        assert!(tracker.members(center).contains(&p));
        for c in center.square(2) {
            assert!(tracker.subscribers(c).contains(&p));
        }
        assert!(!tracker.subscribers(ChunkCoord::new(3, 0)).contains(&p));
    }

    #[test]
    fn leave_is_inverse_of_enter() {
        let tracker = PlayerTracker::new();
        let p = ConnectionId(2);
        let center = ChunkCoord::new(5, 5);
        tracker.enter(center, 3, p);
        tracker.leave(center, 3, p);

        assert!(tracker.members(center).is_empty());
        for c in center.square(3) {
            assert!(tracker.subscribers(c).is_empty());
        }
    }

    #[test]
    fn enter_move_leave_leaves_both_maps_empty() {
        let tracker = PlayerTracker::new();
        let p = ConnectionId(3);
        let from = ChunkCoord::new(0, 0);
        let to = ChunkCoord::new(10, 10);
        tracker.enter(from, 1, p);
        tracker.move_member(from, to, p);
        tracker.leave(to, 1, p);

        assert!(tracker.members(from).is_empty());
        assert!(tracker.members(to).is_empty());
        for c in from.square(1).chain(to.square(1)) {
            assert!(tracker.subscribers(c).is_empty());
        }
    }

    #[test]
    fn update_view_distance_shrinks_subscriptions() {
        let tracker = PlayerTracker::new();
        let p = ConnectionId(4);
        let center = ChunkCoord::new(0, 0);
        tracker.enter(center, 8, p);
        tracker.update_view_distance(center, 8, 2, p);

        assert!(tracker.subscribers(ChunkCoord::new(8, 0)).is_empty());
        assert!(tracker.subscribers(ChunkCoord::new(2, 2)).contains(&p));
    }
}
