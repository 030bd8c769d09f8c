//! # Ring membership
//!
//! Live nodes form a logical ring ordered by ID. Every protocol message travels hop by hop
//! to the next live ID, wrapping from the highest back to the lowest.
//!
//! The functions here are pure; the control loop keeps the current peer set and applies them
//! on every peer update.

use std::collections::BTreeSet;

use crate::world_view::NodeId;

/// Parses the peer list reported by the liveness layer.
///
/// Entries that are not a node ID below `num_nodes` are dropped.
pub fn parse_peers<S: AsRef<str>>(raw: &[S], num_nodes: u8) -> BTreeSet<NodeId> {
    raw.iter()
        .filter_map(|p| p.as_ref().trim().parse::<NodeId>().ok())
        .filter(|&id| id < num_nodes)
        .collect()
}

/// The smallest peer ID greater than `self_id`, wrapping to the smallest peer overall.
///
/// `Some(self_id)` when self is the only peer, `None` when nobody is visible.
pub fn next_node_id(self_id: NodeId, peers: &BTreeSet<NodeId>) -> Option<NodeId> {
    peers
        .range(self_id.saturating_add(1)..)
        .next()
        .filter(|&&id| id > self_id)
        .or_else(|| peers.iter().next())
        .copied()
}

/// True if a full order table should be pushed to `new_peer`, which just joined.
///
/// That is the case when it slotted in as the new successor between self and a valid old
/// successor, and is not self.
pub fn should_send_sync(
    self_id: NodeId,
    old_next: Option<NodeId>,
    new_next: Option<NodeId>,
    new_peer: NodeId,
) -> bool {
    old_next.is_some() && new_next == Some(new_peer) && new_peer != self_id
}

/// Lost nodes whose hall orders `self_id` is now responsible for.
///
/// These are the lost nodes strictly between self and its new successor in ring order, which
/// always includes a dead old successor. When alone, every other lost node qualifies. When
/// disconnected, none do.
pub fn orphaned_by(
    self_id: NodeId,
    new_next: Option<NodeId>,
    lost: &BTreeSet<NodeId>,
    num_nodes: u8,
) -> Vec<NodeId> {
    let Some(next) = new_next else {
        return Vec::new();
    };
    let n = num_nodes.max(1) as u16;
    let dist = |to: NodeId| -> u16 {
        let d = (to as u16 + n - self_id as u16 % n) % n;
        if d == 0 { n } else { d }
    };
    let limit = dist(next);

    lost.iter()
        .copied()
        .filter(|&id| id != self_id && id < num_nodes && dist(id) < limit)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[NodeId]) -> BTreeSet<NodeId> {
        ids.iter().copied().collect()
    }

    #[test]
    fn parses_only_valid_ids() {
        let peers = parse_peers(&["2", "0", "banana", "7", " 1 "], 3);
        assert_eq!(peers, set(&[0, 1, 2]));
    }

    #[test]
    fn successor_wraps_around() {
        let peers = set(&[0, 2, 3]);
        assert_eq!(next_node_id(0, &peers), Some(2));
        assert_eq!(next_node_id(2, &peers), Some(3));
        assert_eq!(next_node_id(3, &peers), Some(0));
        assert_eq!(next_node_id(1, &peers), Some(2));
    }

    #[test]
    fn alone_and_empty() {
        assert_eq!(next_node_id(1, &set(&[1])), Some(1));
        assert_eq!(next_node_id(1, &set(&[])), None);
        assert_eq!(next_node_id(u8::MAX, &set(&[u8::MAX, 3])), Some(3));
    }

    #[test]
    fn sync_goes_to_a_peer_that_slots_in_as_successor() {
        assert!(should_send_sync(0, Some(2), Some(1), 1));
        assert!(should_send_sync(0, Some(0), Some(1), 1));
        // disconnected before: nothing valid to sync from
        assert!(!should_send_sync(0, None, Some(1), 1));
        // joined elsewhere in the ring
        assert!(!should_send_sync(0, Some(1), Some(1), 3));
        assert!(!should_send_sync(0, Some(1), Some(0), 0));
    }

    #[test]
    fn dead_successor_is_orphaned_to_predecessor() {
        // ring 0 1 2 3, node 1 dies: node 0 now points at 2
        assert_eq!(orphaned_by(0, Some(2), &set(&[1]), 4), vec![1]);
        // node 2 is not between 3 and 0
        assert_eq!(orphaned_by(3, Some(0), &set(&[2]), 4), Vec::<NodeId>::new());
    }

    #[test]
    fn adjacent_failures_go_to_first_live_predecessor() {
        assert_eq!(orphaned_by(3, Some(2), &set(&[0, 1]), 4), vec![0, 1]);
        assert_eq!(orphaned_by(2, Some(3), &set(&[0, 1]), 4), Vec::<NodeId>::new());
    }

    #[test]
    fn alone_takes_everything_disconnected_takes_nothing() {
        assert_eq!(orphaned_by(1, Some(1), &set(&[0, 2]), 3), vec![0, 2]);
        assert_eq!(orphaned_by(1, None, &set(&[0, 2]), 3), Vec::<NodeId>::new());
    }
}
