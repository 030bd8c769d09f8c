//! Ring traffic and topology changes.
//!
//! Every envelope is applied at most once per node (see [`UuidCache`](crate::network::dedup::UuidCache))
//! and forwarded one hop further until it is back at its author. The author acknowledges its
//! own transmitter and, for a bid, picks the winner.

use std::collections::BTreeSet;

use crate::elevator_logic::cost;
use crate::elevio::{ElevatorDriver, Order};
use crate::network::message::{AssignMsg, BidMsg, Content, Envelope, MsgKind, SyncMsg, short_uuid};
use crate::network::ring;
use crate::network::udp_broadcast::PeerUpdate;
use crate::network::watchdog::WatchdogEvent;
use crate::print;
use crate::world_view::NodeId;
use super::Node;

impl<D: ElevatorDriver> Node<D> {
    /// An envelope addressed to this node arrived.
    pub fn on_message(&mut self, envelope: Envelope) {
        let id = self.config.node_id;
        if !self.config.contains_node(envelope.author_id) {
            print::warn(format!("Dropping {}: unknown author", envelope));
            return;
        }

        if envelope.author_id == id {
            self.outbox.reply(envelope.kind(), envelope.uuid);
            if self.completed.insert(envelope.uuid) {
                self.on_round_complete(envelope);
            }
            return;
        }

        if envelope.loop_counter >= self.config.num_nodes {
            print::warn(format!("Dropping {}: went full circle without its author", envelope));
            return;
        }

        let Envelope { author_id, recipient, loop_counter, uuid, content } = envelope;
        let content = match content {
            Content::Bid(mut bid) => {
                self.fill_own_cost(&mut bid);
                Content::Bid(bid)
            }
            Content::Assign(assign) => {
                if self.handled.insert(uuid) {
                    self.on_assign(&assign);
                }
                Content::Assign(assign)
            }
            Content::Served(served) => {
                if self.handled.insert(uuid) && self.state.orders.set(author_id, served.order, false) {
                    self.refresh_lights();
                }
                Content::Served(served)
            }
            Content::Sync(mut sync) => {
                if sync.target_id == id {
                    if self.handled.insert(uuid) {
                        print::ring(format!("Merging order table from node {}", author_id));
                        self.state.orders.merge(&sync.orders, id);
                        self.on_sync_merged();
                    }
                } else {
                    sync.orders = self.state.orders.clone();
                }
                Content::Sync(sync)
            }
        };

        self.forward(Envelope { author_id, recipient, loop_counter, uuid, content });
    }

    /// The liveness layer reports a new peer list.
    pub fn on_peer_update(&mut self, update: PeerUpdate) {
        let peers = ring::parse_peers(&update.peers, self.config.num_nodes);
        let new_peer = update
            .new
            .and_then(|p| p.trim().parse::<NodeId>().ok())
            .filter(|p| peers.contains(p));
        self.update_ring(peers, new_peer);
    }

    /// The watchdog saw a successor die or come back before the peer list did.
    pub fn on_watchdog_event(&mut self, event: WatchdogEvent) {
        let mut peers = self.peers.clone();
        match event {
            WatchdogEvent::Lost(dead) => {
                if peers.remove(&dead) {
                    print::warn(format!("Watchdog: node {} is gone", dead));
                    self.update_ring(peers, None);
                }
            }
            WatchdogEvent::Alive(alive) => {
                if self.config.contains_node(alive) && peers.insert(alive) {
                    print::ok(format!("Watchdog: node {} is back", alive));
                    self.update_ring(peers, Some(alive));
                }
            }
        }
    }

    /// Replans after the order table was merged from a sync.
    pub(super) fn on_sync_merged(&mut self) {
        self.refresh_lights();
        let output = self.fsm.on_sync(&self.state, &self.config);
        self.apply_fsm_output(output);
    }

    /// Installs a new peer set: retargets the transmitters, syncs a successor that just
    /// joined and takes over the orders of nodes that died behind it.
    fn update_ring(&mut self, peers: BTreeSet<NodeId>, new_peer: Option<NodeId>) {
        if peers == self.peers {
            return;
        }
        let id = self.config.node_id;
        let was_alone = self.state.is_alone(id);
        let lost: BTreeSet<NodeId> = self.peers.difference(&peers).copied().collect();
        let old_next = self.state.next_node_id;
        let new_next = ring::next_node_id(id, &peers);

        self.peers = peers;
        self.state.next_node_id = new_next;
        self.state.disconnected = self.peers.is_empty();

        if old_next != new_next {
            match new_next {
                None => print::ring("Disconnected, no peers visible".to_string()),
                Some(next) if next == id => print::ring("Alone in the ring".to_string()),
                Some(next) => print::ring(format!("Next node is {}", next)),
            }
            self.outbox.set_recipient(new_next.filter(|&next| next != id));
        }
        if !was_alone && self.state.is_alone(id) {
            self.take_back_in_flight();
        }

        if let Some(joined) = new_peer {
            if ring::should_send_sync(id, old_next, new_next, joined) {
                self.send_sync(joined);
            }
        }

        for dead in ring::orphaned_by(id, new_next, &lost, self.config.num_nodes) {
            self.reassign_orders(dead);
        }
    }

    /// Takes responsibility for the hall orders of a node that left the ring.
    fn reassign_orders(&mut self, dead: NodeId) {
        let id = self.config.node_id;
        let orders = self.state.orders.hall_orders(dead);
        if orders.is_empty() {
            return;
        }
        print::ring(format!("Reassigning {} hall orders of node {}", orders.len(), dead));

        for order in orders {
            if self.state.is_alone(id) {
                self.apply_assign(order, id, Some(dead));
            } else {
                self.issue_bid(order, Some(dead));
            }
        }
    }

    /// Finishes here what was still travelling when the ring went away.
    ///
    /// Open bid rounds are won by this car. Queued assigns are already in the local table.
    /// Both queues are dropped so nothing stale reaches a peer that comes back later.
    fn take_back_in_flight(&mut self) {
        self.outbox.flush(MsgKind::Bid);
        self.outbox.flush(MsgKind::Assign);

        let id = self.config.node_id;
        for (uuid, bid) in std::mem::take(&mut self.in_flight_bids) {
            print::ring(format!("Bid {} for {} taken back, serving it here", short_uuid(&uuid), bid.order));
            self.apply_assign(bid.order, id, bid.old_assignee);
        }
    }

    /// Own envelope made it around the ring.
    fn on_round_complete(&mut self, envelope: Envelope) {
        let Content::Bid(mut bid) = envelope.content else {
            return;
        };
        let Some(pos) = self.in_flight_bids.iter().position(|(uuid, _)| *uuid == envelope.uuid) else {
            print::warn(format!("Bid {} came back after it was settled here", short_uuid(&envelope.uuid)));
            return;
        };
        self.in_flight_bids.remove(pos);
        self.fill_own_cost(&mut bid);
        let winner = cost::min_time_to_served(&bid.time_to_served)
            .map(|idx| idx as NodeId)
            .unwrap_or(self.config.node_id);
        print::info(format!(
            "Bid {} for {} won by node {} ({:?})",
            short_uuid(&envelope.uuid),
            bid.order,
            winner,
            bid.time_to_served
        ));
        self.issue_assign(bid.order, winner, bid.old_assignee);
    }

    fn on_assign(&mut self, assign: &AssignMsg) {
        if !self.config.contains_node(assign.new_assignee) {
            print::warn(format!("Ignoring assign of {} to unknown node {}", assign.order, assign.new_assignee));
            return;
        }
        self.apply_assign(assign.order, assign.new_assignee, assign.old_assignee);
    }

    /// Enters `bid`'s cost for this car. A car that cannot serve leaves its entry empty.
    fn fill_own_cost(&self, bid: &mut BidMsg) {
        let idx = self.config.node_id as usize;
        if bid.time_to_served.len() <= idx {
            bid.time_to_served.resize(self.config.num_nodes as usize, None);
        }
        bid.time_to_served[idx] = if self.state.can_serve() {
            cost::time_to_order_served(&self.state, self.fsm.behaviour(), &self.config, bid.order)
        } else {
            None
        };
    }

    /// Applies an assignment here and, unless alone, announces it to the ring.
    pub(super) fn issue_assign(&mut self, order: Order, new_assignee: NodeId, old_assignee: Option<NodeId>) {
        let id = self.config.node_id;
        self.apply_assign(order, new_assignee, old_assignee);
        if !self.state.is_alone(id) {
            let content = Content::Assign(AssignMsg { order, new_assignee, old_assignee });
            self.outbox.send(Envelope::new(id, content));
        }
    }

    /// Moves `order` from `old_assignee` to `new_assignee` in the local table.
    pub(super) fn apply_assign(&mut self, order: Order, new_assignee: NodeId, old_assignee: Option<NodeId>) {
        if let Some(old) = old_assignee.filter(|&old| old != new_assignee) {
            self.state.orders.set(old, order, false);
        }
        let changed = self.state.orders.set(new_assignee, order, true);
        self.refresh_lights();

        if changed && new_assignee == self.config.node_id {
            let output = self.fsm.on_order_assigned(order, &self.state, &self.config);
            self.apply_fsm_output(output);
        }
    }

    /// Starts a bid round for `order`.
    pub(super) fn issue_bid(&mut self, order: Order, old_assignee: Option<NodeId>) {
        let id = self.config.node_id;
        let bid = BidMsg {
            order,
            time_to_served: vec![None; self.config.num_nodes as usize],
            old_assignee,
        };
        print::info(format!("Starting bid for {}", order));
        let envelope = Envelope::new(id, Content::Bid(bid.clone()));
        self.in_flight_bids.push((envelope.uuid, bid));
        self.outbox.send(envelope);
    }

    fn send_sync(&mut self, target_id: NodeId) {
        print::ring(format!("Sending order table to node {}", target_id));
        let sync = SyncMsg { orders: self.state.orders.clone(), target_id };
        self.outbox.send(Envelope::new(self.config.node_id, Content::Sync(sync)));
    }

    /// Passes an envelope on to the successor.
    fn forward(&self, envelope: Envelope) {
        match self.state.next_node_id {
            Some(next) if next != self.config.node_id => self.outbox.forward(envelope.forwarded_to(next)),
            _ => print::warn(format!("No successor to forward {} to", envelope)),
        }
    }
}


#[cfg(test)]
mod tests {
    use crate::elevio::{ButtonType, Order};
    use crate::manager::Node;
    use crate::manager::tests::{node, sent, RecordingDriver};
    use crate::network::local_network::OutboxRxs;
    use crate::network::message::*;
    use crate::network::transmitter::TransmitterCmd;
    use crate::network::udp_broadcast::PeerUpdate;
    use crate::network::watchdog::WatchdogEvent;
    use crate::world_view::{Dirn, ElevatorBehaviour, NodeId, OrderTable};

    fn peers(ids: &[&str], new: Option<&str>) -> PeerUpdate {
        PeerUpdate {
            peers: ids.iter().map(|s| s.to_string()).collect(),
            new: new.map(str::to_string),
            lost: vec![],
        }
    }

    fn arriving(author: NodeId, to: NodeId, hops: u8, content: Content) -> Envelope {
        let mut envelope = Envelope::new(author, content);
        envelope.recipient = to;
        envelope.loop_counter = hops;
        envelope
    }

    fn forwarded(rxs: &mut OutboxRxs) -> Vec<Envelope> {
        let mut out = Vec::new();
        while let Ok(envelope) = rxs.datagram.try_recv() {
            out.push(envelope);
        }
        out
    }

    fn recipients(rxs: &mut OutboxRxs, kind: MsgKind) -> Vec<Option<NodeId>> {
        let mut out = Vec::new();
        while let Ok(cmd) = rxs.commands(kind).try_recv() {
            if let TransmitterCmd::SetRecipient(r) = cmd {
                out.push(r);
            }
        }
        out
    }

    fn hall_down_3_bid(costs: Vec<Option<u64>>) -> Content {
        Content::Bid(BidMsg { order: Order::new(3, ButtonType::HallDown), time_to_served: costs, old_assignee: None })
    }

    #[test]
    fn bid_gets_own_cost_and_moves_on() {
        let (mut node, mut rxs) = node(1, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));

        node.on_message(arriving(0, 1, 1, hall_down_3_bid(vec![Some(2000), None, None])));

        let out = forwarded(&mut rxs);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].recipient, 2);
        assert_eq!(out[0].loop_counter, 2);
        match &out[0].content {
            Content::Bid(bid) => {
                assert_eq!(bid.time_to_served[0], Some(2000));
                assert!(bid.time_to_served[1].is_some());
                assert_eq!(bid.time_to_served[2], None);
            }
            other => panic!("expected bid, got {:?}", other),
        }
    }

    #[test]
    fn obstructed_car_does_not_bid() {
        let (mut node, mut rxs) = node(1, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        node.on_obstruction(true);

        node.on_message(arriving(0, 1, 1, hall_down_3_bid(vec![Some(2000), Some(1)])));
        match &forwarded(&mut rxs)[0].content {
            Content::Bid(bid) => assert_eq!(bid.time_to_served, vec![Some(2000), None]),
            other => panic!("expected bid, got {:?}", other),
        }
    }

    /// Starts a bid round at `node` and returns its envelope as it would come back.
    fn round_trip(node: &mut Node<RecordingDriver>, rxs: &mut OutboxRxs, costs: Vec<Option<u64>>) -> Envelope {
        node.on_button_press(Order::new(3, ButtonType::HallDown));
        let mut bids = sent(rxs, MsgKind::Bid);
        assert_eq!(bids.len(), 1);
        let mut round = bids.remove(0);
        round.recipient = node.config().node_id;
        round.loop_counter = node.config().num_nodes;
        round.content = hall_down_3_bid(costs);
        round
    }

    #[test]
    fn returned_bid_is_acknowledged_and_assigned_once() {
        let (mut node, mut rxs) = node(0, 2, 2);
        node.on_peer_update(peers(&["0", "1"], None));

        let round = round_trip(&mut node, &mut rxs, vec![None, Some(0)]);
        node.on_message(round.clone());
        node.on_message(round.clone());

        let mut replies = 0;
        while let Ok(cmd) = rxs.bid.try_recv() {
            if cmd == TransmitterCmd::Reply(round.uuid) {
                replies += 1;
            }
        }
        assert_eq!(replies, 2);

        let assigns = sent(&mut rxs, MsgKind::Assign);
        assert_eq!(assigns.len(), 1);
        let order = Order::new(3, ButtonType::HallDown);
        assert!(node.state().orders.get(1, order));
        assert!(!node.state().orders.get(0, order));
        assert_eq!(node.behaviour(), ElevatorBehaviour::Idle);
        assert!(forwarded(&mut rxs).is_empty());
    }

    #[test]
    fn empty_bid_round_falls_back_to_originator() {
        let (mut node, mut rxs) = node(0, 2, 2);
        node.on_peer_update(peers(&["0", "1"], None));
        node.on_obstruction(true);

        let round = round_trip(&mut node, &mut rxs, vec![None, None]);
        node.on_message(round);
        let assigns = sent(&mut rxs, MsgKind::Assign);
        match &assigns[0].content {
            Content::Assign(a) => assert_eq!(a.new_assignee, 0),
            other => panic!("expected assign, got {:?}", other),
        }
    }

    #[test]
    fn assign_applies_once_but_forwards_every_time() {
        let (mut node, mut rxs) = node(1, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let order = Order::new(2, ButtonType::HallUp);
        let assign = arriving(0, 1, 1, Content::Assign(AssignMsg { order, new_assignee: 1, old_assignee: None }));

        node.on_message(assign.clone());
        assert!(node.state().orders.get(1, order));
        assert_eq!(node.behaviour(), ElevatorBehaviour::Moving);
        let motor_commands = node.driver().motor.borrow().len();

        node.on_message(assign);
        assert_eq!(node.driver().motor.borrow().len(), motor_commands);
        assert_eq!(forwarded(&mut rxs).len(), 2);
    }

    #[test]
    fn assign_moves_order_away_from_old_assignee() {
        let (mut node, _rxs) = node(2, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));
        let order = Order::new(1, ButtonType::HallDown);
        node.state.orders.set(1, order, true);

        node.on_message(arriving(0, 2, 2, Content::Assign(AssignMsg { order, new_assignee: 0, old_assignee: Some(1) })));
        assert!(node.state().orders.get(0, order));
        assert!(!node.state().orders.get(1, order));
        assert_eq!(node.driver().lamps.borrow().get(&(ButtonType::HallDown, 1)), Some(&true));
    }

    #[test]
    fn served_clears_authors_entry_and_lamp() {
        let (mut node, _rxs) = node(1, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let order = Order::new(2, ButtonType::HallUp);
        node.state.orders.set(0, order, true);

        node.on_message(arriving(0, 1, 1, Content::Served(ServedMsg { order })));
        assert!(!node.state().orders.get(0, order));
        assert_eq!(node.driver().lamps.borrow().get(&(ButtonType::HallUp, 2)), Some(&false));
    }

    #[test]
    fn full_circle_without_author_is_dropped() {
        let (mut node, mut rxs) = node(1, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let order = Order::new(2, ButtonType::HallUp);

        node.on_message(arriving(0, 1, 2, Content::Assign(AssignMsg { order, new_assignee: 1, old_assignee: None })));
        assert!(!node.state().orders.get(1, order));
        assert!(forwarded(&mut rxs).is_empty());
    }

    #[test]
    fn sync_target_merges_and_replans() {
        let (mut node, mut rxs) = node(1, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let mut table = OrderTable::new(2, 4);
        table.set(1, Order::new(2, ButtonType::Cab), true);
        table.set(0, Order::new(3, ButtonType::HallDown), true);

        node.on_message(arriving(0, 1, 1, Content::Sync(SyncMsg { orders: table, target_id: 1 })));
        assert!(node.state().orders.get(1, Order::new(2, ButtonType::Cab)));
        assert!(node.state().orders.get(0, Order::new(3, ButtonType::HallDown)));
        assert_eq!(node.behaviour(), ElevatorBehaviour::Moving);
        assert_eq!(node.driver().motor.borrow().last(), Some(&Dirn::Up));
        assert_eq!(forwarded(&mut rxs).len(), 1);
    }

    #[test]
    fn sync_passing_through_carries_fresher_table() {
        let (mut node, mut rxs) = node(1, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));
        node.state.orders.set(0, Order::new(1, ButtonType::HallUp), true);

        node.on_message(arriving(0, 1, 1, Content::Sync(SyncMsg { orders: OrderTable::new(3, 4), target_id: 2 })));
        let out = forwarded(&mut rxs);
        match &out[0].content {
            Content::Sync(sync) => {
                assert_eq!(sync.target_id, 2);
                assert_eq!(&sync.orders, &node.state().orders);
            }
            other => panic!("expected sync, got {:?}", other),
        }
    }

    #[test]
    fn ring_change_retargets_and_rebids_orphans() {
        let (mut node, mut rxs) = node(0, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));
        assert_eq!(recipients(&mut rxs, MsgKind::Assign), vec![Some(1)]);

        let order = Order::new(2, ButtonType::HallUp);
        node.state.orders.set(1, order, true);
        node.on_peer_update(peers(&["0", "2"], None));

        assert_eq!(node.state().next_node_id, Some(2));
        assert_eq!(recipients(&mut rxs, MsgKind::Sync), vec![Some(1), Some(2)]);
        let bids = sent(&mut rxs, MsgKind::Bid);
        assert_eq!(bids.len(), 1);
        match &bids[0].content {
            Content::Bid(bid) => assert_eq!((bid.order, bid.old_assignee), (order, Some(1))),
            other => panic!("expected bid, got {:?}", other),
        }
    }

    #[test]
    fn lone_survivor_takes_orders_directly() {
        let (mut node, mut rxs) = node(0, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let order = Order::new(2, ButtonType::HallUp);
        node.state.orders.set(1, order, true);

        node.on_peer_update(peers(&["0"], None));
        assert!(node.state().orders.get(0, order));
        assert!(!node.state().orders.get(1, order));
        assert_eq!(node.behaviour(), ElevatorBehaviour::Moving);
        assert!(sent(&mut rxs, MsgKind::Bid).is_empty());
        assert!(sent(&mut rxs, MsgKind::Assign).is_empty());
    }

    #[test]
    fn bid_in_flight_is_served_here_when_left_alone() {
        let (mut node, mut rxs) = node(0, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        let order = Order::new(2, ButtonType::HallUp);
        node.on_button_press(order);
        let bid = sent(&mut rxs, MsgKind::Bid).remove(0);
        assert!(!node.state().orders.get(0, order));

        node.on_peer_update(peers(&["0"], None));
        assert!(node.state().orders.get(0, order));
        assert_eq!(node.behaviour(), ElevatorBehaviour::Moving);
        assert_eq!(node.driver().lamps.borrow().get(&(ButtonType::HallUp, 2)), Some(&true));
        for kind in [MsgKind::Bid, MsgKind::Assign] {
            let mut flushed = false;
            while let Ok(cmd) = rxs.commands(kind).try_recv() {
                flushed |= cmd == TransmitterCmd::Flush;
            }
            assert!(flushed, "{:?} queue kept", kind);
        }

        // the old round straggling home later changes nothing
        let mut late = bid;
        late.recipient = 0;
        late.loop_counter = 2;
        node.on_peer_update(peers(&["0", "1"], None));
        node.on_message(late);
        assert!(sent(&mut rxs, MsgKind::Assign).is_empty());
        assert!(node.state().orders.get(0, order));
        assert!(!node.state().orders.get(1, order));
    }

    #[test]
    fn disconnect_takes_back_bids_too() {
        let (mut node, _rxs) = node(0, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));
        let order = Order::new(3, ButtonType::HallDown);
        node.on_button_press(order);

        node.on_peer_update(peers(&[], None));
        assert!(node.state().disconnected);
        assert!(node.state().orders.get(0, order));
    }

    #[test]
    fn joining_successor_gets_a_sync() {
        let (mut joined, mut rxs) = node(0, 3, 0);
        joined.on_peer_update(peers(&["0", "2"], None));
        joined.on_peer_update(peers(&["0", "1", "2"], Some("1")));

        let syncs = sent(&mut rxs, MsgKind::Sync);
        assert_eq!(syncs.len(), 1);
        match &syncs[0].content {
            Content::Sync(sync) => assert_eq!(sync.target_id, 1),
            other => panic!("expected sync, got {:?}", other),
        }

        // a node joining elsewhere in the ring is not this node's business
        let (mut node, mut rxs) = node(0, 3, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        node.on_peer_update(peers(&["0", "1", "2"], Some("2")));
        assert!(sent(&mut rxs, MsgKind::Sync).is_empty());
    }

    #[test]
    fn watchdog_overrides_peer_list() {
        let (mut node, _rxs) = node(0, 3, 0);
        node.on_peer_update(peers(&["0", "1", "2"], None));

        node.on_watchdog_event(WatchdogEvent::Lost(1));
        assert_eq!(node.state().next_node_id, Some(2));
        assert!(!node.peers().contains(&1));

        node.on_watchdog_event(WatchdogEvent::Alive(1));
        assert_eq!(node.state().next_node_id, Some(1));
    }

    #[test]
    fn losing_everyone_disconnects() {
        let (mut node, _rxs) = node(0, 2, 0);
        node.on_peer_update(peers(&["0", "1"], None));
        node.on_peer_update(peers(&[], None));
        assert!(node.state().disconnected);
        assert_eq!(node.state().next_node_id, None);
    }
}
