//! ## Local view of the elevator system
//!
//! Each node owns exactly one [`ElevState`]: its own car's position and direction,
//! its health flags, its replica of the shared [`OrderTable`] and its current ring successor.
//! The state is owned by the node's control loop and is never shared between tasks.

pub mod order_table;

pub use order_table::OrderTable;

use serde::{Serialize, Deserialize};
use crate::config::ElevConfig;

/// Identifies a node in the ring. `0..num_nodes`.
pub type NodeId = u8;

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// Direction an elevator is taking calls in.
pub enum Dirn {
    Down = -1,
    Stop = 0,
    Up = 1,
}

impl Dirn {
    /// Signed floor increment for one step in this direction.
    pub fn step(self) -> i32 {
        self as i32
    }

    /// Byte the elevator server expects for this motor direction.
    pub fn motor_byte(self) -> u8 {
        match self {
            Dirn::Down => u8::MAX,
            Dirn::Stop => 0,
            Dirn::Up => 1,
        }
    }
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
/// The current behaviour of an elevator
pub enum ElevatorBehaviour {
    Idle,
    DoorOpen,
    Moving,
}


/// Mutable per-process state of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevState {
    /// Last floor the sensor reported. `None` before the first reading.
    pub floor: Option<u8>,

    /// Direction the car is serving in.
    /// Default: [Dirn::Stop]
    pub dirn: Dirn,

    /// The obstruction switch is on.
    pub door_obstructed: bool,

    /// The car has been moving too long without reaching a floor.
    pub stuck_between_floors: bool,

    /// No peers at all, not even self, are visible on the network.
    pub disconnected: bool,

    /// This node's replica of the shared order table.
    pub orders: OrderTable,

    /// Ring successor. `None` while the peer set is empty, `Some(self)` while alone.
    pub next_node_id: Option<NodeId>,
}

impl ElevState {
    /// Fresh state for a node that has seen neither a floor nor a peer.
    pub fn new(config: &ElevConfig) -> Self {
        Self {
            floor: None,
            dirn: Dirn::Stop,
            door_obstructed: false,
            stuck_between_floors: false,
            disconnected: true,
            orders: OrderTable::new(config.num_nodes, config.num_floors),
            next_node_id: None,
        }
    }

    /// True when there is nobody else to route messages to.
    pub fn is_alone(&self, self_id: NodeId) -> bool {
        match self.next_node_id {
            None => true,
            Some(next) => next == self_id,
        }
    }

    /// A car that is obstructed or stuck withholds its cost in bid rounds.
    pub fn can_serve(&self) -> bool {
        !self.door_obstructed && !self.stuck_between_floors
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, ElevConfig};

    fn config() -> ElevConfig {
        ElevConfig::new(1, 3, 4, config::DOOR_OPEN_DURATION, config::DEFAULT_BASE_PORT).unwrap()
    }

    #[test]
    fn starts_unknown_and_disconnected() {
        let state = ElevState::new(&config());
        assert_eq!(state.floor, None);
        assert_eq!(state.dirn, Dirn::Stop);
        assert!(state.disconnected);
        assert!(state.is_alone(1));
    }

    #[test]
    fn alone_when_successor_is_self() {
        let mut state = ElevState::new(&config());
        state.next_node_id = Some(1);
        assert!(state.is_alone(1));
        state.next_node_id = Some(2);
        assert!(!state.is_alone(1));
    }

    #[test]
    fn motor_bytes_match_server_protocol() {
        assert_eq!(Dirn::Down.motor_byte(), 255);
        assert_eq!(Dirn::Stop.motor_byte(), 0);
        assert_eq!(Dirn::Up.motor_byte(), 1);
        assert_eq!(Dirn::Down.step(), -1);
    }
}
