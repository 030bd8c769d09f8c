//! # config.rs – Centralized Parameter Store
//!
//! This module holds all static program parameters used throughout the system,
//! together with [`ElevConfig`], the immutable per-process configuration built at startup.
//!
//! Tuning timeouts and ports happens here and nowhere else.

use std::sync::Mutex;
use std::time::Duration;
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::world_view::NodeId;

//
// ──────────────────────────────────────────────────────────────
//   1. NETWORK SETTINGS
// ──────────────────────────────────────────────────────────────
//

/// UDP broadcast listen address (bind address)
pub static BC_LISTEN_ADDR: &str = "0.0.0.0";

/// Broadcast address used for heartbeats and as fallback destination
pub static BC_ADDR: &str = "255.255.255.255";

/// Prefix on every heartbeat, used to filter out foreign broadcasts
pub const KEY_STR: &str = "elevring";

/// Default base port. Heartbeats use this port, node `n` receives envelopes on `base + 1 + n`
pub const DEFAULT_BASE_PORT: u16 = 20000;

/// Size of UDP receive buffer in bytes
pub const UDP_BUFFER: usize = u16::MAX as usize;

/// Capacity of the mpsc channels feeding the control loop
pub const CHANNEL_SIZE: usize = 300;

/// Number of recently seen message UUIDs remembered for duplicate suppression
pub const DEDUP_CAPACITY: usize = 512;

//
// ──────────────────────────────────────────────────────────────
//   2. SYSTEM & ELEVATOR PARAMETERS
// ──────────────────────────────────────────────────────────────
//

/// Default number of floors in the lab setup
pub const DEFAULT_NUM_FLOORS: u8 = 4;

/// Hall up, hall down and cab
pub const NUM_BUTTONS: u8 = 3;

/// Address of the elevator server (simulator or hardware), without port
pub static LOCAL_ELEV_HOST: &str = "localhost";

/// Default port of the elevator server
pub const DEFAULT_SERVER_PORT: u16 = 15657;

/// Duration between elevator hardware polls
pub const ELEV_POLL: Duration = Duration::from_millis(25);

//
// ──────────────────────────────────────────────────────────────
//   3. TIMING & TIMEOUTS & INTERVALS
// ──────────────────────────────────────────────────────────────
//

/// How long the door stays open at a stop
pub const DOOR_OPEN_DURATION: Duration = Duration::from_millis(3000);

/// Estimated travel time between two adjacent floors, used by the cost estimator
pub const TRAVEL_TIME: Duration = Duration::from_millis(2000);

/// Delay before a reliable transmitter resends its in-flight envelope
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(300);

/// How long the door may be obstructed before own hall orders are handed away
pub const OBSTRUCTION_TIMEOUT: Duration = Duration::from_millis(6000);

/// How long the car may move without reaching a floor before it counts as stuck
pub const FLOOR_TIMEOUT: Duration = Duration::from_millis(6000);

/// Interval between heartbeats
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// A peer not heard from within this duration is reported lost
pub const PEER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Silence from the watched successor longer than this counts as death
pub const WATCHDOG_TIMEOUT: Duration = Duration::from_millis(400);

/// Upper bound on a single blocking UDP read, keeps loops responsive
pub const RECV_TIMEOUT: Duration = Duration::from_millis(500);

//
// ──────────────────────────────────────────────────────────────
//   4. PER-PROCESS CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Errors raised while validating startup parameters. All of them are fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `node_id + 1 > num_nodes`
    #[error("node id {node_id} is out of range for {num_nodes} node(s)")]
    NodeIdOutOfRange { node_id: NodeId, num_nodes: u8 },

    /// There must be at least one node
    #[error("number of nodes must be at least 1")]
    NoNodes,

    /// A car needs somewhere to go
    #[error("number of floors must be at least 2, got {0}")]
    TooFewFloors(u8),

    /// The highest message port does not fit in a u16
    #[error("base port {base_port} leaves no room for {num_nodes} message port(s)")]
    PortOverflow { base_port: u16, num_nodes: u8 },
}

/// Immutable per-process configuration. Set once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElevConfig {
    /// This node's ID, `0..num_nodes`
    pub node_id: NodeId,
    /// Number of nodes the system is dimensioned for
    pub num_nodes: u8,
    pub num_floors: u8,
    pub num_buttons: u8,
    pub door_open_duration: Duration,
    /// Heartbeat port, and the base for per-node message ports
    pub broadcast_port: u16,
}

impl ElevConfig {
    /// Validates and builds the configuration.
    ///
    /// ## Errors
    /// See [`ConfigError`]. The caller is expected to abort the process on any of them.
    pub fn new(
        node_id: NodeId,
        num_nodes: u8,
        num_floors: u8,
        door_open_duration: Duration,
        broadcast_port: u16,
    ) -> Result<Self, ConfigError> {
        if num_nodes == 0 {
            return Err(ConfigError::NoNodes);
        }
        if node_id as u16 + 1 > num_nodes as u16 {
            return Err(ConfigError::NodeIdOutOfRange { node_id, num_nodes });
        }
        if num_floors < 2 {
            return Err(ConfigError::TooFewFloors(num_floors));
        }
        if broadcast_port as u32 + num_nodes as u32 > u16::MAX as u32 {
            return Err(ConfigError::PortOverflow { base_port: broadcast_port, num_nodes });
        }

        Ok(Self {
            node_id,
            num_nodes,
            num_floors,
            num_buttons: NUM_BUTTONS,
            door_open_duration,
            broadcast_port,
        })
    }

    /// Port node `id` receives envelopes on.
    pub fn message_port(&self, id: NodeId) -> u16 {
        self.broadcast_port + 1 + id as u16
    }

    /// True if `id` names a node this system is dimensioned for.
    pub fn contains_node(&self, id: NodeId) -> bool {
        id < self.num_nodes
    }
}

//
// ──────────────────────────────────────────────────────────────
//   5. LOGGING CONFIGURATION
// ──────────────────────────────────────────────────────────────
//

/// Enable/disable printing of errors
pub static PRINT_ERR_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of warnings
pub static PRINT_WARN_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of success messages
pub static PRINT_OK_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of general info
pub static PRINT_INFO_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of ring/topology changes
pub static PRINT_RING_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));

/// Enable/disable printing of car state transitions
pub static PRINT_FSM_ON: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(true));


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_id_outside_node_count() {
        let err = ElevConfig::new(3, 3, 4, DOOR_OPEN_DURATION, DEFAULT_BASE_PORT).unwrap_err();
        assert_eq!(err, ConfigError::NodeIdOutOfRange { node_id: 3, num_nodes: 3 });
    }

    #[test]
    fn accepts_last_id() {
        let config = ElevConfig::new(2, 3, 4, DOOR_OPEN_DURATION, DEFAULT_BASE_PORT).unwrap();
        assert_eq!(config.num_buttons, NUM_BUTTONS);
        assert_eq!(config.message_port(0), DEFAULT_BASE_PORT + 1);
        assert_eq!(config.message_port(2), DEFAULT_BASE_PORT + 3);
    }

    #[test]
    fn rejects_degenerate_setups() {
        assert_eq!(ElevConfig::new(0, 0, 4, DOOR_OPEN_DURATION, 1000), Err(ConfigError::NoNodes));
        assert_eq!(ElevConfig::new(0, 1, 1, DOOR_OPEN_DURATION, 1000), Err(ConfigError::TooFewFloors(1)));
        assert!(matches!(
            ElevConfig::new(0, 3, 4, DOOR_OPEN_DURATION, u16::MAX - 1),
            Err(ConfigError::PortOverflow { .. })
        ));
    }
}
