//! # Network
//!
//! - [`message`]: envelope format and codec
//! - [`dedup`]: memory of handled message UUIDs
//! - [`ring`]: successor resolution and ring membership rules
//! - [`transmitter`]: per-kind reliable delivery
//! - [`udp_broadcast`]: heartbeats and the peer list
//! - [`udp_direct`]: envelope send and receive
//! - [`watchdog`]: fast successor-death detection
//! - [`local_network`]: channels between tasks and the control loop

pub mod message;
pub mod dedup;
pub mod ring;
pub mod transmitter;
pub mod udp_broadcast;
pub mod udp_direct;
pub mod watchdog;
pub mod local_network;
