//! # This projects library
//!
//! One node of a peer-to-peer group of elevators. Nodes form a logical ring over UDP, bid for
//! hall calls by circulating cost vectors around it, and keep replicas of a shared order table
//! in step through assign, served and sync messages.
//!
//! ## Overview
//! - **Config**: Constants, node configuration and print toggles.
//! - **Print**: Color coded terminal output.
//! - **Init**: Command line, configuration and driver startup.
//! - **Elevio**: Interface for elevator I/O.
//! - **World View**: The node's state and its replica of the order table.
//! - **Elevator Logic**: Car state machine, request rules, cost estimate and lamps.
//! - **Network**: Envelopes, ring membership, reliable delivery and liveness.
//! - **Manager**: The control loop tying it all together.

/// Global variables
pub mod config;

/// Initialize functions
pub mod init;

/// Print functions with color coding
pub mod print;

/// Interface for elevator input/output. Based on [https://github.com/TTK4145/driver-rust/tree/master/src/elevio]
pub mod elevio;

/// This node's state and its replica of the order table.
pub mod world_view;

/// Car state machine and the rules it is built on.
pub mod elevator_logic;

/// Communication between nodes.
pub mod network;

/// The node's control loop.
pub mod manager;
