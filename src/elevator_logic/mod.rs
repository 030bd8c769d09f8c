//! # Elevator logic for the local car
//!
//! - [`timer`]: one-shot restartable countdowns
//! - [`request`]: direction choice, stop and clear rules
//! - [`cost`]: time-to-service estimate used as the car's bid
//! - [`fsm`]: the car's state machine
//! - [`lights`]: lamp projection

pub mod timer;
pub mod request;
pub mod cost;
pub mod fsm;
pub mod lights;
