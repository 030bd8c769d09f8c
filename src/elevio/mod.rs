//! ## Elevator I/O module for the local elevator
//!
//! The raw TCP client for the elevator server lives in [`elev`], and the polling
//! threads turning its readings into change events live in [`poll`].
//!
//! ## Overview
//! - `ButtonType`: Hall up, hall down or cab.
//! - `Order`: A call, identified by floor and button.
//! - `ElevEvent`: Everything the driver can tell the control loop.
//! - `ElevatorDriver`: The commands the control loop can give the car.
//!
//! The control loop only ever talks to the car through [`ElevatorDriver`], so tests
//! can stand in a recording driver for the real one.

pub mod elev;
pub mod poll;

use serde::{Serialize, Deserialize};
use std::fmt;

use crate::world_view::Dirn;

/// Represents the type of a call button.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)] // Ensures the enum is stored as a single byte.
pub enum ButtonType {
    /// Call to go up.
    HallUp = 0,

    /// Call to go down.
    HallDown = 1,

    /// Call from inside the car.
    Cab = 2,
}

impl ButtonType {
    /// All buttons, in index order.
    pub const ALL: [ButtonType; 3] = [ButtonType::HallUp, ButtonType::HallDown, ButtonType::Cab];

    /// Index into a per-floor button array.
    pub fn index(self) -> usize {
        self as usize
    }

    /// True for the two floor-panel buttons.
    pub fn is_hall(self) -> bool {
        self != ButtonType::Cab
    }
}

impl TryFrom<u8> for ButtonType {
    type Error = u8;

    /// Converts the wire value used by the elevator server. Unknown values are handed back.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ButtonType::HallUp),
            1 => Ok(ButtonType::HallDown),
            2 => Ok(ButtonType::Cab),
            other => Err(other),
        }
    }
}

/// Identifies a call. Immutable value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Order {
    /// The floor where the call was made.
    pub floor: u8,

    /// The button that was pressed.
    pub button: ButtonType,
}

impl Order {
    /// Creates a new order.
    pub fn new(floor: u8, button: ButtonType) -> Self {
        Self { floor, button }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{}", self.button, self.floor)
    }
}

/// Represents an event reported by the elevator hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevEvent {
    /// A call button was pressed.
    CallButton(Order),
    /// The car reached a floor.
    Floor(u8),
    /// The obstruction switch changed.
    Obstruction(bool),
}

/// Commands the control loop gives to its car.
///
/// Implementations must not fail: I/O errors are logged by the implementation.
pub trait ElevatorDriver {
    /// Sets the motor direction.
    fn set_motor_direction(&self, dirn: Dirn);
    /// Turns the door-open lamp on or off.
    fn set_door_lamp(&self, on: bool);
    /// Shows `floor` on the floor indicator.
    fn set_floor_indicator(&self, floor: u8);
    /// Turns a button lamp on or off.
    fn set_button_lamp(&self, button: ButtonType, floor: u8, on: bool);
}
