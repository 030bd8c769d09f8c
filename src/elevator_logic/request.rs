//! Elevator request evaluation and direction decision logic.
//!
//! Stateless helpers used by the car [`fsm`](super::fsm) and replayed by the
//! [`cost`](super::cost) estimator. Every function looks only at the node's own row of the
//! order table and at the car's floor and direction.
//!
//! # Overview
//! - Checking for orders above, below, or at the current floor.
//! - Determining whether to stop at the current floor.
//! - Choosing direction and behaviour based on order layout.
//! - Deciding which buttons are served by opening the door here.
//!
//! While the floor is unknown every presence check is `false`, so the car falls through to
//! `Stop`/`Idle`.

use crate::config::{ElevConfig, NUM_BUTTONS};
use crate::elevio::{ButtonType, Order};
use crate::world_view::{Dirn, ElevatorBehaviour, ElevState};

/// Represents a combination of a direction and an elevator behaviour state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirnBehaviourPair {
    /// direction of the elevator
    pub dirn: Dirn,

    /// the behavior of the elevator
    pub behaviour: ElevatorBehaviour,
}

impl DirnBehaviourPair {
    fn new(dirn: Dirn, behaviour: ElevatorBehaviour) -> Self {
        Self { dirn, behaviour }
    }
}

/// Per-button mask, indexed by [`ButtonType::index`].
pub type ClearMask = [bool; NUM_BUTTONS as usize];

/// Checks if there are any orders on floors higher than the current one.
pub fn above(state: &ElevState, config: &ElevConfig) -> bool {
    let Some(floor) = state.floor else { return false };
    ((floor as usize + 1)..config.num_floors as usize)
        .any(|f| state.orders.any_at(config.node_id, f))
}

/// Checks if there are any orders on floors lower than the current one.
pub fn below(state: &ElevState, config: &ElevConfig) -> bool {
    let Some(floor) = state.floor else { return false };
    (0..floor as usize).any(|f| state.orders.any_at(config.node_id, f))
}

/// Checks if there are any orders at the current floor.
pub fn here(state: &ElevState, config: &ElevConfig) -> bool {
    let Some(floor) = state.floor else { return false };
    state.orders.any_at(config.node_id, floor as usize)
}

fn button_here(state: &ElevState, config: &ElevConfig, button: ButtonType) -> bool {
    let Some(floor) = state.floor else { return false };
    state.orders.buttons_at(config.node_id, floor as usize)[button.index()]
}

/// Chooses the next direction and behaviour for the elevator.
///
/// A car keeps going the way it is going as long as there is work that way, then serves
/// what is here, and only then turns around.
///
/// | current | above | here | below | result |
/// |---|---|---|---|---|
/// | Up | x | | | Up / Moving |
/// | Up | - | x | | Down / DoorOpen |
/// | Up | - | - | x | Down / Moving |
/// | Down | | | x | Down / Moving |
/// | Down | | x | - | Up / DoorOpen |
/// | Down | x | - | - | Up / Moving |
/// | Stop | | x | | Stop / DoorOpen |
/// | Stop | x | - | | Up / Moving |
/// | Stop | - | - | x | Down / Moving |
///
/// Anything else is `Stop` / `Idle`.
pub fn choose_direction(state: &ElevState, config: &ElevConfig) -> DirnBehaviourPair {
    let (above, here, below) = (above(state, config), here(state, config), below(state, config));

    match state.dirn {
        Dirn::Up => {
            if above {
                DirnBehaviourPair::new(Dirn::Up, ElevatorBehaviour::Moving)
            } else if here {
                DirnBehaviourPair::new(Dirn::Down, ElevatorBehaviour::DoorOpen)
            } else if below {
                DirnBehaviourPair::new(Dirn::Down, ElevatorBehaviour::Moving)
            } else {
                DirnBehaviourPair::new(Dirn::Stop, ElevatorBehaviour::Idle)
            }
        }
        Dirn::Down => {
            if below {
                DirnBehaviourPair::new(Dirn::Down, ElevatorBehaviour::Moving)
            } else if here {
                DirnBehaviourPair::new(Dirn::Up, ElevatorBehaviour::DoorOpen)
            } else if above {
                DirnBehaviourPair::new(Dirn::Up, ElevatorBehaviour::Moving)
            } else {
                DirnBehaviourPair::new(Dirn::Stop, ElevatorBehaviour::Idle)
            }
        }
        Dirn::Stop => {
            if here {
                DirnBehaviourPair::new(Dirn::Stop, ElevatorBehaviour::DoorOpen)
            } else if above {
                DirnBehaviourPair::new(Dirn::Up, ElevatorBehaviour::Moving)
            } else if below {
                DirnBehaviourPair::new(Dirn::Down, ElevatorBehaviour::Moving)
            } else {
                DirnBehaviourPair::new(Dirn::Stop, ElevatorBehaviour::Idle)
            }
        }
    }
}

/// Determines whether the elevator should stop at the current floor.
pub fn should_stop(state: &ElevState, config: &ElevConfig) -> bool {
    let cab = button_here(state, config, ButtonType::Cab);
    match state.dirn {
        Dirn::Down => button_here(state, config, ButtonType::HallDown) || cab || !below(state, config),
        Dirn::Up => button_here(state, config, ButtonType::HallUp) || cab || !above(state, config),
        Dirn::Stop => true,
    }
}

/// True if a new `order` is served right away by a car standing at its floor with the door open.
pub fn should_clear_immediately(state: &ElevState, order: Order) -> bool {
    if state.floor != Some(order.floor) {
        return false;
    }
    match (state.dirn, order.button) {
        (_, ButtonType::Cab) => true,
        (Dirn::Stop, _) => true,
        (Dirn::Up, ButtonType::HallUp) => true,
        (Dirn::Down, ButtonType::HallDown) => true,
        _ => false,
    }
}

/// Which buttons at the current floor are served by opening the door here.
///
/// Cab is always cleared. Travelling up clears hall-up, and hall-down too when there is
/// nothing further up and nobody waiting to go up here. Down is symmetric. A stopped car
/// clears both hall buttons.
pub fn clear_at_current_floor(state: &ElevState, config: &ElevConfig) -> ClearMask {
    let mut mask = [false; NUM_BUTTONS as usize];
    if state.floor.is_none() {
        return mask;
    }
    mask[ButtonType::Cab.index()] = true;

    match state.dirn {
        Dirn::Up => {
            if !above(state, config) && !button_here(state, config, ButtonType::HallUp) {
                mask[ButtonType::HallDown.index()] = true;
            }
            mask[ButtonType::HallUp.index()] = true;
        }
        Dirn::Down => {
            if !below(state, config) && !button_here(state, config, ButtonType::HallDown) {
                mask[ButtonType::HallUp.index()] = true;
            }
            mask[ButtonType::HallDown.index()] = true;
        }
        Dirn::Stop => {
            mask[ButtonType::HallUp.index()] = true;
            mask[ButtonType::HallDown.index()] = true;
        }
    }
    mask
}
