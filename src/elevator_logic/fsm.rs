//! # Car finite state machine
//!
//! [`Fsm`] owns the car's [`ElevatorBehaviour`] and reacts to the four events the control
//! loop feeds it. Transitions only read the [`ElevState`]; everything they want done is
//! returned as an [`FsmOutput`] for the caller to carry out (motor, door lamp, door timer,
//! and which orders at the current floor were served).
//!
//! | event | Idle | DoorOpen | Moving |
//! |---|---|---|---|
//! | order assigned | choose direction | serve at once if it clears here | - |
//! | floor arrival | - | - | stop if [`should_stop`] |
//! | door timeout | - | hold if obstructed, else choose direction | - |
//! | sync | choose direction | - | - |

use crate::config::ElevConfig;
use crate::elevio::Order;
use crate::print;
use crate::world_view::{Dirn, ElevatorBehaviour, ElevState};
use super::request::{self, ClearMask, DirnBehaviourPair};

/// Side effects requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsmOutput {
    /// Direction the car should be serving in afterwards.
    pub elev_dirn: Dirn,
    /// Motor command, if the motor has to change.
    pub motor: Option<Dirn>,
    /// Door lamp state afterwards.
    pub door: bool,
    /// (Re)arm the door timer.
    pub start_door_timer: bool,
    /// Orders at the current floor that have been served.
    pub clear_orders: ClearMask,
}

impl FsmOutput {
    /// Output that leaves everything as it is.
    fn unchanged(state: &ElevState, behaviour: ElevatorBehaviour) -> Self {
        Self {
            elev_dirn: state.dirn,
            motor: None,
            door: behaviour == ElevatorBehaviour::DoorOpen,
            start_door_timer: false,
            clear_orders: ClearMask::default(),
        }
    }
}

/// The car's state machine.
#[derive(Debug, Clone)]
pub struct Fsm {
    behaviour: ElevatorBehaviour,
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

impl Fsm {
    pub fn new() -> Self {
        Self { behaviour: ElevatorBehaviour::Idle }
    }

    pub fn behaviour(&self) -> ElevatorBehaviour {
        self.behaviour
    }

    fn transition(&mut self, to: ElevatorBehaviour) {
        if self.behaviour != to {
            print::fsm(format!("{:?} -> {:?}", self.behaviour, to));
        }
        self.behaviour = to;
    }

    /// Started between floors: drive down until the first floor sensor reading.
    pub fn on_init_between_floors(&mut self) -> FsmOutput {
        self.transition(ElevatorBehaviour::Moving);
        FsmOutput {
            elev_dirn: Dirn::Down,
            motor: Some(Dirn::Down),
            door: false,
            start_door_timer: false,
            clear_orders: ClearMask::default(),
        }
    }

    /// `order` has just been set in this car's row.
    pub fn on_order_assigned(&mut self, order: Order, state: &ElevState, config: &ElevConfig) -> FsmOutput {
        let mut output = FsmOutput::unchanged(state, self.behaviour);

        match self.behaviour {
            ElevatorBehaviour::DoorOpen => {
                if request::should_clear_immediately(state, order) {
                    output.start_door_timer = true;
                    output.clear_orders[order.button.index()] = true;
                }
            }
            ElevatorBehaviour::Idle => {
                let pair = request::choose_direction(state, config);
                output = self.follow(pair, state, config);
            }
            ElevatorBehaviour::Moving => {}
        }
        output
    }

    /// The floor sensor reports a floor. `state.floor` is already updated.
    pub fn on_floor_arrival(&mut self, state: &ElevState, config: &ElevConfig) -> FsmOutput {
        let mut output = FsmOutput::unchanged(state, self.behaviour);

        if self.behaviour == ElevatorBehaviour::Moving && request::should_stop(state, config) {
            output.motor = Some(Dirn::Stop);
            output.door = true;
            output.start_door_timer = true;
            output.clear_orders = request::clear_at_current_floor(state, config);
            self.transition(ElevatorBehaviour::DoorOpen);
        }
        output
    }

    /// The door timer expired.
    pub fn on_door_timeout(&mut self, state: &ElevState, config: &ElevConfig) -> FsmOutput {
        if self.behaviour != ElevatorBehaviour::DoorOpen {
            return FsmOutput::unchanged(state, self.behaviour);
        }
        if state.door_obstructed {
            let mut output = FsmOutput::unchanged(state, self.behaviour);
            output.start_door_timer = true;
            return output;
        }

        let pair = request::choose_direction(state, config);
        self.follow(pair, state, config)
    }

    /// The order table was merged from a sync. Only a standing car re-plans; an open door
    /// re-plans on its own timeout.
    pub fn on_sync(&mut self, state: &ElevState, config: &ElevConfig) -> FsmOutput {
        if self.behaviour != ElevatorBehaviour::Idle {
            return FsmOutput::unchanged(state, self.behaviour);
        }
        let pair = request::choose_direction(state, config);
        self.follow(pair, state, config)
    }

    /// Carries out a direction decision from a standing car.
    fn follow(&mut self, pair: DirnBehaviourPair, state: &ElevState, config: &ElevConfig) -> FsmOutput {
        let mut output = FsmOutput::unchanged(state, self.behaviour);
        output.elev_dirn = pair.dirn;

        match pair.behaviour {
            ElevatorBehaviour::DoorOpen => {
                output.door = true;
                output.start_door_timer = true;
                let mut turned = state.clone();
                turned.dirn = pair.dirn;
                output.clear_orders = request::clear_at_current_floor(&turned, config);
            }
            ElevatorBehaviour::Moving => {
                output.door = false;
                output.motor = Some(pair.dirn);
            }
            ElevatorBehaviour::Idle => {
                output.door = false;
            }
        }
        self.transition(pair.behaviour);
        output
    }
}
