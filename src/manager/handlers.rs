//! Local events: buttons, floor sensor, obstruction switch and timers.

use crate::elevator_logic::fsm::FsmOutput;
use crate::elevator_logic::lights;
use crate::elevator_logic::request::ClearMask;
use crate::elevio::{ButtonType, ElevatorDriver, Order};
use crate::network::message::{Content, Envelope, ServedMsg};
use crate::print;
use crate::world_view::{Dirn, ElevatorBehaviour};
use super::Node;

impl<D: ElevatorDriver> Node<D> {
    /// A call button was pressed on this node's panel or floor.
    ///
    /// Cab calls are always self-assigned. Hall calls are bid for, self-assigned when alone,
    /// and ignored while disconnected.
    pub fn on_button_press(&mut self, order: Order) {
        let id = self.config.node_id;
        if order.floor >= self.config.num_floors {
            print::warn(format!("Ignoring button press at unknown floor {}", order));
            return;
        }

        if order.button == ButtonType::Cab {
            if self.state.orders.get(id, order) {
                return;
            }
            if self.state.is_alone(id) {
                self.apply_assign(order, id, Some(id));
            } else {
                self.issue_assign(order, id, Some(id));
            }
            return;
        }

        if (0..self.config.num_nodes).any(|node| self.state.orders.get(node, order)) {
            return;
        }
        match self.state.next_node_id {
            None => print::warn(format!("Disconnected, not taking hall call {}", order)),
            Some(next) if next == id => self.apply_assign(order, id, None),
            Some(_) => self.issue_bid(order, None),
        }
    }

    /// The floor sensor reports `floor`.
    pub fn on_floor_arrival(&mut self, floor: u8) {
        if floor >= self.config.num_floors {
            print::err(format!("Floor sensor reported floor {} out of range", floor));
            return;
        }
        let old_floor = self.state.floor;
        self.state.floor = Some(floor);
        self.driver.set_floor_indicator(floor);
        self.floor_timer.stop();
        if self.state.stuck_between_floors {
            self.state.stuck_between_floors = false;
            print::ok(format!("Reached floor {}, no longer stuck", floor));
        }

        let output = self.fsm.on_floor_arrival(&self.state, &self.config);
        let motor_set = output.motor.is_some();
        self.apply_fsm_output(output);

        // Passing a floor: expect the next one within the threshold too
        if !motor_set && old_floor.is_some() && self.fsm.behaviour() == ElevatorBehaviour::Moving {
            self.floor_timer.start();
        }
    }

    /// The obstruction switch changed.
    pub fn on_obstruction(&mut self, obstructed: bool) {
        if self.state.door_obstructed == obstructed {
            return;
        }
        self.state.door_obstructed = obstructed;
        if obstructed {
            print::warn("Door obstructed".to_string());
            self.obstruction_timer.start();
        } else {
            print::ok("Door obstruction cleared".to_string());
            self.obstruction_timer.stop();
        }
        if self.fsm.behaviour() == ElevatorBehaviour::DoorOpen {
            self.door_timer.start();
        }
    }

    /// The door has been open for the door duration.
    pub fn on_door_timeout(&mut self) {
        let output = self.fsm.on_door_timeout(&self.state, &self.config);
        self.apply_fsm_output(output);
    }

    /// The door has been obstructed for too long: let the other cars take the hall calls.
    pub fn on_obstruction_timeout(&mut self) {
        print::warn("Door obstructed for too long, handing away hall orders".to_string());
        self.reassign_own_hall_orders();
    }

    /// The car has been moving for too long without reaching a floor.
    pub fn on_floor_timeout(&mut self) {
        print::err("No floor reached in time, car is stuck".to_string());
        self.state.stuck_between_floors = true;
        self.reassign_own_hall_orders();
    }

    /// Carries out a transition's side effects.
    pub(super) fn apply_fsm_output(&mut self, output: FsmOutput) {
        if let Some(motor) = output.motor {
            self.driver.set_motor_direction(motor);
            if motor == Dirn::Stop {
                self.floor_timer.stop();
            } else {
                self.floor_timer.start();
            }
        }
        lights::set_door_open_light(&self.driver, output.door);
        if output.start_door_timer {
            self.door_timer.start();
        }
        self.state.dirn = output.elev_dirn;
        self.clear_served(output.clear_orders);
    }

    /// Clears this car's orders at the current floor that the door has just served.
    ///
    /// Only entries that are set are touched, so a repeated clear changes nothing and sends
    /// nothing. Unless the node is alone, every clear is also announced to the ring.
    fn clear_served(&mut self, mask: ClearMask) {
        let Some(floor) = self.state.floor else { return };
        let id = self.config.node_id;
        let mut changed = false;

        for button in ButtonType::ALL {
            if !mask[button.index()] {
                continue;
            }
            let order = Order::new(floor, button);
            if !self.state.orders.set(id, order, false) {
                continue;
            }
            changed = true;
            if !self.state.is_alone(id) {
                self.outbox.send(Envelope::new(id, Content::Served(ServedMsg { order })));
            }
        }
        if changed {
            self.refresh_lights();
        }
    }

    /// Hands this car's hall orders to the other cars through new bid rounds.
    fn reassign_own_hall_orders(&mut self) {
        let id = self.config.node_id;
        let orders = self.state.orders.hall_orders(id);
        if orders.is_empty() {
            return;
        }
        if self.state.is_alone(id) {
            print::warn("Nobody to hand hall orders to, keeping them".to_string());
            return;
        }
        for order in orders {
            self.issue_bid(order, Some(id));
        }
    }

    pub(super) fn refresh_lights(&self) {
        lights::set_all_lights(&self.driver, &self.state.orders, &self.config);
    }
}
