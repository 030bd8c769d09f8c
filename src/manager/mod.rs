//! # Manager
//!
//! [`Node`] is the single owner of this node's [`ElevState`]. Its control loop, [`Node::run`],
//! takes one event at a time from the driver, the three timers, the peer listener, the
//! watchdog and the network, and handles it to completion before looking at the next.
//! No other task ever sees the state.
//!
//! Handlers for local events (buttons, floors, obstruction, timers) live in `handlers`, and
//! handlers for ring traffic and topology changes live in `protocol`.

mod handlers;
mod protocol;

use std::collections::BTreeSet;
use uuid::Uuid;

use crate::config::{self, ElevConfig};
use crate::elevator_logic::fsm::Fsm;
use crate::elevator_logic::lights;
use crate::elevator_logic::timer::Timer;
use crate::elevio::{ElevEvent, ElevatorDriver};
use crate::network::dedup::UuidCache;
use crate::network::local_network::{MpscRxs, Outbox};
use crate::network::message::BidMsg;
use crate::print;
use crate::world_view::{ElevatorBehaviour, ElevState, NodeId};

/// One elevator node: its car, its replica of the order table and its view of the ring.
pub struct Node<D: ElevatorDriver> {
    config: ElevConfig,
    state: ElevState,
    fsm: Fsm,
    driver: D,
    outbox: Outbox,
    door_timer: Timer,
    obstruction_timer: Timer,
    floor_timer: Timer,
    /// Live peers, self included once its own heartbeat is heard.
    peers: BTreeSet<NodeId>,
    /// Assign, Served and Sync envelopes whose side effects are already applied.
    handled: UuidCache,
    /// Own envelopes whose round already completed.
    completed: UuidCache,
    /// Bid rounds started here that have not come back yet, oldest first.
    in_flight_bids: Vec<(Uuid, BidMsg)>,
}

impl<D: ElevatorDriver> Node<D> {
    pub fn new(config: ElevConfig, driver: D, outbox: Outbox) -> Self {
        Self {
            state: ElevState::new(&config),
            fsm: Fsm::new(),
            driver,
            outbox,
            door_timer: Timer::new(config.door_open_duration),
            obstruction_timer: Timer::new(config::OBSTRUCTION_TIMEOUT),
            floor_timer: Timer::new(config::FLOOR_TIMEOUT),
            peers: BTreeSet::new(),
            handled: UuidCache::new(config::DEDUP_CAPACITY),
            completed: UuidCache::new(config::DEDUP_CAPACITY),
            in_flight_bids: Vec::new(),
            config,
        }
    }

    /// Brings the car to a known state. `floor` is the sensor reading at startup.
    ///
    /// Lamps are reset from the (empty) order table. A car between floors is driven down
    /// until it finds one.
    pub fn init(&mut self, floor: Option<u8>) {
        lights::set_door_open_light(&self.driver, false);
        self.refresh_lights();

        match floor {
            Some(floor) => {
                self.state.floor = Some(floor);
                self.driver.set_floor_indicator(floor);
                print::ok(format!("Node {} starting at floor {}", self.config.node_id, floor));
            }
            None => {
                print::warn("Starting between floors, going down".to_string());
                let output = self.fsm.on_init_between_floors();
                self.apply_fsm_output(output);
            }
        }
    }

    pub fn config(&self) -> &ElevConfig {
        &self.config
    }

    pub fn state(&self) -> &ElevState {
        &self.state
    }

    pub fn behaviour(&self) -> ElevatorBehaviour {
        self.fsm.behaviour()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn peers(&self) -> &BTreeSet<NodeId> {
        &self.peers
    }

    /// True while the door timer is armed.
    pub fn door_timer_active(&self) -> bool {
        self.door_timer.is_active()
    }

    /// Dispatches a driver event.
    pub fn handle_elev_event(&mut self, event: ElevEvent) {
        match event {
            ElevEvent::CallButton(order) => self.on_button_press(order),
            ElevEvent::Floor(floor) => self.on_floor_arrival(floor),
            ElevEvent::Obstruction(obstructed) => self.on_obstruction(obstructed),
        }
    }

    /// Runs the control loop forever.
    pub async fn run(mut self, mut rxs: MpscRxs) {
        loop {
            tokio::select! {
                Some(event) = rxs.elevator.recv() => self.handle_elev_event(event),
                Some(envelope) = rxs.incoming.recv() => self.on_message(envelope),
                Some(update) = rxs.peer_update.recv() => self.on_peer_update(update),
                Some(event) = rxs.watchdog.recv() => self.on_watchdog_event(event),
                _ = self.door_timer.wait() => {
                    if self.door_timer.take_timeout() {
                        self.on_door_timeout();
                    }
                }
                _ = self.obstruction_timer.wait() => {
                    if self.obstruction_timer.take_timeout() {
                        self.on_obstruction_timeout();
                    }
                }
                _ = self.floor_timer.wait() => {
                    if self.floor_timer.take_timeout() {
                        self.on_floor_timeout();
                    }
                }
            }
        }
    }
}
