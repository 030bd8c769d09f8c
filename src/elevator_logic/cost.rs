//! Time-to-service estimate used as a car's bid.
//!
//! The estimate replays the real decision rules from [`request`](super::request) on a copy of
//! the state with the hypothetical order added, one floor at a time, until the order would be
//! cleared.

use crate::config::{self, ElevConfig};
use crate::elevio::{ButtonType, Order};
use crate::world_view::{ElevatorBehaviour, ElevState};
use super::request::{choose_direction, clear_at_current_floor, should_stop};

/// Estimated milliseconds until `order` would be served by this car.
///
/// Returns `None` if the car's floor is unknown, since there is nothing to simulate from.
/// The real state is never touched.
///
/// A car already `Moving` starts half a travel unit ahead, and a car with the door open has
/// half a door period credited back. Negative totals are clamped to zero.
pub fn time_to_order_served(
    state: &ElevState,
    behaviour: ElevatorBehaviour,
    config: &ElevConfig,
    order: Order,
) -> Option<u64> {
    let mut floor = state.floor?;
    let travel = config::TRAVEL_TIME.as_millis() as i64;
    let door = config.door_open_duration.as_millis() as i64;
    let clamp = |d: i64| d.max(0) as u64;

    let mut sim = state.clone();
    sim.orders.set(config.node_id, order, true);
    let mut duration: i64 = 0;

    match behaviour {
        ElevatorBehaviour::Idle => {
            let pair = choose_direction(&sim, config);
            if pair.behaviour != ElevatorBehaviour::Moving {
                return Some(0);
            }
            sim.dirn = pair.dirn;
        }
        ElevatorBehaviour::Moving => {
            duration += travel / 2;
            floor = step(floor, sim.dirn.step(), config)?;
            sim.floor = Some(floor);
        }
        ElevatorBehaviour::DoorOpen => {
            duration -= door / 2;
        }
    }

    let max_steps = 4 * config.num_floors as usize * (config::NUM_BUTTONS as usize + 1);
    for _ in 0..max_steps {
        if should_stop(&sim, config) {
            let mask = clear_at_current_floor(&sim, config);
            if floor == order.floor && mask[order.button.index()] {
                return Some(clamp(duration));
            }
            for button in ButtonType::ALL {
                if mask[button.index()] {
                    sim.orders.set(config.node_id, Order::new(floor, button), false);
                }
            }
            duration += door;

            let pair = choose_direction(&sim, config);
            sim.dirn = pair.dirn;
            match pair.behaviour {
                ElevatorBehaviour::DoorOpen => continue,
                ElevatorBehaviour::Idle => return Some(clamp(duration)),
                ElevatorBehaviour::Moving => {}
            }
        }

        floor = match step(floor, sim.dirn.step(), config) {
            Some(next) => next,
            None => return Some(clamp(duration)),
        };
        sim.floor = Some(floor);
        duration += travel;
    }
    None
}

fn step(floor: u8, delta: i32, config: &ElevConfig) -> Option<u8> {
    let next = floor as i32 + delta;
    if next < 0 || next >= config.num_floors as i32 {
        return None;
    }
    Some(next as u8)
}

/// Index of the bid winner: the smallest cost present, lowest node ID on ties.
///
/// `None` when nobody reported a cost.
pub fn min_time_to_served(costs: &[Option<u64>]) -> Option<usize> {
    costs
        .iter()
        .enumerate()
        .filter_map(|(id, cost)| cost.map(|c| (c, id)))
        .min()
        .map(|(_, id)| id)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::world_view::Dirn;

    fn setup(floor: u8) -> (ElevState, ElevConfig) {
        let config = ElevConfig::new(0, 2, 4, config::DOOR_OPEN_DURATION, config::DEFAULT_BASE_PORT).unwrap();
        let mut state = ElevState::new(&config);
        state.floor = Some(floor);
        (state, config)
    }

    fn cab(floor: u8) -> Order {
        Order::new(floor, ButtonType::Cab)
    }

    #[test]
    fn idle_at_order_floor_costs_nothing() {
        let (state, config) = setup(2);
        let order = Order::new(2, ButtonType::HallUp);
        assert_eq!(time_to_order_served(&state, ElevatorBehaviour::Idle, &config, order), Some(0));
    }

    #[test]
    fn unknown_floor_has_no_cost() {
        let (mut state, config) = setup(0);
        state.floor = None;
        assert_eq!(time_to_order_served(&state, ElevatorBehaviour::Idle, &config, cab(3)), None);
    }

    #[test]
    fn cost_grows_with_intervening_stops() {
        let travel = config::TRAVEL_TIME.as_millis() as u64;
        let door = config::DOOR_OPEN_DURATION.as_millis() as u64;

        let (mut state, config) = setup(0);
        let direct = time_to_order_served(&state, ElevatorBehaviour::Idle, &config, cab(3)).unwrap();
        assert_eq!(direct, 3 * travel);

        state.orders.set(0, cab(1), true);
        let one_stop = time_to_order_served(&state, ElevatorBehaviour::Idle, &config, cab(3)).unwrap();
        assert_eq!(one_stop, 3 * travel + door);

        state.orders.set(0, cab(2), true);
        let two_stops = time_to_order_served(&state, ElevatorBehaviour::Idle, &config, cab(3)).unwrap();
        assert_eq!(two_stops, 3 * travel + 2 * door);
        assert!(direct < one_stop && one_stop < two_stops);
    }

    #[test]
    fn moving_car_starts_half_a_floor_ahead() {
        let travel = config::TRAVEL_TIME.as_millis() as u64;
        let (mut state, config) = setup(1);
        state.dirn = Dirn::Up;
        state.orders.set(0, cab(3), true);
        let cost = time_to_order_served(&state, ElevatorBehaviour::Moving, &config, cab(3)).unwrap();
        assert_eq!(cost, travel / 2 + travel);
    }

    #[test]
    fn open_door_in_right_direction_clamps_to_zero() {
        let (mut state, config) = setup(1);
        state.dirn = Dirn::Up;
        let order = Order::new(1, ButtonType::HallUp);
        assert_eq!(time_to_order_served(&state, ElevatorBehaviour::DoorOpen, &config, order), Some(0));
    }

    #[test]
    fn does_not_mutate_real_state() {
        let (state, config) = setup(0);
        let before = state.clone();
        let _ = time_to_order_served(&state, ElevatorBehaviour::Idle, &config, cab(3));
        assert_eq!(state, before);
    }

    #[test]
    fn bid_winner_is_min_non_negative_lowest_id_on_ties() {
        assert_eq!(min_time_to_served(&[Some(5), Some(5), None, Some(3)]), Some(3));
        assert_eq!(min_time_to_served(&[Some(5), Some(5), None, None]), Some(0));
        assert_eq!(min_time_to_served(&[Some(7), Some(2), Some(2)]), Some(1));
        assert_eq!(min_time_to_served(&[None, None, None, None]), None);
    }
}
