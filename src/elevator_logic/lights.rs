//! Button lamps, projected from the order table.

use crate::config::ElevConfig;
use crate::elevio::{ButtonType, ElevatorDriver};
use crate::world_view::OrderTable;

/// Sets every button lamp from `orders`.
///
/// Hall lamps are lit when any car is assigned the call, cab lamps follow this node's own row.
pub fn set_all_lights<D: ElevatorDriver>(driver: &D, orders: &OrderTable, config: &ElevConfig) {
    let hall = orders.hall_lamps();
    let cab = orders.cab_lamps(config.node_id);

    for floor in 0..config.num_floors {
        let f = floor as usize;
        let (up, down) = hall.get(f).map(|l| (l[0], l[1])).unwrap_or((false, false));
        driver.set_button_lamp(ButtonType::HallUp, floor, up);
        driver.set_button_lamp(ButtonType::HallDown, floor, down);
        driver.set_button_lamp(ButtonType::Cab, floor, cab.get(f).copied().unwrap_or(false));
    }
}

/// Sets the door open lamp.
pub fn set_door_open_light<D: ElevatorDriver>(driver: &D, open: bool) {
    driver.set_door_lamp(open);
}
