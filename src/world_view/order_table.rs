//! # Order table
//!
//! The shared matrix `node → floor → button → bool` of outstanding calls.
//!
//! Every node keeps a full replica. A cab entry `[n][f][Cab]` is node `n`'s own cab call and is
//! only authoritative at node `n`; the other nodes keep it for lamp display and for handing the
//! cab call back after a reconnect. Hall entries name which car is serving the call.
//!
//! ## Merge law
//! [`OrderTable::merge`] is last-sync-wins for hall bits and OR for the receiver's own cab row.
//! It is deliberately not commutative: the incoming table is the fresher view of hall
//! assignments, while the receiver's own cab calls must survive any merge.

use serde::{Serialize, Deserialize};

use crate::config::NUM_BUTTONS;
use crate::elevio::{ButtonType, Order};
use super::NodeId;

/// Outstanding calls for every node, floor and button.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OrderTable {
    orders: Vec<Vec<[bool; NUM_BUTTONS as usize]>>,
}

impl OrderTable {
    /// All-false table for `num_nodes` nodes with `num_floors` floors each.
    pub fn new(num_nodes: u8, num_floors: u8) -> Self {
        Self {
            orders: vec![vec![[false; NUM_BUTTONS as usize]; num_floors as usize]; num_nodes as usize],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.orders.len()
    }

    pub fn num_floors(&self) -> usize {
        self.orders.first().map(|row| row.len()).unwrap_or(0)
    }

    /// Status of `order` in `node`'s row. Out-of-range lookups read as `false`.
    pub fn get(&self, node: NodeId, order: Order) -> bool {
        self.orders
            .get(node as usize)
            .and_then(|row| row.get(order.floor as usize))
            .map(|buttons| buttons[order.button.index()])
            .unwrap_or(false)
    }

    /// Sets the status of `order` in `node`'s row.
    ///
    /// Returns `true` if the entry changed. Out-of-range writes are ignored.
    pub fn set(&mut self, node: NodeId, order: Order, value: bool) -> bool {
        match self
            .orders
            .get_mut(node as usize)
            .and_then(|row| row.get_mut(order.floor as usize))
        {
            Some(buttons) => {
                let changed = buttons[order.button.index()] != value;
                buttons[order.button.index()] = value;
                changed
            }
            None => false,
        }
    }

    /// All three buttons of `node` at `floor`.
    pub fn buttons_at(&self, node: NodeId, floor: usize) -> [bool; NUM_BUTTONS as usize] {
        self.orders
            .get(node as usize)
            .and_then(|row| row.get(floor))
            .copied()
            .unwrap_or([false; NUM_BUTTONS as usize])
    }

    /// True if `node` has any order at `floor`.
    pub fn any_at(&self, node: NodeId, floor: usize) -> bool {
        self.buttons_at(node, floor).iter().any(|&b| b)
    }

    /// All true hall orders in `node`'s row.
    pub fn hall_orders(&self, node: NodeId) -> Vec<Order> {
        self.active_orders(node)
            .into_iter()
            .filter(|order| order.button.is_hall())
            .collect()
    }

    /// All true orders in `node`'s row, lowest floor first.
    pub fn active_orders(&self, node: NodeId) -> Vec<Order> {
        let Some(row) = self.orders.get(node as usize) else {
            return Vec::new();
        };
        row.iter()
            .enumerate()
            .flat_map(|(floor, buttons)| {
                ButtonType::ALL
                    .into_iter()
                    .filter(move |button| buttons[button.index()])
                    .map(move |button| Order::new(floor as u8, button))
            })
            .collect()
    }

    /// Merges `other` into `self` as seen by node `self_id`.
    ///
    /// Cab entries of `self_id`'s own row are OR'd, every other entry is overwritten by `other`.
    /// Rows or floors missing from either side are left untouched.
    pub fn merge(&mut self, other: &OrderTable, self_id: NodeId) {
        for (node, (row, other_row)) in self.orders.iter_mut().zip(other.orders.iter()).enumerate() {
            for (buttons, other_buttons) in row.iter_mut().zip(other_row.iter()) {
                for button in ButtonType::ALL {
                    let idx = button.index();
                    if button == ButtonType::Cab && node == self_id as usize {
                        buttons[idx] = buttons[idx] || other_buttons[idx];
                    } else {
                        buttons[idx] = other_buttons[idx];
                    }
                }
            }
        }
    }

    /// Hall lamp projection: a hall lamp is lit if any node is assigned the call.
    pub fn hall_lamps(&self) -> Vec<[bool; 2]> {
        (0..self.num_floors())
            .map(|floor| {
                let mut lamps = [false; 2];
                for row in &self.orders {
                    lamps[0] |= row[floor][ButtonType::HallUp.index()];
                    lamps[1] |= row[floor][ButtonType::HallDown.index()];
                }
                lamps
            })
            .collect()
    }

    /// Cab lamp projection for `node`'s own panel.
    pub fn cab_lamps(&self, node: NodeId) -> Vec<bool> {
        (0..self.num_floors())
            .map(|floor| self.buttons_at(node, floor)[ButtonType::Cab.index()])
            .collect()
    }
}
