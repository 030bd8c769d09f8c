//! Polling threads for the elevator server.
//!
//! Each reading gets its own OS thread that polls at [`config::ELEV_POLL`] and only
//! reports changes on a crossbeam channel. [`start_polling`] wires the threads up and
//! bridges their channels into one tokio mpsc stream of [`ElevEvent`]s for the control loop.

use crossbeam_channel as cbc;
use std::thread;
use std::time;
use tokio::sync::mpsc;

use crate::config;
use crate::print;
use super::elev::Elevator;
use super::{ButtonType, ElevEvent, Order};

struct LocalElevTxs {
    call_button: cbc::Sender<Order>,
    floor_sensor: cbc::Sender<u8>,
    obstruction: cbc::Sender<bool>,
}

struct LocalElevRxs {
    call_button: cbc::Receiver<Order>,
    floor_sensor: cbc::Receiver<u8>,
    obstruction: cbc::Receiver<bool>,
}

struct LocalElevChannels {
    rxs: LocalElevRxs,
    txs: LocalElevTxs,
}

impl LocalElevChannels {
    fn new() -> Self {
        let (call_button_tx, call_button_rx) = cbc::unbounded::<Order>();
        let (floor_sensor_tx, floor_sensor_rx) = cbc::unbounded::<u8>();
        let (obstruction_tx, obstruction_rx) = cbc::unbounded::<bool>();

        LocalElevChannels {
            rxs: LocalElevRxs { call_button: call_button_rx, floor_sensor: floor_sensor_rx, obstruction: obstruction_rx },
            txs: LocalElevTxs { call_button: call_button_tx, floor_sensor: floor_sensor_tx, obstruction: obstruction_tx },
        }
    }
}

/// Reports every button that goes from released to pressed.
pub fn call_buttons(elev: Elevator, ch: cbc::Sender<Order>, period: time::Duration) {
    let mut prev = vec![[false; 3]; elev.num_floors.into()];
    loop {
        for f in 0..elev.num_floors {
            for button in ButtonType::ALL {
                match elev.call_button(f, button) {
                    Ok(v) => {
                        if v && !prev[f as usize][button.index()] && ch.send(Order::new(f, button)).is_err() {
                            return;
                        }
                        prev[f as usize][button.index()] = v;
                    }
                    Err(e) => print::err(format!("Failed to read call button: {}", e)),
                }
            }
        }
        thread::sleep(period)
    }
}

/// Reports every new floor the sensor sees. Between floors nothing is sent.
pub fn floor_sensor(elev: Elevator, ch: cbc::Sender<u8>, period: time::Duration) {
    let mut prev = u8::MAX;
    loop {
        match elev.floor_sensor() {
            Ok(Some(f)) if f != prev => {
                if ch.send(f).is_err() {
                    return;
                }
                prev = f;
            }
            Ok(_) => {}
            Err(e) => print::err(format!("Failed to read floor sensor: {}", e)),
        }
        thread::sleep(period)
    }
}

/// Reports every change of the obstruction switch.
pub fn obstruction(elev: Elevator, ch: cbc::Sender<bool>, period: time::Duration) {
    let mut prev = false;
    loop {
        match elev.obstruction() {
            Ok(v) if v != prev => {
                if ch.send(v).is_err() {
                    return;
                }
                prev = v;
            }
            Ok(_) => {}
            Err(e) => print::err(format!("Failed to read obstruction switch: {}", e)),
        }
        thread::sleep(period)
    }
}

/// Starts the polling threads and forwards their readings on `elev_tx`.
///
/// ## Note
/// Spawns OS threads and one blocking tokio task. Must be called from within a tokio runtime.
pub fn start_polling(elevator: Elevator, elev_tx: mpsc::Sender<ElevEvent>) {
    let channels = LocalElevChannels::new();
    let LocalElevChannels { rxs, txs } = channels;

    {
        let elevator = elevator.clone();
        thread::spawn(move || call_buttons(elevator, txs.call_button, config::ELEV_POLL));
    }
    {
        let elevator = elevator.clone();
        thread::spawn(move || floor_sensor(elevator, txs.floor_sensor, config::ELEV_POLL));
    }
    {
        let elevator = elevator.clone();
        thread::spawn(move || obstruction(elevator, txs.obstruction, config::ELEV_POLL));
    }

    tokio::task::spawn_blocking(move || read_from_local_elevator(rxs, elev_tx));
}

/// Forwards readings from the polling threads to the control loop until either side hangs up.
fn read_from_local_elevator(rxs: LocalElevRxs, elev_tx: mpsc::Sender<ElevEvent>) {
    loop {
        let event = cbc::select! {
            recv(rxs.call_button) -> order => order.map(ElevEvent::CallButton),
            recv(rxs.floor_sensor) -> floor => floor.map(ElevEvent::Floor),
            recv(rxs.obstruction) -> obstr => obstr.map(ElevEvent::Obstruction),
        };
        let Ok(event) = event else {
            print::err("Elevator polling stopped".to_string());
            return;
        };
        if elev_tx.blocking_send(event).is_err() {
            return;
        }
    }
}
