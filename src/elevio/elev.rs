//! TCP client for the elevator server (hardware interface or simulator).
//!
//! Every command is a 4-byte frame; reads answer with a 4-byte frame on the same socket.

use std::fmt;
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};

use crate::print;
use crate::world_view::Dirn;
use super::{ButtonType, ElevatorDriver};

/// Handle to a connected elevator server. Cheap to clone, all clones share the socket.
#[derive(Clone, Debug)]
pub struct Elevator {
    socket: Arc<Mutex<TcpStream>>,
    pub num_floors: u8,
}

impl Elevator {
    /// Connects to the elevator server at `addr`.
    pub fn init(addr: &str, num_floors: u8) -> io::Result<Elevator> {
        Ok(Self {
            socket: Arc::new(Mutex::new(TcpStream::connect(addr)?)),
            num_floors,
        })
    }

    fn write(&self, buf: [u8; 4]) -> io::Result<()> {
        let mut sock = self
            .socket
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "elevator socket lock poisoned"))?;
        sock.write_all(&buf)
    }

    fn query(&self, buf: [u8; 4]) -> io::Result<[u8; 4]> {
        let mut sock = self
            .socket
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "elevator socket lock poisoned"))?;
        sock.write_all(&buf)?;
        let mut reply = [0u8; 4];
        sock.read_exact(&mut reply)?;
        Ok(reply)
    }

    pub fn motor_direction(&self, dirn: Dirn) -> io::Result<()> {
        self.write([1, dirn.motor_byte(), 0, 0])
    }

    pub fn call_button_light(&self, floor: u8, button: ButtonType, on: bool) -> io::Result<()> {
        self.write([2, button as u8, floor, on as u8])
    }

    pub fn floor_indicator(&self, floor: u8) -> io::Result<()> {
        self.write([3, floor, 0, 0])
    }

    pub fn door_light(&self, on: bool) -> io::Result<()> {
        self.write([4, on as u8, 0, 0])
    }

    pub fn call_button(&self, floor: u8, button: ButtonType) -> io::Result<bool> {
        let reply = self.query([6, button as u8, floor, 0])?;
        Ok(reply[1] != 0)
    }

    /// Current floor, `None` while between floors.
    pub fn floor_sensor(&self) -> io::Result<Option<u8>> {
        let reply = self.query([7, 0, 0, 0])?;
        Ok(if reply[1] != 0 { Some(reply[2]) } else { None })
    }

    pub fn obstruction(&self) -> io::Result<bool> {
        let reply = self.query([9, 0, 0, 0])?;
        Ok(reply[1] != 0)
    }
}

fn log_io(what: &str, result: io::Result<()>) {
    if let Err(e) = result {
        print::err(format!("Elevator driver failed to {}: {}", what, e));
    }
}

impl ElevatorDriver for Elevator {
    fn set_motor_direction(&self, dirn: Dirn) {
        log_io("set motor direction", self.motor_direction(dirn));
    }

    fn set_door_lamp(&self, on: bool) {
        log_io("set door lamp", self.door_light(on));
    }

    fn set_floor_indicator(&self, floor: u8) {
        log_io("set floor indicator", self.floor_indicator(floor));
    }

    fn set_button_lamp(&self, button: ButtonType, floor: u8, on: bool) {
        log_io("set button lamp", self.call_button_light(floor, button, on));
    }
}

impl fmt::Display for Elevator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addr = self
            .socket
            .lock()
            .ok()
            .and_then(|sock| sock.peer_addr().ok());
        match addr {
            Some(addr) => write!(f, "Elevator@{}({})", addr, self.num_floors),
            None => write!(f, "Elevator@?({})", self.num_floors),
        }
    }
}
