//! ## Printing Module
//!
//! This module is only here to make logging in the terminal easier to read.
//! It prints in appropriate colors depending on the situation, and every
//! level can be switched off at runtime through its toggle in [`crate::config`].
use crate::config;
use ansi_term::Colour::{self, Green, Red, Yellow, Purple, Cyan};

use once_cell::sync::Lazy;
use std::sync::Mutex;

/// Reads a print toggle. A poisoned toggle still prints.
fn enabled(toggle: &Lazy<Mutex<bool>>) -> bool {
    toggle.lock().map(|on| *on).unwrap_or(true)
}

/// Prints an error message in red to the terminal.
///
/// If `PRINT_ERR_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[ERROR\]:   {}", msg
///
/// ## Example
/// ```
/// use elevator_ring::print;
///
/// print::err("Something went wrong!".to_string());
/// ```
pub fn err(msg: String) {
    if enabled(&config::PRINT_ERR_ON) {
        println!("{}{}\n", Red.paint("[ERROR]:   "), Red.paint(msg));
    }
}

/// Prints a warning message in yellow to the terminal.
///
/// If `PRINT_WARN_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[WARNING\]: {}", msg
pub fn warn(msg: String) {
    if enabled(&config::PRINT_WARN_ON) {
        println!("{}{}\n", Yellow.paint("[WARNING]: "), Yellow.paint(msg));
    }
}

/// Prints a success message in green to the terminal.
///
/// If `PRINT_OK_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[OK\]:      {}", msg
pub fn ok(msg: String) {
    if enabled(&config::PRINT_OK_ON) {
        println!("{}{}\n", Green.paint("[OK]:      "), Green.paint(msg));
    }
}

/// Prints an informational message in light blue to the terminal.
///
/// If `PRINT_INFO_ON` is `false`, the message will not be printed.
///
/// ## Terminal output
/// - "\[INFO\]:    {}", msg
pub fn info(msg: String) {
    let light_blue = Colour::RGB(102, 178, 255);
    if enabled(&config::PRINT_INFO_ON) {
        println!("{}{}\n", light_blue.paint("[INFO]:    "), light_blue.paint(msg));
    }
}

/// Prints ring and topology changes in purple.
///
/// ## Terminal output
/// - "\[RING\]:    {}", msg
pub fn ring(msg: String) {
    if enabled(&config::PRINT_RING_ON) {
        println!("{}{}\n", Purple.paint("[RING]:    "), Purple.paint(msg));
    }
}

/// Prints car state transitions in cyan.
pub fn fsm(msg: String) {
    if enabled(&config::PRINT_FSM_ON) {
        println!("{}{}\n", Cyan.paint("[FSM]:     "), Cyan.paint(msg));
    }
}
