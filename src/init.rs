//! Startup: command line, configuration and the driver connection.

use anyhow::Context;
use clap::Parser;

use crate::config::{self, ConfigError, ElevConfig};
use crate::elevio::elev::Elevator;
use crate::print;

/// One elevator node in a ring of cooperating elevators.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "elevator_ring", version, about)]
pub struct Args {
    /// This node's ID, in 0..num
    #[arg(long)]
    pub id: u8,

    /// Number of nodes in the system
    #[arg(long)]
    pub num: u8,

    /// Base UDP port. Heartbeats use it, node n receives on bport + 1 + n
    #[arg(long, default_value_t = config::DEFAULT_BASE_PORT)]
    pub bport: u16,

    /// TCP port of the local elevator server
    #[arg(long, default_value_t = config::DEFAULT_SERVER_PORT)]
    pub sport: u16,

    /// Number of floors
    #[arg(long, default_value_t = config::DEFAULT_NUM_FLOORS)]
    pub floors: u8,

    /// Only print error messages
    #[arg(long)]
    pub debug: bool,
}

/// Accepts the single-dash long flags (`-id 0 -num 3`) by rewriting them to `--id 0 --num 3`.
pub fn normalize_args<I: IntoIterator<Item = String>>(args: I) -> Vec<String> {
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            let single_dash_long = match arg.strip_prefix('-') {
                Some(rest) => rest.len() > 1 && !rest.starts_with('-') && rest.parse::<i64>().is_err(),
                None => false,
            };
            if i > 0 && single_dash_long {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

/// Parses the command line from `args` (program name first).
pub fn try_parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, clap::Error> {
    Args::try_parse_from(normalize_args(args))
}

/// Parses the process arguments.
///
/// `--help` and `--version` print and exit with 0, anything invalid prints usage and exits
/// with 1.
pub fn parse_args() -> Args {
    match try_parse_args(std::env::args()) {
        Ok(args) => {
            if args.debug {
                set_debug_printing();
            }
            args
        }
        Err(e) if e.use_stderr() => {
            let _ = e.print();
            std::process::exit(1);
        }
        Err(e) => e.exit(),
    }
}

/// Debug mode: only errors are printed.
fn set_debug_printing() {
    for toggle in [
        &config::PRINT_WARN_ON,
        &config::PRINT_OK_ON,
        &config::PRINT_INFO_ON,
        &config::PRINT_RING_ON,
        &config::PRINT_FSM_ON,
    ] {
        if let Ok(mut on) = toggle.lock() {
            *on = false;
        }
    }
}

/// Validated configuration for the parsed arguments.
pub fn build_config(args: &Args) -> Result<ElevConfig, ConfigError> {
    ElevConfig::new(args.id, args.num, args.floors, config::DOOR_OPEN_DURATION, args.bport)
}

/// Connects to the local elevator server and reads the floor the car is at, if any.
pub fn init_driver(config: &ElevConfig, server_port: u16) -> anyhow::Result<(Elevator, Option<u8>)> {
    let addr = format!("{}:{}", config::LOCAL_ELEV_HOST, server_port);
    let elevator = Elevator::init(&addr, config.num_floors)
        .with_context(|| format!("could not connect to elevator server at {}", addr))?;
    print::ok(format!("Connected to elevator server: {}", elevator));

    let floor = elevator
        .floor_sensor()
        .context("could not read the floor sensor")?;
    Ok((elevator, floor))
}


#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn single_dash_long_flags_are_accepted() {
        let parsed = try_parse_args(args("elevator_ring -id 1 -num 3 -bport 30000")).unwrap();
        assert_eq!((parsed.id, parsed.num, parsed.bport), (1, 3, 30000));
        assert_eq!(parsed.sport, config::DEFAULT_SERVER_PORT);
        assert_eq!(parsed.floors, config::DEFAULT_NUM_FLOORS);
    }

    #[test]
    fn double_dash_flags_and_defaults() {
        let parsed = try_parse_args(args("elevator_ring --id 0 --num 2 --sport 15658 --floors 6")).unwrap();
        assert_eq!((parsed.id, parsed.num, parsed.sport, parsed.floors), (0, 2, 15658, 6));
        assert_eq!(parsed.bport, config::DEFAULT_BASE_PORT);
        assert!(!parsed.debug);
    }

    #[test]
    fn missing_or_bad_flags_are_errors() {
        assert!(try_parse_args(args("elevator_ring --id 0")).is_err());
        assert!(try_parse_args(args("elevator_ring --id zero --num 2")).is_err());
        assert!(try_parse_args(args("elevator_ring --id 0 --num 2 --bport 70000")).is_err());
    }

    #[test]
    fn help_is_not_a_usage_error() {
        let e = try_parse_args(args("elevator_ring --help")).unwrap_err();
        assert!(!e.use_stderr());
    }

    #[test]
    fn program_name_and_values_are_left_alone() {
        assert_eq!(normalize_args(args("-prog -id -5")), args("-prog --id -5"));
    }

    #[test]
    fn config_rejects_id_outside_system() {
        let parsed = try_parse_args(args("elevator_ring --id 3 --num 3")).unwrap();
        assert!(matches!(build_config(&parsed), Err(ConfigError::NodeIdOutOfRange { .. })));

        let parsed = try_parse_args(args("elevator_ring --id 2 --num 3")).unwrap();
        let config = build_config(&parsed).unwrap();
        assert_eq!(config.node_id, 2);
        assert_eq!(config.message_port(2), config::DEFAULT_BASE_PORT + 3);
    }
}
