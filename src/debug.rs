//! debugging module
//! This module provides debugging and verbosity related functions.

// chrono
use chrono::{Local, Utc};

/// Verbose Structure
///
/// Holds the debugging level and timestamps preferences
#[derive(Debug, Clone)]
pub struct Verbose {
    level: u8,       // debugging level
    time_zone: u8,   // timestamps time zone: 0(local), 1(utc)
    time_format: u8, // timestamps format: 0(disabled), 1(short), 2(rfc2822)
}

// Verbose Implementation
impl Verbose {
    // new() method
    pub fn new(level: u8, time_zone: u8, time_format: u8) -> Verbose {
        Verbose {
            level,
            time_zone,
            time_format,
        }
    }
    // level() getter
    pub fn level(&self) -> u8 {
        self.level
    }
}

// print_debug() function
/// Print debugging information of the given level and source
pub fn print_debug(debug: &Verbose, msg_level: u8, msg_src: &str, msg: String) {
    if debug.level < msg_level {
        return;
    }
    match debug.time_format {
        // timestamps disabled
        0 => eprintln!("debug({}): {}", msg_src, msg),
        _ => eprintln!("[{}] debug({}): {}", timestamp(debug), msg_src, msg),
    }
}

// timestamp() function
// format the current time according to the configured zone and format
fn timestamp(debug: &Verbose) -> String {
    let fmt = match debug.time_format {
        2 => "%a, %d %b %Y %T %z",
        _ => "%b %e %T",
    };
    match debug.time_zone {
        1 => Utc::now().format(fmt).to_string(),
        _ => Local::now().format(fmt).to_string(),
    }
}
