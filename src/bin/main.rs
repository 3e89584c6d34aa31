//! # rrouted
//!
//! `rrouted` is a user-space two-port IPv4 software router for Linux.
extern crate rrouted;
use rrouted::{run_router, Config};

// getopts
use getopts::Options;

// std
use std::env;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ctrlc (linux signal handling)
extern crate ctrlc;

/// MyError Type
#[derive(Debug)]
struct MyError(String);

impl std::fmt::Display for MyError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl Error for MyError {}

// print_usage() function
fn print_usage(program: &str, opts: Options) {
    let modes = format!(
        "\
    Modes:
    1 = IPv4 Router (foreground)
    2 = IPv4 Router (daemon)\
    "
    );
    let usage = format!(
        "Usage: {} -r <iface> -s <iface> -n <ip> [options]\n\n{}",
        program, modes
    );
    print!("{}", opts.usage(&usage));
}

// parse_cli_opts() function
fn parse_cli_opts(args: &[String]) -> Result<Config, Box<dyn Error>> {
    let program = args[0].clone();
    let mut opts = Options::new();

    opts.optflag("h", "help", "display help information");
    opts.optopt(
        "r",
        "recv-iface",
        "receiving side ethernet interface",
        "INTERFACE",
    );
    opts.optopt(
        "s",
        "send-iface",
        "sending side ethernet interface",
        "INTERFACE",
    );
    opts.optopt(
        "n",
        "next-hop",
        "IPv4 address of the next router upstream",
        "IPADDR",
    );
    opts.optopt(
        "m",
        "mode",
        "operation modes (see Modes):\n 1(foreground), 2(daemon)",
        "MODE",
    );
    opts.optopt(
        "c",
        "conf",
        "path to configuration file:\n (default to /etc/rrouted/rrouted.conf)",
        "FILE",
    );
    opts.optopt(
        "d",
        "debug",
        "debugging level:\n0(none), 1(low), 2(medium), 3(high), 5(extensive)",
        "LEVEL",
    );

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => return Result::Err(Box::new(MyError(f.to_string().into()))),
    };

    // help command-line option
    if matches.opt_present("help") {
        print_usage(&program, opts);
        std::process::exit(1);
    }

    // mode command-line option
    let mode = matches.opt_str("mode");
    let mode = match mode {
        Some(x) => match x.parse::<u8>() {
            Ok(m @ 1) | Ok(m @ 2) => m,
            _ => {
                return Result::Err(Box::new(MyError(
                    format!("Invalid operation mode {} (-m)", x).into(),
                )));
            }
        },
        // foreground unless asked otherwise
        None => 1,
    };

    // interfaces command-line options
    let recv_iface = matches.opt_str("recv-iface");
    let send_iface = matches.opt_str("send-iface");

    // next-hop command-line option
    let next_router = matches.opt_str("next-hop");

    // config command-line option
    let conf = matches.opt_str("conf");

    // debug level command-line option
    let debug = matches.opt_str("debug");
    let debug = match debug {
        Some(x) => match x.parse::<u8>() {
            Ok(v) => Option::Some(v),
            Err(_) => {
                return Result::Err(Box::new(MyError(
                    format!("Invalid debugging level {} (-d)", x).into(),
                )));
            }
        },
        None => None,
    };

    Ok(Config::new(
        recv_iface,
        send_iface,
        next_router,
        mode,
        conf,
        debug,
    ))
}

// run() function
fn run(cfg: Config) -> Result<(), Box<dyn Error>> {
    // print information
    println!("Starting rrouted");

    // register the shutdown flag flipped by SIGINT/SIGTERM
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        eprintln!("Caught termination signal, shutting down...");
        flag.store(true, Ordering::Relaxed);
    })?;

    // start the router
    match run_router(&cfg, shutdown) {
        Ok(_) => Ok(()),
        Err(e) => {
            return Result::Err(Box::new(MyError(
                format!("A runtime error occured: {}", e).into(),
            )));
        }
    }
}

// main() function
fn main() {
    let args: Vec<String> = env::args().collect();

    match parse_cli_opts(&args) {
        // error while parsing cli options
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
        // if a configuration is returned from the parser
        Ok(c) => match run(c) {
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
            Ok(_) => {
                std::process::exit(0);
            }
        },
    }
}
