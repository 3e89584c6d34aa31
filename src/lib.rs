//! # rrouted library
//!
//! A user-space two-port IPv4 software router: raw AF_PACKET sockets on
//! both interfaces, passive and on-demand ARP resolution with pending-send
//! buffering, TTL/checksum rewriting and ICMP Time Exceeded generation.

// libc
extern crate libc;

// foreign-types
#[macro_use]
extern crate foreign_types;

// itertools
extern crate itertools;

// serde
extern crate serde;
#[macro_use]
extern crate serde_derive;

// deamonize
extern crate daemonize;
use daemonize::Daemonize;

// chrono
extern crate chrono;

// byteorder
extern crate byteorder;

// generic constants
mod constants;
use constants::*;

// debug
mod debug;
use debug::{print_debug, Verbose};

// checksums
mod checksums;

// frame formats
mod frames;
use frames::{ether_to_string, inet_to_string};

// link abstraction
mod link;

// IP to MAC resolution table
mod ip2mac;

// pending send buffers
mod send_buf;

// forwarding engine
mod router;
use router::{Iface, Router};

// operating systems support
mod os;
use os::drivers::PflagOp;
#[cfg(target_os = "linux")]
use os::linux::libc::RawSock;
#[cfg(target_os = "linux")]
use os::linux::netdev;

// config
mod config;
use config::{decode_config, parse_v4, CConfig};

// std
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

/// Library Config Structure
///
/// Includes library configuration parameters
pub struct Config {
    recv_iface: Option<String>,
    send_iface: Option<String>,
    next_router: Option<String>,
    mode: u8,
    conf: Option<String>,
    debug: Option<u8>,
}

// Config Implementation
impl Config {
    // new() method
    pub fn new(
        recv_iface: Option<String>,
        send_iface: Option<String>,
        next_router: Option<String>,
        mode: u8,
        conf: Option<String>,
        debug: Option<u8>,
    ) -> Config {
        Config {
            recv_iface,
            send_iface,
            next_router,
            mode,
            conf,
            debug,
        }
    }
    // recv_iface() getter
    pub fn recv_iface(&self) -> Option<String> {
        self.recv_iface.clone()
    }
    // send_iface() getter
    pub fn send_iface(&self) -> Option<String> {
        self.send_iface.clone()
    }
    // next_router() getter
    pub fn next_router(&self) -> Option<String> {
        self.next_router.clone()
    }
    // mode() getter
    pub fn mode(&self) -> u8 {
        self.mode
    }
    // conf() getter
    pub fn conf(&self) -> String {
        match &self.conf {
            Some(s) => s.clone(),
            // default configuration file path
            None => RROUTED_DFLT_CFG_FILE.to_string(),
        }
    }
    // debug() getter
    pub fn debug(&self) -> Option<u8> {
        self.debug
    }
}

// other_error() function
// shorthand for init failures that are not raw OS errors
fn other_error(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::Other, msg)
}

// disable_ip_forward() function
/// Turn the kernel's own IPv4 forwarding path off so it does not race
/// the user-space router on the same frames. A kernel left forwarding
/// would duplicate every datagram, so a failed write is fatal.
#[cfg(target_os = "linux")]
fn disable_ip_forward(debug: &Verbose) -> io::Result<()> {
    match std::fs::write(RROUTED_PROC_IP_FORWARD, "0\n") {
        Ok(_) => {
            print_debug(
                debug,
                DEBUG_LEVEL_HIGH,
                DEBUG_SRC_MAIN,
                format!("kernel ip_forward disabled"),
            );
            Ok(())
        }
        Err(e) => Err(io::Error::new(
            e.kind(),
            format!("cannot write {}: {}", RROUTED_PROC_IP_FORWARD, e),
        )),
    }
}

// open_iface() function
/// Open one port: raw socket bound to the interface, optional
/// promiscuous flag, then MAC/address/netmask discovery
#[cfg(target_os = "linux")]
fn open_iface(
    port: usize,
    ifname: &str,
    ip_only: bool,
    promisc: bool,
    debug: &Verbose,
) -> io::Result<Iface<RawSock>> {
    let link = RawSock::open(ifname, ip_only)?;
    if promisc {
        netdev::set_if_promiscuous(ifname, PflagOp::Set, debug)?;
    }
    let hw = netdev::get_mac_addr(ifname, debug)?;
    let (ip, netmask) = netdev::get_ifaddr4(ifname)?;
    let iface = Iface::new(ifname.to_string(), link, hw, ip, netmask);

    // interface banner
    print_debug(
        debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!("[{}] {}: {}", port, ifname, ether_to_string(&iface.hw)),
    );
    print_debug(
        debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!("[{}] {}: {}", port, ifname, inet_to_string(&iface.ip)),
    );
    print_debug(
        debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!("[{}] {}: {}", port, ifname, inet_to_string(&iface.network)),
    );
    print_debug(
        debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!("[{}] {}: {}", port, ifname, inet_to_string(&iface.netmask)),
    );

    Ok(iface)
}

// run_router() function
/// Library entry point: bring both ports up, start the forwarding engine
/// worker and wait for the shutdown flag
#[cfg(target_os = "linux")]
pub fn run_router(cfg: &Config, shutdown: Arc<AtomicBool>) -> io::Result<()> {
    // raw sockets and the netdevice ioctls below require root
    if unsafe { libc::geteuid() } != 0 {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "rrouted must be run as root",
        ));
    }

    // read the configuration file when present
    let file_cfg = if Path::new(&cfg.conf()).exists() {
        decode_config(cfg.conf())
    } else {
        CConfig::default()
    };

    // command line level first, then configuration file
    let debug_level = match cfg.debug() {
        Some(v) => v,
        None => file_cfg.debug(),
    };
    let debug = Verbose::new(debug_level, file_cfg.time_zone(), file_cfg.time_format());
    print_debug(
        &debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!(
            "{} v{} starting, debug level {}",
            RROUTED_NAME,
            RROUTED_VERSION,
            debug.level()
        ),
    );

    let router_cfg = file_cfg.router.as_ref();

    // resolve interface names and next hop, command line overriding file
    let recv_ifname = cfg
        .recv_iface()
        .or_else(|| router_cfg.and_then(|r| r.receiving_interface()))
        .ok_or_else(|| other_error(format!("no receiving interface configured (-r)")))?;
    let send_ifname = cfg
        .send_iface()
        .or_else(|| router_cfg.and_then(|r| r.sending_interface()))
        .ok_or_else(|| other_error(format!("no sending interface configured (-s)")))?;
    let next_router = cfg
        .next_router()
        .or_else(|| router_cfg.and_then(|r| r.next_router()))
        .ok_or_else(|| other_error(format!("no next-hop router configured (-n)")))?;
    let next_router = parse_v4(&next_router)
        .ok_or_else(|| other_error(format!("invalid next-hop address {}", next_router)))?;

    let promisc = router_cfg.map(|r| r.promiscuous()).unwrap_or(true);
    let ip_only = router_cfg.map(|r| r.ip_only()).unwrap_or(false);
    let cache_size = router_cfg
        .map(|r| r.arp_cache_size())
        .unwrap_or(IP2MAC_TABLE_SIZE);
    let pending_limit = router_cfg
        .map(|r| r.pending_limit())
        .unwrap_or(PENDING_QUEUE_MAX_BYTES);

    // if the mode is 2, then daemonize
    if cfg.mode() == 2 {
        // create log files
        let stdout = File::create(file_cfg.main_log())?;
        let stderr = File::create(file_cfg.error_log())?;
        // initialize the daemon
        let daemon = Daemonize::new()
            .pid_file(file_cfg.pid())
            .chown_pid_file(true)
            .working_directory(file_cfg.working_dir())
            .user("root")
            .group("root")
            .umask(0o027)
            .stdout(stdout)
            .stderr(stderr);
        // daemonize the process
        match daemon.start() {
            Ok(_) => println!("{} (v{}) daemon started", RROUTED_NAME, RROUTED_VERSION),
            Err(e) => eprintln!("Error while starting rrouted daemon: {}", e),
        }
    }

    // keep the kernel out of the forwarding business
    disable_ip_forward(&debug)?;

    // bring both ports up; an ip-only socket cannot observe ARP replies
    if ip_only {
        print_debug(
            &debug,
            DEBUG_LEVEL_INFO,
            DEBUG_SRC_MAIN,
            format!("warning: ip_only capture leaves ARP replies unseen"),
        );
    }
    let iface0 = open_iface(0, &recv_ifname, ip_only, promisc, &debug)?;
    let iface1 = open_iface(1, &send_ifname, ip_only, promisc, &debug)?;

    print_debug(
        &debug,
        DEBUG_LEVEL_LOW,
        DEBUG_SRC_MAIN,
        format!(
            "forwarding between {} and {}, next router {}",
            recv_ifname,
            send_ifname,
            inet_to_string(&next_router)
        ),
    );

    // the worker owns both sockets and all resolution state; this thread
    // only waits for it to observe the shutdown flag
    let mut engine = Router::new(
        [iface0, iface1],
        next_router,
        cache_size,
        pending_limit,
        debug.clone(),
    );
    let worker_shutdown = Arc::clone(&shutdown);
    let worker_debug = debug.clone();
    let worker = thread::Builder::new()
        .name("engine".to_string())
        .spawn(move || {
            print_debug(
                &worker_debug,
                DEBUG_LEVEL_EXTENSIVE,
                DEBUG_SRC_THREAD,
                format!("spawning engine worker thread"),
            );
            engine.run(&worker_shutdown)
        })?;

    let result = match worker.join() {
        Ok(r) => r,
        Err(_) => Err(other_error(format!("engine worker thread panicked"))),
    };

    // drop the promiscuous flag on the way out
    for ifname in [&recv_ifname, &send_ifname].iter() {
        if promisc {
            if let Err(e) = netdev::set_if_promiscuous(ifname.as_str(), PflagOp::Unset, &debug) {
                print_debug(
                    &debug,
                    DEBUG_LEVEL_LOW,
                    DEBUG_SRC_MAIN,
                    format!("cannot unset promiscuous flag on {}: {}", ifname, e),
                );
            }
        }
    }

    result
}
