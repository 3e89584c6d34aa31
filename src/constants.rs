//! Constants module
//! This module regroups all the program's and protocols constants.

// Program Constants
pub const RROUTED_DFLT_CFG_FILE: &str = "/etc/rrouted/rrouted.conf";
pub const RROUTED_DFLT_PIDFILE: &str = "/var/run/rrouted.pid";
pub const RROUTED_DFLT_WORKDIR: &str = "/tmp";
pub const RROUTED_DFLT_LOGFILE: &str = "/var/log/rrouted.log";
pub const RROUTED_DFLT_ELOGFILE: &str = "/var/log/rrouted-error.log";
pub const RROUTED_PROC_IP_FORWARD: &str = "/proc/sys/net/ipv4/ip_forward";
pub const RROUTED_NAME: &str = env!("CARGO_PKG_NAME");
pub const RROUTED_VERSION: &str = env!("CARGO_PKG_VERSION");

// Debug Constants
pub const DEBUG_LEVEL_INFO: u8 = 0;
pub const DEBUG_LEVEL_LOW: u8 = 1;
pub const DEBUG_LEVEL_MEDIUM: u8 = 2;
pub const DEBUG_LEVEL_HIGH: u8 = 3;
pub const DEBUG_LEVEL_EXTENSIVE: u8 = 5;
pub const DEBUG_SRC_INFO: &str = "info";
pub const DEBUG_SRC_MAIN: &str = "main";
pub const DEBUG_SRC_ROUTER: &str = "router";
pub const DEBUG_SRC_PACKET: &str = "packet";
pub const DEBUG_SRC_ARP: &str = "arp";
pub const DEBUG_SRC_IP2MAC: &str = "ip2mac";
pub const DEBUG_SRC_BUFFER: &str = "buffer";
pub const DEBUG_SRC_ICMP: &str = "icmp";
pub const DEBUG_SRC_NETDEV: &str = "netdev";
pub const DEBUG_SRC_THREAD: &str = "thread";

// Ethernet Constants
pub const ETHER_P_IP: u16 = 0x0800; // IPv4 (/usr/include/linux/if_ether.h)
pub const ETHER_P_ARP: u16 = 0x0806;
pub const ETHER_P_ALL: u16 = 0x0003;
pub const ETHER_HDR_SIZE: usize = 14;
pub const ETHER_FRAME_MAX: usize = 2048;
pub const ETHER_BROADCAST: [u8; 6] = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff];

// ARP Constants
pub const ARP_HW_TYPE_ETHER: u16 = 1;
pub const ARP_OP_REQUEST: u16 = 1;
pub const ARP_OP_REPLY: u16 = 2;
pub const ARP_HW_ADDR_LEN: u8 = 6;
pub const ARP_PROTO_ADDR_LEN: u8 = 4;
pub const ARP_BODY_SIZE: usize = 28;

// IP Constants
pub const IP_HDR_SIZE: usize = 20;
pub const IP_CHECKSUM_POS: usize = 10; // checksum field offset within the IP header
pub const IP_PROTO_ICMP: u8 = 1;

// ICMP Constants
pub const ICMP_TYPE_TIME_EXCEEDED: u8 = 11;
pub const ICMP_CODE_TTL_IN_TRANSIT: u8 = 0;
pub const ICMP_HDR_SIZE: usize = 8;
pub const ICMP_QUOTED_BYTES: usize = 64; // bytes of the original datagram echoed back
pub const ICMP_REPLY_TTL: u8 = 64;

// Router Constants
pub const ROUTER_PORT_COUNT: usize = 2;
pub const ROUTER_RECV_PORT: usize = 0;
pub const ROUTER_SEND_PORT: usize = 1;
pub const ROUTER_POLL_TIMEOUT: i32 = 1000; // milliseconds
pub const IP2MAC_TABLE_SIZE: usize = 4096;
pub const PENDING_QUEUE_MAX_BYTES: u64 = 1024 * 1024; // per ARP entry
pub const ARP_RESOLVE_TIMEOUT_SECS: u64 = 5;
