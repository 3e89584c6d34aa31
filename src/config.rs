//! configuration file handling module
//! This module provides structure and methods related to configuration
//! file handling.
use crate::constants::*;

// std
use std::net::IpAddr;

/// Main Configuration Structure
#[derive(Debug, Default, Deserialize)]
pub struct CConfig {
    pub debug: Option<u8>,
    pub time_zone: Option<String>,
    pub time_format: Option<String>,
    pub pid: Option<String>,
    pub working_dir: Option<String>,
    pub main_log: Option<String>,
    pub error_log: Option<String>,
    pub router: Option<RConfig>,
}

impl CConfig {
    // debug() getter
    pub fn debug(&self) -> u8 {
        match self.debug {
            Some(v) => v,
            None => DEBUG_LEVEL_INFO,
        }
    }
    // time_zone() getter
    pub fn time_zone(&self) -> u8 {
        match &self.time_zone {
            Some(s) => match &s[..] {
                "local" => 0,
                "utc" => 1,
                _ => 0,
            },
            None => 0,
        }
    }
    // time_format() getter
    pub fn time_format(&self) -> u8 {
        match &self.time_format {
            Some(s) => match &s[..] {
                "disabled" => 0,
                "short" => 1,
                "rfc2822" => 2,
                _ => 0,
            },
            None => 0,
        }
    }
    // pid() getter
    pub fn pid(&self) -> String {
        match &self.pid {
            Some(v) => v.clone(),
            None => RROUTED_DFLT_PIDFILE.to_string(),
        }
    }
    // working_dir() getter
    pub fn working_dir(&self) -> String {
        match &self.working_dir {
            Some(v) => v.clone(),
            None => RROUTED_DFLT_WORKDIR.to_string(),
        }
    }
    // main_log() getter
    pub fn main_log(&self) -> String {
        match &self.main_log {
            Some(v) => v.clone(),
            None => RROUTED_DFLT_LOGFILE.to_string(),
        }
    }
    // error_log() getter
    pub fn error_log(&self) -> String {
        match &self.error_log {
            Some(v) => v.clone(),
            None => RROUTED_DFLT_ELOGFILE.to_string(),
        }
    }
}

/// Router Configuration Structure
#[derive(Debug, Default, Deserialize)]
pub struct RConfig {
    receiving_interface: Option<String>,
    sending_interface: Option<String>,
    next_router: Option<String>,
    promiscuous: Option<bool>,
    ip_only: Option<bool>,
    arp_cache_size: Option<usize>,
    pending_limit: Option<u64>,
}

impl RConfig {
    // receiving_interface() getter
    pub fn receiving_interface(&self) -> Option<String> {
        self.receiving_interface.clone()
    }
    // sending_interface() getter
    pub fn sending_interface(&self) -> Option<String> {
        self.sending_interface.clone()
    }
    // next_router() getter
    pub fn next_router(&self) -> Option<String> {
        self.next_router.clone()
    }
    // promiscuous() getter
    pub fn promiscuous(&self) -> bool {
        match self.promiscuous {
            Some(b) => b,
            None => true,
        }
    }
    // ip_only() getter
    pub fn ip_only(&self) -> bool {
        match self.ip_only {
            Some(b) => b,
            None => false,
        }
    }
    // arp_cache_size() getter
    pub fn arp_cache_size(&self) -> usize {
        match self.arp_cache_size {
            Some(v) => {
                if v < 1 {
                    panic!("error(config): the ARP cache needs at least one slot")
                }
                v
            }
            None => IP2MAC_TABLE_SIZE,
        }
    }
    // pending_limit() getter
    pub fn pending_limit(&self) -> u64 {
        match self.pending_limit {
            Some(v) => v,
            None => PENDING_QUEUE_MAX_BYTES,
        }
    }
}

// parse_v4() function
/// convert an IPv4 address string to an array of four 8-bits unsigned
/// integers
pub fn parse_v4(addr: &str) -> Option<[u8; 4]> {
    match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Some(ip.octets()),
        _ => None,
    }
}

// decode_config() function
/// read and decode configuration file
pub fn decode_config(filename: String) -> CConfig {
    let file = std::fs::read_to_string(filename).expect("Cannot read rrouted configuration file");
    let config: CConfig = match toml::from_str(&file) {
        Ok(c) => c,
        Err(e) => panic!("error(config): Cannot parse configuration file:\n {}", e),
    };
    // return config
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_router_table() {
        let raw = r#"
            debug = 3
            time_format = "short"
            [router]
            receiving_interface = "eth0"
            sending_interface = "eth1"
            next_router = "10.0.0.254"
            arp_cache_size = 128
        "#;
        let config: CConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.debug(), 3);
        assert_eq!(config.time_format(), 1);
        let router = config.router.unwrap();
        assert_eq!(router.receiving_interface().unwrap(), "eth0");
        assert_eq!(router.sending_interface().unwrap(), "eth1");
        assert_eq!(router.next_router().unwrap(), "10.0.0.254");
        assert_eq!(router.arp_cache_size(), 128);
        assert_eq!(router.pending_limit(), PENDING_QUEUE_MAX_BYTES);
        assert!(router.promiscuous());
        assert!(!router.ip_only());
    }

    #[test]
    fn test_parse_v4() {
        assert_eq!(parse_v4("169.254.238.208"), Some([169, 254, 238, 208]));
        assert_eq!(parse_v4("fe80::1"), None);
        assert_eq!(parse_v4("not-an-address"), None);
    }
}
