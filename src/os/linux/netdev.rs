//! linux specific network device functions module
//! This module interfaces with the linux netdevice kernel API and related
//! networking functions of the standard C library.
use crate::constants::*;
use crate::debug::{print_debug, Verbose};
use crate::os::drivers::PflagOp;

// libc
use libc::{
    c_short, ioctl, AF_INET, ARPHRD_ETHER, ETH_ALEN, IFF_PROMISC, IFF_RUNNING, IFF_UP, IF_NAMESIZE,
    SOCK_DGRAM,
};

// foreign_types
use foreign_types::{ForeignType, ForeignTypeRef};

// std
use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;
use std::ptr;

/// ioctl_flags Structure
#[repr(C)]
struct ioctl_flags {
    ifr_name: [u8; IF_NAMESIZE],
    ifr_flags: c_short,
}

/// ioctl_ether_mac Structure
#[repr(C)]
#[derive(Debug)]
struct ioctl_ether_mac {
    ifr_name: [u8; IF_NAMESIZE],
    ifr_hwaddr: int_sockaddr_ether,
}

/// internal int_sockaddr_ether Structure
#[derive(Debug)]
#[repr(C)]
struct int_sockaddr_ether {
    sa_family: u16,
    sa_data: [u8; ETH_ALEN as usize],
}

// ifname_buf() function
// copy an interface name into a fixed-size, nul-terminated ioctl buffer
fn ifname_buf(ifname: &str) -> io::Result<[u8; IF_NAMESIZE]> {
    let mut buf = [0u8; IF_NAMESIZE];
    if ifname.len() >= IF_NAMESIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("interface name is longer than {}", IF_NAMESIZE - 1),
        ));
    }
    buf[..ifname.len()].copy_from_slice(ifname.as_bytes());
    Ok(buf)
}

// inet_ioctl_fd() function
// short-lived AF_INET datagram socket carrying the netdevice ioctls
fn inet_ioctl_fd() -> io::Result<i32> {
    unsafe {
        match libc::socket(AF_INET, SOCK_DGRAM, 0) {
            -1 => Err(io::Error::last_os_error()),
            fd => Ok(fd),
        }
    }
}

// set_if_promiscuous() function
/// Set (or Unset) interface in promiscuous mode
pub fn set_if_promiscuous(ifname: &str, op: PflagOp, debug: &Verbose) -> io::Result<()> {
    let sockfd = inet_ioctl_fd()?;

    // construct ioctl_flags structure
    let mut ifopts = ioctl_flags {
        ifr_name: ifname_buf(ifname)?,
        ifr_flags: 0,
    };

    // operation to perform on promiscuous flag
    match op {
        PflagOp::Set => {
            print_debug(
                debug,
                DEBUG_LEVEL_HIGH,
                DEBUG_SRC_NETDEV,
                format!("setting promiscuous flag on interface {}", ifname),
            );
            // set the flags to UP,RUNNING,PROMISC using bitwise OR operation.
            ifopts.ifr_flags |= IFF_UP as c_short | IFF_RUNNING as c_short | IFF_PROMISC as c_short;
        }
        PflagOp::Unset => {
            print_debug(
                debug,
                DEBUG_LEVEL_HIGH,
                DEBUG_SRC_NETDEV,
                format!("unsetting promiscuous flag on interface {}", ifname),
            );
            // unset PROMISC flag
            ifopts.ifr_flags |= IFF_UP as c_short | IFF_RUNNING as c_short;
        }
    }

    let res = unsafe { ioctl(sockfd, libc::SIOCSIFFLAGS, &mut ifopts) };
    if res < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(sockfd) };
        return Err(err);
    }

    unsafe { libc::close(sockfd) };
    Ok(())
}

// get_mac_addr() function
/// Get the MAC address of an interface
pub fn get_mac_addr(ifname: &str, debug: &Verbose) -> io::Result<[u8; 6]> {
    let sockfd = inet_ioctl_fd()?;

    // constuct ifmac structure
    let mut ifmac = ioctl_ether_mac {
        ifr_name: ifname_buf(ifname)?,
        ifr_hwaddr: int_sockaddr_ether {
            sa_family: 0,
            sa_data: [0u8; ETH_ALEN as usize],
        },
    };

    let result = unsafe { ioctl(sockfd, libc::SIOCGIFHWADDR, &mut ifmac) };
    if result < 0 {
        let err = io::Error::last_os_error();
        unsafe { libc::close(sockfd) };
        return Err(err);
    }
    unsafe { libc::close(sockfd) };

    if ifmac.ifr_hwaddr.sa_family != ARPHRD_ETHER as u16 {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("interface {} has no ethernet address", ifname),
        ));
    }

    print_debug(
        debug,
        DEBUG_LEVEL_HIGH,
        DEBUG_SRC_NETDEV,
        format!(
            "got interface {} mac address: {:?}",
            ifname, ifmac.ifr_hwaddr.sa_data
        ),
    );

    // return the mac address
    Ok(ifmac.ifr_hwaddr.sa_data)
}

// libc-like getifaddrs() function implementation
/// Credit to sfackler: https://gist.github.com/sfackler/d614e6c130f3462f443e6c0c6255383a
foreign_type! {
    #[derive(Debug)]
    pub unsafe type IfAddrs: Sync + Send {
        type CType = libc::ifaddrs;
        fn drop = libc::freeifaddrs;
    }
}

impl IfAddrs {
    pub fn get() -> io::Result<IfAddrs> {
        unsafe {
            let mut ifaddrs = ptr::null_mut();
            let r = libc::getifaddrs(&mut ifaddrs);
            if r == 0 {
                Ok(IfAddrs::from_ptr(ifaddrs))
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}

impl IfAddrsRef {
    // next() method
    pub fn next(&self) -> Option<&IfAddrsRef> {
        unsafe {
            let next = (*self.as_ptr()).ifa_next;
            if next.is_null() {
                None
            } else {
                Some(IfAddrsRef::from_ptr(next))
            }
        }
    }

    // name() method
    pub fn name(&self) -> &str {
        unsafe {
            let s = CStr::from_ptr((*self.as_ptr()).ifa_name);
            s.to_str().unwrap()
        }
    }

    // addr4() method
    // the entry's address, when it carries an IPv4 one
    pub fn addr4(&self) -> Option<[u8; 4]> {
        unsafe { sockaddr_v4_octets((*self.as_ptr()).ifa_addr) }
    }

    // netmask4() method
    pub fn netmask4(&self) -> Option<[u8; 4]> {
        unsafe { sockaddr_v4_octets((*self.as_ptr()).ifa_netmask) }
    }

    pub fn iter<'a>(&'a self) -> Iter<'a> {
        Iter(Some(self))
    }
}

// sockaddr_v4_octets() function
// read the IPv4 octets out of a nullable sockaddr pointer
unsafe fn sockaddr_v4_octets(addr: *mut libc::sockaddr) -> Option<[u8; 4]> {
    if addr.is_null() {
        return None;
    }
    match (*addr).sa_family as _ {
        libc::AF_INET => {
            let addr = addr as *mut libc::sockaddr_in;
            let addr = Ipv4Addr::from((*addr).sin_addr.s_addr.to_be());
            Some(addr.octets())
        }
        _ => None,
    }
}

pub struct Iter<'a>(Option<&'a IfAddrsRef>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a IfAddrsRef;

    fn next(&mut self) -> Option<&'a IfAddrsRef> {
        let cur = match self.0 {
            Some(cur) => cur,
            None => return None,
        };

        self.0 = cur.next();
        Some(cur)
    }
}

// get_ifaddr4() function
/// First IPv4 address and netmask configured on the named interface
pub fn get_ifaddr4(ifname: &str) -> io::Result<([u8; 4], [u8; 4])> {
    let addrlist = IfAddrs::get()?;
    for a in addrlist.iter() {
        if a.name().to_lowercase() != ifname {
            continue;
        }
        if let (Some(ip), Some(mask)) = (a.addr4(), a.netmask4()) {
            return Ok((ip, mask));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no IPv4 address configured on interface {}", ifname),
    ))
}

// Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn check_ifaddrs_type() {
        let addrs = IfAddrs::get().unwrap();
        println!(
            "{:?}",
            addrs
                .iter()
                .map(|a| (a.name(), a.addr4()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn check_ifname_buf_too_long() {
        assert!(ifname_buf("a-name-that-does-not-fit-in-ifnamsiz").is_err());
    }
}
