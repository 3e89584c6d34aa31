//! Linux standard C library compatibility
//! Raw AF_PACKET socket plumbing for the forwarding engine.
use crate::constants::*;
use crate::link::Link;

// libc
use libc::{
    c_void, nfds_t, poll, pollfd, read, sockaddr, sockaddr_ll, socket, write, AF_PACKET, POLLERR,
    POLLIN, SOCK_RAW,
};

// std
use std::ffi::CString;
use std::io;
use std::mem;

// open_raw_socket_fd() function
/// Open a raw AF_PACKET socket bound to the named interface, delivering
/// either every frame or IPv4 only
pub fn open_raw_socket_fd(ifname: &str, ip_only: bool) -> io::Result<i32> {
    let protocol = if ip_only { ETHER_P_IP } else { ETHER_P_ALL };

    // man 2 socket
    // returns a file descriptor or -1 if error.
    let fd = unsafe {
        match socket(AF_PACKET, SOCK_RAW, protocol.to_be() as i32) {
            -1 => return Err(io::Error::last_os_error()),
            fd => fd,
        }
    };

    // bind the socket to the interface so only its frames are delivered
    let ifindex = match c_ifnametoindex(ifname) {
        Ok(i) => i as i32,
        Err(e) => {
            unsafe { libc::close(fd) };
            return Err(e);
        }
    };
    let mut sa: sockaddr_ll = unsafe { mem::zeroed() };
    sa.sll_family = AF_PACKET as u16;
    sa.sll_protocol = protocol.to_be();
    sa.sll_ifindex = ifindex;

    unsafe {
        let ptr_sockaddr = mem::transmute::<*mut sockaddr_ll, *mut sockaddr>(&mut sa);
        if libc::bind(fd, ptr_sockaddr, mem::size_of::<sockaddr_ll>() as u32) == -1 {
            let err = io::Error::last_os_error();
            libc::close(fd);
            return Err(err);
        }
    }

    Ok(fd)
}

// c_ifnametoindex() function
/// see 'man 3 if_nametoindex'
pub fn c_ifnametoindex(ifname: &str) -> io::Result<u32> {
    unsafe {
        let c_ifname = CString::new(ifname).unwrap();
        let r = libc::if_nametoindex(c_ifname.as_ptr());
        if r == 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(r)
        }
    }
}

// raw_read() function
/// Receive at most one frame from the raw socket
pub fn raw_read(sockfd: i32, buf: &mut [u8]) -> io::Result<usize> {
    unsafe {
        // unsafe call to read (man 2 read)
        match read(sockfd, buf.as_mut_ptr() as *mut c_void, buf.len()) {
            -1 => Err(io::Error::last_os_error()),
            len => Ok(len as usize),
        }
    }
}

// raw_write() function
/// Transmit one frame on the raw socket, best effort
pub fn raw_write(sockfd: i32, frame: &[u8]) -> io::Result<usize> {
    unsafe {
        // unsafe call to write (man 2 write)
        match write(sockfd, frame.as_ptr() as *const c_void, frame.len()) {
            -1 => Err(io::Error::last_os_error()),
            len => Ok(len as usize),
        }
    }
}

// poll_in() function
/// Wait for input on both descriptors with the given timeout; EINTR is
/// reported as no descriptor ready
pub fn poll_in(fds: &[i32; 2], timeout: i32) -> io::Result<[bool; 2]> {
    let mut targets = [
        pollfd {
            fd: fds[0],
            events: POLLIN | POLLERR,
            revents: 0,
        },
        pollfd {
            fd: fds[1],
            events: POLLIN | POLLERR,
            revents: 0,
        },
    ];

    // man 2 poll
    let ready = unsafe { poll(targets.as_mut_ptr(), targets.len() as nfds_t, timeout) };
    if ready == -1 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok([false, false]);
        }
        return Err(err);
    }

    Ok([
        targets[0].revents & (POLLIN | POLLERR) != 0,
        targets[1].revents & (POLLIN | POLLERR) != 0,
    ])
}

/// RawSock Structure
/// Owned raw packet socket handle
pub struct RawSock {
    fd: i32,
}

// RawSock Implementation
impl RawSock {
    // open() method
    pub fn open(ifname: &str, ip_only: bool) -> io::Result<RawSock> {
        Ok(RawSock {
            fd: open_raw_socket_fd(ifname, ip_only)?,
        })
    }
}

// Link implementation for RawSock
impl Link for RawSock {
    fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
        raw_write(self.fd, frame)
    }
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        raw_read(self.fd, buf)
    }
    fn fd(&self) -> i32 {
        self.fd
    }
}

impl Drop for RawSock {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
