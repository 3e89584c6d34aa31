//! router module
//! This module implements the forwarding engine: the receive loop over
//! both ports, the forwarding decision, ICMP Time Exceeded generation and
//! the pending-queue flush that follows address resolution.
use crate::constants::*;
use crate::debug::{print_debug, Verbose};
use crate::frames::{
    self, ether_to_string, inet_to_string, ArpView, EthernetView, Ipv4View,
};
use crate::ip2mac::{ArpState, Ip2MacTable};
use crate::link::Link;

// std
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

/// Iface Structure
/// Immutable description of one attached port and its link
pub struct Iface<L: Link> {
    pub name: String,
    pub link: L,
    pub hw: [u8; 6],
    pub ip: [u8; 4],
    pub netmask: [u8; 4],
    pub network: [u8; 4],
}

// Iface Implementation
impl<L: Link> Iface<L> {
    // new() method
    pub fn new(name: String, link: L, hw: [u8; 6], ip: [u8; 4], netmask: [u8; 4]) -> Iface<L> {
        let network = mask4(&ip, &netmask);
        Iface {
            name,
            link,
            hw,
            ip,
            netmask,
            network,
        }
    }
}

// mask4() function
// bitwise AND of an address and a netmask
fn mask4(ip: &[u8; 4], mask: &[u8; 4]) -> [u8; 4] {
    [
        ip[0] & mask[0],
        ip[1] & mask[1],
        ip[2] & mask[2],
        ip[3] & mask[3],
    ]
}

/// Router Structure
/// The forwarding engine owning both ports and the resolution state
pub struct Router<L: Link> {
    ifaces: [Iface<L>; ROUTER_PORT_COUNT],
    next_router: [u8; 4],
    ip2mac: Ip2MacTable,
    debug: Verbose,
}

// Router Implementation
impl<L: Link> Router<L> {
    // new() method
    pub fn new(
        ifaces: [Iface<L>; ROUTER_PORT_COUNT],
        next_router: [u8; 4],
        arp_cache_size: usize,
        pending_limit: u64,
        debug: Verbose,
    ) -> Router<L> {
        Router {
            ifaces,
            next_router,
            ip2mac: Ip2MacTable::new(arp_cache_size, pending_limit),
            debug,
        }
    }

    // run() method
    /// Engine loop on the calling thread: wait on both ports, service at
    /// most one frame each, then flush any resolved pending queues. The
    /// bounded wait keeps the flush running even without traffic.
    #[cfg(target_os = "linux")]
    pub fn run(&mut self, shutdown: &AtomicBool) -> io::Result<()> {
        use crate::os::linux::libc::poll_in;

        let fds = [self.ifaces[0].link.fd(), self.ifaces[1].link.fd()];
        while !shutdown.load(Ordering::Relaxed) {
            let ready = match poll_in(&fds, ROUTER_POLL_TIMEOUT) {
                Ok(r) => r,
                Err(e) => {
                    print_debug(
                        &self.debug,
                        DEBUG_LEVEL_LOW,
                        DEBUG_SRC_ROUTER,
                        format!("poll error: {}", e),
                    );
                    return Err(e);
                }
            };
            self.process_ready(ready);
        }
        print_debug(
            &self.debug,
            DEBUG_LEVEL_LOW,
            DEBUG_SRC_ROUTER,
            format!("shutdown flag set, engine exiting"),
        );
        Ok(())
    }

    // process_ready() method
    /// One engine tick: read a single frame from each ready port, then
    /// run the flush step
    pub fn process_ready(&mut self, ready: [bool; ROUTER_PORT_COUNT]) {
        let mut buf = [0u8; ETHER_FRAME_MAX];
        for port in 0..ROUTER_PORT_COUNT {
            if !ready[port] {
                continue;
            }
            match self.ifaces[port].link.recv(&mut buf) {
                Ok(0) => {}
                Ok(size) => self.analyze_frame(port, &buf[..size]),
                Err(e) => print_debug(
                    &self.debug,
                    DEBUG_LEVEL_LOW,
                    DEBUG_SRC_ROUTER,
                    format!("read error on port {}: {}", port, e),
                ),
            }
        }
        self.flush_resolved();
    }

    // analyze_frame() method
    /// Dispatch one received frame. Frames not addressed to the port's
    /// MAC or to broadcast belong to someone else and are dropped.
    pub fn analyze_frame(&mut self, port: usize, frame: &[u8]) {
        let eth = match EthernetView::parse(frame) {
            Ok(eth) => eth,
            Err(e) => {
                print_debug(
                    &self.debug,
                    DEBUG_LEVEL_HIGH,
                    DEBUG_SRC_PACKET,
                    format!("[{}] {:?} ethernet frame of {} bytes", port, e, frame.len()),
                );
                return;
            }
        };

        let dhost = eth.dhost();
        if dhost != self.ifaces[port].hw && dhost != ETHER_BROADCAST {
            print_debug(
                &self.debug,
                DEBUG_LEVEL_EXTENSIVE,
                DEBUG_SRC_PACKET,
                format!("[{}] dhost {} not for us", port, ether_to_string(&dhost)),
            );
            return;
        }

        match eth.ethertype() {
            ETHER_P_ARP => self.handle_arp(port, &eth),
            ETHER_P_IP => self.handle_ipv4(port, &eth),
            _ => {} // other ethertypes are dropped silently
        }
    }

    // handle_arp() method
    /// Passive learning: both REQUEST and REPLY carry a usable sender
    /// binding. A learn over an entry with pending frames queues a flush
    /// demand. The router never answers requests for its own addresses.
    fn handle_arp(&mut self, port: usize, eth: &EthernetView) {
        let arp = match ArpView::parse(eth.payload()) {
            Ok(arp) => arp,
            Err(e) => {
                print_debug(
                    &self.debug,
                    DEBUG_LEVEL_HIGH,
                    DEBUG_SRC_ARP,
                    format!("[{}] {:?} arp frame", port, e),
                );
                return;
            }
        };

        let op = arp.opcode();
        if op != ARP_OP_REQUEST && op != ARP_OP_REPLY {
            return;
        }

        print_debug(
            &self.debug,
            DEBUG_LEVEL_HIGH,
            DEBUG_SRC_ARP,
            format!(
                "[{}] recv {}: {} is at {}",
                port,
                if op == ARP_OP_REQUEST { "request" } else { "reply" },
                inet_to_string(&arp.spa()),
                ether_to_string(&arp.sha())
            ),
        );

        let (index, _) = self
            .ip2mac
            .get_or_insert(port, arp.spa(), Some(arp.sha()), &self.debug);
        if !self.ip2mac.entry(index).pending().is_empty() {
            self.ip2mac.push_request(port, index);
        }
    }

    // handle_ipv4() method
    /// The forwarding path: TTL policing, local-address drop, egress
    /// decision, header rewrite and next-hop resolution.
    fn handle_ipv4(&mut self, port: usize, eth: &EthernetView) {
        let ip = match Ipv4View::parse(eth.payload()) {
            Ok(ip) => ip,
            Err(e) => {
                print_debug(
                    &self.debug,
                    DEBUG_LEVEL_HIGH,
                    DEBUG_SRC_PACKET,
                    format!("[{}] {:?} ipv4 datagram", port, e),
                );
                return;
            }
        };

        if ip.ttl() <= 1 {
            print_debug(
                &self.debug,
                DEBUG_LEVEL_MEDIUM,
                DEBUG_SRC_ICMP,
                format!("[{}] ttl expired from {}", port, inet_to_string(&ip.saddr())),
            );
            self.send_icmp_time_exceeded(port, eth, &ip);
            return;
        }

        let daddr = ip.daddr();
        if daddr == self.ifaces[0].ip || daddr == self.ifaces[1].ip {
            // no local delivery: this router carries no host stack
            print_debug(
                &self.debug,
                DEBUG_LEVEL_MEDIUM,
                DEBUG_SRC_ROUTER,
                format!("[{}] recv: own address, dropping", port),
            );
            return;
        }

        // egress decision: directly attached subnets first, everything
        // else through the next router upstream
        let (egress, next_hop) = if mask4(&daddr, &self.ifaces[0].netmask) == self.ifaces[0].network
        {
            (0, daddr)
        } else if mask4(&daddr, &self.ifaces[1].netmask) == self.ifaces[1].network {
            (1, daddr)
        } else {
            (1, self.next_router)
        };

        let out = frames::build_forward_frame(&self.ifaces[egress].hw, ip.header(), ip.payload());

        let (index, created) = self.ip2mac.get_or_insert(egress, next_hop, None, &self.debug);
        match self.ip2mac.entry(index).state() {
            ArpState::Resolved => {
                let mac = self.ip2mac.entry(index).mac();
                let mut out = out;
                frames::patch_dhost(&mut out, &mac);
                self.write_frame(egress, &out);
            }
            ArpState::Resolving => {
                let dropped = self.ip2mac.entry_mut(index).pending_mut().append(out);
                if dropped > 0 {
                    print_debug(
                        &self.debug,
                        DEBUG_LEVEL_MEDIUM,
                        DEBUG_SRC_BUFFER,
                        format!(
                            "[{}] pending queue for {} over limit, {} frames dropped",
                            egress,
                            inet_to_string(&next_hop),
                            dropped
                        ),
                    );
                }
                // one request per FREE to RESOLVING edge; re-visits while
                // a reply is outstanding stay quiet
                if created {
                    let request = frames::build_arp_request(
                        &self.ifaces[egress].hw,
                        &self.ifaces[egress].ip,
                        &next_hop,
                    );
                    print_debug(
                        &self.debug,
                        DEBUG_LEVEL_HIGH,
                        DEBUG_SRC_ARP,
                        format!(
                            "[{}] who-has {} tell {}",
                            egress,
                            inet_to_string(&next_hop),
                            inet_to_string(&self.ifaces[egress].ip)
                        ),
                    );
                    self.write_frame(egress, &request);
                }
                self.ip2mac.push_request(egress, index);
            }
            ArpState::Failed => {
                print_debug(
                    &self.debug,
                    DEBUG_LEVEL_MEDIUM,
                    DEBUG_SRC_ROUTER,
                    format!(
                        "[{}] resolution of {} failed, dropping",
                        egress,
                        inet_to_string(&next_hop)
                    ),
                );
            }
            ArpState::Free => {} // unreachable after get_or_insert
        }
    }

    // send_icmp_time_exceeded() method
    /// Emit the type 11 code 0 reply back out the ingress port, quoting
    /// the expired datagram. Best effort, never retransmitted.
    fn send_icmp_time_exceeded(&mut self, port: usize, eth: &EthernetView, ip: &Ipv4View) {
        let reply = frames::build_time_exceeded(
            &self.ifaces[port].hw,
            &eth.shost(),
            &self.ifaces[port].ip,
            &ip.saddr(),
            ip.as_bytes(),
        );
        self.write_frame(port, &reply);
    }

    // flush_resolved() method
    /// Drain the resolution request queue. Resolved entries have their
    /// pending frames patched and transmitted in order; requests for
    /// entries still resolving are dropped (a later learn or demand will
    /// queue a new one) unless the resolution deadline has passed.
    fn flush_resolved(&mut self) {
        while let Some(request) = self.ip2mac.pop_request() {
            match self.ip2mac.entry(request.index).state() {
                ArpState::Resolved => {
                    let port = self.ip2mac.entry(request.index).port();
                    let mac = self.ip2mac.entry(request.index).mac();
                    loop {
                        let mut frame =
                            match self.ip2mac.entry_mut(request.index).pending_mut().pop_head() {
                                Some(frame) => frame,
                                None => break,
                            };
                        frames::patch_dhost(&mut frame, &mac);
                        self.write_frame(port, &frame);
                    }
                }
                ArpState::Resolving => {
                    if self.ip2mac.resolving_expired(request.index) {
                        print_debug(
                            &self.debug,
                            DEBUG_LEVEL_MEDIUM,
                            DEBUG_SRC_IP2MAC,
                            format!(
                                "resolution of {} timed out",
                                inet_to_string(&self.ip2mac.entry(request.index).ip())
                            ),
                        );
                        self.ip2mac.mark_failed(request.index, &self.debug);
                    }
                }
                ArpState::Failed | ArpState::Free => {
                    let discarded = self
                        .ip2mac
                        .entry_mut(request.index)
                        .pending_mut()
                        .discard_all();
                    if discarded > 0 {
                        print_debug(
                            &self.debug,
                            DEBUG_LEVEL_MEDIUM,
                            DEBUG_SRC_BUFFER,
                            format!("{} stale pending frames discarded", discarded),
                        );
                    }
                }
            }
        }
    }

    // write_frame() method
    /// Single best-effort raw transmit with byte accounting. Short or
    /// failed writes are logged, never retried.
    fn write_frame(&mut self, port: usize, frame: &[u8]) {
        match self.ifaces[port].link.send(frame) {
            Ok(n) if n == frame.len() => print_debug(
                &self.debug,
                DEBUG_LEVEL_HIGH,
                DEBUG_SRC_ROUTER,
                format!("write:[{}] {} bytes", port, n),
            ),
            Ok(n) => print_debug(
                &self.debug,
                DEBUG_LEVEL_LOW,
                DEBUG_SRC_ROUTER,
                format!(
                    "short write on {} ({} of {} bytes)",
                    self.ifaces[port].name,
                    n,
                    frame.len()
                ),
            ),
            Err(e) => print_debug(
                &self.debug,
                DEBUG_LEVEL_LOW,
                DEBUG_SRC_ROUTER,
                format!("write error on {}: {}", self.ifaces[port].name, e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, NetworkEndian};

    use crate::checksums::rfc1071;

    const HW0: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
    const HW1: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x10];
    const HOST_HW: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x99];
    const PEER_HW: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x02];
    const IP0: [u8; 4] = [192, 168, 1, 1];
    const IP1: [u8; 4] = [10, 0, 0, 1];
    const NEXT_ROUTER: [u8; 4] = [10, 0, 0, 254];

    /// in-memory link capturing every transmitted frame
    struct MemLink {
        sent: Vec<Vec<u8>>,
    }

    impl MemLink {
        fn new() -> MemLink {
            MemLink { sent: Vec::new() }
        }
    }

    impl Link for MemLink {
        fn send(&mut self, frame: &[u8]) -> io::Result<usize> {
            self.sent.push(frame.to_vec());
            Ok(frame.len())
        }
        fn recv(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn fd(&self) -> i32 {
            -1
        }
    }

    fn test_router() -> Router<MemLink> {
        let iface0 = Iface::new(
            "test0".to_string(),
            MemLink::new(),
            HW0,
            IP0,
            [255, 255, 255, 0],
        );
        let iface1 = Iface::new(
            "test1".to_string(),
            MemLink::new(),
            HW1,
            IP1,
            [255, 255, 255, 0],
        );
        Router::new(
            [iface0, iface1],
            NEXT_ROUTER,
            64,
            PENDING_QUEUE_MAX_BYTES,
            Verbose::new(0, 0, 0),
        )
    }

    fn ipv4_frame(
        dst_mac: [u8; 6],
        src_mac: [u8; 6],
        src_ip: [u8; 4],
        dst_ip: [u8; 4],
        ttl: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&dst_mac);
        frame.extend_from_slice(&src_mac);
        frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());

        let mut ip = vec![0x45u8, 0x00];
        ip.extend_from_slice(&((IP_HDR_SIZE + payload.len()) as u16).to_be_bytes());
        ip.extend_from_slice(&[0, 0, 0, 0]); // id, frag_off
        ip.push(ttl);
        ip.push(17); // UDP, opaque to the router
        ip.extend_from_slice(&[0, 0]); // checksum placeholder
        ip.extend_from_slice(&src_ip);
        ip.extend_from_slice(&dst_ip);
        let csum = crate::checksums::internet_checksum(&ip);
        NetworkEndian::write_u16(&mut ip[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], csum);
        ip.extend_from_slice(payload);

        frame.extend_from_slice(&ip);
        frame
    }

    fn arp_frame(
        op: u16,
        dst_mac: [u8; 6],
        src_mac: [u8; 6],
        sha: [u8; 6],
        spa: [u8; 4],
        tha: [u8; 6],
        tpa: [u8; 4],
    ) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&dst_mac);
        frame.extend_from_slice(&src_mac);
        frame.extend_from_slice(&ETHER_P_ARP.to_be_bytes());
        frame.extend_from_slice(&ARP_HW_TYPE_ETHER.to_be_bytes());
        frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());
        frame.push(ARP_HW_ADDR_LEN);
        frame.push(ARP_PROTO_ADDR_LEN);
        frame.extend_from_slice(&op.to_be_bytes());
        frame.extend_from_slice(&sha);
        frame.extend_from_slice(&spa);
        frame.extend_from_slice(&tha);
        frame.extend_from_slice(&tpa);
        frame
    }

    #[test]
    fn test_forward_with_resolved_mac() {
        let mut router = test_router();
        router
            .ip2mac
            .get_or_insert(1, [10, 0, 0, 2], Some(PEER_HW), &router.debug.clone());

        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &ingress);

        assert!(router.ifaces[0].link.sent.is_empty());
        assert_eq!(router.ifaces[1].link.sent.len(), 1);

        let out = &router.ifaces[1].link.sent[0];
        let eth = EthernetView::parse(out).unwrap();
        assert_eq!(eth.dhost(), PEER_HW);
        assert_eq!(eth.shost(), HW1);
        assert_eq!(eth.ethertype(), ETHER_P_IP);

        let ip = Ipv4View::parse(eth.payload()).unwrap();
        assert_eq!(ip.ttl(), 63);
        assert_eq!(ip.saddr(), [192, 168, 1, 5]);
        assert_eq!(ip.daddr(), [10, 0, 0, 2]);
        assert_eq!(ip.payload(), b"PING");
        assert_eq!(rfc1071(ip.header()), 0xFFFF);
    }

    #[test]
    fn test_forward_triggers_arp_then_flush() {
        let mut router = test_router();

        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &ingress);

        // one ARP request went out, no IPv4 yet
        assert_eq!(router.ifaces[1].link.sent.len(), 1);
        let req = &router.ifaces[1].link.sent[0];
        let eth = EthernetView::parse(req).unwrap();
        assert_eq!(eth.dhost(), ETHER_BROADCAST);
        assert_eq!(eth.shost(), HW1);
        let arp = ArpView::parse(eth.payload()).unwrap();
        assert_eq!(arp.opcode(), ARP_OP_REQUEST);
        assert_eq!(arp.spa(), IP1);
        assert_eq!(arp.tpa(), [10, 0, 0, 2]);

        // the datagram sits in the pending queue: 14 + 20 + 4 bytes
        let index = router.ip2mac.search(1, [10, 0, 0, 2]).unwrap();
        assert_eq!(router.ip2mac.entry(index).state(), ArpState::Resolving);
        assert_eq!(router.ip2mac.entry(index).pending().count(), 1);
        assert_eq!(router.ip2mac.entry(index).pending().total_bytes(), 38);

        // a second datagram while resolving queues up without a new request
        router.analyze_frame(0, &ingress);
        assert_eq!(router.ifaces[1].link.sent.len(), 1);
        assert_eq!(router.ip2mac.entry(index).pending().count(), 2);

        // the reply lands and the next tick flushes both in order
        let reply = arp_frame(
            ARP_OP_REPLY,
            HW1,
            PEER_HW,
            PEER_HW,
            [10, 0, 0, 2],
            HW1,
            IP1,
        );
        router.analyze_frame(1, &reply);
        router.flush_resolved();

        assert_eq!(router.ifaces[1].link.sent.len(), 3);
        for out in &router.ifaces[1].link.sent[1..] {
            let eth = EthernetView::parse(out).unwrap();
            assert_eq!(eth.dhost(), PEER_HW);
            assert_eq!(eth.shost(), HW1);
            let ip = Ipv4View::parse(eth.payload()).unwrap();
            assert_eq!(ip.ttl(), 63);
            assert_eq!(ip.payload(), b"PING");
            assert_eq!(rfc1071(ip.header()), 0xFFFF);
        }
        assert!(router.ip2mac.entry(index).pending().is_empty());
    }

    #[test]
    fn test_ttl_expired_generates_icmp() {
        let mut router = test_router();
        router
            .ip2mac
            .get_or_insert(1, [10, 0, 0, 2], Some(PEER_HW), &router.debug.clone());

        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 1, b"PING");
        router.analyze_frame(0, &ingress);

        // nothing forwarded
        assert!(router.ifaces[1].link.sent.is_empty());
        assert_eq!(router.ifaces[0].link.sent.len(), 1);

        let out = &router.ifaces[0].link.sent[0];
        let eth = EthernetView::parse(out).unwrap();
        assert_eq!(eth.dhost(), HOST_HW);
        assert_eq!(eth.shost(), HW0);

        let reply = eth.payload();
        assert_eq!(reply[9], IP_PROTO_ICMP);
        assert_eq!(&reply[12..16], &IP0);
        assert_eq!(&reply[16..20], &[192, 168, 1, 5]);
        assert_eq!(rfc1071(&reply[..IP_HDR_SIZE]), 0xFFFF);

        let icmp = &reply[IP_HDR_SIZE..];
        assert_eq!(icmp[0], ICMP_TYPE_TIME_EXCEEDED);
        assert_eq!(icmp[1], ICMP_CODE_TTL_IN_TRANSIT);
        assert_eq!(rfc1071(icmp), 0xFFFF);
        // the quote opens with the expired datagram's header
        let original_ip = &ingress[ETHER_HDR_SIZE..];
        assert_eq!(&icmp[ICMP_HDR_SIZE..ICMP_HDR_SIZE + original_ip.len()], original_ip);
    }

    #[test]
    fn test_ttl_zero_also_generates_icmp() {
        let mut router = test_router();
        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 0, b"PING");
        router.analyze_frame(0, &ingress);
        assert_eq!(router.ifaces[0].link.sent.len(), 1);
        assert!(router.ifaces[1].link.sent.is_empty());
    }

    #[test]
    fn test_passive_learn_via_broadcast_request() {
        let mut router = test_router();

        let request = arp_frame(
            ARP_OP_REQUEST,
            ETHER_BROADCAST,
            [0x02, 0, 0, 0, 0, 0x05],
            [0x02, 0, 0, 0, 0, 0x05],
            [10, 0, 0, 5],
            [0; 6],
            IP1,
        );
        router.analyze_frame(1, &request);

        // learned without answering
        assert!(router.ifaces[0].link.sent.is_empty());
        assert!(router.ifaces[1].link.sent.is_empty());
        let index = router.ip2mac.search(1, [10, 0, 0, 5]).unwrap();
        assert_eq!(router.ip2mac.entry(index).state(), ArpState::Resolved);
        assert_eq!(router.ip2mac.entry(index).mac(), [0x02, 0, 0, 0, 0, 0x05]);

        // forwarding toward the learned host goes straight out
        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 5], 64, b"PING");
        router.analyze_frame(0, &ingress);
        assert_eq!(router.ifaces[1].link.sent.len(), 1);
        let eth = EthernetView::parse(&router.ifaces[1].link.sent[0]).unwrap();
        assert_eq!(eth.dhost(), [0x02, 0, 0, 0, 0, 0x05]);
    }

    #[test]
    fn test_self_addressed_dropped() {
        let mut router = test_router();
        for dst in [IP0, IP1].iter() {
            let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], *dst, 64, b"PING");
            router.analyze_frame(0, &ingress);
        }
        assert!(router.ifaces[0].link.sent.is_empty());
        assert!(router.ifaces[1].link.sent.is_empty());
        // the cache was never consulted for the local addresses
        assert!(router.ip2mac.search(0, IP0).is_none());
        assert!(router.ip2mac.search(1, IP1).is_none());
    }

    #[test]
    fn test_default_route_resolves_next_router() {
        let mut router = test_router();
        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [8, 8, 8, 8], 64, b"PING");
        router.analyze_frame(0, &ingress);

        // off-subnet destination resolves the configured next router
        assert_eq!(router.ifaces[1].link.sent.len(), 1);
        let eth = EthernetView::parse(&router.ifaces[1].link.sent[0]).unwrap();
        let arp = ArpView::parse(eth.payload()).unwrap();
        assert_eq!(arp.tpa(), NEXT_ROUTER);
        assert!(router.ip2mac.search(1, NEXT_ROUTER).is_some());
    }

    #[test]
    fn test_subnet_zero_forwards_back_out_port_zero() {
        let mut router = test_router();
        router
            .ip2mac
            .get_or_insert(0, [192, 168, 1, 7], Some(HOST_HW), &router.debug.clone());

        // a datagram arriving on port 1 for port 0's subnet
        let ingress = ipv4_frame(HW1, PEER_HW, [10, 0, 0, 2], [192, 168, 1, 7], 64, b"PONG");
        router.analyze_frame(1, &ingress);

        assert!(router.ifaces[1].link.sent.is_empty());
        assert_eq!(router.ifaces[0].link.sent.len(), 1);
        let eth = EthernetView::parse(&router.ifaces[0].link.sent[0]).unwrap();
        assert_eq!(eth.dhost(), HOST_HW);
        assert_eq!(eth.shost(), HW0);
    }

    #[test]
    fn test_foreign_dhost_dropped() {
        let mut router = test_router();
        let ingress = ipv4_frame(
            [0x02, 0, 0, 0, 0, 0x42],
            HOST_HW,
            [192, 168, 1, 5],
            [10, 0, 0, 2],
            64,
            b"PING",
        );
        router.analyze_frame(0, &ingress);
        assert!(router.ifaces[0].link.sent.is_empty());
        assert!(router.ifaces[1].link.sent.is_empty());
    }

    #[test]
    fn test_unknown_ethertype_dropped() {
        let mut router = test_router();
        let mut frame = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        NetworkEndian::write_u16(&mut frame[12..14], 0x86dd); // IPv6
        router.analyze_frame(0, &frame);
        assert!(router.ifaces[0].link.sent.is_empty());
        assert!(router.ifaces[1].link.sent.is_empty());
    }

    #[test]
    fn test_truncated_ipv4_dropped() {
        let mut router = test_router();
        let frame = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &frame[..ETHER_HDR_SIZE + 10]);
        assert!(router.ifaces[1].link.sent.is_empty());
    }

    #[test]
    fn test_options_forwarded_verbatim() {
        let mut router = test_router();
        router
            .ip2mac
            .get_or_insert(1, [10, 0, 0, 2], Some(PEER_HW), &router.debug.clone());

        // hand-build a frame with one 4-byte option word (IHL 6)
        let options = [0x07u8, 0x04, 0x00, 0x00];
        let mut frame = Vec::new();
        frame.extend_from_slice(&HW0);
        frame.extend_from_slice(&HOST_HW);
        frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());
        let mut ip = vec![0x46u8, 0x00];
        ip.extend_from_slice(&(28u16).to_be_bytes());
        ip.extend_from_slice(&[0, 0, 0, 0]);
        ip.push(64);
        ip.push(17);
        ip.extend_from_slice(&[0, 0]);
        ip.extend_from_slice(&[192, 168, 1, 5]);
        ip.extend_from_slice(&[10, 0, 0, 2]);
        ip.extend_from_slice(&options);
        let csum = crate::checksums::internet_checksum(&ip);
        NetworkEndian::write_u16(&mut ip[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], csum);
        ip.extend_from_slice(b"DATA");
        frame.extend_from_slice(&ip);

        router.analyze_frame(0, &frame);

        assert_eq!(router.ifaces[1].link.sent.len(), 1);
        let eth = EthernetView::parse(&router.ifaces[1].link.sent[0]).unwrap();
        let out = Ipv4View::parse(eth.payload()).unwrap();
        assert_eq!(out.ttl(), 63);
        assert_eq!(out.options(), &options);
        assert_eq!(out.payload(), b"DATA");
        assert_eq!(rfc1071(out.header()), 0xFFFF);
    }

    #[test]
    fn test_failed_entry_drops_demand() {
        let mut router = test_router();
        let (index, _) = router
            .ip2mac
            .get_or_insert(1, [10, 0, 0, 2], None, &router.debug.clone());
        router.ifaces[1].link.sent.clear();
        router.ip2mac.mark_failed(index, &router.debug.clone());

        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &ingress);
        // no forward, no new ARP request
        assert!(router.ifaces[1].link.sent.is_empty());
        assert!(router.ip2mac.entry(index).pending().is_empty());
    }

    #[test]
    fn test_flush_drops_request_while_still_resolving() {
        let mut router = test_router();
        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &ingress);
        let index = router.ip2mac.search(1, [10, 0, 0, 2]).unwrap();

        router.flush_resolved();
        // request consumed, pending frames untouched
        assert!(router.ip2mac.pop_request().is_none());
        assert_eq!(router.ip2mac.entry(index).pending().count(), 1);
        assert_eq!(router.ip2mac.entry(index).state(), ArpState::Resolving);
    }

    #[test]
    fn test_process_tick_flushes_after_learn() {
        let mut router = test_router();
        let ingress = ipv4_frame(HW0, HOST_HW, [192, 168, 1, 5], [10, 0, 0, 2], 64, b"PING");
        router.analyze_frame(0, &ingress);
        let reply = arp_frame(
            ARP_OP_REPLY,
            HW1,
            PEER_HW,
            PEER_HW,
            [10, 0, 0, 2],
            HW1,
            IP1,
        );
        router.analyze_frame(1, &reply);

        // a tick with no ready ports still runs the flush step
        router.process_ready([false, false]);
        assert_eq!(router.ifaces[1].link.sent.len(), 2);
    }
}
