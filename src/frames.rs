//! frames handling module
//! This module provides parse views and builders for the Ethernet, ARP,
//! IPv4 and ICMP formats the router touches on the wire.
use crate::checksums;
use crate::constants::*;

// byteorder
use byteorder::{ByteOrder, NetworkEndian};

// itertools
use itertools::Itertools;

/// Frame Parsing Error Enumerator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameError {
    /// frame shorter than the fixed header it must carry
    Truncated,
    /// header fields inconsistent with the format
    Malformed,
}

pub type FrameResult<T> = Result<T, FrameError>;

// ether_to_string() function
/// Format a MAC address as aa:bb:cc:dd:ee:ff
pub fn ether_to_string(hwaddr: &[u8; 6]) -> String {
    hwaddr.iter().map(|b| format!("{:02x}", b)).join(":")
}

// inet_to_string() function
/// Format an IPv4 address as a dotted quad
pub fn inet_to_string(addr: &[u8; 4]) -> String {
    addr.iter().map(|b| b.to_string()).join(".")
}

/// EthernetView Structure
/// Zero-copy view over a DIX ethernet frame
pub struct EthernetView<'a> {
    buf: &'a [u8],
}

// EthernetView Implementation
impl<'a> EthernetView<'a> {
    // parse() method
    pub fn parse(buf: &'a [u8]) -> FrameResult<EthernetView<'a>> {
        if buf.len() < ETHER_HDR_SIZE {
            return Err(FrameError::Truncated);
        }
        Ok(EthernetView { buf })
    }
    // dhost() getter
    pub fn dhost(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[0..6]);
        mac
    }
    // shost() getter
    pub fn shost(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[6..12]);
        mac
    }
    // ethertype() getter
    pub fn ethertype(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf[12..14])
    }
    // payload() getter
    pub fn payload(&self) -> &'a [u8] {
        &self.buf[ETHER_HDR_SIZE..]
    }
}

/// ArpView Structure
/// Zero-copy view over an ethernet/IPv4 ARP body (RFC826)
pub struct ArpView<'a> {
    buf: &'a [u8],
}

// ArpView Implementation
impl<'a> ArpView<'a> {
    // parse() method
    /// Validate hardware/protocol types and address lengths
    pub fn parse(buf: &'a [u8]) -> FrameResult<ArpView<'a>> {
        if buf.len() < ARP_BODY_SIZE {
            return Err(FrameError::Truncated);
        }
        if NetworkEndian::read_u16(&buf[0..2]) != ARP_HW_TYPE_ETHER
            || NetworkEndian::read_u16(&buf[2..4]) != ETHER_P_IP
            || buf[4] != ARP_HW_ADDR_LEN
            || buf[5] != ARP_PROTO_ADDR_LEN
        {
            return Err(FrameError::Malformed);
        }
        Ok(ArpView { buf })
    }
    // opcode() getter
    pub fn opcode(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf[6..8])
    }
    // sha() getter
    /// sender hardware address
    pub fn sha(&self) -> [u8; 6] {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&self.buf[8..14]);
        mac
    }
    // spa() getter
    /// sender protocol address
    pub fn spa(&self) -> [u8; 4] {
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&self.buf[14..18]);
        ip
    }
    // tpa() getter
    /// target protocol address
    pub fn tpa(&self) -> [u8; 4] {
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&self.buf[24..28]);
        ip
    }
}

/// Ipv4View Structure
/// Zero-copy view over an IPv4 datagram (RFC791)
pub struct Ipv4View<'a> {
    buf: &'a [u8],
    header_len: usize,
}

// Ipv4View Implementation
impl<'a> Ipv4View<'a> {
    // parse() method
    /// Validate version, header length and total length bounds
    pub fn parse(buf: &'a [u8]) -> FrameResult<Ipv4View<'a>> {
        if buf.len() < IP_HDR_SIZE {
            return Err(FrameError::Truncated);
        }
        if buf[0] >> 4 != 4 {
            return Err(FrameError::Malformed);
        }
        let ihl = (buf[0] & 0x0f) as usize;
        if ihl < 5 {
            return Err(FrameError::Malformed);
        }
        // an IHL of 15 words bounds the options at 40 bytes
        let header_len = ihl * 4;
        if header_len > buf.len() {
            return Err(FrameError::Truncated);
        }
        let total_len = NetworkEndian::read_u16(&buf[2..4]) as usize;
        if total_len < header_len {
            return Err(FrameError::Malformed);
        }
        if total_len > buf.len() {
            return Err(FrameError::Truncated);
        }
        Ok(Ipv4View { buf, header_len })
    }
    // header_len() getter
    pub fn header_len(&self) -> usize {
        self.header_len
    }
    // total_len() getter
    pub fn total_len(&self) -> u16 {
        NetworkEndian::read_u16(&self.buf[2..4])
    }
    // ttl() getter
    pub fn ttl(&self) -> u8 {
        self.buf[8]
    }
    // protocol() getter
    pub fn protocol(&self) -> u8 {
        self.buf[9]
    }
    // saddr() getter
    pub fn saddr(&self) -> [u8; 4] {
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&self.buf[12..16]);
        ip
    }
    // daddr() getter
    pub fn daddr(&self) -> [u8; 4] {
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&self.buf[16..20]);
        ip
    }
    // header() getter
    /// fixed header plus options
    pub fn header(&self) -> &'a [u8] {
        &self.buf[..self.header_len]
    }
    // options() getter
    pub fn options(&self) -> &'a [u8] {
        &self.buf[IP_HDR_SIZE..self.header_len]
    }
    // payload() getter
    /// everything received past the header, carried verbatim on forward
    pub fn payload(&self) -> &'a [u8] {
        &self.buf[self.header_len..]
    }
    // as_bytes() getter
    /// the whole datagram as received
    pub fn as_bytes(&self) -> &'a [u8] {
        self.buf
    }
}

// build_arp_request() function
/// Assemble a broadcast who-has frame for the given target
pub fn build_arp_request(src_mac: &[u8; 6], src_ip: &[u8; 4], target_ip: &[u8; 4]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ETHER_HDR_SIZE + ARP_BODY_SIZE);

    // ethernet header
    frame.extend_from_slice(&ETHER_BROADCAST);
    frame.extend_from_slice(src_mac);
    frame.extend_from_slice(&ETHER_P_ARP.to_be_bytes());

    // arp body
    frame.extend_from_slice(&ARP_HW_TYPE_ETHER.to_be_bytes());
    frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());
    frame.push(ARP_HW_ADDR_LEN);
    frame.push(ARP_PROTO_ADDR_LEN);
    frame.extend_from_slice(&ARP_OP_REQUEST.to_be_bytes());
    frame.extend_from_slice(src_mac);
    frame.extend_from_slice(src_ip);
    frame.extend_from_slice(&[0u8; 6]); // target hardware address unknown
    frame.extend_from_slice(target_ip);

    frame
}

// build_forward_frame() function
/// Assemble the egress copy of a datagram being forwarded: the TTL is
/// decremented and the header checksum refreshed; the destination MAC is
/// left zeroed to be patched once resolution completes
pub fn build_forward_frame(src_mac: &[u8; 6], header: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ETHER_HDR_SIZE + header.len() + payload.len());

    frame.extend_from_slice(&[0u8; 6]);
    frame.extend_from_slice(src_mac);
    frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());
    frame.extend_from_slice(header);
    frame.extend_from_slice(payload);

    let ip = &mut frame[ETHER_HDR_SIZE..ETHER_HDR_SIZE + header.len()];
    ip[8] -= 1; // TTL
    let csum = checksums::one_complement_sum(ip, Some(IP_CHECKSUM_POS));
    NetworkEndian::write_u16(&mut ip[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], csum);

    frame
}

// patch_dhost() function
/// Write the resolved destination MAC into a serialized frame
pub fn patch_dhost(frame: &mut [u8], mac: &[u8; 6]) {
    frame[0..6].copy_from_slice(mac);
}

// build_time_exceeded() function
/// Assemble an ICMP Time Exceeded (type 11, code 0) reply quoting the
/// first 64 bytes of the original datagram. The IPv4 total length field
/// counts only the ICMP portion, not the 20-byte header.
pub fn build_time_exceeded(
    src_mac: &[u8; 6],
    dst_mac: &[u8; 6],
    src_ip: &[u8; 4],
    dst_ip: &[u8; 4],
    original: &[u8],
) -> Vec<u8> {
    // quote the leading bytes of the offending datagram, zero padded
    let mut quoted = [0u8; ICMP_QUOTED_BYTES];
    let n = original.len().min(ICMP_QUOTED_BYTES);
    quoted[..n].copy_from_slice(&original[..n]);

    // icmp header: type, code, checksum, unused
    let mut icmp = [0u8; ICMP_HDR_SIZE];
    icmp[0] = ICMP_TYPE_TIME_EXCEEDED;
    icmp[1] = ICMP_CODE_TTL_IN_TRANSIT;
    let icmp_csum = checksums::internet_checksum_cat(&icmp, &quoted);
    NetworkEndian::write_u16(&mut icmp[2..4], icmp_csum);

    // ipv4 header
    let mut ip = [0u8; IP_HDR_SIZE];
    ip[0] = 0x45; // version 4, IHL 5
    NetworkEndian::write_u16(
        &mut ip[2..4],
        (ICMP_HDR_SIZE + ICMP_QUOTED_BYTES) as u16, // tot_len quirk, see above
    );
    ip[8] = ICMP_REPLY_TTL;
    ip[9] = IP_PROTO_ICMP;
    ip[12..16].copy_from_slice(src_ip);
    ip[16..20].copy_from_slice(dst_ip);
    let ip_csum = checksums::internet_checksum(&ip);
    NetworkEndian::write_u16(&mut ip[IP_CHECKSUM_POS..IP_CHECKSUM_POS + 2], ip_csum);

    let mut frame =
        Vec::with_capacity(ETHER_HDR_SIZE + IP_HDR_SIZE + ICMP_HDR_SIZE + ICMP_QUOTED_BYTES);
    frame.extend_from_slice(dst_mac);
    frame.extend_from_slice(src_mac);
    frame.extend_from_slice(&ETHER_P_IP.to_be_bytes());
    frame.extend_from_slice(&ip);
    frame.extend_from_slice(&icmp);
    frame.extend_from_slice(&quoted);

    frame
}
