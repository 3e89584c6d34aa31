//! ip2mac module
//! This module implements the fixed-capacity table mapping (port, IPv4)
//! pairs to resolved MAC addresses, the per-entry pending queues and the
//! resolution request FIFO the forwarding engine drains out of band.
use crate::constants::*;
use crate::debug::{print_debug, Verbose};
use crate::frames::inet_to_string;
use crate::send_buf::SendQueue;

// std
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// ArpState Enumerator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArpState {
    Free,      // slot carries no binding
    Resolving, // request emitted, reply outstanding
    Resolved,  // mac field is valid
    Failed,    // resolution gave up, demand discards
}

/// ArpEntry Structure
pub struct ArpEntry {
    state: ArpState,
    port: usize,
    ip: [u8; 4],
    mac: [u8; 6],
    last_touch: u64,          // logical stamp driving LRU reclamation
    resolving_since: Instant, // deadline base for the Failed transition
    pending: SendQueue,
}

// ArpEntry Implementation
impl ArpEntry {
    fn new(pending_limit: u64) -> ArpEntry {
        ArpEntry {
            state: ArpState::Free,
            port: 0,
            ip: [0; 4],
            mac: [0; 6],
            last_touch: 0,
            resolving_since: Instant::now(),
            pending: SendQueue::new(pending_limit),
        }
    }
    // state() getter
    pub fn state(&self) -> ArpState {
        self.state
    }
    // port() getter
    pub fn port(&self) -> usize {
        self.port
    }
    // ip() getter
    pub fn ip(&self) -> [u8; 4] {
        self.ip
    }
    // mac() getter
    /// only meaningful while the entry is Resolved
    pub fn mac(&self) -> [u8; 6] {
        self.mac
    }
    // pending() getter
    pub fn pending(&self) -> &SendQueue {
        &self.pending
    }
    // pending_mut() getter
    pub fn pending_mut(&mut self) -> &mut SendQueue {
        &mut self.pending
    }
}

/// ResolveRequest Structure
/// A deferred flush demand for one table slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveRequest {
    pub port: usize,
    pub index: usize,
}

/// Ip2MacTable Structure
pub struct Ip2MacTable {
    entries: Vec<ArpEntry>,
    requests: VecDeque<ResolveRequest>,
    clock: u64,
    pending_limit: u64,
}

// Ip2MacTable Implementation
impl Ip2MacTable {
    // new() method
    pub fn new(capacity: usize, pending_limit: u64) -> Ip2MacTable {
        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            entries.push(ArpEntry::new(pending_limit));
        }
        Ip2MacTable {
            entries,
            requests: VecDeque::new(),
            clock: 0,
            pending_limit,
        }
    }

    // tick() method
    // advance the logical clock used for LRU stamps
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    // search() method
    /// Find the slot bound to (port, ip), without side effects
    pub fn search(&self, port: usize, ip: [u8; 4]) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.state != ArpState::Free && e.port == port && e.ip == ip)
    }

    // get_or_insert() method
    /// Look up or create the entry for (port, ip), refreshing its LRU
    /// stamp. A learned MAC upgrades any state directly to Resolved; a
    /// demand with no MAC creates entries in Resolving. Returns the slot
    /// index and whether the entry was newly created.
    pub fn get_or_insert(
        &mut self,
        port: usize,
        ip: [u8; 4],
        learned_mac: Option<[u8; 6]>,
        debug: &Verbose,
    ) -> (usize, bool) {
        let now = self.tick();

        if let Some(index) = self.search(port, ip) {
            let entry = &mut self.entries[index];
            entry.last_touch = now;
            if let Some(mac) = learned_mac {
                entry.mac = mac;
                entry.state = ArpState::Resolved;
            }
            return (index, false);
        }

        // take the first free slot, or reclaim the least recently
        // touched entry when the table is full
        let index = match self.entries.iter().position(|e| e.state == ArpState::Free) {
            Some(index) => index,
            None => {
                let victim = self
                    .entries
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, e)| e.last_touch)
                    .map(|(i, _)| i)
                    .unwrap();
                let evicted = &self.entries[victim];
                print_debug(
                    debug,
                    DEBUG_LEVEL_MEDIUM,
                    DEBUG_SRC_IP2MAC,
                    format!(
                        "table full, evicting {} on port {} with {} pending frames",
                        inet_to_string(&evicted.ip),
                        evicted.port,
                        evicted.pending.count()
                    ),
                );
                victim
            }
        };

        let entry = &mut self.entries[index];
        entry.port = port;
        entry.ip = ip;
        entry.last_touch = now;
        entry.resolving_since = Instant::now();
        entry.pending.discard_all();
        match learned_mac {
            Some(mac) => {
                entry.mac = mac;
                entry.state = ArpState::Resolved;
            }
            None => {
                entry.mac = [0; 6];
                entry.state = ArpState::Resolving;
            }
        }
        (index, true)
    }

    // mark_resolved() method
    /// Record a resolved binding and make the entry eligible for flush
    pub fn mark_resolved(&mut self, index: usize, mac: [u8; 6]) {
        let now = self.tick();
        let entry = &mut self.entries[index];
        entry.state = ArpState::Resolved;
        entry.mac = mac;
        entry.last_touch = now;
    }

    // mark_failed() method
    /// Give up on the entry and discard its pending frames
    pub fn mark_failed(&mut self, index: usize, debug: &Verbose) {
        let entry = &mut self.entries[index];
        entry.state = ArpState::Failed;
        let discarded = entry.pending.discard_all();
        if discarded > 0 {
            print_debug(
                debug,
                DEBUG_LEVEL_MEDIUM,
                DEBUG_SRC_IP2MAC,
                format!(
                    "resolution of {} on port {} failed, {} pending frames discarded",
                    inet_to_string(&entry.ip),
                    entry.port,
                    discarded
                ),
            );
        }
    }

    // resolving_expired() method
    /// Whether the entry has been stuck in Resolving past the deadline
    pub fn resolving_expired(&self, index: usize) -> bool {
        let entry = &self.entries[index];
        entry.state == ArpState::Resolving
            && entry.resolving_since.elapsed() >= Duration::from_secs(ARP_RESOLVE_TIMEOUT_SECS)
    }

    // entry() getter
    pub fn entry(&self, index: usize) -> &ArpEntry {
        &self.entries[index]
    }

    // entry_mut() getter
    pub fn entry_mut(&mut self, index: usize) -> &mut ArpEntry {
        &mut self.entries[index]
    }

    // push_request() method
    /// Queue a deferred flush demand for the slot
    pub fn push_request(&mut self, port: usize, index: usize) {
        self.requests.push_back(ResolveRequest { port, index });
    }

    // pop_request() method
    pub fn pop_request(&mut self) -> Option<ResolveRequest> {
        self.requests.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize) -> Ip2MacTable {
        Ip2MacTable::new(capacity, PENDING_QUEUE_MAX_BYTES)
    }

    fn quiet() -> Verbose {
        Verbose::new(0, 0, 0)
    }

    fn ip(i: u8) -> [u8; 4] {
        [10, 0, 0, i]
    }

    fn mac(i: u8) -> [u8; 6] {
        [0xaa, 0xbb, 0xcc, 0xdd, 0xee, i]
    }

    // count the non-free slots bound to a key
    fn bindings(t: &Ip2MacTable, port: usize, addr: [u8; 4]) -> usize {
        t.entries
            .iter()
            .filter(|e| e.state != ArpState::Free && e.port == port && e.ip == addr)
            .count()
    }

    #[test]
    fn test_demand_creates_resolving() {
        let mut t = table(8);
        let (index, created) = t.get_or_insert(1, ip(2), None, &quiet());
        assert!(created);
        assert_eq!(t.entry(index).state(), ArpState::Resolving);
        assert_eq!(t.entry(index).port(), 1);
        assert_eq!(t.entry(index).ip(), ip(2));
    }

    #[test]
    fn test_passive_learn_upgrades_resolving() {
        let mut t = table(8);
        let (index, _) = t.get_or_insert(1, ip(2), None, &quiet());
        let (index2, created) = t.get_or_insert(1, ip(2), Some(mac(2)), &quiet());
        assert_eq!(index, index2);
        assert!(!created);
        assert_eq!(t.entry(index).state(), ArpState::Resolved);
        assert_eq!(t.entry(index).mac(), mac(2));
    }

    #[test]
    fn test_passive_learn_upgrades_failed() {
        let mut t = table(8);
        let (index, _) = t.get_or_insert(1, ip(2), None, &quiet());
        t.mark_failed(index, &quiet());
        let (index2, _) = t.get_or_insert(1, ip(2), Some(mac(2)), &quiet());
        assert_eq!(index, index2);
        assert_eq!(t.entry(index).state(), ArpState::Resolved);
    }

    #[test]
    fn test_uniqueness_per_key() {
        let mut t = table(8);
        t.get_or_insert(1, ip(2), None, &quiet());
        t.get_or_insert(1, ip(2), Some(mac(2)), &quiet());
        t.get_or_insert(1, ip(2), None, &quiet());
        t.get_or_insert(0, ip(2), Some(mac(9)), &quiet());
        assert_eq!(bindings(&t, 1, ip(2)), 1);
        assert_eq!(bindings(&t, 0, ip(2)), 1);
    }

    #[test]
    fn test_ports_are_distinct_keys() {
        let mut t = table(8);
        let (i0, _) = t.get_or_insert(0, ip(5), Some(mac(1)), &quiet());
        let (i1, _) = t.get_or_insert(1, ip(5), Some(mac(2)), &quiet());
        assert_ne!(i0, i1);
        assert_eq!(t.entry(i0).mac(), mac(1));
        assert_eq!(t.entry(i1).mac(), mac(2));
    }

    #[test]
    fn test_search_is_side_effect_free() {
        let mut t = table(8);
        let (index, _) = t.get_or_insert(1, ip(2), Some(mac(2)), &quiet());
        let stamp = t.entry(index).last_touch;
        assert_eq!(t.search(1, ip(2)), Some(index));
        assert_eq!(t.entry(index).last_touch, stamp);
        assert_eq!(t.search(0, ip(2)), None);
    }

    #[test]
    fn test_lru_eviction_replaces_oldest() {
        let capacity = 8;
        let mut t = table(capacity);
        // fill every slot, each touched once at ascending stamps
        for i in 0..capacity {
            t.get_or_insert(1, ip(i as u8), Some(mac(i as u8)), &quiet());
        }
        // queue a frame on the oldest entry to observe the discard
        let oldest = t.search(1, ip(0)).unwrap();
        t.entry_mut(oldest).pending_mut().append(vec![0u8; 38]);

        let (index, created) = t.get_or_insert(1, ip(100), None, &quiet());
        assert!(created);
        assert_eq!(index, oldest);
        assert!(t.entry(index).pending().is_empty());
        assert_eq!(t.search(1, ip(0)), None);
        // every other entry survived
        for i in 1..capacity {
            assert!(t.search(1, ip(i as u8)).is_some());
        }
    }

    #[test]
    fn test_lru_respects_touch_refresh() {
        let capacity = 4;
        let mut t = table(capacity);
        for i in 0..capacity {
            t.get_or_insert(1, ip(i as u8), Some(mac(i as u8)), &quiet());
        }
        // refresh the first entry; the second becomes the victim
        t.get_or_insert(1, ip(0), None, &quiet());
        t.get_or_insert(1, ip(100), None, &quiet());
        assert!(t.search(1, ip(0)).is_some());
        assert_eq!(t.search(1, ip(1)), None);
    }

    #[test]
    fn test_mark_failed_discards_pending() {
        let mut t = table(8);
        let (index, _) = t.get_or_insert(1, ip(2), None, &quiet());
        t.entry_mut(index).pending_mut().append(vec![0u8; 38]);
        t.entry_mut(index).pending_mut().append(vec![0u8; 52]);
        t.mark_failed(index, &quiet());
        assert_eq!(t.entry(index).state(), ArpState::Failed);
        assert!(t.entry(index).pending().is_empty());
    }

    #[test]
    fn test_mark_resolved() {
        let mut t = table(8);
        let (index, _) = t.get_or_insert(1, ip(2), None, &quiet());
        t.mark_resolved(index, mac(2));
        assert_eq!(t.entry(index).state(), ArpState::Resolved);
        assert_eq!(t.entry(index).mac(), mac(2));
    }

    #[test]
    fn test_request_queue_fifo() {
        let mut t = table(8);
        t.push_request(1, 3);
        t.push_request(0, 5);
        assert_eq!(t.pop_request(), Some(ResolveRequest { port: 1, index: 3 }));
        assert_eq!(t.pop_request(), Some(ResolveRequest { port: 0, index: 5 }));
        assert_eq!(t.pop_request(), None);
    }

    #[test]
    fn test_recycled_slot_is_reset() {
        let mut t = table(1);
        let (index, _) = t.get_or_insert(0, ip(1), Some(mac(1)), &quiet());
        t.entry_mut(index).pending_mut().append(vec![0u8; 38]);
        // single slot table: the next key reclaims it
        let (index2, created) = t.get_or_insert(1, ip(2), None, &quiet());
        assert_eq!(index, index2);
        assert!(created);
        assert_eq!(t.entry(index2).state(), ArpState::Resolving);
        assert_eq!(t.entry(index2).port(), 1);
        assert!(t.entry(index2).pending().is_empty());
    }
}
