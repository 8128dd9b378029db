use std::net::SocketAddr;

/// Protocol ceiling for the session table size.
pub const MAX_CLIENTS: usize = 128;

/// Default session table size.
pub const DEFAULT_MAX_CLIENTS: usize = 8;

/// Half of the sequence space; anything further ahead is treated as old.
const SEQUENCE_WINDOW: u16 = 0x7FFF;

/// One live client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Issued client id (always even).
    pub id: u8,
    /// Last accepted sequence number.
    pub sequence: u16,
    /// Address the session is bound to.
    pub endpoint: SocketAddr,
}

/// How a presented sequence number relates to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Strictly newer, within the forward half window.
    Fresh,
    /// Equal to the stored number: a retransmission.
    Duplicate,
    /// Outside the window: late or replayed.
    Stale,
}

/// Classify `presented` against `stored`, modulo 2^16.
pub fn classify(stored: u16, presented: u16) -> SequenceCheck {
    if presented == stored {
        SequenceCheck::Duplicate
    } else if presented.wrapping_sub(stored) > SEQUENCE_WINDOW {
        SequenceCheck::Stale
    } else {
        SequenceCheck::Fresh
    }
}

/// Result of a Handshake allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot: usize,
    pub id: u8,
    /// Session overwritten to make room, if any.
    pub evicted: Option<Session>,
}

/// Fixed-capacity table of client sessions.
///
/// Allocation prefers an empty slot; when the table is full a round-robin
/// pointer picks the slot to overwrite, regardless of how recently it was
/// used. Issued ids are even, advance by two and never repeat a live id.
#[derive(Debug, Clone)]
pub struct SessionTable {
    slots: Vec<Option<Session>>,
    next_slot: usize,
    next_id: u8,
}

impl SessionTable {
    /// `capacity` is clamped to `1..=MAX_CLIENTS`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CLIENTS);
        Self {
            slots: vec![None; capacity],
            next_slot: capacity,
            next_id: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.slots.iter().flatten()
    }

    pub fn get(&self, slot: usize) -> Option<&Session> {
        self.slots.get(slot)?.as_ref()
    }

    /// Slot of the session bound to `endpoint`.
    pub fn find_by_endpoint(&self, endpoint: SocketAddr) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(session) if session.endpoint == endpoint))
    }

    /// Slot of the session with `id` bound to `endpoint`.
    pub fn find(&self, id: u8, endpoint: SocketAddr) -> Option<usize> {
        self.slots.iter().position(
            |slot| matches!(slot, Some(session) if session.id == id && session.endpoint == endpoint),
        )
    }

    /// Classify a message without changing anything.
    ///
    /// `None` when no session matches `id` and `endpoint`.
    pub fn check(&self, id: u8, endpoint: SocketAddr, sequence: u16) -> Option<SequenceCheck> {
        let slot = self.find(id, endpoint)?;
        let session = self.slots[slot].as_ref()?;
        Some(classify(session.sequence, sequence))
    }

    /// Advance the stored sequence number of a session.
    ///
    /// Only fresh numbers move the baseline; returns what the number was.
    pub fn touch(&mut self, id: u8, endpoint: SocketAddr, sequence: u16) -> Option<SequenceCheck> {
        let slot = self.find(id, endpoint)?;
        let session = self.slots[slot].as_mut()?;
        let check = classify(session.sequence, sequence);
        if check == SequenceCheck::Fresh {
            session.sequence = sequence;
        }
        Some(check)
    }

    /// Bind `endpoint` to a session with `sequence` as its baseline.
    ///
    /// An endpoint that already holds a session keeps its slot and id.
    pub fn allocate(&mut self, endpoint: SocketAddr, sequence: u16) -> Allocation {
        if let Some(slot) = self.find_by_endpoint(endpoint) {
            if let Some(session) = self.slots[slot].as_mut() {
                session.sequence = sequence;
                tracing::debug!(slot, id = session.id, %endpoint, "session re-bound");
                return Allocation {
                    slot,
                    id: session.id,
                    evicted: None,
                };
            }
        }

        let slot = match self.slots.iter().position(Option::is_none) {
            Some(slot) => slot,
            None => {
                self.next_slot += 1;
                if self.next_slot >= self.slots.len() {
                    self.next_slot = 0;
                }
                self.next_slot
            }
        };

        let id = self.issue_id(slot);
        let evicted = self.slots[slot].replace(Session {
            id,
            sequence,
            endpoint,
        });
        match evicted {
            Some(old) => tracing::debug!(
                slot,
                id,
                evicted_id = old.id,
                evicted_endpoint = %old.endpoint,
                %endpoint,
                "session evicted"
            ),
            None => tracing::debug!(slot, id, %endpoint, "session allocated"),
        }
        Allocation { slot, id, evicted }
    }

    /// Free the session with `id` bound to `endpoint`.
    pub fn release(&mut self, id: u8, endpoint: SocketAddr) -> Option<Session> {
        let slot = self.find(id, endpoint)?;
        let session = self.slots[slot].take();
        tracing::debug!(slot, id, %endpoint, "session released");
        session
    }

    /// Next even id not held by any slot other than `slot`.
    fn issue_id(&mut self, slot: usize) -> u8 {
        loop {
            let candidate = self.next_id;
            self.next_id = self.next_id.wrapping_add(2);
            let taken = self
                .slots
                .iter()
                .enumerate()
                .any(|(index, s)| index != slot && matches!(s, Some(session) if session.id == candidate));
            if !taken {
                return candidate;
            }
        }
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CLIENTS)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn endpoint(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 0, 10], port))
    }

    #[test]
    fn sequence_window() {
        assert_eq!(classify(100, 100), SequenceCheck::Duplicate);
        assert_eq!(classify(100, 101), SequenceCheck::Fresh);
        assert_eq!(classify(100, 100 + 0x7FFF), SequenceCheck::Fresh);
        assert_eq!(classify(100, 100u16.wrapping_add(0x8000)), SequenceCheck::Stale);
        assert_eq!(classify(100, 99), SequenceCheck::Stale);
        // wraparound
        assert_eq!(classify(0xFFFC, 0), SequenceCheck::Fresh);
        assert_eq!(classify(0xFFFF, 0), SequenceCheck::Fresh);
        assert_eq!(classify(0, 0xFFFC), SequenceCheck::Stale);
    }

    #[test]
    fn sequence_window_exhaustive_offsets() {
        for stored in [0u16, 1, 0x7FFF, 0x8000, 0xFFFC, 0xFFFF] {
            for offset in [1u16, 2, 0x4000, 0x7FFE, 0x7FFF] {
                assert_eq!(classify(stored, stored.wrapping_add(offset)), SequenceCheck::Fresh);
            }
            for offset in [0x8000u16, 0x8001, 0xC000, 0xFFFF] {
                assert_eq!(classify(stored, stored.wrapping_add(offset)), SequenceCheck::Stale);
            }
        }
    }

    #[test]
    fn allocate_prefers_empty_slots() {
        let mut table = SessionTable::new(4);
        let first = table.allocate(endpoint(1), 0xFFFC);
        let second = table.allocate(endpoint(2), 0xFFFC);
        assert_eq!((first.slot, first.id), (0, 0));
        assert_eq!((second.slot, second.id), (1, 2));
        assert_eq!(table.len(), 2);

        table.release(0, endpoint(1)).unwrap();
        let third = table.allocate(endpoint(3), 0xFFFC);
        assert_eq!(third.slot, 0);
        assert_eq!(third.id, 4);
        assert!(third.evicted.is_none());
    }

    #[test]
    fn same_endpoint_reuses_slot_and_id() {
        let mut table = SessionTable::new(2);
        let first = table.allocate(endpoint(1), 0xFFFC);
        table.touch(first.id, endpoint(1), 40);
        let again = table.allocate(endpoint(1), 0xFFFC);
        assert_eq!((again.slot, again.id), (first.slot, first.id));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(again.slot).unwrap().sequence, 0xFFFC);
    }

    #[test]
    fn full_table_evicts_round_robin() {
        let mut table = SessionTable::new(3);
        for port in 1..=3 {
            table.allocate(endpoint(port), 0xFFFC);
        }
        let slots: Vec<usize> = (4..=8)
            .map(|port| table.allocate(endpoint(port), 0xFFFC).slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn eviction_ignores_recent_use() {
        let mut table = SessionTable::new(2);
        let busy = table.allocate(endpoint(1), 0xFFFC);
        table.allocate(endpoint(2), 0xFFFC);
        table.touch(busy.id, endpoint(1), 4);

        let newcomer = table.allocate(endpoint(3), 0xFFFC);
        assert_eq!(newcomer.slot, busy.slot);
        assert_eq!(newcomer.evicted.unwrap().endpoint, endpoint(1));
        assert!(table.check(busy.id, endpoint(1), 8).is_none());
    }

    #[test]
    fn ids_never_collide_with_live_sessions() {
        let mut table = SessionTable::new(MAX_CLIENTS);
        for port in 0..2000u16 {
            table.allocate(endpoint(port), 0xFFFC);
            if port % 7 == 0 {
                if let Some(slot) = table.find_by_endpoint(endpoint(port / 2)) {
                    let id = table.get(slot).unwrap().id;
                    table.release(id, endpoint(port / 2));
                }
            }
            let ids: Vec<u8> = table.iter().map(|s| s.id).collect();
            let unique: HashSet<u8> = ids.iter().copied().collect();
            assert_eq!(ids.len(), unique.len());
            assert!(ids.iter().all(|id| id & 1 == 0));
        }
        assert!(table.len() <= MAX_CLIENTS);
    }

    #[test]
    fn ids_wrap_and_skip_live_ones() {
        let mut table = SessionTable::new(2);
        let keeper = table.allocate(endpoint(1), 0xFFFC);
        assert_eq!(keeper.id, 0);

        let mut issued = Vec::new();
        for round in 0..130u16 {
            let allocation = table.allocate(endpoint(100 + round), 0xFFFC);
            assert_eq!(allocation.slot, 1);
            issued.push(allocation.id);
            table.release(allocation.id, endpoint(100 + round));
        }
        assert!(!issued.contains(&keeper.id));
        assert_eq!(issued[126], 254);
        // the counter wrapped and skipped the live id 0
        assert_eq!(issued[127], 2);
    }

    #[test]
    fn touch_and_check() {
        let mut table = SessionTable::default();
        let session = table.allocate(endpoint(9), 0xFFFC);
        let ep = endpoint(9);
        assert_eq!(table.check(session.id, ep, 0xFFFC), Some(SequenceCheck::Duplicate));
        assert_eq!(table.check(session.id, ep, 0), Some(SequenceCheck::Fresh));
        assert_eq!(table.touch(session.id, ep, 0), Some(SequenceCheck::Fresh));
        assert_eq!(table.check(session.id, ep, 0xFFFC), Some(SequenceCheck::Stale));
        assert_eq!(table.touch(session.id, ep, 0xFFFC), Some(SequenceCheck::Stale));
        assert_eq!(table.get(0).unwrap().sequence, 0);
        // wrong endpoint or id
        assert!(table.check(session.id, endpoint(10), 4).is_none());
        assert!(table.check(session.id + 2, ep, 4).is_none());
    }

    #[test]
    fn release_clears_slot() {
        let mut table = SessionTable::default();
        let session = table.allocate(endpoint(5), 0xFFFC);
        assert!(table.release(session.id, endpoint(6)).is_none());
        assert!(table.release(session.id, endpoint(5)).is_some());
        assert!(table.is_empty());
        assert!(table.get(session.slot).is_none());
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(SessionTable::new(0).capacity(), 1);
        assert_eq!(SessionTable::new(1000).capacity(), MAX_CLIENTS);
    }
}
