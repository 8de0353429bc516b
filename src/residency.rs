//! Residency set: the authoritative cache of currently-displayed sectors.
//!
//! Maps sector keys to either a reservation placeholder (requested, not yet
//! loaded) or a resident entry the renderer can draw. Membership of either
//! kind is what prevents duplicate fetches. Eviction is insertion-order:
//! oldest merged sector first, never by access recency.
//!
//! Foreground-only by design: the planner and the ingestor run on the same
//! thread and are the only writers, so no lock is needed here.

use crate::coord::SectorKey;
use crate::label::LabelAtlas;
use std::collections::{HashMap, VecDeque};

use glam::{Mat4, Vec4};

/// A merged sector as the renderer sees it.
#[derive(Debug)]
pub struct ResidentSector {
    /// Number of renderable records.
    pub count: usize,
    /// World positions with class image index / excluded sentinel in w.
    pub positions: Vec<Vec4>,
    /// Label text per record.
    pub labels: Vec<String>,
    /// Label placement matrices.
    pub transforms: Vec<Mat4>,
    /// Persistent copy of the label bitmaps.
    pub atlas: LabelAtlas,
}

/// Entry state for a key in the set.
#[derive(Debug)]
enum Residency {
    /// Requested but not yet merged; blocks duplicate requests.
    Reserved,
    /// Merged and renderable.
    Resident(ResidentSector),
}

/// Insertion-ordered, capacity-aware cache of resident sectors.
#[derive(Debug, Default)]
pub struct ResidencySet {
    entries: HashMap<SectorKey, Residency>,
    /// Merge order of resident keys, oldest first. Drives eviction.
    order: VecDeque<SectorKey>,
    /// Sum of record counts across resident sectors.
    total_objects: usize,
}

impl ResidencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the key is reserved or resident.
    ///
    /// This is the single dedup check: a key that answers true here must
    /// never be re-requested.
    pub fn contains(&self, key: &SectorKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether the key holds a merged, renderable sector.
    pub fn is_resident(&self, key: &SectorKey) -> bool {
        matches!(self.entries.get(key), Some(Residency::Resident(_)))
    }

    /// Places a reservation placeholder.
    ///
    /// Returns false without touching the set if the key is already present
    /// in either state.
    pub fn reserve(&mut self, key: SectorKey) -> bool {
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, Residency::Reserved);
        true
    }

    /// Removes a reservation placeholder, if that is what the key holds.
    ///
    /// Resident entries are untouched; use [`remove`](Self::remove) for
    /// those. Returns true if a reservation was released.
    pub fn release(&mut self, key: &SectorKey) -> bool {
        match self.entries.get(key) {
            Some(Residency::Reserved) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Merges a loaded sector, replacing its reservation.
    ///
    /// Appends the key to the eviction order and grows the object count.
    /// Re-adding a key that is already resident replaces the old entry and
    /// keeps its original eviction slot.
    pub fn add(&mut self, key: SectorKey, sector: ResidentSector) {
        let previous = self.entries.insert(key, Residency::Resident(sector));
        match previous {
            Some(Residency::Resident(old)) => {
                self.total_objects -= old.count;
            }
            _ => self.order.push_back(key),
        }
        if let Some(Residency::Resident(s)) = self.entries.get(&key) {
            self.total_objects += s.count;
        }
    }

    /// Removes a key in any state. Returns true if something was removed.
    pub fn remove(&mut self, key: &SectorKey) -> bool {
        match self.entries.remove(key) {
            Some(Residency::Resident(s)) => {
                self.total_objects -= s.count;
                self.order.retain(|k| k != key);
                true
            }
            Some(Residency::Reserved) => true,
            None => false,
        }
    }

    /// Evicts oldest-merged sectors until the object count is at or below
    /// `target`. Returns the number of sectors evicted.
    ///
    /// Never removes more than necessary: eviction stops as soon as the
    /// count reaches the target.
    pub fn remove_until(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        while self.total_objects > target {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if let Some(Residency::Resident(s)) = self.entries.remove(&key) {
                self.total_objects -= s.count;
                evicted += 1;
            }
        }
        evicted
    }

    /// Drops every entry, reservations included.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.total_objects = 0;
    }

    /// Sum of record counts across resident sectors.
    pub fn object_count(&self) -> usize {
        self.total_objects
    }

    /// Number of resident (renderable) sectors.
    pub fn resident_count(&self) -> usize {
        self.order.len()
    }

    /// Total keys tracked, reservations included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resident sector for a key, if merged.
    pub fn get(&self, key: &SectorKey) -> Option<&ResidentSector> {
        match self.entries.get(key) {
            Some(Residency::Resident(s)) => Some(s),
            _ => None,
        }
    }

    /// Iterates resident sectors in merge order, oldest first.
    pub fn residents(&self) -> impl Iterator<Item = (&SectorKey, &ResidentSector)> {
        self.order.iter().filter_map(move |k| {
            match self.entries.get(k) {
                Some(Residency::Resident(s)) => Some((k, s)),
                _ => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(x: i32) -> SectorKey {
        SectorKey { x, y: 0, z: 0 }
    }

    fn resident(count: usize) -> ResidentSector {
        ResidentSector {
            count,
            positions: vec![Vec4::ZERO; count],
            labels: vec![String::new(); count],
            transforms: vec![Mat4::IDENTITY; count],
            atlas: LabelAtlas::empty(),
        }
    }

    #[test]
    fn test_reserve_blocks_duplicates() {
        let mut set = ResidencySet::new();
        assert!(set.reserve(key(1)));
        assert!(!set.reserve(key(1)), "second reservation must be refused");
        assert!(set.contains(&key(1)));
        assert!(!set.is_resident(&key(1)));
    }

    #[test]
    fn test_add_replaces_reservation() {
        let mut set = ResidencySet::new();
        set.reserve(key(1));
        set.add(key(1), resident(10));
        assert!(set.is_resident(&key(1)));
        assert_eq!(set.object_count(), 10);
        assert_eq!(set.resident_count(), 1);
        assert!(!set.reserve(key(1)), "resident key still blocks requests");
    }

    #[test]
    fn test_release_only_touches_reservations() {
        let mut set = ResidencySet::new();
        set.reserve(key(1));
        set.reserve(key(2));
        set.add(key(2), resident(5));

        assert!(set.release(&key(1)));
        assert!(!set.contains(&key(1)), "released key is re-requestable");
        assert!(!set.release(&key(2)), "resident entries are not releasable");
        assert_eq!(set.object_count(), 5);
    }

    #[test]
    fn test_remove_resident_updates_count_and_order() {
        let mut set = ResidencySet::new();
        for i in 0..3 {
            set.reserve(key(i));
            set.add(key(i), resident(10));
        }
        assert!(set.remove(&key(1)));
        assert_eq!(set.object_count(), 20);
        assert_eq!(set.resident_count(), 2);
        // Eviction order skips the removed key.
        set.remove_until(10);
        assert!(!set.contains(&key(0)), "oldest evicted first");
        assert!(set.contains(&key(2)));
    }

    #[test]
    fn test_conservation_after_merges_and_evictions() {
        let mut set = ResidencySet::new();
        for i in 0..8 {
            set.reserve(key(i));
            set.add(key(i), resident((i as usize + 1) * 3));
        }
        set.remove(&key(4));
        set.remove_until(40);

        let sum: usize = set.residents().map(|(_, s)| s.count).sum();
        assert_eq!(set.object_count(), sum);
    }

    #[test]
    fn test_eviction_stops_at_target() {
        // Ceiling 1000, margin 100: after reaching 1050 eviction must land
        // at or below 900 without over-removing.
        let mut set = ResidencySet::new();
        for i in 0..21 {
            set.reserve(key(i));
            set.add(key(i), resident(50));
        }
        assert_eq!(set.object_count(), 1050);

        let evicted = set.remove_until(900);
        assert!(set.object_count() <= 900);
        assert_eq!(evicted, 3, "exactly three 50-object sectors removed");
        assert!(!set.contains(&key(0)));
        assert!(!set.contains(&key(2)));
        assert!(set.contains(&key(3)));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut set = ResidencySet::new();
        set.reserve(key(1));
        set.reserve(key(2));
        set.add(key(2), resident(4));
        set.clear();
        assert!(set.is_empty());
        assert_eq!(set.object_count(), 0);
        assert!(set.reserve(key(1)), "cleared keys are requestable again");
    }

    #[test]
    fn test_readd_keeps_eviction_slot() {
        let mut set = ResidencySet::new();
        set.reserve(key(1));
        set.add(key(1), resident(10));
        set.reserve(key(2));
        set.add(key(2), resident(10));
        // Replace the older entry; its slot stays first in line.
        set.add(key(1), resident(6));
        assert_eq!(set.object_count(), 16);
        set.remove_until(10);
        assert!(!set.contains(&key(1)));
        assert!(set.contains(&key(2)));
    }
}
