use serde::Serialize;
use std::collections::BTreeMap;

/// Identifier of a PMT. Stable for the lifetime of a detector geometry.
pub type TubeId = u32;

/// A single photon-induced hit on a PMT.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HitEntry {
    /// Absolute hit time in ns.
    pub time: f64,
    /// Track ID of the parent particle that produced the photon.
    pub parent_track_id: i32,
}

/// All raw hits recorded on one PMT during an event.
///
/// Entries are kept in ascending time order at all times, so every windowed
/// query sees sorted data regardless of insertion order. All windows are
/// half-open, i.e. `[lo, hi)`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PmtHit {
    tube_id: TubeId,
    tube_name: String,
    entries: Vec<HitEntry>,
}

impl PmtHit {
    /// Creates a record with no hits.
    pub fn new(tube_id: TubeId, tube_name: impl Into<String>) -> Self {
        Self {
            tube_id,
            tube_name: tube_name.into(),
            entries: Vec::new(),
        }
    }

    pub fn tube_id(&self) -> TubeId {
        self.tube_id
    }
    /// Name of the PMT type mounted at this tube.
    pub fn tube_name(&self) -> &str {
        &self.tube_name
    }
    /// All entries, in ascending time order.
    pub fn entries(&self) -> &[HitEntry] {
        &self.entries
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a raw hit. Hits with equal times keep their insertion order.
    ///
    /// A non-finite time is logged and ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::hit::PmtHit;
    ///
    /// let mut hit = PmtHit::new(1, "R6091");
    /// hit.add_hit(20.0, 3);
    /// hit.add_hit(10.0, 4);
    /// hit.add_hit(f64::NAN, 5);
    ///
    /// assert_eq!(hit.first_hit_time(), Some(10.0));
    /// assert_eq!(hit.len(), 2);
    /// ```
    pub fn add_hit(&mut self, time: f64, parent_track_id: i32) {
        if !time.is_finite() {
            log::warn!(
                "ignored hit with time {time} ns on tube {} (track {parent_track_id})",
                self.tube_id
            );
            return;
        }
        let index = self.entries.partition_point(|e| e.time <= time);
        self.entries.insert(
            index,
            HitEntry {
                time,
                parent_track_id,
            },
        );
    }

    /// Earliest hit time on the tube, if any.
    pub fn first_hit_time(&self) -> Option<f64> {
        self.entries.first().map(|e| e.time)
    }

    fn window(&self, lo: f64, hi: f64) -> &[HitEntry] {
        let start = self.entries.partition_point(|e| e.time < lo);
        let end = self.entries.partition_point(|e| e.time < hi).max(start);
        &self.entries[start..end]
    }

    /// Earliest hit time in `[lo, hi)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::hit::PmtHit;
    ///
    /// let mut hit = PmtHit::new(1, "R6091");
    /// hit.add_hit(5.0, 1);
    /// hit.add_hit(15.0, 1);
    ///
    /// assert_eq!(hit.first_hit_time_in_gate(10.0, 20.0), Some(15.0));
    /// assert_eq!(hit.first_hit_time_in_gate(20.0, 30.0), None);
    /// ```
    pub fn first_hit_time_in_gate(&self, lo: f64, hi: f64) -> Option<f64> {
        self.window(lo, hi).first().map(|e| e.time)
    }

    /// Latest hit time in `[lo, hi)`.
    pub fn last_hit_time_in_gate(&self, lo: f64, hi: f64) -> Option<f64> {
        self.window(lo, hi).last().map(|e| e.time)
    }

    /// Arithmetic mean of the hit times in `[lo, hi)`.
    pub fn mean_hit_time_in_gate(&self, lo: f64, hi: f64) -> Option<f64> {
        let window = self.window(lo, hi);
        if window.is_empty() {
            return None;
        }
        let sum: f64 = window.iter().map(|e| e.time).sum();

        Some(sum / window.len() as f64)
    }

    /// Number of hits in `[lo, hi)` that also arrived before `bound`.
    ///
    /// This is the photoelectron count of a PMT readout window that closes at
    /// `bound`, clipped to the enclosing gate.
    pub fn pe_in_gate(&self, lo: f64, hi: f64, bound: f64) -> u32 {
        let count = self.window(lo, hi.min(bound)).len();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Raw hits of every PMT hit during one event, keyed by tube.
///
/// Iteration is in ascending [`TubeId`] order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HitCollection {
    inner: BTreeMap<TubeId, PmtHit>,
}

impl HitCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a hit to a tube, creating the tube's record on its first hit.
    ///
    /// The `tube_name` of an existing record is not changed. A non-finite
    /// time is ignored, and does not create a record.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::hit::HitCollection;
    ///
    /// let mut hits = HitCollection::new();
    /// hits.add_hit(7, "R6091", 12.5, 1);
    /// hits.add_hit(7, "R6091", 11.0, 2);
    ///
    /// assert_eq!(hits.len(), 1);
    /// assert_eq!(hits.get(7).unwrap().len(), 2);
    /// ```
    pub fn add_hit(
        &mut self,
        tube_id: TubeId,
        tube_name: &str,
        time: f64,
        parent_track_id: i32,
    ) {
        if !time.is_finite() {
            log::warn!("ignored hit with time {time} ns on tube {tube_id}");
            return;
        }
        self.inner
            .entry(tube_id)
            .or_insert_with(|| PmtHit::new(tube_id, tube_name))
            .add_hit(time, parent_track_id);
    }

    /// Returns the record of a tube, if it was hit.
    pub fn get(&self, tube_id: TubeId) -> Option<&PmtHit> {
        self.inner.get(&tube_id)
    }
    /// Number of tubes with at least one hit.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    /// Removes every record. Called between events.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
    pub fn iter(&self) -> impl Iterator<Item = &PmtHit> {
        self.inner.values()
    }
}

impl FromIterator<PmtHit> for HitCollection {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = PmtHit>,
    {
        let mut collection = Self::new();
        for hit in iter {
            match collection.inner.get_mut(&hit.tube_id) {
                Some(existing) => {
                    for entry in hit.entries {
                        existing.add_hit(entry.time, entry.parent_track_id);
                    }
                }
                None => {
                    collection.inner.insert(hit.tube_id, hit);
                }
            }
        }

        collection
    }
}
