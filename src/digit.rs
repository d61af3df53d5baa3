use crate::hit::TubeId;
use serde::Serialize;
use std::collections::BTreeMap;

/// Digitized response of one PMT within one gate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GateDigit {
    pub gate: usize,
    pub trigger_time: f64,
    /// Smeared charge (pe).
    pub charge: f64,
    /// Smeared hit time (ns).
    pub time: f64,
}

/// Digitized response of one PMT across all gates of an event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DigitizedHit {
    tube_id: TubeId,
    gates: Vec<GateDigit>,
}

impl DigitizedHit {
    pub fn new(tube_id: TubeId) -> Self {
        Self {
            tube_id,
            gates: Vec::new(),
        }
    }
    pub fn tube_id(&self) -> TubeId {
        self.tube_id
    }
    /// Gate entries, in the order the gates were digitized.
    pub fn gates(&self) -> &[GateDigit] {
        &self.gates
    }
    pub fn gate(&self, gate: usize) -> Option<&GateDigit> {
        self.gates.iter().find(|g| g.gate == gate)
    }
    pub fn total_charge(&self) -> f64 {
        self.gates.iter().map(|g| g.charge).sum()
    }
}

/// Digitized hits of an event, keyed by tube.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DigitCollection {
    inner: BTreeMap<TubeId, DigitizedHit>,
}

impl DigitCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the response of a tube in one gate. The tube's first entry
    /// creates its [`DigitizedHit`].
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::digit::{DigitCollection, GateDigit};
    ///
    /// let mut digits = DigitCollection::new();
    /// let digit = GateDigit { gate: 0, trigger_time: 0.0, charge: 1.2, time: 10.0 };
    /// digits.insert(4, digit);
    /// digits.insert(4, GateDigit { gate: 1, ..digit });
    ///
    /// assert_eq!(digits.len(), 1);
    /// assert_eq!(digits.get(4).unwrap().gates().len(), 2);
    /// ```
    pub fn insert(&mut self, tube_id: TubeId, digit: GateDigit) {
        self.inner
            .entry(tube_id)
            .or_insert_with(|| DigitizedHit::new(tube_id))
            .gates
            .push(digit);
    }

    pub fn get(&self, tube_id: TubeId) -> Option<&DigitizedHit> {
        self.inner.get(&tube_id)
    }
    /// Number of tubes with at least one gate entry.
    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &DigitizedHit> {
        self.inner.values()
    }
    /// Number of gate entries over all tubes.
    pub fn num_digits(&self) -> usize {
        self.inner.values().map(|h| h.gates.len()).sum()
    }
    /// Gate entries of one gate, in tube order.
    pub fn in_gate(&self, gate: usize) -> impl Iterator<Item = (TubeId, &GateDigit)> {
        self.inner
            .values()
            .filter_map(move |h| h.gate(gate).map(|d| (h.tube_id, d)))
    }
}

/// Output of the digitizer for one event.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DigitizedEvent {
    /// Ascending trigger times (ns). Gate `i` belongs to `trigger_times[i]`.
    pub trigger_times: Vec<f64>,
    pub digits: DigitCollection,
}

impl DigitizedEvent {
    pub fn num_gates(&self) -> usize {
        self.trigger_times.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digit(gate: usize, charge: f64) -> GateDigit {
        GateDigit {
            gate,
            trigger_time: 100.0 * gate as f64,
            charge,
            time: 10.0,
        }
    }

    #[test]
    fn digit_collection_accumulates_gates() {
        let mut digits = DigitCollection::new();
        digits.insert(2, digit(0, 1.0));
        digits.insert(1, digit(0, 2.0));
        digits.insert(2, digit(1, 3.0));

        assert_eq!(digits.len(), 2);
        assert_eq!(digits.num_digits(), 3);
        assert_eq!(digits.get(2).unwrap().total_charge(), 4.0);
        assert_eq!(digits.get(2).unwrap().gate(1).unwrap().charge, 3.0);
        assert!(digits.get(1).unwrap().gate(1).is_none());
        assert_eq!(
            digits.iter().map(|h| h.tube_id()).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn digit_collection_in_gate() {
        let mut digits = DigitCollection::new();
        digits.insert(2, digit(0, 1.0));
        digits.insert(1, digit(1, 2.0));
        digits.insert(3, digit(1, 3.0));

        let gate1: Vec<_> = digits.in_gate(1).map(|(tube, d)| (tube, d.charge)).collect();
        assert_eq!(gate1, vec![(1, 2.0), (3, 3.0)]);
        assert_eq!(digits.in_gate(2).count(), 0);
    }

    #[test]
    fn digitized_event_serializes() {
        let mut event = DigitizedEvent {
            trigger_times: vec![100.0],
            ..Default::default()
        };
        event.digits.insert(7, digit(0, 1.5));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["trigger_times"][0], 100.0);
        assert_eq!(json["digits"]["7"]["gates"][0]["charge"], 1.5);
    }
}
