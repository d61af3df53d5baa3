use crate::config::{DigitizerConfig, Positive};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Algorithm used by the global trigger to find trigger times.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerAlgorithm {
    /// Chains of first-hit times where consecutive hits are never more than a
    /// trigger window apart. Each chain with enough hits triggers once, at
    /// its first hit.
    #[default]
    ContinuousChain,
    /// 1 ns histogram of first-hit times, scanned with a fixed-origin trigger
    /// window. After each trigger the scan skips to the end of the event gate.
    Histogram,
}

/// Global trigger of the detector.
///
/// Operates on the raw first-hit time of every (non-veto) PMT, before any
/// charge or timing smearing.
#[derive(Clone, Copy, Debug)]
pub struct TriggerFinder {
    algorithm: TriggerAlgorithm,
    threshold: u32,
    window: Positive<f64>,
    holdoff: f64,
}

impl TriggerFinder {
    /// `holdoff` is the dead period after a trigger used by
    /// [`TriggerAlgorithm::Histogram`].
    pub fn new(
        algorithm: TriggerAlgorithm,
        threshold: u32,
        window: Positive<f64>,
        holdoff: f64,
    ) -> Self {
        Self {
            algorithm,
            threshold,
            window,
            holdoff,
        }
    }

    pub fn from_config(config: &DigitizerConfig) -> Self {
        Self::new(
            config.trigger_algorithm,
            config.global_threshold,
            config.trigger_window,
            config.event_gate_up,
        )
    }

    /// Returns the ascending list of trigger times.
    ///
    /// An empty input gives no trigger.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::config::Positive;
    /// use wcdigi::trigger::{TriggerAlgorithm, TriggerFinder};
    ///
    /// let finder = TriggerFinder::new(
    ///     TriggerAlgorithm::ContinuousChain,
    ///     3,
    ///     Positive::new(200.0).unwrap(),
    ///     950.0,
    /// );
    /// let times = [0.0, 150.0, 300.0, 1000.0, 1010.0];
    ///
    /// assert_eq!(finder.find(times), vec![0.0]);
    /// ```
    pub fn find(&self, first_hit_times: impl IntoIterator<Item = f64>) -> Vec<f64> {
        let mut times: Vec<f64> = first_hit_times
            .into_iter()
            .filter(|t| t.is_finite())
            .collect();
        times.sort_by(f64::total_cmp);

        match self.algorithm {
            TriggerAlgorithm::ContinuousChain => self.find_chains(&times),
            TriggerAlgorithm::Histogram => self.find_histogram(&times),
        }
    }

    fn find_chains(&self, times: &[f64]) -> Vec<f64> {
        let mut triggers = Vec::new();
        let Some((&first, rest)) = times.split_first() else {
            return triggers;
        };

        let window = *self.window.inner();
        let mut run_start = first;
        let mut previous = first;
        let mut count = 1u32;
        for &time in rest {
            if time - previous > window {
                if count >= self.threshold {
                    triggers.push(run_start);
                }
                run_start = time;
                count = 0;
            }
            count += 1;
            previous = time;
        }
        if count >= self.threshold {
            triggers.push(run_start);
        }

        triggers
    }

    fn find_histogram(&self, times: &[f64]) -> Vec<f64> {
        // Number of hits in each 1 ns bin.
        let mut histogram: BTreeMap<i64, u32> = BTreeMap::new();
        for &time in times {
            *histogram.entry(time.floor() as i64).or_insert(0) += 1;
        }
        // Bins after the first one that still belong to the window.
        let span = (self.window.inner().ceil() as i64 - 1).max(0);
        let holdoff = self.holdoff.ceil() as i64;

        let mut triggers = Vec::new();
        let mut cursor = histogram.keys().next().copied();
        while let Some(start) = cursor {
            let mut accumulated = 0;
            let mut fired = None;
            for (&bin, &count) in histogram.range(start..=start.saturating_add(span)) {
                accumulated += count;
                if accumulated >= self.threshold {
                    fired = Some(bin);
                    break;
                }
            }
            // Bins saturate at the ends of the i64 range, so there is no next
            // bin once the cursor reaches i64::MAX.
            let next = match fired {
                Some(bin) => {
                    triggers.push(bin as f64);
                    bin.checked_add(holdoff.max(1))
                }
                None => start.checked_add(1),
            };
            cursor = next.and_then(|next| histogram.range(next..).next().map(|(&b, _)| b));
        }

        triggers
    }
}

/// Readout window of one trigger.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Gate {
    pub index: usize,
    pub trigger_time: f64,
    /// Hits in `[lower, upper)` belong to this gate.
    pub lower: f64,
    pub upper: f64,
}

impl Gate {
    pub fn contains(&self, time: f64) -> bool {
        self.lower <= time && time < self.upper
    }
}

/// Builds the gates of an event from its ascending trigger times.
///
/// Each gate spans `[trigger + down, trigger + up)`. The lower edge of a gate
/// is clipped to the upper edge of the previous gate, so gates never overlap.
///
/// # Examples
///
/// ```
/// use wcdigi::trigger::gates;
///
/// let gates = gates(&[0.0, 1000.0], -400.0, 950.0);
///
/// assert_eq!((gates[0].lower, gates[0].upper), (-400.0, 950.0));
/// assert_eq!((gates[1].lower, gates[1].upper), (950.0, 1950.0));
/// ```
pub fn gates(trigger_times: &[f64], down: f64, up: f64) -> Vec<Gate> {
    let mut gates: Vec<Gate> = Vec::with_capacity(trigger_times.len());
    for (index, &trigger_time) in trigger_times.iter().enumerate() {
        let nominal = trigger_time + down;
        let lower = match gates.last() {
            Some(previous) => nominal.max(previous.upper),
            None => nominal,
        };
        gates.push(Gate {
            index,
            trigger_time,
            lower,
            upper: trigger_time + up,
        });
    }

    gates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::iter::repeat;

    fn chain(threshold: u32) -> TriggerFinder {
        TriggerFinder::new(
            TriggerAlgorithm::ContinuousChain,
            threshold,
            Positive::new(200.0).unwrap(),
            950.0,
        )
    }

    fn histogram(threshold: u32) -> TriggerFinder {
        TriggerFinder::new(
            TriggerAlgorithm::Histogram,
            threshold,
            Positive::new(200.0).unwrap(),
            950.0,
        )
    }

    // `n` hits, 5 ns apart.
    fn burst(start: f64, n: usize) -> impl Iterator<Item = f64> {
        (0..n).map(move |i| start + 5.0 * i as f64)
    }

    #[test]
    fn chain_empty() {
        assert!(chain(25).find([0.0; 0]).is_empty());
        assert!(histogram(25).find([0.0; 0]).is_empty());
    }

    #[test]
    fn chain_threshold_is_inclusive() {
        assert_eq!(chain(25).find(burst(100.0, 25)), vec![100.0]);
        assert!(chain(25).find(burst(100.0, 24)).is_empty());
    }

    #[test]
    fn chain_input_order_does_not_matter() {
        let mut times: Vec<_> = burst(100.0, 30).collect();
        times.reverse();

        assert_eq!(chain(25).find(times), vec![100.0]);
    }

    #[test]
    fn chain_slides_with_previous_hit() {
        // 150 ns steps: the run spans 4350 ns but never has a gap > 200 ns.
        let times = (0..30).map(|i| 150.0 * i as f64);

        assert_eq!(chain(25).find(times), vec![0.0]);
    }

    #[test]
    fn chain_gap_of_exactly_window_continues() {
        assert_eq!(chain(2).find([0.0, 200.0]), vec![0.0]);
        assert!(chain(2).find([0.0, 200.5]).is_empty());
    }

    #[test]
    fn chain_multiple_triggers() {
        let times = burst(0.0, 30)
            .chain(burst(5000.0, 10))
            .chain(burst(10000.0, 26));

        assert_eq!(chain(25).find(times), vec![0.0, 10000.0]);
    }

    #[test]
    fn chain_ignores_non_finite_times() {
        let times: Vec<_> = burst(0.0, 25)
            .chain(repeat(f64::NAN).take(5))
            .chain([f64::INFINITY])
            .collect();

        assert!(chain(26).find(times.clone()).is_empty());
        assert_eq!(chain(25).find(times), vec![0.0]);
    }

    #[test]
    fn histogram_fires_at_threshold_bin() {
        // 25 hits at 5 ns spacing: the 25th hit is at 220 ns.
        assert_eq!(histogram(25).find(burst(100.0, 25)), vec![220.0]);
        assert!(histogram(25).find(burst(100.0, 24)).is_empty());
    }

    #[test]
    fn histogram_fixed_window() {
        // 150 ns steps never put more than 2 hits into one 200 ns window.
        let times: Vec<_> = (0..30).map(|i| 150.0 * i as f64).collect();

        assert!(histogram(3).find(times.clone()).is_empty());
        assert_eq!(histogram(2).find(times)[0], 150.0);
    }

    #[test]
    fn histogram_holdoff() {
        let times = burst(0.0, 60).chain(burst(2000.0, 30));

        // The second half of the first burst is inside the holdoff.
        assert_eq!(histogram(25).find(times), vec![120.0, 2120.0]);
    }

    #[test]
    fn histogram_extreme_times_do_not_overflow() {
        // Both land in the last representable bin.
        assert_eq!(histogram(25).find(repeat(f64::MAX).take(30)).len(), 1);
        assert!(histogram(25).find(repeat(f64::MAX).take(10)).is_empty());
        assert!(histogram(25).find(repeat(f64::MIN).take(10)).is_empty());

        let times = repeat(9.0e18).take(30).chain(repeat(f64::MAX).take(30));
        assert_eq!(histogram(25).find(times).len(), 2);
    }

    #[test]
    fn gates_do_not_overlap() {
        let triggers = [0.0, 100.0, 1200.0, 1300.5, 5000.0];
        let gates = gates(&triggers, -400.0, 950.0);

        assert_eq!(gates.len(), triggers.len());
        for pair in gates.windows(2) {
            assert!(pair[0].upper <= pair[1].lower, "{pair:?}");
            assert!(pair[1].lower < pair[1].upper);
        }
        assert_eq!(gates[0].lower, -400.0);
        assert_eq!(gates[1].lower, 950.0);
        assert_eq!(gates[4].lower, 4600.0);
        assert_eq!(gates[2].index, 2);
        assert_eq!(gates[2].trigger_time, 1200.0);
    }

    #[test]
    fn gate_contains_is_half_open() {
        let gate = gates(&[0.0], -400.0, 950.0)[0];

        assert!(gate.contains(-400.0));
        assert!(gate.contains(949.9));
        assert!(!gate.contains(950.0));
        assert!(!gate.contains(-400.1));
    }
}
