use crate::config::Positive;
use crate::hit::HitCollection;
use crate::pmt::Detector;
use crate::Error;
use rand::Rng;
use rand_distr::{Distribution, Exp};

/// Dark count rate of a PMT (kHz).
pub const DARK_RATE: f64 = 4.0;
/// Parent track ID recorded for hits that no particle produced.
pub const DARK_NOISE_TRACK_ID: i32 = -1;

#[derive(Debug)]
/// An iterator over a Poisson process.
///
/// The iterator yields times (ns) at which events occur in a Poisson process
/// that starts at `origin`. Times are guaranteed to be in increasing order
/// and their inter-arrival time follows an exponential distribution with the
/// specified rate parameter.
pub struct PoissonProcess<R> {
    time: f64,
    exp: Exp<f64>,
    rng: R,
}

impl<R> PoissonProcess<R>
where
    R: Rng,
{
    /// Create a new Poisson process with the specified rate (events per ns).
    pub fn new(origin: f64, rate: Positive<f64>, rng: R) -> Result<Self, Error> {
        let exp = Exp::new(*rate.inner()).map_err(|_| Error::InvalidRate(*rate.inner()))?;

        Ok(Self {
            time: origin,
            exp,
            rng,
        })
    }
}

impl<R> Iterator for PoissonProcess<R>
where
    R: Rng,
{
    type Item = f64;

    fn next(&mut self) -> Option<Self::Item> {
        self.time += self.exp.sample(&mut self.rng);

        Some(self.time)
    }
}

/// Uncorrelated PMT dark counts.
///
/// Every tube of the detector gets independent Poisson-distributed hits over
/// the `[start, end)` time window.
#[derive(Clone, Copy, Debug)]
pub struct DarkNoise {
    rate: Positive<f64>,
    start: f64,
    end: f64,
}

impl DarkNoise {
    /// `rate` is the dark count rate of each tube (kHz).
    pub fn new(rate: f64, start: f64, end: f64) -> Result<Self, Error> {
        let rate = Positive::new(rate)
            .filter(|r| r.inner().is_finite())
            .ok_or(Error::InvalidRate(rate))?;

        Ok(Self { rate, start, end })
    }

    /// Dark noise at [`DARK_RATE`] over `[start, end)`.
    pub fn with_default_rate(start: f64, end: f64) -> Self {
        Self {
            rate: Positive(DARK_RATE),
            start,
            end,
        }
    }

    /// Expected number of dark hits on one tube.
    pub fn expected_hits_per_tube(&self) -> f64 {
        self.rate_per_ns() * (self.end - self.start).max(0.0)
    }

    fn rate_per_ns(&self) -> f64 {
        // kHz -> 1/ns
        self.rate.inner() * 1e-6
    }

    /// Adds dark hits to every tube of `detector`. Returns the number of hits
    /// added.
    ///
    /// # Examples
    ///
    /// ```
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    /// use std::str::FromStr;
    /// use wcdigi::gen::DarkNoise;
    /// use wcdigi::hit::HitCollection;
    /// use wcdigi::pmt::{Detector, PmtTable, Region};
    ///
    /// let mut detector = Detector::new(PmtTable::from_str("R6091 38 2")?);
    /// detector.add_tube(1, "R6091", Region::Top)?;
    ///
    /// let mut hits = HitCollection::new();
    /// let noise = DarkNoise::new(4.0, 0.0, 1e6)?;
    /// let added = noise.apply(&mut hits, &detector, &mut StdRng::seed_from_u64(0))?;
    ///
    /// assert_eq!(hits.get(1).map_or(0, |h| h.len()), added);
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn apply<R: Rng>(
        &self,
        hits: &mut HitCollection,
        detector: &Detector,
        rng: &mut R,
    ) -> Result<usize, Error> {
        let rate = Positive::new(self.rate_per_ns()).ok_or(Error::InvalidRate(*self.rate.inner()))?;
        let mut added = 0;
        for (tube_id, tube) in detector.tubes() {
            for time in PoissonProcess::new(self.start, rate, &mut *rng)?.take_while(|&t| t < self.end) {
                hits.add_hit(tube_id, &tube.pmt_name, time, DARK_NOISE_TRACK_ID);
                added += 1;
            }
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pmt::{PmtTable, PmtType, Region};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn detector(n: u32) -> Detector {
        let mut detector = Detector::new(PmtTable::from([PmtType {
            name: "R6091".to_string(),
            radius: 38.0,
            time_constant: 2.0,
        }]));
        for id in 0..n {
            detector.add_tube(id, "R6091", Region::Barrel).unwrap();
        }
        detector
    }

    #[test]
    fn poisson_process_is_increasing() {
        let rng = StdRng::seed_from_u64(0);
        let process = PoissonProcess::new(-50.0, Positive::new(0.5).unwrap(), rng).unwrap();

        let times: Vec<_> = process.take(1000).collect();
        assert!(times[0] > -50.0);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        // Mean inter-arrival time is 2 ns.
        let mean = (times[999] - times[0]) / 999.0;
        assert!((mean - 2.0).abs() < 0.2, "mean = {mean}");
    }

    #[test]
    fn dark_noise_invalid_rate() {
        assert!(matches!(DarkNoise::new(0.0, 0.0, 1.0), Err(Error::InvalidRate(_))));
        assert!(matches!(DarkNoise::new(-4.0, 0.0, 1.0), Err(Error::InvalidRate(_))));
        assert!(DarkNoise::new(f64::INFINITY, 0.0, 1.0).is_err());
    }

    #[test]
    fn dark_noise_rate() {
        let detector = detector(200);
        let mut hits = HitCollection::new();
        // 4 kHz over 1 ms: 4 hits per tube on average.
        let noise = DarkNoise::with_default_rate(0.0, 1e6);
        assert!((noise.expected_hits_per_tube() - 4.0).abs() < 1e-12);

        let added = noise
            .apply(&mut hits, &detector, &mut StdRng::seed_from_u64(1))
            .unwrap();
        // 800 expected, sigma ~ 28.
        assert!((650..950).contains(&added), "added = {added}");
        for hit in hits.iter() {
            assert!(hit.entries().iter().all(|e| e.time >= 0.0 && e.time < 1e6));
            assert!(hit.entries().iter().all(|e| e.parent_track_id == DARK_NOISE_TRACK_ID));
        }
    }

    #[test]
    fn dark_noise_empty_window() {
        let detector = detector(10);
        let mut hits = HitCollection::new();
        let noise = DarkNoise::with_default_rate(100.0, 100.0);

        let added = noise
            .apply(&mut hits, &detector, &mut StdRng::seed_from_u64(2))
            .unwrap();
        assert_eq!(added, 0);
        assert!(hits.is_empty());
    }
}
