use super::fluctuate;
use crate::Error;
use rand::Rng;

/// Nominal gain of the full dynode chain.
pub const TOTAL_GAIN: f64 = 1e7;
/// Gain of each dynode relative to the first one.
pub const RELATIVE_DYNODE_GAINS: [f64; 10] = [
    1.000, 0.236, 0.293, 0.194, 0.097, 0.059, 0.070, 0.088, 0.130, 0.177,
];
/// Knee of the anode current saturation curve.
pub const NON_LINEARITY_ALPHA: f64 = 16.68;
/// Strength of the saturation above the knee.
pub const NON_LINEARITY_BETA: f64 = 0.009571;
// Dynode gain scales with the inter-dynode voltage as V^0.7.
const VOLTAGE_EXPONENT: f64 = 0.7;
// Converts a photoelectron rate (pe/ns) into the current scale of the fit.
const RATE_TO_CURRENT: f64 = 50.0 / 31.0;
const DAMPING_EXPONENT: f64 = 0.1;

/// Non-linear PMT response from a dynode-by-dynode electron cascade.
///
/// Photoelectrons are multiplied through every dynode, with counting
/// statistics applied after each stage. A high instantaneous photoelectron
/// rate damps every stage gain, which saturates the charge of bright pulses.
/// Two rare paths are also modelled: a photon converting directly on the
/// first dynode (cathode skip), and a photoelectron missing the first dynode
/// (dynode 1 skip). Both are disabled by default.
#[derive(Clone, Debug)]
pub struct Cascade<R> {
    rng: R,
    relative_gains: Vec<f64>,
    // Absolute gain of the first dynode.
    dynode_gain: f64,
    total_gain: f64,
    alpha: f64,
    beta: f64,
    p_cathode_skip: f64,
    p_dynode1_skip: f64,
}

impl<R> Cascade<R> {
    pub fn new(rng: R) -> Self {
        let relative_gains = RELATIVE_DYNODE_GAINS.to_vec();
        // G = g^N * (r_1 * ... * r_{N-1})^0.7
        let product: f64 = relative_gains[1..].iter().product();
        let stages = relative_gains.len() as f64;
        let dynode_gain = (TOTAL_GAIN / product.powf(VOLTAGE_EXPONENT)).powf(stages.recip());

        Self {
            rng,
            relative_gains,
            dynode_gain,
            total_gain: TOTAL_GAIN,
            alpha: NON_LINEARITY_ALPHA,
            beta: NON_LINEARITY_BETA,
            p_cathode_skip: 0.0,
            p_dynode1_skip: 0.0,
        }
    }

    /// Enables the sub-dominant cascade paths.
    ///
    /// # Examples
    ///
    /// ```
    /// use rand::rngs::StdRng;
    /// use rand::SeedableRng;
    /// use wcdigi::charge::Cascade;
    ///
    /// let cascade = Cascade::new(StdRng::seed_from_u64(0))
    ///     .with_skip_probabilities(0.01, 0.02)?;
    /// assert_eq!(cascade.skip_probabilities(), (0.01, 0.02));
    ///
    /// assert!(Cascade::new(StdRng::seed_from_u64(0))
    ///     .with_skip_probabilities(1.5, 0.0)
    ///     .is_err());
    /// # Ok::<(), wcdigi::Error>(())
    /// ```
    pub fn with_skip_probabilities(mut self, cathode: f64, dynode1: f64) -> Result<Self, Error> {
        for (name, value) in [("cathode skip", cathode), ("dynode 1 skip", dynode1)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidProbability { name, value });
            }
        }
        self.p_cathode_skip = cathode;
        self.p_dynode1_skip = dynode1;

        Ok(self)
    }

    pub fn skip_probabilities(&self) -> (f64, f64) {
        (self.p_cathode_skip, self.p_dynode1_skip)
    }
    pub fn num_stages(&self) -> usize {
        self.relative_gains.len()
    }
    pub fn total_gain(&self) -> f64 {
        self.total_gain
    }

    /// Gain of one dynode stage, reduced by `damping`.
    pub fn stage_gain(&self, stage: usize, damping: f64) -> f64 {
        self.dynode_gain * self.relative_gains[stage].powf(VOLTAGE_EXPONENT) * damping
    }

    /// Photoelectron rate (pe/ns) of `pe` photoelectrons arriving between
    /// `start` and `end`. Zero for a window without width.
    pub fn pe_rate(pe: u32, start: f64, end: f64) -> f64 {
        let spread = end - start;
        if spread > 0.0 {
            f64::from(pe) / spread
        } else {
            0.0
        }
    }

    /// Per-stage gain reduction caused by a photoelectron rate (pe/ns).
    ///
    /// Exactly `1.0` for a zero rate.
    pub fn damping(&self, rate: f64) -> f64 {
        if rate == 0.0 {
            return 1.0;
        }
        let initial = RATE_TO_CURRENT * rate;
        let final_current = if initial < self.alpha {
            initial
        } else {
            let excess = initial - self.alpha;
            self.alpha + excess / (1.0 + self.beta * excess)
        };

        (final_current / initial).powf(DAMPING_EXPONENT)
    }
}

impl<R: Rng> Cascade<R> {
    /// Smeared charge of `pe` photoelectrons arriving between `start` and
    /// `end` (ns).
    pub fn charge(&mut self, pe: u32, start: f64, end: f64) -> f64 {
        let damping = self.damping(Self::pe_rate(pe, start, end));

        let mut n_cathode_skip = 0u32;
        let mut n_dynode1_skip = 0u32;
        for _ in 0..pe {
            if self.rng.random::<f64>() < self.p_cathode_skip {
                n_cathode_skip += 1;
            } else if self.rng.random::<f64>() < self.p_dynode1_skip {
                n_dynode1_skip += 1;
            }
        }
        let n_normal = pe - n_cathode_skip - n_dynode1_skip;

        let mut normal = f64::from(n_normal);
        for stage in 0..self.num_stages() {
            let gain = self.stage_gain(stage, damping);
            normal = fluctuate(&mut self.rng, normal * gain);
        }

        // Converted on the first dynode, so the first multiplication is lost.
        let mut cathode_skip = f64::from(n_cathode_skip);
        if n_cathode_skip != 0 {
            for stage in 1..self.num_stages() {
                let gain = self.stage_gain(stage, damping);
                cathode_skip = fluctuate(&mut self.rng, cathode_skip * gain);
            }
        }

        // Landed directly on the second dynode.
        let mut dynode1_skip = f64::from(n_dynode1_skip);
        if n_dynode1_skip != 0 {
            let first = self.stage_gain(0, damping) + self.stage_gain(1, damping);
            dynode1_skip = fluctuate(&mut self.rng, dynode1_skip * first);
            for stage in 2..self.num_stages() {
                let gain = self.stage_gain(stage, damping);
                dynode1_skip = fluctuate(&mut self.rng, dynode1_skip * gain);
            }
        }

        (normal + cathode_skip + dynode1_skip) / self.total_gain
    }
}
