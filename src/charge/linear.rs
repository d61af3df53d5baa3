use super::fluctuate;
use rand::Rng;

/// Linear PMT response: the charge is the photoelectron count with counting
/// statistics applied. It never saturates.
#[derive(Clone, Debug)]
pub struct Linear<R> {
    rng: R,
}

impl<R> Linear<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Linear<R> {
    /// Smeared charge of `pe` photoelectrons.
    ///
    /// Poisson distributed below 50 pe, Gaussian with `sigma = sqrt(pe)`
    /// above.
    pub fn charge(&mut self, pe: u32) -> f64 {
        fluctuate(&mut self.rng, f64::from(pe))
    }
}
