use rand::Rng;
use rand_distr::{Distribution, Normal};
use std::collections::BTreeMap;

/// Exponential time-over-threshold response of one PMT readout:
/// `tot(pe) = upper_bound - multiplier * exp(-lambda * pe)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TotCalibration {
    pub upper_bound: f64,
    pub lambda: f64,
    pub multiplier: f64,
}

impl TotCalibration {
    /// Calibration of the Nikhef 88 mm readout.
    pub const NIKHEF: Self = Self {
        upper_bound: 19.462568,
        lambda: 0.37098,
        multiplier: 7.09985,
    };
    /// Calibration of the Madison R6091 readout.
    pub const MADISON: Self = Self {
        upper_bound: 19.462568,
        lambda: 0.37098,
        multiplier: 7.09985,
    };

    /// Expected pulse width of `pe` photoelectrons.
    pub fn mean_tot(&self, pe: f64) -> f64 {
        self.upper_bound - self.multiplier * (-self.lambda * pe).exp()
    }

    /// Charge (pe) that corresponds to a measured pulse width.
    ///
    /// `None` if the width is at or beyond the saturation bound.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::charge::TotCalibration;
    ///
    /// let calibration = TotCalibration::NIKHEF;
    /// let pe = calibration.pe_from_tot(calibration.mean_tot(4.0)).unwrap();
    ///
    /// assert!((pe - 4.0).abs() < 1e-9);
    /// assert_eq!(calibration.pe_from_tot(calibration.upper_bound), None);
    /// ```
    pub fn pe_from_tot(&self, tot: f64) -> Option<f64> {
        let ratio = (self.upper_bound - tot) / self.multiplier;
        if ratio > 0.0 {
            Some(-ratio.ln() / self.lambda)
        } else {
            None
        }
    }
}

/// Time-over-threshold PMT response.
///
/// The readout measures the pulse width instead of its integral. The charge
/// is reconstructed by inverting the calibration of the tube's PMT type, so
/// the noise on the measured width saturates with the exponential curve.
#[derive(Clone, Debug)]
pub struct TimeOverThreshold<R> {
    rng: R,
    calibrations: BTreeMap<String, TotCalibration>,
}

impl<R> TimeOverThreshold<R> {
    /// Creates a model that knows the `88mm`, `88mm_LC_v2`, `R6091` and
    /// `R6091_LC_v1` PMT types.
    pub fn new(rng: R) -> Self {
        let calibrations = [
            ("88mm", TotCalibration::NIKHEF),
            ("88mm_LC_v2", TotCalibration::NIKHEF),
            ("R6091", TotCalibration::MADISON),
            ("R6091_LC_v1", TotCalibration::MADISON),
        ]
        .into_iter()
        .map(|(name, calibration)| (name.to_string(), calibration))
        .collect();

        Self { rng, calibrations }
    }

    /// Adds or replaces the calibration of a PMT type.
    pub fn with_calibration(mut self, pmt_name: impl Into<String>, calibration: TotCalibration) -> Self {
        self.calibrations.insert(pmt_name.into(), calibration);
        self
    }

    pub fn calibration(&self, pmt_name: &str) -> Option<&TotCalibration> {
        self.calibrations.get(pmt_name)
    }
}

impl<R: Rng> TimeOverThreshold<R> {
    /// Smeared charge of `pe` photoelectrons on a PMT of type `pmt_name`.
    ///
    /// Returns `0.0` for a PMT type without a calibration, and for a width
    /// drawn beyond the saturation bound.
    pub fn charge(&mut self, pe: u32, pmt_name: &str) -> f64 {
        let Some(calibration) = self.calibrations.get(pmt_name).copied() else {
            log::warn!("no time-over-threshold calibration for PMT type `{pmt_name}`");
            return 0.0;
        };
        let pe = f64::from(pe);
        let mean = calibration.mean_tot(pe);
        let tot = match Normal::new(mean, pe.sqrt()) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        };
        let pe_smeared = calibration.pe_from_tot(tot).unwrap_or(0.0);
        log::trace!("pe = {pe}, tot mean = {mean}, tot = {tot}, pe smeared = {pe_smeared}");

        pe_smeared
    }
}
