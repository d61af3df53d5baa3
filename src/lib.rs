use crate::charge::{ChargeInput, ChargeModel};
use crate::config::{DigitizerConfig, HitTimePolicy};
use crate::digit::{DigitCollection, DigitizedEvent, GateDigit};
use crate::hit::{HitCollection, TubeId};
use crate::pmt::Detector;
use crate::trigger::{Gate, TriggerFinder};
use bon::bon;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

pub use crate::error::Error;

/// PMT charge response models.
pub mod charge;
/// Digitization settings.
pub mod config;
/// Digitized output of an event.
pub mod digit;
mod error;
/// Utilities to generate input hits for the digitizer.
pub mod gen;
/// Raw PMT hits.
pub mod hit;
/// PMT types and detector layout.
pub mod pmt;
/// Global trigger and event gates.
pub mod trigger;

/// Best achievable timing resolution of a PMT (ns).
pub const MIN_TIMING_RESOLUTION: f64 = 0.58;
const TIMING_RESOLUTION_OFFSET: f64 = 0.33;
// Charges below this are treated as this for the timing resolution.
const MIN_RESOLUTION_CHARGE: f64 = 0.5;

/// Gaussian timing resolution (ns) of a PMT with the given transit-time
/// constant (ns) for a pulse of `charge` pe.
///
/// # Examples
///
/// ```
/// use wcdigi::{timing_resolution, MIN_TIMING_RESOLUTION};
///
/// assert!((timing_resolution(2.0, 2.0) - 1.33).abs() < 1e-12);
/// assert_eq!(timing_resolution(0.0, 100.0), MIN_TIMING_RESOLUTION);
/// ```
pub fn timing_resolution(time_constant: f64, charge: f64) -> f64 {
    let charge = charge.max(MIN_RESOLUTION_CHARGE);
    (TIMING_RESOLUTION_OFFSET + (time_constant / charge).sqrt()).max(MIN_TIMING_RESOLUTION)
}

/// A trait that defines the interface for an observer of the digitizer.
///
/// The default implementation of all methods is a no-op. Users are expected to
/// override the methods they are interested in.
#[allow(unused_variables)]
pub trait Observer {
    /// Called when a gate is opened, before any of its tubes is digitized.
    fn on_trigger(&mut self, gate: &Gate) {}
    /// Called when a tube produces a digit in a gate.
    fn on_digit(&mut self, tube_id: TubeId, digit: &GateDigit) {}
    /// Called when a hit tube is dropped because the charge model returned no
    /// signal.
    fn on_no_charge(&mut self, tube_id: TubeId, gate: &Gate, pe: u32, charge: f64) {}
    /// Called when a tube is dropped because its smeared time is not positive.
    fn on_negative_time(&mut self, tube_id: TubeId, gate: &Gate, time: f64) {}
}

impl Observer for () {}

/// Global trigger and PMT digitization of a detector.
///
/// The digitizer processes one event at a time. It owns the charge model and
/// a separate random stream for the timing smearing.
pub struct Digitizer<R, O> {
    detector: Detector,
    config: DigitizerConfig,
    trigger: TriggerFinder,
    charge_model: ChargeModel<R>,
    rng: R,
    observer: O,
}

#[bon]
impl<R, O> Digitizer<R, O>
where
    R: Rng + SeedableRng,
{
    /// An explicit `charge_model` takes precedence over
    /// [`DigitizerConfig::charge_model`]. Otherwise the configured model is
    /// seeded from `rng`.
    #[builder]
    pub fn new(
        detector: Detector,
        #[builder(default)] config: DigitizerConfig,
        mut rng: R,
        charge_model: Option<ChargeModel<R>>,
        observer: O,
    ) -> Result<Self, Error> {
        config.validate()?;
        let charge_model = match charge_model {
            Some(model) => model,
            None => ChargeModel::new(config.charge_model, R::from_rng(&mut rng)),
        };

        Ok(Self {
            detector,
            trigger: TriggerFinder::from_config(&config),
            config,
            charge_model,
            rng,
            observer,
        })
    }
}

impl<R, O> Digitizer<R, O> {
    pub fn detector(&self) -> &Detector {
        &self.detector
    }
    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }
    pub fn charge_model(&self) -> &ChargeModel<R> {
        &self.charge_model
    }
    pub fn observer(&self) -> &O {
        &self.observer
    }
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }
    pub fn into_observer(self) -> O {
        self.observer
    }
}

impl<R, O> Digitizer<R, O>
where
    R: Rng,
    O: Observer,
{
    /// Returns the ascending trigger times of an event.
    ///
    /// Only the first hit of every non-veto tube takes part in the decision.
    pub fn find_triggers(&self, hits: &HitCollection) -> Result<Vec<f64>, Error> {
        let mut first_hit_times = Vec::with_capacity(hits.len());
        for hit in hits.iter() {
            let tube = self.detector.tube(hit.tube_id())?;
            if hit.tube_name() != tube.pmt_name {
                log::warn!(
                    "tube {} was hit as `{}` but is a `{}` PMT; using `{}`",
                    hit.tube_id(),
                    hit.tube_name(),
                    tube.pmt_name,
                    tube.pmt_name
                );
            }
            if tube.region.is_veto() {
                continue;
            }
            if let Some(time) = hit.first_hit_time() {
                first_hit_times.push(time);
            }
        }

        Ok(self.trigger.find(first_hit_times))
    }

    /// Triggers and digitizes one event.
    ///
    /// An event without triggers is not an error; it just has no digits.
    pub fn digitize(&mut self, hits: &HitCollection) -> Result<DigitizedEvent, Error> {
        let trigger_times = self.find_triggers(hits)?;
        for time in &trigger_times {
            log::debug!("trigger time = {time} ns");
        }

        let mut digits = DigitCollection::new();
        let gates = trigger::gates(
            &trigger_times,
            self.config.event_gate_down,
            self.config.event_gate_up,
        );
        for gate in &gates {
            self.observer.on_trigger(gate);
            self.digitize_gate(hits, gate, &mut digits)?;
        }

        Ok(DigitizedEvent {
            trigger_times,
            digits,
        })
    }

    /// Digitizes every tube within one gate, adding the results to `digits`.
    ///
    /// A tube without hits in the gate, without charge, or with a non-positive
    /// smeared time produces no digit. The PMT type of a tube always comes
    /// from the detector.
    pub fn digitize_gate(
        &mut self,
        hits: &HitCollection,
        gate: &Gate,
        digits: &mut DigitCollection,
    ) -> Result<(), Error> {
        let pmt_gate = *self.config.pmt_gate.inner();

        for hit in hits.iter() {
            let tube_id = hit.tube_id();
            let pmt_name = self.detector.tube(tube_id)?.pmt_name.as_str();
            let time_constant = self.detector.pmt_type(pmt_name)?.time_constant;

            let true_time = match self.config.hit_time {
                HitTimePolicy::First => hit.first_hit_time_in_gate(gate.lower, gate.upper),
                HitTimePolicy::Mean => hit.mean_hit_time_in_gate(gate.lower, gate.upper),
            };
            let Some(true_time) = true_time else {
                continue;
            };

            // PMT integration window, clipped to the gate.
            let bound = true_time + pmt_gate;
            let pe = hit.pe_in_gate(gate.lower, gate.upper, bound);
            let end_time = if pe <= 1 {
                true_time
            } else {
                hit.last_hit_time_in_gate(gate.lower, gate.upper.min(bound))
                    .unwrap_or(true_time)
            };

            let charge = self.charge_model.compute_charge(&ChargeInput {
                pe,
                start_time: true_time,
                end_time,
                pmt_name,
            });
            if !(charge > 0.0 && charge.is_finite()) {
                self.observer.on_no_charge(tube_id, gate, pe, charge);
                continue;
            }

            let mut time = true_time;
            if !self.config.perfect_timing {
                let sigma = timing_resolution(time_constant, charge);
                if let Ok(normal) = Normal::new(0.0, sigma) {
                    time += normal.sample(&mut self.rng);
                }
            }
            if !(time > 0.0) {
                log::debug!("discarded negative time hit on tube {tube_id}: {time} ns");
                self.observer.on_negative_time(tube_id, gate, time);
                continue;
            }

            let digit = GateDigit {
                gate: gate.index,
                trigger_time: gate.trigger_time,
                charge,
                time,
            };
            self.observer.on_digit(tube_id, &digit);
            digits.insert(tube_id, digit);
        }

        Ok(())
    }
}
