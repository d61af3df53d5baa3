use crate::charge::ChargeModelKind;
use crate::trigger::TriggerAlgorithm;
use num_traits::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Width of the sliding window used by the global trigger (ns).
pub const TRIGGER_WINDOW: f64 = 200.0;
/// Width of the PMT charge integration window (ns).
pub const PMT_GATE: f64 = 200.0;
/// Upper edge of an event gate relative to its trigger time (ns).
pub const EVENT_GATE_UP: f64 = 950.0;
/// Lower edge of an event gate relative to its trigger time (ns).
pub const EVENT_GATE_DOWN: f64 = -400.0;
/// Minimum number of hit PMTs that fire the global trigger.
pub const GLOBAL_THRESHOLD: u32 = 25;

/// A strictly positive value.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Positive<T>(pub(crate) T);

impl<T: Zero + PartialOrd> Positive<T> {
    /// Returns `None` unless `value > 0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use wcdigi::config::Positive;
    ///
    /// assert!(Positive::new(1.5).is_some());
    /// assert!(Positive::new(0.0).is_none());
    /// assert!(Positive::new(f64::NAN).is_none());
    /// ```
    pub fn new(value: T) -> Option<Self> {
        if value > T::zero() {
            Some(Self(value))
        } else {
            None
        }
    }
}

impl<T> Positive<T> {
    pub fn inner(&self) -> &T {
        &self.0
    }
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Serialize> Serialize for Positive<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Positive<T>
where
    T: Deserialize<'de> + Zero + PartialOrd,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = T::deserialize(deserializer)?;
        Positive::new(value).ok_or_else(|| de::Error::custom("expected a strictly positive value"))
    }
}

/// How the representative hit time of a PMT within a gate is chosen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HitTimePolicy {
    /// Earliest hit in the gate.
    #[default]
    First,
    /// Mean of all hit times in the gate.
    Mean,
}

/// Detector-wide digitization settings.
///
/// Every field has a default, so partial configurations deserialize fine:
///
/// ```
/// use wcdigi::config::{DigitizerConfig, HitTimePolicy};
///
/// let config = DigitizerConfig {
///     hit_time: HitTimePolicy::Mean,
///     ..Default::default()
/// };
/// assert_eq!(config.global_threshold, 25);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DigitizerConfig {
    /// Minimum number of hit (non-veto) PMTs in a trigger run.
    pub global_threshold: u32,
    /// Maximum gap between consecutive first-hit times in a trigger run (ns).
    pub trigger_window: Positive<f64>,
    /// Charge integration window of a single PMT (ns).
    pub pmt_gate: Positive<f64>,
    /// Gate edges relative to the trigger time (ns).
    pub event_gate_up: f64,
    pub event_gate_down: f64,
    pub hit_time: HitTimePolicy,
    /// Disables the timing resolution smearing.
    pub perfect_timing: bool,
    pub charge_model: ChargeModelKind,
    pub trigger_algorithm: TriggerAlgorithm,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            global_threshold: GLOBAL_THRESHOLD,
            trigger_window: Positive(TRIGGER_WINDOW),
            pmt_gate: Positive(PMT_GATE),
            event_gate_up: EVENT_GATE_UP,
            event_gate_down: EVENT_GATE_DOWN,
            hit_time: HitTimePolicy::default(),
            perfect_timing: false,
            charge_model: ChargeModelKind::default(),
            trigger_algorithm: TriggerAlgorithm::default(),
        }
    }
}

impl DigitizerConfig {
    /// Checks the settings that types alone cannot enforce.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.global_threshold == 0 {
            return Err(crate::Error::ZeroThreshold);
        }
        // Also rejects NaN edges.
        if !(self.event_gate_up > self.event_gate_down) {
            return Err(crate::Error::EmptyEventGate {
                down: self.event_gate_down,
                up: self.event_gate_up,
            });
        }

        Ok(())
    }
}
