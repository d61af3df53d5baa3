/// This is a general example of how you would typically digitize the PMT hits
/// of a simulated event.
///
/// Run with `RUST_LOG=debug` to see the trigger decisions.
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uom::si::f64::Time;
use uom::si::time::{microsecond, nanosecond};
use wcdigi::config::DigitizerConfig;
use wcdigi::gen::DarkNoise;
use wcdigi::hit::HitCollection;
use wcdigi::pmt::{Detector, PmtTable, Region};
use wcdigi::Digitizer;

const PMT_TYPES: &str = "\
R6091 38.0 2.0
88mm 44.0 1.5";

fn main() -> Result<()> {
    env_logger::init();

    // ===========================================
    // These are most likely your free parameters:
    let num_tubes = 400;
    let num_veto_tubes = 40;
    let flash_time = Time::new::<nanosecond>(250.0);
    let flash_photons = 3000;
    let readout = Time::new::<microsecond>(2.0);
    // ===========================================

    // ===========================================
    // Then, this is your detector. The PMT types would normally be read
    // from a file.
    let mut detector = Detector::new(PMT_TYPES.parse::<PmtTable>()?);
    for id in 0..num_tubes {
        let region = match id % 4 {
            0 => Region::Top,
            3 => Region::Bottom,
            _ => Region::Barrel,
        };
        detector.add_tube(id, "R6091", region)?;
    }
    for id in num_tubes..num_tubes + num_veto_tubes {
        detector.add_tube(id, "88mm", Region::Veto)?;
    }
    // ===========================================

    // ===========================================
    // Then, this is your digitizer configuration.
    let config: DigitizerConfig = serde_json::from_str(
        r#"{
            "charge-model": "cascade",
            "hit-time": "first"
        }"#,
    )?;
    // ===========================================

    let mut rng = StdRng::seed_from_u64(42);
    let mut hits = HitCollection::new();
    let noise = DarkNoise::with_default_rate(0.0, readout.get::<nanosecond>());
    let dark_hits = noise.apply(&mut hits, &detector, &mut rng)?;

    let t0 = flash_time.get::<nanosecond>();
    for photon in 0..flash_photons {
        let tube = rng.random_range(0..num_tubes);
        let time = t0 + 20.0 * rng.random::<f64>();
        hits.add_hit(tube, "R6091", time, photon);
    }

    let mut digitizer = Digitizer::builder()
        .detector(detector)
        .config(config)
        .rng(StdRng::from_rng(&mut rng))
        .observer(())
        .build()?;
    let event = digitizer.digitize(&hits)?;

    println!(
        "{dark_hits} dark hits, {} hit tubes, {} gates, {} digits",
        hits.len(),
        event.num_gates(),
        event.digits.num_digits()
    );
    println!("{}", serde_json::to_string_pretty(&event)?);

    Ok(())
}
