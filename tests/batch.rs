mod common;

use common::*;
use optimal_filter::batch::{EventReducer, RQ_NAMES, ReductionConfig};
use optimal_filter::domain::Coupling;
use optimal_filter::error::OfError;
use optimal_filter::sim::{NoiseGenerator, shifted, white_psd};

fn events(count: u64) -> Vec<Vec<Vec<f64>>> {
    (0..count)
        .map(|seed| {
            let amp = 1e-7 * (1.0 + seed as f64);
            let mut ch0 = scaled(&shifted(&pulse(), seed as i64 % 5), 0.6 * amp);
            let mut ch1 = scaled(&shifted(&pulse(), seed as i64 % 5), 0.4 * amp);
            let mut noise = NoiseGenerator::new(seed, SIGMA / 2.0).unwrap();
            noise.add_to(&mut ch0);
            noise.add_to(&mut ch1);
            vec![ch0, ch1]
        })
        .collect()
}

#[test]
fn summed_channels_are_reduced() {
    let mut reducer = EventReducer::new(base(Coupling::Ac), "signal", ReductionConfig::default()).unwrap();
    let event = &events(1)[0];
    let rq = reducer.process_event(event).unwrap();

    assert_eq!(rq.len(), RQ_NAMES.len());
    assert!(rel_err(rq["ofamp_constrain"], 1e-7) < 0.05, "amp {}", rq["ofamp_constrain"]);
    assert!((rq["t0_constrain"] * FS).round().abs() <= 1.0);
    assert!(rq["chi2_constrain"] >= rq["chi2_noconstrain"]);
    assert!(rq["chi2_lowfreq"] <= rq["chi2_constrain"] + 1e-6);
    assert!(rq["baseline"].abs() < 5.0 * SIGMA);
}

#[test]
fn per_channel_quantities_carry_suffixes() {
    let mut reducer = EventReducer::new(base(Coupling::Ac), "signal", ReductionConfig::default())
        .unwrap()
        .with_channels(
            &[pulse(), pulse()],
            &[white_psd(N, FS, SIGMA / 2.0), white_psd(N, FS, SIGMA / 2.0)],
        )
        .unwrap();
    let rq = reducer.process_event(&events(1)[0]).unwrap();

    assert_eq!(rq.len(), 3 * RQ_NAMES.len());
    assert!(rel_err(rq["ofamp_constrain_ch0"], 0.6e-7) < 0.05);
    assert!(rel_err(rq["ofamp_constrain_ch1"], 0.4e-7) < 0.05);

    let err = reducer.process_event(&[pulse()]).unwrap_err();
    assert!(matches!(err, OfError::Dimension(_)));
}

#[test]
fn parallel_reduction_matches_sequential() {
    let reducer = EventReducer::new(base(Coupling::Ac), "signal", ReductionConfig::default()).unwrap();
    let batch = events(8);

    let parallel = reducer.process_events(&batch).unwrap();
    let mut sequential_reducer = reducer.clone();
    let sequential: Vec<_> = batch
        .iter()
        .map(|event| sequential_reducer.process_event(event).unwrap())
        .collect();

    assert_eq!(parallel, sequential);
    for (i, rq) in parallel.iter().enumerate() {
        let want = 1e-7 * (1.0 + i as f64);
        assert!(rel_err(rq["ofamp_noconstrain"], want) < 0.05, "event {i}");
    }
}
