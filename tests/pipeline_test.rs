//! End-to-end pipeline tests on the reference channel: 4 ns ticks, 100-tick
//! record, bi-exponential 4/20 ns kernel with gain 1e4 and 50 ns trace delay.

use approx::assert_relative_eq;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use pmtpulse::config::ReadoutConfig;
use pmtpulse::{PhotonDetectionEvent, ReadoutChannel, SENTINEL};

fn photon(arrival_ns: f64, weight: f64) -> PhotonDetectionEvent {
    PhotonDetectionEvent {
        arrival_ns,
        wavelength_nm: Some(400.0),
        weight,
        position_mm: None,
    }
}

#[test]
fn test_reference_single_photon_trace_support() {
    // Photon at 10 ns with 50 ns trace delay lands at 60 ns: the analog
    // trace is exactly zero before sample floor(60/4) = 15 and strictly
    // positive afterward, peaking near 60 ns + the kernel peak offset.
    let config = ReadoutConfig::default();
    let mut channel = ReadoutChannel::new(&config).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    channel.add_photon(&photon(10.0, 1.0), &mut rng);

    let trace = channel.synthesizer().trace();
    assert!(trace[..15].iter().all(|&v| v == 0.0));
    assert!(trace[15..].iter().all(|&v| v > 0.0));

    let peak_offset = channel.synthesizer().response().peak_offset_ns();
    let expected_peak_ns = 50.0 + 10.0 + peak_offset;
    let raw_peak = trace
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k)
        .unwrap();
    let closest = ((expected_peak_ns / 4.0) - 0.5).round() as usize;
    assert!(
        raw_peak.abs_diff(closest) <= 1,
        "analog peak at sample {raw_peak}, expected near {closest}"
    );

    let summary = channel.process(&mut rng);
    assert!(
        (summary.peak_time_ns - expected_peak_ns).abs() <= 4.0,
        "fitted peak {:.2} ns vs analytic {:.2} ns",
        summary.peak_time_ns,
        expected_peak_ns
    );
}

#[test]
fn test_superposition_is_linear_in_weight() {
    let config = ReadoutConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    let mut single = ReadoutChannel::new(&config).unwrap();
    single.add_photon(&photon(10.0, 1.0), &mut rng);
    single.add_photon(&photon(30.0, 1.0), &mut rng);

    let mut weighted = ReadoutChannel::new(&config).unwrap();
    weighted.add_photon(&photon(10.0, 2.5), &mut rng);
    weighted.add_photon(&photon(30.0, 2.5), &mut rng);

    for (a, b) in single
        .synthesizer()
        .trace()
        .iter()
        .zip(weighted.synthesizer().trace())
    {
        assert_relative_eq!(2.5 * a, *b, epsilon = 1e-9);
    }
}

#[test]
fn test_delivery_order_does_not_matter() {
    let config = ReadoutConfig::default();
    let arrivals = [22.0, 10.0, 14.0, 55.0, 31.0];

    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut forward = ReadoutChannel::new(&config).unwrap();
    for &t in &arrivals {
        forward.add_photon(&photon(t, 1.0), &mut rng);
    }

    let mut reverse = ReadoutChannel::new(&config).unwrap();
    for &t in arrivals.iter().rev() {
        reverse.add_photon(&photon(t, 1.0), &mut rng);
    }

    for (a, b) in forward
        .synthesizer()
        .trace()
        .iter()
        .zip(reverse.synthesizer().trace())
    {
        assert_relative_eq!(*a, *b, epsilon = 1e-9);
    }

    let fwd = forward.process(&mut ChaCha8Rng::seed_from_u64(4));
    let rev = reverse.process(&mut ChaCha8Rng::seed_from_u64(4));
    assert_eq!(fwd.min_arrival_ns, rev.min_arrival_ns);
    assert_relative_eq!(fwd.mean_arrival_ns, rev.mean_arrival_ns, epsilon = 1e-12);
    assert_eq!(fwd.peak_amplitude, rev.peak_amplitude);
}

#[test]
fn test_digitizer_baseline_law_on_empty_event() {
    let mut config = ReadoutConfig::default();
    config.digitizer.baseline_fraction = 0.25;
    config.digitizer.jitter_fraction = 0.0;
    config.record_samples = true;

    let mut channel = ReadoutChannel::new(&config).unwrap();
    let summary = channel.process(&mut ChaCha8Rng::seed_from_u64(5));

    let expected = (0.25 * 16384.0) as u32;
    assert!(summary
        .samples
        .unwrap()
        .iter()
        .all(|&s| s == expected));
    assert!(!summary.saturated);
}

#[test]
fn test_saturation_law() {
    // A photon driving the peak beyond the representable range must flag
    // saturation and clamp the affected samples to exactly 65535.
    let mut config = ReadoutConfig::default();
    config.digitizer.adc_bits = 16;
    config.digitizer.baseline_fraction = 0.1;
    config.record_samples = true;

    let mut channel = ReadoutChannel::new(&config).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(6);
    channel.add_photon(&photon(10.0, 300.0), &mut rng);
    let summary = channel.process(&mut rng);

    assert!(summary.saturated);
    let samples = summary.samples.unwrap();
    assert_eq!(*samples.iter().max().unwrap(), 65535);
    assert!(samples.iter().all(|&s| s <= 65535));
}

#[test]
fn test_sentinels_on_empty_event() {
    let config = ReadoutConfig::default();
    let mut channel = ReadoutChannel::new(&config).unwrap();
    let summary = channel.process(&mut ChaCha8Rng::seed_from_u64(7));

    assert_eq!(summary.cfd_ns, SENTINEL);
    assert_eq!(summary.poly_cfd_ns, SENTINEL);
    assert_eq!(summary.min_arrival_ns, SENTINEL);
    assert_eq!(summary.mean_wavelength_nm, SENTINEL);
}

#[test]
fn test_clear_restores_fresh_channel_behavior() {
    let config = ReadoutConfig::default();
    let mut fresh = ReadoutChannel::new(&config).unwrap();
    let mut reused = ReadoutChannel::new(&config).unwrap();

    // Dirty the reused channel with an unrelated event
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    reused.add_photon(&photon(80.0, 5.0), &mut rng);
    reused.process(&mut rng);
    reused.clear();

    let mut rng_a = ChaCha8Rng::seed_from_u64(9);
    let mut rng_b = ChaCha8Rng::seed_from_u64(9);
    for &t in &[10.0, 14.0, 22.0] {
        fresh.add_photon(&photon(t, 1.0), &mut rng_a);
        reused.add_photon(&photon(t, 1.0), &mut rng_b);
    }
    let a = fresh.process(&mut rng_a);
    let b = reused.process(&mut rng_b);

    assert_eq!(a.peak_amplitude, b.peak_amplitude);
    assert_eq!(a.cfd_ns, b.cfd_ns);
    assert_eq!(a.poly_cfd_ns, b.poly_cfd_ns);
    assert_eq!(a.charge, b.charge);
    assert_eq!(a.min_arrival_ns, b.min_arrival_ns);
}

#[test]
fn test_charge_grows_with_photon_count() {
    let config = ReadoutConfig::default();
    let mut rng = ChaCha8Rng::seed_from_u64(10);

    let mut few = ReadoutChannel::new(&config).unwrap();
    for &t in &[10.0, 12.0] {
        few.add_photon(&photon(t, 1.0), &mut rng);
    }
    let few_q = few.process(&mut ChaCha8Rng::seed_from_u64(11)).charge;

    let mut many = ReadoutChannel::new(&config).unwrap();
    for &t in &[10.0, 12.0, 11.0, 13.0, 10.5, 12.5] {
        many.add_photon(&photon(t, 1.0), &mut rng);
    }
    let many_q = many.process(&mut ChaCha8Rng::seed_from_u64(11)).charge;

    assert_ne!(few_q, SENTINEL);
    assert!(many_q > 2.0 * few_q, "charge {many_q} vs {few_q}");
}
