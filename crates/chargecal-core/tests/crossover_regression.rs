use chargecal_core::{solve, CrossoverOutcome, RawPairBuffer};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

/// Charges whose log10 values are normally distributed around `log_center`.
fn log_normal_charges(
    rng: &mut StdRng,
    log_center: f64,
    log_std: f64,
    count: usize,
) -> RawPairBuffer {
    let normal = Normal::new(log_center, log_std).expect("normal parameters are valid");
    RawPairBuffer::from_pairs((0..count).map(|_| {
        let charge = 10.0_f64.powf(normal.sample(rng));
        (charge, charge)
    }))
}

#[test]
fn thresholds_fall_between_well_separated_sub_range_centers() {
    let mut rng = StdRng::seed_from_u64(7);
    let buffers = [
        log_normal_charges(&mut rng, 0.0, 0.3, 200),
        log_normal_charges(&mut rng, 2.0, 0.3, 200),
        log_normal_charges(&mut rng, 4.0, 0.3, 200),
    ];

    let CrossoverOutcome::Thresholds(result) = solve(&buffers, false) else {
        panic!("fully populated channel should yield thresholds");
    };

    let low_mid_log = result.low_mid.log10();
    let mid_high_log = result.mid_high.log10();
    assert!(
        low_mid_log > 0.0 && low_mid_log < 2.0,
        "low/mid threshold log10 {low_mid_log} outside (0, 2)"
    );
    assert!(
        mid_high_log > 2.0 && mid_high_log < 4.0,
        "mid/high threshold log10 {mid_high_log} outside (2, 4)"
    );
}

#[test]
fn uneven_populations_shift_the_threshold_but_keep_it_bracketed() {
    let mut rng = StdRng::seed_from_u64(11);
    let buffers = [
        log_normal_charges(&mut rng, 0.0, 0.35, 1000),
        log_normal_charges(&mut rng, 2.0, 0.35, 120),
        log_normal_charges(&mut rng, 4.0, 0.35, 40),
    ];

    let CrossoverOutcome::Thresholds(result) = solve(&buffers, false) else {
        panic!("fully populated channel should yield thresholds");
    };
    assert!(result.low_mid.log10() > 0.0 && result.low_mid.log10() < 2.0);
    assert!(result.mid_high.log10() > 2.0 && result.mid_high.log10() < 4.0);
}

#[test]
fn contaminated_high_range_yields_no_spurious_crossing() {
    let mut rng = StdRng::seed_from_u64(13);
    let low = log_normal_charges(&mut rng, 0.0, 0.2, 150);
    let mid = log_normal_charges(&mut rng, 3.0, 0.2, 150);
    // all apparent high-range charges below the mid-range minimum
    let high = RawPairBuffer::from_pairs(
        (0..20).map(|index| (1.0 + 0.01 * index as f64, 1.0 + 0.01 * index as f64)),
    );

    let outcome = solve(&[low, mid, high], false);
    let CrossoverOutcome::Sparse { populated } = outcome else {
        panic!("contaminated high range must not produce a mid/high crossing");
    };
    assert_eq!(populated[2], 0, "high range should be treated as empty");
}

#[test]
fn exclusion_applies_only_to_sparse_bad_listed_channels() {
    let mut rng = StdRng::seed_from_u64(17);
    let full = [
        log_normal_charges(&mut rng, 0.0, 0.3, 100),
        log_normal_charges(&mut rng, 2.0, 0.3, 100),
        log_normal_charges(&mut rng, 4.0, 0.3, 100),
    ];
    // population check first: a fully populated bad-listed channel still
    // yields thresholds
    assert!(matches!(
        solve(&full, true),
        CrossoverOutcome::Thresholds(_)
    ));

    let sparse = [
        log_normal_charges(&mut rng, 0.0, 0.3, 100),
        log_normal_charges(&mut rng, 2.0, 0.3, 100),
        RawPairBuffer::default(),
    ];
    assert_eq!(solve(&sparse, true), CrossoverOutcome::Excluded);
    assert!(matches!(
        solve(&sparse, false),
        CrossoverOutcome::Sparse { .. }
    ));
}

#[test]
fn single_point_sub_ranges_count_as_unpopulated() {
    let mut rng = StdRng::seed_from_u64(19);
    let buffers = [
        log_normal_charges(&mut rng, 0.0, 0.3, 100),
        RawPairBuffer::from_pairs([(100.0, 100.0)]),
        log_normal_charges(&mut rng, 4.0, 0.3, 100),
    ];

    let CrossoverOutcome::Sparse { populated } = solve(&buffers, false) else {
        panic!("a single mid-range point is not enough to estimate a density");
    };
    assert_eq!(populated[1], 1);
}
