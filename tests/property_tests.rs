use proptest::prelude::*;
use strum::IntoEnumIterator;
use synopt::evaluation::{estimate, EstimationMode};
use synopt::geodesy::{haversine, interpolate};
use synopt::params::{
    snap_to_grid, GeneKind, Individual, Parameter, ParameterVector, GENE_COUNT,
};
use synopt::trajectory::{NoiseAnnotation, TrajectoryPoint, TrajectorySet};

// --- STRATEGIES ---

prop_compose! {
    fn arb_position()(lon in -180.0..180.0f64, lat in -85.0..85.0f64) -> (f64, f64) {
        (lon, lat)
    }
}

prop_compose! {
    /// A single track with strictly increasing timestamps.
    fn arb_track()(
        steps in prop::collection::vec((-0.01..0.01f64, -0.01..0.01f64, 1..600i64), 3..40)
    ) -> Vec<TrajectoryPoint> {
        let (mut lon, mut lat, mut t) = (10.0, 50.0, 0i64);
        steps
            .into_iter()
            .map(|(dx, dy, dt)| {
                lon += dx;
                lat += dy;
                t += dt;
                TrajectoryPoint::new(lon, lat, t)
            })
            .collect()
    }
}

fn arb_vector() -> impl Strategy<Value = ParameterVector> {
    let genes: Vec<_> = Parameter::iter()
        .map(|p| {
            let spec = p.spec();
            (spec.low..=spec.high).prop_map(move |v| match spec.kind {
                GeneKind::Integer => v.trunc(),
                GeneKind::Real => v,
            })
        })
        .collect();
    genes.prop_map(|v| {
        let mut values = [0.0; GENE_COUNT];
        values.copy_from_slice(&v);
        ParameterVector::new(values)
    })
}

proptest! {
    #[test]
    fn haversine_is_a_metric_on_samples(a in arb_position(), b in arb_position()) {
        prop_assert_eq!(haversine(a.0, a.1, a.0, a.1), 0.0);

        let ab = haversine(a.0, a.1, b.0, b.1);
        let ba = haversine(b.0, b.1, a.0, a.1);
        prop_assert!(ab >= 0.0);
        prop_assert!((ab - ba).abs() < 1e-6);
        // Half the circumference bounds every great-circle distance
        prop_assert!(ab <= std::f64::consts::PI * 6_371_000.0 + 1e-6);
    }

    #[test]
    fn interpolation_hits_endpoints_and_is_linear(
        a in arb_position(),
        b in arb_position(),
        t1 in 0..1_000_000i64,
        span in 1..1_000_000i64,
        frac in 0.0..1.0f64,
    ) {
        let t2 = t1 + span;
        prop_assert_eq!(interpolate((a.0, a.1, t1), (b.0, b.1, t2), t1), a);

        let end = interpolate((a.0, a.1, t1), (b.0, b.1, t2), t2);
        prop_assert!((end.0 - b.0).abs() < 1e-9 && (end.1 - b.1).abs() < 1e-9);

        let t = t1 + (frac * span as f64) as i64;
        let (lon, lat) = interpolate((a.0, a.1, t1), (b.0, b.1, t2), t);
        let f = (t - t1) as f64 / span as f64;
        prop_assert!((lon - (a.0 + f * (b.0 - a.0))).abs() < 1e-9);
        prop_assert!((lat - (a.1 + f * (b.1 - a.1))).abs() < 1e-9);
    }

    #[test]
    fn keeping_every_point_is_exact(track in arb_track()) {
        let raw: TrajectorySet = track.iter().map(|p| ("v".to_string(), *p)).collect();
        let r = estimate(&raw, &raw, &NoiseAnnotation::new(), EstimationMode::Interpolate).unwrap();
        prop_assert!(r.rmse.abs() < 1e-9);
        prop_assert!((r.ratio - 1.0).abs() < 1e-12);
    }

    #[test]
    fn endpoints_only_ratio_is_two_over_n(track in arb_track()) {
        let raw: TrajectorySet = track.iter().map(|p| ("v".to_string(), *p)).collect();
        let ends: TrajectorySet = [track[0], track[track.len() - 1]]
            .iter()
            .map(|p| ("v".to_string(), *p))
            .collect();

        let r = estimate(&raw, &ends, &NoiseAnnotation::new(), EstimationMode::Interpolate).unwrap();
        prop_assert!((r.ratio - 2.0 / track.len() as f64).abs() < 1e-12);
        prop_assert!(r.rmse >= 0.0);

        let again = estimate(&raw, &ends, &NoiseAnnotation::new(), EstimationMode::Interpolate).unwrap();
        prop_assert_eq!(r, again);
    }

    #[test]
    fn individuals_round_trip_through_display(v in arb_vector()) {
        prop_assert!(v.is_within_bounds());
        let parsed: ParameterVector = v.to_string().parse().unwrap();
        prop_assert_eq!(parsed, v);

        let ind = Individual::new(v);
        prop_assert!(ind.fitness.is_none());
    }

    #[test]
    fn snapping_lands_on_the_grid(v in 200.0..5000.0f64) {
        let s = snap_to_grid(v);
        prop_assert_eq!(s % 50.0, 0.0);
        prop_assert!((s - v).abs() <= 25.0);
    }
}
