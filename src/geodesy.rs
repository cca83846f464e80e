/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in meters between two WGS84 positions given in degrees.
#[inline]
pub fn haversine(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );

    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);

    // Rounding can push `a` a hair above 1.0 for antipodal points
    let c = 2.0 * a.sqrt().min(1.0).asin();
    c * EARTH_RADIUS_M
}

/// Time-synchronized position at `t` on the segment `(lon1, lat1, t1) -> (lon2, lat2, t2)`.
///
/// When the bounding timestamps coincide (or are reversed) the second
/// position is returned unchanged.
#[inline]
pub fn interpolate(
    (lon1, lat1, t1): (f64, f64, i64),
    (lon2, lat2, t2): (f64, f64, i64),
    t: i64,
) -> (f64, f64) {
    if t2 > t1 {
        let frac = (t - t1) as f64 / (t2 - t1) as f64;
        (lon1 + frac * (lon2 - lon1), lat1 + frac * (lat2 - lat1))
    } else {
        (lon2, lat2)
    }
}

/// Perpendicular projection of `(lon, lat)` on the line through two points,
/// computed in the plane of raw degrees.
///
/// Coincident line points return the first one unprojected.
#[inline]
pub fn project(
    (lon1, lat1): (f64, f64),
    (lon2, lat2): (f64, f64),
    (lon, lat): (f64, f64),
) -> (f64, f64) {
    if lon1 == lon2 && lat1 == lat2 {
        return (lon1, lat1);
    }

    // Line in the form a*x + b*y + c = 0
    let a = -(lat2 - lat1);
    let b = lon2 - lon1;
    let c = lon1 * (lat2 - lat1) - lat1 * (lon2 - lon1);
    let norm = a * a + b * b;

    let est_lon = (b * (b * lon - a * lat) - a * c) / norm;
    let est_lat = (a * (-b * lon + a * lat) - b * c) / norm;
    (est_lon, est_lat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_one_degree_of_latitude() {
        let d = haversine(0.0, 0.0, 0.0, 1.0);
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6, "got {}", d);
    }

    #[test]
    fn interpolate_degenerate_interval_returns_second_point() {
        assert_eq!(interpolate((1.0, 1.0, 5), (2.0, 3.0, 5), 5), (2.0, 3.0));
    }

    #[test]
    fn project_onto_diagonal() {
        let (x, y) = project((0.0, 0.0), (2.0, 2.0), (2.0, 0.0));
        assert!((x - 1.0).abs() < 1e-12);
        assert!((y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn project_coincident_points() {
        assert_eq!(project((3.0, 4.0), (3.0, 4.0), (9.0, 9.0)), (3.0, 4.0));
    }
}
