//! Wave Link fader curve.
//!
//! Wave Link reports fader positions as 0-100 percent. The audible level
//! follows a non-linear taper, approximated here by linear interpolation over
//! a fixed table of measured control points.

use super::utils::lerp;

/// One control point of the fader taper.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeCurvePoint {
    pub percent: f32,
    pub db: f32,
}

const fn point(percent: f32, db: f32) -> VolumeCurvePoint {
    VolumeCurvePoint { percent, db }
}

/// Control points, strictly ascending by percent.
pub const VOLUME_CURVE: [VolumeCurvePoint; 10] = [
    point(0.0, -100.0),
    point(1.0, -39.3),
    point(5.0, -38.0),
    point(15.0, -34.3),
    point(30.0, -28.2),
    point(45.0, -22.5),
    point(60.0, -16.3),
    point(75.0, -10.2),
    point(90.0, -4.2),
    point(100.0, 0.0),
];

/// Maps a fader percent to decibels. Values outside the table clamp to the
/// first/last point.
pub fn db_for(percent: f32) -> f32 {
    let first = VOLUME_CURVE[0];
    let last = VOLUME_CURVE[VOLUME_CURVE.len() - 1];

    if percent <= first.percent {
        return first.db;
    }
    if percent >= last.percent {
        return last.db;
    }

    for pair in VOLUME_CURVE.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if percent >= a.percent && percent <= b.percent {
            let t = (percent - a.percent) / (b.percent - a.percent);
            return lerp(a.db, b.db, t);
        }
    }

    // Only NaN gets here.
    first.db
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_are_exact() {
        assert_eq!(db_for(0.0), -100.0);
        assert_eq!(db_for(100.0), 0.0);
    }

    #[test]
    fn test_control_points_hit_exactly() {
        for p in VOLUME_CURVE {
            assert!(
                (db_for(p.percent) - p.db).abs() < 1e-4,
                "{}% should map to {} dB, got {}",
                p.percent,
                p.db,
                db_for(p.percent)
            );
        }
    }

    #[test]
    fn test_interpolates_between_points() {
        // Halfway between (45, -22.5) and (60, -16.3)
        let expected = -22.5 + 0.5 * (-16.3 - -22.5);
        assert!((db_for(52.5) - expected).abs() < 1e-4);

        // Halfway between (1, -39.3) and (5, -38.0)
        let expected = -39.3 + (2.0 / 4.0) * (-38.0 - -39.3);
        assert!((db_for(3.0) - expected).abs() < 1e-4);
    }

    #[test]
    fn test_clamps_outside_range() {
        assert_eq!(db_for(-5.0), db_for(0.0));
        assert_eq!(db_for(150.0), db_for(100.0));
    }

    #[test]
    fn test_monotonic_non_decreasing() {
        let mut prev = db_for(0.0);
        for step in 1..=1000 {
            let db = db_for(step as f32 * 0.1);
            assert!(db >= prev, "curve decreased at {}%", step as f32 * 0.1);
            prev = db;
        }
    }

    #[test]
    fn test_nan_is_silent() {
        assert_eq!(db_for(f32::NAN), -100.0);
    }
}
