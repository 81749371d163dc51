// Shared timing window definitions for both judging passes.

// All windows are in subdivisions (one chart step).

/// Plays closer than this to their step count as hits and raise the gauge.
pub const GOOD_THRESHOLD: f64 = 0.27;

/// How far behind `now` a step must be before the retroactive pass scores it.
pub const LOOKBACK_SUBDIVISIONS: f64 = 1.0;

/// Prospective search radius around a played note.
pub const SEARCH_RADIUS_SUBDIVISIONS: f64 = 1.0;

/// Distance between a play and its step, in subdivisions, clamped to [0, 1].
/// `None` (nothing to match) is a full miss.
#[inline(always)]
pub fn normalized_delta(delta_s: Option<f64>, subdivision_s: f64) -> f64 {
    match delta_s {
        Some(d) if subdivision_s > 0.0 => (d.abs() / subdivision_s).clamp(0.0, 1.0),
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::normalized_delta;

    #[test]
    fn deltas_scale_by_subdivision_and_clamp() {
        assert!((normalized_delta(Some(0.08), 0.125) - 0.64).abs() < 1e-9);
        assert!((normalized_delta(Some(-0.08), 0.125) - 0.64).abs() < 1e-9);
        assert_eq!(normalized_delta(Some(0.5), 0.125), 1.0);
        assert_eq!(normalized_delta(None, 0.125), 1.0);
        assert_eq!(normalized_delta(Some(0.0), 0.125), 0.0);
    }
}
